//! Allocation-free render path tests.
//!
//! These tests verify that `StereoLooper::process_block()` does not allocate
//! once the buffers exist. They run every movement and link mode through
//! buffering, recording, freezing and the queued transitions, since each of
//! those takes a different branch through the per-sample path.
//!
//! Runs under plain `cargo test`; no feature flags needed.

use assert_no_alloc::{assert_no_alloc, AllocDisabler};

#[cfg(debug_assertions)]
#[global_allocator]
static A: AllocDisabler = AllocDisabler;

use mimeo_engine::{BlockProcessor, Channel, Frame, LinkMode, Movement, StereoLooper, BLOCK_SIZE};

const SR: f32 = 48_000.0;

fn test_input(block: usize) -> [Frame; BLOCK_SIZE] {
    let mut input = [Frame::silence(); BLOCK_SIZE];
    for (i, f) in input.iter_mut().enumerate() {
        let t = (block * BLOCK_SIZE + i) as f32 / SR;
        let x = triangle(t * 220.0);
        *f = Frame::new(x, -0.5 * x);
    }
    input
}

/// Unit triangle wave.
fn triangle(phase: f32) -> f32 {
    let p = phase - phase.floor();
    4.0 * (p - 0.5).abs() - 1.0
}

/// Run `blocks` blocks through `looper`, aborting on any heap allocation.
fn assert_blocks_alloc_free(looper: &mut StereoLooper<'_>, first: usize, blocks: usize) {
    let inputs: Vec<[Frame; BLOCK_SIZE]> = (first..first + blocks).map(test_input).collect();
    let mut out = [Frame::silence(); BLOCK_SIZE];
    assert_no_alloc(|| {
        for input in &inputs {
            looper.process_block(input, &mut out);
        }
    });
}

fn run_scenario(movement: Movement, link: LinkMode) {
    let capacity = SR as usize;
    let (mut left, mut right) = (vec![0.0f32; capacity], vec![0.0f32; capacity]);
    let mut looper = StereoLooper::new(&mut left, &mut right, SR);
    looper.set_link_mode(link);
    looper.set_movement(Channel::Both, movement);
    looper.set_feedback(0.8);
    looper.set_filter(2_000.0);

    // Buffer a third of a second, then loop a short section.
    assert_blocks_alloc_free(&mut looper, 0, 250);
    looper.request_stop_buffering();
    looper.set_loop_length_seconds(Channel::Both, 0.05);
    assert_blocks_alloc_free(&mut looper, 250, 200);

    looper.request_toggle_direction();
    looper.request_restart();
    looper.set_speed(Channel::Left, 1.7);
    assert_blocks_alloc_free(&mut looper, 450, 200);

    looper.request_toggle_freeze();
    looper.set_loop_start_seconds(Channel::Both, 0.0);
    looper.set_looping(Channel::Both, false);
    assert_blocks_alloc_free(&mut looper, 650, 200);

    looper.request_reset_buffer();
    assert_blocks_alloc_free(&mut looper, 850, 100);
}

#[test]
fn every_movement_alloc_free() {
    for movement in Movement::ALL {
        run_scenario(movement, LinkMode::Mono);
    }
}

#[test]
fn every_link_mode_alloc_free() {
    for link in LinkMode::ALL {
        run_scenario(Movement::Drunk, link);
    }
}
