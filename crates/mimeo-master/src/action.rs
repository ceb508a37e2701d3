//! Operator actions: parsed from text commands, sent to a live session or
//! scheduled in an offline render script.

use std::str::FromStr;

use mimeo_engine::{Channel, LinkMode, Movement, StereoLooper, WriteMode};

use crate::controls::SharedControls;
use crate::error::MasterError;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Action {
    ToggleFreeze,
    StopBuffering,
    ResetBuffer,
    Restart,
    ToggleDirection,
    Speed(f32),
    Movement(Movement),
    Link(LinkMode),
    WriteMode(WriteMode),
    Gain(f32),
    Mix(f32),
    Feedback(f32),
    Filter(f32),
    LoopStart(f32),
    /// `None` loops the whole recording.
    LoopLength(Option<f32>),
    Looping(bool),
}

impl Action {
    /// Hand the action to a running session.
    pub fn send(self, controls: &SharedControls) {
        match self {
            Action::ToggleFreeze => controls.request_toggle_freeze(),
            Action::StopBuffering => controls.request_stop_buffering(),
            Action::ResetBuffer => controls.request_reset_buffer(),
            Action::Restart => controls.request_restart(),
            Action::ToggleDirection => controls.request_toggle_direction(),
            Action::Speed(x) => controls.set_speed(x),
            Action::Movement(m) => controls.set_movement(m),
            Action::Link(m) => controls.set_link(m),
            Action::WriteMode(m) => controls.set_write_mode(m),
            Action::Gain(x) => controls.set_gain(x),
            Action::Mix(x) => controls.set_mix(x),
            Action::Feedback(x) => controls.set_feedback(x),
            Action::Filter(hz) => controls.set_filter(hz),
            Action::LoopStart(s) => controls.set_loop_start_seconds(s),
            Action::LoopLength(s) => controls.set_loop_length_seconds(s),
            Action::Looping(on) => controls.set_looping(on),
        }
    }

    /// Apply directly to a looper owned by the caller. Transitions are
    /// queued and take effect at the next block, as in a live session.
    pub fn apply(self, looper: &mut StereoLooper<'_>) {
        match self {
            Action::ToggleFreeze => looper.request_toggle_freeze(),
            Action::StopBuffering => looper.request_stop_buffering(),
            Action::ResetBuffer => looper.request_reset_buffer(),
            Action::Restart => looper.request_restart(),
            Action::ToggleDirection => looper.request_toggle_direction(),
            Action::Speed(x) => looper.set_speed(Channel::Both, x),
            Action::Movement(m) => looper.set_movement(Channel::Both, m),
            Action::Link(m) => looper.set_link_mode(m),
            Action::WriteMode(m) => looper.set_write_mode(Channel::Both, m),
            Action::Gain(x) => looper.set_gain(x),
            Action::Mix(x) => looper.set_mix(x),
            Action::Feedback(x) => looper.set_feedback(x),
            Action::Filter(hz) => looper.set_filter(hz),
            Action::LoopStart(s) => looper.set_loop_start_seconds(Channel::Both, s),
            Action::LoopLength(Some(s)) => looper.set_loop_length_seconds(Channel::Both, s),
            Action::LoopLength(None) => looper.set_loop_length(Channel::Both, usize::MAX),
            Action::Looping(on) => looper.set_looping(Channel::Both, on),
        }
    }
}

fn number(name: &'static str, arg: Option<&str>) -> Result<f32, MasterError> {
    let invalid = || MasterError::InvalidValue {
        name,
        value: arg.unwrap_or_default().to_string(),
    };
    let x: f32 = arg.ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
    if x.is_finite() {
        Ok(x)
    } else {
        Err(invalid())
    }
}

fn named<T>(
    name: &'static str,
    arg: Option<&str>,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T, MasterError> {
    arg.and_then(parse).ok_or_else(|| MasterError::InvalidValue {
        name,
        value: arg.unwrap_or_default().to_string(),
    })
}

impl FromStr for Action {
    type Err = MasterError;

    /// `freeze`, `stop`, `reset`, `restart`, `reverse`, `speed X`,
    /// `movement M`, `link M`, `write M`, `gain G`, `mix M`, `feedback F`,
    /// `filter HZ`, `start S`, `length S|all`, `loop on|off`.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let command = words.next().unwrap_or_default().to_ascii_lowercase();
        let arg = words.next();
        let action = match command.as_str() {
            "freeze" => Action::ToggleFreeze,
            "stop" => Action::StopBuffering,
            "reset" => Action::ResetBuffer,
            "restart" => Action::Restart,
            "reverse" => Action::ToggleDirection,
            "speed" => Action::Speed(number("speed", arg)?),
            "movement" => Action::Movement(named("movement", arg, Movement::from_name)?),
            "link" => Action::Link(named("link", arg, LinkMode::from_name)?),
            "write" => Action::WriteMode(named("write", arg, WriteMode::from_name)?),
            "gain" => Action::Gain(number("gain", arg)?),
            "mix" => Action::Mix(number("mix", arg)?),
            "feedback" => Action::Feedback(number("feedback", arg)?),
            "filter" => Action::Filter(number("filter", arg)?),
            "start" => Action::LoopStart(number("start", arg)?),
            "length" if arg.is_some_and(|a| a.eq_ignore_ascii_case("all")) => {
                Action::LoopLength(None)
            }
            "length" => Action::LoopLength(Some(number("length", arg)?)),
            "loop" => Action::Looping(named("loop", arg, |a| match a {
                "on" => Some(true),
                "off" => Some(false),
                _ => None,
            })?),
            _ => return Err(MasterError::UnknownCommand(line.trim().to_string())),
        };
        Ok(action)
    }
}

/// An action scheduled at a time offset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cue {
    pub at_seconds: f32,
    pub action: Action,
}

impl FromStr for Cue {
    type Err = MasterError;

    /// `<seconds> <command...>`, e.g. `2.5 movement pendulum`.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (time, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let at_seconds = number("cue time", Some(time))?;
        Ok(Cue {
            at_seconds: at_seconds.max(0.0),
            action: rest.parse()?,
        })
    }
}

/// Parse a cue script: one cue per line, `#` starts a comment. Cues are
/// returned sorted by time; equal times keep their order.
pub fn parse_script(text: &str) -> Result<Vec<Cue>, MasterError> {
    let mut cues = text
        .lines()
        .map(|l| l.split('#').next().unwrap_or_default().trim())
        .filter(|l| !l.is_empty())
        .map(str::parse)
        .collect::<Result<Vec<Cue>, _>>()?;
    cues.sort_by(|a, b| a.at_seconds.total_cmp(&b.at_seconds));
    Ok(cues)
}
