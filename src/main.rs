//! mimeo CLI: live looping on the default audio devices and offline WAV rendering.
//!
//! Usage:
//!   mimeo live [--slot N] [--settings DIR] [--save] [options]
//!   mimeo render <in.wav> <out.wav> [--stop-at S] [--freeze-at S] [--tail S] [--script FILE] [options]
//!   mimeo slots [--settings DIR]
//!
//! Options: --speed X, --movement M, --link M, --write M, --gain G, --mix M,
//! --feedback F, --filter HZ, --loop S, --buffer S.

use std::io::{self, BufRead, Write};
use std::{env, fs, process};

use mimeo_master::{
    load_wav, parse_script, save_wav, Action, Controller, Cue, LinkMode, Movement, Settings,
    SettingsStore, WriteMode, MAX_BUFFER_SECONDS, MIN_BUFFER_SECONDS, SLOT_COUNT,
};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: mimeo <live|render|slots> [args]
  live   [--slot N] [--settings DIR] [--save] [options]
  render <in.wav> <out.wav> [--stop-at S] [--freeze-at S] [--tail S] [--script FILE] [options]
  slots  [--settings DIR]
options: --speed X --movement M --link M --write M --gain G --mix M
         --feedback F --filter HZ --loop S --buffer S";

const DEFAULT_SETTINGS_DIR: &str = "mimeo-settings";

/// Flags that take no value.
const SWITCHES: &[&str] = &["save"];

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = args.first() else {
        fail(USAGE);
    };
    let opts = Options::parse(&args[1..]);

    match command.as_str() {
        "live" => live(&opts),
        "render" => render(&opts),
        "slots" => slots(&opts),
        "-h" | "--help" => println!("{USAGE}"),
        other => fail(&format!("unknown command {other:?}\n{USAGE}")),
    }
}

fn fail(message: &str) -> ! {
    eprintln!("{message}");
    process::exit(1);
}

/// Positional arguments plus `--flag value` pairs, in order.
struct Options {
    positional: Vec<String>,
    flags: Vec<(String, String)>,
}

impl Options {
    fn parse(args: &[String]) -> Self {
        let mut positional = Vec::new();
        let mut flags = Vec::new();
        let mut it = args.iter();
        while let Some(arg) = it.next() {
            match arg.strip_prefix("--") {
                Some(name) if SWITCHES.contains(&name) => {
                    flags.push((name.to_string(), String::new()));
                }
                Some(name) => {
                    let value = it
                        .next()
                        .unwrap_or_else(|| fail(&format!("--{name} needs a value")));
                    flags.push((name.to_string(), value.clone()));
                }
                None => positional.push(arg.clone()),
            }
        }
        Self { positional, flags }
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.flags
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    fn number(&self, name: &str) -> Option<f32> {
        self.get(name).map(|v| {
            v.parse::<f32>()
                .ok()
                .filter(|x| x.is_finite())
                .unwrap_or_else(|| fail(&format!("--{name}: not a number: {v:?}")))
        })
    }

    fn named<T>(&self, name: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
        self.get(name)
            .map(|v| parse(v).unwrap_or_else(|| fail(&format!("--{name}: unknown value {v:?}"))))
    }

    fn store(&self) -> SettingsStore {
        SettingsStore::new(self.get("settings").unwrap_or(DEFAULT_SETTINGS_DIR))
    }

    fn slot(&self) -> Option<usize> {
        self.get("slot").map(|v| {
            v.parse::<usize>()
                .ok()
                .filter(|&s| s < SLOT_COUNT)
                .unwrap_or_else(|| fail(&format!("--slot must be 0..{SLOT_COUNT}")))
        })
    }

    /// Settings from the chosen slot (or defaults), overridden by flags.
    fn settings(&self) -> Settings {
        let mut settings = match self.slot() {
            Some(slot) => self
                .store()
                .load_or_default(slot)
                .unwrap_or_else(|e| fail(&format!("Failed to load slot {slot}: {e}"))),
            None => Settings::default(),
        };
        if let Some(x) = self.number("speed") {
            settings.speed = x;
        }
        if let Some(m) = self.named("movement", Movement::from_name) {
            settings.movement = m;
        }
        if let Some(m) = self.named("link", LinkMode::from_name) {
            settings.link = m;
        }
        if let Some(m) = self.named("write", WriteMode::from_name) {
            settings.write_mode = m;
        }
        if let Some(x) = self.number("gain") {
            settings.gain = x;
        }
        if let Some(x) = self.number("mix") {
            settings.mix = x;
        }
        if let Some(x) = self.number("feedback") {
            settings.feedback = x;
        }
        if let Some(x) = self.number("filter") {
            settings.filter_hz = x;
        }
        if let Some(x) = self.number("loop") {
            settings.loop_length_seconds = Some(x);
        }
        if let Some(x) = self.number("buffer") {
            if !(MIN_BUFFER_SECONDS..=MAX_BUFFER_SECONDS).contains(&x) {
                fail(&format!(
                    "--buffer must be {MIN_BUFFER_SECONDS}..={MAX_BUFFER_SECONDS} seconds"
                ));
            }
            settings.buffer_seconds = x;
        }
        settings
    }
}

fn render(opts: &Options) {
    let [input_path, output_path] = opts.positional.as_slice() else {
        fail(USAGE);
    };

    let input = load_wav(input_path)
        .unwrap_or_else(|e| fail(&format!("Failed to read {input_path}: {e}")));
    println!(
        "Input:    {} ({:.2}s at {} Hz)",
        input_path,
        input.duration_seconds(),
        input.sample_rate
    );

    let mut cues = match opts.get("script") {
        Some(path) => {
            let text = fs::read_to_string(path)
                .unwrap_or_else(|e| fail(&format!("Failed to read {path}: {e}")));
            parse_script(&text).unwrap_or_else(|e| fail(&format!("{path}: {e}")))
        }
        None => Vec::new(),
    };
    if let Some(at_seconds) = opts.number("stop-at") {
        cues.push(Cue { at_seconds, action: Action::StopBuffering });
    }
    if let Some(at_seconds) = opts.number("freeze-at") {
        cues.push(Cue { at_seconds, action: Action::ToggleFreeze });
    }
    cues.sort_by(|a, b| a.at_seconds.total_cmp(&b.at_seconds));
    println!("Cues:     {}", cues.len());

    let tail = opts.number("tail").unwrap_or(0.0);
    let ctrl = Controller::new(opts.settings());
    let frames = ctrl.render(&input, cues, tail);

    save_wav(output_path, &frames, input.sample_rate)
        .unwrap_or_else(|e| fail(&format!("Failed to write {output_path}: {e}")));
    println!("Wrote {} frames to {}", frames.len(), output_path);
}

fn live(opts: &Options) {
    let slot = opts.slot();
    let settings = opts.settings();
    tracing::info!(?slot, buffer_seconds = settings.buffer_seconds, "starting live session");
    let mut ctrl = Controller::new(settings);
    ctrl.start()
        .unwrap_or_else(|e| fail(&format!("Failed to start: {e}")));

    println!("Looping. Commands: freeze, stop, reset, restart, reverse, speed X, movement M,");
    println!("link M, write M, gain G, mix M, feedback F, filter HZ, start S, length S|all,");
    println!("loop on|off, status, save [N], quit");

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let line = line.trim();
        let mut words = line.split_whitespace();
        match words.next() {
            None => {}
            Some("quit" | "exit") => break,
            Some("status") => println!("{}", ctrl.telemetry()),
            Some("save") => {
                let target = words.next().and_then(|w| w.parse().ok()).or(slot).unwrap_or(0);
                match opts.store().save(target, &ctrl.settings()) {
                    Ok(()) => println!("Saved slot {target}"),
                    Err(e) => eprintln!("{e}"),
                }
            }
            Some(_) => match line.parse::<Action>() {
                Ok(action) => {
                    ctrl.send(action);
                    println!("{}", ctrl.telemetry());
                }
                Err(e) => eprintln!("{e}"),
            },
        }
        if !ctrl.is_running() {
            break;
        }
        let _ = io::stdout().flush();
    }

    let result = ctrl.stop();
    if opts.get("save").is_some() {
        let target = slot.unwrap_or(0);
        match opts.store().save(target, &ctrl.settings()) {
            Ok(()) => println!("Saved slot {target}"),
            Err(e) => eprintln!("{e}"),
        }
    }
    if let Err(e) = result {
        fail(&format!("Session failed: {e}"));
    }
    println!("Done.");
}

fn slots(opts: &Options) {
    let store = opts.store();
    let occupied = store.occupied();
    println!("Settings in {}:", store.dir().display());
    for slot in 0..SLOT_COUNT {
        let mark = if occupied.contains(&slot) { "saved" } else { "-" };
        println!("  {slot}: {mark}");
    }
}
