//! Rumble simulator - drive the engine from a scenario file
//!
//! Runs throttle physics, the engine control loop and the audio voice in
//! lock-step on a simulated clock and writes what the engine would have
//! played to a WAV file.
//!
//! ## Usage
//!
//! ```text
//! rumble-sim <scenario.yaml> [--out FILE] [--config FILE] [--tuning FILE]
//!            [--pack DIR] [--state-dir DIR] [--export-config FILE] [--play]
//! ```
//!
//! - `--out`: WAV output (default `rumble.wav`)
//! - `--config`: engine config as YAML
//! - `--tuning`: throttle physics tuning as YAML
//! - `--pack`: custom sound pack directory
//! - `--state-dir`: load and persist the binary engine record there
//! - `--export-config`: write the effective engine config as YAML and exit
//! - `--play`: play live instead of writing a WAV (feature `playback`)

mod output;
mod scenario;

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rumble_core::audio::OutputDevice;
use rumble_core::config::{
    export_config, import_config, load_config, load_engine_config, EngineConfig, FileStorage, PersistHandle,
    DEFAULT_DEBOUNCE, ENGINE_CONFIG_KEY,
};
use rumble_core::drivetrain::{PhysicsTuning, ThrottlePhysics};
use rumble_core::engine::{new_engine, EngineControl, EngineState, ManualClock};
use rumble_core::sound_bank::SoundBank;
use rumble_core::{StereoBuffer, BUFFER_FRAMES, ENGINE_SAMPLE_RATE};

use output::WavOutput;
use scenario::{Action, Event, Scenario};

const USAGE: &str = "usage: rumble-sim <scenario.yaml> [--out FILE] [--config FILE] [--tuning FILE] \
[--pack DIR] [--state-dir DIR] [--export-config FILE] [--play]";

/// Telemetry log interval in simulated time
const REPORT_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Default, PartialEq)]
struct Args {
    scenario: PathBuf,
    out: PathBuf,
    config: Option<PathBuf>,
    tuning: Option<PathBuf>,
    pack: Option<PathBuf>,
    state_dir: Option<PathBuf>,
    export_config: Option<PathBuf>,
    play: bool,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut args = args.into_iter();
    let mut parsed = Args {
        out: PathBuf::from("rumble.wav"),
        ..Args::default()
    };
    let mut scenario = None;

    while let Some(arg) = args.next() {
        let mut value = |flag: &str| args.next().map(PathBuf::from).with_context(|| format!("{flag} needs a value"));
        match arg.as_str() {
            "--out" => parsed.out = value("--out")?,
            "--config" => parsed.config = Some(value("--config")?),
            "--tuning" => parsed.tuning = Some(value("--tuning")?),
            "--pack" => parsed.pack = Some(value("--pack")?),
            "--state-dir" => parsed.state_dir = Some(value("--state-dir")?),
            "--export-config" => parsed.export_config = Some(value("--export-config")?),
            "--play" => parsed.play = true,
            "-h" | "--help" => bail!("{USAGE}"),
            flag if flag.starts_with("--") => bail!("unknown flag {flag}\n{USAGE}"),
            path if scenario.is_none() => scenario = Some(PathBuf::from(path)),
            extra => bail!("unexpected argument {extra}\n{USAGE}"),
        }
    }

    parsed.scenario = match scenario {
        Some(path) => path,
        None if parsed.export_config.is_some() => PathBuf::new(),
        None => bail!("{USAGE}"),
    };
    Ok(parsed)
}

/// Where rendered buffers end up
enum Sink {
    Wav(WavOutput),
    #[cfg(feature = "playback")]
    Live {
        output: rumble_core::audio::CpalOutput,
        _stream: rumble_core::audio::CpalStream,
    },
}

impl Sink {
    fn open(args: &Args) -> Result<Self> {
        if args.play {
            return Self::open_live();
        }
        Ok(Self::Wav(WavOutput::create(&args.out)?))
    }

    #[cfg(feature = "playback")]
    fn open_live() -> Result<Self> {
        // Half a second of queue keeps the simulation paced by the device
        let (output, stream) = rumble_core::audio::open_default_output(ENGINE_SAMPLE_RATE as usize / 2)?;
        log::info!("Playing live at {} Hz", stream.sample_rate());
        Ok(Self::Live { output, _stream: stream })
    }

    #[cfg(not(feature = "playback"))]
    fn open_live() -> Result<Self> {
        bail!("--play needs the `playback` feature")
    }

    fn write(&mut self, buffer: &StereoBuffer) -> Result<()> {
        match self {
            Self::Wav(wav) => wav.write(buffer.as_slice(), Duration::ZERO)?,
            #[cfg(feature = "playback")]
            Self::Live { output, .. } => {
                if let Err(e) = output.write(buffer.as_slice(), Duration::from_secs(1)) {
                    log::warn!("Dropped buffer: {}", e);
                }
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<()> {
        match self {
            Self::Wav(wav) => {
                log::info!(
                    "Wrote {:.1} s of audio",
                    wav.frames() as f64 / ENGINE_SAMPLE_RATE as f64
                );
                wav.finish()
            }
            #[cfg(feature = "playback")]
            Self::Live { .. } => {
                // Let the queue drain before the stream is dropped
                std::thread::sleep(Duration::from_millis(600));
                Ok(())
            }
        }
    }
}

fn main() -> Result<()> {
    // Initialize logger - set RUST_LOG=debug for shift and trigger events
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = parse_args(std::env::args().skip(1))?;

    let mut persist = None;
    let mut config = match &args.state_dir {
        Some(dir) => {
            let mut storage = FileStorage::new(dir).with_context(|| format!("Failed to open state dir {:?}", dir))?;
            let (config, outcome) = load_engine_config(&mut storage, ENGINE_CONFIG_KEY);
            log::info!("Engine record: {:?}", outcome);
            persist = Some(PersistHandle::spawn(Box::new(storage), ENGINE_CONFIG_KEY, DEFAULT_DEBOUNCE)?);
            config
        }
        None => EngineConfig::default(),
    };
    if let Some(path) = &args.config {
        config = import_config(path)?;
    }

    if let Some(path) = &args.export_config {
        export_config(&config, path)?;
        println!("Engine config written to {}", path.display());
        return Ok(());
    }

    let scenario = Scenario::load(&args.scenario)?;
    if let Some(profile) = scenario.profile {
        config.profile = profile;
    }
    let tuning: PhysicsTuning = match &args.tuning {
        Some(path) => load_config(path),
        None => PhysicsTuning::default(),
    };

    let mut bank = SoundBank::builtin();
    if let Some(dir) = &args.pack {
        bank = bank.with_pack(dir)?;
    }

    log::info!(
        "Running '{}' ({} ms, {} profile)",
        scenario.name,
        scenario.duration_ms,
        config.profile.name()
    );

    let clock = ManualClock::new();
    let (control, mut voice) = new_engine(Arc::new(bank), config, Arc::new(clock.clone()));
    let mut control = match persist {
        Some(persist) => control.with_persistence(persist),
        None => control,
    };
    let mut physics = ThrottlePhysics::new(tuning);
    let mut sink = Sink::open(&args)?;
    let mut buffer = StereoBuffer::silence(BUFFER_FRAMES);

    let mut frames_rendered = 0u64;
    let mut last_gear = control.get_gear();
    let mut shifts = 0u32;
    let mut peak_rpm = 0u16;
    let mut peak_level = 0u16;
    let mut t = 0u64;

    while t < scenario.duration_ms {
        for event in scenario.events_between(t, t + scenario.tick_ms) {
            apply_event(&mut control, event);
        }

        let throttle = scenario.throttle_at(t);
        let velocity = physics.apply(throttle);
        control.update(throttle, velocity, &physics);

        let gear = control.get_gear();
        if gear != last_gear {
            log::info!("{:>6} ms  gear {} -> {} at {} rpm", t, last_gear, gear, control.get_rpm());
            shifts += 1;
            last_gear = gear;
        }

        t += scenario.tick_ms;
        clock.set(t);

        let due = t * ENGINE_SAMPLE_RATE as u64 / 1000;
        while frames_rendered + BUFFER_FRAMES as u64 <= due {
            voice.render(buffer.as_mut_slice());
            sink.write(&buffer)?;
            peak_level = peak_level.max(buffer.peak());
            frames_rendered += BUFFER_FRAMES as u64;
        }
        peak_rpm = peak_rpm.max(control.get_rpm());

        if t % REPORT_INTERVAL_MS == 0 {
            log::info!(
                "{:>6} ms  {:<8} throttle {:>5}  velocity {:>5}  rpm {:>3}  gear {}  load {:>3}",
                t,
                control.get_state(),
                throttle,
                velocity,
                control.get_rpm(),
                control.get_gear(),
                control.get_load()
            );
        }
    }

    sink.finish()?;
    control.flush_config()?;

    println!(
        "{}: {} gear changes, peak rpm {}, peak level {:.1} dBFS, final state {}",
        if scenario.name.is_empty() { "scenario" } else { scenario.name.as_str() },
        shifts,
        peak_rpm,
        level_dbfs(peak_level),
        control.get_state()
    );
    Ok(())
}

/// Peak sample magnitude relative to i16 full scale
fn level_dbfs(peak: u16) -> f64 {
    if peak == 0 {
        return f64::NEG_INFINITY;
    }
    20.0 * (peak as f64 / i16::MAX as f64).log10()
}

fn apply_event(control: &mut EngineControl, event: &Event) {
    let result = match event.action {
        Action::Start => control.begin_start(),
        Action::Stop => {
            control.stop();
            Ok(())
        }
        Action::HornOn => {
            control.set_horn(true);
            Ok(())
        }
        Action::HornOff => {
            control.set_horn(false);
            Ok(())
        }
        Action::ModeSwitch => {
            control.play_mode_switch();
            Ok(())
        }
        Action::ToggleVolume => control.toggle_volume_level(),
        Action::Preset => control.set_volume_preset(event.arg as usize),
        Action::Profile => control.set_profile(event.arg),
        Action::JakeOn => control.set_jake_brake(true),
        Action::JakeOff => control.set_jake_brake(false),
    };
    match result {
        Ok(()) => log::debug!("{:>6} ms  {:?}", event.at_ms, event.action),
        Err(e) => log::warn!("{:>6} ms  {:?} rejected: {}", event.at_ms, event.action, e),
    }
    if event.action == Action::Start && control.get_state() == EngineState::Off {
        log::warn!("Engine did not start");
    }
}
