//! Engine state machine
//!
//! One engine is split into two owned halves that share a block of atomics:
//!
//! ```text
//!  control loop (~100 Hz)                      audio task (per buffer)
//!  ┌──────────────────────┐   EngineShared    ┌──────────────────────┐
//!  │ EngineControl        │ ─── atomics ────► │ EngineVoice          │
//!  │  transmission        │ ◄── current rpm ─ │  mixer, rpm smoother │
//!  │  triggers, fader     │                   │  shutdown fade       │
//!  │  config + persist    │ ── commands ────► │  settings snapshot   │
//!  └──────────────────────┘   (rtrb SPSC)     └──────────────────────┘
//! ```
//!
//! The state byte is the handshake: the control side moves OFF → STARTING
//! and RUNNING → STOPPING, the audio side completes STARTING → RUNNING and
//! STOPPING → OFF.

mod clock;
mod command;
mod control;
mod error;
mod rpm;
mod shared;
mod state;
mod voice;

pub use clock::*;
pub use command::*;
pub use control::*;
pub use error::*;
pub use rpm::*;
pub use shared::*;
pub use state::*;
pub use voice::*;

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::mixer::MixSettings;
use crate::sound_bank::SoundBank;

/// Build a linked control/voice pair around one configuration
///
/// An invalid configuration is replaced by the defaults.
pub fn new_engine(bank: Arc<SoundBank>, config: EngineConfig, clock: SharedClock) -> (EngineControl, EngineVoice) {
    let config = match config.validate() {
        Ok(()) => config,
        Err(e) => {
            log::warn!("Engine config rejected ({}), using defaults", e);
            EngineConfig::default()
        }
    };

    let shared = Arc::new(EngineShared::new(config.profile));
    let (producer, consumer) = command_channel();
    let voice = EngineVoice::new(
        Arc::clone(&bank),
        Arc::clone(&shared),
        Arc::clone(&clock),
        consumer,
        MixSettings::from(&config),
        config.profile,
    );
    let control = EngineControl::new(bank, shared, clock, CommandSender::new(producer), config);
    (control, voice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivetrain::{BrakingOracle, Direction};
    use crate::effects::EffectChannel;
    use crate::sound_bank::{HornType, ProfileId};
    use crate::types::{StereoFrame, BUFFER_FRAMES, IDLE_RPM};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    /// Fixed braking/direction answers
    struct Oracle {
        braking: bool,
        direction: Direction,
        stopped: bool,
    }

    impl Oracle {
        fn cruising() -> Self {
            Self { braking: false, direction: Direction::Forward, stopped: false }
        }
    }

    impl BrakingOracle for Oracle {
        fn is_braking(&self) -> bool {
            self.braking
        }
        fn last_direction(&self) -> Direction {
            self.direction
        }
        fn is_motor_stopped(&self) -> bool {
            self.stopped
        }
        fn motor_cutoff(&self) -> i16 {
            30
        }
    }

    fn engine_with(config: EngineConfig) -> (EngineControl, EngineVoice, ManualClock) {
        let clock = ManualClock::new();
        let (control, voice) = new_engine(Arc::new(SoundBank::builtin()), config, Arc::new(clock.clone()));
        (control, voice, clock)
    }

    fn engine() -> (EngineControl, EngineVoice, ManualClock) {
        engine_with(EngineConfig::default())
    }

    fn render(voice: &mut EngineVoice, clock: &ManualClock, ms: u64) -> RenderOutcome {
        let mut buf = vec![StereoFrame::silence(); BUFFER_FRAMES];
        clock.advance(ms);
        voice.render(&mut buf)
    }

    fn run_to_running(control: &mut EngineControl, voice: &mut EngineVoice, clock: &ManualClock) {
        control.begin_start().unwrap();
        for _ in 0..5_000 {
            render(voice, clock, 23);
            if control.get_state() == EngineState::Running {
                return;
            }
        }
        panic!("engine never reached running");
    }

    #[test]
    fn test_start_plays_start_sample_then_runs() {
        let (mut control, mut voice, clock) = engine();
        assert_eq!(control.get_state(), EngineState::Off);
        assert_eq!(render(&mut voice, &clock, 23), RenderOutcome::Silent);

        control.begin_start().unwrap();
        assert_eq!(control.get_state(), EngineState::Starting);
        assert_eq!(render(&mut voice, &clock, 23), RenderOutcome::Audio);
        assert_eq!(control.get_state(), EngineState::Starting, "start sample still playing");

        run_to_running(&mut control, &mut voice, &clock);
        assert_eq!(control.get_rpm(), IDLE_RPM);
        assert_eq!(control.get_gear(), 1);
    }

    #[test]
    fn test_profile_without_start_sample_runs_immediately() {
        let config = EngineConfig {
            profile: ProfileId::UnimogU1000,
            ..EngineConfig::default()
        };
        let (mut control, mut voice, clock) = engine_with(config);
        control.begin_start().unwrap();
        render(&mut voice, &clock, 23);
        assert_eq!(control.get_state(), EngineState::Running);
    }

    #[test]
    fn test_stop_fades_out_then_off() {
        let (mut control, mut voice, clock) = engine();
        run_to_running(&mut control, &mut voice, &clock);

        control.stop();
        assert_eq!(control.get_state(), EngineState::Stopping);

        // One buffer per 100 ms step: the fade deepens every buffer
        let mut renders = 0;
        let mut last_attenuation = 0;
        while control.get_state() == EngineState::Stopping {
            render(&mut voice, &clock, 100);
            renders += 1;
            if let Some(fade) = voice.fade() {
                assert!(fade.attenuation() >= last_attenuation);
                last_attenuation = fade.attenuation();
            }
            assert!(renders <= 25, "fade never finished");
        }
        // Fade armed on the first buffer, speed limit reached 20 steps later
        assert_eq!(renders, 21);
        assert_eq!(control.get_state(), EngineState::Off);
        assert_eq!(control.get_rpm(), IDLE_RPM);
        assert!(voice.is_idle());
    }

    #[test]
    fn test_stop_while_off_is_noop() {
        let (mut control, _voice, _clock) = engine();
        control.stop();
        assert_eq!(control.get_state(), EngineState::Off);
    }

    #[test]
    fn test_start_during_stop_restarts() {
        let (mut control, mut voice, clock) = engine();
        run_to_running(&mut control, &mut voice, &clock);
        control.stop();
        render(&mut voice, &clock, 100);
        control.begin_start().unwrap();
        assert_eq!(control.get_state(), EngineState::Starting);
        run_to_running(&mut control, &mut voice, &clock);
    }

    #[test]
    fn test_disabled_engine_refuses_start() {
        let (mut control, _voice, _clock) = engine();
        control.enable(false);
        assert_eq!(control.begin_start(), Err(EngineError::Disabled));
        assert_eq!(control.get_state(), EngineState::Off);
    }

    #[test]
    fn test_disable_while_running_routes_through_stopping() {
        let (mut control, mut voice, clock) = engine();
        run_to_running(&mut control, &mut voice, &clock);
        control.enable(false);
        assert_eq!(control.get_state(), EngineState::Stopping);
        for _ in 0..30 {
            render(&mut voice, &clock, 100);
        }
        assert_eq!(control.get_state(), EngineState::Off);
    }

    #[test]
    fn test_update_ignored_unless_running() {
        let (mut control, _voice, _clock) = engine();
        control.update(1000, 800, &Oracle::cruising());
        assert_eq!(control.get_gear(), 1);
        assert_eq!(control.get_target_rpm(), IDLE_RPM);
    }

    #[test]
    fn test_update_publishes_drivetrain() {
        let (mut control, mut voice, clock) = engine();
        run_to_running(&mut control, &mut voice, &clock);
        for _ in 0..20 {
            clock.advance(10);
            control.update(1000, 0, &Oracle::cruising());
        }
        assert!(control.get_target_rpm() > IDLE_RPM);
        assert!(control.get_load() > 0);

        for _ in 0..40 {
            render(&mut voice, &clock, 23);
        }
        assert!(control.get_rpm() > IDLE_RPM, "audio side follows the target");
    }

    #[test]
    fn test_reverse_beep_follows_reverse() {
        let (mut control, mut voice, clock) = engine();
        run_to_running(&mut control, &mut voice, &clock);
        let reversing = Oracle { braking: false, direction: Direction::Reverse, stopped: false };
        control.update(-600, -300, &reversing);
        assert_eq!(control.get_gear(), 0);
        let beep = control.shared().effect(EffectChannel::ReverseBeep);
        assert!(beep.is_active());

        let stopped = Oracle { braking: false, direction: Direction::Stopped, stopped: true };
        control.update(0, 0, &stopped);
        assert!(!control.shared().effect(EffectChannel::ReverseBeep).is_active());
        assert_eq!(control.get_gear(), 1);
    }

    #[test]
    fn test_horn_press_restarts_once() {
        let (mut control, _voice, _clock) = engine();
        let shared = std::sync::Arc::clone(control.shared());
        let horn = shared.effect(EffectChannel::Horn);
        control.set_horn(true);
        assert!(horn.take_restart());
        control.set_horn(true);
        assert!(!horn.take_restart(), "holding does not retrigger");
        control.set_horn(false);
        assert!(!control.shared().horn_held());
    }

    #[test]
    fn test_disabled_effect_does_not_trigger() {
        let (mut control, _voice, _clock) = engine();
        control.set_effect_enabled(EffectChannel::ModeSwitch as u8, false).unwrap();
        control.play_mode_switch();
        assert!(!control.shared().effect(EffectChannel::ModeSwitch).take_restart());
        assert_eq!(control.set_effect_enabled(9, true), Err(EngineError::InvalidChannel(9)));
    }

    #[test]
    fn test_set_profile_rejects_unknown_id() {
        let (mut control, _voice, _clock) = engine();
        let before = control.config();
        assert_eq!(control.set_profile(7), Err(EngineError::InvalidProfile(7)));
        assert_eq!(control.config(), before);
    }

    #[test]
    fn test_set_profile_reaches_voice() {
        let (mut control, mut voice, clock) = engine();
        control.set_profile(ProfileId::ManKat as u8).unwrap();
        assert_eq!(control.get_profile(), ProfileId::ManKat);
        assert_eq!(control.config().knock_interval, 8);
        render(&mut voice, &clock, 23);
        assert_eq!(voice.profile(), ProfileId::ManKat);
        assert_eq!(control.shared().profile(), ProfileId::ManKat);
    }

    #[test]
    fn test_volume_presets_and_levels() {
        let (mut control, mut voice, clock) = engine();
        control.set_volume_preset(1).unwrap();
        assert_eq!(control.config().master_volumes[0], 70);
        assert_eq!(control.settings().master_volume, 70);

        control.toggle_volume_level().unwrap();
        assert_eq!(control.config().active_volume_level, 1);
        assert_eq!(control.settings().master_volume, 40);

        assert_eq!(control.set_volume_preset(3), Err(EngineError::InvalidPreset(3)));
        control.set_volume_preset(2).unwrap();
        assert_eq!(control.config().master_volumes, [70, 100]);

        render(&mut voice, &clock, 23);
        assert_eq!(voice.settings().master_volume, 100);
    }

    #[test]
    fn test_replace_config_reaches_voice() {
        let (mut control, mut voice, clock) = engine();
        let next = EngineConfig {
            profile: ProfileId::UnimogU1000,
            knock_interval: 6,
            horn_type: HornType::Air,
            ..EngineConfig::default()
        };
        control.replace_config(next.clone()).unwrap();
        assert_eq!(control.config(), next);

        render(&mut voice, &clock, 23);
        assert_eq!(voice.profile(), ProfileId::UnimogU1000);
        assert_eq!(voice.settings().knock_interval, 6);
        assert_eq!(voice.settings().horn, HornType::Air);
    }

    #[test]
    fn test_effect_volume_and_horn_type_setters() {
        let (mut control, _voice, _clock) = engine();
        control.set_effect_volume(EffectChannel::Horn as u8, 150).unwrap();
        control.set_horn_type(HornType::Compact).unwrap();
        assert_eq!(control.config().effects[EffectChannel::Horn.index()].volume, 150);
        assert_eq!(control.settings().effect_volume(EffectChannel::Horn), 150);
        assert_eq!(control.settings().horn, HornType::Compact);

        assert_eq!(control.set_effect_volume(6, 50), Err(EngineError::InvalidChannel(6)));
        assert!(matches!(control.set_effect_volume(0, 201), Err(EngineError::InvalidArgument(_))));
        assert_eq!(control.config().effects[0].volume, 70);
    }

    #[test]
    fn test_invalid_setter_changes_nothing() {
        let (mut control, _voice, _clock) = engine();
        let before = control.config();
        assert!(matches!(control.set_master_volume(0, 999), Err(EngineError::InvalidArgument(_))));
        assert!(matches!(control.set_master_volume(2, 50), Err(EngineError::InvalidArgument(_))));
        assert_eq!(control.config(), before);
        assert_eq!(*control.settings(), MixSettings::from(&before));
    }

    #[test]
    fn test_full_command_queue_rejects_change() {
        let (mut control, _voice, _clock) = engine();
        // Nobody renders, so nothing drains the queue
        for _ in 0..COMMAND_QUEUE_CAPACITY {
            control.toggle_volume_level().unwrap();
        }
        let level = control.config().active_volume_level;
        assert_eq!(control.toggle_volume_level(), Err(EngineError::CommandQueueFull));
        assert_eq!(control.config().active_volume_level, level);
    }

    #[test]
    fn test_blocking_start_with_audio_thread() {
        let (mut control, mut voice) =
            new_engine(Arc::new(SoundBank::builtin()), EngineConfig::default(), SystemClock::shared());
        let done = Arc::new(AtomicBool::new(false));
        let audio_done = Arc::clone(&done);
        let audio = thread::spawn(move || {
            let mut buf = vec![StereoFrame::silence(); BUFFER_FRAMES];
            while !audio_done.load(Ordering::Relaxed) {
                voice.render(&mut buf);
                thread::sleep(Duration::from_millis(1));
            }
        });

        assert_eq!(control.start(), Ok(()));
        assert_eq!(control.get_state(), EngineState::Running);

        done.store(true, Ordering::Relaxed);
        audio.join().unwrap();
    }

    #[test]
    fn test_blocking_start_times_out_without_audio() {
        let config = EngineConfig {
            profile: ProfileId::UnimogU1000,
            ..EngineConfig::default()
        };
        let (mut control, _voice) = new_engine(Arc::new(SoundBank::builtin()), config, SystemClock::shared());
        assert_eq!(control.start(), Err(EngineError::StartTimeout(START_TIMEOUT_MARGIN_MS)));
        assert_eq!(control.get_state(), EngineState::Off);
    }
}
