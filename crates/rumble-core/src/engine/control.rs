//! Control half of the engine
//!
//! Owned by whoever runs the ~100 Hz control loop. Holds the drivetrain,
//! the trigger detector and the configuration; publishes results to the
//! audio task through [`EngineShared`] and the command queue.

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use super::command::{CommandSender, EngineCommand};
use super::shared::EngineShared;
use super::{EngineError, EngineResult, EngineState, SharedClock};
use crate::config::{ConfigResult, EngineConfig, PersistHandle, VOLUME_PRESET_COUNT};
use crate::drivetrain::{BrakingOracle, Direction, Transmission, TransmissionInput, NEUTRAL_DEADBAND};
use crate::effects::{EffectChannel, TriggerDetector, TriggerInput};
use crate::mixer::{MixSettings, ThrottleFader};
use crate::sound_bank::{HornType, ProfileId, SoundBank};

/// Poll interval of the blocking start()
pub const START_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Slack on top of the start sample length before start() gives up
pub const START_TIMEOUT_MARGIN_MS: u64 = 2000;

/// Effective throttle and vehicle speed are the raw signal halved, capped here
const HALF_SCALE_MAX: i16 = 500;

/// Jake brake needs this much road speed
const JAKE_MIN_SPEED: i16 = 100;

/// ...and this much engine speed
const JAKE_MIN_CURRENT_RPM: u16 = 200;

pub struct EngineControl {
    bank: Arc<SoundBank>,
    shared: Arc<EngineShared>,
    clock: SharedClock,
    commands: CommandSender,
    config: Mutex<EngineConfig>,
    /// Copy of what the audio task was last sent
    settings: MixSettings,
    persist: Option<PersistHandle>,
    transmission: Transmission,
    triggers: TriggerDetector,
    fader: ThrottleFader,
}

impl EngineControl {
    pub(crate) fn new(
        bank: Arc<SoundBank>,
        shared: Arc<EngineShared>,
        clock: SharedClock,
        commands: CommandSender,
        config: EngineConfig,
    ) -> Self {
        let settings = MixSettings::from(&config);
        Self {
            bank,
            shared,
            clock,
            commands,
            config: Mutex::new(config),
            settings,
            persist: None,
            transmission: Transmission::new(),
            triggers: TriggerDetector::new(),
            fader: ThrottleFader::new(),
        }
    }

    /// Hand config changes to a debounced writer
    pub fn with_persistence(mut self, persist: PersistHandle) -> Self {
        self.persist = Some(persist);
        self
    }

    pub fn shared(&self) -> &Arc<EngineShared> {
        &self.shared
    }

    pub fn bank(&self) -> &Arc<SoundBank> {
        &self.bank
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Start the engine and wait for the start sample to finish
    ///
    /// Blocks the caller, polling every [`START_POLL_INTERVAL`]. Returns
    /// [`EngineError::StartAborted`] if stop() or enable(false) intervenes.
    pub fn start(&mut self) -> EngineResult<()> {
        self.begin_start()?;
        let timeout_ms = self.start_timeout_ms();
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);

        loop {
            match self.shared.state() {
                EngineState::Running => return Ok(()),
                EngineState::Starting => {}
                EngineState::Off | EngineState::Stopping => {
                    log::info!("Engine start aborted");
                    return Err(EngineError::StartAborted);
                }
            }
            if Instant::now() >= deadline {
                if self.shared.transition(EngineState::Starting, EngineState::Off) {
                    log::warn!("Engine start timed out after {} ms", timeout_ms);
                    return Err(EngineError::StartTimeout(timeout_ms));
                }
                // Lost the race with the audio task; re-check its verdict
                continue;
            }
            thread::sleep(START_POLL_INTERVAL);
        }
    }

    /// Request a start without waiting for it
    ///
    /// For callers that drive the audio side themselves. A no-op while the
    /// engine is already starting or running.
    pub fn begin_start(&mut self) -> EngineResult<()> {
        if !self.shared.is_enabled() {
            return Err(EngineError::Disabled);
        }
        loop {
            let state = self.shared.state();
            match state {
                EngineState::Running | EngineState::Starting => return Ok(()),
                EngineState::Off | EngineState::Stopping => {
                    self.reset_drivetrain();
                    if self.shared.transition(state, EngineState::Starting) {
                        log::info!("Engine starting ({})", self.bank.profile(self.get_profile()).name());
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Begin the shutdown fade; no-op unless starting or running
    pub fn stop(&mut self) {
        let stopped = self.shared.transition(EngineState::Running, EngineState::Stopping)
            || self.shared.transition(EngineState::Starting, EngineState::Stopping);
        if stopped {
            log::info!("Engine stopping");
            self.shared.set_horn_held(false);
            self.shared.effect(EffectChannel::ReverseBeep).set_level(false);
        }
    }

    /// Switch the engine sound on or off; switching off fades out first
    pub fn enable(&mut self, enabled: bool) {
        self.shared.set_enabled(enabled);
        if !enabled && matches!(self.shared.state(), EngineState::Running | EngineState::Starting) {
            self.stop();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.is_enabled()
    }

    fn start_timeout_ms(&self) -> u64 {
        let profile = self.bank.profile(self.get_profile());
        profile.start.as_ref().map_or(0, |s| s.duration_ms()) + START_TIMEOUT_MARGIN_MS
    }

    fn reset_drivetrain(&mut self) {
        self.transmission.reset();
        self.triggers.reset();
        self.fader.reset();
        self.shared.reset_drivetrain();
        self.shared.set_horn_held(false);
        for channel in EffectChannel::ALL {
            self.shared.effect(channel).clear();
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Control tick
    // ─────────────────────────────────────────────────────────────────────

    /// One control tick: throttle and velocity in -1000..1000
    ///
    /// Does nothing unless the engine is running.
    pub fn update(&mut self, throttle: i16, velocity: i16, oracle: &impl BrakingOracle) {
        if self.shared.state() != EngineState::Running {
            return;
        }
        let now = self.clock.now_ms();

        let braking = oracle.is_braking();
        let throttle_neutral = (throttle as i32).abs() < NEUTRAL_DEADBAND as i32;
        let effective_throttle = if braking || throttle_neutral {
            0
        } else {
            half_scale(throttle)
        };
        let vehicle_speed = half_scale(velocity);
        let in_reverse =
            oracle.last_direction() == Direction::Reverse || (velocity < -NEUTRAL_DEADBAND && !braking);
        let current_rpm = self.shared.current_rpm();

        let output = self.transmission.update(
            &TransmissionInput {
                effective_throttle,
                vehicle_speed,
                current_rpm,
                braking,
                throttle_neutral,
                in_reverse,
                max_rpm: self.settings.max_rpm(),
            },
            now,
        );
        self.shared.set_target_rpm(output.target_rpm);
        self.shared.set_drivetrain(self.transmission.gear(), self.transmission.load());

        if let Some(shift) = output.shift {
            log::debug!("Gear {} -> {} at {} rpm", shift.from, shift.to, current_rpm);
            self.shared.mark_shift(now);
            self.fire(EffectChannel::GearShift);
        }

        self.fader.step(effective_throttle);
        self.shared
            .set_throttle_volumes(self.fader.idle_volume_pct(), self.fader.rev_volume_pct());

        let jake = self.settings.jake_brake_enabled
            && (braking || (throttle_neutral && vehicle_speed > JAKE_MIN_SPEED))
            && current_rpm > JAKE_MIN_CURRENT_RPM
            && vehicle_speed > JAKE_MIN_SPEED;
        self.shared.set_jake_active(jake);

        let events = self.triggers.update(
            &TriggerInput {
                effective_throttle,
                velocity,
                motor_stopped: oracle.is_motor_stopped(),
                in_reverse,
                running: true,
            },
            now,
        );
        if events.air_brake {
            self.fire(EffectChannel::AirBrake);
        }
        if events.wastegate {
            self.fire(EffectChannel::Wastegate);
        }
        let beep = events.reverse_beep && self.settings.effect_enabled(EffectChannel::ReverseBeep);
        self.shared.effect(EffectChannel::ReverseBeep).set_level(beep);
    }

    /// Trigger a one-shot if its channel is enabled
    fn fire(&self, channel: EffectChannel) {
        if self.settings.effect_enabled(channel) {
            self.shared.effect(channel).trigger();
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Effects
    // ─────────────────────────────────────────────────────────────────────

    /// Press or release the horn; pressing restarts it
    pub fn set_horn(&mut self, active: bool) {
        let was = self.shared.horn_held();
        self.shared.set_horn_held(active);
        if active && !was {
            self.fire(EffectChannel::Horn);
        }
    }

    pub fn play_mode_switch(&mut self) {
        self.fire(EffectChannel::ModeSwitch);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Telemetry
    // ─────────────────────────────────────────────────────────────────────

    pub fn get_rpm(&self) -> u16 {
        self.shared.current_rpm()
    }

    pub fn get_target_rpm(&self) -> u16 {
        self.shared.target_rpm()
    }

    pub fn get_gear(&self) -> u8 {
        self.shared.gear()
    }

    pub fn get_load(&self) -> i16 {
        self.shared.load()
    }

    pub fn get_state(&self) -> EngineState {
        self.shared.state()
    }

    pub fn get_profile(&self) -> ProfileId {
        self.lock_config().profile
    }

    // ─────────────────────────────────────────────────────────────────────
    // Configuration
    // ─────────────────────────────────────────────────────────────────────

    /// Switch sound profile; rejects ids outside the bank
    pub fn set_profile(&mut self, id: u8) -> EngineResult<()> {
        let profile = self.bank.profile_by_index(id)?;
        let (profile_id, cylinders) = (profile.id, profile.cylinder_count);
        log::info!("Sound profile -> {}", profile.name());
        self.apply_config(
            |c| {
                c.profile = profile_id;
                c.knock_interval = cylinders;
            },
            Some(EngineCommand::SetProfile(profile_id)),
        )
    }

    /// Flip between the two master volume levels
    pub fn toggle_volume_level(&mut self) -> EngineResult<()> {
        self.apply_config(|c| c.active_volume_level ^= 1, None)
    }

    /// Load one of the stored presets into the active master level
    pub fn set_volume_preset(&mut self, index: usize) -> EngineResult<()> {
        if index >= VOLUME_PRESET_COUNT {
            return Err(EngineError::InvalidPreset(index));
        }
        self.apply_config(
            |c| {
                let level = c.active_volume_level as usize;
                c.master_volumes[level] = c.volume_presets[index];
            },
            None,
        )
    }

    pub fn set_master_volume(&mut self, level: u8, volume: u16) -> EngineResult<()> {
        if level > 1 {
            return Err(EngineError::InvalidArgument(format!("volume level {level}")));
        }
        self.apply_config(|c| c.master_volumes[level as usize] = volume, None)
    }

    pub fn set_effect_enabled(&mut self, channel: u8, enabled: bool) -> EngineResult<()> {
        let channel = EffectChannel::from_index(channel).ok_or(EngineError::InvalidChannel(channel))?;
        self.apply_config(|c| c.effects[channel.index()].enabled = enabled, None)?;
        if !enabled {
            self.shared.effect(channel).set_level(false);
        }
        Ok(())
    }

    pub fn set_effect_volume(&mut self, channel: u8, volume: u16) -> EngineResult<()> {
        let channel = EffectChannel::from_index(channel).ok_or(EngineError::InvalidChannel(channel))?;
        self.apply_config(|c| c.effects[channel.index()].volume = volume, None)
    }

    pub fn set_horn_type(&mut self, horn: HornType) -> EngineResult<()> {
        self.apply_config(|c| c.horn_type = horn, None)
    }

    pub fn set_jake_brake(&mut self, enabled: bool) -> EngineResult<()> {
        self.apply_config(|c| c.jake_brake_enabled = enabled, None)
    }

    /// Swap in a whole configuration, e.g. from a YAML import
    pub fn replace_config(&mut self, config: EngineConfig) -> EngineResult<()> {
        let profile_change = (config.profile != self.lock_config().profile).then_some(config.profile);
        self.apply_config(|c| *c = config, profile_change.map(EngineCommand::SetProfile))
    }

    /// Snapshot of the current configuration
    pub fn config(&self) -> EngineConfig {
        self.lock_config().clone()
    }

    /// What the mixer is currently playing with
    pub fn settings(&self) -> &MixSettings {
        &self.settings
    }

    /// Write any pending change now
    pub fn flush_config(&self) -> ConfigResult<()> {
        match &self.persist {
            Some(persist) => persist.flush(),
            None => Ok(()),
        }
    }

    fn lock_config(&self) -> MutexGuard<'_, EngineConfig> {
        self.config.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Validate, ship to the audio task, commit, schedule a save
    ///
    /// All or nothing: on error neither the stored config nor the mixer
    /// snapshot changes.
    fn apply_config<F>(&mut self, mutate: F, lead: Option<EngineCommand>) -> EngineResult<()>
    where
        F: FnOnce(&mut EngineConfig),
    {
        let mut guard = self.config.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut next = guard.clone();
        mutate(&mut next);
        next.validate()
            .map_err(|e| EngineError::InvalidArgument(e.to_string()))?;

        let needed = 1 + lead.is_some() as usize;
        if self.commands.slots() < needed {
            log::warn!("Engine command queue full; config change dropped");
            return Err(EngineError::CommandQueueFull);
        }
        let settings = MixSettings::from(&next);
        // Slots were checked above and this is the only producer
        let sent = lead
            .into_iter()
            .chain(std::iter::once(EngineCommand::ApplySettings(settings)))
            .try_for_each(|cmd| self.commands.send(cmd));
        if sent.is_err() {
            return Err(EngineError::CommandQueueFull);
        }

        *guard = next;
        self.settings = settings;
        if let Some(persist) = &self.persist {
            persist.mark_dirty(guard.clone());
        }
        Ok(())
    }
}

#[inline]
fn half_scale(signal: i16) -> i16 {
    ((signal as i32).abs() / 2).min(HALF_SCALE_MAX as i32) as i16
}
