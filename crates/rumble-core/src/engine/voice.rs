//! Audio half of the engine
//!
//! Owned by the audio task. Everything here runs once per buffer and never
//! allocates, locks or blocks.

use std::sync::Arc;

use super::command::EngineCommand;
use super::rpm::RpmSmoother;
use super::shared::EngineShared;
use super::{EngineState, SharedClock};
use crate::effects::{EffectChannel, Playback};
use crate::mixer::{EngineMix, MixSettings, Mixer, ShutdownFade};
use crate::sound_bank::{ProfileId, SoundBank};
use crate::types::{StereoFrame, IDLE_RPM};

/// How long the gear-shift dip takes to recover
pub const SHIFT_DIP_MS: u64 = 200;

/// Result of rendering one buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Engine is off; the buffer holds silence and need not be written
    Silent,
    Audio,
}

pub struct EngineVoice {
    bank: Arc<SoundBank>,
    shared: Arc<EngineShared>,
    clock: SharedClock,
    commands: rtrb::Consumer<EngineCommand>,
    mixer: Mixer,
    smoother: RpmSmoother,
    settings: MixSettings,
    profile: ProfileId,
    /// State this voice last acted on
    phase: EngineState,
    fade: Option<ShutdownFade>,
}

impl EngineVoice {
    pub(crate) fn new(
        bank: Arc<SoundBank>,
        shared: Arc<EngineShared>,
        clock: SharedClock,
        commands: rtrb::Consumer<EngineCommand>,
        settings: MixSettings,
        profile: ProfileId,
    ) -> Self {
        Self {
            bank,
            shared,
            clock,
            commands,
            mixer: Mixer::new(),
            smoother: RpmSmoother::new(),
            settings,
            profile,
            phase: EngineState::Off,
            fade: None,
        }
    }

    /// Nothing to play and nothing pending
    pub fn is_idle(&self) -> bool {
        self.phase == EngineState::Off && self.shared.state() == EngineState::Off
    }

    pub fn settings(&self) -> &MixSettings {
        &self.settings
    }

    pub fn profile(&self) -> ProfileId {
        self.profile
    }

    pub fn shared(&self) -> &Arc<EngineShared> {
        &self.shared
    }

    /// Shutdown fade in progress, if any
    pub fn fade(&self) -> Option<&ShutdownFade> {
        self.fade.as_ref()
    }

    /// Render one buffer
    pub fn render(&mut self, out: &mut [StereoFrame]) -> RenderOutcome {
        self.drain_commands();
        let now = self.clock.now_ms();
        let state = self.shared.state();
        if state != self.phase {
            self.enter(state, now);
        }

        match self.phase {
            EngineState::Off => {
                out.fill(StereoFrame::silence());
                RenderOutcome::Silent
            }
            EngineState::Starting => {
                let profile = self.bank.profile(self.profile);
                let finished = self.mixer.mix_start(profile.start.as_ref(), &self.settings, out);
                if finished && self.shared.transition(EngineState::Starting, EngineState::Running) {
                    log::info!("Engine running ({})", profile.name());
                    self.smoother.reset();
                    self.shared.set_current_rpm(IDLE_RPM);
                    self.mixer.reset();
                    self.phase = EngineState::Running;
                }
                RenderOutcome::Audio
            }
            EngineState::Running => {
                self.mix_running(now, out);
                RenderOutcome::Audio
            }
            EngineState::Stopping => self.mix_stopping(now, out),
        }
    }

    fn drain_commands(&mut self) {
        while let Ok(cmd) = self.commands.pop() {
            match cmd {
                EngineCommand::SetProfile(id) => {
                    self.profile = id;
                    self.mixer.reset();
                    self.shared.set_profile(id);
                }
                EngineCommand::ApplySettings(settings) => self.settings = settings,
            }
        }
    }

    fn enter(&mut self, state: EngineState, now: u64) {
        log::debug!("Voice {} -> {}", self.phase, state);
        match state {
            EngineState::Starting => {
                self.mixer.rewind_start();
                self.fade = None;
            }
            EngineState::Stopping => self.fade = Some(ShutdownFade::new(now)),
            EngineState::Off => {
                self.mixer.reset();
                self.fade = None;
            }
            EngineState::Running => {}
        }
        self.phase = state;
    }

    fn mix_running(&mut self, now: u64, out: &mut [StereoFrame]) {
        let rpm = self.smoother.on_buffer(self.shared.target_rpm(), &self.settings);
        self.shared.set_current_rpm(rpm);

        self.sync_effects_in();

        let (idle_throttle_pct, rev_throttle_pct) = self.shared.throttle_volumes();
        let engine = EngineMix {
            rpm,
            idle_throttle_pct,
            rev_throttle_pct,
            jake_active: self.shared.jake_active(),
            shift_attenuation: shift_attenuation(self.shared.shift_started_ms(), now),
            horn_held: self.shared.horn_held(),
        };
        self.mixer.mix_running(&self.bank, self.profile, &self.settings, &engine, out);

        self.sync_effects_out();
    }

    fn mix_stopping(&mut self, now: u64, out: &mut [StereoFrame]) -> RenderOutcome {
        let fade = self.fade.get_or_insert_with(|| ShutdownFade::new(now));
        fade.advance(now);
        if fade.is_done() {
            if self.shared.transition(EngineState::Stopping, EngineState::Off) {
                log::info!("Engine off");
            }
            self.shared.reset_drivetrain();
            self.smoother.reset();
            self.mixer.reset();
            self.fade = None;
            self.phase = EngineState::Off;
            out.fill(StereoFrame::silence());
            return RenderOutcome::Silent;
        }
        let fade = *fade;
        let idle = &self.bank.profile(self.profile).idle;
        self.mixer.mix_shutdown(idle, &self.settings, &fade, out);
        RenderOutcome::Audio
    }

    /// Pick up triggers and level changes from the control side
    fn sync_effects_in(&mut self) {
        for channel in EffectChannel::ALL {
            let slot = self.shared.effect(channel);
            if slot.take_restart() {
                self.mixer.trigger(channel);
            } else if channel.playback() == Playback::Loop && !slot.is_active() {
                self.mixer.silence(channel);
            }
        }
    }

    /// Report finished one-shots back so the control side sees them clear
    fn sync_effects_out(&mut self) {
        for channel in EffectChannel::ALL {
            if channel.playback() != Playback::Loop {
                self.shared.effect(channel).set_active(self.mixer.is_active(channel));
            }
        }
    }
}

/// Gear-shift dip: 100 at the shift, linearly back to 0 after [`SHIFT_DIP_MS`]
pub fn shift_attenuation(shift_started_ms: Option<u64>, now_ms: u64) -> u16 {
    match shift_started_ms {
        Some(started) => {
            let elapsed = now_ms.saturating_sub(started);
            if elapsed < SHIFT_DIP_MS {
                (100 - elapsed * 100 / SHIFT_DIP_MS) as u16
            } else {
                0
            }
        }
        None => 0,
    }
}
