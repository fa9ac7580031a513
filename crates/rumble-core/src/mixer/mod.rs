//! Sample mixer
//!
//! Owns every playback cursor and renders one buffer at a time. The idle,
//! rev and jake layers advance at an RPM-derived rate; knocks and effects
//! play at unity rate. All volume math is integer percent.
//!
//! ```text
//!  idle ──┐ ×crossfade ×throttle fader ×shift dip
//!  rev  ──┤
//!  knock ─┤ fired on idle-loop segment boundaries, ×throttle fader
//!  jake ──┤ braking overlay
//!  fx×6 ──┘ unity rate                     ──► clamp i16 ──► L = R
//! ```

mod crossfade;
mod cursor;
mod settings;
mod shutdown;

pub use crossfade::*;
pub use cursor::*;
pub use settings::*;
pub use shutdown::*;

use crate::effects::{EffectChannel, Playback};
use crate::sound_bank::{ProfileId, SoundBank, SoundSample};
use crate::types::{BankSample, StereoFrame, MAX_RPM};

/// Jake brake is inaudible below this RPM
pub const JAKE_MIN_RPM: u16 = 150;

/// Fixed jake brake level before master volume, percent
pub const JAKE_VOLUME: i32 = 180;

/// Knocks per idle loop that get the V8 accent (0-based)
const V8_ACCENT_KNOCKS: [u8; 2] = [3, 7];

/// Engine-side values sampled once per buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineMix {
    pub rpm: u16,
    /// Idle layer loudness from the throttle fader, percent
    pub idle_throttle_pct: u16,
    /// Rev layer loudness from the throttle fader, percent
    pub rev_throttle_pct: u16,
    pub jake_active: bool,
    /// Gear-shift dip, 100 right after a shift down to 0
    pub shift_attenuation: u16,
    pub horn_held: bool,
}

impl Default for EngineMix {
    fn default() -> Self {
        Self {
            rpm: crate::types::IDLE_RPM,
            idle_throttle_pct: 100,
            rev_throttle_pct: 80,
            jake_active: false,
            shift_attenuation: 0,
            horn_held: false,
        }
    }
}

/// Scale an 8-bit sample to 16-bit and apply a percent volume
#[inline]
fn scale(sample: BankSample, volume_pct: i32) -> i32 {
    ((sample as i32) << 8) * volume_pct / 100
}

#[derive(Debug, Clone, Copy, Default)]
struct EffectVoice {
    cursor: Cursor,
    active: bool,
}

impl EffectVoice {
    /// Next sample of this channel, or `None` once a one-shot has finished
    #[inline]
    fn next(&mut self, sample: &SoundSample, playback: Playback, held: bool) -> Option<BankSample> {
        let len = sample.len();
        if len == 0 {
            self.active = false;
            return None;
        }

        match playback {
            Playback::Loop if self.cursor.index() >= len => self.cursor.wrap(len),
            Playback::Sustain if held => {
                if let Some(region) = sample.loop_region() {
                    if self.cursor.index() >= region.end {
                        self.cursor.rewind(region.end - region.start);
                    }
                }
            }
            _ => {}
        }

        let index = self.cursor.index();
        if index >= len {
            self.active = false;
            return None;
        }
        self.cursor.advance(UNITY);
        Some(sample.at(index))
    }
}

/// Per-buffer effect plan: which sample, how loud
#[derive(Clone, Copy)]
struct EffectPlan<'a> {
    sample: &'a SoundSample,
    volume: i32,
    playback: Playback,
}

#[derive(Debug, Clone, Default)]
pub struct Mixer {
    idle: Cursor,
    rev: Cursor,
    knock: Cursor,
    knock_active: bool,
    knock_gain: i32,
    /// Knocks fired in the current idle loop
    knock_count: u8,
    /// Cylinder segment the idle cursor was last in
    knock_segment: usize,
    jake: Cursor,
    start: Cursor,
    effects: [EffectVoice; EffectChannel::COUNT],
}

impl Mixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewind every stream and silence every effect
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Restart an effect from the top
    pub fn trigger(&mut self, channel: EffectChannel) {
        let voice = &mut self.effects[channel.index()];
        voice.cursor.reset();
        voice.active = true;
    }

    /// Silence an effect immediately
    pub fn silence(&mut self, channel: EffectChannel) {
        self.effects[channel.index()].active = false;
    }

    pub fn is_active(&self, channel: EffectChannel) -> bool {
        self.effects[channel.index()].active
    }

    /// Rewind the start sample before a new start
    pub fn rewind_start(&mut self) {
        self.start.reset();
    }

    /// Render the running engine into `out`
    pub fn mix_running(
        &mut self,
        bank: &SoundBank,
        profile_id: ProfileId,
        settings: &MixSettings,
        engine: &EngineMix,
        out: &mut [StereoFrame],
    ) {
        let profile = bank.profile(profile_id);
        let master = settings.master_volume as i32;
        let xf = crossfade(engine.rpm, settings.rev_switch_point, settings.idle_end_point);
        let shift_pct = 100 - engine.shift_attenuation.min(100) as i32 / 2;

        let idle_vol = settings.idle_volume as i32 * master * engine.idle_throttle_pct as i32 / 10_000
            * xf.idle as i32
            / 100
            * shift_pct
            / 100;
        let rev_vol = settings.rev_volume as i32 * master * engine.rev_throttle_pct as i32 / 10_000
            * xf.rev as i32
            / 100
            * shift_pct
            / 100;
        let knock_base = settings.knock_volume as i32 * master * engine.idle_throttle_pct as i32 / 10_000;

        let increment = rpm_increment(engine.rpm);
        let knock_spacing = profile.knock_spacing(settings.knock_interval);
        let knock_enabled = knock_spacing > 0 && engine.rpm >= settings.knock_start_point;

        let jake = profile
            .jake_brake
            .as_ref()
            .filter(|s| !s.is_empty())
            .filter(|_| engine.jake_active && settings.jake_brake_enabled && engine.rpm > JAKE_MIN_RPM);
        let jake_vol = JAKE_VOLUME * master / 100;

        let mut plans: [Option<EffectPlan>; EffectChannel::COUNT] = [None; EffectChannel::COUNT];
        for channel in EffectChannel::ALL {
            let voice = &mut self.effects[channel.index()];
            if !voice.active {
                continue;
            }
            let playback = channel.playback();
            if !settings.effect_enabled(channel) {
                if playback == Playback::OneShot {
                    voice.active = false;
                }
                continue;
            }
            let mut volume = settings.effect_volume(channel) as i32 * master / 100;
            if channel == EffectChannel::Wastegate {
                volume = volume * (50 + engine.rpm as i32 * 50 / MAX_RPM as i32) / 100;
            }
            plans[channel.index()] = Some(EffectPlan {
                sample: bank.effect_sample(profile_id, channel, settings.horn),
                volume,
                playback,
            });
        }

        let idle_len = profile.idle.len();
        let rev_len = profile.rev.len();

        for frame in out.iter_mut() {
            let mut mix = 0i32;

            if idle_len > 0 {
                mix += scale(profile.idle.at(self.idle.index()), idle_vol);
            }
            if rev_len > 0 {
                mix += scale(profile.rev.at(self.rev.index()), rev_vol);
            }

            if self.knock_active {
                let index = self.knock.index();
                if index >= profile.knock.len() {
                    self.knock_active = false;
                } else {
                    mix += scale(profile.knock.at(index), self.knock_gain);
                    self.knock.advance(UNITY);
                }
            }

            if let Some(sample) = jake {
                if self.jake.index() >= sample.len() {
                    self.jake.wrap(sample.len());
                }
                mix += scale(sample.at(self.jake.index()), jake_vol);
                self.jake.advance(increment);
            }

            for (voice, plan) in self.effects.iter_mut().zip(plans.iter()) {
                let Some(plan) = plan else { continue };
                if !voice.active {
                    continue;
                }
                if let Some(s) = voice.next(plan.sample, plan.playback, engine.horn_held) {
                    mix += scale(s, plan.volume);
                }
            }

            if idle_len > 0 {
                self.idle.advance(increment);
                if self.idle.index() >= idle_len {
                    self.idle.wrap(idle_len);
                    self.knock_count = 0;
                }
                if knock_spacing > 0 {
                    let segment = self.idle.index() / knock_spacing;
                    if segment != self.knock_segment {
                        self.knock_segment = segment;
                        if knock_enabled {
                            self.fire_knock(knock_base, settings.v8_mode);
                        }
                    }
                }
            }
            if rev_len > 0 {
                self.rev.advance(increment);
                if self.rev.index() >= rev_len {
                    self.rev.wrap(rev_len);
                }
            }

            *frame = StereoFrame::from_mix(mix);
        }
    }

    fn fire_knock(&mut self, knock_base: i32, v8_mode: bool) {
        let accent = v8_mode && V8_ACCENT_KNOCKS.contains(&self.knock_count);
        self.knock_gain = if accent { knock_base / 2 } else { knock_base / 4 };
        self.knock.reset();
        self.knock_active = true;
        self.knock_count = self.knock_count.wrapping_add(1);
    }

    /// Render the start sample; returns true once it has played out
    pub fn mix_start(&mut self, start: Option<&SoundSample>, settings: &MixSettings, out: &mut [StereoFrame]) -> bool {
        let Some(sample) = start.filter(|s| !s.is_empty()) else {
            out.fill(StereoFrame::silence());
            return true;
        };
        let volume = settings.start_volume as i32 * settings.master_volume as i32 / 100;
        let mut finished = false;
        for frame in out.iter_mut() {
            let index = self.start.index();
            if index >= sample.len() {
                finished = true;
                *frame = StereoFrame::silence();
                continue;
            }
            *frame = StereoFrame::from_mix(scale(sample.at(index), volume));
            self.start.advance(UNITY);
        }
        finished || self.start.index() >= sample.len()
    }

    /// Render the shutdown fade: idle layer only, slowed and attenuated
    pub fn mix_shutdown(&mut self, idle: &SoundSample, settings: &MixSettings, fade: &ShutdownFade, out: &mut [StereoFrame]) {
        let len = idle.len();
        if len == 0 {
            out.fill(StereoFrame::silence());
            return;
        }
        let increment = UNITY * 100 / fade.speed_pct().max(1) as u64;
        let volume = settings.idle_volume as i32 * settings.master_volume as i32 / 100 / fade.attenuation().max(1) as i32;
        for frame in out.iter_mut() {
            *frame = StereoFrame::from_mix(scale(idle.at(self.idle.index()), volume));
            self.idle.advance(increment);
            if self.idle.index() >= len {
                self.idle.wrap(len);
            }
        }
    }
}
