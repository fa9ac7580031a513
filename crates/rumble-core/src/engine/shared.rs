//! Lock-free state shared between the control loop and the audio task
//!
//! Every field is an independently meaningful scalar. The control loop
//! writes drivetrain results at ~100 Hz, the audio task reads them once per
//! buffer (~43 Hz) and writes back the smoothed RPM. A reader may see one
//! field a tick newer than another; the worst case is one buffer mixed with
//! slightly stale values, which is inaudible.

use std::sync::atomic::{AtomicBool, AtomicI16, AtomicU16, AtomicU64, AtomicU8, Ordering};

use super::EngineState;
use crate::effects::EffectChannel;
use crate::sound_bank::ProfileId;
use crate::types::IDLE_RPM;

/// Sentinel for "no shift in progress"
const NO_SHIFT: u64 = u64::MAX;

/// Trigger state of one effect channel
///
/// `restart` is the edge: set by the control side, consumed by the mixer.
/// `active` is the level: set on trigger, cleared by the mixer at end of
/// sample (or by the control side for level-driven loops).
#[derive(Debug, Default)]
pub struct EffectSlot {
    active: AtomicBool,
    restart: AtomicBool,
}

impl EffectSlot {
    /// Play from the top
    pub fn trigger(&self) {
        self.active.store(true, Ordering::Relaxed);
        self.restart.store(true, Ordering::Release);
    }

    /// Drive a looping channel from a level; rising edges restart it
    pub fn set_level(&self, on: bool) {
        let was = self.active.swap(on, Ordering::Relaxed);
        if on && !was {
            self.restart.store(true, Ordering::Release);
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    /// Consume a pending restart (audio side)
    #[inline]
    pub fn take_restart(&self) -> bool {
        self.restart.swap(false, Ordering::Acquire)
    }

    /// Mirror the mixer's view back (audio side)
    #[inline]
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Relaxed);
    }

    pub fn clear(&self) {
        self.active.store(false, Ordering::Relaxed);
        self.restart.store(false, Ordering::Relaxed);
    }
}

/// Shared engine state
#[derive(Debug)]
pub struct EngineShared {
    state: AtomicU8,
    enabled: AtomicBool,
    profile: AtomicU8,
    /// Written by the control loop
    target_rpm: AtomicU16,
    /// Written by the audio task after smoothing
    current_rpm: AtomicU16,
    gear: AtomicU8,
    load: AtomicI16,
    idle_throttle_pct: AtomicU16,
    rev_throttle_pct: AtomicU16,
    jake_active: AtomicBool,
    /// Clock time of the last gear change, NO_SHIFT if none pending
    shift_started_ms: AtomicU64,
    horn_held: AtomicBool,
    effects: [EffectSlot; EffectChannel::COUNT],
}

impl EngineShared {
    pub fn new(profile: ProfileId) -> Self {
        Self {
            state: AtomicU8::new(EngineState::Off as u8),
            enabled: AtomicBool::new(true),
            profile: AtomicU8::new(profile as u8),
            target_rpm: AtomicU16::new(IDLE_RPM),
            current_rpm: AtomicU16::new(IDLE_RPM),
            gear: AtomicU8::new(1),
            load: AtomicI16::new(0),
            idle_throttle_pct: AtomicU16::new(100),
            rev_throttle_pct: AtomicU16::new(80),
            jake_active: AtomicBool::new(false),
            shift_started_ms: AtomicU64::new(NO_SHIFT),
            horn_held: AtomicBool::new(false),
            effects: Default::default(),
        }
    }

    #[inline]
    pub fn state(&self) -> EngineState {
        EngineState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move from `from` to `to` only if nobody else moved first
    pub(crate) fn transition(&self, from: EngineState, to: EngineState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn profile(&self) -> ProfileId {
        ProfileId::from_index(self.profile.load(Ordering::Relaxed)).unwrap_or_default()
    }

    pub(crate) fn set_profile(&self, profile: ProfileId) {
        self.profile.store(profile as u8, Ordering::Relaxed);
    }

    #[inline]
    pub fn target_rpm(&self) -> u16 {
        self.target_rpm.load(Ordering::Relaxed)
    }

    pub(crate) fn set_target_rpm(&self, rpm: u16) {
        self.target_rpm.store(rpm, Ordering::Relaxed);
    }

    #[inline]
    pub fn current_rpm(&self) -> u16 {
        self.current_rpm.load(Ordering::Relaxed)
    }

    pub(crate) fn set_current_rpm(&self, rpm: u16) {
        self.current_rpm.store(rpm, Ordering::Relaxed);
    }

    #[inline]
    pub fn gear(&self) -> u8 {
        self.gear.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn load(&self) -> i16 {
        self.load.load(Ordering::Relaxed)
    }

    pub(crate) fn set_drivetrain(&self, gear: u8, load: i16) {
        self.gear.store(gear, Ordering::Relaxed);
        self.load.store(load, Ordering::Relaxed);
    }

    /// Throttle-fader loudness for the idle and rev layers, percent
    #[inline]
    pub fn throttle_volumes(&self) -> (u16, u16) {
        (
            self.idle_throttle_pct.load(Ordering::Relaxed),
            self.rev_throttle_pct.load(Ordering::Relaxed),
        )
    }

    pub(crate) fn set_throttle_volumes(&self, idle_pct: u16, rev_pct: u16) {
        self.idle_throttle_pct.store(idle_pct, Ordering::Relaxed);
        self.rev_throttle_pct.store(rev_pct, Ordering::Relaxed);
    }

    #[inline]
    pub fn jake_active(&self) -> bool {
        self.jake_active.load(Ordering::Relaxed)
    }

    pub(crate) fn set_jake_active(&self, active: bool) {
        self.jake_active.store(active, Ordering::Relaxed);
    }

    /// Clock time of the last gear change, if any
    pub fn shift_started_ms(&self) -> Option<u64> {
        match self.shift_started_ms.load(Ordering::Relaxed) {
            NO_SHIFT => None,
            t => Some(t),
        }
    }

    pub(crate) fn mark_shift(&self, now_ms: u64) {
        self.shift_started_ms.store(now_ms, Ordering::Relaxed);
    }

    #[inline]
    pub fn horn_held(&self) -> bool {
        self.horn_held.load(Ordering::Relaxed)
    }

    pub(crate) fn set_horn_held(&self, held: bool) {
        self.horn_held.store(held, Ordering::Relaxed);
    }

    #[inline]
    pub fn effect(&self, channel: EffectChannel) -> &EffectSlot {
        &self.effects[channel.index()]
    }

    /// Back to the values of a freshly started engine
    pub(crate) fn reset_drivetrain(&self) {
        self.set_target_rpm(IDLE_RPM);
        self.set_current_rpm(IDLE_RPM);
        self.set_drivetrain(1, 0);
        self.set_throttle_volumes(100, 80);
        self.set_jake_active(false);
        self.shift_started_ms.store(NO_SHIFT, Ordering::Relaxed);
    }
}

impl Default for EngineShared {
    fn default() -> Self {
        Self::new(ProfileId::default())
    }
}
