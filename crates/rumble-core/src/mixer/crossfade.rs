//! Idle/rev layering and throttle-dependent loudness

/// Idle share at and below the rev switch point
pub const IDLE_PROPORTION_MAX: u16 = 90;

/// Idle and rev layer weights, 0..=100 each
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crossfade {
    pub idle: u16,
    pub rev: u16,
}

/// Layer weights for `rpm`
///
/// The idle layer fades from 90 % at `rev_switch_point` to 0 at
/// `idle_end_point`; the rev layer takes the remainder.
pub fn crossfade(rpm: u16, rev_switch_point: u16, idle_end_point: u16) -> Crossfade {
    let idle = if rpm <= rev_switch_point {
        IDLE_PROPORTION_MAX
    } else if rpm >= idle_end_point || idle_end_point <= rev_switch_point {
        0
    } else {
        let span = (idle_end_point - rev_switch_point) as u32;
        let into = (rpm - rev_switch_point) as u32;
        (IDLE_PROPORTION_MAX as u32 - IDLE_PROPORTION_MAX as u32 * into / span) as u16
    };
    Crossfade { idle, rev: 100 - idle }
}

/// Full-scale value of the throttle fader
pub const FADER_MAX: i16 = 500;

/// Fader movement per control tick
pub const FADER_STEP: i16 = 2;

/// Slow follower of effective throttle that makes the engine louder under
/// load without touching pitch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThrottleFader {
    value: i16,
}

impl ThrottleFader {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn value(&self) -> i16 {
        self.value
    }

    /// Move at most [`FADER_STEP`] toward `effective_throttle`
    pub fn step(&mut self, effective_throttle: i16) -> i16 {
        let target = effective_throttle.clamp(0, FADER_MAX);
        self.value = crate::drivetrain::approach(self.value, target, FADER_STEP);
        self.value
    }

    /// Idle layer loudness, 100 % closed to 250 % wide open
    pub fn idle_volume_pct(&self) -> u16 {
        (100 + self.value as i32 * 150 / FADER_MAX as i32) as u16
    }

    /// Rev layer loudness, 80 % closed to 220 % wide open
    pub fn rev_volume_pct(&self) -> u16 {
        (80 + self.value as i32 * 140 / FADER_MAX as i32) as u16
    }

    pub fn reset(&mut self) {
        self.value = 0;
    }
}
