//! Effect trigger detector
//!
//! Turns continuous vehicle signals into discrete audio events. Runs on the
//! control loop; its output is a set of edges and levels that the engine
//! forwards to the mixer's effect slots.

/// Peak |velocity| needed before a stop hisses the air brake
pub const AIR_BRAKE_MIN_PEAK: i16 = 100;

/// Effective throttle that counts as "boost built"
pub const WASTEGATE_BOOST_THRESHOLD: i16 = 150;

/// Drop in effective throttle within one tick that dumps the boost
pub const WASTEGATE_MIN_DROP: i16 = 80;

/// Throttle above this is tracked as the pre-drop value
pub const WASTEGATE_TRACK_ABOVE: i16 = 80;

/// Throttle below this forgets any tracked boost
pub const WASTEGATE_RESET_BELOW: i16 = 30;

pub const WASTEGATE_COOLDOWN_MS: u64 = 1000;

/// Signals sampled once per control tick
#[derive(Debug, Clone, Copy, Default)]
pub struct TriggerInput {
    /// 0..500
    pub effective_throttle: i16,
    /// Simulated velocity, -1000..1000
    pub velocity: i16,
    pub motor_stopped: bool,
    pub in_reverse: bool,
    pub running: bool,
}

/// Edges (`air_brake`, `wastegate`) and levels (`reverse_beep`) for this tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerOutput {
    pub air_brake: bool,
    pub wastegate: bool,
    pub reverse_beep: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TriggerDetector {
    air_brake_peak: i16,
    was_moving: bool,
    boost_throttle: i16,
    last_wastegate_ms: Option<u64>,
}

impl TriggerDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, input: &TriggerInput, now_ms: u64) -> TriggerOutput {
        TriggerOutput {
            air_brake: self.detect_air_brake(input),
            wastegate: self.detect_wastegate(input.effective_throttle, now_ms),
            reverse_beep: input.in_reverse && input.running,
        }
    }

    fn detect_air_brake(&mut self, input: &TriggerInput) -> bool {
        if !input.motor_stopped {
            if !self.was_moving {
                self.air_brake_peak = 0;
                self.was_moving = true;
            }
            self.air_brake_peak = self.air_brake_peak.max(input.velocity.saturating_abs());
            return false;
        }

        if !self.was_moving {
            return false;
        }
        self.was_moving = false;
        let peak = std::mem::take(&mut self.air_brake_peak);
        if peak > AIR_BRAKE_MIN_PEAK {
            log::debug!("air brake: stopped after peak velocity {}", peak);
            true
        } else {
            false
        }
    }

    fn detect_wastegate(&mut self, throttle: i16, now_ms: u64) -> bool {
        let tracked = self.boost_throttle;
        let cooled = self
            .last_wastegate_ms
            .map_or(true, |t| now_ms.saturating_sub(t) >= WASTEGATE_COOLDOWN_MS);

        if tracked > WASTEGATE_BOOST_THRESHOLD && tracked - throttle > WASTEGATE_MIN_DROP && cooled {
            log::debug!("wastegate: throttle dropped {} -> {}", tracked, throttle);
            self.last_wastegate_ms = Some(now_ms);
            self.boost_throttle = 0;
            return true;
        }

        if throttle > WASTEGATE_TRACK_ABOVE {
            self.boost_throttle = throttle;
        } else if throttle < WASTEGATE_RESET_BELOW {
            self.boost_throttle = 0;
        }
        false
    }

    /// Forget all tracking, e.g. on engine start
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
