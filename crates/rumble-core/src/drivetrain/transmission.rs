//! Transmission controller
//!
//! A 3-speed torque-converter automatic plus reverse. Below the clutch
//! engaging point RPM follows throttle (converter slip); above it RPM follows
//! road speed through the gear ratio, plus slip that grows with load.
//!
//! Shift points are interpolated from engine load rather than looked up, so a
//! heavy foot holds gears longer and a light one shifts early.

use crate::types::{IDLE_RPM, MAX_RPM};

/// Gear ratios ×10, indexed by gear (0 = reverse)
pub const GEAR_RATIOS: [i32; 4] = [10, 25, 15, 10];

/// Highest forward gear
pub const TOP_GEAR: u8 = 3;

/// Vehicle speed at which the converter locks up
pub const CLUTCH_ENGAGING_POINT: i16 = 80;

/// Upper bound of the engine load metric
pub const MAX_LOAD: i16 = 180;

/// Minimum dwell between any two gear changes
pub const SHIFT_LOCKOUT_MS: u64 = 800;

/// Time after which an upshift no longer waits for RPM to settle
pub const SUSTAINED_RPM_OVERRIDE_MS: u64 = 2000;

/// RPM must fall this far below the upshift point before the next upshift
pub const UPSHIFT_HYSTERESIS: i32 = 30;

/// Load above which a downshift is forced (kickdown)
pub const KICKDOWN_LOAD: i16 = 100;

/// No kickdown within this many RPM of the limiter
pub const KICKDOWN_MARGIN: i32 = 20;

/// Upshifts only happen below this load
pub const UPSHIFT_MAX_LOAD: i16 = 10;

/// Upshift point as % of the RPM range, at zero and full load
const UPSHIFT_PCT: (i32, i32) = (78, 98);

/// Downshift point as % of the RPM range, at zero and full load
const DOWNSHIFT_PCT: (i32, i32) = (30, 50);

/// One control tick's worth of drivetrain inputs
#[derive(Debug, Clone, Copy, Default)]
pub struct TransmissionInput {
    /// 0..500
    pub effective_throttle: i16,
    /// 0..500
    pub vehicle_speed: i16,
    pub current_rpm: u16,
    pub braking: bool,
    pub throttle_neutral: bool,
    pub in_reverse: bool,
    /// RPM limiter, already derived from the max-RPM percentage
    pub max_rpm: u16,
}

/// A forward gear change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftEvent {
    pub from: u8,
    pub to: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransmissionOutput {
    pub target_rpm: u16,
    pub shift: Option<ShiftEvent>,
}

/// Dwell and anti-hunting state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftTimers {
    pub last_upshift_ms: Option<u64>,
    pub last_downshift_ms: Option<u64>,
    /// RPM has dropped below the hysteresis band since the last upshift
    pub rpm_settled: bool,
}

impl Default for ShiftTimers {
    fn default() -> Self {
        Self {
            last_upshift_ms: None,
            last_downshift_ms: None,
            rpm_settled: true,
        }
    }
}

impl ShiftTimers {
    fn since(last: Option<u64>, now_ms: u64) -> u64 {
        last.map_or(u64::MAX, |t| now_ms.saturating_sub(t))
    }

    fn lockout_clear(&self, now_ms: u64) -> bool {
        Self::since(self.last_upshift_ms, now_ms) >= SHIFT_LOCKOUT_MS
            && Self::since(self.last_downshift_ms, now_ms) >= SHIFT_LOCKOUT_MS
    }
}

/// Upshift threshold for the given load
pub fn upshift_point(load: i16, max_rpm: u16) -> u16 {
    shift_point(UPSHIFT_PCT, load, max_rpm)
}

/// Downshift threshold for the given load
pub fn downshift_point(load: i16, max_rpm: u16) -> u16 {
    shift_point(DOWNSHIFT_PCT, load, max_rpm)
}

fn shift_point((low, high): (i32, i32), load: i16, max_rpm: u16) -> u16 {
    let idle = IDLE_RPM as i32;
    let range = (max_rpm as i32 - idle).max(0);
    let load = load.clamp(0, MAX_LOAD) as i32;
    let pct = low + (high - low) * load / MAX_LOAD as i32;
    (idle + range * pct / 100) as u16
}

#[derive(Debug, Clone)]
pub struct Transmission {
    gear: u8,
    load: i16,
    timers: ShiftTimers,
}

impl Default for Transmission {
    fn default() -> Self {
        Self {
            gear: 1,
            load: 0,
            timers: ShiftTimers::default(),
        }
    }
}

impl Transmission {
    pub fn new() -> Self {
        Self::default()
    }

    /// 0 = reverse, 1..=3 forward
    #[inline]
    pub fn gear(&self) -> u8 {
        self.gear
    }

    /// 0..=180
    #[inline]
    pub fn load(&self) -> i16 {
        self.load
    }

    pub fn timers(&self) -> &ShiftTimers {
        &self.timers
    }

    /// Back to first gear with no load and no shift history
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Run one control tick: update load, pick a gear, derive target RPM
    pub fn update(&mut self, input: &TransmissionInput, now_ms: u64) -> TransmissionOutput {
        let max_rpm = input.max_rpm.max(IDLE_RPM);
        let rpm = input.current_rpm as i32;
        let idle = IDLE_RPM as i32;
        let range = max_rpm as i32 - idle;

        self.load = if input.braking || input.throttle_neutral {
            0
        } else {
            let throttle_rpm = input.effective_throttle.max(0) as i32 * range / 500;
            (throttle_rpm - (rpm - idle)).clamp(0, MAX_LOAD as i32) as i16
        };

        let mut shift = None;
        if input.in_reverse {
            if self.gear != 0 {
                log::debug!("transmission: into reverse from gear {}", self.gear);
                self.gear = 0;
                self.timers.rpm_settled = true;
            }
        } else {
            if self.gear == 0 {
                log::debug!("transmission: out of reverse");
                self.gear = 1;
                self.timers.rpm_settled = true;
            }
            shift = self.select_gear(input, max_rpm, now_ms);
        }

        TransmissionOutput {
            target_rpm: self.target_rpm(input, max_rpm),
            shift,
        }
    }

    fn select_gear(&mut self, input: &TransmissionInput, max_rpm: u16, now_ms: u64) -> Option<ShiftEvent> {
        let rpm = input.current_rpm as i32;
        let up_point = upshift_point(self.load, max_rpm) as i32;
        let down_point = downshift_point(self.load, max_rpm) as i32;

        if !self.timers.rpm_settled && rpm < up_point - UPSHIFT_HYSTERESIS {
            self.timers.rpm_settled = true;
        }

        if !self.timers.lockout_clear(now_ms) {
            return None;
        }

        let from = self.gear;
        let sustained = ShiftTimers::since(self.timers.last_upshift_ms, now_ms) >= SUSTAINED_RPM_OVERRIDE_MS;
        if !input.braking
            && self.gear < TOP_GEAR
            && rpm >= up_point
            && self.load < UPSHIFT_MAX_LOAD
            && (self.timers.rpm_settled || sustained)
        {
            self.gear += 1;
            self.timers.last_upshift_ms = Some(now_ms);
            self.timers.rpm_settled = false;
            log::debug!("transmission: upshift {} -> {} at rpm {} (point {})", from, self.gear, rpm, up_point);
            return Some(ShiftEvent { from, to: self.gear });
        }

        if self.gear > 1 {
            let kickdown = self.load > KICKDOWN_LOAD && rpm < max_rpm as i32 - KICKDOWN_MARGIN && self.gear > 2;
            if rpm <= down_point || kickdown || input.braking {
                self.gear -= 1;
                self.timers.last_downshift_ms = Some(now_ms);
                self.timers.rpm_settled = true;
                log::debug!(
                    "transmission: downshift {} -> {} at rpm {} (kickdown={}, braking={})",
                    from,
                    self.gear,
                    rpm,
                    kickdown,
                    input.braking
                );
                return Some(ShiftEvent { from, to: self.gear });
            }
        }

        None
    }

    fn target_rpm(&self, input: &TransmissionInput, max_rpm: u16) -> u16 {
        let idle = IDLE_RPM as i32;
        let throttle = input.effective_throttle.clamp(0, 500) as i32;
        let speed = input.vehicle_speed.max(0) as i32;
        let load = self.load as i32;

        let target = if input.vehicle_speed < CLUTCH_ENGAGING_POINT {
            // Converter slip: revs follow the pedal
            idle + throttle * (MAX_RPM as i32 - idle) / 500
        } else {
            let ratio = GEAR_RATIOS[self.gear as usize];
            // Slip only under drive; first and reverse slip twice as much
            let slip = match (input.braking, self.gear) {
                (true, _) => 0,
                (false, 0 | 1) => load * 2,
                (false, _) => load,
            };
            speed * ratio / 10 + slip
        };

        target.clamp(idle, max_rpm as i32) as u16
    }
}
