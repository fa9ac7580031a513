//! Throttle physics
//!
//! Turns raw stick position into a simulated velocity with momentum. The
//! stick is a demand, not a speed: letting go coasts, pushing against the
//! motion brakes, and a new direction has to pass through neutral first.

use serde::{Deserialize, Serialize};

use super::{NEUTRAL_DEADBAND, SIGNAL_RANGE};

/// Direction of travel as last commanded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    Reverse,
    #[default]
    Stopped,
    Forward,
}

impl Direction {
    /// Direction of a signed signal; neutral-band values count as stopped
    pub fn of(value: i16) -> Self {
        if value >= NEUTRAL_DEADBAND {
            Self::Forward
        } else if value <= -NEUTRAL_DEADBAND {
            Self::Reverse
        } else {
            Self::Stopped
        }
    }

    /// Direction of motion; any non-zero velocity has one
    pub fn of_velocity(velocity: i16) -> Self {
        match velocity.signum() {
            1 => Self::Forward,
            -1 => Self::Reverse,
            _ => Self::Stopped,
        }
    }
}

/// What the engine needs to know about braking and standstill
pub trait BrakingOracle {
    fn is_braking(&self) -> bool;
    fn last_direction(&self) -> Direction;
    fn is_motor_stopped(&self) -> bool;
    fn motor_cutoff(&self) -> i16;
}

/// User tuning for the momentum model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsTuning {
    /// 0 = long coast, 100 = stops almost immediately
    pub coast_rate: u8,
    /// 0 = gentle, 100 = hard braking
    pub brake_force: u8,
    /// Below this |velocity| the motor counts as stopped
    pub motor_cutoff: i16,
}

impl Default for PhysicsTuning {
    fn default() -> Self {
        Self {
            coast_rate: 50,
            brake_force: 50,
            motor_cutoff: 30,
        }
    }
}

impl PhysicsTuning {
    /// Velocity lost per tick while coasting
    pub fn coast_decel(&self) -> i16 {
        let rate = self.coast_rate.min(100) as i16;
        (50 - rate * 45 / 100).max(5)
    }

    /// Velocity lost per tick while braking
    pub fn brake_strength(&self) -> i16 {
        5 + self.brake_force.min(100) as i16 * 195 / 100
    }

    /// Largest velocity gain per tick
    pub fn max_accel(&self) -> i16 {
        20 + (100 - self.coast_rate.min(100) as i16) / 5
    }
}

/// Minimum acceleration step, so the last few units still close quickly
const MIN_ACCEL_STEP: i16 = 4;

/// Momentum model state
#[derive(Debug, Clone, Default)]
pub struct ThrottlePhysics {
    tuning: PhysicsTuning,
    velocity: i16,
    braking: bool,
    last_direction: Direction,
    /// Stick has been through neutral since the last commanded direction
    throttle_released: bool,
}

impl ThrottlePhysics {
    pub fn new(tuning: PhysicsTuning) -> Self {
        Self {
            tuning,
            throttle_released: true,
            ..Default::default()
        }
    }

    pub fn tuning(&self) -> &PhysicsTuning {
        &self.tuning
    }

    #[inline]
    pub fn velocity(&self) -> i16 {
        self.velocity
    }

    /// Advance one control tick and return the new simulated velocity
    pub fn apply(&mut self, throttle: i16) -> i16 {
        let throttle = throttle.clamp(-SIGNAL_RANGE, SIGNAL_RANGE);
        let demand = Direction::of(throttle);
        let motion = Direction::of_velocity(self.velocity);
        let stopped = self.velocity == 0;

        if demand == Direction::Stopped {
            self.throttle_released = true;
            self.braking = false;
            self.velocity = approach(self.velocity, 0, self.tuning.coast_decel());
        } else if !stopped && demand != motion {
            // Stick against the motion
            self.braking = true;
            self.throttle_released = false;
            self.velocity = approach(self.velocity, 0, self.tuning.brake_strength());
        } else if stopped
            && self.last_direction != Direction::Stopped
            && demand != self.last_direction
            && !self.throttle_released
        {
            // Braked to a halt with the stick still held the other way
            self.braking = true;
        } else {
            self.braking = false;
            self.throttle_released = false;
            self.last_direction = demand;
            self.velocity = self.drive_toward(throttle);
        }

        if self.velocity == 0 && self.throttle_released {
            self.last_direction = Direction::Stopped;
        }

        self.velocity
    }

    /// Accelerate toward a same-direction target, or coast down to it
    fn drive_toward(&self, target: i16) -> i16 {
        let current = self.velocity;
        let same_direction = (current as i32) * (target as i32) > 0;
        if same_direction && target.abs() < current.abs() {
            return approach(current, target, self.tuning.coast_decel());
        }
        let distance = (target as i32 - current as i32).unsigned_abs() as i16;
        let step = (distance / 8).clamp(MIN_ACCEL_STEP, self.tuning.max_accel().max(MIN_ACCEL_STEP));
        approach(current, target, step)
    }

    /// Clear all state, e.g. after losing the receiver signal
    pub fn reset(&mut self) {
        self.velocity = 0;
        self.braking = false;
        self.last_direction = Direction::Stopped;
        self.throttle_released = true;
    }
}

impl BrakingOracle for ThrottlePhysics {
    fn is_braking(&self) -> bool {
        self.braking
    }

    fn last_direction(&self) -> Direction {
        self.last_direction
    }

    fn is_motor_stopped(&self) -> bool {
        self.velocity.abs() < self.tuning.motor_cutoff
    }

    fn motor_cutoff(&self) -> i16 {
        self.tuning.motor_cutoff
    }
}

/// Move `current` toward `target` by at most `step`, never past it
#[inline]
pub fn approach(current: i16, target: i16, step: i16) -> i16 {
    let step = step.max(1) as i32;
    let diff = target as i32 - current as i32;
    if diff.abs() <= step {
        target
    } else {
        (current as i32 + step * diff.signum()) as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn physics() -> ThrottlePhysics {
        ThrottlePhysics::new(PhysicsTuning::default())
    }

    #[test]
    fn test_derived_rates() {
        let t = PhysicsTuning { coast_rate: 0, brake_force: 0, motor_cutoff: 30 };
        assert_eq!(t.coast_decel(), 50);
        assert_eq!(t.brake_strength(), 5);
        assert_eq!(t.max_accel(), 40);

        let t = PhysicsTuning { coast_rate: 100, brake_force: 100, motor_cutoff: 30 };
        assert_eq!(t.coast_decel(), 5);
        assert_eq!(t.brake_strength(), 200);
        assert_eq!(t.max_accel(), 20);
    }

    #[test]
    fn test_approach_never_overshoots() {
        assert_eq!(approach(0, 10, 30), 10);
        assert_eq!(approach(10, 0, 30), 0);
        assert_eq!(approach(-10, 0, 3), -7);
        assert_eq!(approach(100, -100, 500), -100);
        assert_eq!(approach(5, 5, 0), 5);
    }

    #[test]
    fn test_accelerates_to_target_without_overshoot() {
        let mut p = physics();
        let mut last = 0;
        for _ in 0..200 {
            let v = p.apply(600);
            assert!(v >= last, "velocity must rise monotonically");
            assert!(v <= 600);
            last = v;
        }
        assert_eq!(p.velocity(), 600);
        assert_eq!(p.last_direction(), Direction::Forward);
        assert!(!p.is_braking());
    }

    #[test]
    fn test_acceleration_is_faster_far_from_target() {
        let mut p = physics();
        let first = p.apply(1000);
        while 1000 - p.velocity() >= 40 {
            p.apply(1000);
        }
        let before = p.velocity();
        let late = p.apply(1000) - before;
        assert!(late > 0);
        assert!(late < first);
    }

    #[test]
    fn test_small_velocity_still_brakes() {
        let mut p = physics();
        p.apply(600);
        assert!(p.velocity() > 0 && p.velocity() < NEUTRAL_DEADBAND);
        let v = p.apply(-600);
        assert!(p.is_braking());
        assert!(v >= 0);
    }

    #[test]
    fn test_neutral_coasts_to_zero() {
        let mut p = physics();
        for _ in 0..100 {
            p.apply(800);
        }
        let mut last = p.velocity();
        for _ in 0..500 {
            let v = p.apply(0);
            assert!(v <= last && v >= 0);
            last = v;
        }
        assert_eq!(p.velocity(), 0);
        assert_eq!(p.last_direction(), Direction::Stopped);
    }

    #[test]
    fn test_opposing_throttle_brakes_and_latches() {
        let mut p = physics();
        for _ in 0..100 {
            p.apply(800);
        }
        // Full reverse stick while rolling forward
        for _ in 0..200 {
            let v = p.apply(-800);
            assert!(v >= 0, "direction must not flip while the stick is held");
            assert!(p.is_braking());
        }
        assert_eq!(p.velocity(), 0);
        assert_eq!(p.last_direction(), Direction::Forward);

        // Through neutral, then reverse is allowed
        p.apply(0);
        assert!(!p.is_braking());
        assert_eq!(p.last_direction(), Direction::Stopped);
        let v = p.apply(-800);
        assert!(v < 0);
        assert_eq!(p.last_direction(), Direction::Reverse);
    }

    #[test]
    fn test_braking_is_stronger_than_coasting() {
        let mut coast = physics();
        let mut brake = physics();
        for _ in 0..100 {
            coast.apply(800);
            brake.apply(800);
        }
        for _ in 0..5 {
            coast.apply(0);
            brake.apply(-800);
        }
        assert!(brake.velocity() < coast.velocity());
    }

    #[test]
    fn test_lower_target_coasts_down() {
        let mut p = physics();
        for _ in 0..100 {
            p.apply(900);
        }
        let v = p.apply(300);
        assert_eq!(v, 900 - p.tuning().coast_decel());
        assert!(!p.is_braking());
    }

    #[test]
    fn test_motor_stopped_uses_cutoff() {
        let mut p = physics();
        assert!(p.is_motor_stopped());
        for _ in 0..100 {
            p.apply(500);
        }
        assert!(!p.is_motor_stopped());
        assert_eq!(p.motor_cutoff(), 30);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut p = physics();
        for _ in 0..50 {
            p.apply(-700);
        }
        p.apply(700);
        p.reset();
        assert_eq!(p.velocity(), 0);
        assert!(!p.is_braking());
        assert_eq!(p.last_direction(), Direction::Stopped);
        assert!(p.apply(700) > 0);
    }

    #[test]
    fn test_random_trace_stays_in_range() {
        let mut p = physics();
        let mut seed = 12345u32;
        for _ in 0..5000 {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let throttle = ((seed >> 16) % 2001) as i16 - 1000;
            let v = p.apply(throttle);
            assert!((-1000..=1000).contains(&v));
        }
    }
}
