//! Simulated drivetrain: throttle momentum and a 3-speed automatic

mod throttle;
mod transmission;

pub use throttle::*;
pub use transmission::*;

/// Throttle values inside this band count as neutral
pub const NEUTRAL_DEADBAND: i16 = 50;

/// Full-scale magnitude of throttle, speed and simulated velocity
pub const SIGNAL_RANGE: i16 = 1000;
