//! RPM smoothing on the audio side

use crate::mixer::MixSettings;
use crate::types::IDLE_RPM;

/// Buffers between two smoothing steps (~93 ms at 43 buffers/s)
pub const SMOOTHING_INTERVAL_BUFFERS: u8 = 4;

/// Glides the audible RPM toward the transmission's target
///
/// Each step covers a tenth of the remaining distance, but at least the
/// configured acceleration/deceleration, and lands exactly on the target.
#[derive(Debug, Clone)]
pub struct RpmSmoother {
    current: u16,
    buffers: u8,
}

impl Default for RpmSmoother {
    fn default() -> Self {
        Self {
            current: IDLE_RPM,
            buffers: 0,
        }
    }
}

impl RpmSmoother {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn current(&self) -> u16 {
        self.current
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Count one buffer, stepping every [`SMOOTHING_INTERVAL_BUFFERS`]
    pub fn on_buffer(&mut self, target: u16, settings: &MixSettings) -> u16 {
        self.buffers += 1;
        if self.buffers >= SMOOTHING_INTERVAL_BUFFERS {
            self.buffers = 0;
            self.step(target, settings);
        }
        self.current
    }

    /// One smoothing step toward `target`
    pub fn step(&mut self, target: u16, settings: &MixSettings) -> u16 {
        let max_rpm = settings.max_rpm() as i32;
        let target = (target as i32).clamp(IDLE_RPM as i32, max_rpm);
        let current = self.current as i32;
        let diff = target - current;

        let next = if diff > 0 {
            let delta = (diff / 10).max(settings.acceleration.max(1) as i32);
            (current + delta).min(target)
        } else if diff < 0 {
            let delta = (-diff / 10).max(settings.deceleration.max(1) as i32);
            (current - delta).max(target)
        } else {
            current
        };

        self.current = next.clamp(IDLE_RPM as i32, max_rpm) as u16;
        self.current
    }
}
