//! Engine shutdown fade: slow down and quieten the idle loop until it dies

/// Interval between fade steps
pub const SHUTDOWN_STEP_MS: u64 = 100;

/// Attenuation divisor at which the engine is silent enough to stop
pub const SHUTDOWN_MAX_ATTENUATION: u16 = 40;

/// Slowdown (percent of normal period) at which the engine has stalled
pub const SHUTDOWN_MAX_SPEED_PCT: u16 = 400;

/// Slowdown added per step
pub const SHUTDOWN_SPEED_STEP: u16 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownFade {
    /// Volume divisor, starts at 1
    attenuation: u16,
    /// Cursor period in percent, starts at 100
    speed_pct: u16,
    last_step_ms: u64,
}

impl ShutdownFade {
    pub fn new(now_ms: u64) -> Self {
        Self {
            attenuation: 1,
            speed_pct: 100,
            last_step_ms: now_ms,
        }
    }

    #[inline]
    pub fn attenuation(&self) -> u16 {
        self.attenuation
    }

    #[inline]
    pub fn speed_pct(&self) -> u16 {
        self.speed_pct
    }

    /// Apply every fade step due by `now_ms`
    pub fn advance(&mut self, now_ms: u64) {
        while now_ms.saturating_sub(self.last_step_ms) >= SHUTDOWN_STEP_MS && !self.is_done() {
            self.attenuation += 1;
            self.speed_pct += SHUTDOWN_SPEED_STEP;
            self.last_step_ms += SHUTDOWN_STEP_MS;
        }
    }

    pub fn is_done(&self) -> bool {
        self.attenuation >= SHUTDOWN_MAX_ATTENUATION || self.speed_pct >= SHUTDOWN_MAX_SPEED_PCT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fade_steps_on_cadence() {
        let mut fade = ShutdownFade::new(1000);
        fade.advance(1099);
        assert_eq!(fade.attenuation(), 1);
        fade.advance(1100);
        assert_eq!(fade.attenuation(), 2);
        assert_eq!(fade.speed_pct(), 115);
    }

    #[test]
    fn test_fade_catches_up_after_a_stall() {
        let mut fade = ShutdownFade::new(0);
        fade.advance(350);
        assert_eq!(fade.attenuation(), 4);
        assert_eq!(fade.speed_pct(), 145);
    }

    #[test]
    fn test_fade_finishes_on_speed_first() {
        let mut fade = ShutdownFade::new(0);
        let mut now = 0;
        while !fade.is_done() {
            now += SHUTDOWN_STEP_MS;
            fade.advance(now);
        }
        // 20 steps: speed 100 + 20*15 = 400, attenuation 21
        assert_eq!(fade.speed_pct(), 400);
        assert_eq!(fade.attenuation(), 21);
        assert_eq!(now, 2000);

        fade.advance(now + 10_000);
        assert_eq!(fade.speed_pct(), 400, "no steps after completion");
    }
}
