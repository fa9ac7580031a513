//! 16.16 fixed-point playback cursor

use crate::types::IDLE_RPM;

/// Fractional bits of a cursor position
pub const FRAC_BITS: u32 = 16;

/// Increment for one source sample per output sample
pub const UNITY: u64 = 1 << FRAC_BITS;

/// Read position into a sample stream
///
/// The integer part indexes the stream, the low 16 bits carry the
/// sub-sample phase so that pitch changes never drift. Stored in 64 bits so
/// streams longer than 65535 samples don't overflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cursor(u64);

impl Cursor {
    #[inline]
    pub const fn at(index: usize) -> Self {
        Self((index as u64) << FRAC_BITS)
    }

    #[inline]
    pub fn index(&self) -> usize {
        (self.0 >> FRAC_BITS) as usize
    }

    #[inline]
    pub fn advance(&mut self, increment: u64) {
        self.0 = self.0.saturating_add(increment);
    }

    #[inline]
    pub fn reset(&mut self) {
        self.0 = 0;
    }

    /// Fold the position back into `[0, len)` keeping the phase
    #[inline]
    pub fn wrap(&mut self, len: usize) {
        if len == 0 {
            self.0 = 0;
            return;
        }
        self.0 %= (len as u64) << FRAC_BITS;
    }

    /// Jump back by `span` samples, keeping the phase
    #[inline]
    pub fn rewind(&mut self, span: usize) {
        self.0 = self.0.saturating_sub((span as u64) << FRAC_BITS);
    }
}

/// Cursor increment for an engine layer at `rpm`; unity at idle
#[inline]
pub fn rpm_increment(rpm: u16) -> u64 {
    ((rpm as u64) << FRAC_BITS) / IDLE_RPM as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpm_increment_is_unity_at_idle() {
        assert_eq!(rpm_increment(IDLE_RPM), UNITY);
        assert_eq!(rpm_increment(200), 2 * UNITY);
        assert_eq!(rpm_increment(150), UNITY + UNITY / 2);
    }

    #[test]
    fn test_fractional_advance_accumulates() {
        let mut cursor = Cursor::default();
        for _ in 0..4 {
            cursor.advance(UNITY / 4);
        }
        assert_eq!(cursor.index(), 1);
        assert_eq!(cursor.0 & (UNITY - 1), 0);
    }

    #[test]
    fn test_wrap_keeps_phase() {
        let mut cursor = Cursor::at(9);
        cursor.advance(UNITY + UNITY / 2);
        cursor.wrap(10);
        assert_eq!(cursor.index(), 0);
        assert_eq!(cursor.0 & (UNITY - 1), UNITY / 2);
    }

    #[test]
    fn test_long_streams_do_not_overflow() {
        let mut cursor = Cursor::at(70_000);
        cursor.advance(UNITY);
        assert_eq!(cursor.index(), 70_001);
    }

    #[test]
    fn test_rewind() {
        let mut cursor = Cursor::at(12);
        cursor.rewind(5);
        assert_eq!(cursor.index(), 7);
        cursor.rewind(100);
        assert_eq!(cursor, Cursor::default());
    }
}
