//! Core types shared by the mixer, the engine and the audio task

/// Output sample rate of the engine mixer (Hz)
pub const ENGINE_SAMPLE_RATE: u32 = 22050;

/// Frames per output buffer (~23 ms at 22.05 kHz, ~43 buffers/s)
pub const BUFFER_FRAMES: usize = 512;

/// Idle RPM in normalized units; pitch is unity at this speed
pub const IDLE_RPM: u16 = 100;

/// Upper end of the normalized RPM scale
pub const MAX_RPM: u16 = 500;

/// Raw sample type stored in sound banks (8-bit signed PCM)
pub type BankSample = i8;

/// Output sample type
pub type Sample = i16;

/// A single stereo output frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StereoFrame {
    pub left: Sample,
    pub right: Sample,
}

impl StereoFrame {
    #[inline]
    pub fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    #[inline]
    pub fn silence() -> Self {
        Self::default()
    }

    /// Same value on both channels
    #[inline]
    pub fn mono(value: Sample) -> Self {
        Self { left: value, right: value }
    }

    /// Clamp a 32-bit accumulator into a mono frame
    #[inline]
    pub fn from_mix(mix: i32) -> Self {
        Self::mono(mix.clamp(Sample::MIN as i32, Sample::MAX as i32) as Sample)
    }

    /// Peak amplitude across both channels
    #[inline]
    pub fn peak(&self) -> u16 {
        self.left.unsigned_abs().max(self.right.unsigned_abs())
    }
}

/// A pre-allocated buffer of stereo frames
///
/// The audio task allocates one of these at start-up and reuses it for every
/// buffer, so nothing in the steady-state loop touches the allocator.
#[derive(Debug, Clone)]
pub struct StereoBuffer {
    frames: Vec<StereoFrame>,
}

impl StereoBuffer {
    /// Create a silent buffer, reporting allocation failure instead of aborting
    pub fn try_silence(len: usize) -> Result<Self, std::collections::TryReserveError> {
        let mut frames = Vec::new();
        frames.try_reserve_exact(len)?;
        frames.resize(len, StereoFrame::silence());
        Ok(Self { frames })
    }

    /// Create a silent buffer
    pub fn silence(len: usize) -> Self {
        Self {
            frames: vec![StereoFrame::silence(); len],
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[StereoFrame] {
        &self.frames
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [StereoFrame] {
        &mut self.frames
    }

    /// Largest absolute sample in the buffer
    pub fn peak(&self) -> u16 {
        self.frames.iter().map(StereoFrame::peak).max().unwrap_or(0)
    }
}

/// Buffer duration in milliseconds for a given frame count
pub fn buffer_period_ms(frames: usize) -> u64 {
    (frames as u64 * 1000) / ENGINE_SAMPLE_RATE as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_mix_clamps_to_i16() {
        assert_eq!(StereoFrame::from_mix(40_000), StereoFrame::mono(i16::MAX));
        assert_eq!(StereoFrame::from_mix(-40_000), StereoFrame::mono(i16::MIN));
        assert_eq!(StereoFrame::from_mix(123), StereoFrame::new(123, 123));
    }

    #[test]
    fn test_try_silence_allocates_len_frames() {
        let buffer = StereoBuffer::try_silence(8).unwrap();
        assert_eq!(buffer.as_slice(), &[StereoFrame::silence(); 8]);
        assert!(StereoBuffer::try_silence(usize::MAX).is_err());
    }

    #[test]
    fn test_buffer_period() {
        assert_eq!(buffer_period_ms(BUFFER_FRAMES), 23);
    }

    #[test]
    fn test_peak() {
        let mut buffer = StereoBuffer::silence(3);
        buffer.as_mut_slice()[1] = StereoFrame::new(-300, 20);
        assert_eq!(buffer.peak(), 300);
    }
}
