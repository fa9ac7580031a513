//! Output devices and the single-writer token
//!
//! The speaker is shared by two producers: the engine's audio task and
//! system chimes. Exactly one of them may write at a time. Ownership is an
//! explicit token in [`SharedOutput`]; whoever holds an [`OutputGuard`]
//! owns the device until the guard drops.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

use super::error::AudioResult;
use crate::types::StereoFrame;

/// A sink for stereo frames at the engine rate
pub trait OutputDevice: Send {
    /// Write one buffer, giving up after `timeout`
    ///
    /// A timeout returns [`AudioError::WriteTimeout`](super::AudioError::WriteTimeout);
    /// the caller drops the buffer.
    fn write(&mut self, frames: &[StereoFrame], timeout: Duration) -> AudioResult<()>;
}

impl<D: OutputDevice + ?Sized> OutputDevice for Box<D> {
    fn write(&mut self, frames: &[StereoFrame], timeout: Duration) -> AudioResult<()> {
        (**self).write(frames, timeout)
    }
}

/// Who is writing to the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Producer {
    Engine = 1,
    System = 2,
}

impl Producer {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Engine),
            2 => Some(Self::System),
            _ => None,
        }
    }
}

const FREE: u8 = 0;

/// Poll interval of [`SharedOutput::claim_blocking`]
const CLAIM_POLL: Duration = Duration::from_millis(1);

/// An output device guarded by a single-writer token
pub struct SharedOutput<D> {
    owner: AtomicU8,
    device: Mutex<D>,
}

impl<D: OutputDevice> SharedOutput<D> {
    pub fn new(device: D) -> Self {
        Self {
            owner: AtomicU8::new(FREE),
            device: Mutex::new(device),
        }
    }

    pub fn shared(device: D) -> Arc<Self> {
        Arc::new(Self::new(device))
    }

    /// Take the token if nobody holds it; never blocks
    pub fn try_claim(&self, who: Producer) -> Option<OutputGuard<'_, D>> {
        self.owner
            .compare_exchange(FREE, who as u8, Ordering::Acquire, Ordering::Relaxed)
            .ok()?;
        let device = match self.device.try_lock() {
            Ok(device) => device,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                // Previous owner is still unlocking
                self.owner.store(FREE, Ordering::Release);
                return None;
            }
        };
        Some(OutputGuard { output: self, device })
    }

    /// Wait up to `timeout` for the token
    pub fn claim_blocking(&self, who: Producer, timeout: Duration) -> Option<OutputGuard<'_, D>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(guard) = self.try_claim(who) {
                return Some(guard);
            }
            if Instant::now() >= deadline {
                return None;
            }
            thread::sleep(CLAIM_POLL);
        }
    }

    /// Current token holder
    pub fn owner(&self) -> Option<Producer> {
        Producer::from_u8(self.owner.load(Ordering::Acquire))
    }
}

/// Exclusive access to the device; releases the token on drop
pub struct OutputGuard<'a, D> {
    output: &'a SharedOutput<D>,
    device: MutexGuard<'a, D>,
}

impl<D> Deref for OutputGuard<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        &self.device
    }
}

impl<D> DerefMut for OutputGuard<'_, D> {
    fn deref_mut(&mut self) -> &mut D {
        &mut self.device
    }
}

impl<D> Drop for OutputGuard<'_, D> {
    fn drop(&mut self) {
        self.output.owner.store(FREE, Ordering::Release);
    }
}

/// Discards everything
#[derive(Debug, Default)]
pub struct NullOutput;

impl OutputDevice for NullOutput {
    fn write(&mut self, _frames: &[StereoFrame], _timeout: Duration) -> AudioResult<()> {
        Ok(())
    }
}

/// Records everything written; clones share the recording
#[derive(Debug, Clone, Default)]
pub struct CaptureOutput {
    frames: Arc<Mutex<Vec<StereoFrame>>>,
}

impl CaptureOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything written so far
    pub fn frames(&self) -> Vec<StereoFrame> {
        self.frames.lock().map(|f| f.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl OutputDevice for CaptureOutput {
    fn write(&mut self, frames: &[StereoFrame], _timeout: Duration) -> AudioResult<()> {
        let mut recorded = self.frames.lock().unwrap_or_else(|e| e.into_inner());
        recorded.extend_from_slice(frames);
        Ok(())
    }
}
