//! Commands from the control side to the audio task
//!
//! Anything that cannot be expressed as an independent atomic scalar goes
//! through this lock-free SPSC queue: the audio task pops everything pending
//! at the top of each buffer.

use crate::mixer::MixSettings;
use crate::sound_bank::ProfileId;

/// Queue depth; a handful of config edits per buffer at most
pub const COMMAND_QUEUE_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineCommand {
    /// Switch sound profile and rewind every cursor
    SetProfile(ProfileId),
    /// Replace the mixer's configuration snapshot
    ApplySettings(MixSettings),
}

/// Create the command channel between control and audio
pub fn command_channel() -> (rtrb::Producer<EngineCommand>, rtrb::Consumer<EngineCommand>) {
    rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY)
}

/// Sending half, owned by the control side
pub struct CommandSender {
    producer: rtrb::Producer<EngineCommand>,
}

impl CommandSender {
    pub fn new(producer: rtrb::Producer<EngineCommand>) -> Self {
        Self { producer }
    }

    /// Push a command; hands it back if the queue is full
    pub fn send(&mut self, cmd: EngineCommand) -> Result<(), EngineCommand> {
        self.producer.push(cmd).map_err(|rtrb::PushError::Full(cmd)| cmd)
    }

    /// Free slots left in the queue
    pub fn slots(&self) -> usize {
        self.producer.slots()
    }
}
