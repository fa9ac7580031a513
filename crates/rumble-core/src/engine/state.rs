//! Engine lifecycle states

use std::fmt;

/// OFF → STARTING → RUNNING → STOPPING → OFF
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum EngineState {
    #[default]
    Off = 0,
    /// Start sample playing; the caller of start() is blocked
    Starting = 1,
    Running = 2,
    /// Shutdown fade in progress
    Stopping = 3,
}

impl EngineState {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Starting,
            2 => Self::Running,
            3 => Self::Stopping,
            _ => Self::Off,
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Off => "off",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trip() {
        for state in [EngineState::Off, EngineState::Starting, EngineState::Running, EngineState::Stopping] {
            assert_eq!(EngineState::from_u8(state as u8), state);
        }
        assert_eq!(EngineState::from_u8(99), EngineState::Off);
    }

    #[test]
    fn test_display() {
        assert_eq!(EngineState::Stopping.to_string(), "stopping");
    }
}
