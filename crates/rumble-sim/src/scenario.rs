//! Scripted drives
//!
//! A scenario is a throttle curve plus timed driver actions:
//!
//! ```yaml
//! name: hill climb
//! profile: man_kat
//! duration_ms: 20000
//! throttle:
//!   - { at_ms: 0, value: 0 }
//!   - { at_ms: 4000, value: 800 }
//! events:
//!   - { at_ms: 0, action: start }
//!   - { at_ms: 9000, action: horn_on }
//!   - { at_ms: 12000, action: preset, arg: 1 }
//! ```

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use rumble_core::drivetrain::SIGNAL_RANGE;
use rumble_core::sound_bank::ProfileId;

/// Throttle value at a point in time; linear in between
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub at_ms: u64,
    /// -1000..1000
    pub value: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Start,
    Stop,
    HornOn,
    HornOff,
    ModeSwitch,
    ToggleVolume,
    /// Volume preset `arg`
    Preset,
    /// Sound profile `arg`
    Profile,
    JakeOn,
    JakeOff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub at_ms: u64,
    pub action: Action,
    #[serde(default)]
    pub arg: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: String,
    /// Overrides the profile of the loaded engine config
    #[serde(default)]
    pub profile: Option<ProfileId>,
    pub duration_ms: u64,
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    #[serde(default)]
    pub throttle: Vec<Keyframe>,
    #[serde(default)]
    pub events: Vec<Event>,
}

fn default_tick_ms() -> u64 {
    10
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).with_context(|| format!("Failed to read scenario {:?}", path))?;
        Self::parse(&contents).with_context(|| format!("Invalid scenario {:?}", path))
    }

    pub fn parse(yaml: &str) -> Result<Self> {
        let mut scenario: Scenario = serde_yaml::from_str(yaml).context("Failed to parse scenario YAML")?;
        scenario.validate()?;
        scenario.throttle.sort_by_key(|k| k.at_ms);
        scenario.events.sort_by_key(|e| e.at_ms);
        Ok(scenario)
    }

    fn validate(&self) -> Result<()> {
        if self.tick_ms == 0 {
            bail!("tick_ms must be positive");
        }
        if self.duration_ms == 0 {
            bail!("duration_ms must be positive");
        }
        if let Some(k) = self.throttle.iter().find(|k| k.value.unsigned_abs() > SIGNAL_RANGE as u16) {
            bail!("throttle {} at {} ms outside ±{}", k.value, k.at_ms, SIGNAL_RANGE);
        }
        Ok(())
    }

    /// Interpolated throttle at `t_ms`; held flat outside the keyframes
    pub fn throttle_at(&self, t_ms: u64) -> i16 {
        let Some(first) = self.throttle.first() else {
            return 0;
        };
        if t_ms <= first.at_ms {
            return first.value;
        }
        for pair in self.throttle.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if t_ms < b.at_ms {
                let span = (b.at_ms - a.at_ms) as i64;
                let progress = (t_ms - a.at_ms) as i64;
                let delta = b.value as i64 - a.value as i64;
                return (a.value as i64 + delta * progress / span) as i16;
            }
        }
        self.throttle.last().map_or(0, |k| k.value)
    }

    /// Events with `from_ms <= at_ms < to_ms`
    pub fn events_between(&self, from_ms: u64, to_ms: u64) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(move |e| e.at_ms >= from_ms && e.at_ms < to_ms)
    }
}
