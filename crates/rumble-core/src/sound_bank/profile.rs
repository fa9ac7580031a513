//! Profile identifiers and per-vehicle sample sets

use serde::{Deserialize, Serialize};

use super::SoundSample;

/// Built-in engine profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ProfileId {
    /// Caterpillar 3408 V8 diesel
    #[default]
    Cat3408 = 0,
    /// Mercedes OM352 inline six with exhaust brake
    UnimogU1000 = 1,
    /// MAN KAT 8x8 V8 with jake brake
    ManKat = 2,
}

impl ProfileId {
    pub const COUNT: usize = 3;
    pub const ALL: [ProfileId; Self::COUNT] = [Self::Cat3408, Self::UnimogU1000, Self::ManKat];

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Cat3408 => "CAT 3408",
            Self::UnimogU1000 => "Unimog U1000",
            Self::ManKat => "MAN KAT",
        }
    }

    /// Directory name used by custom sound packs
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Cat3408 => "cat_3408",
            Self::UnimogU1000 => "unimog_u1000",
            Self::ManKat => "man_kat",
        }
    }
}

/// Horn sample selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum HornType {
    #[default]
    Truck = 0,
    Air = 1,
    Compact = 2,
}

impl HornType {
    pub const COUNT: usize = 3;
    pub const ALL: [HornType; Self::COUNT] = [Self::Truck, Self::Air, Self::Compact];

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Truck => "Truck",
            Self::Air => "Air horn",
            Self::Compact => "Compact",
        }
    }
}

/// Read-only sample set for one engine
#[derive(Debug, Clone)]
pub struct SoundProfile {
    pub id: ProfileId,
    pub description: &'static str,
    /// Idle loop; its length defines the knock grid
    pub idle: SoundSample,
    /// Rev loop layered in above the rev switch point
    pub rev: SoundSample,
    /// Combustion knock one-shot
    pub knock: SoundSample,
    /// Cranking sound; profiles without one start silently
    pub start: Option<SoundSample>,
    pub jake_brake: Option<SoundSample>,
    pub cylinder_count: u8,
    /// Profile-specific gear clunk
    pub shift: Option<SoundSample>,
    /// Profile-specific blow-off
    pub wastegate: Option<SoundSample>,
}

impl SoundProfile {
    pub fn name(&self) -> &'static str {
        self.id.name()
    }

    pub fn sample_rate(&self) -> u32 {
        self.idle.sample_rate()
    }

    /// Idle samples between two knocks, zero when knock is impossible
    #[inline]
    pub fn knock_spacing(&self, knocks_per_loop: u8) -> usize {
        if knocks_per_loop == 0 {
            return 0;
        }
        self.idle.len() / knocks_per_loop as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_index_round_trip() {
        for id in ProfileId::ALL {
            assert_eq!(ProfileId::from_index(id as u8), Some(id));
        }
        assert_eq!(ProfileId::from_index(ProfileId::COUNT as u8), None);
    }

    #[test]
    fn test_horn_index_round_trip() {
        for horn in HornType::ALL {
            assert_eq!(HornType::from_index(horn as u8), Some(horn));
        }
        assert_eq!(HornType::from_index(200), None);
    }

    #[test]
    fn test_slugs_are_unique() {
        let mut slugs: Vec<_> = ProfileId::ALL.iter().map(|p| p.slug()).collect();
        slugs.dedup();
        assert_eq!(slugs.len(), ProfileId::COUNT);
    }
}
