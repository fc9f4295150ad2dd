//! Account-level capability units: class-tagged entities that level up a
//! small set of abilities under a shared resource budget.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Highest level any single ability can reach.
pub const MAX_ABILITY_LEVEL: u8 = 5;

/// Highest total level of one unit (sum of its ability levels).
pub const CAPABILITY_MAX_LEVEL: u16 = 25;

/// Unit names are 1..=50 characters after trimming.
pub const CAPABILITY_NAME_MAX_LEN: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityClass {
    Operator,
    Commander,
}

impl CapabilityClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Operator => "operator",
            Self::Commander => "commander",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "operator" => Some(Self::Operator),
            "commander" => Some(Self::Commander),
            _ => None,
        }
    }
}

impl fmt::Display for CapabilityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every ability, across all classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbilityKind {
    HarvestBoost,
    BuildBoost,
    SpawnBoost,
    CarryBoost,
    RepairBoost,
    TowerBoost,
    AttackBoost,
    DefenseBoost,
    SiegeBoost,
}

impl AbilityKind {
    pub const ALL: [AbilityKind; 9] = [
        AbilityKind::HarvestBoost,
        AbilityKind::BuildBoost,
        AbilityKind::SpawnBoost,
        AbilityKind::CarryBoost,
        AbilityKind::RepairBoost,
        AbilityKind::TowerBoost,
        AbilityKind::AttackBoost,
        AbilityKind::DefenseBoost,
        AbilityKind::SiegeBoost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HarvestBoost => "harvest_boost",
            Self::BuildBoost => "build_boost",
            Self::SpawnBoost => "spawn_boost",
            Self::CarryBoost => "carry_boost",
            Self::RepairBoost => "repair_boost",
            Self::TowerBoost => "tower_boost",
            Self::AttackBoost => "attack_boost",
            Self::DefenseBoost => "defense_boost",
            Self::SiegeBoost => "siege_boost",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let kind = match value {
            "harvest_boost" => Self::HarvestBoost,
            "build_boost" => Self::BuildBoost,
            "spawn_boost" => Self::SpawnBoost,
            "carry_boost" => Self::CarryBoost,
            "repair_boost" => Self::RepairBoost,
            "tower_boost" => Self::TowerBoost,
            "attack_boost" => Self::AttackBoost,
            "defense_boost" => Self::DefenseBoost,
            "siege_boost" => Self::SiegeBoost,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for AbilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Class an ability belongs to. Upgrades of an ability outside the unit's
/// class are rejected.
pub fn ability_class(kind: AbilityKind) -> CapabilityClass {
    match kind {
        AbilityKind::HarvestBoost
        | AbilityKind::BuildBoost
        | AbilityKind::SpawnBoost
        | AbilityKind::CarryBoost
        | AbilityKind::RepairBoost
        | AbilityKind::TowerBoost => CapabilityClass::Operator,
        AbilityKind::AttackBoost | AbilityKind::DefenseBoost | AbilityKind::SiegeBoost => {
            CapabilityClass::Commander
        }
    }
}

/// One capability unit. `level` always equals the sum of `abilities`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityUnit {
    pub id: String,
    pub user: String,
    pub name: String,
    pub class: CapabilityClass,
    pub level: u16,
    #[serde(default)]
    pub abilities: BTreeMap<AbilityKind, u8>,
    /// Shard the unit is currently spawned into, if any.
    #[serde(default)]
    pub shard: Option<String>,
    #[serde(default)]
    pub hits_max: Option<i64>,
    #[serde(default)]
    pub store_capacity: Option<i64>,
    /// Earliest tick at which the unit may spawn again.
    #[serde(default)]
    pub spawn_cooldown_time: Option<u64>,
    /// Tick at which a pending deletion commits. Absent = no deletion pending.
    #[serde(default)]
    pub delete_time: Option<u64>,
}

impl CapabilityUnit {
    pub fn new(
        id: impl Into<String>,
        user: impl Into<String>,
        name: impl Into<String>,
        class: CapabilityClass,
    ) -> Self {
        Self {
            id: id.into(),
            user: user.into(),
            name: name.into(),
            class,
            level: 0,
            abilities: BTreeMap::new(),
            shard: None,
            hits_max: None,
            store_capacity: None,
            spawn_cooldown_time: None,
            delete_time: None,
        }
    }

    /// Sum of per-ability levels; the invariant source for `level`.
    pub fn level_sum(&self) -> u16 {
        self.abilities.values().map(|level| *level as u16).sum()
    }

    pub fn is_delete_pending(&self) -> bool {
        self.delete_time.is_some()
    }

    pub fn is_spawned(&self) -> bool {
        self.shard.is_some()
    }
}
