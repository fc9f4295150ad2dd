//! Shared contracts between the Shardfall rules engine, its HTTP surface,
//! and external tooling. Types only; the crates that consume these decide
//! the behavior.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod capability;
pub mod intents;

pub use capability::{
    ability_class, AbilityKind, CapabilityClass, CapabilityUnit, CAPABILITY_MAX_LEVEL,
    CAPABILITY_NAME_MAX_LEN, MAX_ABILITY_LEVEL,
};
pub use intents::{
    FieldDef, FieldKind, IntentSchema, IntentScope, BODY_PARTS, USER_STRING_MAX, USER_TEXT_MAX,
};

/// Wire schema version stamped on every HTTP payload.
pub const SCHEMA_VERSION_V1: &str = "1.0";

/// Rooms are square grids of this many tiles per side.
pub const ROOM_SIZE: i64 = 50;

/// Tile count of one room, and the exact length of an encoded terrain string.
pub const TERRAIN_TILE_COUNT: usize = (ROOM_SIZE * ROOM_SIZE) as usize;

/// Terrain bit masks. A tile may carry both bits; wall dominates for
/// walkability, swamp still counts for construction pricing.
pub const TERRAIN_MASK_PLAIN: u8 = 0;
pub const TERRAIN_MASK_WALL: u8 = 1;
pub const TERRAIN_MASK_SWAMP: u8 = 2;

/// Owner id recorded on hostile stronghold structures.
pub const HOSTILE_USER_ID: &str = "invader";

/// Every kind of object that can occupy a room tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Controller,
    Spawn,
    Extension,
    Road,
    Container,
    Rampart,
    ConstructedWall,
    Tower,
    Storage,
    Link,
    Extractor,
    Lab,
    Terminal,
    Observer,
    Nuker,
    Factory,
    Source,
    Mineral,
    Creep,
    InvaderCore,
    Ruin,
    ConstructionSite,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Controller => "controller",
            Self::Spawn => "spawn",
            Self::Extension => "extension",
            Self::Road => "road",
            Self::Container => "container",
            Self::Rampart => "rampart",
            Self::ConstructedWall => "constructed_wall",
            Self::Tower => "tower",
            Self::Storage => "storage",
            Self::Link => "link",
            Self::Extractor => "extractor",
            Self::Lab => "lab",
            Self::Terminal => "terminal",
            Self::Observer => "observer",
            Self::Nuker => "nuker",
            Self::Factory => "factory",
            Self::Source => "source",
            Self::Mineral => "mineral",
            Self::Creep => "creep",
            Self::InvaderCore => "invader_core",
            Self::Ruin => "ruin",
            Self::ConstructionSite => "construction_site",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let kind = match value {
            "controller" => Self::Controller,
            "spawn" => Self::Spawn,
            "extension" => Self::Extension,
            "road" => Self::Road,
            "container" => Self::Container,
            "rampart" => Self::Rampart,
            "constructed_wall" => Self::ConstructedWall,
            "tower" => Self::Tower,
            "storage" => Self::Storage,
            "link" => Self::Link,
            "extractor" => Self::Extractor,
            "lab" => Self::Lab,
            "terminal" => Self::Terminal,
            "observer" => Self::Observer,
            "nuker" => Self::Nuker,
            "factory" => Self::Factory,
            "source" => Self::Source,
            "mineral" => Self::Mineral,
            "creep" => Self::Creep,
            "invader_core" => Self::InvaderCore,
            "ruin" => Self::Ruin,
            "construction_site" => Self::ConstructionSite,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reservation stamp on an unclaimed controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationInfo {
    pub user: String,
    pub end_time: u64,
}

/// One object in the world. Optional fields apply to a subset of kinds;
/// absent means "not applicable" for that kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomObject {
    pub id: String,
    pub kind: ObjectKind,
    #[serde(default)]
    pub shard: Option<String>,
    pub room: String,
    pub x: i64,
    pub y: i64,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub level: Option<u8>,
    #[serde(default)]
    pub hits: Option<i64>,
    #[serde(default)]
    pub hits_max: Option<i64>,
    #[serde(default)]
    pub progress: Option<i64>,
    #[serde(default)]
    pub progress_total: Option<i64>,
    #[serde(default)]
    pub store: BTreeMap<String, i64>,
    /// Target kind of a construction site.
    #[serde(default)]
    pub structure_kind: Option<ObjectKind>,
    #[serde(default)]
    pub reservation: Option<ReservationInfo>,
    #[serde(default)]
    pub safe_mode: Option<u64>,
    /// Tick at which a deployed stronghold core becomes active.
    #[serde(default)]
    pub deploy_time: Option<u64>,
    #[serde(default)]
    pub decay_time: Option<u64>,
}

impl RoomObject {
    /// Minimal object with the fields every kind carries.
    pub fn new(
        id: impl Into<String>,
        kind: ObjectKind,
        shard: Option<String>,
        room: impl Into<String>,
        x: i64,
        y: i64,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            shard: normalize_shard_value(shard),
            room: room.into(),
            x,
            y,
            user: None,
            name: None,
            level: None,
            hits: None,
            hits_max: None,
            progress: None,
            progress_total: None,
            store: BTreeMap::new(),
            structure_kind: None,
            reservation: None,
            safe_mode: None,
            deploy_time: None,
            decay_time: None,
        }
    }
}

/// Absent shard and null shard name the same world. Empty strings collapse
/// to `None` so every comparison and storage key agrees.
pub fn normalize_shard_value(shard: Option<String>) -> Option<String> {
    shard
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Borrowing form of [`normalize_shard_value`].
pub fn normalized_shard(shard: &Option<String>) -> Option<&str> {
    shard
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// True when two shard designators name the same world.
pub fn shard_matches(left: &Option<String>, right: &Option<String>) -> bool {
    normalized_shard(left) == normalized_shard(right)
}

/// Pending per-object intent. At most one survives per (user, object);
/// re-queueing replaces the previous record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedObjectIntent {
    pub user: String,
    #[serde(default)]
    pub shard: Option<String>,
    pub room: String,
    pub object_id: String,
    /// Canonical single-key record, `{intent_name: sanitized_payload}`.
    pub intent: Value,
}

/// Entry in a user's ordered global-intent log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedGlobalIntent {
    pub user: String,
    #[serde(default)]
    pub shard: Option<String>,
    pub intent: Value,
}

/// Relative change to a user's capability resource balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceAdjustment {
    pub user: String,
    pub delta: f64,
}

/// Atomic mutation description. An operation emits at most one of these;
/// stores apply the whole description or none of it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldMutation {
    #[serde(default)]
    pub inserts: Vec<RoomObject>,
    #[serde(default)]
    pub updates: Vec<RoomObject>,
    #[serde(default)]
    pub removes: Vec<String>,
    #[serde(default)]
    pub unit_upserts: Vec<CapabilityUnit>,
    #[serde(default)]
    pub unit_removes: Vec<String>,
    #[serde(default)]
    pub object_intents: Vec<QueuedObjectIntent>,
    #[serde(default)]
    pub global_intents: Vec<QueuedGlobalIntent>,
    #[serde(default)]
    pub resource_adjustments: Vec<ResourceAdjustment>,
}

impl WorldMutation {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty()
            && self.updates.is_empty()
            && self.removes.is_empty()
            && self.unit_upserts.is_empty()
            && self.unit_removes.is_empty()
            && self.object_intents.is_empty()
            && self.global_intents.is_empty()
            && self.resource_adjustments.is_empty()
    }

    pub fn merge(&mut self, other: WorldMutation) {
        self.inserts.extend(other.inserts);
        self.updates.extend(other.updates);
        self.removes.extend(other.removes);
        self.unit_upserts.extend(other.unit_upserts);
        self.unit_removes.extend(other.unit_removes);
        self.object_intents.extend(other.object_intents);
        self.global_intents.extend(other.global_intents);
        self.resource_adjustments.extend(other.resource_adjustments);
    }
}

/// Typed refusal of a request. These are verdicts, not faults: a rejection
/// is a successful validation run whose answer is "no".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum RejectionReason {
    UnknownIntent { name: String },
    MissingField { field: String },
    InvalidNumber { field: String },
    InvalidArgs,
    OutOfBounds,
    UnknownRoom,
    UnknownObject,
    TileOccupied,
    UnwalkableTerrain,
    TooNearExit,
    BorderNotSealed,
    MissingMineral,
    NotOwned,
    QuotaExceeded,
    SiteCapReached,
    NoStrongholdFit,
    UnknownUnit,
    WrongClass,
    CannotDowngrade,
    InvalidAbilities,
    MaxLevelExceeded,
    PrereqNotSatisfied,
    InsufficientBudget,
    DeleteAlreadyPending,
    NoDeletePending,
    UnitBusy,
}

impl RejectionReason {
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownIntent { .. } => "unknown_intent",
            Self::MissingField { .. } => "missing_field",
            Self::InvalidNumber { .. } => "invalid_number",
            Self::InvalidArgs => "invalid_args",
            Self::OutOfBounds => "out_of_bounds",
            Self::UnknownRoom => "unknown_room",
            Self::UnknownObject => "unknown_object",
            Self::TileOccupied => "tile_occupied",
            Self::UnwalkableTerrain => "unwalkable_terrain",
            Self::TooNearExit => "too_near_exit",
            Self::BorderNotSealed => "border_not_sealed",
            Self::MissingMineral => "missing_mineral",
            Self::NotOwned => "not_owned",
            Self::QuotaExceeded => "quota_exceeded",
            Self::SiteCapReached => "site_cap_reached",
            Self::NoStrongholdFit => "no_stronghold_fit",
            Self::UnknownUnit => "unknown_unit",
            Self::WrongClass => "wrong_class",
            Self::CannotDowngrade => "cannot_downgrade",
            Self::InvalidAbilities => "invalid_abilities",
            Self::MaxLevelExceeded => "max_level_exceeded",
            Self::PrereqNotSatisfied => "prereq_not_satisfied",
            Self::InsufficientBudget => "insufficient_budget",
            Self::DeleteAlreadyPending => "delete_already_pending",
            Self::NoDeletePending => "no_delete_pending",
            Self::UnitBusy => "unit_busy",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownIntent { name } => write!(f, "unknown intent '{name}'"),
            Self::MissingField { field } => write!(f, "missing required field '{field}'"),
            Self::InvalidNumber { field } => write!(f, "field '{field}' is not a number"),
            other => f.write_str(other.code()),
        }
    }
}

/// Outcome of a coordinator operation. Infrastructure failures travel as
/// `Err` on the surrounding `Result`, never through this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Decision<T> {
    Accepted { value: T },
    Rejected { reason: RejectionReason },
}

impl<T> Decision<T> {
    pub fn accepted(value: T) -> Self {
        Self::Accepted { value }
    }

    pub fn rejected(reason: RejectionReason) -> Self {
        Self::Rejected { reason }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    pub fn rejection(&self) -> Option<&RejectionReason> {
        match self {
            Self::Accepted { .. } => None,
            Self::Rejected { reason } => Some(reason),
        }
    }
}

/// Machine-readable error family on the HTTP surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    Rejected,
    NotFound,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::Rejected => "rejected",
            Self::NotFound => "not_found",
            Self::InternalError => "internal_error",
        }
    }
}

/// Error body returned by the HTTP surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub schema_version: String,
    pub code: ErrorCode,
    pub message: String,
    #[serde(default)]
    pub rejection: Option<RejectionReason>,
    #[serde(default)]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            code,
            message: message.into(),
            rejection: None,
            details,
        }
    }

    pub fn from_rejection(reason: RejectionReason) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            code: ErrorCode::Rejected,
            message: reason.to_string(),
            rejection: Some(reason),
            details: None,
        }
    }
}

/// Stronghold blueprint tile, offset from the deployment origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueprintTile {
    pub dx: i64,
    pub dy: i64,
    pub kind: ObjectKind,
    #[serde(default)]
    pub hits: Option<i64>,
}

/// Multi-tile deployment layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    pub name: String,
    pub tiles: Vec<BlueprintTile>,
}

impl Blueprint {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tiles: Vec::new(),
        }
    }

    pub fn tile(mut self, dx: i64, dy: i64, kind: ObjectKind, hits: Option<i64>) -> Self {
        self.tiles.push(BlueprintTile { dx, dy, kind, hits });
        self
    }
}

fn default_max_construction_sites() -> u32 {
    100
}

fn default_stronghold_placement_attempts() -> u32 {
    100
}

fn default_stronghold_deploy_delay() -> u64 {
    5_000
}

fn default_capability_delete_delay() -> u64 {
    86_400
}

fn default_capability_spawn_cooldown() -> u64 {
    28_800
}

fn default_capability_budget_multiplier() -> f64 {
    1_000.0
}

fn default_capability_budget_exponent() -> f64 {
    2.0
}

/// Tunable limits for one engine instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Global construction-site cap per user, across all rooms and shards.
    #[serde(default = "default_max_construction_sites")]
    pub max_construction_sites: u32,
    /// Bounded attempts when searching a stronghold origin.
    #[serde(default = "default_stronghold_placement_attempts")]
    pub stronghold_placement_attempts: u32,
    /// Ticks between deployment and stronghold activation.
    #[serde(default = "default_stronghold_deploy_delay")]
    pub stronghold_deploy_delay: u64,
    /// Ticks between a delete request and its commit.
    #[serde(default = "default_capability_delete_delay")]
    pub capability_delete_delay: u64,
    /// Spawn cooldown stamped on freshly created capability units.
    #[serde(default = "default_capability_spawn_cooldown")]
    pub capability_spawn_cooldown: u64,
    /// Budget curve: allowed levels = floor((resource / multiplier)^(1/exponent)).
    #[serde(default = "default_capability_budget_multiplier")]
    pub capability_budget_multiplier: f64,
    #[serde(default = "default_capability_budget_exponent")]
    pub capability_budget_exponent: f64,
    /// Seed for deterministic placement searches.
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub sqlite_path: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_construction_sites: default_max_construction_sites(),
            stronghold_placement_attempts: default_stronghold_placement_attempts(),
            stronghold_deploy_delay: default_stronghold_deploy_delay(),
            capability_delete_delay: default_capability_delete_delay(),
            capability_spawn_cooldown: default_capability_spawn_cooldown(),
            capability_budget_multiplier: default_capability_budget_multiplier(),
            capability_budget_exponent: default_capability_budget_exponent(),
            seed: 0,
            sqlite_path: None,
        }
    }
}
