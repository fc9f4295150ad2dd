//! World mutation coordinator.
//!
//! Every operation follows the same shape: load the room or account slice it
//! needs, run the pure validators, then apply at most one [`WorldMutation`]
//! through the store. Rule verdicts come back as `Ok(Decision::Rejected(..))`;
//! only infrastructure failures surface as `Err(EngineError)`.
//!
//! The read slice is not locked against the live simulation. A tile can be
//! taken between load and apply; the simulation's own conflict pass resolves
//! the duplicate, so the engine deliberately carries no row-version machinery.

mod capability;
mod construction;
mod intents;
mod spawning;
mod strongholds;

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use contracts::{
    normalize_shard_value, normalized_shard, AbilityKind, Blueprint, CapabilityClass,
    CapabilityUnit, Decision, EngineConfig, IntentSchema, IntentScope, ObjectKind,
    QueuedGlobalIntent, QueuedObjectIntent, RejectionReason, RoomObject, WorldMutation,
    CAPABILITY_NAME_MAX_LEN, HOSTILE_USER_ID,
};

use crate::placement::{
    check_site, check_spawn_site, blueprint_fits, find_origin, mix_seed, PlacementInputs,
    QuotaTable,
};
use crate::progression::{
    can_afford_new_unit, derived_hits_max, derived_store_capacity, plan_upgrade, BudgetInputs,
    PrereqTable,
};
use crate::sanitize::sanitize_with;
use crate::schema::{SchemaCatalog, SchemaSource};
use crate::store::{StoreError, WorldStore};
use crate::terrain::{self, TerrainGrid};

pub use strongholds::builtin_blueprints;

/// Construction-site placement request.
#[derive(Debug, Clone)]
pub struct SiteRequest {
    pub user: String,
    pub shard: Option<String>,
    pub room: String,
    pub kind: ObjectKind,
    pub x: i64,
    pub y: i64,
}

/// First-spawn placement request.
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub user: String,
    pub shard: Option<String>,
    pub room: String,
    pub x: i64,
    pub y: i64,
    pub name: Option<String>,
}

/// Hostile stronghold deployment request.
#[derive(Debug, Clone)]
pub struct StrongholdRequest {
    pub shard: Option<String>,
    pub room: String,
    pub blueprint: String,
    /// Explicit origin; when absent the engine searches one.
    pub origin: Option<(i64, i64)>,
    pub level: u8,
}

/// Per-object intent submission.
#[derive(Debug, Clone)]
pub struct ObjectIntentRequest {
    pub user: String,
    pub shard: Option<String>,
    pub room: String,
    pub object_id: String,
    pub name: String,
    pub payload: Value,
}

/// Account-wide intent submission.
#[derive(Debug, Clone)]
pub struct GlobalIntentRequest {
    pub user: String,
    pub shard: Option<String>,
    pub name: String,
    pub payload: Value,
}

#[derive(Debug)]
pub enum EngineError {
    Store(StoreError),
    /// A stored terrain string no longer decodes.
    CorruptTerrain { room: String, detail: String },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(err) => write!(f, "store failure: {err}"),
            Self::CorruptTerrain { room, detail } => {
                write!(f, "terrain for room {room} is corrupt: {detail}")
            }
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StoreError> for EngineError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Room state as one operation sees it.
struct RoomSlice {
    /// Decoded terrain, `None` when the room is unknown to the store.
    terrain: Option<TerrainGrid>,
    objects: Vec<RoomObject>,
}

pub struct RulesEngine {
    store: Box<dyn WorldStore>,
    catalog: SchemaCatalog,
    config: EngineConfig,
    quota: QuotaTable,
    prereqs: PrereqTable,
}

impl RulesEngine {
    pub fn new(store: Box<dyn WorldStore>, config: EngineConfig) -> Self {
        Self {
            store,
            catalog: SchemaCatalog::builtin(),
            config,
            quota: QuotaTable::builtin(),
            prereqs: PrereqTable::builtin(),
        }
    }

    /// Replace the builtin quota and prerequisite tables.
    pub fn with_tables(mut self, quota: QuotaTable, prereqs: PrereqTable) -> Self {
        self.quota = quota;
        self.prereqs = prereqs;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Attach an extension-schema source; the catalog refreshes lazily.
    pub fn set_schema_source(&mut self, source: Box<dyn SchemaSource>) {
        self.catalog.set_source(source);
    }

    /// Effective intent catalog, extensions shadowing builtins.
    pub fn schemas(&self) -> BTreeMap<String, IntentSchema> {
        self.catalog.effective()
    }

    pub fn game_time(&self) -> Result<u64, EngineError> {
        Ok(self.store.game_time()?)
    }

    pub fn set_game_time(&mut self, time: u64) -> Result<(), EngineError> {
        Ok(self.store.set_game_time(time)?)
    }

    pub fn room_terrain(
        &self,
        room: &str,
        shard: Option<&str>,
    ) -> Result<Option<String>, EngineError> {
        Ok(self.store.room_terrain(room, shard)?)
    }

    pub fn put_room_terrain(
        &mut self,
        room: &str,
        shard: Option<&str>,
        terrain: &str,
    ) -> Result<(), EngineError> {
        Ok(self.store.put_room_terrain(room, shard, terrain)?)
    }

    pub fn objects_in_room(
        &self,
        room: &str,
        shard: Option<&str>,
    ) -> Result<Vec<RoomObject>, EngineError> {
        Ok(self.store.objects_in_room(room, shard)?)
    }

    pub fn user_resource(&self, user: &str) -> Result<f64, EngineError> {
        Ok(self.store.user_resource(user)?)
    }

    pub fn set_user_resource(&mut self, user: &str, amount: f64) -> Result<(), EngineError> {
        Ok(self.store.set_user_resource(user, amount)?)
    }

    pub fn units_for_user(&self, user: &str) -> Result<Vec<CapabilityUnit>, EngineError> {
        Ok(self.store.units_for_user(user)?)
    }

    pub fn pending_object_intents(
        &self,
        user: &str,
    ) -> Result<Vec<QueuedObjectIntent>, EngineError> {
        Ok(self.store.pending_object_intents(user)?)
    }

    pub fn pending_global_intents(
        &self,
        user: &str,
    ) -> Result<Vec<QueuedGlobalIntent>, EngineError> {
        Ok(self.store.pending_global_intents(user)?)
    }

    fn room_slice(&self, room: &str, shard: Option<&str>) -> Result<RoomSlice, EngineError> {
        let terrain = match self.store.room_terrain(room, shard)? {
            Some(encoded) => {
                let grid = terrain::decode(&encoded).map_err(|err| EngineError::CorruptTerrain {
                    room: room.to_string(),
                    detail: err.to_string(),
                })?;
                Some(grid)
            }
            None => None,
        };
        let objects = self.store.objects_in_room(room, shard)?;
        Ok(RoomSlice { terrain, objects })
    }

    fn allocate_id(&mut self, prefix: &str) -> Result<String, EngineError> {
        let seq = self.store.next_object_seq()?;
        Ok(format!("{prefix}-{seq:06}"))
    }

    fn budget_inputs(&self, user: &str) -> Result<BudgetInputs, EngineError> {
        let resource_total = self.store.user_resource(user)?;
        let units = self.store.units_for_user(user)?;
        let unit_count = units.len() as u32;
        let level_sum = units.iter().map(|unit| unit.level as u32).sum();
        Ok(BudgetInputs {
            resource_total,
            unit_count,
            level_sum,
            multiplier: self.config.capability_budget_multiplier,
            exponent: self.config.capability_budget_exponent,
        })
    }
}

fn stable_text_hash(text: &str) -> u64 {
    let mut hash = 0_u64;
    for byte in text.as_bytes() {
        hash = hash.rotate_left(5) ^ u64::from(*byte);
        hash = hash.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    }
    hash
}
