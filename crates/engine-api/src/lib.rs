//! In-process engine facade with SQLite persistence and an HTTP surface.
//!
//! [`EngineApi`] wraps the rules engine behind one object the server, the CLI,
//! and embedding tests all share. The facade adds nothing to the rules; it
//! picks the backing store and carries the clock-advance upkeep.

mod persistence;
mod server;

use std::collections::BTreeMap;
use std::path::Path;

use contracts::{
    AbilityKind, CapabilityClass, CapabilityUnit, Decision, EngineConfig, IntentSchema,
    QueuedGlobalIntent, QueuedObjectIntent, RoomObject,
};
use engine_core::schema::SchemaSource;
use engine_core::world::{
    GlobalIntentRequest, ObjectIntentRequest, SiteRequest, SpawnRequest, StrongholdRequest,
};
use engine_core::{EngineError, MemoryStore, RulesEngine};
use serde_json::Value;

pub use persistence::{PersistenceError, SqliteWorldStore};
pub use server::{serve, ServerError};

/// Outcome of advancing the engine clock: the new time plus the ids of
/// capability units whose pending deletion fell due along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct ClockAdvance {
    pub time: u64,
    pub removed_units: Vec<String>,
}

pub struct EngineApi {
    engine: RulesEngine,
}

impl EngineApi {
    pub fn in_memory(config: EngineConfig) -> Self {
        Self {
            engine: RulesEngine::new(Box::new(MemoryStore::new()), config),
        }
    }

    pub fn with_sqlite(
        path: impl AsRef<Path>,
        config: EngineConfig,
    ) -> Result<Self, PersistenceError> {
        let store = SqliteWorldStore::open(path)?;
        Ok(Self {
            engine: RulesEngine::new(Box::new(store), config),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        self.engine.config()
    }

    pub fn set_schema_source(&mut self, source: Box<dyn SchemaSource>) {
        self.engine.set_schema_source(source);
    }

    pub fn schemas(&self) -> BTreeMap<String, IntentSchema> {
        self.engine.schemas()
    }

    pub fn game_time(&self) -> Result<u64, EngineError> {
        self.engine.game_time()
    }

    pub fn set_game_time(&mut self, time: u64) -> Result<(), EngineError> {
        self.engine.set_game_time(time)
    }

    /// Advance the clock and run the upkeep that rides on it.
    pub fn advance_clock(&mut self, ticks: u64) -> Result<ClockAdvance, EngineError> {
        let time = self.engine.game_time()? + ticks.max(1);
        self.engine.set_game_time(time)?;
        let removed_units = self.engine.commit_due_deletions(time)?;
        Ok(ClockAdvance {
            time,
            removed_units,
        })
    }

    pub fn terrain(&self, room: &str, shard: Option<&str>) -> Result<Option<String>, EngineError> {
        self.engine.room_terrain(room, shard)
    }

    pub fn put_room_terrain(
        &mut self,
        room: &str,
        shard: Option<&str>,
        terrain: &str,
    ) -> Result<(), EngineError> {
        self.engine.put_room_terrain(room, shard, terrain)
    }

    pub fn objects(&self, room: &str, shard: Option<&str>) -> Result<Vec<RoomObject>, EngineError> {
        self.engine.objects_in_room(room, shard)
    }

    pub fn user_resource(&self, user: &str) -> Result<f64, EngineError> {
        self.engine.user_resource(user)
    }

    pub fn set_user_resource(&mut self, user: &str, amount: f64) -> Result<(), EngineError> {
        self.engine.set_user_resource(user, amount)
    }

    pub fn units_for_user(&self, user: &str) -> Result<Vec<CapabilityUnit>, EngineError> {
        self.engine.units_for_user(user)
    }

    pub fn pending_object_intents(
        &self,
        user: &str,
    ) -> Result<Vec<QueuedObjectIntent>, EngineError> {
        self.engine.pending_object_intents(user)
    }

    pub fn pending_global_intents(
        &self,
        user: &str,
    ) -> Result<Vec<QueuedGlobalIntent>, EngineError> {
        self.engine.pending_global_intents(user)
    }

    pub fn create_construction_site(
        &mut self,
        request: &SiteRequest,
    ) -> Result<Decision<RoomObject>, EngineError> {
        self.engine.create_construction_site(request)
    }

    pub fn remove_construction_site(
        &mut self,
        user: &str,
        id: &str,
        shard: Option<&str>,
    ) -> Result<Decision<String>, EngineError> {
        self.engine.remove_construction_site(user, id, shard)
    }

    pub fn place_spawn(
        &mut self,
        request: &SpawnRequest,
    ) -> Result<Decision<RoomObject>, EngineError> {
        self.engine.place_spawn(request)
    }

    pub fn deploy_stronghold(
        &mut self,
        request: &StrongholdRequest,
    ) -> Result<Decision<Vec<RoomObject>>, EngineError> {
        self.engine.deploy_stronghold(request)
    }

    pub fn queue_object_intent(
        &mut self,
        request: &ObjectIntentRequest,
    ) -> Result<Decision<QueuedObjectIntent>, EngineError> {
        self.engine.queue_object_intent(request)
    }

    pub fn queue_global_intent(
        &mut self,
        request: &GlobalIntentRequest,
    ) -> Result<Decision<QueuedGlobalIntent>, EngineError> {
        self.engine.queue_global_intent(request)
    }

    pub fn sanitize_preview(
        &self,
        name: &str,
        payload: &Value,
        force_array: bool,
    ) -> Decision<Value> {
        self.engine.sanitize_preview(name, payload, force_array)
    }

    pub fn create_capability_unit(
        &mut self,
        user: &str,
        name: &str,
        class: CapabilityClass,
    ) -> Result<Decision<CapabilityUnit>, EngineError> {
        self.engine.create_capability_unit(user, name, class)
    }

    pub fn upgrade_capability_unit(
        &mut self,
        user: &str,
        id: &str,
        targets: &BTreeMap<AbilityKind, u8>,
    ) -> Result<Decision<CapabilityUnit>, EngineError> {
        self.engine.upgrade_capability_unit(user, id, targets)
    }

    pub fn request_delete_capability_unit(
        &mut self,
        user: &str,
        id: &str,
    ) -> Result<Decision<CapabilityUnit>, EngineError> {
        self.engine.request_delete_capability_unit(user, id)
    }

    pub fn cancel_delete_capability_unit(
        &mut self,
        user: &str,
        id: &str,
    ) -> Result<Decision<CapabilityUnit>, EngineError> {
        self.engine.cancel_delete_capability_unit(user, id)
    }

    pub fn commit_due_deletions(&mut self, now: u64) -> Result<Vec<String>, EngineError> {
        self.engine.commit_due_deletions(now)
    }
}
