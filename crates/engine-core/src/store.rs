//! World-state storage seam.
//!
//! [`WorldStore`] is the engine's only view of the persistent world. Reads
//! feed the validators; [`WorldStore::apply`] is the single write path and
//! takes a whole [`WorldMutation`] at once. Errors here are infrastructure
//! failures and never carry rule verdicts.

use std::collections::BTreeMap;
use std::fmt;

use contracts::{
    normalize_shard_value, normalized_shard, CapabilityUnit, ObjectKind, QueuedGlobalIntent,
    QueuedObjectIntent, RoomObject, WorldMutation,
};

#[derive(Debug)]
pub enum StoreError {
    /// The backing store failed (I/O, sql, lock).
    Backend(String),
    /// The store holds data the engine cannot interpret.
    Corrupt(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend(message) => write!(f, "store backend error: {message}"),
            Self::Corrupt(message) => write!(f, "corrupt store data: {message}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Storage backend seam. Implementations must make [`WorldStore::apply`]
/// all-or-nothing: a failed apply leaves the store exactly as it was.
///
/// Every room lookup treats an absent shard and a null shard as the same
/// world, and stored keys are normalized the same way.
pub trait WorldStore: Send {
    fn game_time(&self) -> Result<u64, StoreError>;
    fn set_game_time(&mut self, time: u64) -> Result<(), StoreError>;

    /// Encoded terrain string for a room, if the room is known.
    fn room_terrain(&self, room: &str, shard: Option<&str>) -> Result<Option<String>, StoreError>;
    fn put_room_terrain(
        &mut self,
        room: &str,
        shard: Option<&str>,
        terrain: &str,
    ) -> Result<(), StoreError>;

    fn objects_in_room(
        &self,
        room: &str,
        shard: Option<&str>,
    ) -> Result<Vec<RoomObject>, StoreError>;

    /// Objects standing on one tile of a room.
    fn objects_at(
        &self,
        room: &str,
        shard: Option<&str>,
        x: i64,
        y: i64,
    ) -> Result<Vec<RoomObject>, StoreError> {
        let mut objects = self.objects_in_room(room, shard)?;
        objects.retain(|object| object.x == x && object.y == y);
        Ok(objects)
    }

    fn object(&self, id: &str) -> Result<Option<RoomObject>, StoreError>;

    /// Construction sites a user owns, across all rooms and shards.
    fn count_user_sites(&self, user: &str) -> Result<u32, StoreError>;

    fn unit(&self, id: &str) -> Result<Option<CapabilityUnit>, StoreError>;
    fn units_for_user(&self, user: &str) -> Result<Vec<CapabilityUnit>, StoreError>;
    fn all_units(&self) -> Result<Vec<CapabilityUnit>, StoreError>;

    /// Lifetime progression resource balance; unknown users hold zero.
    fn user_resource(&self, user: &str) -> Result<f64, StoreError>;
    fn set_user_resource(&mut self, user: &str, amount: f64) -> Result<(), StoreError>;

    fn pending_object_intents(&self, user: &str) -> Result<Vec<QueuedObjectIntent>, StoreError>;
    fn pending_global_intents(&self, user: &str) -> Result<Vec<QueuedGlobalIntent>, StoreError>;

    /// Monotonic counter backing object-id allocation. Survives restarts on
    /// durable backends.
    fn next_object_seq(&mut self) -> Result<u64, StoreError>;

    fn apply(&mut self, mutation: WorldMutation) -> Result<(), StoreError>;
}

fn shard_key(shard: Option<&str>) -> Option<String> {
    normalize_shard_value(shard.map(str::to_string))
}

/// BTreeMap-backed reference store. Used by tests and the in-memory API mode.
#[derive(Debug, Default)]
pub struct MemoryStore {
    game_time: u64,
    terrain: BTreeMap<(Option<String>, String), String>,
    objects: BTreeMap<String, RoomObject>,
    units: BTreeMap<String, CapabilityUnit>,
    resources: BTreeMap<String, f64>,
    object_intents: BTreeMap<(String, String), QueuedObjectIntent>,
    global_intents: Vec<QueuedGlobalIntent>,
    object_seq: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorldStore for MemoryStore {
    fn game_time(&self) -> Result<u64, StoreError> {
        Ok(self.game_time)
    }

    fn set_game_time(&mut self, time: u64) -> Result<(), StoreError> {
        self.game_time = time;
        Ok(())
    }

    fn room_terrain(&self, room: &str, shard: Option<&str>) -> Result<Option<String>, StoreError> {
        let key = (shard_key(shard), room.to_string());
        Ok(self.terrain.get(&key).cloned())
    }

    fn put_room_terrain(
        &mut self,
        room: &str,
        shard: Option<&str>,
        terrain: &str,
    ) -> Result<(), StoreError> {
        let key = (shard_key(shard), room.to_string());
        self.terrain.insert(key, terrain.to_string());
        Ok(())
    }

    fn objects_in_room(
        &self,
        room: &str,
        shard: Option<&str>,
    ) -> Result<Vec<RoomObject>, StoreError> {
        let want = shard_key(shard);
        Ok(self
            .objects
            .values()
            .filter(|object| object.room == room && normalized_shard(&object.shard) == want.as_deref())
            .cloned()
            .collect())
    }

    fn object(&self, id: &str) -> Result<Option<RoomObject>, StoreError> {
        Ok(self.objects.get(id).cloned())
    }

    fn count_user_sites(&self, user: &str) -> Result<u32, StoreError> {
        let count = self
            .objects
            .values()
            .filter(|object| {
                object.kind == ObjectKind::ConstructionSite
                    && object.user.as_deref() == Some(user)
            })
            .count();
        Ok(count as u32)
    }

    fn unit(&self, id: &str) -> Result<Option<CapabilityUnit>, StoreError> {
        Ok(self.units.get(id).cloned())
    }

    fn units_for_user(&self, user: &str) -> Result<Vec<CapabilityUnit>, StoreError> {
        Ok(self
            .units
            .values()
            .filter(|unit| unit.user == user)
            .cloned()
            .collect())
    }

    fn all_units(&self) -> Result<Vec<CapabilityUnit>, StoreError> {
        Ok(self.units.values().cloned().collect())
    }

    fn user_resource(&self, user: &str) -> Result<f64, StoreError> {
        Ok(self.resources.get(user).copied().unwrap_or(0.0))
    }

    fn set_user_resource(&mut self, user: &str, amount: f64) -> Result<(), StoreError> {
        self.resources.insert(user.to_string(), amount);
        Ok(())
    }

    fn pending_object_intents(&self, user: &str) -> Result<Vec<QueuedObjectIntent>, StoreError> {
        Ok(self
            .object_intents
            .iter()
            .filter(|((owner, _), _)| owner == user)
            .map(|(_, intent)| intent.clone())
            .collect())
    }

    fn pending_global_intents(&self, user: &str) -> Result<Vec<QueuedGlobalIntent>, StoreError> {
        Ok(self
            .global_intents
            .iter()
            .filter(|intent| intent.user == user)
            .cloned()
            .collect())
    }

    fn next_object_seq(&mut self) -> Result<u64, StoreError> {
        self.object_seq += 1;
        Ok(self.object_seq)
    }

    fn apply(&mut self, mutation: WorldMutation) -> Result<(), StoreError> {
        // Nothing below can fail, so the whole description lands or none of
        // it does. Removes and updates of rows the simulation already took
        // are tolerated no-ops.
        for object in mutation.inserts {
            self.objects.insert(object.id.clone(), object);
        }
        for object in mutation.updates {
            if self.objects.contains_key(&object.id) {
                self.objects.insert(object.id.clone(), object);
            }
        }
        for id in mutation.removes {
            self.objects.remove(&id);
        }
        for unit in mutation.unit_upserts {
            self.units.insert(unit.id.clone(), unit);
        }
        for id in mutation.unit_removes {
            self.units.remove(&id);
        }
        for intent in mutation.object_intents {
            let key = (intent.user.clone(), intent.object_id.clone());
            self.object_intents.insert(key, intent);
        }
        for intent in mutation.global_intents {
            self.global_intents.push(intent);
        }
        for adjustment in mutation.resource_adjustments {
            let balance = self.resources.entry(adjustment.user.clone()).or_insert(0.0);
            *balance += adjustment.delta;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ResourceAdjustment;

    fn object(id: &str, room: &str, shard: Option<&str>, x: i64, y: i64) -> RoomObject {
        let mut object = RoomObject::new(
            id,
            ObjectKind::Extension,
            shard.map(str::to_string),
            room,
            x,
            y,
        );
        object.user = Some("alice".to_string());
        object
    }

    fn insert(store: &mut MemoryStore, objects: Vec<RoomObject>) {
        store
            .apply(WorldMutation {
                inserts: objects,
                ..WorldMutation::default()
            })
            .unwrap();
    }

    #[test]
    fn room_reads_respect_shard_boundaries() {
        let mut store = MemoryStore::new();
        insert(
            &mut store,
            vec![
                object("a", "W1N1", None, 10, 10),
                object("b", "W1N1", Some("shard1"), 10, 10),
                object("c", "W2N2", None, 10, 10),
            ],
        );

        let home = store.objects_in_room("W1N1", None).unwrap();
        assert_eq!(home.len(), 1);
        assert_eq!(home[0].id, "a");

        let remote = store.objects_in_room("W1N1", Some("shard1")).unwrap();
        assert_eq!(remote.len(), 1);
        assert_eq!(remote[0].id, "b");
    }

    #[test]
    fn absent_shard_and_blank_shard_share_keys() {
        let mut store = MemoryStore::new();
        store.put_room_terrain("W1N1", Some("  "), "0").unwrap();
        assert_eq!(store.room_terrain("W1N1", None).unwrap(), Some("0".to_string()));

        let mut shuttered = object("a", "W1N1", None, 3, 3);
        shuttered.shard = Some(String::new());
        insert(&mut store, vec![shuttered]);
        assert_eq!(store.objects_in_room("W1N1", None).unwrap().len(), 1);
    }

    #[test]
    fn objects_at_narrows_to_one_tile() {
        let mut store = MemoryStore::new();
        insert(
            &mut store,
            vec![
                object("a", "W1N1", None, 10, 10),
                object("b", "W1N1", None, 10, 11),
            ],
        );
        let tile = store.objects_at("W1N1", None, 10, 10).unwrap();
        assert_eq!(tile.len(), 1);
        assert_eq!(tile[0].id, "a");
    }

    #[test]
    fn site_counts_filter_kind_and_owner() {
        let mut store = MemoryStore::new();
        let mut site = object("s1", "W1N1", None, 5, 5);
        site.kind = ObjectKind::ConstructionSite;
        let mut foreign = object("s2", "W1N1", None, 6, 6);
        foreign.kind = ObjectKind::ConstructionSite;
        foreign.user = Some("bob".to_string());
        insert(&mut store, vec![site, foreign, object("e1", "W1N1", None, 7, 7)]);

        assert_eq!(store.count_user_sites("alice").unwrap(), 1);
        assert_eq!(store.count_user_sites("bob").unwrap(), 1);
        assert_eq!(store.count_user_sites("carol").unwrap(), 0);
    }

    #[test]
    fn stale_removes_and_updates_are_noops() {
        let mut store = MemoryStore::new();
        insert(&mut store, vec![object("a", "W1N1", None, 1, 1)]);

        let mut ghost = object("ghost", "W1N1", None, 2, 2);
        ghost.hits = Some(50);
        store
            .apply(WorldMutation {
                updates: vec![ghost],
                removes: vec!["also-gone".to_string()],
                ..WorldMutation::default()
            })
            .unwrap();

        assert!(store.object("ghost").unwrap().is_none());
        assert!(store.object("a").unwrap().is_some());
    }

    #[test]
    fn requeued_object_intent_replaces_the_previous_one() {
        let mut store = MemoryStore::new();
        let first = QueuedObjectIntent {
            user: "alice".to_string(),
            shard: None,
            room: "W1N1".to_string(),
            object_id: "c1".to_string(),
            intent: serde_json::json!({"move": {"direction": 1}}),
        };
        let mut second = first.clone();
        second.intent = serde_json::json!({"move": {"direction": 5}});

        store
            .apply(WorldMutation {
                object_intents: vec![first],
                ..WorldMutation::default()
            })
            .unwrap();
        store
            .apply(WorldMutation {
                object_intents: vec![second.clone()],
                ..WorldMutation::default()
            })
            .unwrap();

        let pending = store.pending_object_intents("alice").unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].intent, second.intent);
    }

    #[test]
    fn global_intents_keep_arrival_order() {
        let mut store = MemoryStore::new();
        for label in ["one", "two", "three"] {
            store
                .apply(WorldMutation {
                    global_intents: vec![QueuedGlobalIntent {
                        user: "alice".to_string(),
                        shard: None,
                        intent: serde_json::json!({ "respawn": label }),
                    }],
                    ..WorldMutation::default()
                })
                .unwrap();
        }
        let pending = store.pending_global_intents("alice").unwrap();
        let labels: Vec<&str> = pending
            .iter()
            .map(|entry| entry.intent["respawn"].as_str().unwrap())
            .collect();
        assert_eq!(labels, vec!["one", "two", "three"]);
    }

    #[test]
    fn resource_adjustments_accumulate() {
        let mut store = MemoryStore::new();
        store
            .apply(WorldMutation {
                resource_adjustments: vec![
                    ResourceAdjustment { user: "alice".to_string(), delta: 100.0 },
                    ResourceAdjustment { user: "alice".to_string(), delta: -30.0 },
                ],
                ..WorldMutation::default()
            })
            .unwrap();
        assert_eq!(store.user_resource("alice").unwrap(), 70.0);
        assert_eq!(store.user_resource("bob").unwrap(), 0.0);
    }

    #[test]
    fn object_seq_is_monotonic() {
        let mut store = MemoryStore::new();
        let first = store.next_object_seq().unwrap();
        let second = store.next_object_seq().unwrap();
        assert!(second > first);
    }
}
