//! SQLite-backed [`WorldStore`].
//!
//! One database file holds the whole world: terrain, room objects,
//! capability units, resource balances, pending intents, and the engine
//! clock. Rows carry the canonical record as a JSON payload next to the
//! columns the store filters on. [`WorldStore::apply`] runs inside a single
//! transaction, so a failed write leaves the previous world intact.

use std::fmt;
use std::path::Path;

use contracts::{
    normalized_shard, CapabilityUnit, ObjectKind, QueuedGlobalIntent, QueuedObjectIntent,
    RoomObject, WorldMutation,
};
use engine_core::{StoreError, WorldStore};
use rusqlite::{params, Connection, OptionalExtension, Transaction};

const META_GAME_TIME: &str = "game_time";
const META_OBJECT_SEQ: &str = "object_seq";

#[derive(Debug)]
pub enum PersistenceError {
    Sqlite(rusqlite::Error),
    Serde(serde_json::Error),
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite error: {err}"),
            Self::Serde(err) => write!(f, "serde error: {err}"),
        }
    }
}

impl std::error::Error for PersistenceError {}

impl From<rusqlite::Error> for PersistenceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value)
    }
}

impl From<PersistenceError> for StoreError {
    fn from(value: PersistenceError) -> Self {
        match value {
            PersistenceError::Sqlite(err) => StoreError::Backend(err.to_string()),
            PersistenceError::Serde(err) => StoreError::Corrupt(err.to_string()),
        }
    }
}

#[derive(Debug)]
pub struct SqliteWorldStore {
    conn: Connection,
}

impl SqliteWorldStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path)?;
        let mut store = Self { conn };
        store.configure()?;
        store.migrate()?;
        Ok(store)
    }

    fn configure(&mut self) -> Result<(), PersistenceError> {
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    }

    fn migrate(&mut self) -> Result<(), PersistenceError> {
        // The shard column stores '' for the unsharded world; every lookup
        // normalizes the same way, so absent and null shard share rows.
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS rooms_terrain (
                room TEXT NOT NULL,
                shard TEXT NOT NULL,
                terrain TEXT NOT NULL,
                PRIMARY KEY (room, shard)
            );

            CREATE TABLE IF NOT EXISTS room_objects (
                id TEXT PRIMARY KEY,
                room TEXT NOT NULL,
                shard TEXT NOT NULL,
                x INTEGER NOT NULL,
                y INTEGER NOT NULL,
                kind TEXT NOT NULL,
                user TEXT,
                payload_json TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS capability_units (
                id TEXT PRIMARY KEY,
                user TEXT NOT NULL,
                payload_json TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS user_resources (
                user TEXT PRIMARY KEY,
                amount REAL NOT NULL
            );

            CREATE TABLE IF NOT EXISTS object_intents (
                user TEXT NOT NULL,
                object_id TEXT NOT NULL,
                payload_json TEXT NOT NULL,
                PRIMARY KEY (user, object_id)
            );

            CREATE TABLE IF NOT EXISTS global_intents (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                user TEXT NOT NULL,
                payload_json TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS engine_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_room_objects_room ON room_objects(shard, room);
            CREATE INDEX IF NOT EXISTS idx_room_objects_user_kind ON room_objects(user, kind);
            CREATE INDEX IF NOT EXISTS idx_capability_units_user ON capability_units(user);
            CREATE INDEX IF NOT EXISTS idx_global_intents_user ON global_intents(user, seq);
            ",
        )?;
        Ok(())
    }

    fn meta_u64(&self, key: &str) -> Result<Option<u64>, PersistenceError> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM engine_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.and_then(|raw| raw.parse::<u64>().ok()))
    }

    fn meta_put(&mut self, key: &str, value: u64) -> Result<(), PersistenceError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO engine_meta (key, value) VALUES (?1, ?2)",
            params![key, value.to_string()],
        )?;
        Ok(())
    }

    fn load_units(&self, sql: &str, filter: Option<&str>) -> Result<Vec<CapabilityUnit>, PersistenceError> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut units = Vec::new();
        match filter {
            Some(value) => {
                let rows = stmt.query_map(params![value], |row| row.get::<_, String>(0))?;
                for row in rows {
                    units.push(serde_json::from_str::<CapabilityUnit>(&row?)?);
                }
            }
            None => {
                let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                for row in rows {
                    units.push(serde_json::from_str::<CapabilityUnit>(&row?)?);
                }
            }
        }
        Ok(units)
    }

    fn apply_tx(&mut self, mutation: WorldMutation) -> Result<(), PersistenceError> {
        let tx = self.conn.transaction()?;

        for object in &mutation.inserts {
            upsert_object(&tx, object)?;
        }
        // Updates of rows the simulation already took must stay no-ops, so
        // they go through UPDATE rather than an upsert.
        for object in &mutation.updates {
            let payload_json = serde_json::to_string(object)?;
            tx.execute(
                "UPDATE room_objects
                 SET room = ?2, shard = ?3, x = ?4, y = ?5, kind = ?6, user = ?7, payload_json = ?8
                 WHERE id = ?1",
                params![
                    object.id.as_str(),
                    object.room.as_str(),
                    object_shard_column(object),
                    object.x,
                    object.y,
                    object.kind.as_str(),
                    object.user.as_deref(),
                    payload_json,
                ],
            )?;
        }
        for id in &mutation.removes {
            tx.execute("DELETE FROM room_objects WHERE id = ?1", params![id.as_str()])?;
        }

        for unit in &mutation.unit_upserts {
            let payload_json = serde_json::to_string(unit)?;
            tx.execute(
                "INSERT OR REPLACE INTO capability_units (id, user, payload_json)
                 VALUES (?1, ?2, ?3)",
                params![unit.id.as_str(), unit.user.as_str(), payload_json],
            )?;
        }
        for id in &mutation.unit_removes {
            tx.execute(
                "DELETE FROM capability_units WHERE id = ?1",
                params![id.as_str()],
            )?;
        }

        for intent in &mutation.object_intents {
            let payload_json = serde_json::to_string(intent)?;
            tx.execute(
                "INSERT OR REPLACE INTO object_intents (user, object_id, payload_json)
                 VALUES (?1, ?2, ?3)",
                params![intent.user.as_str(), intent.object_id.as_str(), payload_json],
            )?;
        }
        for intent in &mutation.global_intents {
            let payload_json = serde_json::to_string(intent)?;
            tx.execute(
                "INSERT INTO global_intents (user, payload_json) VALUES (?1, ?2)",
                params![intent.user.as_str(), payload_json],
            )?;
        }

        for adjustment in &mutation.resource_adjustments {
            tx.execute(
                "INSERT INTO user_resources (user, amount) VALUES (?1, ?2)
                 ON CONFLICT(user) DO UPDATE SET amount = amount + excluded.amount",
                params![adjustment.user.as_str(), adjustment.delta],
            )?;
        }

        tx.commit()?;
        Ok(())
    }
}

impl WorldStore for SqliteWorldStore {
    fn game_time(&self) -> Result<u64, StoreError> {
        Ok(self.meta_u64(META_GAME_TIME)?.unwrap_or(0))
    }

    fn set_game_time(&mut self, time: u64) -> Result<(), StoreError> {
        Ok(self.meta_put(META_GAME_TIME, time)?)
    }

    fn room_terrain(&self, room: &str, shard: Option<&str>) -> Result<Option<String>, StoreError> {
        let terrain: Option<String> = self
            .conn
            .query_row(
                "SELECT terrain FROM rooms_terrain WHERE room = ?1 AND shard = ?2",
                params![room, shard_column(shard)],
                |row| row.get(0),
            )
            .optional()
            .map_err(PersistenceError::from)?;
        Ok(terrain)
    }

    fn put_room_terrain(
        &mut self,
        room: &str,
        shard: Option<&str>,
        terrain: &str,
    ) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO rooms_terrain (room, shard, terrain) VALUES (?1, ?2, ?3)",
                params![room, shard_column(shard), terrain],
            )
            .map_err(PersistenceError::from)?;
        Ok(())
    }

    fn objects_in_room(
        &self,
        room: &str,
        shard: Option<&str>,
    ) -> Result<Vec<RoomObject>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT payload_json FROM room_objects
                 WHERE shard = ?1 AND room = ?2
                 ORDER BY id ASC",
            )
            .map_err(PersistenceError::from)?;
        let rows = stmt
            .query_map(params![shard_column(shard), room], |row| {
                row.get::<_, String>(0)
            })
            .map_err(PersistenceError::from)?;

        let mut objects = Vec::new();
        for row in rows {
            let payload = row.map_err(PersistenceError::from)?;
            objects.push(
                serde_json::from_str::<RoomObject>(&payload).map_err(PersistenceError::from)?,
            );
        }
        Ok(objects)
    }

    fn object(&self, id: &str) -> Result<Option<RoomObject>, StoreError> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload_json FROM room_objects WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .map_err(PersistenceError::from)?;
        match payload {
            Some(raw) => Ok(Some(
                serde_json::from_str::<RoomObject>(&raw).map_err(PersistenceError::from)?,
            )),
            None => Ok(None),
        }
    }

    fn count_user_sites(&self, user: &str) -> Result<u32, StoreError> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM room_objects WHERE user = ?1 AND kind = ?2",
                params![user, ObjectKind::ConstructionSite.as_str()],
                |row| row.get(0),
            )
            .map_err(PersistenceError::from)?;
        Ok(count as u32)
    }

    fn unit(&self, id: &str) -> Result<Option<CapabilityUnit>, StoreError> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload_json FROM capability_units WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .map_err(PersistenceError::from)?;
        match payload {
            Some(raw) => Ok(Some(
                serde_json::from_str::<CapabilityUnit>(&raw).map_err(PersistenceError::from)?,
            )),
            None => Ok(None),
        }
    }

    fn units_for_user(&self, user: &str) -> Result<Vec<CapabilityUnit>, StoreError> {
        Ok(self.load_units(
            "SELECT payload_json FROM capability_units WHERE user = ?1 ORDER BY id ASC",
            Some(user),
        )?)
    }

    fn all_units(&self) -> Result<Vec<CapabilityUnit>, StoreError> {
        Ok(self.load_units(
            "SELECT payload_json FROM capability_units ORDER BY id ASC",
            None,
        )?)
    }

    fn user_resource(&self, user: &str) -> Result<f64, StoreError> {
        let amount: Option<f64> = self
            .conn
            .query_row(
                "SELECT amount FROM user_resources WHERE user = ?1",
                params![user],
                |row| row.get(0),
            )
            .optional()
            .map_err(PersistenceError::from)?;
        Ok(amount.unwrap_or(0.0))
    }

    fn set_user_resource(&mut self, user: &str, amount: f64) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO user_resources (user, amount) VALUES (?1, ?2)",
                params![user, amount],
            )
            .map_err(PersistenceError::from)?;
        Ok(())
    }

    fn pending_object_intents(&self, user: &str) -> Result<Vec<QueuedObjectIntent>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT payload_json FROM object_intents
                 WHERE user = ?1
                 ORDER BY object_id ASC",
            )
            .map_err(PersistenceError::from)?;
        let rows = stmt
            .query_map(params![user], |row| row.get::<_, String>(0))
            .map_err(PersistenceError::from)?;

        let mut intents = Vec::new();
        for row in rows {
            let payload = row.map_err(PersistenceError::from)?;
            intents.push(
                serde_json::from_str::<QueuedObjectIntent>(&payload)
                    .map_err(PersistenceError::from)?,
            );
        }
        Ok(intents)
    }

    fn pending_global_intents(&self, user: &str) -> Result<Vec<QueuedGlobalIntent>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT payload_json FROM global_intents
                 WHERE user = ?1
                 ORDER BY seq ASC",
            )
            .map_err(PersistenceError::from)?;
        let rows = stmt
            .query_map(params![user], |row| row.get::<_, String>(0))
            .map_err(PersistenceError::from)?;

        let mut intents = Vec::new();
        for row in rows {
            let payload = row.map_err(PersistenceError::from)?;
            intents.push(
                serde_json::from_str::<QueuedGlobalIntent>(&payload)
                    .map_err(PersistenceError::from)?,
            );
        }
        Ok(intents)
    }

    fn next_object_seq(&mut self) -> Result<u64, StoreError> {
        let next = self.meta_u64(META_OBJECT_SEQ)?.unwrap_or(0) + 1;
        self.meta_put(META_OBJECT_SEQ, next)?;
        Ok(next)
    }

    fn apply(&mut self, mutation: WorldMutation) -> Result<(), StoreError> {
        Ok(self.apply_tx(mutation)?)
    }
}

fn upsert_object(tx: &Transaction<'_>, object: &RoomObject) -> Result<(), PersistenceError> {
    let payload_json = serde_json::to_string(object)?;
    tx.execute(
        "INSERT OR REPLACE INTO room_objects (id, room, shard, x, y, kind, user, payload_json)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            object.id.as_str(),
            object.room.as_str(),
            object_shard_column(object),
            object.x,
            object.y,
            object.kind.as_str(),
            object.user.as_deref(),
            payload_json,
        ],
    )?;
    Ok(())
}

fn shard_column(shard: Option<&str>) -> &str {
    match shard.map(str::trim) {
        Some(value) if !value.is_empty() => value,
        _ => "",
    }
}

fn object_shard_column(object: &RoomObject) -> &str {
    normalized_shard(&object.shard).unwrap_or("")
}
