//! Intent schema catalog.
//!
//! The effective catalog is the builtin set plus whatever a deployment's
//! extension manifest provides; an extension that reuses a builtin name
//! shadows it. Extensions are reloaded when the source's change marker
//! advances, with a single-flight gate so concurrent callers never stack
//! reloads and never block on one: they get the previous snapshot instead.
//! No failure in the source or the manifest ever surfaces to callers.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Mutex, RwLock, TryLockError};
use std::time::UNIX_EPOCH;

use log::warn;
use serde_json::Value;

use contracts::{FieldDef, FieldKind, IntentSchema, IntentScope};

/// Failure to reach a schema source. Catalog callers never see this; it is
/// logged and the previous snapshot is served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaSourceError {
    pub message: String,
}

impl SchemaSourceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for SchemaSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "schema source unavailable: {}", self.message)
    }
}

impl std::error::Error for SchemaSourceError {}

/// Where extension schemas come from.
pub trait SchemaSource: Send + Sync {
    /// Cheap change detector. The catalog reloads only when this advances.
    fn marker(&self) -> Result<u64, SchemaSourceError>;

    /// Full manifest text.
    fn load(&self) -> Result<String, SchemaSourceError>;
}

/// Extension manifest on disk, with the file's mtime and size as marker.
pub struct FileSchemaSource {
    path: PathBuf,
}

impl FileSchemaSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SchemaSource for FileSchemaSource {
    fn marker(&self) -> Result<u64, SchemaSourceError> {
        let metadata = std::fs::metadata(&self.path)
            .map_err(|err| SchemaSourceError::new(err.to_string()))?;
        let mtime = metadata
            .modified()
            .map_err(|err| SchemaSourceError::new(err.to_string()))?
            .duration_since(UNIX_EPOCH)
            .map(|duration| duration.as_secs())
            .unwrap_or(0);
        Ok(mtime.wrapping_shl(20) ^ metadata.len())
    }

    fn load(&self) -> Result<String, SchemaSourceError> {
        std::fs::read_to_string(&self.path).map_err(|err| SchemaSourceError::new(err.to_string()))
    }
}

#[derive(Default)]
struct ExtensionCache {
    marker: Option<u64>,
    extensions: BTreeMap<String, IntentSchema>,
}

/// Builtin schemas plus cached extensions behind a refresh gate.
pub struct SchemaCatalog {
    builtin: BTreeMap<String, IntentSchema>,
    source: Option<Box<dyn SchemaSource>>,
    cache: RwLock<ExtensionCache>,
    refresh_gate: Mutex<()>,
}

impl SchemaCatalog {
    /// Catalog with the builtin set only.
    pub fn builtin() -> Self {
        Self {
            builtin: builtin_schemas(),
            source: None,
            cache: RwLock::new(ExtensionCache::default()),
            refresh_gate: Mutex::new(()),
        }
    }

    pub fn with_source(source: Box<dyn SchemaSource>) -> Self {
        let mut catalog = Self::builtin();
        catalog.source = Some(source);
        catalog
    }

    pub fn set_source(&mut self, source: Box<dyn SchemaSource>) {
        self.source = Some(source);
        let mut cache = write_lock(&self.cache);
        cache.marker = None;
        cache.extensions.clear();
    }

    /// Snapshot of the effective catalog, extensions shadowing builtins.
    pub fn effective(&self) -> BTreeMap<String, IntentSchema> {
        self.refresh_if_stale();
        let cache = read_lock(&self.cache);
        let mut merged = self.builtin.clone();
        for (name, schema) in cache.extensions.iter() {
            merged.insert(name.clone(), schema.clone());
        }
        merged
    }

    /// Single-schema lookup with the same refresh behavior as [`effective`].
    ///
    /// [`effective`]: SchemaCatalog::effective
    pub fn lookup(&self, name: &str) -> Option<IntentSchema> {
        self.refresh_if_stale();
        {
            let cache = read_lock(&self.cache);
            if let Some(schema) = cache.extensions.get(name) {
                return Some(schema.clone());
            }
        }
        self.builtin.get(name).cloned()
    }

    fn refresh_if_stale(&self) {
        let Some(source) = self.source.as_deref() else {
            return;
        };
        let current = match source.marker() {
            Ok(marker) => marker,
            Err(err) => {
                warn!("serving cached intent schemas: {err}");
                return;
            }
        };
        {
            let cache = read_lock(&self.cache);
            if cache.marker == Some(current) {
                return;
            }
        }

        // One caller reloads; everyone else keeps the previous snapshot.
        let _gate = match self.refresh_gate.try_lock() {
            Ok(gate) => gate,
            Err(TryLockError::WouldBlock) => return,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };
        {
            let cache = read_lock(&self.cache);
            if cache.marker == Some(current) {
                return;
            }
        }

        let text = match source.load() {
            Ok(text) => text,
            Err(err) => {
                warn!("serving cached intent schemas: {err}");
                return;
            }
        };
        let extensions = match parse_manifest(&text) {
            Ok(extensions) => extensions,
            Err(message) => {
                warn!("extension manifest rejected, serving builtin schemas only: {message}");
                BTreeMap::new()
            }
        };

        let mut cache = write_lock(&self.cache);
        cache.marker = Some(current);
        cache.extensions = extensions;
    }
}

fn read_lock(cache: &RwLock<ExtensionCache>) -> std::sync::RwLockReadGuard<'_, ExtensionCache> {
    cache.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_lock(cache: &RwLock<ExtensionCache>) -> std::sync::RwLockWriteGuard<'_, ExtensionCache> {
    cache
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Parses an extension manifest: `{"intents": {name: {"scope": ..,
/// "fields": [[name, kind], ..]}}}`. A malformed document is an error; a
/// malformed entry is skipped so well-formed siblings survive.
pub fn parse_manifest(text: &str) -> Result<BTreeMap<String, IntentSchema>, String> {
    let document: Value =
        serde_json::from_str(text).map_err(|err| format!("manifest is not JSON: {err}"))?;
    let intents = document
        .get("intents")
        .and_then(Value::as_object)
        .ok_or_else(|| "manifest has no 'intents' object".to_string())?;

    let mut schemas = BTreeMap::new();
    for (name, entry) in intents {
        match parse_entry(name, entry) {
            Some(schema) => {
                schemas.insert(name.clone(), schema);
            }
            None => {
                warn!("skipping malformed extension schema '{name}'");
            }
        }
    }
    Ok(schemas)
}

fn parse_entry(name: &str, entry: &Value) -> Option<IntentSchema> {
    let scope = IntentScope::parse(entry.get("scope")?.as_str()?)?;
    let raw_fields = entry.get("fields")?.as_array()?;
    let mut fields = Vec::with_capacity(raw_fields.len());
    for raw in raw_fields {
        let pair = raw.as_array()?;
        if pair.len() != 2 {
            return None;
        }
        let field_name = pair[0].as_str()?;
        let kind = FieldKind::parse(pair[1].as_str()?)?;
        fields.push(FieldDef::new(field_name, kind));
    }
    Some(IntentSchema::new(name, scope, fields))
}

fn object_schema(name: &str, fields: Vec<FieldDef>) -> (String, IntentSchema) {
    (
        name.to_string(),
        IntentSchema::new(name, IntentScope::Object, fields),
    )
}

fn global_schema(name: &str, fields: Vec<FieldDef>) -> (String, IntentSchema) {
    (
        name.to_string(),
        IntentSchema::new(name, IntentScope::Global, fields),
    )
}

fn field(name: &str, kind: FieldKind) -> FieldDef {
    FieldDef::new(name, kind)
}

/// The builtin intent vocabulary.
pub fn builtin_schemas() -> BTreeMap<String, IntentSchema> {
    BTreeMap::from([
        object_schema("move", vec![field("direction", FieldKind::Int)]),
        object_schema("harvest", vec![field("id", FieldKind::String)]),
        object_schema(
            "transfer",
            vec![
                field("id", FieldKind::String),
                field("resource_type", FieldKind::String),
                field("amount", FieldKind::Int),
            ],
        ),
        object_schema(
            "withdraw",
            vec![
                field("id", FieldKind::String),
                field("resource_type", FieldKind::String),
                field("amount", FieldKind::Int),
            ],
        ),
        object_schema("pickup", vec![field("id", FieldKind::String)]),
        object_schema(
            "drop",
            vec![
                field("resource_type", FieldKind::String),
                field("amount", FieldKind::Int),
            ],
        ),
        object_schema("build", vec![field("id", FieldKind::String)]),
        object_schema("repair", vec![field("id", FieldKind::String)]),
        object_schema("dismantle", vec![field("id", FieldKind::String)]),
        object_schema("upgrade_controller", vec![field("id", FieldKind::String)]),
        object_schema("attack", vec![field("id", FieldKind::String)]),
        object_schema("ranged_attack", vec![field("id", FieldKind::String)]),
        object_schema("heal", vec![field("id", FieldKind::String)]),
        object_schema(
            "say",
            vec![
                field("message", FieldKind::UserString),
                field("public", FieldKind::Bool),
            ],
        ),
        object_schema(
            "sign",
            vec![
                field("id", FieldKind::String),
                field("text", FieldKind::UserText),
            ],
        ),
        object_schema("set_public", vec![field("public", FieldKind::Bool)]),
        object_schema("recycle", vec![field("id", FieldKind::String)]),
        object_schema(
            "spawn_creep",
            vec![
                field("name", FieldKind::UserString),
                field("body", FieldKind::BodyPartArray),
                field("directions", FieldKind::IntArray),
                field("energy_structures", FieldKind::StringArray),
            ],
        ),
        object_schema("notify_attacked", vec![field("enabled", FieldKind::Bool)]),
        global_schema("respawn", vec![]),
        global_schema("abandon_room", vec![field("room", FieldKind::String)]),
        global_schema(
            "create_order",
            vec![
                field("order_type", FieldKind::String),
                field("resource_type", FieldKind::String),
                field("price", FieldKind::Price),
                field("total_amount", FieldKind::Int),
                field("room", FieldKind::String),
            ],
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StaticSource {
        marker: AtomicU64,
        manifest: Mutex<String>,
        loads: AtomicUsize,
        fail_marker: AtomicU64,
    }

    impl StaticSource {
        fn new(manifest: &str) -> Self {
            Self {
                marker: AtomicU64::new(1),
                manifest: Mutex::new(manifest.to_string()),
                loads: AtomicUsize::new(0),
                fail_marker: AtomicU64::new(0),
            }
        }

        fn bump(&self, manifest: &str) {
            *self.manifest.lock().expect("manifest lock") = manifest.to_string();
            self.marker.fetch_add(1, Ordering::SeqCst);
        }

        fn load_count(&self) -> usize {
            self.loads.load(Ordering::SeqCst)
        }
    }

    impl SchemaSource for Arc<StaticSource> {
        fn marker(&self) -> Result<u64, SchemaSourceError> {
            if self.fail_marker.load(Ordering::SeqCst) != 0 {
                return Err(SchemaSourceError::new("marker probe failed"));
            }
            Ok(self.marker.load(Ordering::SeqCst))
        }

        fn load(&self) -> Result<String, SchemaSourceError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(self.manifest.lock().expect("manifest lock").clone())
        }
    }

    const EXTENSION_MANIFEST: &str = r#"{
        "intents": {
            "orbital_scan": {
                "scope": "object",
                "fields": [["target_id", "string"], ["depth", "int"]]
            },
            "harvest": {
                "scope": "object",
                "fields": [["id", "string"], ["boosted", "bool"]]
            }
        }
    }"#;

    #[test]
    fn builtin_catalog_covers_every_field_kind() {
        let schemas = builtin_schemas();
        let mut seen = Vec::new();
        for schema in schemas.values() {
            for field in &schema.fields {
                if !seen.contains(&field.kind) {
                    seen.push(field.kind);
                }
            }
        }
        assert_eq!(seen.len(), 9, "kinds exercised: {seen:?}");
    }

    #[test]
    fn extensions_extend_and_shadow_builtins() {
        let source = Arc::new(StaticSource::new(EXTENSION_MANIFEST));
        let catalog = SchemaCatalog::with_source(Box::new(Arc::clone(&source)));

        let effective = catalog.effective();
        assert!(effective.contains_key("orbital_scan"));
        // shadowed builtin gains the extension's extra field
        let harvest = effective.get("harvest").expect("harvest schema");
        assert_eq!(harvest.fields.len(), 2);
        assert_eq!(harvest.fields[1].name, "boosted");
        // untouched builtin survives
        assert!(effective.contains_key("transfer"));
    }

    #[test]
    fn unparsable_manifest_degrades_to_builtin_only() {
        let source = Arc::new(StaticSource::new("{ not json"));
        let catalog = SchemaCatalog::with_source(Box::new(Arc::clone(&source)));

        let effective = catalog.effective();
        assert_eq!(effective.len(), builtin_schemas().len());
        assert!(effective.contains_key("harvest"));

        // a later good manifest recovers once the marker advances
        source.bump(EXTENSION_MANIFEST);
        assert!(catalog.effective().contains_key("orbital_scan"));
    }

    #[test]
    fn malformed_entry_is_skipped_not_fatal() {
        let manifest = r#"{
            "intents": {
                "good": {"scope": "global", "fields": [["note", "user_text"]]},
                "bad_kind": {"scope": "object", "fields": [["x", "float"]]},
                "bad_scope": {"scope": "room", "fields": []}
            }
        }"#;
        let schemas = parse_manifest(manifest).expect("manifest parses");
        assert!(schemas.contains_key("good"));
        assert!(!schemas.contains_key("bad_kind"));
        assert!(!schemas.contains_key("bad_scope"));
    }

    #[test]
    fn unreachable_source_serves_previous_snapshot() {
        let source = Arc::new(StaticSource::new(EXTENSION_MANIFEST));
        let catalog = SchemaCatalog::with_source(Box::new(Arc::clone(&source)));
        assert!(catalog.effective().contains_key("orbital_scan"));

        source.fail_marker.store(1, Ordering::SeqCst);
        let effective = catalog.effective();
        assert!(effective.contains_key("orbital_scan"));
    }

    #[test]
    fn marker_stability_skips_reloads() {
        let source = Arc::new(StaticSource::new(EXTENSION_MANIFEST));
        let catalog = SchemaCatalog::with_source(Box::new(Arc::clone(&source)));
        for _ in 0..20 {
            let _ = catalog.effective();
            let _ = catalog.lookup("harvest");
        }
        assert_eq!(source.load_count(), 1);
    }

    #[test]
    fn concurrent_refresh_is_single_flight() {
        let source = Arc::new(StaticSource::new(EXTENSION_MANIFEST));
        let catalog = SchemaCatalog::with_source(Box::new(Arc::clone(&source)));
        let _ = catalog.effective();
        assert_eq!(source.load_count(), 1);

        source.bump(EXTENSION_MANIFEST);
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..50 {
                        let effective = catalog.effective();
                        assert!(effective.contains_key("harvest"));
                    }
                });
            }
        });
        assert_eq!(source.load_count(), 2);
    }
}
