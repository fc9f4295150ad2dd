//! Intent pipeline scenarios: extension manifests on disk, catalog refresh,
//! sanitization, and the pending queues, all through the engine surface.

use std::fs;
use std::path::PathBuf;

use contracts::{Decision, EngineConfig, ObjectKind, RejectionReason, RoomObject, WorldMutation};
use engine_core::schema::FileSchemaSource;
use engine_core::terrain::{self, TerrainGrid};
use engine_core::world::{GlobalIntentRequest, ObjectIntentRequest};
use engine_core::{MemoryStore, RulesEngine, WorldStore};
use serde_json::json;

fn temp_manifest_path(name: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("time should be monotonic")
        .as_nanos();

    std::env::temp_dir().join(format!("shardfall_schemas_{name}_{nanos}.json"))
}

fn engine_with_creep() -> RulesEngine {
    let mut store = MemoryStore::new();
    store
        .put_room_terrain("W1N1", None, &terrain::encode(&TerrainGrid::open_field()))
        .expect("seed terrain");
    let mut creep = RoomObject::new("creep-1", ObjectKind::Creep, None, "W1N1", 10, 10);
    creep.user = Some("alice".to_string());
    store
        .apply(WorldMutation {
            inserts: vec![creep],
            ..WorldMutation::default()
        })
        .expect("seed creep");
    RulesEngine::new(Box::new(store), EngineConfig::default())
}

fn object_intent(name: &str, payload: serde_json::Value) -> ObjectIntentRequest {
    ObjectIntentRequest {
        user: "alice".to_string(),
        shard: None,
        room: "W1N1".to_string(),
        object_id: "creep-1".to_string(),
        name: name.to_string(),
        payload,
    }
}

fn accepted<T>(decision: Decision<T>) -> T {
    match decision {
        Decision::Accepted { value } => value,
        Decision::Rejected { reason } => panic!("unexpected rejection: {reason}"),
    }
}

#[test]
fn extension_manifests_extend_and_shadow_builtins() {
    let path = temp_manifest_path("extend");
    fs::write(
        &path,
        r#"{"intents": {"overdrive": {"scope": "object", "fields": [["target", "string"], ["power", "int"]]}}}"#,
    )
    .expect("write manifest");

    let mut engine = engine_with_creep();
    engine.set_schema_source(Box::new(FileSchemaSource::new(&path)));

    let queued = accepted(
        engine
            .queue_object_intent(&object_intent(
                "overdrive",
                json!({"target": "creep-9", "power": "7", "extra": 1}),
            ))
            .expect("engine"),
    );
    assert_eq!(
        queued.intent,
        json!({"overdrive": {"target": "creep-9", "power": 7}})
    );

    // a longer manifest shadowing a builtin; the length change moves the
    // source marker even inside one mtime tick
    fs::write(
        &path,
        r#"{"intents": {"overdrive": {"scope": "object", "fields": [["target", "string"], ["power", "int"]]}, "move": {"scope": "object", "fields": [["direction", "int"], ["sprint", "bool"]]}}}"#,
    )
    .expect("rewrite manifest");

    let shadowed = engine
        .queue_object_intent(&object_intent("move", json!({"direction": 3})))
        .expect("engine");
    assert_eq!(
        shadowed.rejection(),
        Some(&RejectionReason::MissingField {
            field: "sprint".to_string()
        })
    );

    fs::remove_file(&path).ok();
}

#[test]
fn broken_manifests_degrade_to_builtins() {
    let path = temp_manifest_path("broken");
    fs::write(&path, "{ not json").expect("write manifest");

    let mut engine = engine_with_creep();
    engine.set_schema_source(Box::new(FileSchemaSource::new(&path)));

    // the builtin catalog keeps serving
    assert!(engine.schemas().contains_key("move"));
    let queued = accepted(
        engine
            .queue_object_intent(&object_intent("move", json!({"direction": 4})))
            .expect("engine"),
    );
    assert_eq!(queued.intent, json!({"move": {"direction": 4}}));

    fs::remove_file(&path).ok();
}

#[test]
fn canonical_records_keep_schema_field_order() {
    let mut engine = engine_with_creep();
    // payload keys deliberately reversed relative to the schema
    let queued = accepted(
        engine
            .queue_object_intent(&object_intent(
                "spawn_creep",
                json!({
                    "energy_structures": ["s1"],
                    "directions": [1, 2],
                    "body": ["work", "carry", "move"],
                    "name": "worker1",
                }),
            ))
            .expect("engine"),
    );

    let rendered = serde_json::to_string(&queued.intent).expect("serialize record");
    let position = |field: &str| {
        rendered
            .find(&format!("\"{field}\""))
            .unwrap_or_else(|| panic!("{field} missing from {rendered}"))
    };
    assert!(position("name") < position("body"));
    assert!(position("body") < position("directions"));
    assert!(position("directions") < position("energy_structures"));
}

#[test]
fn user_strings_truncate_on_the_way_in() {
    let mut engine = engine_with_creep();
    let long_message: String = "x".repeat(150);
    let queued = accepted(
        engine
            .queue_object_intent(&object_intent(
                "say",
                json!({"message": long_message, "public": 1}),
            ))
            .expect("engine"),
    );

    let stored = queued.intent["say"]["message"]
        .as_str()
        .expect("message is a string");
    assert_eq!(stored.chars().count(), 100);
    assert_eq!(queued.intent["say"]["public"], json!(true));
}

#[test]
fn body_part_arrays_drop_unknown_parts() {
    let mut engine = engine_with_creep();
    let queued = accepted(
        engine
            .queue_object_intent(&object_intent(
                "spawn_creep",
                json!({
                    "name": "worker1",
                    "body": ["work", "claw", "move", 7],
                    "directions": 3,
                    "energy_structures": [],
                }),
            ))
            .expect("engine"),
    );

    assert_eq!(
        queued.intent["spawn_creep"]["body"],
        json!(["work", "move"])
    );
    // scalar promoted into a one-element array
    assert_eq!(queued.intent["spawn_creep"]["directions"], json!([3]));
}

#[test]
fn object_and_global_queues_stay_separate() {
    let mut engine = engine_with_creep();

    accepted(
        engine
            .queue_object_intent(&object_intent("move", json!({"direction": 1})))
            .expect("engine"),
    );
    accepted(
        engine
            .queue_global_intent(&GlobalIntentRequest {
                user: "alice".to_string(),
                shard: None,
                name: "respawn".to_string(),
                payload: json!({}),
            })
            .expect("engine"),
    );

    assert_eq!(engine.pending_object_intents("alice").expect("engine").len(), 1);
    let global = engine.pending_global_intents("alice").expect("engine");
    assert_eq!(global.len(), 1);
    assert_eq!(global[0].intent, json!({"respawn": {}}));
}
