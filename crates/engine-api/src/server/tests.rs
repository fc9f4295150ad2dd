use super::*;

use contracts::EngineConfig;
use engine_core::StoreError;

#[test]
fn accept_passes_values_through() {
    let value = accept(Decision::accepted(7)).expect("accepted decisions pass through");
    assert_eq!(value, 7);
}

#[test]
fn rejections_map_to_unprocessable_entity() {
    let err = accept::<u64>(Decision::rejected(RejectionReason::TileOccupied))
        .expect_err("rejections become http errors");

    assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(err.error.code, ErrorCode::Rejected);
    assert_eq!(err.error.rejection, Some(RejectionReason::TileOccupied));
    assert_eq!(err.error.schema_version, SCHEMA_VERSION_V1);
}

#[test]
fn engine_failures_map_to_internal_error() {
    let err = HttpApiError::from_engine(EngineError::Store(StoreError::Backend(
        "disk unplugged".to_string(),
    )));

    assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(err.error.code, ErrorCode::InternalError);
    assert!(err
        .error
        .details
        .as_deref()
        .is_some_and(|details| details.contains("disk unplugged")));
}

#[test]
fn router_wires_every_route() {
    // axum panics on malformed path patterns at registration time
    let state = AppState::new(EngineApi::in_memory(EngineConfig::default()));
    let _ = router(state);
}
