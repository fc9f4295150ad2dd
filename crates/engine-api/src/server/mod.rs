use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;

use axum::extract::{Path, Query, Request, State};
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::Method;
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use contracts::{
    AbilityKind, ApiError, CapabilityClass, CapabilityUnit, Decision, ErrorCode, IntentSchema,
    ObjectKind, QueuedGlobalIntent, QueuedObjectIntent, RejectionReason, RoomObject,
    SCHEMA_VERSION_V1,
};
use engine_core::world::{
    GlobalIntentRequest, ObjectIntentRequest, SiteRequest, SpawnRequest, StrongholdRequest,
};
use engine_core::EngineError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::EngineApi;

include!("error.rs");
include!("state.rs");
include!("routes/mutate.rs");
include!("routes/inspect.rs");
include!("util.rs");

pub async fn serve(addr: SocketAddr, api: EngineApi) -> Result<(), ServerError> {
    let state = AppState::new(api);
    let app = router(state);

    let listener = TcpListener::bind(addr).await?;
    log::info!("engine api listening on {addr}");
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/v1/rooms/{room}/construction-sites",
            post(create_site),
        )
        .route(
            "/api/v1/rooms/{room}/construction-sites/{site_id}",
            delete(remove_site),
        )
        .route("/api/v1/rooms/{room}/spawns", post(create_spawn))
        .route("/api/v1/rooms/{room}/strongholds", post(create_stronghold))
        .route(
            "/api/v1/rooms/{room}/objects/{object_id}/intents",
            post(submit_object_intent),
        )
        .route("/api/v1/rooms/{room}/terrain", get(get_terrain))
        .route("/api/v1/rooms/{room}/objects", get(get_objects))
        .route(
            "/api/v1/users/{user_id}/intents",
            post(submit_global_intent),
        )
        .route(
            "/api/v1/users/{user_id}/capability-units",
            post(create_unit),
        )
        .route(
            "/api/v1/capability-units/{unit_id}/upgrade",
            post(upgrade_unit),
        )
        .route(
            "/api/v1/capability-units/{unit_id}/delete",
            post(request_delete_unit),
        )
        .route(
            "/api/v1/capability-units/{unit_id}/restore",
            post(cancel_delete_unit),
        )
        .route("/api/v1/schemas", get(get_schemas))
        .route("/api/v1/sanitize", post(sanitize_intent))
        .route("/api/v1/time", get(get_time).post(advance_time))
        .layer(middleware::from_fn(cors_middleware))
        .with_state(state)
}

async fn cors_middleware(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = Response::new(axum::body::Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return response;
    }

    let mut response = next.run(request).await;
    apply_cors_headers(response.headers_mut());
    response
}

#[cfg(test)]
mod tests;
