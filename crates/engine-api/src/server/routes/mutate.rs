#[derive(Debug, Serialize)]
struct ObjectResponse {
    schema_version: String,
    object: RoomObject,
}

#[derive(Debug, Serialize)]
struct UnitResponse {
    schema_version: String,
    unit: CapabilityUnit,
}

#[derive(Debug, Deserialize)]
struct SiteBody {
    user: String,
    #[serde(default)]
    shard: Option<String>,
    kind: ObjectKind,
    x: i64,
    y: i64,
}

async fn create_site(
    Path(room): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<SiteBody>,
) -> Result<Json<ObjectResponse>, HttpApiError> {
    let decision = {
        let mut inner = state.inner.lock().await;
        inner
            .create_construction_site(&SiteRequest {
                user: body.user,
                shard: body.shard,
                room,
                kind: body.kind,
                x: body.x,
                y: body.y,
            })
            .map_err(HttpApiError::from_engine)?
    };

    let site = accept(decision)?;
    Ok(Json(ObjectResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        object: site,
    }))
}

#[derive(Debug, Deserialize)]
struct RemoveSiteQuery {
    user: String,
    shard: Option<String>,
}

#[derive(Debug, Serialize)]
struct RemovedSiteResponse {
    schema_version: String,
    removed_id: String,
}

async fn remove_site(
    Path((_room, site_id)): Path<(String, String)>,
    State(state): State<AppState>,
    Query(query): Query<RemoveSiteQuery>,
) -> Result<Json<RemovedSiteResponse>, HttpApiError> {
    let decision = {
        let mut inner = state.inner.lock().await;
        inner
            .remove_construction_site(&query.user, &site_id, query.shard.as_deref())
            .map_err(HttpApiError::from_engine)?
    };

    let removed_id = accept(decision)?;
    Ok(Json(RemovedSiteResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        removed_id,
    }))
}

#[derive(Debug, Deserialize)]
struct SpawnBody {
    user: String,
    #[serde(default)]
    shard: Option<String>,
    x: i64,
    y: i64,
    #[serde(default)]
    name: Option<String>,
}

async fn create_spawn(
    Path(room): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<SpawnBody>,
) -> Result<Json<ObjectResponse>, HttpApiError> {
    let decision = {
        let mut inner = state.inner.lock().await;
        inner
            .place_spawn(&SpawnRequest {
                user: body.user,
                shard: body.shard,
                room,
                x: body.x,
                y: body.y,
                name: body.name,
            })
            .map_err(HttpApiError::from_engine)?
    };

    let spawn = accept(decision)?;
    Ok(Json(ObjectResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        object: spawn,
    }))
}

#[derive(Debug, Deserialize)]
struct StrongholdBody {
    #[serde(default)]
    shard: Option<String>,
    blueprint: String,
    #[serde(default)]
    origin: Option<(i64, i64)>,
    level: u8,
}

#[derive(Debug, Serialize)]
struct StrongholdResponse {
    schema_version: String,
    objects: Vec<RoomObject>,
}

async fn create_stronghold(
    Path(room): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<StrongholdBody>,
) -> Result<Json<StrongholdResponse>, HttpApiError> {
    let decision = {
        let mut inner = state.inner.lock().await;
        inner
            .deploy_stronghold(&StrongholdRequest {
                shard: body.shard,
                room,
                blueprint: body.blueprint,
                origin: body.origin,
                level: body.level,
            })
            .map_err(HttpApiError::from_engine)?
    };

    let objects = accept(decision)?;
    Ok(Json(StrongholdResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        objects,
    }))
}

#[derive(Debug, Deserialize)]
struct ObjectIntentBody {
    user: String,
    #[serde(default)]
    shard: Option<String>,
    name: String,
    payload: Value,
}

#[derive(Debug, Serialize)]
struct QueuedObjectIntentResponse {
    schema_version: String,
    queued: QueuedObjectIntent,
}

async fn submit_object_intent(
    Path((room, object_id)): Path<(String, String)>,
    State(state): State<AppState>,
    Json(body): Json<ObjectIntentBody>,
) -> Result<Json<QueuedObjectIntentResponse>, HttpApiError> {
    let decision = {
        let mut inner = state.inner.lock().await;
        inner
            .queue_object_intent(&ObjectIntentRequest {
                user: body.user,
                shard: body.shard,
                room,
                object_id,
                name: body.name,
                payload: body.payload,
            })
            .map_err(HttpApiError::from_engine)?
    };

    let queued = accept(decision)?;
    Ok(Json(QueuedObjectIntentResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        queued,
    }))
}

#[derive(Debug, Deserialize)]
struct GlobalIntentBody {
    #[serde(default)]
    shard: Option<String>,
    name: String,
    payload: Value,
}

#[derive(Debug, Serialize)]
struct QueuedGlobalIntentResponse {
    schema_version: String,
    queued: QueuedGlobalIntent,
}

async fn submit_global_intent(
    Path(user_id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<GlobalIntentBody>,
) -> Result<Json<QueuedGlobalIntentResponse>, HttpApiError> {
    let decision = {
        let mut inner = state.inner.lock().await;
        inner
            .queue_global_intent(&GlobalIntentRequest {
                user: user_id,
                shard: body.shard,
                name: body.name,
                payload: body.payload,
            })
            .map_err(HttpApiError::from_engine)?
    };

    let queued = accept(decision)?;
    Ok(Json(QueuedGlobalIntentResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        queued,
    }))
}

#[derive(Debug, Deserialize)]
struct CreateUnitBody {
    name: String,
    class: CapabilityClass,
}

async fn create_unit(
    Path(user_id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<CreateUnitBody>,
) -> Result<Json<UnitResponse>, HttpApiError> {
    let decision = {
        let mut inner = state.inner.lock().await;
        inner
            .create_capability_unit(&user_id, &body.name, body.class)
            .map_err(HttpApiError::from_engine)?
    };

    let unit = accept(decision)?;
    Ok(Json(UnitResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        unit,
    }))
}

#[derive(Debug, Deserialize)]
struct UpgradeUnitBody {
    user: String,
    abilities: BTreeMap<AbilityKind, u8>,
}

async fn upgrade_unit(
    Path(unit_id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<UpgradeUnitBody>,
) -> Result<Json<UnitResponse>, HttpApiError> {
    let decision = {
        let mut inner = state.inner.lock().await;
        inner
            .upgrade_capability_unit(&body.user, &unit_id, &body.abilities)
            .map_err(HttpApiError::from_engine)?
    };

    let unit = accept(decision)?;
    Ok(Json(UnitResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        unit,
    }))
}

#[derive(Debug, Deserialize)]
struct UnitOwnerBody {
    user: String,
}

async fn request_delete_unit(
    Path(unit_id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<UnitOwnerBody>,
) -> Result<Json<UnitResponse>, HttpApiError> {
    let decision = {
        let mut inner = state.inner.lock().await;
        inner
            .request_delete_capability_unit(&body.user, &unit_id)
            .map_err(HttpApiError::from_engine)?
    };

    let unit = accept(decision)?;
    Ok(Json(UnitResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        unit,
    }))
}

async fn cancel_delete_unit(
    Path(unit_id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<UnitOwnerBody>,
) -> Result<Json<UnitResponse>, HttpApiError> {
    let decision = {
        let mut inner = state.inner.lock().await;
        inner
            .cancel_delete_capability_unit(&body.user, &unit_id)
            .map_err(HttpApiError::from_engine)?
    };

    let unit = accept(decision)?;
    Ok(Json(UnitResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        unit,
    }))
}
