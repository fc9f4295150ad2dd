#[derive(Debug, Deserialize)]
struct ShardQuery {
    shard: Option<String>,
}

#[derive(Debug, Serialize)]
struct TerrainResponse {
    schema_version: String,
    room: String,
    shard: Option<String>,
    terrain: String,
}

async fn get_terrain(
    Path(room): Path<String>,
    State(state): State<AppState>,
    Query(query): Query<ShardQuery>,
) -> Result<Json<TerrainResponse>, HttpApiError> {
    let terrain = {
        let inner = state.inner.lock().await;
        inner
            .terrain(&room, query.shard.as_deref())
            .map_err(HttpApiError::from_engine)?
    };

    let Some(terrain) = terrain else {
        return Err(HttpApiError::room_not_found(&room));
    };

    Ok(Json(TerrainResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        room,
        shard: query.shard,
        terrain,
    }))
}

#[derive(Debug, Serialize)]
struct RoomObjectsResponse {
    schema_version: String,
    room: String,
    shard: Option<String>,
    objects: Vec<RoomObject>,
}

async fn get_objects(
    Path(room): Path<String>,
    State(state): State<AppState>,
    Query(query): Query<ShardQuery>,
) -> Result<Json<RoomObjectsResponse>, HttpApiError> {
    let objects = {
        let inner = state.inner.lock().await;
        inner
            .objects(&room, query.shard.as_deref())
            .map_err(HttpApiError::from_engine)?
    };

    Ok(Json(RoomObjectsResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        room,
        shard: query.shard,
        objects,
    }))
}

#[derive(Debug, Serialize)]
struct SchemasResponse {
    schema_version: String,
    intents: BTreeMap<String, IntentSchema>,
}

async fn get_schemas(
    State(state): State<AppState>,
) -> Result<Json<SchemasResponse>, HttpApiError> {
    let intents = {
        let inner = state.inner.lock().await;
        inner.schemas()
    };

    Ok(Json(SchemasResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        intents,
    }))
}

#[derive(Debug, Deserialize)]
struct SanitizeBody {
    name: String,
    payload: Value,
    #[serde(default)]
    force_array: bool,
}

#[derive(Debug, Serialize)]
struct SanitizeResponse {
    schema_version: String,
    record: Value,
}

/// Dry-run the sanitizer; nothing is queued.
async fn sanitize_intent(
    State(state): State<AppState>,
    Json(body): Json<SanitizeBody>,
) -> Result<Json<SanitizeResponse>, HttpApiError> {
    let decision = {
        let inner = state.inner.lock().await;
        inner.sanitize_preview(&body.name, &body.payload, body.force_array)
    };

    let record = accept(decision)?;
    Ok(Json(SanitizeResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        record,
    }))
}

#[derive(Debug, Serialize)]
struct TimeResponse {
    schema_version: String,
    time: u64,
}

async fn get_time(State(state): State<AppState>) -> Result<Json<TimeResponse>, HttpApiError> {
    let time = {
        let inner = state.inner.lock().await;
        inner.game_time().map_err(HttpApiError::from_engine)?
    };

    Ok(Json(TimeResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        time,
    }))
}

#[derive(Debug, Deserialize)]
struct AdvanceTimeBody {
    ticks: Option<u64>,
}

#[derive(Debug, Serialize)]
struct AdvanceTimeResponse {
    schema_version: String,
    time: u64,
    removed_units: Vec<String>,
}

async fn advance_time(
    State(state): State<AppState>,
    Json(body): Json<AdvanceTimeBody>,
) -> Result<Json<AdvanceTimeResponse>, HttpApiError> {
    let ticks = body.ticks.unwrap_or(1);
    if ticks == 0 {
        return Err(HttpApiError::invalid_request(
            "ticks must be >= 1",
            Some("ticks=0".to_string()),
        ));
    }

    let advance = {
        let mut inner = state.inner.lock().await;
        inner
            .advance_clock(ticks)
            .map_err(HttpApiError::from_engine)?
    };

    Ok(Json(AdvanceTimeResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        time: advance.time,
        removed_units: advance.removed_units,
    }))
}
