use super::*;

impl RulesEngine {
    /// Queue an intent against one room object.
    ///
    /// The object must be visible in the named room and shard view and belong
    /// to the caller. The payload is canonicalized against the effective
    /// catalog before it is stored; one pending record survives per
    /// (user, object), so re-queueing within a tick replaces the previous
    /// intent.
    pub fn queue_object_intent(
        &mut self,
        request: &ObjectIntentRequest,
    ) -> Result<Decision<QueuedObjectIntent>, EngineError> {
        let Some(object) = self.store.object(&request.object_id)? else {
            return Ok(Decision::rejected(RejectionReason::UnknownObject));
        };
        let shard = normalize_shard_value(request.shard.clone());
        if normalized_shard(&object.shard) != shard.as_deref() || object.room != request.room {
            return Ok(Decision::rejected(RejectionReason::UnknownObject));
        }
        if object.user.as_deref() != Some(request.user.as_str()) {
            return Ok(Decision::rejected(RejectionReason::NotOwned));
        }

        let record = match self.sanitize_scoped(&request.name, &request.payload, IntentScope::Object)
        {
            Ok(record) => record,
            Err(reason) => return Ok(Decision::rejected(reason)),
        };

        let queued = QueuedObjectIntent {
            user: request.user.clone(),
            shard,
            room: request.room.clone(),
            object_id: request.object_id.clone(),
            intent: record,
        };
        self.store.apply(WorldMutation {
            object_intents: vec![queued.clone()],
            ..WorldMutation::default()
        })?;
        Ok(Decision::accepted(queued))
    }

    /// Append an account-wide intent to the user's ordered log.
    pub fn queue_global_intent(
        &mut self,
        request: &GlobalIntentRequest,
    ) -> Result<Decision<QueuedGlobalIntent>, EngineError> {
        let record = match self.sanitize_scoped(&request.name, &request.payload, IntentScope::Global)
        {
            Ok(record) => record,
            Err(reason) => return Ok(Decision::rejected(reason)),
        };

        let queued = QueuedGlobalIntent {
            user: request.user.clone(),
            shard: normalize_shard_value(request.shard.clone()),
            intent: record,
        };
        self.store.apply(WorldMutation {
            global_intents: vec![queued.clone()],
            ..WorldMutation::default()
        })?;
        Ok(Decision::accepted(queued))
    }

    /// Run one payload through the sanitizer without touching the world.
    pub fn sanitize_preview(
        &self,
        name: &str,
        payload: &Value,
        force_array: bool,
    ) -> Decision<Value> {
        match self.catalog.lookup(name) {
            Some(schema) => match sanitize_with(&schema, payload, force_array) {
                Ok(record) => Decision::accepted(record),
                Err(reason) => Decision::rejected(reason),
            },
            None => Decision::rejected(RejectionReason::UnknownIntent {
                name: name.to_string(),
            }),
        }
    }

    /// An intent submitted on the wrong surface does not exist there.
    fn sanitize_scoped(
        &self,
        name: &str,
        payload: &Value,
        scope: IntentScope,
    ) -> Result<Value, RejectionReason> {
        let schema = self
            .catalog
            .lookup(name)
            .filter(|schema| schema.scope == scope)
            .ok_or_else(|| RejectionReason::UnknownIntent {
                name: name.to_string(),
            })?;
        sanitize_with(&schema, payload, false)
    }
}
