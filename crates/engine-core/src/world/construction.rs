use super::*;

impl RulesEngine {
    /// Validate and create one construction site.
    ///
    /// Runs the full placement ladder against the current room slice; an
    /// accepted request inserts a site with zero progress and the build cost
    /// as its target.
    pub fn create_construction_site(
        &mut self,
        request: &SiteRequest,
    ) -> Result<Decision<RoomObject>, EngineError> {
        let slice = self.room_slice(&request.room, request.shard.as_deref())?;
        let user_site_count = self.store.count_user_sites(&request.user)?;
        let inputs = PlacementInputs {
            terrain: slice.terrain.as_ref(),
            objects: &slice.objects,
            user_site_count,
            quota: &self.quota,
            max_sites: self.config.max_construction_sites,
        };

        let placement =
            match check_site(&request.user, request.kind, request.x, request.y, &inputs) {
                Ok(placement) => placement,
                Err(reason) => return Ok(Decision::rejected(reason)),
            };

        let id = self.allocate_id("site")?;
        let mut site = RoomObject::new(
            id,
            ObjectKind::ConstructionSite,
            request.shard.clone(),
            &request.room,
            placement.x,
            placement.y,
        );
        site.user = Some(request.user.clone());
        site.structure_kind = Some(placement.kind);
        site.progress = Some(0);
        site.progress_total = Some(placement.cost);

        self.store.apply(WorldMutation {
            inserts: vec![site.clone()],
            ..WorldMutation::default()
        })?;
        log::debug!(
            "site {} for {} at {}/{},{} queued (cost {})",
            site.id,
            request.user,
            request.room,
            placement.x,
            placement.y,
            placement.cost
        );
        Ok(Decision::accepted(site))
    }

    /// Remove a construction site.
    ///
    /// The caller must own the site, or own the controller of the room the
    /// site stands in (clearing hostile litter from an owned room).
    pub fn remove_construction_site(
        &mut self,
        user: &str,
        id: &str,
        shard: Option<&str>,
    ) -> Result<Decision<String>, EngineError> {
        let Some(site) = self.store.object(id)? else {
            return Ok(Decision::rejected(RejectionReason::UnknownObject));
        };
        if site.kind != ObjectKind::ConstructionSite {
            return Ok(Decision::rejected(RejectionReason::InvalidArgs));
        }
        let shard = normalize_shard_value(shard.map(str::to_string));
        if normalized_shard(&site.shard) != shard.as_deref() {
            return Ok(Decision::rejected(RejectionReason::UnknownObject));
        }

        if site.user.as_deref() != Some(user) {
            let objects = self
                .store
                .objects_in_room(&site.room, shard.as_deref())?;
            let controls_room = objects.iter().any(|object| {
                object.kind == ObjectKind::Controller && object.user.as_deref() == Some(user)
            });
            if !controls_room {
                return Ok(Decision::rejected(RejectionReason::NotOwned));
            }
        }

        self.store.apply(WorldMutation {
            removes: vec![site.id.clone()],
            ..WorldMutation::default()
        })?;
        Ok(Decision::accepted(site.id))
    }
}
