use super::*;

impl RulesEngine {
    /// Create a level-0 capability unit.
    ///
    /// The account budget must cover one more unit, and the trimmed name must
    /// be non-empty, within the length cap, and unused by the same account.
    pub fn create_capability_unit(
        &mut self,
        user: &str,
        name: &str,
        class: CapabilityClass,
    ) -> Result<Decision<CapabilityUnit>, EngineError> {
        let name = name.trim();
        if name.is_empty() || name.chars().count() > CAPABILITY_NAME_MAX_LEN {
            return Ok(Decision::rejected(RejectionReason::InvalidArgs));
        }
        let existing = self.store.units_for_user(user)?;
        if existing.iter().any(|unit| unit.name == name) {
            return Ok(Decision::rejected(RejectionReason::InvalidArgs));
        }

        let budget = self.budget_inputs(user)?;
        if !can_afford_new_unit(&budget) {
            return Ok(Decision::rejected(RejectionReason::InsufficientBudget));
        }

        let now = self.store.game_time()?;
        let id = self.allocate_id("unit")?;
        let mut unit = CapabilityUnit::new(id, user, name, class);
        unit.hits_max = Some(derived_hits_max(0));
        unit.store_capacity = Some(derived_store_capacity(0));
        unit.spawn_cooldown_time = Some(now + self.config.capability_spawn_cooldown);

        self.store.apply(WorldMutation {
            unit_upserts: vec![unit.clone()],
            ..WorldMutation::default()
        })?;
        Ok(Decision::accepted(unit))
    }

    /// Raise a unit's ability levels to the requested targets.
    ///
    /// Validation runs the progression ladder; acceptance writes the merged
    /// levels and the attributes derived from the new total in one mutation.
    pub fn upgrade_capability_unit(
        &mut self,
        user: &str,
        id: &str,
        targets: &BTreeMap<AbilityKind, u8>,
    ) -> Result<Decision<CapabilityUnit>, EngineError> {
        let Some(mut unit) = self.owned_unit(user, id)? else {
            return Ok(Decision::rejected(RejectionReason::UnknownUnit));
        };

        let budget = self.budget_inputs(user)?;
        let plan = match plan_upgrade(&unit, targets, &self.prereqs, &budget) {
            Ok(plan) => plan,
            Err(reason) => return Ok(Decision::rejected(reason)),
        };

        unit.abilities = plan.levels;
        unit.level = plan.level;
        unit.hits_max = Some(plan.hits_max);
        unit.store_capacity = Some(plan.store_capacity);

        self.store.apply(WorldMutation {
            unit_upserts: vec![unit.clone()],
            ..WorldMutation::default()
        })?;
        Ok(Decision::accepted(unit))
    }

    /// Schedule a unit for deletion after the configured delay.
    pub fn request_delete_capability_unit(
        &mut self,
        user: &str,
        id: &str,
    ) -> Result<Decision<CapabilityUnit>, EngineError> {
        let Some(mut unit) = self.owned_unit(user, id)? else {
            return Ok(Decision::rejected(RejectionReason::UnknownUnit));
        };
        if unit.is_delete_pending() {
            return Ok(Decision::rejected(RejectionReason::DeleteAlreadyPending));
        }
        if unit.is_spawned() {
            return Ok(Decision::rejected(RejectionReason::UnitBusy));
        }

        let now = self.store.game_time()?;
        unit.delete_time = Some(now + self.config.capability_delete_delay);
        self.store.apply(WorldMutation {
            unit_upserts: vec![unit.clone()],
            ..WorldMutation::default()
        })?;
        Ok(Decision::accepted(unit))
    }

    /// Cancel a pending deletion before it commits.
    pub fn cancel_delete_capability_unit(
        &mut self,
        user: &str,
        id: &str,
    ) -> Result<Decision<CapabilityUnit>, EngineError> {
        let Some(mut unit) = self.owned_unit(user, id)? else {
            return Ok(Decision::rejected(RejectionReason::UnknownUnit));
        };
        if !unit.is_delete_pending() {
            return Ok(Decision::rejected(RejectionReason::NoDeletePending));
        }

        unit.delete_time = None;
        self.store.apply(WorldMutation {
            unit_upserts: vec![unit.clone()],
            ..WorldMutation::default()
        })?;
        Ok(Decision::accepted(unit))
    }

    /// Remove every unit whose deletion fell due; returns the removed ids.
    /// Called by the simulation loop's upkeep, so this is a plain `Result`
    /// rather than a per-request decision.
    pub fn commit_due_deletions(&mut self, now: u64) -> Result<Vec<String>, EngineError> {
        let due: Vec<String> = self
            .store
            .all_units()?
            .into_iter()
            .filter(|unit| unit.delete_time.is_some_and(|at| at <= now))
            .map(|unit| unit.id)
            .collect();
        if due.is_empty() {
            return Ok(Vec::new());
        }

        self.store.apply(WorldMutation {
            unit_removes: due.clone(),
            ..WorldMutation::default()
        })?;
        log::info!("committed {} capability-unit deletion(s)", due.len());
        Ok(due)
    }

    /// A unit another account owns is indistinguishable from a missing one.
    fn owned_unit(&self, user: &str, id: &str) -> Result<Option<CapabilityUnit>, EngineError> {
        Ok(self
            .store
            .unit(id)?
            .filter(|unit| unit.user == user))
    }
}
