//! Capability-unit progression validation.
//!
//! Upgrades request absolute per-ability target levels. Validation walks a
//! fixed ladder: request shape, ability class, downgrade, the per-field
//! prerequisite check, greedy reachability, and finally the account budget.
//! The greedy pass simulates single-level steps from the unit's current
//! state; an upgrade is legal only if some step order satisfies every
//! prerequisite along the way.

use std::collections::BTreeMap;

use contracts::{
    ability_class, AbilityKind, CapabilityUnit, RejectionReason, CAPABILITY_MAX_LEVEL,
    MAX_ABILITY_LEVEL,
};

/// Minimum unit total level required to hold each ability level 1..=5.
/// Missing rows mean "no prerequisite".
#[derive(Debug, Clone, Default)]
pub struct PrereqTable {
    rows: BTreeMap<AbilityKind, [u16; MAX_ABILITY_LEVEL as usize]>,
}

impl PrereqTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_row(mut self, kind: AbilityKind, row: [u16; MAX_ABILITY_LEVEL as usize]) -> Self {
        self.rows.insert(kind, row);
        self
    }

    /// Minimum total level required before `ability` may reach `level`.
    pub fn min_total_for(&self, ability: AbilityKind, level: u8) -> u16 {
        if level == 0 || level > MAX_ABILITY_LEVEL {
            return 0;
        }
        self.rows
            .get(&ability)
            .map(|row| row[(level - 1) as usize])
            .unwrap_or(0)
    }

    /// Default prerequisite curves. Core abilities unlock early; siege and
    /// tower lines demand a developed unit.
    pub fn builtin() -> Self {
        Self::empty()
            .with_row(AbilityKind::HarvestBoost, [0, 2, 7, 14, 22])
            .with_row(AbilityKind::BuildBoost, [0, 2, 7, 14, 22])
            .with_row(AbilityKind::SpawnBoost, [0, 2, 7, 14, 22])
            .with_row(AbilityKind::CarryBoost, [0, 5, 10, 14, 22])
            .with_row(AbilityKind::RepairBoost, [0, 5, 10, 14, 22])
            .with_row(AbilityKind::TowerBoost, [10, 14, 17, 20, 23])
            .with_row(AbilityKind::AttackBoost, [0, 2, 7, 14, 22])
            .with_row(AbilityKind::DefenseBoost, [0, 5, 10, 14, 22])
            .with_row(AbilityKind::SiegeBoost, [10, 14, 17, 20, 23])
    }
}

/// Account-wide inputs to the budget check.
#[derive(Debug, Clone, Copy)]
pub struct BudgetInputs {
    /// Lifetime progression resource the account has accumulated.
    pub resource_total: f64,
    /// Number of capability units the account owns, this one included.
    pub unit_count: u32,
    /// Sum of every owned unit's level, this one's current level included.
    pub level_sum: u32,
    pub multiplier: f64,
    pub exponent: f64,
}

/// Levels the account's resource supports: floor((resource / multiplier)^(1/exponent)).
/// Degenerate curve parameters price everything out instead of dividing by
/// zero.
pub fn allowed_levels(resource_total: f64, multiplier: f64, exponent: f64) -> u32 {
    if multiplier <= 0.0 || exponent <= 0.0 || resource_total <= 0.0 {
        return 0;
    }
    let allowed = (resource_total / multiplier).powf(1.0 / exponent).floor();
    if allowed.is_finite() && allowed > 0.0 {
        allowed as u32
    } else {
        0
    }
}

/// Budget still unspent: allowed levels minus units owned and levels bought.
pub fn remaining_budget(budget: &BudgetInputs) -> i64 {
    let allowed = allowed_levels(budget.resource_total, budget.multiplier, budget.exponent) as i64;
    allowed - (budget.unit_count as i64 + budget.level_sum as i64)
}

/// True when the account can pay for one more level-0 unit.
pub fn can_afford_new_unit(budget: &BudgetInputs) -> bool {
    remaining_budget(budget) >= 1
}

/// Validated upgrade, ready to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradePlan {
    pub levels: BTreeMap<AbilityKind, u8>,
    pub level: u16,
    /// Levels bought by this upgrade.
    pub delta: u16,
    pub hits_max: i64,
    pub store_capacity: i64,
}

pub fn derived_hits_max(level: u16) -> i64 {
    1_000 * (level as i64 + 1)
}

pub fn derived_store_capacity(level: u16) -> i64 {
    100 * (level as i64 + 1)
}

/// The upgrade ladder. Abilities omitted from `targets` keep their current
/// level.
pub fn plan_upgrade(
    unit: &CapabilityUnit,
    targets: &BTreeMap<AbilityKind, u8>,
    table: &PrereqTable,
    budget: &BudgetInputs,
) -> Result<UpgradePlan, RejectionReason> {
    if targets.is_empty() {
        return Err(RejectionReason::InvalidAbilities);
    }
    for (ability, level) in targets {
        if *level > MAX_ABILITY_LEVEL {
            return Err(RejectionReason::InvalidAbilities);
        }
        if ability_class(*ability) != unit.class {
            return Err(RejectionReason::WrongClass);
        }
    }

    // merged = requested targets over the current state
    let mut merged: BTreeMap<AbilityKind, u8> = unit.abilities.clone();
    for (ability, level) in targets {
        let current = unit.abilities.get(ability).copied().unwrap_or(0);
        if *level < current {
            return Err(RejectionReason::CannotDowngrade);
        }
        merged.insert(*ability, *level);
    }

    let current_total = unit.level_sum();
    let target_total: u16 = merged.values().map(|level| *level as u16).sum();
    if target_total > CAPABILITY_MAX_LEVEL {
        return Err(RejectionReason::MaxLevelExceeded);
    }

    // Per-field check: the finished unit must satisfy every newly reached
    // level's prerequisite.
    for (ability, target) in &merged {
        let current = unit.abilities.get(ability).copied().unwrap_or(0);
        for level in (current + 1)..=*target {
            if table.min_total_for(*ability, level) > target_total {
                return Err(RejectionReason::PrereqNotSatisfied);
            }
        }
    }

    // Greedy reachability: raise any ability one step whose next level is
    // already unlocked by the running total. If no step applies before the
    // target is reached, no order exists.
    let mut simulated = unit.abilities.clone();
    let mut running_total = current_total;
    while running_total < target_total {
        let mut advanced = false;
        for (ability, target) in &merged {
            let held = simulated.get(ability).copied().unwrap_or(0);
            if held < *target && table.min_total_for(*ability, held + 1) <= running_total {
                simulated.insert(*ability, held + 1);
                running_total += 1;
                advanced = true;
            }
        }
        if !advanced {
            return Err(RejectionReason::PrereqNotSatisfied);
        }
    }

    let delta = target_total - current_total;
    if delta as i64 > remaining_budget(budget) {
        return Err(RejectionReason::InsufficientBudget);
    }

    Ok(UpgradePlan {
        levels: merged,
        level: target_total,
        delta,
        hits_max: derived_hits_max(target_total),
        store_capacity: derived_store_capacity(target_total),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::CapabilityClass;

    fn operator(levels: &[(AbilityKind, u8)]) -> CapabilityUnit {
        let mut unit = CapabilityUnit::new("u1", "alice", "miner", CapabilityClass::Operator);
        for (ability, level) in levels {
            unit.abilities.insert(*ability, *level);
        }
        unit.level = unit.level_sum();
        unit
    }

    fn rich_budget() -> BudgetInputs {
        BudgetInputs {
            resource_total: 1_000_000.0,
            unit_count: 1,
            level_sum: 0,
            multiplier: 1_000.0,
            exponent: 2.0,
        }
    }

    fn targets(pairs: &[(AbilityKind, u8)]) -> BTreeMap<AbilityKind, u8> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn empty_request_is_invalid() {
        let unit = operator(&[]);
        assert_eq!(
            plan_upgrade(&unit, &targets(&[]), &PrereqTable::builtin(), &rich_budget()),
            Err(RejectionReason::InvalidAbilities)
        );
    }

    #[test]
    fn levels_beyond_the_per_ability_cap_are_invalid() {
        let unit = operator(&[]);
        assert_eq!(
            plan_upgrade(
                &unit,
                &targets(&[(AbilityKind::HarvestBoost, 6)]),
                &PrereqTable::builtin(),
                &rich_budget()
            ),
            Err(RejectionReason::InvalidAbilities)
        );
    }

    #[test]
    fn cross_class_abilities_are_rejected() {
        let unit = operator(&[]);
        assert_eq!(
            plan_upgrade(
                &unit,
                &targets(&[(AbilityKind::SiegeBoost, 1)]),
                &PrereqTable::builtin(),
                &rich_budget()
            ),
            Err(RejectionReason::WrongClass)
        );
    }

    #[test]
    fn downgrades_are_rejected_and_omissions_keep_levels() {
        let unit = operator(&[(AbilityKind::HarvestBoost, 3), (AbilityKind::CarryBoost, 2)]);
        assert_eq!(
            plan_upgrade(
                &unit,
                &targets(&[(AbilityKind::HarvestBoost, 2)]),
                &PrereqTable::builtin(),
                &rich_budget()
            ),
            Err(RejectionReason::CannotDowngrade)
        );

        // carry_boost is omitted: it stays at 2 in the plan
        let plan = plan_upgrade(
            &unit,
            &targets(&[(AbilityKind::HarvestBoost, 4)]),
            &PrereqTable::builtin(),
            &rich_budget(),
        )
        .expect("upgrade plans");
        assert_eq!(plan.levels.get(&AbilityKind::CarryBoost), Some(&2));
        assert_eq!(plan.level, 6);
        assert_eq!(plan.delta, 1);
    }

    #[test]
    fn totals_beyond_the_unit_cap_are_rejected() {
        let unit = operator(&[]);
        let request = targets(&[
            (AbilityKind::HarvestBoost, 5),
            (AbilityKind::BuildBoost, 5),
            (AbilityKind::SpawnBoost, 5),
            (AbilityKind::CarryBoost, 5),
            (AbilityKind::RepairBoost, 5),
            (AbilityKind::TowerBoost, 1),
        ]);
        // 26 requested levels, one past the unit cap
        assert_eq!(
            plan_upgrade(&unit, &request, &PrereqTable::empty(), &rich_budget()),
            Err(RejectionReason::MaxLevelExceeded)
        );

        let request = targets(&[
            (AbilityKind::HarvestBoost, 5),
            (AbilityKind::BuildBoost, 5),
            (AbilityKind::SpawnBoost, 5),
            (AbilityKind::CarryBoost, 5),
            (AbilityKind::RepairBoost, 5),
        ]);
        let plan = plan_upgrade(&unit, &request, &PrereqTable::empty(), &rich_budget())
            .expect("cap is exact");
        assert_eq!(plan.level, CAPABILITY_MAX_LEVEL);
    }

    #[test]
    fn naive_prereq_rejects_unreachable_endstates() {
        let unit = operator(&[]);
        // tower_boost level 1 needs total 10; a lone level-1 request tops
        // out at total 1
        assert_eq!(
            plan_upgrade(
                &unit,
                &targets(&[(AbilityKind::TowerBoost, 1)]),
                &PrereqTable::builtin(),
                &rich_budget()
            ),
            Err(RejectionReason::PrereqNotSatisfied)
        );
    }

    #[test]
    fn greedy_reachability_accepts_interleavable_orders() {
        let unit = operator(&[]);
        // harvest 0->3 and build 0->3: total 6, interleaving satisfies the
        // [0, 2, 7, ...] curve at every step
        let plan = plan_upgrade(
            &unit,
            &targets(&[(AbilityKind::HarvestBoost, 3), (AbilityKind::BuildBoost, 3)]),
            &PrereqTable::builtin(),
            &rich_budget(),
        );
        assert!(plan.is_err(), "level 3 needs total 7, only 6 available");

        let plan = plan_upgrade(
            &unit,
            &targets(&[
                (AbilityKind::HarvestBoost, 3),
                (AbilityKind::BuildBoost, 3),
                (AbilityKind::SpawnBoost, 2),
                (AbilityKind::CarryBoost, 1),
            ]),
            &PrereqTable::builtin(),
            &rich_budget(),
        )
        .expect("total 9 unlocks both level 3s");
        assert_eq!(plan.level, 9);
    }

    #[test]
    fn greedy_rejects_orders_that_cannot_start() {
        // every first level needs total 3: no single level-up can ever land
        let table = PrereqTable::empty()
            .with_row(AbilityKind::HarvestBoost, [3, 3, 3, 3, 3])
            .with_row(AbilityKind::BuildBoost, [3, 3, 3, 3, 3]);
        let unit = operator(&[]);
        assert_eq!(
            plan_upgrade(
                &unit,
                &targets(&[(AbilityKind::HarvestBoost, 2), (AbilityKind::BuildBoost, 2)]),
                &table,
                &rich_budget()
            ),
            Err(RejectionReason::PrereqNotSatisfied)
        );
    }

    #[test]
    fn budget_formula_floors() {
        assert_eq!(allowed_levels(1_000_000.0, 1_000.0, 2.0), 31);
        assert_eq!(allowed_levels(999.0, 1_000.0, 2.0), 0);
        assert_eq!(allowed_levels(4_000.0, 1_000.0, 2.0), 2);
        assert_eq!(allowed_levels(-5.0, 1_000.0, 2.0), 0);
        assert_eq!(allowed_levels(4_000.0, 0.0, 2.0), 0);
    }

    #[test]
    fn budget_counts_units_and_levels_already_bought() {
        let unit = operator(&[(AbilityKind::HarvestBoost, 1)]);
        // allowed = floor(sqrt(9000/1000)) = 3; spent = 2 units + 1 level
        let budget = BudgetInputs {
            resource_total: 9_000.0,
            unit_count: 2,
            level_sum: 1,
            multiplier: 1_000.0,
            exponent: 2.0,
        };
        assert_eq!(remaining_budget(&budget), 0);
        assert_eq!(
            plan_upgrade(
                &unit,
                &targets(&[(AbilityKind::HarvestBoost, 2)]),
                &PrereqTable::builtin(),
                &budget
            ),
            Err(RejectionReason::InsufficientBudget)
        );

        let richer = BudgetInputs {
            resource_total: 16_000.0,
            ..budget
        };
        assert!(can_afford_new_unit(&richer));
        let plan = plan_upgrade(
            &unit,
            &targets(&[(AbilityKind::HarvestBoost, 2)]),
            &PrereqTable::builtin(),
            &richer,
        )
        .expect("one delta level fits");
        assert_eq!(plan.delta, 1);
    }

    #[test]
    fn derived_attributes_scale_linearly() {
        let unit = operator(&[]);
        let plan = plan_upgrade(
            &unit,
            &targets(&[(AbilityKind::HarvestBoost, 1)]),
            &PrereqTable::builtin(),
            &rich_budget(),
        )
        .expect("plans");
        assert_eq!(plan.hits_max, 2_000);
        assert_eq!(plan.store_capacity, 200);
        assert_eq!(derived_hits_max(0), 1_000);
        assert_eq!(derived_store_capacity(25), 2_600);
    }
}
