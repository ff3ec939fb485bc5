use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;

use crate::{
    content::Content,
    engine::{System, SystemContext},
    hooks::SimulationHooks,
    tech,
    tick::{GlobalMultiplierKind, Happiness, HappinessSource, NotProducingReason, SimContext},
    world::{BuildingStatus, GameState},
};

pub const HAPPINESS_LIMIT: f64 = 50.0;
const HAPPINESS_PER_AGE: f64 = 5.0;

/// Computes happiness from this tick's diagnostics into `next`, where it scales the worker
/// supply of the following tick.
pub struct HappinessSystem;

impl HappinessSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HappinessSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for HappinessSystem {
    fn name(&self) -> &str {
        "happiness"
    }

    fn run(
        &mut self,
        ctx: &SystemContext<'_>,
        state: &mut GameState,
        sim: &mut SimContext,
        _hooks: &mut dyn SimulationHooks,
    ) -> Result<()> {
        let happiness = compute_happiness(ctx.content, state, sim);
        sim.next.happiness = Some(happiness);
        Ok(())
    }
}

pub fn compute_happiness(content: &Content, state: &GameState, sim: &SimContext) -> Happiness {
    let next = &sim.next;
    let mut building_types = BTreeSet::new();
    let mut highest_tier = 0;
    let mut buildings = 0;
    for (hex, building) in state.buildings() {
        let building_type = building.building_type.as_str();
        if building.status != BuildingStatus::Completed || content.is_special(building_type) {
            continue;
        }
        buildings += 1;
        let reason = next.reason(hex);
        if matches!(
            reason,
            None | Some(NotProducingReason::StorageFull | NotProducingReason::NotEnoughWorkers)
        ) {
            building_types.insert(building.building_type.clone());
        }
        if reason.is_none() {
            highest_tier = highest_tier.max(content.building_tier(building_type));
        }
    }

    let wonders = next
        .special_buildings
        .keys()
        .filter(|b| content.is_world_wonder(b.as_str()) || content.is_natural_wonder(b.as_str()))
        .count();

    let age = tech::current_age(content, state)
        .and_then(|age| content.ages.get(age))
        .map(|age| HAPPINESS_PER_AGE * (age.idx + 1) as f64)
        .unwrap_or(0.0);
    let positive = BTreeMap::from([
        (HappinessSource::UnlockedTech, state.unlocked_tech.len() as f64),
        (HappinessSource::UnlockedAge, age),
        (HappinessSource::BuildingTypes, building_types.len() as f64),
        (HappinessSource::HighestTierBuilding, highest_tier as f64),
        (HappinessSource::Wonders, wonders as f64),
        (
            HappinessSource::GlobalEffects,
            next.global_multipliers.sum(GlobalMultiplierKind::Happiness),
        ),
    ]);
    let negative = BTreeMap::from([(HappinessSource::Buildings, buildings as f64)]);
    let raw_value = positive.values().sum::<f64>() - negative.values().sum::<f64>();
    let value = raw_value.clamp(-HAPPINESS_LIMIT, HAPPINESS_LIMIT);
    Happiness {
        positive,
        negative,
        raw_value,
        value,
        normalized: (value + HAPPINESS_LIMIT) / (2.0 * HAPPINESS_LIMIT),
        worker_percentage: (100.0 + value * 2.0) / 100.0,
    }
}
