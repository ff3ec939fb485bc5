//! Per-tick derived state.
//!
//! [`SimContext`] owns two [`TickData`] buffers. `current` is frozen for the whole tick and is
//! what readers and formulas consult; `next` accumulates contributions (multipliers, produced
//! workers, diagnostics) that become `current` when [`SimContext::swap`] runs at the start of
//! the following tick. Nothing in this module is persisted.

mod multiplier;

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use crate::{
    cache::IntraTickCache,
    content::{BuildingType, Content, ResourceId},
    hex::Hex,
    world::ResourceMap,
};

pub use multiplier::{
    GlobalMultiplierKind, GlobalMultipliers, Multiplier, MultiplierKind, MultiplierWithSource,
    ValueWithSource,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum NotProducingReason {
    NotEnoughResources,
    NotEnoughWorkers,
    StorageFull,
    TurnedOff,
    NotOnDeposit,
    NoActiveTransports,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HappinessSource {
    UnlockedTech,
    UnlockedAge,
    BuildingTypes,
    HighestTierBuilding,
    Wonders,
    GlobalEffects,
    Buildings,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Happiness {
    pub positive: BTreeMap<HappinessSource, f64>,
    pub negative: BTreeMap<HappinessSource, f64>,
    pub raw_value: f64,
    /// `raw_value` clamped to `[-50, 50]`.
    pub value: f64,
    pub normalized: f64,
    pub worker_percentage: f64,
}

/// A building type's recipe as seen by one tick, after modifiers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Recipe {
    pub input: ResourceMap,
    pub output: ResourceMap,
    pub construction: ResourceMap,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TickData {
    pub recipes: BTreeMap<BuildingType, Recipe>,
    pub building_names: BTreeMap<BuildingType, String>,
    pub building_multipliers: BTreeMap<BuildingType, Vec<MultiplierWithSource>>,
    pub tile_multipliers: BTreeMap<Hex, Vec<MultiplierWithSource>>,
    pub global_multipliers: GlobalMultipliers,
    /// Non-storable resources (workers, power) supplied for the tick this buffer becomes current.
    pub workers_available: ResourceMap,
    pub happiness: Option<Happiness>,
    pub not_producing_reasons: BTreeMap<Hex, NotProducingReason>,
    /// Tiles holding a positive amount of each resource, in tile order.
    pub resources_by_location: BTreeMap<ResourceId, Vec<Hex>>,
    /// Where each headquarter or wonder that ticked this tick stands.
    pub special_buildings: BTreeMap<BuildingType, Hex>,
    pub total_value: f64,
}

impl TickData {
    /// An empty buffer holding the base recipes and display names.
    pub fn new(content: &Content) -> Self {
        let recipes = content
            .buildings
            .iter()
            .map(|(id, def)| {
                (
                    id.clone(),
                    Recipe {
                        input: def.input.clone(),
                        output: def.output.clone(),
                        construction: def.construction.clone(),
                    },
                )
            })
            .collect();
        let building_names = content
            .buildings
            .keys()
            .map(|id| (id.clone(), content.display_name(id.as_str())))
            .collect();
        Self {
            recipes,
            building_names,
            ..Self::default()
        }
    }

    pub fn recipe(&self, building: &str) -> Option<&Recipe> {
        self.recipes.get(building)
    }

    pub fn add_building_multiplier(&mut self, building: &BuildingType, m: MultiplierWithSource) {
        self.building_multipliers
            .entry(building.clone())
            .or_default()
            .push(m);
    }

    pub fn add_tile_multiplier(&mut self, hex: Hex, m: MultiplierWithSource) {
        self.tile_multipliers.entry(hex).or_default().push(m);
    }

    pub fn worker_percentage(&self) -> f64 {
        self.happiness
            .as_ref()
            .map(|h| h.worker_percentage)
            .unwrap_or(1.0)
    }

    pub fn set_reason(&mut self, hex: Hex, reason: NotProducingReason) {
        self.not_producing_reasons.insert(hex, reason);
    }

    pub fn clear_reason(&mut self, hex: Hex) {
        self.not_producing_reasons.remove(&hex);
    }

    pub fn reason(&self, hex: Hex) -> Option<NotProducingReason> {
        self.not_producing_reasons.get(&hex).copied()
    }

    pub fn storage_full_tiles(&self) -> Vec<Hex> {
        self.not_producing_reasons
            .iter()
            .filter(|(_, r)| **r == NotProducingReason::StorageFull)
            .map(|(hex, _)| *hex)
            .collect()
    }
}

/// Workers and power spent during the current tick.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkerLedger {
    pub used: ResourceMap,
    pub assignment: BTreeMap<Hex, f64>,
}

/// Simulation-wide mutable context owned by the driver and threaded through every system.
#[derive(Debug)]
pub struct SimContext {
    pub current: TickData,
    pub next: TickData,
    pub workers: WorkerLedger,
    pub cache: IntraTickCache,
}

impl SimContext {
    pub fn new(content: &Content) -> Self {
        Self {
            current: TickData::new(content),
            next: TickData::new(content),
            workers: WorkerLedger::default(),
            cache: IntraTickCache::default(),
        }
    }

    /// Promotes `next` to `current` and starts a blank `next`. The worker ledger and intra-tick
    /// cache belong to the old `current` and are reset with it.
    pub fn swap(&mut self, content: &Content) {
        self.current = std::mem::replace(&mut self.next, TickData::new(content));
        self.workers = WorkerLedger::default();
        self.cache = IntraTickCache::default();
    }

    /// `floor(supplied × happiness percentage) − used` for a non-storable resource.
    pub fn available_workers(&self, res: &str) -> f64 {
        let supplied = self.current.workers_available.get_or_zero(res);
        (supplied * self.current.worker_percentage()).floor() - self.workers.used.get_or_zero(res)
    }

    pub fn use_workers(&mut self, content: &Content, res: &ResourceId, amount: f64, at: Option<Hex>) {
        if content.can_store(res.as_str()) {
            warn!(resource = %res, "storable resource cannot be used as workers");
            return;
        }
        self.workers.used.add(res, amount);
        if let Some(hex) = at {
            *self.workers.assignment.entry(hex).or_insert(0.0) += amount;
        }
    }

    /// Supplies workers for the next tick.
    pub fn add_workers(&mut self, res: &ResourceId, amount: f64) {
        self.next.workers_available.add(res, amount);
    }

    pub fn busy_workers(&self) -> f64 {
        self.workers.used.get_or_zero(ResourceId::WORKER)
    }
}
