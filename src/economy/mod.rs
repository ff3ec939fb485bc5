//! Building formulas: effective I/O, storage, worker demand, transport reserve and prices.
//!
//! All functions here are pure reads of the world and the frozen `current` tick buffer.

mod cost;
mod io;

use crate::{
    content::{BuildingSpecial, Content, GameFeature, ResourceId},
    hex::Hex,
    rng::{self, Stream},
    tick::{GlobalMultiplierKind, MultiplierKind, SimContext},
    world::{Building, BuildingVariant, GameState},
};

pub use cost::{
    builder_capacity, building_cost, building_upgrade_cost, building_value, resources_value,
    total_building_cost, BuilderCapacity, WONDER_BASE_COST_MULTIPLIER,
};
pub use io::{
    building_io, filter_non_storable, filter_storable, multipliers_for, storage_required,
    total_multiplier_for, IoFlags, IoKind,
};

/// One hour of production.
pub const STORAGE_TO_PRODUCTION: f64 = 3600.0;
/// Inputs keep one minute of buffer.
pub const STORAGE_TO_INPUT: f64 = 60.0;
pub const LEVEL_STORAGE_MULTIPLIER: f64 = 10.0;
pub const RESOURCE_IMPORT_CAPACITY_PER_LEVEL: f64 = 10.0;
pub const BANKING_MIN_LEVEL: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Storage {
    pub base: f64,
    pub multiplier: f64,
    pub total: f64,
    pub used: f64,
}

impl Storage {
    pub fn free(&self) -> f64 {
        (self.total - self.used).max(0.0)
    }
}

/// Storage of the building on `hex`. The headquarter's is unbounded.
pub fn storage_for(content: &Content, state: &GameState, ctx: &SimContext, hex: Hex) -> Storage {
    let Some(building) = state.building(hex) else {
        return Storage {
            base: 0.0,
            multiplier: 1.0,
            total: 0.0,
            used: 0.0,
        };
    };
    let used = storage_required(content, &building.resources);
    let multiplier = total_multiplier_for(state, ctx, hex, MultiplierKind::Storage, 1.0)
        + ctx
            .current
            .global_multipliers
            .sum(GlobalMultiplierKind::Storage);
    if content.special(building.building_type.as_str()) == Some(BuildingSpecial::Headquarter) {
        return Storage {
            base: f64::INFINITY,
            multiplier,
            total: f64::INFINITY,
            used,
        };
    }
    let base = if building.has_level_based_storage() {
        building.level as f64 * STORAGE_TO_PRODUCTION * LEVEL_STORAGE_MULTIPLIER
    } else {
        let input = building_io(content, state, ctx, hex, IoKind::Input, IoFlags::MULTIPLIER);
        let output = building_io(content, state, ctx, hex, IoKind::Output, IoFlags::MULTIPLIER);
        STORAGE_TO_INPUT * storage_required(content, &input)
            + STORAGE_TO_PRODUCTION * storage_required(content, &output)
    };
    Storage {
        base,
        multiplier,
        total: base * multiplier,
        used,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkerRequirement {
    pub raw_output: f64,
    pub multiplier: f64,
    /// `ceil(raw_output / multiplier)`.
    pub output: f64,
}

/// Workers needed to run one production step, counting outputs selected by `counts`.
pub fn workers_for(
    content: &Content,
    state: &GameState,
    ctx: &SimContext,
    hex: Hex,
    counts: impl Fn(&ResourceId) -> bool,
) -> WorkerRequirement {
    let Some(_) = state.building(hex) else {
        return WorkerRequirement {
            raw_output: 0.0,
            multiplier: 1.0,
            output: 0.0,
        };
    };
    let raw_output: f64 = building_io(content, state, ctx, hex, IoKind::Output, IoFlags::CAPACITY)
        .iter()
        .filter(|(res, _)| counts(res))
        .map(|(_, v)| v)
        .sum();
    let multiplier = total_multiplier_for(state, ctx, hex, MultiplierKind::Worker, 1.0);
    WorkerRequirement {
        raw_output,
        multiplier,
        output: (raw_output / multiplier).ceil(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScienceFromWorkers {
    pub workers_available: f64,
    pub workers_after_happiness: f64,
    pub workers_busy: f64,
    pub science_per_idle_worker: f64,
    pub science_per_busy_worker: f64,
    pub science_from_idle_workers: f64,
    pub science_from_busy_workers: f64,
    pub total: f64,
}

pub fn science_from_workers(ctx: &SimContext) -> ScienceFromWorkers {
    let workers_available = ctx
        .current
        .workers_available
        .get_or_zero(ResourceId::WORKER);
    let workers_after_happiness = (workers_available * ctx.current.worker_percentage()).floor();
    let workers_busy = ctx.busy_workers();
    let globals = &ctx.current.global_multipliers;
    let science_per_idle_worker = globals.sum(GlobalMultiplierKind::SciencePerIdleWorker);
    let science_per_busy_worker = globals.sum(GlobalMultiplierKind::SciencePerBusyWorker);
    let science_from_idle_workers =
        science_per_idle_worker * (workers_after_happiness - workers_busy).max(0.0);
    let science_from_busy_workers = science_per_busy_worker * workers_busy;
    ScienceFromWorkers {
        workers_available,
        workers_after_happiness,
        workers_busy,
        science_per_idle_worker,
        science_per_busy_worker,
        science_from_idle_workers,
        science_from_busy_workers,
        total: science_from_idle_workers + science_from_busy_workers,
    }
}

/// Reference price of `res` fluctuated by ±25% per (hour bucket, tile, resource).
pub fn market_price(content: &Content, state: &GameState, hex: Hex, res: &str) -> f64 {
    let price_id = state.last_price_updated.unwrap_or_default();
    let key = format!("{price_id},{hex},{res}");
    let fluctuation = 0.75 + rng::unit(state.seed, Stream::MarketPrice, &key) * 0.5;
    content.resource_price(res) * fluctuation
}

/// Amount of `res` the building on `source` can hand over to `dest`.
///
/// Resource-import buildings keep their `cap` unless exporting below it is allowed and never
/// feed the same building type unless enabled. Producers keep
/// `(stockpile max + stockpile capacity) × input` for themselves.
pub fn available_resource(
    content: &Content,
    state: &GameState,
    ctx: &SimContext,
    source: Hex,
    dest: Hex,
    res: &ResourceId,
) -> f64 {
    let Some(building) = state.building(source) else {
        return 0.0;
    };
    let stored = building.resources.get_or_zero(res.as_str());
    if stored <= 0.0 {
        return 0.0;
    }
    if let Some(ri) = building.resource_imports() {
        let same_type = state
            .building(dest)
            .map(|d| d.building_type == building.building_type)
            .unwrap_or(false);
        if same_type && !ri.export_to_same_type {
            return 0.0;
        }
        if let Some(import) = ri.imports.get(res) {
            if !ri.export_below_cap {
                return (stored - import.cap).max(0.0);
            }
        }
        return stored;
    }
    let input = building_io(content, state, ctx, source, IoKind::Input, IoFlags::ALL);
    match input.get(res.as_str()) {
        Some(amount) if amount > 0.0 => {
            let reserved = (building.stockpile_max_multiple() + building.stockpile_capacity()) * amount;
            (stored - reserved).max(0.0)
        }
        _ => stored,
    }
}

/// Import capacity left after the scheduled per-cycle imports.
pub fn resource_import_idle_capacity(state: &GameState, ctx: &SimContext, hex: Hex) -> f64 {
    let Some(building) = state.building(hex) else {
        return 0.0;
    };
    let Some(ri) = building.resource_imports() else {
        return 0.0;
    };
    let multiplier = total_multiplier_for(state, ctx, hex, MultiplierKind::Output, 1.0);
    let scheduled: f64 = ri.imports.values().map(|i| i.per_cycle).sum();
    multiplier * building.level as f64 * RESOURCE_IMPORT_CAPACITY_PER_LEVEL - scheduled
}

/// Transport capacity per worker for inputs of the building on `hex`.
pub fn transport_capacity(state: &GameState, ctx: &SimContext, hex: Hex) -> f64 {
    total_multiplier_for(state, ctx, hex, MultiplierKind::Worker, 1.0)
        + ctx
            .current
            .global_multipliers
            .sum(GlobalMultiplierKind::TransportCapacity)
}

pub fn can_be_electrified(content: &Content, building_type: &str) -> bool {
    let Some(def) = content.building(building_type) else {
        return false;
    };
    if let Some(flag) = def.electrifiable {
        return flag;
    }
    if def.special.is_some() || def.output.is_empty() {
        return false;
    }
    def.output.keys().all(|res| content.can_store(res.as_str()))
}

/// Power drawn by an electrification level.
pub fn power_required(electrification: u32) -> f64 {
    if electrification == 0 {
        return 0.0;
    }
    4f64.powi(electrification as i32).round()
}

pub fn electrification_level(content: &Content, state: &GameState, building: &Building) -> u32 {
    if !state.has_feature(GameFeature::Electricity)
        || !can_be_electrified(content, building.building_type.as_str())
    {
        return 0;
    }
    building.electrification.min(building.level)
}

/// Petra's offline production share, 1 when the city has none.
pub fn offline_production_percent(state: &GameState) -> f64 {
    state
        .buildings()
        .find_map(|(_, b)| match &b.variant {
            BuildingVariant::Petra(petra) => Some(petra.offline_production_percent()),
            _ => None,
        })
        .unwrap_or(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_grows_by_powers_of_four() {
        assert_eq!(power_required(0), 0.0);
        assert_eq!(power_required(1), 4.0);
        assert_eq!(power_required(3), 64.0);
    }
}
