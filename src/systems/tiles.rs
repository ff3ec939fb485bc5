use std::cmp::Reverse;

use anyhow::Result;
use tracing::debug;

use crate::{
    content::{Content, GameFeature, ResourceId, TechId},
    economy::{self, IoFlags, IoKind},
    engine::{System, SystemContext},
    hex::Hex,
    hooks::{self, SimulationHooks},
    systems::{
        autopilot::{incoming_storable, warehouse_autopilot},
        transport::transport_resource,
    },
    tick::{Multiplier, MultiplierKind, MultiplierWithSource, NotProducingReason, SimContext},
    world::{BuildingStatus, GameState},
};

/// Resolves construction, trading, imports and production for every building.
pub struct TileSystem;

impl TileSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for TileSystem {
    fn name(&self) -> &str {
        "tiles"
    }

    fn run(
        &mut self,
        ctx: &SystemContext<'_>,
        state: &mut GameState,
        sim: &mut SimContext,
        hooks: &mut dyn SimulationHooks,
    ) -> Result<()> {
        for hex in tile_order(ctx.content, state) {
            tick_tile(ctx.content, state, sim, hooks, hex);
        }
        Ok(())
    }
}

/// Construction sites first, then by descending priority, ascending tier and hex.
pub fn tile_order(content: &Content, state: &GameState) -> Vec<Hex> {
    let mut order: Vec<_> = state
        .buildings()
        .map(|(hex, b)| {
            (
                !b.is_building_or_upgrading(),
                Reverse(b.current_priority()),
                content.building_tier(b.building_type.as_str()),
                hex,
            )
        })
        .collect();
    order.sort();
    order.into_iter().map(|(_, _, _, hex)| hex).collect()
}

pub fn tick_tile(
    content: &Content,
    state: &mut GameState,
    sim: &mut SimContext,
    hooks: &mut dyn SimulationHooks,
    hex: Hex,
) {
    let explored = state.tile(hex).map(|t| t.explored).unwrap_or(false);
    let Some(building) = state.building_mut(hex) else {
        return;
    };
    if building.status == BuildingStatus::Paused {
        return;
    }
    if content.is_natural_wonder(building.building_type.as_str()) && !explored {
        return;
    }
    if building.status == BuildingStatus::Completed && building.desired_level > building.level {
        building.status = BuildingStatus::Upgrading;
    } else if building.desired_level < building.level {
        building.desired_level = building.level;
    }

    if building.is_building_or_upgrading() {
        tick_construction(content, state, sim, hooks, hex);
    } else {
        tick_production(content, state, sim, hooks, hex);
    }
}

fn tick_construction(
    content: &Content,
    state: &mut GameState,
    sim: &mut SimContext,
    hooks: &mut dyn SimulationHooks,
    hex: Hex,
) {
    let Some(building) = state.building(hex) else {
        return;
    };
    let cost = economy::building_cost(content, sim, building.building_type.as_str(), building.level);
    let mut complete = true;
    for (res, amount) in cost.iter() {
        let arrived = state
            .building(hex)
            .map(|b| b.resources.get_or_zero(res.as_str()))
            .unwrap_or(0.0);
        if arrived >= amount {
            continue;
        }
        complete = false;
        let in_transit = state.amount_in_transit(hex, res.as_str());
        if arrived + in_transit >= amount {
            continue;
        }
        if sim.available_workers(ResourceId::WORKER) >= 1.0 {
            sim.next.clear_reason(hex);
            sim.use_workers(content, &ResourceId::worker(), 1.0, Some(hex));
            let builder = economy::builder_capacity(content, state, sim, hex);
            let wanted = builder.total.min(amount - arrived - in_transit);
            transport_resource(content, state, sim, res, wanted, builder.total, hex);
            break;
        }
        sim.next.set_reason(hex, NotProducingReason::NotEnoughWorkers);
    }
    if !complete {
        return;
    }

    let Some(building) = state.building_mut(hex) else {
        return;
    };
    building.resources.deduct_all(&cost);
    building.level += 1;
    let finished = match building.status {
        BuildingStatus::Building => true,
        BuildingStatus::Upgrading => building.level >= building.desired_level,
        BuildingStatus::Paused | BuildingStatus::Completed => false,
    };
    if !finished {
        return;
    }
    building.status = BuildingStatus::Completed;
    building.desired_level = building.desired_level.max(building.level);
    debug!(%hex, building = %building.building_type, level = building.level, "construction finished");
    hooks::on_building_complete(content, state, hooks, hex);
}

fn tick_production(
    content: &Content,
    state: &mut GameState,
    sim: &mut SimContext,
    hooks: &mut dyn SimulationHooks,
    hex: Hex,
) {
    let Some(building) = state.building(hex) else {
        return;
    };
    let building_type = building.building_type.clone();
    let level = building.level;

    if level >= economy::BANKING_MIN_LEVEL && state.is_tech_unlocked(TechId::BANKING) {
        sim.next.add_tile_multiplier(
            hex,
            MultiplierWithSource::new(
                Multiplier::storage(1.0),
                content.tech_display_name(TechId::BANKING),
            ),
        );
    }
    if content.is_special(building_type.as_str()) {
        sim.next.special_buildings.insert(building_type.clone(), hex);
    }
    sim.next.total_value += economy::building_value(content, sim, building_type.as_str(), level);

    let input = economy::filter_storable(
        content,
        &economy::building_io(content, state, sim, hex, IoKind::Input, IoFlags::ALL),
    );
    let output = economy::building_io(content, state, sim, hex, IoKind::Output, IoFlags::ALL);

    for (res, amount) in building.resources.iter() {
        if amount <= 0.0 {
            continue;
        }
        if content.can_price(res.as_str()) {
            sim.next.total_value += content.resource_price(res.as_str()) * amount;
        }
        sim.next
            .resources_by_location
            .entry(res.clone())
            .or_default()
            .push(hex);
    }

    let on_deposit = match (content.building(building_type.as_str()), state.tile(hex)) {
        (Some(def), Some(tile)) => def.deposit.iter().all(|d| tile.deposit.contains(d)),
        _ => true,
    };
    if !on_deposit {
        sim.next.set_reason(hex, NotProducingReason::NotOnDeposit);
        return;
    }
    if building.capacity() <= 0.0 {
        sim.next.set_reason(hex, NotProducingReason::TurnedOff);
        return;
    }

    let worker = economy::workers_for(content, state, sim, hex, |res| !res.is_worker());
    let input_worker_capacity =
        economy::total_multiplier_for(state, sim, hex, MultiplierKind::Worker, 1.0);
    let storage = economy::storage_for(content, state, sim, hex);
    let is_import = building.resource_imports().is_some();
    let on_autopilot = building.is_warehouse_on_autopilot();
    let is_market = building.market().is_some();

    let mut has_transported = false;
    for (res, value) in input.iter() {
        let Some(building) = state.building(hex) else {
            return;
        };
        let amount = value * building.stockpile_capacity();
        if amount <= 0.0 {
            continue;
        }
        if storage.used + incoming_storable(content, state, hex) + amount > storage.total {
            continue;
        }
        let max_amount = match building.resource_imports() {
            Some(ri) => ri.imports.get(res).map(|i| i.cap).unwrap_or(0.0),
            None => building.stockpile_max_multiple() * amount,
        };
        let stocked = building.resources.get_or_zero(res.as_str())
            + state.amount_in_transit(hex, res.as_str());
        if stocked > max_amount {
            continue;
        }
        if transport_resource(content, state, sim, res, amount, input_worker_capacity, hex) > 0.0 {
            has_transported = true;
        }
    }

    if on_autopilot && state.has_feature(GameFeature::WarehouseUpgrade) {
        has_transported |= warehouse_autopilot(content, state, sim, hex);
    }
    if is_import && !has_transported {
        sim.next
            .set_reason(hex, NotProducingReason::NoActiveTransports);
    }

    if is_market {
        tick_market(content, state, sim, hooks, hex, storage.used, storage.total);
        return;
    }
    if is_import {
        return;
    }

    if sim.available_workers(ResourceId::WORKER) < worker.output {
        sim.next.set_reason(hex, NotProducingReason::NotEnoughWorkers);
        return;
    }
    let has_inputs = state
        .building(hex)
        .map(|b| b.resources.has_enough(&input))
        .unwrap_or(false);
    if !has_inputs {
        sim.next
            .set_reason(hex, NotProducingReason::NotEnoughResources);
        return;
    }

    let storable_output = economy::filter_storable(content, &output);
    let non_storable_output = economy::filter_non_storable(content, &output);
    // Inputs already admitted still have to fit once they arrive.
    let reserved = storage.used + incoming_storable(content, state, hex);
    if !output.is_empty()
        && reserved + economy::storage_required(content, &output) > storage.total
    {
        if non_storable_output.is_empty() {
            sim.next.set_reason(hex, NotProducingReason::StorageFull);
            return;
        }
        let workers = economy::workers_for(content, state, sim, hex, |res| {
            !content.can_store(res.as_str()) && !res.is_worker()
        });
        sim.use_workers(content, &ResourceId::worker(), workers.output, Some(hex));
        if let Some(building) = state.building_mut(hex) {
            building.resources.deduct_all(&input);
        }
        for (res, amount) in non_storable_output.iter() {
            sim.add_workers(res, amount);
        }
        if !storable_output.is_empty() {
            sim.next.set_reason(hex, NotProducingReason::StorageFull);
        }
        return;
    }

    let electrification = state
        .building(hex)
        .map(|b| economy::electrification_level(content, state, b))
        .unwrap_or(0);
    if electrification > 0 {
        let power = economy::power_required(electrification);
        if sim.available_workers(ResourceId::POWER) >= power {
            sim.use_workers(content, &ResourceId::power(), power, Some(hex));
            let e = electrification as f64;
            sim.next.add_tile_multiplier(
                hex,
                MultiplierWithSource::new(
                    Multiplier {
                        input: e,
                        output: e,
                        ..Multiplier::default()
                    },
                    "Electrification",
                ),
            );
        }
    }

    sim.use_workers(content, &ResourceId::worker(), worker.output, Some(hex));
    let headquarter = state.headquarter(content);
    if let Some(building) = state.building_mut(hex) {
        building.resources.deduct_all(&input);
    }
    for (res, amount) in output.iter() {
        if !content.can_store(res.as_str()) {
            sim.add_workers(res, amount);
            continue;
        }
        let credit_to = match headquarter {
            Some(hq) if res.is_science() => hq,
            _ => hex,
        };
        if let Some(building) = state.building_mut(credit_to) {
            building.resources.add(res, amount);
        }
    }
    hooks::on_production_complete(content, state, sim, hooks, hex);
}

/// Sells `capacity × level × output multiplier` of each listed resource for its paired buy
/// resource at the tile's fluctuated prices.
fn tick_market(
    content: &Content,
    state: &mut GameState,
    sim: &mut SimContext,
    hooks: &mut dyn SimulationHooks,
    hex: Hex,
    mut used: f64,
    total: f64,
) {
    let Some(building) = state.building(hex) else {
        return;
    };
    let Some(market) = building.market() else {
        return;
    };
    let output_multiplier =
        economy::total_multiplier_for(state, sim, hex, MultiplierKind::Output, 1.0);
    let per_resource = building.capacity() * building.level as f64 * output_multiplier;
    let trades: Vec<(ResourceId, ResourceId)> = market
        .sell_resources
        .iter()
        .filter_map(|sell| {
            market
                .available_resources
                .get(sell)
                .map(|buy| (sell.clone(), buy.clone()))
        })
        .collect();

    let mut total_bought = 0.0;
    for (sell, buy) in trades {
        let stored = state
            .building(hex)
            .map(|b| b.resources.get_or_zero(sell.as_str()))
            .unwrap_or(0.0);
        let amount = per_resource.clamp(0.0, stored);
        if amount <= 0.0 {
            continue;
        }
        let buy_price = economy::market_price(content, state, hex, buy.as_str());
        if buy_price <= 0.0 {
            continue;
        }
        let bought = amount * economy::market_price(content, state, hex, sell.as_str()) / buy_price;
        if used - amount + bought > total {
            sim.next.set_reason(hex, NotProducingReason::StorageFull);
            continue;
        }
        if let Some(building) = state.building_mut(hex) {
            building.resources.deduct(&sell, amount);
            building.resources.add(&buy, bought);
        }
        used += bought - amount;
        total_bought += bought;
    }
    if total_bought > 0.0 {
        hooks::on_production_complete(content, state, sim, hooks, hex);
    }
}
