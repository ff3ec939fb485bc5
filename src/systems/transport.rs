use anyhow::Result;
use tracing::debug;

use crate::{
    content::{Content, GameFeature, ResourceId},
    economy,
    engine::{System, SystemContext},
    hex::Hex,
    hooks::SimulationHooks,
    tick::{GlobalMultiplierKind, SimContext},
    world::{BuildingVariant, GameState, Transportation},
};

/// Advances in-flight transports and credits arrivals to their destination.
pub struct TransportSystem;

impl TransportSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TransportSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for TransportSystem {
    fn name(&self) -> &str {
        "transport"
    }

    fn run(
        &mut self,
        ctx: &SystemContext<'_>,
        state: &mut GameState,
        sim: &mut SimContext,
        _hooks: &mut dyn SimulationHooks,
    ) -> Result<()> {
        tick_transportations(ctx.content, state, sim);
        Ok(())
    }
}

fn tick_transportations(content: &Content, state: &mut GameState, sim: &mut SimContext) {
    let GameState {
        transportation,
        tiles,
        ..
    } = state;
    for (to, queue) in transportation.iter_mut() {
        queue.retain_mut(|t| {
            if content.can_store(t.fuel.as_str()) {
                t.ticks_spent += 1;
            } else if sim.available_workers(t.fuel.as_str()) >= t.fuel_amount {
                sim.use_workers(content, &t.fuel, t.fuel_amount, None);
                t.ticks_spent += 1;
                t.has_enough_fuel = true;
            } else {
                t.has_enough_fuel = false;
            }
            if !t.has_arrived() {
                return true;
            }
            match tiles.get_mut(to).and_then(|tile| tile.building.as_mut()) {
                Some(building) => building.resources.add(&t.resource, t.amount),
                None => debug!(hex = %to, resource = %t.resource, "transport arrived at an empty tile"),
            }
            false
        });
    }
    transportation.retain(|_, queue| !queue.is_empty());
}

/// A transport about to be committed.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportOrder {
    pub from: Hex,
    pub to: Hex,
    pub resource: ResourceId,
    pub amount: f64,
    pub fuel: ResourceId,
    pub fuel_amount: f64,
    /// Units moved per unit of fuel; infinite for warehouse hops.
    pub capacity: f64,
}

/// Takes the resource from the source, pays the first tick of fuel and queues the transport.
pub fn add_transportation(
    content: &Content,
    state: &mut GameState,
    sim: &mut SimContext,
    order: TransportOrder,
) {
    if let Some(source) = state.building_mut(order.from) {
        source.resources.deduct(&order.resource, order.amount);
    }
    sim.use_workers(content, &order.fuel, order.fuel_amount, None);
    let distance = order.from.distance(order.to) as f64;
    let ticks_required = if order.capacity.is_finite() && order.capacity > 0.0 {
        (distance / order.capacity).ceil() as u32
    } else {
        0
    };
    let id = state.next_transport_id();
    state
        .transportation
        .entry(order.to)
        .or_default()
        .push(Transportation {
            id,
            from: order.from,
            to: order.to,
            resource: order.resource,
            amount: order.amount,
            fuel: order.fuel,
            fuel_amount: order.fuel_amount,
            ticks_required,
            ticks_spent: 0,
            has_enough_fuel: true,
        });
}

fn is_warehouse(state: &GameState, hex: Hex) -> bool {
    matches!(
        state.building(hex).map(|b| &b.variant),
        Some(BuildingVariant::Warehouse(_))
    )
}

/// Moves up to `amount` of `res` towards `target` from the nearest holders, paying workers as
/// fuel. Returns the amount committed; the rest is left un-transported when sources or fuel
/// run out.
pub fn transport_resource(
    content: &Content,
    state: &mut GameState,
    sim: &mut SimContext,
    res: &ResourceId,
    amount: f64,
    worker_capacity: f64,
    target: Hex,
) -> f64 {
    let fuel = ResourceId::worker();
    let mut fuel_left = sim.available_workers(fuel.as_str());
    if fuel_left <= 0.0 || amount <= 0.0 {
        return 0.0;
    }
    let mut sources = sim
        .current
        .resources_by_location
        .get(res)
        .cloned()
        .unwrap_or_default();
    sources.sort_by_key(|hex| (hex.distance(target), *hex));

    let global_capacity = sim
        .current
        .global_multipliers
        .sum(GlobalMultiplierKind::TransportCapacity);
    let warehouse_upgrade = state.has_feature(GameFeature::WarehouseUpgrade);
    let target_is_warehouse = is_warehouse(state, target);
    let mut amount_left = amount;
    let mut committed = 0.0;

    for from in sources {
        if from == target {
            continue;
        }
        let available = economy::available_resource(content, state, sim, from, target, res);
        if available <= 0.0 {
            continue;
        }
        let distance = from.distance(target);
        let capacity = if warehouse_upgrade
            && distance <= 1
            && (target_is_warehouse || is_warehouse(state, from))
        {
            f64::INFINITY
        } else {
            worker_capacity + global_capacity
        };
        let shipped = available.min(amount_left);
        let fuel_needed = (shipped / capacity).ceil();
        let mut order = TransportOrder {
            from,
            to: target,
            resource: res.clone(),
            amount: shipped,
            fuel: fuel.clone(),
            fuel_amount: fuel_needed,
            capacity,
        };
        if fuel_left >= fuel_needed {
            add_transportation(content, state, sim, order);
            fuel_left -= fuel_needed;
            committed += shipped;
            amount_left -= shipped;
            if amount_left <= 0.0 {
                break;
            }
        } else {
            if fuel_left > 0.0 {
                order.amount = shipped * fuel_left / fuel_needed;
                order.fuel_amount = fuel_left;
                committed += order.amount;
                add_transportation(content, state, sim, order);
            }
            break;
        }
    }
    committed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        content::{load_content, ContentSource},
        world::Building,
    };
    use chrono::{TimeZone, Utc};

    fn setup(workers: f64) -> (Content, GameState, SimContext) {
        let content = load_content(ContentSource::Embedded).unwrap();
        let start = Utc.timestamp_opt(0, 0).unwrap();
        let state = GameState::new(&content, "Rome", 5, start).unwrap();
        let mut sim = SimContext::new(&content);
        sim.current
            .workers_available
            .add(&ResourceId::worker(), workers);
        (content, state, sim)
    }

    fn camp_with_wood(content: &Content, state: &mut GameState, sim: &mut SimContext, hex: Hex, wood: f64) {
        let mut camp = Building::completed(
            "LoggingCamp".into(),
            content.category("LoggingCamp"),
            1,
        );
        camp.resources.add(&ResourceId::new("Wood"), wood);
        state.tile_mut(hex).unwrap().building = Some(camp);
        sim.current
            .resources_by_location
            .entry(ResourceId::new("Wood"))
            .or_default()
            .push(hex);
    }

    #[test]
    fn nearest_source_is_drained_first() {
        let (content, mut state, mut sim) = setup(10.0);
        let target = Hex::from_offset(5, 5);
        let near = Hex::from_offset(6, 5);
        let far = Hex::from_offset(9, 5);
        camp_with_wood(&content, &mut state, &mut sim, far, 10.0);
        camp_with_wood(&content, &mut state, &mut sim, near, 3.0);
        state.place_building(&content, target, "Hut").unwrap();

        let wood = ResourceId::new("Wood");
        let moved = transport_resource(&content, &mut state, &mut sim, &wood, 5.0, 1.0, target);
        assert_eq!(moved, 5.0);
        assert_eq!(state.building(near).unwrap().resources.get_or_zero("Wood"), 0.0);
        assert_eq!(state.building(far).unwrap().resources.get_or_zero("Wood"), 8.0);
        let queue = &state.transportation[&target];
        assert_eq!(queue.len(), 2);
        assert_eq!(queue[0].from, near);
        assert_eq!(queue[1].ticks_required, far.distance(target) as u32);
        assert_eq!(sim.busy_workers(), 5.0);
    }

    #[test]
    fn fuel_shortage_ships_a_proportional_share() {
        let (content, mut state, mut sim) = setup(2.0);
        let target = Hex::from_offset(5, 5);
        let source = Hex::from_offset(7, 5);
        camp_with_wood(&content, &mut state, &mut sim, source, 10.0);
        state.place_building(&content, target, "Hut").unwrap();

        let wood = ResourceId::new("Wood");
        let moved = transport_resource(&content, &mut state, &mut sim, &wood, 8.0, 1.0, target);
        assert!((moved - 2.0).abs() < 1e-9, "moved {moved}");
        let left = state.building(source).unwrap().resources.get_or_zero("Wood");
        assert!((left + moved - 10.0).abs() < 1e-9, "left {left}");
        assert_eq!(sim.available_workers(ResourceId::WORKER), 0.0);
    }

    #[test]
    fn arrivals_are_credited_and_removed() {
        let (content, mut state, mut sim) = setup(10.0);
        let target = Hex::from_offset(5, 5);
        let source = Hex::from_offset(6, 5);
        camp_with_wood(&content, &mut state, &mut sim, source, 4.0);
        state.place_building(&content, target, "Hut").unwrap();
        let wood = ResourceId::new("Wood");
        transport_resource(&content, &mut state, &mut sim, &wood, 4.0, 1.0, target);
        assert_eq!(state.amount_in_transit(target, "Wood"), 4.0);

        tick_transportations(&content, &mut state, &mut sim);
        assert!(state.transportation.is_empty());
        assert_eq!(state.building(target).unwrap().resources.get_or_zero("Wood"), 4.0);
    }

    #[test]
    fn transports_stall_without_fuel() {
        let (content, mut state, mut sim) = setup(4.0);
        let target = Hex::from_offset(5, 5);
        let source = Hex::from_offset(8, 5);
        camp_with_wood(&content, &mut state, &mut sim, source, 4.0);
        state.place_building(&content, target, "Hut").unwrap();
        let wood = ResourceId::new("Wood");
        transport_resource(&content, &mut state, &mut sim, &wood, 4.0, 1.0, target);

        tick_transportations(&content, &mut state, &mut sim);
        let t = &state.transportation[&target][0];
        assert!(!t.has_enough_fuel);
        assert_eq!(t.ticks_spent, 0);
    }
}
