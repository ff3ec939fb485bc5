use crate::{
    content::{Content, ResourceId},
    economy,
    hex::Hex,
    systems::transport::{add_transportation, TransportOrder},
    tick::SimContext,
    world::GameState,
};

/// Pulls output from storage-full buildings into the warehouse on `hex`, nearest first.
///
/// The idle capacity is capped by what the free workers can carry at the plain transport
/// capacity before the one-tile warehouse bonus is applied, so short hops may leave workers
/// unused. Returns whether any transport was issued.
pub fn warehouse_autopilot(
    content: &Content,
    state: &mut GameState,
    sim: &mut SimContext,
    hex: Hex,
) -> bool {
    let transport_capacity = economy::transport_capacity(state, sim, hex);
    if transport_capacity <= 0.0 {
        return false;
    }
    let mut capacity = economy::resource_import_idle_capacity(state, sim, hex);
    let workers = sim.available_workers(ResourceId::WORKER);
    if (capacity / transport_capacity).ceil() > workers {
        capacity = workers * transport_capacity;
    }
    let storage = economy::storage_for(content, state, sim, hex);
    let incoming = incoming_storable(content, state, hex);
    capacity = capacity.clamp(0.0, (storage.total - storage.used - incoming).max(0.0));
    if capacity <= 0.0 {
        return false;
    }

    let mut targets = sim.current.storage_full_tiles();
    targets.sort_by_key(|target| (target.distance(hex), *target));
    let mut transported = false;
    for target in targets {
        if target == hex {
            continue;
        }
        let Some(building) = state.building(target) else {
            continue;
        };
        let Some(def) = content.building(building.building_type.as_str()) else {
            continue;
        };
        let mut candidates: Vec<(ResourceId, f64)> = building
            .resources
            .iter()
            .filter(|(res, amount)| {
                *amount > 0.0 && def.output.contains(res.as_str()) && content.can_store(res.as_str())
            })
            .map(|(res, amount)| (res.clone(), amount))
            .collect();
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let per_worker = if target.distance(hex) <= 1 {
            f64::INFINITY
        } else {
            transport_capacity
        };
        for (res, stored) in candidates {
            let amount = stored.min(capacity);
            let fuel = (amount / per_worker).ceil();
            if fuel > sim.available_workers(ResourceId::WORKER) {
                return transported;
            }
            add_transportation(
                content,
                state,
                sim,
                TransportOrder {
                    from: target,
                    to: hex,
                    resource: res,
                    amount,
                    fuel: ResourceId::worker(),
                    fuel_amount: fuel,
                    capacity: per_worker,
                },
            );
            transported = true;
            capacity -= amount;
            if capacity <= 0.0 {
                return true;
            }
        }
    }
    transported
}

/// Storable amount already on its way to `hex`.
pub(crate) fn incoming_storable(content: &Content, state: &GameState, hex: Hex) -> f64 {
    state
        .transportation
        .get(&hex)
        .map(|queue| {
            queue
                .iter()
                .filter(|t| content.can_store(t.resource.as_str()))
                .map(|t| t.amount)
                .sum()
        })
        .unwrap_or(0.0)
}
