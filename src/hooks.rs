//! Side-effect notifications fired after building and technology transitions.
//!
//! [`SimulationHooks`] is the external seam: implementations observe transitions and must not
//! be needed for the next tick to be correct. The data-declared wonder effects and fog-of-war
//! reveal are core behaviour and run through [`on_building_complete`] and
//! [`on_production_complete`] regardless of which hook object is installed.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::{
    content::{Content, TechId, WonderEffect},
    hex::Hex,
    tick::{GlobalMultiplierKind, Multiplier, MultiplierWithSource, SimContext},
    world::GameState,
};

pub trait SimulationHooks: Send {
    fn on_building_complete(&mut self, _hex: Hex, _state: &GameState) {}

    fn on_production_complete(&mut self, _hex: Hex, _state: &GameState) {}

    fn on_technology_unlocked(&mut self, _tech: &TechId, _state: &GameState) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl SimulationHooks for NoopHooks {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookEvent {
    BuildingComplete { tick: u64, hex: Hex },
    ProductionComplete { tick: u64, hex: Hex },
    TechnologyUnlocked { tick: u64, tech: TechId },
}

/// Keeps every notification in arrival order. Clones share one event log, so a test can keep
/// a handle while the engine owns the boxed copy.
#[derive(Debug, Default, Clone)]
pub struct RecordingHooks {
    events: Arc<Mutex<Vec<HookEvent>>>,
}

impl RecordingHooks {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: HookEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    pub fn events(&self) -> Vec<HookEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn buildings_completed(&self) -> Vec<Hex> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                HookEvent::BuildingComplete { hex, .. } => Some(hex),
                _ => None,
            })
            .collect()
    }

    pub fn production_count(&self, at: Hex) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, HookEvent::ProductionComplete { hex, .. } if *hex == at))
            .count()
    }
}

impl SimulationHooks for RecordingHooks {
    fn on_building_complete(&mut self, hex: Hex, state: &GameState) {
        self.push(HookEvent::BuildingComplete {
            tick: state.tick,
            hex,
        });
    }

    fn on_production_complete(&mut self, hex: Hex, state: &GameState) {
        self.push(HookEvent::ProductionComplete {
            tick: state.tick,
            hex,
        });
    }

    fn on_technology_unlocked(&mut self, tech: &TechId, state: &GameState) {
        self.push(HookEvent::TechnologyUnlocked {
            tick: state.tick,
            tech: tech.clone(),
        });
    }
}

/// Reveals the building's vision radius and runs completion effects, then notifies `hooks`.
pub fn on_building_complete(
    content: &Content,
    state: &mut GameState,
    hooks: &mut dyn SimulationHooks,
    hex: Hex,
) {
    let Some(building_type) = state.building(hex).map(|b| b.building_type.clone()) else {
        return;
    };
    let Some(def) = content.building(building_type.as_str()) else {
        return;
    };
    if !content.is_natural_wonder(building_type.as_str()) {
        let revealed = state.explore(hex, def.vision());
        debug!(%hex, building = %building_type, revealed, "building completed");
    }
    for effect in &def.effects {
        if let WonderEffect::ExploreDeposit { deposit } = effect {
            for tile in state.tiles.values_mut() {
                if tile.deposit.contains(deposit) {
                    tile.explored = true;
                }
            }
        }
    }
    hooks.on_building_complete(hex, state);
}

/// Pushes the producing building's wonder effects into `next`, then notifies `hooks`.
pub fn on_production_complete(
    content: &Content,
    state: &GameState,
    ctx: &mut SimContext,
    hooks: &mut dyn SimulationHooks,
    hex: Hex,
) {
    let Some(building) = state.building(hex) else {
        return;
    };
    let Some(def) = content.building(building.building_type.as_str()) else {
        return;
    };
    let source = content.display_name(building.building_type.as_str());
    for effect in &def.effects {
        match effect {
            WonderEffect::Adjacent { multiplier } => {
                for neighbour in hex.neighbors() {
                    if state.tile(neighbour).is_some() {
                        ctx.next.add_tile_multiplier(
                            neighbour,
                            MultiplierWithSource::new(*multiplier, source.clone()),
                        );
                    }
                }
            }
            WonderEffect::ProducersOf {
                resource,
                multiplier,
            } => {
                for producer in content.buildings_producing(resource.as_str()) {
                    ctx.next.add_building_multiplier(
                        producer,
                        MultiplierWithSource::new(*multiplier, source.clone()),
                    );
                }
            }
            WonderEffect::LevelBonus { per_levels } => {
                if *per_levels == 0 {
                    continue;
                }
                for (at, other) in state.buildings() {
                    let bonus = (other.level / per_levels) as f64;
                    if bonus > 0.0 {
                        ctx.next.add_tile_multiplier(
                            at,
                            MultiplierWithSource::new(
                                Multiplier {
                                    input: bonus,
                                    output: bonus,
                                    ..Multiplier::default()
                                },
                                source.clone(),
                            ),
                        );
                    }
                }
            }
            WonderEffect::DepositNeighbours { building, deposit } => {
                for at in ctx.cache.buildings_of_type(state, building.as_str()) {
                    let adjacent = at
                        .neighbors()
                        .filter(|n| {
                            state
                                .tile(*n)
                                .map(|t| t.deposit.contains(deposit))
                                .unwrap_or(false)
                        })
                        .count();
                    if adjacent > 0 {
                        ctx.next.add_tile_multiplier(
                            at,
                            MultiplierWithSource::new(
                                Multiplier::output(adjacent as f64),
                                source.clone(),
                            ),
                        );
                    }
                }
            }
            WonderEffect::Happiness { value } => {
                ctx.next
                    .global_multipliers
                    .push(GlobalMultiplierKind::Happiness, *value, source.clone());
            }
            WonderEffect::Workers { amount } => {
                ctx.add_workers(&crate::content::ResourceId::worker(), *amount);
            }
            WonderEffect::ExploreDeposit { .. } => {}
        }
    }
    hooks.on_production_complete(hex, state);
}
