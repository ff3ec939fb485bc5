//! Per-tick memoization of derived views.
//!
//! The cache is rebuilt wholesale by [`crate::tick::SimContext::swap`]; entries are never
//! invalidated individually. Building I/O is keyed by level as well as tile, so an upgrade
//! finishing mid-tick is seen by every later reader. Interior mutability lets read-only
//! formula code fill it.

use std::{
    cell::RefCell,
    collections::{BTreeMap, BTreeSet},
};

use crate::{
    content::{BuildingType, Content, ResourceId},
    economy::{IoFlags, IoKind},
    hex::Hex,
    world::{GameState, ResourceMap},
};

/// Tile, building level, direction and flags.
pub type IoKey = (Hex, u32, IoKind, IoFlags);

#[derive(Debug, Default)]
pub struct IntraTickCache {
    building_io: RefCell<BTreeMap<IoKey, ResourceMap>>,
    buildings_by_type: RefCell<Option<BTreeMap<BuildingType, Vec<Hex>>>>,
    unlocked_buildings: RefCell<Option<BTreeSet<BuildingType>>>,
    unlocked_resources: RefCell<Option<BTreeSet<ResourceId>>>,
}

impl IntraTickCache {
    pub fn building_io(
        &self,
        key: IoKey,
        compute: impl FnOnce() -> ResourceMap,
    ) -> ResourceMap {
        if let Some(hit) = self.building_io.borrow().get(&key) {
            return hit.clone();
        }
        let value = compute();
        self.building_io.borrow_mut().insert(key, value.clone());
        value
    }

    pub fn with_buildings_by_type<R>(
        &self,
        state: &GameState,
        f: impl FnOnce(&BTreeMap<BuildingType, Vec<Hex>>) -> R,
    ) -> R {
        let mut slot = self.buildings_by_type.borrow_mut();
        let map = slot.get_or_insert_with(|| {
            let mut map: BTreeMap<BuildingType, Vec<Hex>> = BTreeMap::new();
            for (hex, building) in state.buildings() {
                map.entry(building.building_type.clone())
                    .or_default()
                    .push(hex);
            }
            map
        });
        f(map)
    }

    pub fn buildings_of_type(&self, state: &GameState, building: &str) -> Vec<Hex> {
        self.with_buildings_by_type(state, |map| map.get(building).cloned().unwrap_or_default())
    }

    /// Buildings unlocked by researched technology.
    pub fn unlocked_buildings(&self, content: &Content, state: &GameState) -> BTreeSet<BuildingType> {
        self.unlocked_buildings
            .borrow_mut()
            .get_or_insert_with(|| {
                state
                    .unlocked_tech
                    .iter()
                    .filter_map(|tech| content.techs.get(tech))
                    .flat_map(|def| def.unlock_building.iter().cloned())
                    .collect()
            })
            .clone()
    }

    /// Outputs of every unlocked building.
    pub fn unlocked_resources(&self, content: &Content, state: &GameState) -> BTreeSet<ResourceId> {
        if let Some(hit) = self.unlocked_resources.borrow().as_ref() {
            return hit.clone();
        }
        let resources: BTreeSet<ResourceId> = self
            .unlocked_buildings(content, state)
            .iter()
            .filter_map(|b| content.buildings.get(b))
            .flat_map(|def| def.output.keys().cloned())
            .collect();
        *self.unlocked_resources.borrow_mut() = Some(resources.clone());
        resources
    }
}
