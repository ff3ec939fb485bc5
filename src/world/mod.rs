//! Persisted game state: the tile grid, buildings, in-flight transports and progression.
//!
//! Everything here is plain serializable data. Tick buffers and caches are derived from it
//! and never stored.

mod building;
mod resources;

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    content::{BuildingType, CityId, Content, GameFeature, GreatPersonId, ResourceId, TechId},
    hex::Hex,
};

pub use building::{
    Building, BuildingStatus, BuildingVariant, MarketData, PetraData, Priority, ResourceImport,
    ResourceImportData, WarehouseData, DEFAULT_STOCKPILE_CAPACITY, DEFAULT_STOCKPILE_MAX,
    PRIORITY_MAX, PRIORITY_MIN,
};
pub use resources::ResourceMap;

pub const SECONDS_PER_TICK: i64 = 1;
pub const SECONDS_PER_PRICE_PERIOD: i64 = 3600;

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("unknown city '{0}'")]
    UnknownCity(String),
    #[error("unknown building type '{0}'")]
    UnknownBuilding(String),
    #[error("tile {0} is outside the city grid")]
    NoSuchTile(Hex),
    #[error("tile {0} already holds a building")]
    Occupied(Hex),
    #[error("building {building} is limited to {max} per city")]
    MaxReached { building: BuildingType, max: u32 },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub deposit: BTreeSet<ResourceId>,
    pub explored: bool,
    pub building: Option<Building>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transportation {
    pub id: u64,
    pub from: Hex,
    pub to: Hex,
    pub resource: ResourceId,
    pub amount: f64,
    pub fuel: ResourceId,
    pub fuel_amount: f64,
    pub ticks_required: u32,
    pub ticks_spent: u32,
    pub has_enough_fuel: bool,
}

impl Transportation {
    pub fn has_arrived(&self) -> bool {
        self.ticks_spent >= self.ticks_required
    }
}

fn default_start_time() -> DateTime<Utc> {
    Utc.timestamp_opt(0, 0).single().unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub city: CityId,
    pub seed: u64,
    #[serde(default = "default_start_time")]
    pub start_time: DateTime<Utc>,
    pub tick: u64,
    pub tiles: BTreeMap<Hex, Tile>,
    /// In-flight transports keyed by destination.
    pub transportation: BTreeMap<Hex, Vec<Transportation>>,
    pub transport_id: u64,
    pub unlocked_tech: BTreeSet<TechId>,
    pub great_people: BTreeMap<GreatPersonId, u32>,
    pub great_people_choices: VecDeque<Vec<GreatPersonId>>,
    pub last_price_updated: Option<i64>,
    pub features: BTreeSet<GameFeature>,
}

impl GameState {
    /// A fresh, fully unexplored `size × size` grid for `city`.
    pub fn new(
        content: &Content,
        city: &str,
        seed: u64,
        start_time: DateTime<Utc>,
    ) -> Result<Self, WorldError> {
        let (city_id, def) = content
            .cities
            .get_key_value(city)
            .ok_or_else(|| WorldError::UnknownCity(city.to_string()))?;
        let mut tiles = BTreeMap::new();
        for row in 0..def.size {
            for col in 0..def.size {
                tiles.insert(Hex::from_offset(col, row), Tile::default());
            }
        }
        Ok(Self {
            city: city_id.clone(),
            seed,
            start_time,
            tick: 0,
            tiles,
            transportation: BTreeMap::new(),
            transport_id: 0,
            unlocked_tech: BTreeSet::new(),
            great_people: BTreeMap::new(),
            great_people_choices: VecDeque::new(),
            last_price_updated: None,
            features: BTreeSet::new(),
        })
    }

    /// Simulated wall-clock time; one tick is one second after `start_time`.
    pub fn sim_time(&self) -> DateTime<Utc> {
        self.start_time + Duration::seconds(self.tick as i64 * SECONDS_PER_TICK)
    }

    /// Hour bucket used to rotate market pairs and prices.
    pub fn price_id(&self) -> i64 {
        self.sim_time()
            .timestamp()
            .div_euclid(SECONDS_PER_PRICE_PERIOD)
    }

    pub fn has_feature(&self, feature: GameFeature) -> bool {
        self.features.contains(&feature)
    }

    pub fn is_tech_unlocked(&self, tech: &str) -> bool {
        self.unlocked_tech.contains(tech)
    }

    pub fn tile(&self, hex: Hex) -> Option<&Tile> {
        self.tiles.get(&hex)
    }

    pub fn tile_mut(&mut self, hex: Hex) -> Option<&mut Tile> {
        self.tiles.get_mut(&hex)
    }

    pub fn building(&self, hex: Hex) -> Option<&Building> {
        self.tiles.get(&hex).and_then(|t| t.building.as_ref())
    }

    pub fn building_mut(&mut self, hex: Hex) -> Option<&mut Building> {
        self.tiles.get_mut(&hex).and_then(|t| t.building.as_mut())
    }

    /// Every building in hex order.
    pub fn buildings(&self) -> impl Iterator<Item = (Hex, &Building)> {
        self.tiles
            .iter()
            .filter_map(|(hex, tile)| tile.building.as_ref().map(|b| (*hex, b)))
    }

    pub fn count_buildings(&self, building_type: &str) -> usize {
        self.buildings()
            .filter(|(_, b)| b.building_type.as_str() == building_type)
            .count()
    }

    pub fn headquarter(&self, content: &Content) -> Option<Hex> {
        let hq = content.headquarter();
        self.buildings()
            .find(|(_, b)| &b.building_type == hq)
            .map(|(hex, _)| hex)
    }

    /// Places a level 0 building under construction.
    pub fn place_building(
        &mut self,
        content: &Content,
        hex: Hex,
        building_type: &str,
    ) -> Result<&mut Building, WorldError> {
        let (id, def) = content
            .buildings
            .get_key_value(building_type)
            .ok_or_else(|| WorldError::UnknownBuilding(building_type.to_string()))?;
        if let Some(max) = def.max {
            if self.count_buildings(building_type) >= max as usize {
                return Err(WorldError::MaxReached {
                    building: id.clone(),
                    max,
                });
            }
        }
        let tile = self.tiles.get_mut(&hex).ok_or(WorldError::NoSuchTile(hex))?;
        if tile.building.is_some() {
            return Err(WorldError::Occupied(hex));
        }
        Ok(tile.building.insert(Building::new(id.clone(), def.kind)))
    }

    /// Removes the building on `hex` together with the transports heading to it.
    pub fn remove_building(&mut self, hex: Hex) -> Option<Building> {
        self.transportation.remove(&hex);
        self.tiles.get_mut(&hex).and_then(|t| t.building.take())
    }

    /// Marks every tile within `radius` of `center` explored. Returns how many were newly explored.
    pub fn explore(&mut self, center: Hex, radius: i32) -> usize {
        let mut explored = 0;
        for hex in center.ring_inclusive(radius) {
            if let Some(tile) = self.tiles.get_mut(&hex) {
                if !tile.explored {
                    tile.explored = true;
                    explored += 1;
                }
            }
        }
        explored
    }

    pub fn amount_in_transit(&self, to: Hex, res: &str) -> f64 {
        self.transportation
            .get(&to)
            .map(|queue| {
                queue
                    .iter()
                    .filter(|t| t.resource.as_str() == res)
                    .map(|t| t.amount)
                    .sum()
            })
            .unwrap_or(0.0)
    }

    pub fn next_transport_id(&mut self) -> u64 {
        self.transport_id += 1;
        self.transport_id
    }

    pub fn transports_in_flight(&self) -> usize {
        self.transportation.values().map(Vec::len).sum()
    }
}
