use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
    content::{AgeId, BuildingType, ResourceId, TechId},
    tick::{GlobalMultiplierKind, Multiplier},
    world::ResourceMap,
};

fn default_true() -> bool {
    true
}

pub const BUILDING_DEFAULT_VISION: i32 = 2;

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceDef {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_true")]
    pub can_store: bool,
    #[serde(default = "default_true")]
    pub can_price: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildingSpecial {
    #[serde(rename = "HQ")]
    Headquarter,
    WorldWonder,
    NaturalWonder,
}

/// Selects which building variant a placed building of this type carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildingCategory {
    #[default]
    Standard,
    Market,
    Caravansary,
    Warehouse,
    Petra,
}

/// Wonder behaviour triggered from the completion/production hooks.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum WonderEffect {
    /// Tile multipliers on every neighbouring tile.
    Adjacent { multiplier: Multiplier },
    /// Building-type multiplier for every building type whose output contains `resource`.
    ProducersOf {
        resource: ResourceId,
        multiplier: Multiplier,
    },
    /// Every building gains `floor(level / per_levels)` input and output.
    LevelBonus { per_levels: u32 },
    /// Buildings of `building` gain output per adjacent tile holding `deposit`.
    DepositNeighbours {
        building: BuildingType,
        deposit: ResourceId,
    },
    /// Global happiness while the wonder is producing.
    Happiness { value: f64 },
    /// Extra workers supplied for the next tick.
    Workers { amount: f64 },
    /// On completion, explores every tile holding `deposit`.
    ExploreDeposit { deposit: ResourceId },
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildingDef {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub input: ResourceMap,
    #[serde(default)]
    pub output: ResourceMap,
    #[serde(default)]
    pub construction: ResourceMap,
    #[serde(default)]
    pub deposit: BTreeSet<ResourceId>,
    #[serde(default)]
    pub vision: Option<i32>,
    #[serde(default)]
    pub max: Option<u32>,
    #[serde(default)]
    pub special: Option<BuildingSpecial>,
    #[serde(default)]
    pub kind: BuildingCategory,
    #[serde(default)]
    pub effects: Vec<WonderEffect>,
    #[serde(default)]
    pub electrifiable: Option<bool>,
}

impl BuildingDef {
    pub fn vision(&self) -> i32 {
        self.vision.unwrap_or(BUILDING_DEFAULT_VISION)
    }
}

/// Additive edit to a building type's base recipe.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BuildingModifier {
    #[serde(default)]
    pub input: ResourceMap,
    #[serde(default)]
    pub output: ResourceMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GameFeature {
    WarehouseUpgrade,
    Electricity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TechDef {
    #[serde(default)]
    pub name: Option<String>,
    pub column: u32,
    #[serde(default)]
    pub require_tech: Vec<TechId>,
    #[serde(default)]
    pub unlock_building: Vec<BuildingType>,
    #[serde(default)]
    pub reveal_deposit: Vec<ResourceId>,
    #[serde(default)]
    pub unlock_feature: Vec<GameFeature>,
    #[serde(default)]
    pub building_multiplier: BTreeMap<BuildingType, Multiplier>,
    #[serde(default)]
    pub building_modifier: BTreeMap<BuildingType, BuildingModifier>,
    #[serde(default)]
    pub global_multiplier: BTreeMap<GlobalMultiplierKind, f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TechAgeDef {
    pub idx: u32,
    pub from: u32,
    pub to: u32,
}

/// Great person effects are declared per level and scaled by the acquired level.
#[derive(Debug, Clone, Deserialize)]
pub struct GreatPersonDef {
    #[serde(default)]
    pub name: Option<String>,
    pub age: AgeId,
    #[serde(default)]
    pub building_multiplier: BTreeMap<BuildingType, Multiplier>,
    #[serde(default)]
    pub global_multiplier: BTreeMap<GlobalMultiplierKind, f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CityDef {
    pub size: i32,
    #[serde(default)]
    pub deposits: BTreeMap<ResourceId, f64>,
    #[serde(default)]
    pub building_names: BTreeMap<BuildingType, String>,
}
