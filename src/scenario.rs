//! YAML description of a starting city.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use tracing::info;

use crate::{
    content::{Content, GameFeature, GreatPersonId, ResourceId},
    hex::Hex,
    hooks::NoopHooks,
    tech,
    world::{Building, BuildingVariant, GameState, ResourceImport, ResourceMap},
};

fn default_seed() -> u64 {
    1
}

fn default_start_time() -> DateTime<Utc> {
    Utc.timestamp_opt(0, 0).single().unwrap_or_default()
}

fn default_explored_radius() -> i32 {
    3
}

fn default_hq_level() -> u32 {
    1
}

fn default_level() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub city: String,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_start_time")]
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub ticks: Option<u64>,
    /// Researched for free, in the listed order.
    #[serde(default)]
    pub unlocked_tech: Vec<String>,
    #[serde(default)]
    pub great_people: BTreeMap<GreatPersonId, u32>,
    #[serde(default)]
    pub features: BTreeSet<GameFeature>,
    pub headquarter: ScenarioHeadquarter,
    #[serde(default)]
    pub deposits: Vec<ScenarioDeposit>,
    #[serde(default)]
    pub buildings: Vec<ScenarioBuilding>,
}

/// Offset coordinates `[col, row]`.
pub type OffsetCoord = [i32; 2];

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioHeadquarter {
    pub at: OffsetCoord,
    #[serde(default = "default_hq_level")]
    pub level: u32,
    #[serde(default = "default_explored_radius")]
    pub explored_radius: i32,
    #[serde(default)]
    pub stock: ResourceMap,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioDeposit {
    pub at: OffsetCoord,
    pub resource: ResourceId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioBuilding {
    pub at: OffsetCoord,
    #[serde(rename = "type")]
    pub building_type: String,
    /// 0 places a construction site.
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default)]
    pub stock: ResourceMap,
    #[serde(default)]
    pub priority: Option<u8>,
    #[serde(default)]
    pub sell: Vec<ResourceId>,
    #[serde(default)]
    pub imports: BTreeMap<ResourceId, ResourceImport>,
    #[serde(default)]
    pub autopilot: bool,
}

pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Scenario> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        let scenario: Scenario = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(scenario)
    }
}

impl Scenario {
    pub fn ticks(&self, override_ticks: Option<u64>) -> u64 {
        override_ticks.or(self.ticks).unwrap_or(120)
    }

    pub fn build_state(&self, content: &Content) -> Result<GameState> {
        let mut state = GameState::new(content, &self.city, self.seed, self.start_time)?;
        for tech_id in &self.unlocked_tech {
            tech::unlock_tech(content, &mut state, &mut NoopHooks, tech_id, true)
                .with_context(|| format!("scenario '{}' cannot unlock {tech_id}", self.name))?;
        }
        state.great_people_choices.clear();
        state.great_people.extend(self.great_people.clone());
        state.features.extend(self.features.iter().copied());

        for deposit in &self.deposits {
            let hex = Hex::from_offset(deposit.at[0], deposit.at[1]);
            state
                .tile_mut(hex)
                .ok_or_else(|| anyhow!("deposit at {hex} is outside the city"))?
                .deposit
                .insert(deposit.resource.clone());
        }

        let hq_hex = Hex::from_offset(self.headquarter.at[0], self.headquarter.at[1]);
        let hq_type = content.headquarter();
        let mut hq = Building::completed(
            hq_type.clone(),
            content.category(hq_type.as_str()),
            self.headquarter.level,
        );
        hq.resources.add_all(&self.headquarter.stock);
        state
            .tile_mut(hq_hex)
            .ok_or_else(|| anyhow!("headquarter at {hq_hex} is outside the city"))?
            .building = Some(hq);
        state.explore(hq_hex, self.headquarter.explored_radius);

        for entry in &self.buildings {
            self.place(content, &mut state, entry)?;
        }
        info!(
            scenario = %self.name,
            city = %self.city,
            buildings = state.buildings().count(),
            "scenario loaded"
        );
        Ok(state)
    }

    fn place(&self, content: &Content, state: &mut GameState, entry: &ScenarioBuilding) -> Result<()> {
        let hex = Hex::from_offset(entry.at[0], entry.at[1]);
        let building = state
            .place_building(content, hex, &entry.building_type)
            .with_context(|| format!("scenario '{}' cannot place {}", self.name, entry.building_type))?;
        if entry.level > 0 {
            *building = Building::completed(
                building.building_type.clone(),
                content.category(entry.building_type.as_str()),
                entry.level,
            );
        }
        building.resources.add_all(&entry.stock);
        if let Some(priority) = entry.priority {
            building.priority.set_production(priority);
            building.priority.set_construction(priority);
            building.priority.set_upgrade(priority);
        }
        if let Some(market) = building.market_mut() {
            market.sell_resources.extend(entry.sell.iter().cloned());
        }
        if let Some(imports) = building.resource_imports_mut() {
            imports.imports.extend(entry.imports.clone());
        }
        if let BuildingVariant::Warehouse(warehouse) = &mut building.variant {
            warehouse.autopilot = entry.autopilot;
        }
        let vision = content
            .building(entry.building_type.as_str())
            .map(|def| def.vision())
            .unwrap_or(0);
        if content.is_natural_wonder(entry.building_type.as_str()) {
            return Ok(());
        }
        if entry.level > 0 {
            state.explore(hex, vision);
        } else if let Some(tile) = state.tile_mut(hex) {
            tile.explored = true;
        }
        Ok(())
    }
}
