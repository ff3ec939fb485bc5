//! Static content tables: resources, buildings, technologies, ages, great people and cities.
//!
//! Tables are loaded once from YAML, validated, and priced before any simulation starts.
//! Nothing in the tick pipeline mutates them; recipe edits happen on the tick buffer's copy.

mod defs;
mod ids;
pub mod pricing;

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

pub use defs::{
    BuildingCategory, BuildingDef, BuildingModifier, BuildingSpecial, CityDef, GameFeature,
    GreatPersonDef, ResourceDef, TechAgeDef, TechDef, WonderEffect, BUILDING_DEFAULT_VISION,
};
pub use ids::{AgeId, BuildingType, CityId, GreatPersonId, ResourceId, TechId};
pub use pricing::PricingTable;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("missing referenced id '{id}' in {context}")]
    MissingId { id: String, context: String },
    #[error("building {building} is unlocked by more than one tech ({techs})")]
    DuplicateUnlock { building: BuildingType, techs: String },
    #[error("building {0} has no tech that unlocks it")]
    NoUnlockPath(BuildingType),
    #[error("building {0} has neither 'input' nor 'construction' defined")]
    NoCost(BuildingType),
    #[error("deposit {0} is not revealed by any technology")]
    DepositNotRevealed(ResourceId),
    #[error("resource {0} does not resolve a tier or price")]
    Unpriced(ResourceId),
    #[error("pricing did not converge, buildings without tier: {0}")]
    PricingDiverged(String),
    #[error("content defines no headquarter building")]
    NoHeadquarter,
}

pub enum ContentSource<'a> {
    /// The ruleset bundled with the crate.
    Embedded,
    Path(PathBuf),
    Str(&'a str),
}

#[derive(Debug, Deserialize)]
struct RawContent {
    resources: BTreeMap<ResourceId, ResourceDef>,
    buildings: BTreeMap<BuildingType, BuildingDef>,
    techs: BTreeMap<TechId, TechDef>,
    ages: BTreeMap<AgeId, TechAgeDef>,
    #[serde(default)]
    great_people: BTreeMap<GreatPersonId, GreatPersonDef>,
    cities: BTreeMap<CityId, CityDef>,
}

#[derive(Debug, Clone)]
pub struct Content {
    pub resources: BTreeMap<ResourceId, ResourceDef>,
    pub buildings: BTreeMap<BuildingType, BuildingDef>,
    pub techs: BTreeMap<TechId, TechDef>,
    pub ages: BTreeMap<AgeId, TechAgeDef>,
    pub great_people: BTreeMap<GreatPersonId, GreatPersonDef>,
    pub cities: BTreeMap<CityId, CityDef>,
    pub pricing: PricingTable,
    building_unlock: BTreeMap<BuildingType, TechId>,
    headquarter: BuildingType,
}

pub fn load_content(source: ContentSource<'_>) -> Result<Content, ContentError> {
    let raw: RawContent = match source {
        ContentSource::Embedded => serde_yaml::from_str(include_str!("../../content/base.yaml"))?,
        ContentSource::Path(path) => {
            let data = std::fs::read_to_string(&path).map_err(|source| ContentError::Io {
                path: path.clone(),
                source,
            })?;
            serde_yaml::from_str(&data)?
        }
        ContentSource::Str(data) => serde_yaml::from_str(data)?,
    };
    compile(raw)
}

pub fn load_content_file(path: impl AsRef<Path>) -> Result<Content, ContentError> {
    load_content(ContentSource::Path(path.as_ref().to_path_buf()))
}

fn compile(raw: RawContent) -> Result<Content, ContentError> {
    validate_references(&raw)?;

    let mut building_unlock: BTreeMap<BuildingType, TechId> = BTreeMap::new();
    for (tech, def) in &raw.techs {
        for building in &def.unlock_building {
            if let Some(existing) = building_unlock.get(building) {
                return Err(ContentError::DuplicateUnlock {
                    building: building.clone(),
                    techs: format!("{existing},{tech}"),
                });
            }
            building_unlock.insert(building.clone(), tech.clone());
        }
    }

    for (building, def) in &raw.buildings {
        let is_free = matches!(
            def.special,
            Some(BuildingSpecial::Headquarter) | Some(BuildingSpecial::NaturalWonder)
        );
        if is_free {
            continue;
        }
        if !building_unlock.contains_key(building) {
            return Err(ContentError::NoUnlockPath(building.clone()));
        }
        if def.input.is_empty() && def.construction.is_empty() {
            return Err(ContentError::NoCost(building.clone()));
        }
    }

    let headquarter = raw
        .buildings
        .iter()
        .find(|(_, def)| def.special == Some(BuildingSpecial::Headquarter))
        .map(|(id, _)| id.clone())
        .ok_or(ContentError::NoHeadquarter)?;

    let mut content = Content {
        resources: raw.resources,
        buildings: raw.buildings,
        techs: raw.techs,
        ages: raw.ages,
        great_people: raw.great_people,
        cities: raw.cities,
        pricing: PricingTable::default(),
        building_unlock,
        headquarter,
    };
    content.pricing = pricing::resolve(&content)?;
    info!(
        resources = content.resources.len(),
        buildings = content.buildings.len(),
        techs = content.techs.len(),
        "content tables loaded"
    );
    Ok(content)
}

fn missing(id: &str, context: impl Into<String>) -> ContentError {
    ContentError::MissingId {
        id: id.to_string(),
        context: context.into(),
    }
}

fn validate_references(raw: &RawContent) -> Result<(), ContentError> {
    let check_resources = |map: &crate::world::ResourceMap, context: &str| {
        for res in map.keys() {
            if !raw.resources.contains_key(res) {
                return Err(missing(res.as_str(), context));
            }
        }
        Ok(())
    };
    for (building, def) in &raw.buildings {
        let context = format!("building {building}");
        check_resources(&def.input, context.as_str())?;
        check_resources(&def.output, context.as_str())?;
        check_resources(&def.construction, context.as_str())?;
        for res in &def.deposit {
            if !raw.resources.contains_key(res) {
                return Err(missing(res.as_str(), &context));
            }
        }
        for effect in &def.effects {
            match effect {
                WonderEffect::ProducersOf { resource, .. } => {
                    if !raw.resources.contains_key(resource) {
                        return Err(missing(resource.as_str(), &context));
                    }
                }
                WonderEffect::DepositNeighbours { building, deposit } => {
                    if !raw.buildings.contains_key(building) {
                        return Err(missing(building.as_str(), &context));
                    }
                    if !raw.resources.contains_key(deposit) {
                        return Err(missing(deposit.as_str(), &context));
                    }
                }
                WonderEffect::ExploreDeposit { deposit } => {
                    if !raw.resources.contains_key(deposit) {
                        return Err(missing(deposit.as_str(), &context));
                    }
                }
                _ => {}
            }
        }
    }
    for (tech, def) in &raw.techs {
        let context = format!("tech {tech}");
        for req in &def.require_tech {
            if !raw.techs.contains_key(req) {
                return Err(missing(req.as_str(), &context));
            }
        }
        for building in def
            .unlock_building
            .iter()
            .chain(def.building_multiplier.keys())
            .chain(def.building_modifier.keys())
        {
            if !raw.buildings.contains_key(building) {
                return Err(missing(building.as_str(), &context));
            }
        }
        for res in &def.reveal_deposit {
            if !raw.resources.contains_key(res) {
                return Err(missing(res.as_str(), &context));
            }
        }
        for modifier in def.building_modifier.values() {
            check_resources(&modifier.input, context.as_str())?;
            check_resources(&modifier.output, context.as_str())?;
        }
    }
    for (person, def) in &raw.great_people {
        let context = format!("great person {person}");
        if !raw.ages.contains_key(&def.age) {
            return Err(missing(def.age.as_str(), &context));
        }
        for building in def.building_multiplier.keys() {
            if !raw.buildings.contains_key(building) {
                return Err(missing(building.as_str(), &context));
            }
        }
    }
    for (city, def) in &raw.cities {
        let context = format!("city {city}");
        for res in def.deposits.keys() {
            if !raw.resources.contains_key(res) {
                return Err(missing(res.as_str(), &context));
            }
        }
    }
    debug!("content references validated");
    Ok(())
}

impl Content {
    pub fn resource(&self, res: &str) -> Option<&ResourceDef> {
        self.resources.get(res)
    }

    /// Storable resources occupy storage and travel by transport; the rest are worker-like pools.
    pub fn can_store(&self, res: &str) -> bool {
        self.resources.get(res).map(|r| r.can_store).unwrap_or(false)
    }

    pub fn can_price(&self, res: &str) -> bool {
        self.resources.get(res).map(|r| r.can_price).unwrap_or(false)
    }

    pub fn building(&self, building: &str) -> Option<&BuildingDef> {
        self.buildings.get(building)
    }

    pub fn special(&self, building: &str) -> Option<BuildingSpecial> {
        self.buildings.get(building).and_then(|b| b.special)
    }

    pub fn is_special(&self, building: &str) -> bool {
        self.special(building).is_some()
    }

    pub fn is_world_wonder(&self, building: &str) -> bool {
        self.special(building) == Some(BuildingSpecial::WorldWonder)
    }

    pub fn is_natural_wonder(&self, building: &str) -> bool {
        self.special(building) == Some(BuildingSpecial::NaturalWonder)
    }

    pub fn category(&self, building: &str) -> BuildingCategory {
        self.buildings
            .get(building)
            .map(|b| b.kind)
            .unwrap_or_default()
    }

    pub fn headquarter(&self) -> &BuildingType {
        &self.headquarter
    }

    pub fn building_unlock_tech(&self, building: &str) -> Option<&TechId> {
        self.building_unlock.get(building)
    }

    pub fn tech_column(&self, tech: &str) -> u32 {
        self.techs.get(tech).map(|t| t.column).unwrap_or(0)
    }

    pub fn age_for_tech(&self, tech: &str) -> Option<(&AgeId, &TechAgeDef)> {
        let column = self.techs.get(tech)?.column;
        self.ages
            .iter()
            .find(|(_, age)| column >= age.from && column <= age.to)
    }

    /// `(age index, tech column)` of the tech that unlocks `building`, zeros when none.
    pub fn unlock_age_and_column(&self, building: &str) -> (u32, u32) {
        match self.building_unlock_tech(building) {
            Some(tech) => {
                let age = self.age_for_tech(tech.as_str()).map(|(_, a)| a.idx).unwrap_or(0);
                (age, self.tech_column(tech.as_str()))
            }
            None => (0, 0),
        }
    }

    pub fn deposit_unlock_tech(&self, deposit: &str) -> Option<&TechId> {
        self.techs
            .iter()
            .filter(|(_, def)| def.reveal_deposit.iter().any(|d| d.as_str() == deposit))
            .min_by_key(|(_, def)| def.column)
            .map(|(id, _)| id)
    }

    pub fn building_tier(&self, building: &str) -> u32 {
        self.pricing.building_tier.get(building).copied().unwrap_or(0)
    }

    pub fn resource_price(&self, res: &str) -> f64 {
        self.pricing.resource_price.get(res).copied().unwrap_or(0.0)
    }

    pub fn resource_tier(&self, res: &str) -> u32 {
        self.pricing.resource_tier.get(res).copied().unwrap_or(0)
    }

    pub fn display_name(&self, building: &str) -> String {
        self.buildings
            .get(building)
            .and_then(|b| b.name.clone())
            .unwrap_or_else(|| building.to_string())
    }

    pub fn tech_display_name(&self, tech: &str) -> String {
        self.techs
            .get(tech)
            .and_then(|t| t.name.clone())
            .unwrap_or_else(|| tech.to_string())
    }

    /// Building types whose base output includes `res`.
    pub fn buildings_producing(&self, res: &str) -> Vec<&BuildingType> {
        self.buildings
            .iter()
            .filter(|(_, def)| def.output.contains(res))
            .map(|(id, _)| id)
            .collect()
    }
}
