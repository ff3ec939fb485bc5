use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
    content::{BuildingCategory, BuildingType, ResourceId},
    world::ResourceMap,
};

pub const PRIORITY_MIN: u8 = 1;
pub const PRIORITY_MAX: u8 = 10;
pub const STOCKPILE_CAPACITY_MIN: f64 = 0.0;
pub const STOCKPILE_CAPACITY_MAX: f64 = 10.0;
pub const STOCKPILE_MAX_MIN: f64 = 0.0;
pub const STOCKPILE_MAX_MAX: f64 = 50.0;
pub const DEFAULT_STOCKPILE_CAPACITY: f64 = 1.0;
pub const DEFAULT_STOCKPILE_MAX: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingStatus {
    Building,
    Upgrading,
    Paused,
    Completed,
}

/// Three independent scheduling priorities, each clamped to `[PRIORITY_MIN, PRIORITY_MAX]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Priority {
    production: u8,
    construction: u8,
    upgrade: u8,
}

impl Default for Priority {
    fn default() -> Self {
        Self {
            production: PRIORITY_MIN,
            construction: PRIORITY_MIN,
            upgrade: PRIORITY_MIN,
        }
    }
}

impl Priority {
    pub fn production(&self) -> u8 {
        self.production
    }

    pub fn construction(&self) -> u8 {
        self.construction
    }

    pub fn upgrade(&self) -> u8 {
        self.upgrade
    }

    pub fn set_production(&mut self, value: u8) {
        self.production = value.clamp(PRIORITY_MIN, PRIORITY_MAX);
    }

    pub fn set_construction(&mut self, value: u8) {
        self.construction = value.clamp(PRIORITY_MIN, PRIORITY_MAX);
    }

    pub fn set_upgrade(&mut self, value: u8) {
        self.upgrade = value.clamp(PRIORITY_MIN, PRIORITY_MAX);
    }

    /// The priority that applies to a building in `status`.
    pub fn current(&self, status: BuildingStatus) -> u8 {
        match status {
            BuildingStatus::Building => self.construction,
            BuildingStatus::Upgrading => self.upgrade,
            BuildingStatus::Completed => self.production,
            BuildingStatus::Paused => PRIORITY_MIN,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    pub sell_resources: BTreeSet<ResourceId>,
    /// Sell resource -> buy resource, reshuffled every price period.
    pub available_resources: BTreeMap<ResourceId, ResourceId>,
    pub clear_after_update: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceImport {
    pub per_cycle: f64,
    pub cap: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceImportData {
    pub imports: BTreeMap<ResourceId, ResourceImport>,
    #[serde(default)]
    pub export_below_cap: bool,
    #[serde(default)]
    pub export_to_same_type: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WarehouseData {
    pub import: ResourceImportData,
    pub autopilot: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PetraData {
    pub time_warp: bool,
    offline_production_percent: f64,
}

impl Default for PetraData {
    fn default() -> Self {
        Self {
            time_warp: false,
            offline_production_percent: 1.0,
        }
    }
}

impl PetraData {
    pub fn offline_production_percent(&self) -> f64 {
        self.offline_production_percent
    }

    pub fn set_offline_production_percent(&mut self, value: f64) {
        self.offline_production_percent = value.clamp(0.0, 1.0);
    }
}

/// Per-category extra state, matched exhaustively instead of probing for optional fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingVariant {
    Standard,
    Market(MarketData),
    Caravansary(ResourceImportData),
    Warehouse(WarehouseData),
    Petra(PetraData),
}

impl BuildingVariant {
    pub fn for_category(category: BuildingCategory) -> Self {
        match category {
            BuildingCategory::Standard => BuildingVariant::Standard,
            BuildingCategory::Market => BuildingVariant::Market(MarketData::default()),
            BuildingCategory::Caravansary => {
                BuildingVariant::Caravansary(ResourceImportData::default())
            }
            BuildingCategory::Warehouse => BuildingVariant::Warehouse(WarehouseData::default()),
            BuildingCategory::Petra => BuildingVariant::Petra(PetraData::default()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub building_type: BuildingType,
    pub level: u32,
    pub desired_level: u32,
    pub resources: ResourceMap,
    pub status: BuildingStatus,
    capacity: f64,
    stockpile_capacity: f64,
    stockpile_max: f64,
    pub priority: Priority,
    pub electrification: u32,
    pub variant: BuildingVariant,
}

impl Building {
    /// A freshly placed building at level 0, waiting for its construction materials.
    pub fn new(building_type: BuildingType, category: BuildingCategory) -> Self {
        Self {
            building_type,
            level: 0,
            desired_level: 0,
            resources: ResourceMap::new(),
            status: BuildingStatus::Building,
            capacity: 1.0,
            stockpile_capacity: DEFAULT_STOCKPILE_CAPACITY,
            stockpile_max: DEFAULT_STOCKPILE_MAX,
            priority: Priority::default(),
            electrification: 0,
            variant: BuildingVariant::for_category(category),
        }
    }

    /// Already completed at `level`, used when seeding a city.
    pub fn completed(building_type: BuildingType, category: BuildingCategory, level: u32) -> Self {
        let mut building = Self::new(building_type, category);
        building.level = level;
        building.desired_level = level;
        building.status = BuildingStatus::Completed;
        building
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn set_capacity(&mut self, value: f64) {
        self.capacity = value.clamp(0.0, 1.0);
    }

    pub fn stockpile_capacity(&self) -> f64 {
        self.stockpile_capacity
    }

    pub fn set_stockpile_capacity(&mut self, value: f64) {
        self.stockpile_capacity = value.clamp(STOCKPILE_CAPACITY_MIN, STOCKPILE_CAPACITY_MAX);
    }

    /// Raw setting; 0 means unlimited, see [`Building::stockpile_max_multiple`].
    pub fn stockpile_max(&self) -> f64 {
        self.stockpile_max
    }

    pub fn set_stockpile_max(&mut self, value: f64) {
        self.stockpile_max = value.clamp(STOCKPILE_MAX_MIN, STOCKPILE_MAX_MAX);
    }

    pub fn stockpile_max_multiple(&self) -> f64 {
        if self.stockpile_max == 0.0 {
            f64::INFINITY
        } else {
            self.stockpile_max
        }
    }

    pub fn is_building_or_upgrading(&self) -> bool {
        matches!(
            self.status,
            BuildingStatus::Building | BuildingStatus::Upgrading
        )
    }

    pub fn current_priority(&self) -> u8 {
        self.priority.current(self.status)
    }

    /// Queues `levels` more upgrades. Only completed or upgrading buildings can be upgraded.
    pub fn request_upgrade(&mut self, levels: u32) -> bool {
        match self.status {
            BuildingStatus::Completed | BuildingStatus::Upgrading => {
                self.desired_level = self.desired_level.max(self.level) + levels;
                if self.desired_level > self.level {
                    self.status = BuildingStatus::Upgrading;
                }
                true
            }
            BuildingStatus::Building | BuildingStatus::Paused => false,
        }
    }

    pub fn pause(&mut self) {
        self.status = BuildingStatus::Paused;
    }

    pub fn resume(&mut self) {
        if self.status != BuildingStatus::Paused {
            return;
        }
        self.status = if self.level == 0 {
            BuildingStatus::Building
        } else if self.desired_level > self.level {
            BuildingStatus::Upgrading
        } else {
            BuildingStatus::Completed
        };
    }

    pub fn resource_imports(&self) -> Option<&ResourceImportData> {
        match &self.variant {
            BuildingVariant::Caravansary(data) => Some(data),
            BuildingVariant::Warehouse(data) => Some(&data.import),
            _ => None,
        }
    }

    pub fn resource_imports_mut(&mut self) -> Option<&mut ResourceImportData> {
        match &mut self.variant {
            BuildingVariant::Caravansary(data) => Some(data),
            BuildingVariant::Warehouse(data) => Some(&mut data.import),
            _ => None,
        }
    }

    pub fn market(&self) -> Option<&MarketData> {
        match &self.variant {
            BuildingVariant::Market(data) => Some(data),
            _ => None,
        }
    }

    pub fn market_mut(&mut self) -> Option<&mut MarketData> {
        match &mut self.variant {
            BuildingVariant::Market(data) => Some(data),
            _ => None,
        }
    }

    pub fn petra(&self) -> Option<&PetraData> {
        match &self.variant {
            BuildingVariant::Petra(data) => Some(data),
            _ => None,
        }
    }

    pub fn is_warehouse_on_autopilot(&self) -> bool {
        matches!(&self.variant, BuildingVariant::Warehouse(data) if data.autopilot)
    }

    /// Markets, caravansaries and warehouses size their storage by level instead of by recipe.
    pub fn has_level_based_storage(&self) -> bool {
        matches!(
            self.variant,
            BuildingVariant::Market(_)
                | BuildingVariant::Caravansary(_)
                | BuildingVariant::Warehouse(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hut() -> Building {
        Building::new(BuildingType::new("Hut"), BuildingCategory::Standard)
    }

    #[test]
    fn new_building_defaults() {
        let b = hut();
        assert_eq!(b.level, 0);
        assert_eq!(b.status, BuildingStatus::Building);
        assert_eq!(b.capacity(), 1.0);
        assert_eq!(b.stockpile_capacity(), 1.0);
        assert_eq!(b.stockpile_max(), 5.0);
        assert_eq!(b.current_priority(), PRIORITY_MIN);
    }

    #[test]
    fn priority_fields_clamp_independently() {
        let mut p = Priority::default();
        p.set_production(42);
        p.set_construction(0);
        p.set_upgrade(7);
        assert_eq!(p.production(), PRIORITY_MAX);
        assert_eq!(p.construction(), PRIORITY_MIN);
        assert_eq!(p.upgrade(), 7);
        assert_eq!(p.current(BuildingStatus::Upgrading), 7);
        assert_eq!(p.current(BuildingStatus::Completed), PRIORITY_MAX);
    }

    #[test]
    fn settings_are_clamped() {
        let mut b = hut();
        b.set_capacity(1.5);
        b.set_stockpile_capacity(-3.0);
        b.set_stockpile_max(80.0);
        assert_eq!(b.capacity(), 1.0);
        assert_eq!(b.stockpile_capacity(), 0.0);
        assert_eq!(b.stockpile_max(), 50.0);
        b.set_stockpile_max(0.0);
        assert!(b.stockpile_max_multiple().is_infinite());
    }

    #[test]
    fn resume_never_returns_to_building_after_completion() {
        let mut b = Building::completed(BuildingType::new("Hut"), BuildingCategory::Standard, 2);
        b.pause();
        b.resume();
        assert_eq!(b.status, BuildingStatus::Completed);
        assert!(b.request_upgrade(1));
        assert_eq!(b.status, BuildingStatus::Upgrading);
        assert_eq!(b.current_priority(), b.priority.upgrade());
        b.pause();
        b.resume();
        assert_eq!(b.status, BuildingStatus::Upgrading);
    }

    #[test]
    fn cannot_upgrade_while_under_construction() {
        let mut b = hut();
        assert!(!b.request_upgrade(1));
        assert_eq!(b.desired_level, 0);
    }
}
