use crate::{
    content::Content,
    economy::total_multiplier_for,
    hex::Hex,
    tick::{GlobalMultiplierKind, MultiplierKind, SimContext},
    world::{GameState, ResourceMap},
};

pub const BASE_COST_MULTIPLIER: f64 = 10.0;
pub const WONDER_BASE_COST_MULTIPLIER: f64 = 10.0;
const LEVEL_COST_GROWTH: f64 = 1.5;

fn wonder_indices(content: &Content, building_type: &str) -> (f64, f64) {
    let (age, column) = content.unlock_age_and_column(building_type);
    (age as f64, column as f64)
}

/// Cost of taking a building of `building_type` from `level` to `level + 1`.
///
/// The level factor is `1.5^(level - 1)`, so the initial construction at level 0 costs
/// two thirds of the first upgrade.
pub fn building_cost(
    content: &Content,
    ctx: &SimContext,
    building_type: &str,
    level: u32,
) -> ResourceMap {
    let Some(recipe) = ctx.current.recipe(building_type) else {
        return ResourceMap::new();
    };
    let base = if recipe.construction.is_empty() {
        &recipe.input
    } else {
        &recipe.construction
    };
    let multiplier = if content.is_world_wonder(building_type) {
        let (age, column) = wonder_indices(content, building_type);
        (WONDER_BASE_COST_MULTIPLIER + 5f64.powf(age) * LEVEL_COST_GROWTH.powf(column)).round()
    } else {
        BASE_COST_MULTIPLIER
    };
    base.scaled(LEVEL_COST_GROWTH.powi(level as i32 - 1) * multiplier)
}

/// Summed cost of every level in `from..to`.
pub fn building_upgrade_cost(
    content: &Content,
    ctx: &SimContext,
    building_type: &str,
    from: u32,
    to: u32,
) -> ResourceMap {
    let mut total = ResourceMap::new();
    for level in from..to {
        total.add_all(&building_cost(content, ctx, building_type, level));
    }
    total
}

/// Everything spent to bring a building from nothing to `level`.
pub fn total_building_cost(
    content: &Content,
    ctx: &SimContext,
    building_type: &str,
    level: u32,
) -> ResourceMap {
    building_upgrade_cost(content, ctx, building_type, 0, level)
}

/// Priced value of `resources`; unpriceable entries are worth nothing.
pub fn resources_value(content: &Content, resources: &ResourceMap) -> f64 {
    resources
        .iter()
        .filter(|(res, _)| content.can_price(res.as_str()))
        .map(|(res, amount)| content.resource_price(res.as_str()) * amount)
        .sum()
}

pub fn building_value(content: &Content, ctx: &SimContext, building_type: &str, level: u32) -> f64 {
    resources_value(
        content,
        &total_building_cost(content, ctx, building_type, level),
    )
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuilderCapacity {
    pub multiplier: f64,
    pub base: f64,
    pub total: f64,
}

/// Construction material a building may request per tick.
pub fn builder_capacity(
    content: &Content,
    state: &GameState,
    ctx: &SimContext,
    hex: Hex,
) -> BuilderCapacity {
    let Some(building) = state.building(hex) else {
        return BuilderCapacity {
            multiplier: 0.0,
            base: 0.0,
            total: 0.0,
        };
    };
    let multiplier = ctx
        .current
        .global_multipliers
        .sum(GlobalMultiplierKind::BuilderCapacity)
        + total_multiplier_for(state, ctx, hex, MultiplierKind::Worker, 0.0);
    let building_type = building.building_type.as_str();
    let base = if content.is_world_wonder(building_type) {
        let (age, column) = wonder_indices(content, building_type);
        (5f64.powf(age) + column * 2.0).round()
    } else {
        building.level.max(1) as f64
    };
    BuilderCapacity {
        multiplier,
        base,
        total: multiplier * base,
    }
}
