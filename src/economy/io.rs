use crate::{
    content::Content,
    economy::market_price,
    hex::Hex,
    tick::{MultiplierKind, MultiplierWithSource, SimContext},
    world::{BuildingVariant, GameState, ResourceMap},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IoKind {
    Input,
    Output,
}

impl IoKind {
    fn multiplier_kind(self) -> MultiplierKind {
        match self {
            IoKind::Input => MultiplierKind::Input,
            IoKind::Output => MultiplierKind::Output,
        }
    }
}

/// Which scalings [`building_io`] applies on top of `recipe × level`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IoFlags {
    pub capacity: bool,
    pub multiplier: bool,
}

impl IoFlags {
    pub const NONE: IoFlags = IoFlags {
        capacity: false,
        multiplier: false,
    };
    pub const CAPACITY: IoFlags = IoFlags {
        capacity: true,
        multiplier: false,
    };
    pub const MULTIPLIER: IoFlags = IoFlags {
        capacity: false,
        multiplier: true,
    };
    pub const ALL: IoFlags = IoFlags {
        capacity: true,
        multiplier: true,
    };
}

/// Multipliers that apply to `hex`: tile contributions first, then building-type ones.
pub fn multipliers_for<'a>(
    state: &GameState,
    ctx: &'a SimContext,
    hex: Hex,
) -> Vec<&'a MultiplierWithSource> {
    let mut result: Vec<&MultiplierWithSource> = Vec::new();
    if let Some(list) = ctx.current.tile_multipliers.get(&hex) {
        result.extend(list.iter());
    }
    if let Some(building) = state.building(hex) {
        if let Some(list) = ctx.current.building_multipliers.get(&building.building_type) {
            result.extend(list.iter());
        }
    }
    result
}

/// `base + Σ` of every matching contribution.
pub fn total_multiplier_for(
    state: &GameState,
    ctx: &SimContext,
    hex: Hex,
    kind: MultiplierKind,
    base: f64,
) -> f64 {
    multipliers_for(state, ctx, hex)
        .into_iter()
        .fold(base, |acc, m| acc + m.multiplier.get(kind))
}

/// Effective recipe of the building on `hex`.
///
/// Order is base recipe (with modifiers) → level → capacity → multipliers. Resource-import
/// inputs are the per-cycle schedule and ignore every scaling.
pub fn building_io(
    content: &Content,
    state: &GameState,
    ctx: &SimContext,
    hex: Hex,
    kind: IoKind,
    flags: IoFlags,
) -> ResourceMap {
    let level = state.building(hex).map(|b| b.level).unwrap_or(0);
    ctx.cache.building_io((hex, level, kind, flags), || {
        compute_io(content, state, ctx, hex, kind, flags)
    })
}

fn compute_io(
    content: &Content,
    state: &GameState,
    ctx: &SimContext,
    hex: Hex,
    kind: IoKind,
    flags: IoFlags,
) -> ResourceMap {
    let Some(building) = state.building(hex) else {
        return ResourceMap::new();
    };
    let mut base = match ctx.current.recipe(building.building_type.as_str()) {
        Some(recipe) => match kind {
            IoKind::Input => recipe.input.clone(),
            IoKind::Output => recipe.output.clone(),
        },
        None => ResourceMap::new(),
    };
    match &building.variant {
        BuildingVariant::Market(market) => {
            for res in &market.sell_resources {
                match kind {
                    IoKind::Input => base.set(res.clone(), 1.0),
                    IoKind::Output => {
                        if let Some(buy) = market.available_resources.get(res) {
                            let rate = market_price(content, state, hex, res.as_str())
                                / market_price(content, state, hex, buy.as_str());
                            base.set(buy.clone(), rate);
                        }
                    }
                }
            }
        }
        BuildingVariant::Caravansary(_) | BuildingVariant::Warehouse(_)
            if kind == IoKind::Input =>
        {
            return building
                .resource_imports()
                .map(|ri| {
                    ri.imports
                        .iter()
                        .map(|(res, import)| (res.clone(), import.per_cycle))
                        .collect()
                })
                .unwrap_or_default();
        }
        _ => {}
    }

    let multiplier = if flags.multiplier {
        total_multiplier_for(state, ctx, hex, kind.multiplier_kind(), 1.0)
    } else {
        1.0
    };
    base.iter()
        .map(|(res, amount)| {
            let mut value = amount * building.level as f64;
            if flags.capacity {
                value *= building.capacity();
            }
            (res.clone(), value * multiplier)
        })
        .collect()
}

pub fn filter_storable(content: &Content, map: &ResourceMap) -> ResourceMap {
    map.filter(|res| content.can_store(res.as_str()))
}

pub fn filter_non_storable(content: &Content, map: &ResourceMap) -> ResourceMap {
    map.filter(|res| !content.can_store(res.as_str()))
}

/// Storage a set of resources occupies; non-storable entries take none.
pub fn storage_required(content: &Content, map: &ResourceMap) -> f64 {
    map.iter()
        .filter(|(res, _)| content.can_store(res.as_str()))
        .map(|(_, v)| v)
        .sum()
}
