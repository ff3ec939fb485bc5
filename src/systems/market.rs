use std::collections::BTreeMap;

use anyhow::Result;
use tracing::debug;

use crate::{
    content::ResourceId,
    engine::{System, SystemContext},
    hex::Hex,
    hooks::SimulationHooks,
    rng::{self, Stream},
    tick::SimContext,
    world::GameState,
};

/// Re-rolls market trade pairs when the hour bucket changes.
pub struct MarketSystem;

impl MarketSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MarketSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for MarketSystem {
    fn name(&self) -> &str {
        "market"
    }

    fn run(
        &mut self,
        ctx: &SystemContext<'_>,
        state: &mut GameState,
        sim: &mut SimContext,
        _hooks: &mut dyn SimulationHooks,
    ) -> Result<()> {
        let content = ctx.content;
        let price_id = state.price_id();
        let force = state.last_price_updated != Some(price_id);
        if force {
            state.last_price_updated = Some(price_id);
        }
        let tradable: Vec<ResourceId> = sim
            .cache
            .unlocked_resources(content, state)
            .into_iter()
            .filter(|res| content.can_price(res.as_str()) && content.can_store(res.as_str()))
            .collect();
        let markets: Vec<Hex> = state
            .buildings()
            .filter(|(_, b)| b.market().is_some())
            .map(|(hex, _)| hex)
            .collect();
        let seed = state.seed;
        for hex in markets {
            let Some(market) = state.building_mut(hex).and_then(|b| b.market_mut()) else {
                continue;
            };
            if market.available_resources.is_empty() || force {
                market.available_resources = trade_pairs(seed, price_id, hex, &tradable);
                debug!(%hex, price_id, pairs = market.available_resources.len(), "market pairs rolled");
            }
            if force && market.clear_after_update {
                market.sell_resources.clear();
            }
        }
        Ok(())
    }
}

/// Pairs every tradable resource with a different one, seeded by `(hour bucket, tile)`.
/// Sellers share a partner until one would be paired with itself.
pub fn trade_pairs(
    seed: u64,
    price_id: i64,
    hex: Hex,
    tradable: &[ResourceId],
) -> BTreeMap<ResourceId, ResourceId> {
    let mut pairs = BTreeMap::new();
    if tradable.len() < 2 {
        return pairs;
    }
    let mut rng = rng::keyed_rng(seed, Stream::MarketPairs, &format!("{price_id},{hex}"));
    let sell = rng::shuffled(tradable, &mut rng);
    let buy = rng::shuffled(tradable, &mut rng);
    let mut idx = 0;
    for res in sell {
        while buy[idx % buy.len()] == res {
            idx += 1;
        }
        pairs.insert(res, buy[idx % buy.len()].clone());
    }
    pairs
}
