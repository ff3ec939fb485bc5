use anyhow::Result;

use crate::{
    content::ResourceId,
    economy,
    engine::{System, SystemContext},
    hooks::SimulationHooks,
    tick::SimContext,
    world::GameState,
};

/// Credits science earned by idle and busy workers to the headquarter.
pub struct ScienceSystem;

impl ScienceSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ScienceSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for ScienceSystem {
    fn name(&self) -> &str {
        "science"
    }

    fn run(
        &mut self,
        ctx: &SystemContext<'_>,
        state: &mut GameState,
        sim: &mut SimContext,
        _hooks: &mut dyn SimulationHooks,
    ) -> Result<()> {
        let science = economy::science_from_workers(sim);
        if science.total <= 0.0 {
            return Ok(());
        }
        let Some(hq) = state.headquarter(ctx.content) else {
            return Ok(());
        };
        if let Some(building) = state.building_mut(hq) {
            building
                .resources
                .add(&ResourceId::science(), science.total);
        }
        Ok(())
    }
}
