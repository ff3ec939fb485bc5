use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    content::{Content, ResourceId},
    economy,
    hooks::{NoopHooks, SimulationHooks},
    snapshot::SnapshotWriter,
    systems::{
        EffectsSystem, HappinessSystem, MarketSystem, ScienceSystem, TileSystem, TransportSystem,
    },
    tick::SimContext,
    world::{BuildingVariant, GameState},
};

/// Offline catch-up is capped at four hours.
pub const DEFAULT_MAX_OFFLINE_SECONDS: u64 = 4 * 3600;
pub const DEFAULT_CATCH_UP_BATCH: u64 = 600;
/// Warp banked on top of the base allowance per Petra level.
pub const WARP_PER_PETRA_LEVEL: f64 = 3600.0;

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub snapshot_interval_ticks: u64,
    pub snapshot_dir: PathBuf,
    pub max_offline_seconds: u64,
    pub catch_up_batch: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            snapshot_interval_ticks: 0,
            snapshot_dir: PathBuf::from("snapshots"),
            max_offline_seconds: DEFAULT_MAX_OFFLINE_SECONDS,
            catch_up_batch: DEFAULT_CATCH_UP_BATCH,
        }
    }
}

pub struct EngineBuilder {
    content: Arc<Content>,
    settings: EngineSettings,
    systems: Vec<Box<dyn System>>,
    hooks: Box<dyn SimulationHooks>,
}

impl EngineBuilder {
    pub fn new(content: Arc<Content>, settings: EngineSettings) -> Self {
        Self {
            content,
            settings,
            systems: Vec::new(),
            hooks: Box::new(NoopHooks),
        }
    }

    pub fn with_system(mut self, system: impl System + 'static) -> Self {
        self.systems.push(Box::new(system));
        self
    }

    pub fn push_system(&mut self, system: impl System + 'static) {
        self.systems.push(Box::new(system));
    }

    /// Market refresh, transports, tiles, happiness and science, in tick order.
    pub fn with_standard_pipeline(self) -> Self {
        self.with_system(EffectsSystem::new())
            .with_system(MarketSystem::new())
            .with_system(TransportSystem::new())
            .with_system(TileSystem::new())
            .with_system(HappinessSystem::new())
            .with_system(ScienceSystem::new())
    }

    pub fn with_hooks(mut self, hooks: impl SimulationHooks + 'static) -> Self {
        self.hooks = Box::new(hooks);
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            sim: SimContext::new(&self.content),
            snapshot_writer: SnapshotWriter::new(
                &self.settings.snapshot_dir,
                self.settings.snapshot_interval_ticks,
            ),
            content: self.content,
            systems: self.systems,
            hooks: self.hooks,
            settings: self.settings,
        }
    }
}

/// Frozen view of one finished tick, read from `current` after the tick ran.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickSummary {
    pub tick: u64,
    pub workers_available: f64,
    pub workers_busy: f64,
    pub happiness: f64,
    pub transports_in_flight: usize,
    pub total_value: f64,
    pub science: f64,
    pub snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CatchUpReport {
    pub offline_seconds: u64,
    pub ticks_run: u64,
    pub warp_banked: f64,
}

pub struct Engine {
    content: Arc<Content>,
    sim: SimContext,
    systems: Vec<Box<dyn System>>,
    hooks: Box<dyn SimulationHooks>,
    snapshot_writer: SnapshotWriter,
    settings: EngineSettings,
}

impl Engine {
    pub fn content(&self) -> &Content {
        &self.content
    }

    /// The tick buffers as the last tick left them.
    pub fn sim(&self) -> &SimContext {
        &self.sim
    }

    /// Advances the city by one tick.
    pub fn tick(&mut self, state: &mut GameState) -> Result<TickSummary> {
        self.sim.swap(&self.content);
        let ctx = SystemContext {
            content: &self.content,
            tick: state.tick,
        };
        for system in &mut self.systems {
            system.run(&ctx, state, &mut self.sim, self.hooks.as_mut())?;
        }
        let mut summary = self.summary(state);
        state.tick += 1;
        summary.tick = state.tick;
        summary.snapshot_path = self.snapshot_writer.maybe_write(state)?;
        Ok(summary)
    }

    pub fn run(&mut self, state: &mut GameState, ticks: u64) -> Result<()> {
        self.run_with_hook(state, ticks, |_| {})
    }

    pub fn run_with_hook<F>(&mut self, state: &mut GameState, ticks: u64, mut hook: F) -> Result<()>
    where
        F: FnMut(&TickSummary),
    {
        for _ in 0..ticks {
            let summary = self.tick(state)?;
            hook(&summary);
        }
        Ok(())
    }

    /// Rebuilds the tick buffers of a restored city by running one throwaway tick on a copy.
    pub fn prime(&mut self, state: &GameState) -> Result<()> {
        let mut scratch = state.clone();
        let mut hooks = NoopHooks;
        self.sim.swap(&self.content);
        let ctx = SystemContext {
            content: &self.content,
            tick: scratch.tick,
        };
        for system in &mut self.systems {
            system.run(&ctx, &mut scratch, &mut self.sim, &mut hooks)?;
        }
        debug!(tick = state.tick, "tick buffers primed");
        Ok(())
    }

    /// Replays `offline_seconds` of absence, scaled by Petra's offline share and capped by
    /// the configured maximum. Seconds that are not replayed become `Warp` on the headquarter.
    pub fn catch_up<F>(
        &mut self,
        state: &mut GameState,
        offline_seconds: u64,
        mut progress: F,
    ) -> Result<CatchUpReport>
    where
        F: FnMut(u64, u64),
    {
        let percent = economy::offline_production_percent(state);
        let allowed = (self.settings.max_offline_seconds as f64 * percent).floor() as u64;
        let total = offline_seconds.min(allowed);
        let batch = self.settings.catch_up_batch.max(1);
        let mut done = 0;
        while done < total {
            let step = batch.min(total - done);
            self.run(state, step)?;
            done += step;
            info!(done, total, "offline catch-up progress");
            progress(done, total);
        }
        let warp_banked = self.bank_warp(state, (offline_seconds - total) as f64);
        Ok(CatchUpReport {
            offline_seconds,
            ticks_run: total,
            warp_banked,
        })
    }

    fn bank_warp(&self, state: &mut GameState, seconds: f64) -> f64 {
        if seconds <= 0.0 {
            return 0.0;
        }
        let petra_level = state
            .buildings()
            .find(|(_, b)| matches!(b.variant, BuildingVariant::Petra(_)))
            .map(|(_, b)| b.level)
            .unwrap_or(0);
        let cap = DEFAULT_MAX_OFFLINE_SECONDS as f64 + WARP_PER_PETRA_LEVEL * petra_level as f64;
        let Some(hq) = state.headquarter(&self.content) else {
            return 0.0;
        };
        let Some(building) = state.building_mut(hq) else {
            return 0.0;
        };
        let stored = building.resources.get_or_zero(ResourceId::WARP);
        let banked = seconds.min((cap - stored).max(0.0));
        if banked > 0.0 {
            building.resources.add(&ResourceId::warp(), banked);
        }
        banked
    }

    fn summary(&self, state: &GameState) -> TickSummary {
        let current = &self.sim.current;
        let science = state
            .headquarter(&self.content)
            .and_then(|hq| state.building(hq))
            .map(|b| b.resources.get_or_zero(ResourceId::SCIENCE))
            .unwrap_or(0.0);
        TickSummary {
            tick: state.tick,
            workers_available: current.workers_available.get_or_zero(ResourceId::WORKER),
            workers_busy: self.sim.busy_workers(),
            happiness: current.happiness.as_ref().map(|h| h.value).unwrap_or(0.0),
            transports_in_flight: state.transports_in_flight(),
            total_value: current.total_value,
            science,
            snapshot_path: None,
        }
    }
}

pub struct SystemContext<'a> {
    pub content: &'a Content,
    pub tick: u64,
}

/// One phase of the tick. Game-state conditions never produce errors; `Err` is reserved for
/// infrastructure failures.
pub trait System: Send {
    fn name(&self) -> &str;
    fn run(
        &mut self,
        ctx: &SystemContext<'_>,
        state: &mut GameState,
        sim: &mut SimContext,
        hooks: &mut dyn SimulationHooks,
    ) -> Result<()>;
}
