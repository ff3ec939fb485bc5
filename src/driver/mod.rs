//! Wall-clock driver: one tick per interval while `should_tick` allows it.

use std::{future::Future, time::Duration};

use anyhow::Result;
use tokio::{
    sync::watch,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info};

use crate::{
    config::RealtimeConfig,
    content::{Content, ResourceId},
    engine::{Engine, TickSummary},
    world::GameState,
};

#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeOptions {
    pub tick_millis: u64,
    pub warp_speed: u32,
    /// Stop after this many simulated ticks.
    pub max_ticks: Option<u64>,
}

impl RealtimeOptions {
    pub fn from_config(config: &RealtimeConfig, max_ticks: Option<u64>) -> Self {
        Self {
            tick_millis: config.tick_millis.max(1),
            warp_speed: config.warp_speed.max(1),
            max_ticks,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RealtimeReport {
    pub intervals: u64,
    pub ticks_run: u64,
    pub skipped: u64,
    pub warped: u64,
}

/// Runs the engine against the wall clock until `shutdown` resolves or `max_ticks` is reached.
/// Every finished tick is published on `summaries`.
pub async fn run_realtime<P, S>(
    engine: &mut Engine,
    state: &mut GameState,
    options: &RealtimeOptions,
    mut should_tick: P,
    summaries: &watch::Sender<Option<TickSummary>>,
    shutdown: S,
) -> Result<RealtimeReport>
where
    P: FnMut() -> bool,
    S: Future<Output = ()>,
{
    let mut interval = time::interval(Duration::from_millis(options.tick_millis.max(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);
    let mut report = RealtimeReport::default();
    loop {
        if options.max_ticks.is_some_and(|max| report.ticks_run >= max) {
            break;
        }
        tokio::select! {
            _ = &mut shutdown => {
                info!(ticks = report.ticks_run, "real-time driver shutting down");
                break;
            }
            _ = interval.tick() => {
                report.intervals += 1;
                if !should_tick() {
                    report.skipped += 1;
                    continue;
                }
                let mut ticks = warp_ticks(engine.content(), state, options.warp_speed);
                if let Some(max) = options.max_ticks {
                    ticks = ticks.min(max - report.ticks_run);
                }
                if ticks > 1 {
                    report.warped += ticks - 1;
                }
                for _ in 0..ticks {
                    let summary = engine.tick(state)?;
                    report.ticks_run += 1;
                    summaries.send_replace(Some(summary));
                }
            }
        }
    }
    Ok(report)
}

/// Ticks to run for one interval. With Petra's time warp on and enough `Warp` banked on the
/// headquarter, `speed` ticks run and `speed - 1` Warp is consumed.
pub fn warp_ticks(content: &Content, state: &mut GameState, speed: u32) -> u64 {
    if speed <= 1 {
        return 1;
    }
    let warp_on = state
        .buildings()
        .any(|(_, b)| b.petra().map(|p| p.time_warp).unwrap_or(false));
    if !warp_on {
        return 1;
    }
    let Some(hq) = state.headquarter(content) else {
        return 1;
    };
    let Some(building) = state.building_mut(hq) else {
        return 1;
    };
    let cost = (speed - 1) as f64;
    if building.resources.get_or_zero(ResourceId::WARP) < cost {
        return 1;
    }
    building.resources.deduct(&ResourceId::warp(), cost);
    debug!(speed, "time warp tick");
    speed as u64
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        content::{load_content, ContentSource},
        engine::{EngineBuilder, EngineSettings},
        hex::Hex,
        world::{Building, BuildingVariant},
    };
    use chrono::{TimeZone, Utc};

    fn city() -> (Arc<Content>, GameState, Hex) {
        let content = Arc::new(load_content(ContentSource::Embedded).unwrap());
        let start = Utc.timestamp_opt(0, 0).unwrap();
        let mut state = GameState::new(&content, "Rome", 4, start).unwrap();
        let hq = Hex::from_offset(10, 10);
        state.tile_mut(hq).unwrap().building = Some(Building::completed(
            content.headquarter().clone(),
            content.category(content.headquarter().as_str()),
            1,
        ));
        (content, state, hq)
    }

    #[test]
    fn warp_needs_petra_and_banked_warp() {
        let (content, mut state, hq) = city();
        assert_eq!(warp_ticks(&content, &mut state, 3), 1);

        let petra_hex = Hex::from_offset(12, 12);
        let mut petra = Building::completed("Petra".into(), content.category("Petra"), 1);
        if let BuildingVariant::Petra(data) = &mut petra.variant {
            data.time_warp = true;
        }
        state.tile_mut(petra_hex).unwrap().building = Some(petra);
        assert_eq!(warp_ticks(&content, &mut state, 3), 1);

        state
            .building_mut(hq)
            .unwrap()
            .resources
            .add(&ResourceId::warp(), 5.0);
        assert_eq!(warp_ticks(&content, &mut state, 3), 3);
        let left = state.building(hq).unwrap().resources.get_or_zero(ResourceId::WARP);
        assert_eq!(left, 3.0);
    }

    #[tokio::test]
    async fn stops_at_the_tick_limit_and_publishes_summaries() {
        let (content, mut state, _) = city();
        let mut engine = EngineBuilder::new(content, EngineSettings::default())
            .with_standard_pipeline()
            .build();
        let (tx, rx) = watch::channel(None);
        let options = RealtimeOptions {
            tick_millis: 1,
            warp_speed: 1,
            max_ticks: Some(3),
        };
        let mut calls = 0;
        let report = run_realtime(
            &mut engine,
            &mut state,
            &options,
            || {
                calls += 1;
                calls % 2 == 1
            },
            &tx,
            std::future::pending(),
        )
        .await
        .unwrap();
        assert_eq!(report.ticks_run, 3);
        assert_eq!(report.skipped, 2);
        assert_eq!(state.tick, 3);
        assert_eq!(rx.borrow().as_ref().map(|s| s.tick), Some(3));
    }
}
