use std::sync::Arc;

use cividle_core::{
    content::{load_content, BuildingType, Content, ContentSource, ResourceId},
    driver::{self, RealtimeOptions},
    economy::{self, IoFlags, IoKind},
    engine::{Engine, EngineBuilder, EngineSettings, System, SystemContext},
    hex::Hex,
    hooks::NoopHooks,
    scenario::ScenarioLoader,
    systems::{tick_tile, transport_resource, TransportSystem},
    tick::{Multiplier, MultiplierKind, MultiplierWithSource, NotProducingReason, SimContext},
    world::{Building, BuildingStatus, BuildingVariant, GameState},
};
use chrono::{TimeZone, Utc};
use tokio::sync::watch;

const KILNS: &str = r#"
resources:
  Worker: { can_store: false, can_price: false }
  Wood: {}
  Stone: {}
buildings:
  Headquarter: { special: HQ, output: { Worker: 10 } }
  LoggingCamp: { output: { Wood: 1 }, construction: { Wood: 1 } }
  Kiln: { input: { Wood: 1 }, output: { Stone: 2 }, construction: { Wood: 1 } }
techs:
  Fire: { column: 0, unlock_building: [LoggingCamp, Kiln] }
ages:
  StoneAge: { idx: 0, from: 0, to: 1 }
cities:
  Rome: { size: 8 }
"#;

fn content() -> Arc<Content> {
    Arc::new(load_content(ContentSource::Embedded).expect("bundled content loads"))
}

fn rome(content: &Content) -> GameState {
    ScenarioLoader::new(env!("CARGO_MANIFEST_DIR"))
        .load("scenarios/rome_start.yaml")
        .expect("scenario should load")
        .build_state(content)
        .expect("scenario builds")
}

fn engine(content: Arc<Content>, batch: u64) -> Engine {
    let settings = EngineSettings {
        catch_up_batch: batch,
        ..EngineSettings::default()
    };
    EngineBuilder::new(content, settings)
        .with_standard_pipeline()
        .build()
}

#[tokio::test]
async fn realtime_and_catch_up_reach_the_same_state() {
    let content = content();
    let ticks = 90;

    let mut offline = rome(&content);
    let report = engine(content.clone(), 25)
        .catch_up(&mut offline, ticks, |_, _| {})
        .expect("catch-up runs");
    assert_eq!(report.ticks_run, ticks);
    assert_eq!(report.warp_banked, 0.0);

    let mut direct = rome(&content);
    engine(content.clone(), 1).run(&mut direct, ticks).expect("run");

    let mut live = rome(&content);
    let mut live_engine = engine(content.clone(), 1);
    let (tx, _rx) = watch::channel(None);
    let options = RealtimeOptions {
        tick_millis: 1,
        warp_speed: 1,
        max_ticks: Some(ticks),
    };
    let realtime = driver::run_realtime(
        &mut live_engine,
        &mut live,
        &options,
        || true,
        &tx,
        std::future::pending(),
    )
    .await
    .expect("real-time run");
    assert_eq!(realtime.ticks_run, ticks);

    assert_eq!(offline, direct, "batched catch-up diverged from a plain run");
    assert_eq!(offline, live, "real-time driver diverged from catch-up");
    assert_eq!(offline.tick, ticks);
}

#[test]
fn stock_stays_non_negative_and_within_storage() {
    let content = content();
    let mut state = rome(&content);
    let mut engine = engine(content.clone(), 1);
    for _ in 0..200 {
        engine.tick(&mut state).expect("tick");
        for (hex, building) in state.buildings() {
            for (res, amount) in building.resources.iter() {
                assert!(
                    amount >= 0.0,
                    "tick {}: {} at {hex} holds {amount} {res}",
                    state.tick,
                    building.building_type
                );
            }
            if building.status != BuildingStatus::Completed
                || matches!(building.variant, BuildingVariant::Market(_))
            {
                continue;
            }
            let storage = economy::storage_for(&content, &state, engine.sim(), hex);
            assert!(
                storage.used <= storage.total + 1e-6,
                "tick {}: {} at {hex} uses {} of {}",
                state.tick,
                building.building_type,
                storage.used,
                storage.total
            );
        }
    }
}

#[test]
fn levels_only_grow_and_sites_never_return_to_construction() {
    let content = content();
    let mut state = rome(&content);
    let site = Hex::from_offset(9, 11);
    let mut engine = engine(content.clone(), 1);
    let mut last: Vec<(Hex, u32, BuildingStatus)> = state
        .buildings()
        .map(|(hex, b)| (hex, b.level, b.status))
        .collect();

    for _ in 0..120 {
        engine.tick(&mut state).expect("tick");
        for (hex, level, status) in &last {
            let now = state.building(*hex).expect("buildings are never removed");
            assert!(now.level >= *level, "{hex} dropped from level {level} to {}", now.level);
            if *status != BuildingStatus::Building {
                assert_ne!(now.status, BuildingStatus::Building, "{hex} went back to construction");
            }
        }
        last = state
            .buildings()
            .map(|(hex, b)| (hex, b.level, b.status))
            .collect();
    }

    let hut = state.building(site).expect("hut site");
    assert_eq!(hut.status, BuildingStatus::Completed);
    assert_eq!(hut.level, 1);
}

#[test]
fn upgrades_pass_through_upgrading_and_complete() {
    let content = content();
    let mut state = rome(&content);
    let camp = Hex::from_offset(11, 10);
    let mut engine = engine(content.clone(), 1);
    assert!(state.building_mut(camp).unwrap().request_upgrade(1));

    let mut seen_upgrading = false;
    for _ in 0..150 {
        engine.tick(&mut state).expect("tick");
        let building = state.building(camp).unwrap();
        seen_upgrading |= building.status == BuildingStatus::Upgrading;
        if building.level == 2 {
            break;
        }
    }
    let building = state.building(camp).unwrap();
    assert!(seen_upgrading, "upgrade never entered Upgrading");
    assert_eq!(building.level, 2);
    assert_eq!(building.status, BuildingStatus::Completed);
}

#[test]
fn transported_amounts_are_conserved() {
    let content = content();
    let start = Utc.timestamp_opt(0, 0).unwrap();
    let mut state = GameState::new(&content, "Rome", 3, start).unwrap();
    let wood = ResourceId::new("Wood");
    let source = Hex::from_offset(8, 5);
    let target = Hex::from_offset(5, 5);
    let mut camp = Building::completed("LoggingCamp".into(), content.category("LoggingCamp"), 1);
    camp.resources.add(&wood, 10.0);
    state.tile_mut(source).unwrap().building = Some(camp);
    state.place_building(&content, target, "Hut").unwrap();

    let mut sim = SimContext::new(&content);
    sim.current.workers_available.add(&ResourceId::worker(), 5.0);
    sim.current
        .resources_by_location
        .insert(wood.clone(), vec![source]);

    let requested = 8.0;
    let committed = transport_resource(&content, &mut state, &mut sim, &wood, requested, 1.0, target);
    let at_source = state.building(source).unwrap().resources.get_or_zero("Wood");
    let in_transit = state.amount_in_transit(target, "Wood");
    assert!((committed - 5.0).abs() < 1e-9, "committed {committed}");
    assert!((10.0 - at_source - committed).abs() < 1e-9);
    assert!((in_transit - committed).abs() < 1e-9);
    let unshipped = requested - committed;
    assert!((unshipped - 3.0).abs() < 1e-9, "fuel shortfall left {unshipped}");

    let ctx = SystemContext {
        content: &content,
        tick: 0,
    };
    let mut transport = TransportSystem::new();
    for _ in 0..10 {
        sim.add_workers(&ResourceId::worker(), 5.0);
        sim.swap(&content);
        transport
            .run(&ctx, &mut state, &mut sim, &mut NoopHooks)
            .unwrap();
        let delivered = state.building(target).unwrap().resources.get_or_zero("Wood");
        let left = state.building(source).unwrap().resources.get_or_zero("Wood");
        let moving = state.amount_in_transit(target, "Wood");
        assert!(
            (left + moving + delivered - 10.0).abs() < 1e-9,
            "wood appeared or vanished: {left} + {moving} + {delivered}"
        );
    }
    assert!(state.transportation.is_empty());
    let delivered = state.building(target).unwrap().resources.get_or_zero("Wood");
    assert!((delivered - committed).abs() < 1e-9);
}

#[test]
fn multipliers_add_per_matching_scope_and_kind() {
    let content = content();
    let start = Utc.timestamp_opt(0, 0).unwrap();
    let mut state = GameState::new(&content, "Rome", 4, start).unwrap();
    let boosted = Hex::from_offset(3, 3);
    let plain = Hex::from_offset(6, 6);
    for hex in [boosted, plain] {
        state.tile_mut(hex).unwrap().building = Some(Building::completed(
            "LoggingCamp".into(),
            content.category("LoggingCamp"),
            1,
        ));
    }
    let mut sim = SimContext::new(&content);
    let output = |state: &GameState, sim: &SimContext, hex| {
        economy::total_multiplier_for(state, sim, hex, MultiplierKind::Output, 1.0)
    };

    sim.current
        .add_tile_multiplier(boosted, MultiplierWithSource::new(Multiplier::default(), "nothing"));
    assert_eq!(output(&state, &sim, boosted), 1.0);

    sim.current
        .add_tile_multiplier(boosted, MultiplierWithSource::new(Multiplier::output(0.5), "tile"));
    sim.current.add_building_multiplier(
        &BuildingType::new("LoggingCamp"),
        MultiplierWithSource::new(Multiplier::output(0.25), "type"),
    );
    sim.current
        .add_building_multiplier(
            &BuildingType::new("Hut"),
            MultiplierWithSource::new(Multiplier::output(4.0), "other"),
        );

    assert_eq!(output(&state, &sim, boosted), 1.75);
    assert_eq!(output(&state, &sim, plain), 1.25);
    assert_eq!(
        economy::total_multiplier_for(&state, &sim, boosted, MultiplierKind::Input, 1.0),
        1.0
    );
    let io = economy::building_io(&content, &state, &sim, boosted, IoKind::Output, IoFlags::ALL);
    assert_eq!(io.get_or_zero("Wood"), 1.75);
}

#[test]
fn inputs_in_transit_keep_a_nearly_full_producer_within_storage() {
    let content = load_content(ContentSource::Str(KILNS)).expect("test content loads");
    let start = Utc.timestamp_opt(0, 0).unwrap();
    let mut state = GameState::new(&content, "Rome", 5, start).unwrap();
    let wood = ResourceId::new("Wood");
    let kiln = Hex::from_offset(3, 3);
    let camp = Hex::from_offset(4, 3);

    let mut building = Building::completed("Kiln".into(), content.category("Kiln"), 1);
    building.set_stockpile_capacity(10.0);
    building.resources.add(&wood, 1.0);
    state.tile_mut(kiln).unwrap().building = Some(building);
    let mut source = Building::completed("LoggingCamp".into(), content.category("LoggingCamp"), 1);
    source.resources.add(&wood, 100.0);
    state.tile_mut(camp).unwrap().building = Some(source);

    let mut sim = SimContext::new(&content);
    let storage = economy::storage_for(&content, &state, &sim, kiln);
    state
        .building_mut(kiln)
        .unwrap()
        .resources
        .add(&ResourceId::new("Stone"), storage.total - storage.used - 10.0);

    let ctx = SystemContext {
        content: &content,
        tick: 0,
    };
    let mut transport = TransportSystem::new();
    for round in 0..10 {
        sim.add_workers(&ResourceId::worker(), 20.0);
        sim.swap(&content);
        sim.current
            .resources_by_location
            .insert(wood.clone(), vec![camp]);
        transport
            .run(&ctx, &mut state, &mut sim, &mut NoopHooks)
            .unwrap();
        tick_tile(&content, &mut state, &mut sim, &mut NoopHooks, kiln);

        let storage = economy::storage_for(&content, &state, &sim, kiln);
        let in_transit = state.amount_in_transit(kiln, "Wood");
        assert!(
            storage.used + in_transit <= storage.total + 1e-9,
            "round {round}: used {} + in transit {in_transit} exceeds {}",
            storage.used,
            storage.total
        );
    }
    assert_eq!(sim.next.reason(kiln), Some(NotProducingReason::StorageFull));
    assert!(state.building(kiln).unwrap().resources.get_or_zero("Wood") > 1.0);
}

#[test]
fn upgrades_finishing_mid_tick_refresh_building_io() {
    let content = content();
    let start = Utc.timestamp_opt(0, 0).unwrap();
    let mut state = GameState::new(&content, "Rome", 4, start).unwrap();
    let camp = Hex::from_offset(3, 3);
    let mut building = Building::completed("LoggingCamp".into(), content.category("LoggingCamp"), 1);
    building.resources.add(&ResourceId::new("Wood"), 50.0);
    assert!(building.request_upgrade(1));
    state.tile_mut(camp).unwrap().building = Some(building);

    let fresh = SimContext::new(&content);
    let mut sim = SimContext::new(&content);
    let before = economy::storage_for(&content, &state, &sim, camp);
    let output = |state: &GameState, sim: &SimContext| {
        economy::building_io(&content, state, sim, camp, IoKind::Output, IoFlags::ALL)
            .get_or_zero("Wood")
    };
    assert_eq!(output(&state, &sim), 1.0);

    tick_tile(&content, &mut state, &mut sim, &mut NoopHooks, camp);
    assert_eq!(state.building(camp).unwrap().level, 2);

    let after = economy::storage_for(&content, &state, &sim, camp);
    assert_eq!(output(&state, &sim), 2.0);
    assert_eq!(after.total, 2.0 * before.total);
    assert_eq!(
        after.total,
        economy::storage_for(&content, &state, &fresh, camp).total
    );
}
