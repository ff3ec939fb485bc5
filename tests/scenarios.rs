use std::sync::Arc;

use cividle_core::{
    content::{load_content, Content, ContentSource, GameFeature, ResourceId, TechId},
    economy::{self, market_price},
    engine::EngineBuilder,
    hex::Hex,
    hooks::{HookEvent, NoopHooks, RecordingHooks},
    scenario::ScenarioLoader,
    systems::{tick_tile, trade_pairs, warehouse_autopilot},
    tech::{self, TechError},
    tick::{NotProducingReason, SimContext},
    world::{Building, BuildingVariant, GameState},
    EngineSettings,
};
use chrono::{TimeZone, Utc};

const MASONRY: &str = r#"
resources:
  Worker: { can_store: false, can_price: false }
  Wood: {}
  Stone: {}
buildings:
  Headquarter: { special: HQ, output: { Worker: 10 } }
  LoggingCamp: { output: { Wood: 1 }, construction: { Wood: 1 } }
  Mason: { input: { Wood: 1 }, output: { Stone: 1 }, construction: { Wood: 1 } }
techs:
  Fire: { column: 0, unlock_building: [LoggingCamp, Mason] }
ages:
  StoneAge: { idx: 0, from: 0, to: 1 }
cities:
  Rome: { size: 6 }
"#;

fn mason_yard() -> (Content, GameState, SimContext, Hex) {
    let content = load_content(ContentSource::Str(MASONRY)).expect("test content loads");
    let start = Utc.timestamp_opt(0, 0).unwrap();
    let mut state = GameState::new(&content, "Rome", 1, start).unwrap();
    let hex = Hex::from_offset(2, 2);
    let mut mason = Building::completed("Mason".into(), content.category("Mason"), 1);
    mason.resources.add(&ResourceId::new("Wood"), 1.0);
    state.tile_mut(hex).unwrap().building = Some(mason);
    let mut sim = SimContext::new(&content);
    sim.current.workers_available.add(&ResourceId::worker(), 1.0);
    (content, state, sim, hex)
}

#[test]
fn one_tick_turns_wood_into_stone() {
    let (content, mut state, mut sim, hex) = mason_yard();
    tick_tile(&content, &mut state, &mut sim, &mut NoopHooks, hex);

    let mason = state.building(hex).unwrap();
    assert_eq!(mason.resources.get_or_zero("Wood"), 0.0);
    assert_eq!(mason.resources.get_or_zero("Stone"), 1.0);
    assert_eq!(sim.busy_workers(), 1.0);
    assert_eq!(sim.next.reason(hex), None);
}

#[test]
fn full_storage_blocks_production() {
    let (content, mut state, mut sim, hex) = mason_yard();
    let storage = economy::storage_for(&content, &state, &sim, hex);
    state
        .building_mut(hex)
        .unwrap()
        .resources
        .add(&ResourceId::new("Stone"), storage.total - storage.used);
    let before = state.building(hex).unwrap().resources.clone();

    tick_tile(&content, &mut state, &mut sim, &mut NoopHooks, hex);

    assert_eq!(state.building(hex).unwrap().resources, before);
    assert_eq!(sim.next.reason(hex), Some(NotProducingReason::StorageFull));
    assert_eq!(sim.busy_workers(), 0.0);
}

#[test]
fn missing_workers_and_inputs_are_reported() {
    let (content, mut state, _, hex) = mason_yard();
    let mut idle = SimContext::new(&content);
    tick_tile(&content, &mut state, &mut idle, &mut NoopHooks, hex);
    assert_eq!(idle.next.reason(hex), Some(NotProducingReason::NotEnoughWorkers));

    state.building_mut(hex).unwrap().resources = Default::default();
    let mut sim = SimContext::new(&content);
    sim.current.workers_available.add(&ResourceId::worker(), 1.0);
    tick_tile(&content, &mut state, &mut sim, &mut NoopHooks, hex);
    assert_eq!(sim.next.reason(hex), Some(NotProducingReason::NotEnoughResources));
}

#[test]
fn turned_off_buildings_do_nothing() {
    let (content, mut state, mut sim, hex) = mason_yard();
    state.building_mut(hex).unwrap().set_capacity(0.0);
    tick_tile(&content, &mut state, &mut sim, &mut NoopHooks, hex);
    assert_eq!(sim.next.reason(hex), Some(NotProducingReason::TurnedOff));
    assert_eq!(state.building(hex).unwrap().resources.get_or_zero("Wood"), 1.0);
}

#[test]
fn pricing_reaches_the_recipe_fixed_point() {
    let yaml = r#"
resources:
  Worker: { can_store: false, can_price: false }
  Copper: {}
  Tin: {}
  Bronze: {}
buildings:
  Headquarter: { special: HQ, output: { Worker: 10 } }
  CopperMine: { output: { Copper: 1 }, deposit: [Copper], construction: { Tin: 1 } }
  TinMine: { output: { Tin: 1 }, deposit: [Tin], construction: { Copper: 1 } }
  Foundry: { input: { Copper: 1, Tin: 1 }, output: { Bronze: 2 } }
techs:
  Mining: { column: 0, reveal_deposit: [Copper, Tin], unlock_building: [CopperMine, TinMine] }
  Alloys: { column: 1, require_tech: [Mining], unlock_building: [Foundry] }
ages:
  StoneAge: { idx: 0, from: 0, to: 1 }
cities:
  Rome: { size: 4 }
"#;
    let content = load_content(ContentSource::Str(yaml)).expect("pricing content loads");
    for raw in ["Copper", "Tin"] {
        assert_eq!(content.resource_tier(raw), 1, "{raw} tier");
        assert_eq!(content.resource_price(raw), 1.0, "{raw} price");
    }
    assert_eq!(content.resource_tier("Bronze"), 2);
    assert!((content.resource_price("Bronze") - 2.0).abs() < 1e-9);
    assert_eq!(content.building_tier("Foundry"), 2);
}

#[test]
fn bundled_ruleset_prices_every_tradable_resource() {
    let content = load_content(ContentSource::Embedded).unwrap();
    assert!(content.resource_tier("Bread") > content.resource_tier("Wheat"));
    assert!(content.resource_price("Bread") > content.resource_price("Flour") / 2.0);
    assert!(content.resource_price("Tool") > content.resource_price("Copper"));
}

/// Warehouse autopilot caps its pull at `workers × transport capacity` before the one-tile
/// bonus makes adjacent hops free, so a neighbour with plenty of stock only moves that much.
#[test]
fn autopilot_pull_is_capped_before_the_adjacency_bonus() {
    let content = load_content(ContentSource::Embedded).unwrap();
    let start = Utc.timestamp_opt(0, 0).unwrap();
    let mut state = GameState::new(&content, "Rome", 8, start).unwrap();
    state.features.insert(GameFeature::WarehouseUpgrade);
    let warehouse = Hex::from_offset(5, 5);
    let camp = Hex::from_offset(6, 5);
    let quarry = Hex::from_offset(8, 5);
    let mut placed = Building::completed("Warehouse".into(), content.category("Warehouse"), 1);
    if let BuildingVariant::Warehouse(data) = &mut placed.variant {
        data.autopilot = true;
    }
    state.tile_mut(warehouse).unwrap().building = Some(placed);
    let mut logging = Building::completed("LoggingCamp".into(), content.category("LoggingCamp"), 1);
    logging.resources.add(&ResourceId::new("Wood"), 50.0);
    state.tile_mut(camp).unwrap().building = Some(logging);
    let mut stone = Building::completed("StoneQuarry".into(), content.category("StoneQuarry"), 1);
    stone.resources.add(&ResourceId::new("Stone"), 20.0);
    state.tile_mut(quarry).unwrap().building = Some(stone);

    let mut sim = SimContext::new(&content);
    sim.current.workers_available.add(&ResourceId::worker(), 5.0);
    sim.current.set_reason(camp, NotProducingReason::StorageFull);
    sim.current.set_reason(quarry, NotProducingReason::StorageFull);

    assert!(warehouse_autopilot(&content, &mut state, &mut sim, warehouse));
    assert_eq!(state.amount_in_transit(warehouse, "Wood"), 5.0);
    assert_eq!(state.building(camp).unwrap().resources.get_or_zero("Wood"), 45.0);
    assert_eq!(state.amount_in_transit(warehouse, "Stone"), 0.0);
    assert_eq!(state.building(quarry).unwrap().resources.get_or_zero("Stone"), 20.0);
    // The adjacent hop costs no workers, yet the cap already spent the whole budget.
    assert_eq!(sim.busy_workers(), 0.0);
    assert_eq!(sim.available_workers(ResourceId::WORKER), 5.0);
}

#[test]
fn market_pairs_and_prices_repeat_for_the_same_hour() {
    let tradable: Vec<ResourceId> = ["Wood", "Stone", "Brick", "Lumber", "Water"]
        .into_iter()
        .map(ResourceId::new)
        .collect();
    let hex = Hex::from_offset(8, 10);
    let first = trade_pairs(7, 475_000, hex, &tradable);
    let again = trade_pairs(7, 475_000, hex, &tradable);
    assert_eq!(first, again);
    assert!(!first.is_empty());
    for (sell, buy) in &first {
        assert_ne!(sell, buy, "{sell} is traded for itself");
        assert!(tradable.contains(buy));
    }
    assert!(trade_pairs(7, 475_000, hex, &tradable[..1]).is_empty());

    let content = Arc::new(load_content(ContentSource::Embedded).unwrap());
    let scenario = ScenarioLoader::new(env!("CARGO_MANIFEST_DIR"))
        .load("scenarios/trade_hub.yaml")
        .expect("trade hub scenario");
    let mut cities = Vec::new();
    for _ in 0..2 {
        let mut state = scenario.build_state(&content).unwrap();
        let mut engine = EngineBuilder::new(content.clone(), EngineSettings::default())
            .with_standard_pipeline()
            .build();
        engine.run(&mut state, 5).unwrap();
        cities.push(state);
    }
    let market = Hex::from_offset(8, 10);
    let pairs: Vec<_> = cities
        .iter()
        .map(|s| s.building(market).unwrap().market().unwrap().available_resources.clone())
        .collect();
    assert!(!pairs[0].is_empty(), "market never rolled its pairs");
    assert_eq!(pairs[0], pairs[1]);
    assert_eq!(cities[0].last_price_updated, Some(cities[0].price_id()));
    for res in ["Wood", "Stone"] {
        let a = market_price(&content, &cities[0], market, res);
        let b = market_price(&content, &cities[1], market, res);
        assert_eq!(a, b);
        let reference = content.resource_price(res);
        assert!(a >= reference * 0.75 && a <= reference * 1.25, "{res} priced {a}");
    }
}

#[test]
fn research_pays_science_and_offers_great_people() {
    let content = load_content(ContentSource::Embedded).unwrap();
    let mut state = ScenarioLoader::new(env!("CARGO_MANIFEST_DIR"))
        .load("scenarios/rome_start.yaml")
        .unwrap()
        .build_state(&content)
        .unwrap();
    let hq = state.headquarter(&content).expect("headquarter placed");
    let mut hooks = RecordingHooks::new();

    let unlockable: Vec<&str> = tech::unlockable_techs(&content, &state)
        .into_iter()
        .map(|t| t.as_str())
        .collect();
    assert!(unlockable.contains(&"Milling"), "{unlockable:?}");
    assert!(!unlockable.contains(&"Writing"));

    let err = tech::unlock_tech(&content, &mut state, &mut hooks, "Banking", false).unwrap_err();
    assert!(matches!(err, TechError::MissingPrerequisite { .. }), "{err}");
    let err = tech::unlock_tech(&content, &mut state, &mut hooks, "Milling", false).unwrap_err();
    assert!(matches!(err, TechError::NotEnoughScience { .. }), "{err}");

    let cost = tech::unlock_cost(&content, "Milling");
    state
        .building_mut(hq)
        .unwrap()
        .resources
        .add(&ResourceId::science(), cost + 10.0);
    tech::unlock_tech(&content, &mut state, &mut hooks, "Milling", false).unwrap();
    let left = state.building(hq).unwrap().resources.get_or_zero(ResourceId::SCIENCE);
    assert!((left - 10.0).abs() < 1e-6, "science left {left}");
    assert!(state.is_tech_unlocked("Milling"));
    assert_eq!(
        hooks.events().last(),
        Some(&HookEvent::TechnologyUnlocked {
            tick: 0,
            tech: TechId::new("Milling"),
        })
    );
    assert_eq!(
        tech::unlock_tech(&content, &mut state, &mut hooks, "Milling", true),
        Err(TechError::AlreadyUnlocked(TechId::new("Milling")))
    );

    assert!(
        state.great_people_choices.is_empty(),
        "Milling stays in the age Carpentry already reached"
    );

    for tech_id in ["Metallurgy", "Smithing", "Writing", "Banking"] {
        tech::unlock_tech(&content, &mut state, &mut hooks, tech_id, true).unwrap();
    }
    assert!(state.has_feature(GameFeature::WarehouseUpgrade));
    let offered = state
        .great_people_choices
        .front()
        .cloned()
        .expect("entering a new age offers great people");
    assert_eq!(state.great_people_choices.len(), 1);
    assert_eq!(offered.len(), tech::GREAT_PEOPLE_CHOICE_COUNT);
    for person in &offered {
        assert_eq!(content.great_people[person].age.as_str(), "IronAge");
    }
    let pick = offered[0].clone();
    assert_eq!(tech::choose_great_person(&mut state, 0, pick.as_str()), Ok(1));
    assert!(state.great_people_choices.is_empty());
    assert_eq!(state.great_people.get(&pick), Some(&1));
}
