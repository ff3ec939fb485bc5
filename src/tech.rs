//! Technology research and great-people selection.

use thiserror::Error;
use tracing::info;

use crate::{
    content::{AgeId, Content, GreatPersonId, ResourceId, TechId},
    hex::Hex,
    hooks::SimulationHooks,
    rng::{self, Stream},
    world::GameState,
};

pub const GREAT_PEOPLE_CHOICE_COUNT: usize = 3;
const TECH_BASE_COST: f64 = 5000.0;

#[derive(Debug, Error, PartialEq)]
pub enum TechError {
    #[error("unknown technology '{0}'")]
    Unknown(String),
    #[error("technology {0} is already unlocked")]
    AlreadyUnlocked(TechId),
    #[error("technology {tech} requires {missing}")]
    MissingPrerequisite { tech: TechId, missing: TechId },
    #[error("technology {tech} costs {required} science, only {available} available")]
    NotEnoughScience {
        tech: TechId,
        required: f64,
        available: f64,
    },
    #[error("city has no headquarter to pay science from")]
    NoHeadquarter,
    #[error("no pending great people choice at index {0}")]
    NoSuchChoice(usize),
    #[error("great person {0} is not offered by this choice")]
    NotOffered(GreatPersonId),
}

/// Science cost: `5^age × 1.5^column × 5000`.
pub fn unlock_cost(content: &Content, tech: &str) -> f64 {
    let age = content
        .age_for_tech(tech)
        .map(|(_, a)| a.idx)
        .unwrap_or(0);
    5f64.powi(age as i32) * 1.5f64.powi(content.tech_column(tech) as i32) * TECH_BASE_COST
}

/// Highest-column unlocked technology; ties go to the last id in table order.
pub fn most_advanced_tech<'a>(content: &'a Content, state: &GameState) -> Option<&'a TechId> {
    let mut best: Option<(&TechId, u32)> = None;
    for (id, def) in &content.techs {
        if !state.unlocked_tech.contains(id) {
            continue;
        }
        if best.map(|(_, column)| def.column >= column).unwrap_or(true) {
            best = Some((id, def.column));
        }
    }
    best.map(|(id, _)| id)
}

pub fn current_age<'a>(content: &'a Content, state: &GameState) -> Option<&'a AgeId> {
    let tech = most_advanced_tech(content, state)?;
    content.age_for_tech(tech.as_str()).map(|(id, _)| id)
}

/// Techs not yet unlocked whose prerequisites all are.
pub fn unlockable_techs<'a>(content: &'a Content, state: &GameState) -> Vec<&'a TechId> {
    content
        .techs
        .iter()
        .filter(|(id, def)| {
            !state.unlocked_tech.contains(*id)
                && def.require_tech.iter().all(|r| state.unlocked_tech.contains(r))
        })
        .map(|(id, _)| id)
        .collect()
}

/// Researches `tech`, paying science from the headquarter unless `force` is set.
pub fn unlock_tech(
    content: &Content,
    state: &mut GameState,
    hooks: &mut dyn SimulationHooks,
    tech: &str,
    force: bool,
) -> Result<(), TechError> {
    let (id, def) = content
        .techs
        .get_key_value(tech)
        .ok_or_else(|| TechError::Unknown(tech.to_string()))?;
    if state.unlocked_tech.contains(id) {
        return Err(TechError::AlreadyUnlocked(id.clone()));
    }
    if let Some(missing) = def
        .require_tech
        .iter()
        .find(|r| !state.unlocked_tech.contains(*r))
    {
        return Err(TechError::MissingPrerequisite {
            tech: id.clone(),
            missing: missing.clone(),
        });
    }
    if !force {
        let hq = state.headquarter(content).ok_or(TechError::NoHeadquarter)?;
        let required = unlock_cost(content, tech);
        let building = state.building_mut(hq).ok_or(TechError::NoHeadquarter)?;
        let available = building.resources.get_or_zero(ResourceId::SCIENCE);
        if available < required {
            return Err(TechError::NotEnoughScience {
                tech: id.clone(),
                required,
                available,
            });
        }
        building.resources.deduct(&ResourceId::science(), required);
    }

    let age_before = current_age(content, state).cloned();
    state.unlocked_tech.insert(id.clone());
    for deposit in &def.reveal_deposit {
        reveal_deposit(content, state, id, deposit);
    }
    state.features.extend(def.unlock_feature.iter().copied());
    let age_after = current_age(content, state).cloned();
    if let Some(age) = age_after {
        if age_before.as_ref() != Some(&age) {
            let choice = great_people_choices(content, state, &age);
            if !choice.is_empty() {
                state.great_people_choices.push_back(choice);
            }
        }
    }
    info!(tech = %id, forced = force, "technology unlocked");
    hooks.on_technology_unlocked(id, state);
    Ok(())
}

/// Places `deposit` on `round(size² × fraction)` seeded tiles, keeping one on explored ground.
fn reveal_deposit(content: &Content, state: &mut GameState, tech: &TechId, deposit: &ResourceId) {
    let Some(city) = content.cities.get(&state.city) else {
        return;
    };
    let fraction = city.deposits.get(deposit).copied().unwrap_or(0.0);
    let count = ((city.size * city.size) as f64 * fraction).round() as usize;
    if count == 0 {
        return;
    }
    let mut rng = rng::keyed_rng(state.seed, Stream::Deposits, &format!("{tech},{deposit}"));
    let all: Vec<Hex> = state.tiles.keys().copied().collect();
    let mut picks: Vec<Hex> = rng::shuffled(&all, &mut rng).into_iter().take(count).collect();
    let none_explored = picks
        .iter()
        .all(|h| state.tile(*h).map(|t| !t.explored).unwrap_or(true));
    if none_explored {
        let explored_empty: Vec<Hex> = state
            .tiles
            .iter()
            .filter(|(_, t)| t.explored && t.building.is_none() && t.deposit.is_empty())
            .map(|(h, _)| *h)
            .collect();
        if let Some(first) = rng::shuffled(&explored_empty, &mut rng).first() {
            picks[0] = *first;
        }
    }
    for hex in picks {
        if let Some(tile) = state.tile_mut(hex) {
            tile.deposit.insert(deposit.clone());
        }
    }
}

/// Three seeded picks from the great people of `age`.
pub fn great_people_choices(content: &Content, state: &GameState, age: &AgeId) -> Vec<GreatPersonId> {
    let pool: Vec<GreatPersonId> = content
        .great_people
        .iter()
        .filter(|(_, def)| &def.age == age)
        .map(|(id, _)| id.clone())
        .collect();
    let key = format!("{age},{}", state.great_people_choices.len());
    let mut rng = rng::keyed_rng(state.seed, Stream::GreatPeople, &key);
    rng::shuffled(&pool, &mut rng)
        .into_iter()
        .take(GREAT_PEOPLE_CHOICE_COUNT)
        .collect()
}

/// Takes `person` from the pending choice at `choice_index` and raises their level by one.
pub fn choose_great_person(
    state: &mut GameState,
    choice_index: usize,
    person: &str,
) -> Result<u32, TechError> {
    let choice = state
        .great_people_choices
        .get(choice_index)
        .ok_or(TechError::NoSuchChoice(choice_index))?;
    let Some(picked) = choice.iter().find(|p| p.as_str() == person).cloned() else {
        return Err(TechError::NotOffered(GreatPersonId::new(person)));
    };
    state.great_people_choices.remove(choice_index);
    let level = state.great_people.entry(picked.clone()).or_insert(0);
    *level += 1;
    info!(person = %picked, level = *level, "great person acquired");
    Ok(*level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        content::{load_content, ContentSource},
        hooks::{HookEvent, NoopHooks, RecordingHooks},
        world::Building,
    };
    use chrono::{TimeZone, Utc};

    fn setup() -> (Content, GameState) {
        let content = load_content(ContentSource::Embedded).unwrap();
        let start = Utc.timestamp_opt(0, 0).unwrap();
        let mut state = GameState::new(&content, "Rome", 11, start).unwrap();
        let hq = Hex::from_offset(10, 10);
        state.tile_mut(hq).unwrap().building = Some(Building::completed(
            content.headquarter().clone(),
            content.category(content.headquarter().as_str()),
            1,
        ));
        state.explore(hq, 3);
        (content, state)
    }

    #[test]
    fn cost_scales_with_age_and_column() {
        let content = load_content(ContentSource::Embedded).unwrap();
        assert_eq!(unlock_cost(&content, "Fire"), 5000.0);
        assert_eq!(unlock_cost(&content, "Farming"), 7500.0);
        assert_eq!(unlock_cost(&content, "Milling"), 5.0 * 2.25 * 5000.0);
    }

    #[test]
    fn unlock_requires_prerequisites_and_science() {
        let (content, mut state) = setup();
        let err = unlock_tech(&content, &mut state, &mut NoopHooks, "Farming", false).unwrap_err();
        assert!(matches!(err, TechError::MissingPrerequisite { .. }), "{err}");
        let err = unlock_tech(&content, &mut state, &mut NoopHooks, "Fire", false).unwrap_err();
        assert!(matches!(err, TechError::NotEnoughScience { .. }), "{err}");

        let hq = state.headquarter(&content).unwrap();
        state
            .building_mut(hq)
            .unwrap()
            .resources
            .add(&ResourceId::science(), 6000.0);
        let mut hooks = RecordingHooks::new();
        unlock_tech(&content, &mut state, &mut hooks, "Fire", false).unwrap();
        assert!(state.is_tech_unlocked("Fire"));
        let left = state.building(hq).unwrap().resources.get_or_zero(ResourceId::SCIENCE);
        assert_eq!(left, 1000.0);
        assert!(matches!(hooks.events()[0], HookEvent::TechnologyUnlocked { .. }));
        let err = unlock_tech(&content, &mut state, &mut NoopHooks, "Fire", true).unwrap_err();
        assert_eq!(err, TechError::AlreadyUnlocked(TechId::new("Fire")));
    }

    #[test]
    fn revealed_deposit_lands_on_explored_ground() {
        let (content, mut state) = setup();
        unlock_tech(&content, &mut state, &mut NoopHooks, "Masonry", true).unwrap();
        let stone: Vec<_> = state
            .tiles
            .values()
            .filter(|t| t.deposit.contains("Stone"))
            .collect();
        assert_eq!(stone.len(), 8);
        assert!(stone.iter().any(|t| t.explored));
    }

    #[test]
    fn new_age_queues_a_great_people_choice() {
        let (content, mut state) = setup();
        for tech in ["Fire", "Masonry", "Farming"] {
            unlock_tech(&content, &mut state, &mut NoopHooks, tech, true).unwrap();
        }
        // Stone age choice has an empty pool.
        assert!(state.great_people_choices.is_empty());
        unlock_tech(&content, &mut state, &mut NoopHooks, "Milling", true).unwrap();
        assert_eq!(state.great_people_choices.len(), 1);
        let choice = state.great_people_choices[0].clone();
        assert_eq!(choice.len(), GREAT_PEOPLE_CHOICE_COUNT);
        let level = choose_great_person(&mut state, 0, choice[1].as_str()).unwrap();
        assert_eq!(level, 1);
        assert!(state.great_people_choices.is_empty());
        assert_eq!(
            choose_great_person(&mut state, 0, "Homer").unwrap_err(),
            TechError::NoSuchChoice(0)
        );
    }
}
