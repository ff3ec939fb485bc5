use std::collections::BTreeMap;

use anyhow::Result;

use crate::{
    content::BuildingType,
    engine::{System, SystemContext},
    hooks::SimulationHooks,
    tick::{MultiplierWithSource, SimContext, TickData},
    world::GameState,
};

/// Folds unlocked technologies, acquired great people and city name overrides into `next`.
pub struct EffectsSystem;

impl EffectsSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EffectsSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for EffectsSystem {
    fn name(&self) -> &str {
        "effects"
    }

    fn run(
        &mut self,
        ctx: &SystemContext<'_>,
        state: &mut GameState,
        sim: &mut SimContext,
        _hooks: &mut dyn SimulationHooks,
    ) -> Result<()> {
        let content = ctx.content;
        let next = &mut sim.next;
        for tech in &state.unlocked_tech {
            let Some(def) = content.techs.get(tech) else {
                continue;
            };
            let source = content.tech_display_name(tech.as_str());
            for (building, multiplier) in &def.building_multiplier {
                next.add_building_multiplier(
                    building,
                    MultiplierWithSource::new(*multiplier, source.clone()),
                );
            }
            for (building, modifier) in &def.building_modifier {
                if let Some(recipe) = next.recipes.get_mut(building) {
                    recipe.input.add_all(&modifier.input);
                    recipe.output.add_all(&modifier.output);
                }
            }
            for (kind, value) in &def.global_multiplier {
                next.global_multipliers.push(*kind, *value, source.clone());
            }
        }

        for (person, level) in &state.great_people {
            let Some(def) = content.great_people.get(person) else {
                continue;
            };
            let level = *level as f64;
            let source = def.name.clone().unwrap_or_else(|| person.to_string());
            for (building, multiplier) in &def.building_multiplier {
                next.add_building_multiplier(
                    building,
                    MultiplierWithSource::new(multiplier.scaled(level), source.clone()),
                );
            }
            for (kind, value) in &def.global_multiplier {
                next.global_multipliers
                    .push(*kind, value * level, source.clone());
            }
        }

        if let Some(city) = content.cities.get(&state.city) {
            apply_names(&mut sim.current, &city.building_names);
            apply_names(&mut sim.next, &city.building_names);
        }
        Ok(())
    }
}

fn apply_names(data: &mut TickData, names: &BTreeMap<BuildingType, String>) {
    for (building, name) in names {
        data.building_names.insert(building.clone(), name.clone());
    }
}
