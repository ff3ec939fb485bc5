//! Tier and price resolution over the recipe graph.
//!
//! Raw deposits and zero-input recipes seed tier 1. Every recipe whose inputs are all priced
//! then assigns its outputs `max(input tier) + 1` and `2 × Σ(input price × amount) / Σ output`,
//! repeating until every building has a tier.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use crate::{
    content::{BuildingType, Content, ContentError, ResourceId},
    world::ResourceMap,
};

#[derive(Debug, Clone, Default, Serialize)]
pub struct PricingTable {
    pub resource_tier: BTreeMap<ResourceId, u32>,
    pub resource_price: BTreeMap<ResourceId, f64>,
    pub building_tier: BTreeMap<BuildingType, u32>,
}

struct Recipe<'a> {
    building: &'a BuildingType,
    input: ResourceMap,
    output: ResourceMap,
}

pub fn resolve(content: &Content) -> Result<PricingTable, ContentError> {
    let mut table = PricingTable::default();

    let mut deposits: BTreeSet<&ResourceId> = BTreeSet::new();
    for def in content.buildings.values() {
        deposits.extend(def.deposit.iter());
    }
    for def in content.techs.values() {
        deposits.extend(def.reveal_deposit.iter());
    }
    for deposit in deposits {
        let tech = content
            .deposit_unlock_tech(deposit.as_str())
            .ok_or_else(|| ContentError::DepositNotRevealed(deposit.clone()))?;
        table.resource_tier.insert(deposit.clone(), 1);
        table
            .resource_price
            .insert(deposit.clone(), 1.0 + content.tech_column(tech.as_str()) as f64);
    }

    let mut recipes: Vec<Recipe<'_>> = Vec::new();
    for (building, def) in &content.buildings {
        if def.input.is_empty() {
            let seed_price = content
                .building_unlock_tech(building.as_str())
                .map(|tech| 1.0 + content.tech_column(tech.as_str()) as f64)
                .unwrap_or(1.0);
            for res in def.output.keys() {
                table.resource_tier.entry(res.clone()).or_insert(1);
                table.resource_price.entry(res.clone()).or_insert(seed_price);
            }
            table.building_tier.entry(building.clone()).or_insert(1);
        }
        if !def.input.is_empty() || !def.output.is_empty() {
            recipes.push(Recipe {
                building,
                input: def.input.clone(),
                output: def.output.clone(),
            });
        }
    }
    for tech in content.techs.values() {
        for (building, modifier) in &tech.building_modifier {
            let Some((building, def)) = content.buildings.get_key_value(building) else {
                continue;
            };
            let mut input = def.input.clone();
            input.add_all(&modifier.input);
            let mut output = def.output.clone();
            output.add_all(&modifier.output);
            recipes.push(Recipe {
                building,
                input,
                output,
            });
        }
    }

    // Resource -> the input resource that decided its tier. A change to the latter re-opens it.
    let mut tier_dependency: BTreeMap<ResourceId, ResourceId> = BTreeMap::new();
    let max_rounds = content.buildings.len() * 4 + 8;
    let mut rounds = 0;
    while table.building_tier.len() < content.buildings.len() {
        rounds += 1;
        if rounds > max_rounds {
            let unresolved: Vec<&str> = content
                .buildings
                .keys()
                .filter(|b| !table.building_tier.contains_key(*b))
                .map(|b| b.as_str())
                .collect();
            return Err(ContentError::PricingDiverged(unresolved.join(",")));
        }
        for recipe in &recipes {
            apply_recipe(recipe, &mut table, &mut tier_dependency);
        }
    }
    debug!(rounds, "pricing resolved");

    for (res, def) in &content.resources {
        if def.can_price {
            let priced = table.resource_price.get(res).copied().unwrap_or(0.0) > 0.0;
            if !priced || !table.resource_tier.contains_key(res) {
                return Err(ContentError::Unpriced(res.clone()));
            }
        } else {
            table.resource_price.insert(res.clone(), 1.0);
            table.resource_tier.insert(res.clone(), 1);
        }
    }
    Ok(table)
}

fn apply_recipe(
    recipe: &Recipe<'_>,
    table: &mut PricingTable,
    tier_dependency: &mut BTreeMap<ResourceId, ResourceId>,
) {
    let mut max_input_tier = 0;
    let mut max_input: Option<&ResourceId> = None;
    let mut input_value = 0.0;
    for (res, amount) in recipe.input.iter() {
        let tier = table.resource_tier.get(res).copied();
        let price = table.resource_price.get(res).copied();
        match (tier, price) {
            (Some(tier), Some(price)) if tier > 0 && price > 0.0 => {
                if tier > max_input_tier {
                    max_input_tier = tier;
                    max_input = Some(res);
                }
                input_value += price * amount;
            }
            _ => return,
        }
    }

    let target_tier = max_input_tier + 1;
    let mut output_amount = 0.0;
    for (res, amount) in recipe.output.iter() {
        let lowers = table
            .resource_tier
            .get(res)
            .map_or(true, |tier| target_tier < *tier);
        if lowers {
            table.resource_tier.insert(res.clone(), target_tier);
            if let Some(input) = max_input {
                tier_dependency.insert(res.clone(), input.clone());
            }
            let dependants: Vec<ResourceId> = tier_dependency
                .iter()
                .filter(|(_, decided_by)| *decided_by == res)
                .map(|(k, _)| k.clone())
                .collect();
            for dependant in dependants {
                debug!(resource = %dependant, changed = %res, "tier re-opened after input tier changed");
                tier_dependency.remove(&dependant);
                table.resource_tier.remove(&dependant);
            }
        }
        output_amount += amount;
    }

    let building_tier = table
        .building_tier
        .entry(recipe.building.clone())
        .or_insert(target_tier);
    if target_tier > *building_tier {
        *building_tier = target_tier;
    }

    if output_amount <= 0.0 {
        return;
    }
    let price = 2.0 * input_value / output_amount;
    for res in recipe.output.keys() {
        let entry = table.resource_price.entry(res.clone()).or_insert(price);
        if price > *entry {
            *entry = price;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::content::{load_content, ContentSource};

    const TWO_INPUTS: &str = r#"
resources:
  Worker: { can_store: false, can_price: false }
  Clay: {}
  Sand: {}
  Glass: {}
buildings:
  Headquarter: { output: { Worker: 10 }, special: HQ }
  ClayPit: { output: { Clay: 1 }, deposit: [Clay], construction: { Sand: 1 } }
  SandPit: { output: { Sand: 1 }, deposit: [Sand], construction: { Clay: 1 } }
  Kiln: { input: { Clay: 1, Sand: 1 }, output: { Glass: 2 } }
techs:
  Digging: { column: 0, reveal_deposit: [Clay, Sand], unlock_building: [ClayPit, SandPit] }
  Firing: { column: 1, require_tech: [Digging], unlock_building: [Kiln] }
ages:
  StoneAge: { idx: 0, from: 0, to: 1 }
cities:
  Rome: { size: 4 }
"#;

    #[test]
    fn two_tier_one_inputs_resolve_to_tier_two_price_two() {
        let content = load_content(ContentSource::Str(TWO_INPUTS)).unwrap();
        assert_eq!(content.resource_tier("Clay"), 1);
        assert_eq!(content.resource_price("Clay"), 1.0);
        assert_eq!(content.resource_tier("Sand"), 1);
        assert_eq!(content.resource_tier("Glass"), 2);
        assert!((content.resource_price("Glass") - 2.0).abs() < 1e-9);
        assert_eq!(content.building_tier("Kiln"), 2);
        assert_eq!(content.building_tier("ClayPit"), 1);
    }

    #[test]
    fn unpriced_resource_aborts_loading() {
        let yaml = TWO_INPUTS.replace("  Glass: {}\n", "  Glass: {}\n  Gold: {}\n");
        let err = load_content(ContentSource::Str(&yaml)).unwrap_err();
        assert!(err.to_string().contains("Gold"), "{err}");
    }

    #[test]
    fn unreachable_recipe_does_not_converge() {
        let yaml = TWO_INPUTS.replace(
            "  Kiln: { input: { Clay: 1, Sand: 1 }, output: { Glass: 2 } }",
            "  Kiln: { input: { Clay: 1, Glass: 1 }, output: { Glass: 2 } }",
        );
        let err = load_content(ContentSource::Str(&yaml)).unwrap_err();
        assert!(err.to_string().contains("Kiln"), "{err}");
    }
}
