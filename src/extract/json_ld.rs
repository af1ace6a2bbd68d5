//! JSON-LD recipe extraction
//!
//! Reads `<script type="application/ld+json">` blocks, finds the first node
//! typed `Recipe` (top-level, inside an array, or inside `@graph`) and maps
//! its schema.org fields. Falls back to microdata when no ingredients are found.

use crate::extract::{clean_text, Extractor, HRecipeExtractor, Ratings, Recipe, RecipeTime, Reviews};
use scraper::{Html, Selector};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLdExtractor;

impl Extractor for JsonLdExtractor {
    fn name(&self) -> &'static str {
        "json-ld"
    }

    fn extract(&self, document: &Html) -> Recipe {
        let recipe = script_blocks(document)
            .iter()
            .filter_map(|raw| decode(raw))
            .find_map(|value| find_recipe_node(&value).map(recipe_from_node))
            .unwrap_or_default();

        if recipe.is_complete() {
            recipe
        } else {
            HRecipeExtractor.extract(document)
        }
    }
}

fn script_blocks(document: &Html) -> Vec<String> {
    let selector = match Selector::parse(r#"script[type="application/ld+json"]"#) {
        Ok(selector) => selector,
        Err(_) => return Vec::new(),
    };

    document
        .select(&selector)
        .map(|element| element.text().collect::<String>())
        .collect()
}

/// Parses a script block, dropping control characters some sites leave in
fn decode(raw: &str) -> Option<Value> {
    let cleaned: String = raw.chars().filter(|c| !c.is_control()).collect();
    match serde_json::from_str(&cleaned) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!("Skipping malformed JSON-LD block: {}", e);
            None
        }
    }
}

fn is_recipe_type(node: &Value) -> bool {
    match node.get("@type") {
        Some(Value::String(kind)) => kind == "Recipe",
        Some(Value::Array(kinds)) => kinds.iter().any(|k| k.as_str() == Some("Recipe")),
        _ => false,
    }
}

fn find_recipe_node(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.iter().find_map(find_recipe_node),
        Value::Object(map) => {
            if is_recipe_type(value) {
                return Some(value);
            }
            map.get("@graph").and_then(find_recipe_node)
        }
        _ => None,
    }
}

fn recipe_from_node(node: &Value) -> Recipe {
    Recipe {
        title: node.get("name").and_then(scalar),
        ingredients: list_or_split(node.get("recipeIngredient"), ','),
        instructions: list_or_split(node.get("recipeInstructions"), '.'),
        time: RecipeTime {
            prep_time: node.get("prepTime").and_then(scalar),
            cook_time: node.get("cookTime").and_then(scalar),
        },
        recipe_yield: node.get("recipeYield").and_then(scalar),
        reviews: Reviews {
            text: Vec::new(),
            ratings: node
                .get("aggregateRating")
                .map(ratings_from_node)
                .unwrap_or_default(),
        },
    }
}

fn ratings_from_node(node: &Value) -> Ratings {
    Ratings {
        average: node.get("ratingValue").and_then(scalar),
        count: node
            .get("ratingCount")
            .or_else(|| node.get("reviewCount"))
            .and_then(scalar),
        best: node.get("bestRating").and_then(scalar),
        worst: node.get("worstRating").and_then(scalar),
    }
}

/// Renders a string or number; takes the first element of an array
fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(clean_text(s)).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => items.iter().find_map(scalar),
        _ => None,
    }
}

/// Accepts either a list (of strings or `HowToStep`-style objects) or a
/// single string split on `delimiter`
fn list_or_split(value: Option<&Value>, delimiter: char) -> Vec<String> {
    let items: Vec<String> = match value {
        Some(Value::Array(items)) => items.iter().flat_map(step_texts).collect(),
        Some(Value::String(s)) => s.split(delimiter).map(str::to_string).collect(),
        _ => Vec::new(),
    };

    items
        .iter()
        .map(|s| clean_text(s))
        .filter(|s| !s.is_empty())
        .collect()
}

fn step_texts(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Object(map) => {
            if let Some(Value::Array(steps)) = map.get("itemListElement") {
                return steps.iter().flat_map(step_texts).collect();
            }
            map.get("text")
                .and_then(Value::as_str)
                .map(|s| vec![s.to_string()])
                .unwrap_or_default()
        }
        _ => Vec::new(),
    }
}
