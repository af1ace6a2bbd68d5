//! Recipe extraction
//!
//! Each site is paired with one [`Extractor`] that turns a parsed page into a
//! [`Recipe`]. The crawl task only checks whether the result carries an
//! ingredient list; pages without one are discarded, not counted as failures.

mod hrecipe;
mod json_ld;

pub use hrecipe::HRecipeExtractor;
pub use json_ld::JsonLdExtractor;

use crate::config::ExtractorKind;
use scraper::Html;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Errors that cause a fetched page to be discarded
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Empty response body for {url}")]
    EmptyBody { url: String },

    #[error("No recipe ingredients found at {url}")]
    MissingFields { url: String },
}

/// Preparation and cooking times as published by the site
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipeTime {
    #[serde(rename = "prepTime")]
    pub prep_time: Option<String>,
    #[serde(rename = "cookTime")]
    pub cook_time: Option<String>,
}

/// Aggregate rating values, kept as published text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ratings {
    pub average: Option<String>,
    pub count: Option<String>,
    pub best: Option<String>,
    pub worst: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reviews {
    pub text: Vec<String>,
    pub ratings: Ratings,
}

/// Fields extracted from one recipe page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub title: Option<String>,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub time: RecipeTime,
    #[serde(rename = "yield")]
    pub recipe_yield: Option<String>,
    pub reviews: Reviews,
}

impl Recipe {
    /// Returns true if the identifying fields needed to keep a record are present
    pub fn is_complete(&self) -> bool {
        !self.ingredients.is_empty()
    }
}

/// One written output record: the recipe plus the URL it resolved to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub url: String,
    #[serde(flatten)]
    pub recipe: Recipe,
}

/// Site-specific extraction capability
pub trait Extractor: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Extracts whatever recipe fields the document carries
    fn extract(&self, document: &Html) -> Recipe;
}

/// Returns the extractor configured for a site
pub fn extractor_for(kind: ExtractorKind) -> Arc<dyn Extractor> {
    match kind {
        ExtractorKind::HRecipe => Arc::new(HRecipeExtractor),
        ExtractorKind::JsonLd => Arc::new(JsonLdExtractor),
    }
}

/// Parses a response body and builds a record from it
///
/// The parsed document never outlives this call, so callers can use it from
/// async code without holding the DOM across an await point.
pub fn extract_record(
    extractor: &dyn Extractor,
    body: &str,
    final_url: &str,
) -> Result<Record, ExtractError> {
    if body.trim().is_empty() {
        return Err(ExtractError::EmptyBody {
            url: final_url.to_string(),
        });
    }

    let document = Html::parse_document(body);
    let recipe = extractor.extract(&document);

    if !recipe.is_complete() {
        return Err(ExtractError::MissingFields {
            url: final_url.to_string(),
        });
    }

    Ok(Record {
        url: final_url.to_string(),
        recipe,
    })
}

/// Collapses runs of whitespace into single spaces
pub(crate) fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
