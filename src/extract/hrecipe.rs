//! h-recipe / schema.org microdata extraction
//!
//! Sites mark recipe fields with `itemprop` attributes (and a few with
//! site-specific classes). Each field tries its selectors in order.

use crate::extract::{clean_text, Extractor, Ratings, Recipe, RecipeTime, Reviews};
use scraper::{ElementRef, Html, Selector};

const TITLE: &[&str] = &[r#"[class="recipe-name"]"#, r#"[itemprop="name"]"#];
const INGREDIENTS: &[&str] = &[
    r#"[itemprop="ingredients"]"#,
    r#"[itemprop="ingredient"]"#,
    r#"[itemprop="recipeIngredient"]"#,
];
const INSTRUCTIONS: &[&str] = &[
    r#"[itemprop="recipeDirections"]"#,
    r#"[itemprop="recipeInstructions"]"#,
];
const REVIEW_TEXT: &[&str] = &[
    r#"[itemprop="reviewBody"]"#,
    r#"[class="review-text"]"#,
    r#"[class="gig-comment-body"]"#,
];

/// Attributes holding a value when the element itself has no text
const VALUE_ATTRIBUTES: &[&str] = &["content", "datetime"];

/// Extractor for pages using h-recipe style microdata
#[derive(Debug, Clone, Copy, Default)]
pub struct HRecipeExtractor;

impl Extractor for HRecipeExtractor {
    fn name(&self) -> &'static str {
        "h-recipe"
    }

    fn extract(&self, document: &Html) -> Recipe {
        let root = document.root_element();

        Recipe {
            title: first_value(&select_all(root, TITLE)),
            ingredients: texts(&select_all(root, INGREDIENTS)),
            instructions: texts(&select_all(root, INSTRUCTIONS)),
            time: RecipeTime {
                prep_time: first_value(&select_all(root, &[r#"[itemprop="prepTime"]"#])),
                cook_time: first_value(&select_all(root, &[r#"[itemprop="cookTime"]"#])),
            },
            recipe_yield: first_value(&select_all(root, &[r#"[itemprop="recipeYield"]"#])),
            reviews: Reviews {
                text: texts(&select_all(root, REVIEW_TEXT)),
                ratings: find_ratings(root),
            },
        }
    }
}

fn find_ratings(root: ElementRef<'_>) -> Ratings {
    let aggregate = match select_all(root, &[r#"[itemprop="aggregateRating"]"#])
        .into_iter()
        .next()
    {
        Some(element) => element,
        None => {
            // No aggregate block; fall back to the first loose rating value
            return Ratings {
                average: first_value(&select_all(root, &[r#"[itemprop="ratingValue"]"#])),
                ..Ratings::default()
            };
        }
    };

    Ratings {
        average: first_value(&select_all(aggregate, &[r#"[itemprop="ratingValue"]"#])),
        count: first_value(&select_all(
            aggregate,
            &[r#"[itemprop="ratingCount"]"#, r#"[itemprop="reviewCount"]"#],
        )),
        best: first_value(&select_all(aggregate, &[r#"[itemprop="bestRating"]"#])),
        worst: first_value(&select_all(aggregate, &[r#"[itemprop="worstRating"]"#])),
    }
}

/// Runs each selector in order and concatenates the matches
fn select_all<'a>(scope: ElementRef<'a>, selectors: &[&str]) -> Vec<ElementRef<'a>> {
    selectors
        .iter()
        .filter_map(|css| Selector::parse(css).ok())
        .flat_map(|selector| scope.select(&selector).collect::<Vec<_>>())
        .collect()
}

/// Returns the first non-empty text or value attribute among `elements`
fn first_value(elements: &[ElementRef<'_>]) -> Option<String> {
    elements.iter().find_map(|element| element_value(*element))
}

fn element_value(element: ElementRef<'_>) -> Option<String> {
    let text = clean_text(&element.text().collect::<String>());
    if !text.is_empty() {
        return Some(text);
    }

    VALUE_ATTRIBUTES
        .iter()
        .filter_map(|attr| element.value().attr(attr))
        .map(clean_text)
        .find(|value| !value.is_empty())
}

fn texts(elements: &[ElementRef<'_>]) -> Vec<String> {
    elements
        .iter()
        .map(|element| clean_text(&element.text().collect::<String>()))
        .filter(|text| !text.is_empty())
        .collect()
}
