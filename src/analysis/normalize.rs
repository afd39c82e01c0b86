//! Turns a raw model analysis into the shape the client UI consumes:
//! per-item calorie arithmetic, recomputed totals, and best-effort
//! category buckets. Deterministic and infallible — degenerate input
//! degrades to an empty result instead of failing the request.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::vision::{RawAnalysis, RawFood};

pub const OTHER_CATEGORY: &str = "other";

/// Keyword table for coarse grouping. First matching category wins;
/// matching is a lowercase substring test, so keep keywords specific.
/// Keywords cover English and Spanish food names.
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "fruits",
        &[
            "apple", "manzana", "banana", "plátano", "platano", "orange", "naranja",
            "strawberry", "fresa", "grape", "uva", "pear", "pera", "pineapple", "piña",
            "mango",
        ],
    ),
    (
        "vegetables",
        &[
            "lettuce", "lechuga", "tomato", "tomate", "carrot", "zanahoria", "broccoli",
            "brócoli", "spinach", "espinaca", "onion", "cebolla", "pepper", "pimiento",
        ],
    ),
    (
        "meats",
        &[
            "chicken", "pollo", "beef", "pork", "cerdo", "turkey", "pavo", "lamb",
            "cordero", "ternera", "sausage", "salchicha",
        ],
    ),
    (
        "fish",
        &[
            "salmon", "salmón", "tuna", "atún", "cod", "bacalao", "trout", "trucha",
            "hake", "merluza",
        ],
    ),
    (
        "dairy",
        &[
            "milk", "leche", "cheese", "queso", "yogurt", "yogur", "butter",
            "mantequilla", "cream", "crema",
        ],
    ),
    (
        "grains",
        &[
            "rice", "arroz", "pasta", "bread", "pan", "oat", "avena", "wheat", "trigo",
            "corn", "maíz",
        ],
    ),
    (
        "legumes",
        &[
            "bean", "frijol", "lentil", "lenteja", "chickpea", "garbanzo", "haba",
            "guisante",
        ],
    ),
    (
        "nuts",
        &[
            "almond", "almendra", "walnut", "nuez", "peanut", "cacahuete", "hazelnut",
            "avellana", "pistachio", "pistacho",
        ],
    ),
];

/// One display-ready food item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedItem {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    pub calories: f64,
    pub confidence: f64,
    pub category: String,
    #[serde(rename = "type")]
    pub item_type: String,
}

/// The full display shape: items, recomputed totals, category buckets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedAnalysis {
    pub foods: Vec<NormalizedItem>,
    pub total_calories: f64,
    pub total_grams: f64,
    pub analysis_confidence: f64,
    pub categories: BTreeMap<String, Vec<RawFood>>,
    pub notes: String,
    pub food_count: usize,
}

impl NormalizedAnalysis {
    fn empty(notes: &str) -> Self {
        Self {
            foods: Vec::new(),
            total_calories: 0.0,
            total_grams: 0.0,
            analysis_confidence: 0.0,
            categories: BTreeMap::new(),
            notes: notes.to_string(),
            food_count: 0,
        }
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Lowercase keyword lookup; unmatched names fall into "other".
pub fn categorize(food_name: &str) -> &'static str {
    let name = food_name.to_lowercase();
    for (category, keywords) in CATEGORY_KEYWORDS {
        if keywords.iter().any(|keyword| name.contains(keyword)) {
            return category;
        }
    }
    OTHER_CATEGORY
}

pub fn normalize(raw: &RawAnalysis) -> NormalizedAnalysis {
    // Non-finite numbers would poison every downstream figure; treat the
    // whole result as unusable rather than fail the request.
    let degenerate = raw.foods.iter().any(|f| {
        !f.estimated_grams.is_finite() || !f.calories_per_100g.is_finite() || !f.confidence.is_finite()
    });
    if degenerate || !raw.analysis_confidence.is_finite() {
        return NormalizedAnalysis::empty("analysis could not be processed");
    }

    let mut foods = Vec::with_capacity(raw.foods.len());
    let mut total_calories = 0.0;
    let mut total_grams = 0.0;
    let mut categories: BTreeMap<String, Vec<RawFood>> = BTreeMap::new();

    for food in &raw.foods {
        // Calories come from the raw grams; the display quantity below may
        // substitute 100 g when grams is zero, intentionally NOT feeding
        // back into this figure (kept for compatibility with the original
        // behavior).
        let calories = round2(food.estimated_grams * food.calories_per_100g / 100.0);
        let quantity = if food.estimated_grams > 0.0 {
            food.estimated_grams
        } else {
            100.0
        };

        total_calories += calories;
        total_grams += food.estimated_grams;

        let category = categorize(&food.name);
        categories
            .entry(category.to_string())
            .or_default()
            .push(food.clone());

        foods.push(NormalizedItem {
            name: food.name.clone(),
            quantity,
            unit: "g".to_string(),
            calories,
            confidence: food.confidence,
            category: category.to_string(),
            item_type: "food".to_string(),
        });
    }

    let food_count = foods.len();
    NormalizedAnalysis {
        foods,
        total_calories: round2(total_calories),
        total_grams: round2(total_grams),
        analysis_confidence: raw.analysis_confidence,
        categories,
        notes: raw.notes.clone(),
        food_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn food(name: &str, grams: f64, kcal: f64, confidence: f64) -> RawFood {
        RawFood {
            name: name.to_string(),
            estimated_grams: grams,
            calories_per_100g: kcal,
            confidence,
        }
    }

    fn analysis(foods: Vec<RawFood>) -> RawAnalysis {
        RawAnalysis {
            foods,
            total_calories: 0.0,
            analysis_confidence: 0.9,
            notes: "test".to_string(),
        }
    }

    #[test]
    fn per_item_calories_follow_grams_times_kcal() {
        let result = normalize(&analysis(vec![food("apple", 150.0, 52.0, 0.9)]));
        assert_eq!(result.foods[0].calories, 78.0);
        assert_eq!(result.total_calories, 78.0);
        assert_eq!(result.total_grams, 150.0);
    }

    #[test]
    fn totals_are_recomputed_from_items_not_declared_total() {
        let mut raw = analysis(vec![
            food("rice", 200.0, 130.0, 0.8),
            food("chicken", 120.0, 165.0, 0.7),
        ]);
        raw.total_calories = 9999.0; // declared total is ignored
        let result = normalize(&raw);
        assert_eq!(result.foods[0].calories, 260.0);
        assert_eq!(result.foods[1].calories, 198.0);
        assert_eq!(result.total_calories, 458.0);
    }

    #[test]
    fn empty_food_list_totals_zero() {
        let result = normalize(&analysis(vec![]));
        assert_eq!(result.total_calories, 0.0);
        assert_eq!(result.total_grams, 0.0);
        assert_eq!(result.food_count, 0);
        assert!(result.categories.is_empty());
    }

    #[test]
    fn zero_grams_substitutes_display_quantity_but_keeps_raw_calories() {
        let result = normalize(&analysis(vec![food("cheese", 0.0, 350.0, 0.6)]));
        // display quantity is substituted, the calorie figure is not recomputed
        assert_eq!(result.foods[0].quantity, 100.0);
        assert_eq!(result.foods[0].calories, 0.0);
        // total_grams uses the raw grams, no substitution
        assert_eq!(result.total_grams, 0.0);
    }

    #[test]
    fn calories_round_to_two_decimals() {
        let result = normalize(&analysis(vec![food("lettuce", 33.0, 15.0, 0.9)]));
        assert_eq!(result.foods[0].calories, 4.95);
    }

    #[test]
    fn fruit_keywords_bucket_in_both_languages() {
        assert_eq!(categorize("Manzana roja"), "fruits");
        assert_eq!(categorize("green apple"), "fruits");
        assert_eq!(categorize("grilled chicken"), "meats");
        assert_eq!(categorize("mystery casserole"), OTHER_CATEGORY);
    }

    #[test]
    fn category_buckets_group_raw_entries() {
        let result = normalize(&analysis(vec![
            food("manzana", 150.0, 52.0, 0.9),
            food("banana", 120.0, 89.0, 0.9),
            food("mystery stew", 300.0, 150.0, 0.4),
        ]));
        assert_eq!(result.categories["fruits"].len(), 2);
        assert_eq!(result.categories[OTHER_CATEGORY].len(), 1);
        assert_eq!(result.foods[2].category, OTHER_CATEGORY);
    }

    #[test]
    fn normalization_is_idempotent() {
        let raw = analysis(vec![
            food("apple", 150.0, 52.0, 0.9),
            food("bread", 0.0, 250.0, 0.5),
        ]);
        let first = normalize(&raw);
        let second = normalize(&raw);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn non_finite_input_degrades_to_empty_result() {
        let result = normalize(&analysis(vec![food("apple", f64::NAN, 52.0, 0.9)]));
        assert!(result.foods.is_empty());
        assert_eq!(result.total_calories, 0.0);
        assert_eq!(result.analysis_confidence, 0.0);
    }

    #[test]
    fn confidence_and_notes_pass_through() {
        let result = normalize(&analysis(vec![food("apple", 150.0, 52.0, 0.9)]));
        assert_eq!(result.analysis_confidence, 0.9);
        assert_eq!(result.notes, "test");
        assert_eq!(result.foods[0].confidence, 0.9);
    }
}
