use serde::{Deserialize, Serialize};

/// One food entry as reported by the model. Gram and kcal figures are
/// model estimates; ranges ([1,1000] g, [0,900] kcal/100g) are requested
/// in the prompt but not enforced here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFood {
    #[serde(default = "unknown_food_name")]
    pub name: String,
    #[serde(default)]
    pub estimated_grams: f64,
    #[serde(default)]
    pub calories_per_100g: f64,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

/// The structured result the model is asked to produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAnalysis {
    #[serde(default)]
    pub foods: Vec<RawFood>,
    #[serde(default)]
    pub total_calories: f64,
    #[serde(default)]
    pub analysis_confidence: f64,
    #[serde(default)]
    pub notes: String,
}

fn unknown_food_name() -> String {
    "unknown food".to_string()
}

fn default_confidence() -> f64 {
    0.5
}

/// Which fallback stage produced a usable result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    StructuredCall,
    InlineJson,
    ForcedJson,
}

/// A successful analysis plus the exact request/response text that
/// produced it, kept for the historical record.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub raw: RawAnalysis,
    pub stage: Stage,
    pub prompt_sent: String,
    pub response_received: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_food_defaults_fill_missing_fields() {
        let food: RawFood = serde_json::from_str(r#"{"name": "apple"}"#).unwrap();
        assert_eq!(food.name, "apple");
        assert_eq!(food.estimated_grams, 0.0);
        assert_eq!(food.calories_per_100g, 0.0);
        assert_eq!(food.confidence, 0.5);
    }

    #[test]
    fn raw_analysis_accepts_integer_numbers() {
        let raw: RawAnalysis = serde_json::from_str(
            r#"{"foods":[{"name":"rice","estimated_grams":200,"calories_per_100g":130,"confidence":1}],
                "total_calories":260,"analysis_confidence":1}"#,
        )
        .unwrap();
        assert_eq!(raw.foods[0].estimated_grams, 200.0);
        assert_eq!(raw.total_calories, 260.0);
    }
}
