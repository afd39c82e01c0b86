//! Fixed prompt text and the function-tool schema for food analysis.

use serde_json::{json, Value};

pub const ANALYSIS_TOOL_NAME: &str = "report_food_analysis";

/// Token cap for the forced-JSON retry.
pub const RETRY_MAX_TOKENS: u32 = 800;

/// Instruction sent with every analysis request. Describes the expected
/// JSON shape and the estimation rules.
pub fn analysis_prompt() -> String {
    r#"Analyze this photo of food and report the following information in JSON format:

{
    "foods": [
        {
            "name": "name of the food",
            "estimated_grams": estimated quantity in grams,
            "calories_per_100g": calories per 100g (realistic estimate),
            "confidence": confidence level (0-1)
        }
    ],
    "total_calories": total estimated calories,
    "analysis_confidence": overall confidence of the analysis (0-1),
    "notes": "additional observations"
}

Important rules:
- Identify every food visible in the image
- Estimate quantities in grams realistically, between 1 and 1000
- Provide calories per 100g based on standard nutritional values, between 0 and 900:
  * Chicken: ~165 kcal/100g
  * Beef: ~250 kcal/100g
  * Sausage: ~300 kcal/100g
  * Fried/roasted potatoes: ~200 kcal/100g
  * Rice: ~130 kcal/100g
  * Bread: ~250 kcal/100g
  * Cheese: ~350 kcal/100g
  * Egg: ~155 kcal/100g
  * Lettuce: ~15 kcal/100g
  * Tomato: ~20 kcal/100g
  * Sugary drinks: ~40 kcal/100ml
- Compute total calories as the sum of (grams * calories/100g) / 100
- Be specific with food names
- If you are unsure about a food, include it with low confidence
- Do NOT return calories of 0; always provide a realistic estimate unless the image is genuinely empty
"#
    .to_string()
}

/// Instruction for the forced-JSON retry: same rules, no prose allowed.
pub fn json_only_prompt() -> String {
    format!(
        "{}\nRespond with ONLY the JSON object. No explanations, no markdown, no surrounding text.",
        analysis_prompt()
    )
}

/// Parameter schema for the structured call, matching the result shape.
pub fn analysis_tool_parameters() -> Value {
    json!({
        "type": "object",
        "properties": {
            "foods": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "estimated_grams": { "type": "number", "minimum": 1, "maximum": 1000 },
                        "calories_per_100g": { "type": "number", "minimum": 0, "maximum": 900 },
                        "confidence": { "type": "number", "minimum": 0, "maximum": 1 }
                    },
                    "required": ["name", "estimated_grams", "calories_per_100g", "confidence"]
                }
            },
            "total_calories": { "type": "number" },
            "analysis_confidence": { "type": "number", "minimum": 0, "maximum": 1 },
            "notes": { "type": "string" }
        },
        "required": ["foods", "total_calories", "analysis_confidence"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_states_the_estimation_rules() {
        let prompt = analysis_prompt();
        assert!(prompt.contains("total_calories"));
        assert!(prompt.contains("analysis_confidence"));
        assert!(prompt.contains("between 1 and 1000"));
        assert!(prompt.contains("between 0 and 900"));
    }

    #[test]
    fn tool_schema_requires_the_three_result_keys() {
        let params = analysis_tool_parameters();
        let required: Vec<&str> = params["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(
            required,
            vec!["foods", "total_calories", "analysis_confidence"]
        );
    }
}
