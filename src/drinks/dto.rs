use serde::{Deserialize, Serialize};
use time::{Date, Time};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateDrinkRecordRequest {
    pub drink_id: Uuid,
    pub quantity_ml: i32,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DrinkRecordResponse {
    pub id: Uuid,
    pub drink_id: Uuid,
    pub drink_name: String,
    pub quantity_ml: i32,
    pub total_calories: f64,
    pub drink_date: Date,
    pub drink_time: Time,
    pub notes: String,
}

#[derive(Debug, Deserialize)]
pub struct DrinkHistoryQuery {
    #[serde(default)]
    pub date_from: Option<String>,
    #[serde(default)]
    pub date_to: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Serialize)]
pub struct DrinkHistoryResponse {
    pub drinks: Vec<DrinkRecordResponse>,
    pub total_drinks: i64,
    pub total_calories: f64,
    pub total_volume_ml: i64,
    pub avg_drink_calories: f64,
    pub days_count: i64,
}

/// Calories for a poured quantity: quantity × kcal/100ml ÷ 100.
pub fn drink_calories(quantity_ml: f64, calories_per_100ml: f64) -> f64 {
    quantity_ml * calories_per_100ml / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drink_calories_scale_with_volume() {
        assert_eq!(drink_calories(330.0, 42.0), 138.6);
        assert_eq!(drink_calories(250.0, 0.0), 0.0);
        assert_eq!(drink_calories(0.0, 42.0), 0.0);
    }
}
