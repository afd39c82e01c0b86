use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime, Time};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
    Other,
}

impl MealType {
    pub fn as_str(self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
            MealType::Snack => "snack",
            MealType::Other => "other",
        }
    }
}

impl std::str::FromStr for MealType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "breakfast" => Ok(MealType::Breakfast),
            "lunch" => Ok(MealType::Lunch),
            "dinner" => Ok(MealType::Dinner),
            "snack" => Ok(MealType::Snack),
            "other" => Ok(MealType::Other),
            other => Err(format!("unknown meal type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Food,
    Drink,
}

/// Manual meal entry without a photo.
#[derive(Debug, Deserialize)]
pub struct CreateMealRequest {
    pub meal_type: MealType,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub estimated_calories: Option<f64>,
}

/// One confirmed item when saving a meal from an analysis.
#[derive(Debug, Deserialize)]
pub struct SaveItem {
    #[serde(rename = "type")]
    pub item_type: ItemKind,
    pub name: String,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default)]
    pub calories: f64,
    #[serde(default = "default_item_confidence")]
    pub confidence: f64,
}

fn default_unit() -> String {
    "g".to_string()
}

fn default_item_confidence() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
pub struct SaveMealRequest {
    pub meal_type: MealType,
    #[serde(default)]
    pub notes: Option<String>,
    pub total_calories: f64,
    #[serde(default)]
    pub items: Vec<SaveItem>,
    /// "YYYY-MM-DD"; paired with custom_time.
    #[serde(default)]
    pub custom_date: Option<String>,
    /// "HH:MM"
    #[serde(default)]
    pub custom_time: Option<String>,
    #[serde(default)]
    pub analysis_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct CreatedMealResponse {
    pub id: Uuid,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub date_from: Option<String>,
    #[serde(default)]
    pub date_to: Option<String>,
    #[serde(default)]
    pub meal_type: Option<MealType>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Serialize)]
pub struct MealListItem {
    pub id: Uuid,
    pub meal_date: Date,
    pub meal_time: Time,
    pub meal_type: String,
    pub total_calories: f64,
    pub notes: String,
    pub image_id: Option<Uuid>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct MealHistoryResponse {
    pub meals: Vec<MealListItem>,
    pub total_meals: i64,
    pub total_calories: f64,
    pub avg_calories: f64,
    pub days_count: i64,
}

#[derive(Debug, Serialize)]
pub struct MealItemView {
    pub name: String,
    pub quantity_g: f64,
    pub calories: f64,
    pub confidence: f64,
}

#[derive(Debug, Serialize)]
pub struct MealAnalysisView {
    pub analysis_id: Uuid,
    pub calculated_calories: f64,
    pub confidence_score: f64,
}

#[derive(Debug, Serialize)]
pub struct MealDetailsResponse {
    pub id: Uuid,
    pub meal_date: Date,
    pub meal_time: Time,
    pub meal_type: String,
    pub total_calories: f64,
    pub notes: String,
    pub image_id: Option<Uuid>,
    pub items: Vec<MealItemView>,
    pub analysis: Option<MealAnalysisView>,
    pub created_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meal_type_round_trips_through_serde() {
        let t: MealType = serde_json::from_str("\"breakfast\"").unwrap();
        assert_eq!(t, MealType::Breakfast);
        assert_eq!(serde_json::to_string(&t).unwrap(), "\"breakfast\"");
        assert_eq!("dinner".parse::<MealType>().unwrap(), MealType::Dinner);
        assert!("brunch".parse::<MealType>().is_err());
    }

    #[test]
    fn save_item_defaults() {
        let item: SaveItem =
            serde_json::from_str(r#"{"type":"food","name":"rice"}"#).unwrap();
        assert_eq!(item.item_type, ItemKind::Food);
        assert_eq!(item.quantity, 0.0);
        assert_eq!(item.unit, "g");
        assert_eq!(item.confidence, 1.0);
    }
}
