use anyhow::Context;
use time::{macros::format_description, Date, OffsetDateTime, Time};
use uuid::Uuid;

use super::dto::{CreateMealRequest, ItemKind, SaveMealRequest};
use super::repo::{self, MealRecord};
use crate::analysis::repo as analysis_repo;
use crate::analysis::repo::ImageAnalysis;
use crate::drinks::repo as drinks_repo;
use crate::state::AppState;
use crate::vision::RawFood;

/// Manual entries land in this window; out-of-range estimates snap back
/// to the default.
pub const MIN_ESTIMATED_CALORIES: f64 = 50.0;
pub const MAX_ESTIMATED_CALORIES: f64 = 2000.0;
pub const DEFAULT_ESTIMATED_CALORIES: f64 = 350.0;

pub fn clamp_estimated_calories(value: Option<f64>) -> f64 {
    match value {
        Some(v) if (MIN_ESTIMATED_CALORIES..=MAX_ESTIMATED_CALORIES).contains(&v) => v,
        _ => DEFAULT_ESTIMATED_CALORIES,
    }
}

pub fn parse_date(s: &str) -> anyhow::Result<Date> {
    let fmt = format_description!("[year]-[month]-[day]");
    Date::parse(s, &fmt).with_context(|| format!("invalid date: {s}"))
}

pub fn parse_time(s: &str) -> anyhow::Result<Time> {
    let fmt = format_description!("[hour]:[minute]");
    Time::parse(s, &fmt).with_context(|| format!("invalid time: {s}"))
}

fn now_date_time() -> (Date, Time) {
    let now = OffsetDateTime::now_utc();
    (now.date(), now.time())
}

/// Manual meal entry, no photo, no items.
pub async fn create_manual_meal(
    st: &AppState,
    user_id: Uuid,
    request: &CreateMealRequest,
) -> anyhow::Result<MealRecord> {
    let calories = clamp_estimated_calories(request.estimated_calories);
    let (date, time) = now_date_time();

    let mut tx = st.db.begin().await.context("begin tx")?;
    let meal = repo::insert_tx(
        &mut tx,
        user_id,
        date,
        time,
        request.meal_type.as_str(),
        None,
        calories,
        request.notes.as_deref().unwrap_or(""),
    )
    .await?;
    tx.commit().await.context("commit tx")?;
    Ok(meal)
}

/// Save a confirmed analysis as a meal: the meal row plus one detail row
/// per food item, all in one transaction. Drink items become standalone
/// drink records dated today, as the original flow did.
pub async fn save_meal_with_items(
    st: &AppState,
    user_id: Uuid,
    request: &SaveMealRequest,
) -> anyhow::Result<MealRecord> {
    anyhow::ensure!(
        request.total_calories > 0.0,
        "total calories must be greater than 0"
    );

    // link the photo when the analysis is the user's own
    let image_id = match request.analysis_id {
        Some(analysis_id) => analysis_repo::find_for_user(&st.db, analysis_id, user_id)
            .await?
            .map(|a| a.image_id),
        None => None,
    };

    let (date, time) = match (&request.custom_date, &request.custom_time) {
        (Some(d), Some(t)) => (parse_date(d)?, parse_time(t)?),
        _ => now_date_time(),
    };

    let mut tx = st.db.begin().await.context("begin tx")?;
    let meal = repo::insert_tx(
        &mut tx,
        user_id,
        date,
        time,
        request.meal_type.as_str(),
        image_id,
        request.total_calories,
        request.notes.as_deref().unwrap_or(""),
    )
    .await?;

    for item in &request.items {
        match item.item_type {
            ItemKind::Food => {
                let kcal_per_100g = if item.quantity > 0.0 {
                    item.calories * 100.0 / item.quantity
                } else {
                    0.0
                };
                let food_id = repo::find_or_create_food(&mut tx, &item.name, kcal_per_100g).await?;
                repo::insert_detail_tx(
                    &mut tx,
                    meal.id,
                    food_id,
                    item.quantity,
                    item.calories,
                    item.confidence,
                )
                .await?;
            }
            ItemKind::Drink => {
                let kcal_per_100ml = if item.quantity > 0.0 {
                    item.calories * 100.0 / item.quantity
                } else {
                    0.0
                };
                let drink_id =
                    drinks_repo::find_or_create_drink_tx(&mut tx, &item.name, kcal_per_100ml)
                        .await?;
                drinks_repo::insert_record_tx(
                    &mut tx,
                    user_id,
                    drink_id,
                    item.quantity as i32,
                    item.calories,
                    &format!("added from meal analysis: {}", meal.meal_type),
                )
                .await?;
            }
        }
    }
    tx.commit().await.context("commit tx")?;

    Ok(meal)
}

/// One-tap save of a stored analysis: meal dated now, typed "other",
/// one detail row per identified food.
pub async fn save_meal_from_stored(
    st: &AppState,
    user_id: Uuid,
    analysis: &ImageAnalysis,
) -> anyhow::Result<MealRecord> {
    let foods: Vec<RawFood> =
        serde_json::from_value(analysis.identified_foods.clone()).unwrap_or_default();
    let (date, time) = now_date_time();

    let mut tx = st.db.begin().await.context("begin tx")?;
    let meal = repo::insert_tx(
        &mut tx,
        user_id,
        date,
        time,
        "other",
        Some(analysis.image_id),
        analysis.calculated_calories,
        "saved from photo analysis",
    )
    .await?;

    for food in &foods {
        let calories = if food.estimated_grams > 0.0 && food.calories_per_100g > 0.0 {
            food.estimated_grams * food.calories_per_100g / 100.0
        } else {
            0.0
        };
        let catalog_kcal = if food.calories_per_100g > 0.0 {
            food.calories_per_100g
        } else {
            100.0
        };
        let food_id = repo::find_or_create_food(&mut tx, &food.name, catalog_kcal).await?;
        repo::insert_detail_tx(
            &mut tx,
            meal.id,
            food_id,
            food.estimated_grams,
            calories,
            food.confidence,
        )
        .await?;
    }
    tx.commit().await.context("commit tx")?;

    Ok(meal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimated_calories_clamp_to_default_outside_range() {
        assert_eq!(clamp_estimated_calories(Some(500.0)), 500.0);
        assert_eq!(clamp_estimated_calories(Some(50.0)), 50.0);
        assert_eq!(clamp_estimated_calories(Some(2000.0)), 2000.0);
        assert_eq!(clamp_estimated_calories(Some(10.0)), 350.0);
        assert_eq!(clamp_estimated_calories(Some(5000.0)), 350.0);
        assert_eq!(clamp_estimated_calories(None), 350.0);
    }

    #[test]
    fn date_and_time_parse_expected_formats() {
        let date = parse_date("2025-03-14").unwrap();
        assert_eq!(date.to_string(), "2025-03-14");
        let time = parse_time("18:45").unwrap();
        assert_eq!((time.hour(), time.minute()), (18, 45));

        assert!(parse_date("14/03/2025").is_err());
        assert!(parse_time("6pm").is_err());
    }
}
