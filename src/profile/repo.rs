use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::drinks::repo::DrinkRecord;
use crate::meals::repo::MealRecord;

pub const DEFAULT_DAILY_CALORIE_GOAL: i32 = 1000;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserSettings {
    pub user_id: Uuid,
    pub daily_calorie_goal: i32,
    pub notifications_enabled: bool,
    pub ui_theme: String,
    pub language: String,
    pub updated_at: OffsetDateTime,
}

/// Fetch the settings row, creating it with defaults on first access.
pub async fn ensure_settings(
    db: &PgPool,
    user_id: Uuid,
    daily_calorie_goal: Option<i32>,
) -> anyhow::Result<UserSettings> {
    sqlx::query(
        r#"
        INSERT INTO user_settings (user_id, daily_calorie_goal)
        VALUES ($1, $2)
        ON CONFLICT (user_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(daily_calorie_goal.unwrap_or(DEFAULT_DAILY_CALORIE_GOAL))
    .execute(db)
    .await?;

    let settings = sqlx::query_as::<_, UserSettings>(
        r#"
        SELECT user_id, daily_calorie_goal, notifications_enabled, ui_theme, language, updated_at
        FROM user_settings
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_one(db)
    .await?;
    Ok(settings)
}

pub async fn update_settings(
    db: &PgPool,
    user_id: Uuid,
    daily_calorie_goal: i32,
    notifications_enabled: bool,
    ui_theme: &str,
    language: &str,
) -> anyhow::Result<UserSettings> {
    let settings = sqlx::query_as::<_, UserSettings>(
        r#"
        INSERT INTO user_settings
            (user_id, daily_calorie_goal, notifications_enabled, ui_theme, language, updated_at)
        VALUES ($1, $2, $3, $4, $5, now())
        ON CONFLICT (user_id) DO UPDATE SET
            daily_calorie_goal = EXCLUDED.daily_calorie_goal,
            notifications_enabled = EXCLUDED.notifications_enabled,
            ui_theme = EXCLUDED.ui_theme,
            language = EXCLUDED.language,
            updated_at = now()
        RETURNING user_id, daily_calorie_goal, notifications_enabled, ui_theme, language, updated_at
        "#,
    )
    .bind(user_id)
    .bind(daily_calorie_goal)
    .bind(notifications_enabled)
    .bind(ui_theme)
    .bind(language)
    .fetch_one(db)
    .await?;
    Ok(settings)
}

pub async fn meal_calories_between(
    db: &PgPool,
    user_id: Uuid,
    from: Date,
    to: Date,
) -> anyhow::Result<f64> {
    let total = sqlx::query_scalar::<_, Option<f64>>(
        r#"
        SELECT SUM(total_calories)
        FROM meal_records
        WHERE user_id = $1 AND meal_date >= $2 AND meal_date <= $3
        "#,
    )
    .bind(user_id)
    .bind(from)
    .bind(to)
    .fetch_one(db)
    .await?;
    Ok(total.unwrap_or(0.0))
}

pub async fn drink_calories_between(
    db: &PgPool,
    user_id: Uuid,
    from: Date,
    to: Date,
) -> anyhow::Result<f64> {
    let total = sqlx::query_scalar::<_, Option<f64>>(
        r#"
        SELECT SUM(total_calories)
        FROM drink_records
        WHERE user_id = $1 AND drink_date >= $2 AND drink_date <= $3
        "#,
    )
    .bind(user_id)
    .bind(from)
    .bind(to)
    .fetch_one(db)
    .await?;
    Ok(total.unwrap_or(0.0))
}

pub async fn recent_meals_on(
    db: &PgPool,
    user_id: Uuid,
    date: Date,
    limit: i64,
) -> anyhow::Result<Vec<MealRecord>> {
    let meals = sqlx::query_as::<_, MealRecord>(
        r#"
        SELECT id, user_id, meal_date, meal_time, meal_type, image_id, total_calories,
               notes, created_at
        FROM meal_records
        WHERE user_id = $1 AND meal_date = $2
        ORDER BY meal_time DESC
        LIMIT $3
        "#,
    )
    .bind(user_id)
    .bind(date)
    .bind(limit)
    .fetch_all(db)
    .await?;
    Ok(meals)
}

pub async fn recent_drinks_on(
    db: &PgPool,
    user_id: Uuid,
    date: Date,
    limit: i64,
) -> anyhow::Result<Vec<DrinkRecord>> {
    let drinks = sqlx::query_as::<_, DrinkRecord>(
        r#"
        SELECT r.id, r.user_id, r.drink_id, d.name AS drink_name, r.drink_date, r.drink_time,
               r.quantity_ml, r.total_calories, r.notes, r.created_at
        FROM drink_records r
        JOIN drinks d ON d.id = r.drink_id
        WHERE r.user_id = $1 AND r.drink_date = $2
        ORDER BY r.drink_time DESC
        LIMIT $3
        "#,
    )
    .bind(user_id)
    .bind(date)
    .bind(limit)
    .fetch_all(db)
    .await?;
    Ok(drinks)
}

/// Per-meal-type counts and calorie sums inside a window.
pub async fn meals_by_type_between(
    db: &PgPool,
    user_id: Uuid,
    from: Date,
    to: Date,
) -> anyhow::Result<Vec<(String, i64, f64)>> {
    let rows = sqlx::query_as::<_, (String, i64, Option<f64>)>(
        r#"
        SELECT meal_type, COUNT(*), SUM(total_calories)
        FROM meal_records
        WHERE user_id = $1 AND meal_date >= $2 AND meal_date <= $3
        GROUP BY meal_type
        ORDER BY meal_type
        "#,
    )
    .bind(user_id)
    .bind(from)
    .bind(to)
    .fetch_all(db)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(t, n, kcal)| (t, n, kcal.unwrap_or(0.0)))
        .collect())
}

pub async fn count_meals_between(
    db: &PgPool,
    user_id: Uuid,
    from: Date,
    to: Date,
) -> anyhow::Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM meal_records
        WHERE user_id = $1 AND meal_date >= $2 AND meal_date <= $3
        "#,
    )
    .bind(user_id)
    .bind(from)
    .bind(to)
    .fetch_one(db)
    .await?;
    Ok(count)
}

pub async fn count_drinks_between(
    db: &PgPool,
    user_id: Uuid,
    from: Date,
    to: Date,
) -> anyhow::Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM drink_records
        WHERE user_id = $1 AND drink_date >= $2 AND drink_date <= $3
        "#,
    )
    .bind(user_id)
    .bind(from)
    .bind(to)
    .fetch_one(db)
    .await?;
    Ok(count)
}
