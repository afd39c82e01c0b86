use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use time::{Date, OffsetDateTime, Time};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MealRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub meal_date: Date,
    pub meal_time: Time,
    pub meal_type: String,
    pub image_id: Option<Uuid>,
    pub total_calories: f64,
    pub notes: String,
    pub created_at: OffsetDateTime,
}

/// Detail row joined with its catalog food name.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MealDetailRow {
    pub id: Uuid,
    pub meal_id: Uuid,
    pub food_name: String,
    pub quantity_g: f64,
    pub calculated_calories: f64,
    pub confidence: f64,
}

const MEAL_COLUMNS: &str =
    "id, user_id, meal_date, meal_time, meal_type, image_id, total_calories, notes, created_at";

#[allow(clippy::too_many_arguments)]
pub async fn insert_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    meal_date: Date,
    meal_time: Time,
    meal_type: &str,
    image_id: Option<Uuid>,
    total_calories: f64,
    notes: &str,
) -> anyhow::Result<MealRecord> {
    let meal = sqlx::query_as::<_, MealRecord>(&format!(
        r#"
        INSERT INTO meal_records
            (id, user_id, meal_date, meal_time, meal_type, image_id, total_calories, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {MEAL_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(meal_date)
    .bind(meal_time)
    .bind(meal_type)
    .bind(image_id)
    .bind(total_calories)
    .bind(notes)
    .fetch_one(&mut **tx)
    .await?;
    Ok(meal)
}

pub async fn find_for_user(
    db: &PgPool,
    meal_id: Uuid,
    user_id: Uuid,
) -> anyhow::Result<Option<MealRecord>> {
    let meal = sqlx::query_as::<_, MealRecord>(&format!(
        r#"
        SELECT {MEAL_COLUMNS}
        FROM meal_records
        WHERE id = $1 AND user_id = $2
        "#
    ))
    .bind(meal_id)
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(meal)
}

/// Filtered, paginated history listing. NULL filter values are no-ops.
pub async fn list_history(
    db: &PgPool,
    user_id: Uuid,
    date_from: Option<Date>,
    date_to: Option<Date>,
    meal_type: Option<&str>,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<MealRecord>> {
    let meals = sqlx::query_as::<_, MealRecord>(&format!(
        r#"
        SELECT {MEAL_COLUMNS}
        FROM meal_records
        WHERE user_id = $1
          AND ($2::date IS NULL OR meal_date >= $2)
          AND ($3::date IS NULL OR meal_date <= $3)
          AND ($4::text IS NULL OR meal_type = $4)
        ORDER BY meal_date DESC, meal_time DESC
        LIMIT $5 OFFSET $6
        "#
    ))
    .bind(user_id)
    .bind(date_from)
    .bind(date_to)
    .bind(meal_type)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;
    Ok(meals)
}

/// Aggregates over the same filter set: (meal count, calorie sum, distinct days).
pub async fn history_stats(
    db: &PgPool,
    user_id: Uuid,
    date_from: Option<Date>,
    date_to: Option<Date>,
    meal_type: Option<&str>,
) -> anyhow::Result<(i64, f64, i64)> {
    let row = sqlx::query_as::<_, (i64, Option<f64>, i64)>(
        r#"
        SELECT COUNT(*), SUM(total_calories), COUNT(DISTINCT meal_date)
        FROM meal_records
        WHERE user_id = $1
          AND ($2::date IS NULL OR meal_date >= $2)
          AND ($3::date IS NULL OR meal_date <= $3)
          AND ($4::text IS NULL OR meal_type = $4)
        "#,
    )
    .bind(user_id)
    .bind(date_from)
    .bind(date_to)
    .bind(meal_type)
    .fetch_one(db)
    .await?;
    Ok((row.0, row.1.unwrap_or(0.0), row.2))
}

pub async fn details_for_meal(db: &PgPool, meal_id: Uuid) -> anyhow::Result<Vec<MealDetailRow>> {
    let rows = sqlx::query_as::<_, MealDetailRow>(
        r#"
        SELECT d.id, d.meal_id, f.name AS food_name, d.quantity_g,
               d.calculated_calories, d.confidence
        FROM meal_details d
        JOIN foods f ON f.id = d.food_id
        WHERE d.meal_id = $1
        ORDER BY d.created_at ASC
        "#,
    )
    .bind(meal_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn insert_detail_tx(
    tx: &mut Transaction<'_, Postgres>,
    meal_id: Uuid,
    food_id: Uuid,
    quantity_g: f64,
    calculated_calories: f64,
    confidence: f64,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO meal_details (id, meal_id, food_id, quantity_g, calculated_calories, confidence)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(meal_id)
    .bind(food_id)
    .bind(quantity_g)
    .bind(calculated_calories)
    .bind(confidence)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Look a food up by name, creating it in the fallback category with a
/// back-derived kcal/100g figure when absent.
pub async fn find_or_create_food(
    tx: &mut Transaction<'_, Postgres>,
    name: &str,
    calories_per_100g: f64,
) -> anyhow::Result<Uuid> {
    let existing = sqlx::query_scalar::<_, Uuid>("SELECT id FROM foods WHERE name = $1 LIMIT 1")
        .bind(name)
        .fetch_optional(&mut **tx)
        .await?;
    if let Some(id) = existing {
        return Ok(id);
    }

    let category_id = sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM food_categories WHERE name = 'other' LIMIT 1",
    )
    .fetch_one(&mut **tx)
    .await?;

    let id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO foods (id, name, category_id, calories_per_100g)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(category_id)
    .bind(calories_per_100g)
    .fetch_one(&mut **tx)
    .await?;
    Ok(id)
}
