use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use time::{Date, OffsetDateTime, Time};
use uuid::Uuid;

/// Catalog drink joined with its category name.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Drink {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub calories_per_100ml: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DrinkRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub drink_id: Uuid,
    pub drink_name: String,
    pub drink_date: Date,
    pub drink_time: Time,
    pub quantity_ml: i32,
    pub total_calories: f64,
    pub notes: String,
    pub created_at: OffsetDateTime,
}

pub async fn list_catalog(db: &PgPool) -> anyhow::Result<Vec<Drink>> {
    let drinks = sqlx::query_as::<_, Drink>(
        r#"
        SELECT d.id, d.name, c.name AS category, d.calories_per_100ml
        FROM drinks d
        JOIN drink_categories c ON c.id = d.category_id
        ORDER BY c.name ASC, d.name ASC
        "#,
    )
    .fetch_all(db)
    .await?;
    Ok(drinks)
}

pub async fn find_drink(db: &PgPool, drink_id: Uuid) -> anyhow::Result<Option<Drink>> {
    let drink = sqlx::query_as::<_, Drink>(
        r#"
        SELECT d.id, d.name, c.name AS category, d.calories_per_100ml
        FROM drinks d
        JOIN drink_categories c ON c.id = d.category_id
        WHERE d.id = $1
        "#,
    )
    .bind(drink_id)
    .fetch_optional(db)
    .await?;
    Ok(drink)
}

pub async fn insert_record(
    db: &PgPool,
    user_id: Uuid,
    drink_id: Uuid,
    quantity_ml: i32,
    total_calories: f64,
    notes: &str,
) -> anyhow::Result<DrinkRecord> {
    let record = sqlx::query_as::<_, DrinkRecord>(
        r#"
        WITH inserted AS (
            INSERT INTO drink_records (id, user_id, drink_id, quantity_ml, total_calories, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, drink_id, drink_date, drink_time, quantity_ml,
                      total_calories, notes, created_at
        )
        SELECT i.id, i.user_id, i.drink_id, d.name AS drink_name, i.drink_date, i.drink_time,
               i.quantity_ml, i.total_calories, i.notes, i.created_at
        FROM inserted i
        JOIN drinks d ON d.id = i.drink_id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(drink_id)
    .bind(quantity_ml)
    .bind(total_calories)
    .bind(notes)
    .fetch_one(db)
    .await?;
    Ok(record)
}

/// Transaction variant used when drink items are saved alongside a meal.
pub async fn insert_record_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    drink_id: Uuid,
    quantity_ml: i32,
    total_calories: f64,
    notes: &str,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO drink_records (id, user_id, drink_id, quantity_ml, total_calories, notes)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(drink_id)
    .bind(quantity_ml)
    .bind(total_calories)
    .bind(notes)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn find_or_create_drink_tx(
    tx: &mut Transaction<'_, Postgres>,
    name: &str,
    calories_per_100ml: f64,
) -> anyhow::Result<Uuid> {
    let existing = sqlx::query_scalar::<_, Uuid>("SELECT id FROM drinks WHERE name = $1 LIMIT 1")
        .bind(name)
        .fetch_optional(&mut **tx)
        .await?;
    if let Some(id) = existing {
        return Ok(id);
    }

    let category_id = sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM drink_categories WHERE name = 'other' LIMIT 1",
    )
    .fetch_one(&mut **tx)
    .await?;

    let id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO drinks (id, name, category_id, calories_per_100ml)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(category_id)
    .bind(calories_per_100ml)
    .fetch_one(&mut **tx)
    .await?;
    Ok(id)
}

/// Filtered, paginated drink history.
pub async fn list_history(
    db: &PgPool,
    user_id: Uuid,
    date_from: Option<Date>,
    date_to: Option<Date>,
    category: Option<&str>,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<DrinkRecord>> {
    let records = sqlx::query_as::<_, DrinkRecord>(
        r#"
        SELECT r.id, r.user_id, r.drink_id, d.name AS drink_name, r.drink_date, r.drink_time,
               r.quantity_ml, r.total_calories, r.notes, r.created_at
        FROM drink_records r
        JOIN drinks d ON d.id = r.drink_id
        JOIN drink_categories c ON c.id = d.category_id
        WHERE r.user_id = $1
          AND ($2::date IS NULL OR r.drink_date >= $2)
          AND ($3::date IS NULL OR r.drink_date <= $3)
          AND ($4::text IS NULL OR c.name = $4)
        ORDER BY r.drink_date DESC, r.drink_time DESC
        LIMIT $5 OFFSET $6
        "#,
    )
    .bind(user_id)
    .bind(date_from)
    .bind(date_to)
    .bind(category)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;
    Ok(records)
}

/// Aggregates for the same filters: (record count, calorie sum, volume sum, distinct days).
pub async fn history_stats(
    db: &PgPool,
    user_id: Uuid,
    date_from: Option<Date>,
    date_to: Option<Date>,
    category: Option<&str>,
) -> anyhow::Result<(i64, f64, i64, i64)> {
    let row = sqlx::query_as::<_, (i64, Option<f64>, Option<i64>, i64)>(
        r#"
        SELECT COUNT(*), SUM(r.total_calories), SUM(r.quantity_ml)::bigint,
               COUNT(DISTINCT r.drink_date)
        FROM drink_records r
        JOIN drinks d ON d.id = r.drink_id
        JOIN drink_categories c ON c.id = d.category_id
        WHERE r.user_id = $1
          AND ($2::date IS NULL OR r.drink_date >= $2)
          AND ($3::date IS NULL OR r.drink_date <= $3)
          AND ($4::text IS NULL OR c.name = $4)
        "#,
    )
    .bind(user_id)
    .bind(date_from)
    .bind(date_to)
    .bind(category)
    .fetch_one(db)
    .await?;
    Ok((row.0, row.1.unwrap_or(0.0), row.2.unwrap_or(0), row.3))
}
