use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Metadata row for one uploaded meal photo; bytes live in object storage.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MealImage {
    pub id: Uuid,
    pub user_id: Uuid,
    pub s3_key: String,
    pub original_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub created_at: OffsetDateTime,
}

pub async fn insert(
    db: &PgPool,
    id: Uuid,
    user_id: Uuid,
    s3_key: &str,
    original_name: &str,
    file_size: i64,
    mime_type: &str,
) -> anyhow::Result<MealImage> {
    let image = sqlx::query_as::<_, MealImage>(
        r#"
        INSERT INTO meal_images (id, user_id, s3_key, original_name, file_size, mime_type)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, user_id, s3_key, original_name, file_size, mime_type, created_at
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(s3_key)
    .bind(original_name)
    .bind(file_size)
    .bind(mime_type)
    .fetch_one(db)
    .await?;
    Ok(image)
}

pub async fn find_for_user(
    db: &PgPool,
    image_id: Uuid,
    user_id: Uuid,
) -> anyhow::Result<Option<MealImage>> {
    let image = sqlx::query_as::<_, MealImage>(
        r#"
        SELECT id, user_id, s3_key, original_name, file_size, mime_type, created_at
        FROM meal_images
        WHERE id = $1 AND user_id = $2
        "#,
    )
    .bind(image_id)
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(image)
}

pub async fn delete(db: &PgPool, image_id: Uuid) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM meal_images WHERE id = $1")
        .bind(image_id)
        .execute(db)
        .await?;
    Ok(())
}
