use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Historical record of one successful vision analysis. One-to-one with
/// its image; written once, never updated.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ImageAnalysis {
    pub id: Uuid,
    pub image_id: Uuid,
    pub prompt_sent: String,
    pub response_received: String,
    pub identified_foods: serde_json::Value,
    pub calculated_calories: f64,
    pub confidence_score: f64,
    pub created_at: OffsetDateTime,
}

#[allow(clippy::too_many_arguments)]
pub async fn insert(
    db: &PgPool,
    image_id: Uuid,
    prompt_sent: &str,
    response_received: &str,
    identified_foods: serde_json::Value,
    calculated_calories: f64,
    confidence_score: f64,
) -> anyhow::Result<ImageAnalysis> {
    let analysis = sqlx::query_as::<_, ImageAnalysis>(
        r#"
        INSERT INTO image_analyses
            (id, image_id, prompt_sent, response_received, identified_foods,
             calculated_calories, confidence_score)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, image_id, prompt_sent, response_received, identified_foods,
                  calculated_calories, confidence_score, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(image_id)
    .bind(prompt_sent)
    .bind(response_received)
    .bind(identified_foods)
    .bind(calculated_calories)
    .bind(confidence_score)
    .fetch_one(db)
    .await?;
    Ok(analysis)
}

pub async fn find_by_image(db: &PgPool, image_id: Uuid) -> anyhow::Result<Option<ImageAnalysis>> {
    let analysis = sqlx::query_as::<_, ImageAnalysis>(
        r#"
        SELECT id, image_id, prompt_sent, response_received, identified_foods,
               calculated_calories, confidence_score, created_at
        FROM image_analyses
        WHERE image_id = $1
        "#,
    )
    .bind(image_id)
    .fetch_optional(db)
    .await?;
    Ok(analysis)
}

/// Fetch an analysis only if the underlying image belongs to the user.
pub async fn find_for_user(
    db: &PgPool,
    analysis_id: Uuid,
    user_id: Uuid,
) -> anyhow::Result<Option<ImageAnalysis>> {
    let analysis = sqlx::query_as::<_, ImageAnalysis>(
        r#"
        SELECT a.id, a.image_id, a.prompt_sent, a.response_received, a.identified_foods,
               a.calculated_calories, a.confidence_score, a.created_at
        FROM image_analyses a
        JOIN meal_images i ON i.id = a.image_id
        WHERE a.id = $1 AND i.user_id = $2
        "#,
    )
    .bind(analysis_id)
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(analysis)
}
