//! Food catalog lookups used by the manual-entry UI.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use tracing::instrument;
use uuid::Uuid;

use crate::auth::jwt::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/foods/suggestions", get(food_suggestions))
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FoodSuggestion {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub calories_per_100g: f64,
    pub protein_per_100g: f64,
    pub carbs_per_100g: f64,
    pub fat_per_100g: f64,
}

#[derive(Debug, Deserialize)]
pub struct SuggestionQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct SuggestionsResponse {
    pub suggestions: Vec<FoodSuggestion>,
}

pub async fn search_foods(db: &PgPool, query: &str, limit: i64) -> anyhow::Result<Vec<FoodSuggestion>> {
    let rows = sqlx::query_as::<_, FoodSuggestion>(
        r#"
        SELECT f.id, f.name, c.name AS category, f.calories_per_100g,
               f.protein_per_100g, f.carbs_per_100g, f.fat_per_100g
        FROM foods f
        JOIN food_categories c ON c.id = f.category_id
        WHERE f.name ILIKE '%' || $1 || '%'
        ORDER BY f.name ASC
        LIMIT $2
        "#,
    )
    .bind(query)
    .bind(limit)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// GET /foods/suggestions?q= — case-insensitive substring lookup.
#[instrument(skip(state))]
pub async fn food_suggestions(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Query(q): Query<SuggestionQuery>,
) -> Result<Json<SuggestionsResponse>, (StatusCode, String)> {
    if q.q.trim().is_empty() {
        return Ok(Json(SuggestionsResponse {
            suggestions: Vec::new(),
        }));
    }

    let suggestions = search_foods(&state.db, q.q.trim(), 10)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(SuggestionsResponse { suggestions }))
}
