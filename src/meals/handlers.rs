use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tracing::{error, instrument};
use uuid::Uuid;

use super::dto::{
    CreateMealRequest, CreatedMealResponse, HistoryQuery, MealAnalysisView, MealDetailsResponse,
    MealHistoryResponse, MealItemView, MealListItem, SaveMealRequest,
};
use super::repo;
use super::services;
use crate::activity::{self, Action};
use crate::analysis::repo as analysis_repo;
use crate::auth::jwt::AuthUser;
use crate::state::AppState;

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/meals", get(meal_history))
        .route("/meals/:id", get(get_meal))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/meals", post(create_meal))
        .route("/meals/from-analysis", post(save_meal_from_analysis))
}

/// POST /meals — manual entry with an estimated calorie figure.
#[instrument(skip(state, body))]
pub async fn create_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<CreateMealRequest>,
) -> Result<(StatusCode, HeaderMap, Json<CreatedMealResponse>), (StatusCode, String)> {
    let meal = services::create_manual_meal(&state, user_id, &body)
        .await
        .map_err(internal)?;

    activity::record(
        &state.db,
        user_id,
        Action::MealAdded,
        json!({
            "meal_id": meal.id,
            "meal_type": meal.meal_type,
            "estimated_calories": meal.total_calories,
        }),
    )
    .await;

    Ok(created_response(meal.id, meal.created_at))
}

/// POST /meals/from-analysis — confirmed items from an analysis become a
/// meal with detail rows (and drink records for drink items).
#[instrument(skip(state, body))]
pub async fn save_meal_from_analysis(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<SaveMealRequest>,
) -> Result<(StatusCode, HeaderMap, Json<CreatedMealResponse>), (StatusCode, String)> {
    if body.total_calories <= 0.0 {
        return Err((
            StatusCode::BAD_REQUEST,
            "total calories must be greater than 0".into(),
        ));
    }

    let meal = services::save_meal_with_items(&state, user_id, &body)
        .await
        .map_err(|e| {
            error!(error = %e, %user_id, "save meal failed");
            (StatusCode::BAD_REQUEST, e.to_string())
        })?;

    activity::record(
        &state.db,
        user_id,
        Action::MealAdded,
        json!({
            "meal_id": meal.id,
            "meal_type": meal.meal_type,
            "total_calories": meal.total_calories,
            "items_count": body.items.len(),
        }),
    )
    .await;

    Ok(created_response(meal.id, meal.created_at))
}

/// GET /meals — filtered history plus aggregate figures.
#[instrument(skip(state))]
pub async fn meal_history(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<MealHistoryResponse>, (StatusCode, String)> {
    let date_from = parse_optional_date(q.date_from.as_deref())?;
    let date_to = parse_optional_date(q.date_to.as_deref())?;
    let meal_type = q.meal_type.map(|t| t.as_str());

    let meals = repo::list_history(
        &state.db,
        user_id,
        date_from,
        date_to,
        meal_type,
        q.limit,
        q.offset,
    )
    .await
    .map_err(internal)?;

    let (total_meals, total_calories, days_count) =
        repo::history_stats(&state.db, user_id, date_from, date_to, meal_type)
            .await
            .map_err(internal)?;

    let avg_calories = if total_meals > 0 {
        total_calories / total_meals as f64
    } else {
        0.0
    };

    Ok(Json(MealHistoryResponse {
        meals: meals
            .into_iter()
            .map(|m| MealListItem {
                id: m.id,
                meal_date: m.meal_date,
                meal_time: m.meal_time,
                meal_type: m.meal_type,
                total_calories: m.total_calories,
                notes: m.notes,
                image_id: m.image_id,
                created_at: m.created_at,
            })
            .collect(),
        total_meals,
        total_calories,
        avg_calories,
        days_count,
    }))
}

/// GET /meals/:id — the meal, its item rows and the linked analysis.
#[instrument(skip(state))]
pub async fn get_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MealDetailsResponse>, (StatusCode, String)> {
    let meal = repo::find_for_user(&state.db, id, user_id)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "Meal not found".to_string()))?;

    let items = repo::details_for_meal(&state.db, meal.id)
        .await
        .map_err(internal)?
        .into_iter()
        .map(|d| MealItemView {
            name: d.food_name,
            quantity_g: d.quantity_g,
            calories: d.calculated_calories,
            confidence: d.confidence,
        })
        .collect();

    let analysis = match meal.image_id {
        Some(image_id) => analysis_repo::find_by_image(&state.db, image_id)
            .await
            .map_err(internal)?
            .map(|a| MealAnalysisView {
                analysis_id: a.id,
                calculated_calories: a.calculated_calories,
                confidence_score: a.confidence_score,
            }),
        None => None,
    };

    Ok(Json(MealDetailsResponse {
        id: meal.id,
        meal_date: meal.meal_date,
        meal_time: meal.meal_time,
        meal_type: meal.meal_type,
        total_calories: meal.total_calories,
        notes: meal.notes,
        image_id: meal.image_id,
        items,
        analysis,
        created_at: meal.created_at,
    }))
}

fn parse_optional_date(
    value: Option<&str>,
) -> Result<Option<time::Date>, (StatusCode, String)> {
    match value {
        None => Ok(None),
        Some(s) => services::parse_date(s)
            .map(Some)
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string())),
    }
}

fn created_response(
    id: Uuid,
    created_at: time::OffsetDateTime,
) -> (StatusCode, HeaderMap, Json<CreatedMealResponse>) {
    let mut headers = HeaderMap::new();
    if let Ok(location) = format!("/api/v1/meals/{}", id).parse() {
        headers.insert(axum::http::header::LOCATION, location);
    }
    (
        StatusCode::CREATED,
        headers,
        Json(CreatedMealResponse { id, created_at }),
    )
}

fn internal<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
