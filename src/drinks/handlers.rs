use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tracing::{error, instrument};

use super::dto::{
    drink_calories, CreateDrinkRecordRequest, DrinkHistoryQuery, DrinkHistoryResponse,
    DrinkRecordResponse,
};
use super::repo::{self, Drink};
use crate::activity::{self, Action};
use crate::auth::jwt::AuthUser;
use crate::meals::services::parse_date;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/drinks/catalog", get(list_catalog))
        .route("/drinks", post(create_record).get(drink_history))
}

/// GET /drinks/catalog — ordered by category then name.
#[instrument(skip(state))]
pub async fn list_catalog(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
) -> Result<Json<Vec<Drink>>, (StatusCode, String)> {
    let drinks = repo::list_catalog(&state.db).await.map_err(internal)?;
    Ok(Json(drinks))
}

/// POST /drinks — log a poured drink; calories derive from the catalog figure.
#[instrument(skip(state, body))]
pub async fn create_record(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<CreateDrinkRecordRequest>,
) -> Result<(StatusCode, Json<DrinkRecordResponse>), (StatusCode, String)> {
    if body.quantity_ml <= 0 {
        return Err((
            StatusCode::BAD_REQUEST,
            "quantity_ml must be greater than 0".into(),
        ));
    }

    let drink = repo::find_drink(&state.db, body.drink_id)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::BAD_REQUEST, "Unknown drink".to_string()))?;

    let total_calories = drink_calories(body.quantity_ml as f64, drink.calories_per_100ml);
    let record = repo::insert_record(
        &state.db,
        user_id,
        drink.id,
        body.quantity_ml,
        total_calories,
        body.notes.as_deref().unwrap_or(""),
    )
    .await
    .map_err(|e| {
        error!(error = %e, %user_id, "create drink record failed");
        internal(e)
    })?;

    activity::record(
        &state.db,
        user_id,
        Action::DrinkAdded,
        json!({
            "drink_id": drink.id,
            "quantity_ml": body.quantity_ml,
            "calories": total_calories,
        }),
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(DrinkRecordResponse {
            id: record.id,
            drink_id: record.drink_id,
            drink_name: record.drink_name,
            quantity_ml: record.quantity_ml,
            total_calories: record.total_calories,
            drink_date: record.drink_date,
            drink_time: record.drink_time,
            notes: record.notes,
        }),
    ))
}

/// GET /drinks — filtered history plus aggregate figures.
#[instrument(skip(state))]
pub async fn drink_history(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<DrinkHistoryQuery>,
) -> Result<Json<DrinkHistoryResponse>, (StatusCode, String)> {
    let date_from = match q.date_from.as_deref() {
        Some(s) => Some(parse_date(s).map_err(bad_request)?),
        None => None,
    };
    let date_to = match q.date_to.as_deref() {
        Some(s) => Some(parse_date(s).map_err(bad_request)?),
        None => None,
    };

    let records = repo::list_history(
        &state.db,
        user_id,
        date_from,
        date_to,
        q.category.as_deref(),
        q.limit,
        q.offset,
    )
    .await
    .map_err(internal)?;

    let (total_drinks, total_calories, total_volume_ml, days_count) =
        repo::history_stats(&state.db, user_id, date_from, date_to, q.category.as_deref())
            .await
            .map_err(internal)?;

    let avg_drink_calories = if total_drinks > 0 {
        total_calories / total_drinks as f64
    } else {
        0.0
    };

    Ok(Json(DrinkHistoryResponse {
        drinks: records
            .into_iter()
            .map(|r| DrinkRecordResponse {
                id: r.id,
                drink_id: r.drink_id,
                drink_name: r.drink_name,
                quantity_ml: r.quantity_ml,
                total_calories: r.total_calories,
                drink_date: r.drink_date,
                drink_time: r.drink_time,
                notes: r.notes,
            })
            .collect(),
        total_drinks,
        total_calories,
        total_volume_ml,
        avg_drink_calories,
        days_count,
    }))
}

fn internal<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

fn bad_request<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, e.to_string())
}
