use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::{Date, Duration, OffsetDateTime};
use tracing::instrument;

use super::repo::{self, UserSettings};
use crate::activity::{self, Action};
use crate::analysis::normalize::round2;
use crate::auth::jwt::AuthUser;
use crate::drinks::repo::DrinkRecord;
use crate::meals::repo::MealRecord;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/statistics", get(statistics))
        .route("/settings", get(get_settings).put(update_settings))
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub today: Date,
    pub daily_calorie_goal: i32,
    pub total_calories: f64,
    pub total_meal_calories: f64,
    pub total_drink_calories: f64,
    pub remaining_calories: f64,
    pub percentage_used: f64,
    pub weekly_calories: f64,
    pub recent_meals: Vec<MealRecord>,
    pub recent_drinks: Vec<DrinkRecord>,
}

/// GET /dashboard — today's intake against the daily goal.
#[instrument(skip(state))]
pub async fn dashboard(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<DashboardResponse>, (StatusCode, String)> {
    let settings = repo::ensure_settings(&state.db, user_id, None)
        .await
        .map_err(internal)?;

    let today = OffsetDateTime::now_utc().date();
    let total_meal_calories = repo::meal_calories_between(&state.db, user_id, today, today)
        .await
        .map_err(internal)?;
    let total_drink_calories = repo::drink_calories_between(&state.db, user_id, today, today)
        .await
        .map_err(internal)?;
    let total_calories = total_meal_calories + total_drink_calories;

    let goal = settings.daily_calorie_goal as f64;
    let remaining_calories = goal - total_calories;
    let percentage_used = if goal > 0.0 {
        (total_calories / goal * 1000.0).round() / 10.0
    } else {
        0.0
    };

    let week_start = today - Duration::days(today.weekday().number_days_from_monday() as i64);
    let weekly_calories = repo::meal_calories_between(&state.db, user_id, week_start, today)
        .await
        .map_err(internal)?;

    let recent_meals = repo::recent_meals_on(&state.db, user_id, today, 5)
        .await
        .map_err(internal)?;
    let recent_drinks = repo::recent_drinks_on(&state.db, user_id, today, 5)
        .await
        .map_err(internal)?;

    Ok(Json(DashboardResponse {
        today,
        daily_calorie_goal: settings.daily_calorie_goal,
        total_calories,
        total_meal_calories,
        total_drink_calories,
        remaining_calories,
        percentage_used,
        weekly_calories,
        recent_meals,
        recent_drinks,
    }))
}

#[derive(Debug, Deserialize)]
pub struct StatisticsQuery {
    #[serde(default = "default_days")]
    pub days: i64,
}

fn default_days() -> i64 {
    30
}

#[derive(Debug, Serialize)]
pub struct MealTypeStats {
    pub meal_type: String,
    pub count: i64,
    pub total_calories: f64,
}

#[derive(Debug, Serialize)]
pub struct StatisticsResponse {
    pub days: i64,
    pub start_date: Date,
    pub end_date: Date,
    pub total_calories: f64,
    pub total_meal_calories: f64,
    pub total_drink_calories: f64,
    pub avg_daily_calories: f64,
    pub total_meals: i64,
    pub total_drinks: i64,
    pub meals_by_type: Vec<MealTypeStats>,
}

/// GET /statistics?days=30 — trailing-window intake summary.
#[instrument(skip(state))]
pub async fn statistics(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<StatisticsQuery>,
) -> Result<Json<StatisticsResponse>, (StatusCode, String)> {
    let days = q.days.clamp(1, 365);
    let end_date = OffsetDateTime::now_utc().date();
    let start_date = end_date - Duration::days(days);

    let total_meal_calories =
        repo::meal_calories_between(&state.db, user_id, start_date, end_date)
            .await
            .map_err(internal)?;
    let total_drink_calories =
        repo::drink_calories_between(&state.db, user_id, start_date, end_date)
            .await
            .map_err(internal)?;
    let total_calories = total_meal_calories + total_drink_calories;

    let total_meals = repo::count_meals_between(&state.db, user_id, start_date, end_date)
        .await
        .map_err(internal)?;
    let total_drinks = repo::count_drinks_between(&state.db, user_id, start_date, end_date)
        .await
        .map_err(internal)?;

    let meals_by_type = repo::meals_by_type_between(&state.db, user_id, start_date, end_date)
        .await
        .map_err(internal)?
        .into_iter()
        .map(|(meal_type, count, total_calories)| MealTypeStats {
            meal_type,
            count,
            total_calories,
        })
        .collect();

    Ok(Json(StatisticsResponse {
        days,
        start_date,
        end_date,
        total_calories,
        total_meal_calories,
        total_drink_calories,
        avg_daily_calories: round2(total_calories / days as f64),
        total_meals,
        total_drinks,
        meals_by_type,
    }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    pub daily_calorie_goal: i32,
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,
    #[serde(default = "default_theme")]
    pub ui_theme: String,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_true() -> bool {
    true
}
fn default_theme() -> String {
    "light".to_string()
}
fn default_language() -> String {
    "es".to_string()
}

/// GET /settings — creates the row with defaults on first access.
#[instrument(skip(state))]
pub async fn get_settings(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UserSettings>, (StatusCode, String)> {
    let settings = repo::ensure_settings(&state.db, user_id, None)
        .await
        .map_err(internal)?;
    Ok(Json(settings))
}

/// PUT /settings/update
#[instrument(skip(state, body))]
pub async fn update_settings(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<UpdateSettingsRequest>,
) -> Result<Json<UserSettings>, (StatusCode, String)> {
    validate_settings(&body).map_err(|msg| (StatusCode::BAD_REQUEST, msg))?;

    let settings = repo::update_settings(
        &state.db,
        user_id,
        body.daily_calorie_goal,
        body.notifications_enabled,
        &body.ui_theme,
        &body.language,
    )
    .await
    .map_err(internal)?;

    activity::record(
        &state.db,
        user_id,
        Action::SettingsUpdated,
        json!({ "daily_calorie_goal": body.daily_calorie_goal }),
    )
    .await;

    Ok(Json(settings))
}

fn validate_settings(body: &UpdateSettingsRequest) -> Result<(), String> {
    if !(500..=5000).contains(&body.daily_calorie_goal) {
        return Err("daily_calorie_goal must be between 500 and 5000".into());
    }
    if !matches!(body.ui_theme.as_str(), "light" | "dark") {
        return Err("ui_theme must be light or dark".into());
    }
    if !matches!(body.language.as_str(), "es" | "en") {
        return Err("language must be es or en".into());
    }
    Ok(())
}

fn internal<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(goal: i32, theme: &str, language: &str) -> UpdateSettingsRequest {
        UpdateSettingsRequest {
            daily_calorie_goal: goal,
            notifications_enabled: true,
            ui_theme: theme.into(),
            language: language.into(),
        }
    }

    #[test]
    fn settings_validation_bounds_goal_and_enums() {
        assert!(validate_settings(&request(1000, "light", "es")).is_ok());
        assert!(validate_settings(&request(500, "dark", "en")).is_ok());
        assert!(validate_settings(&request(499, "light", "es")).is_err());
        assert!(validate_settings(&request(5001, "light", "es")).is_err());
        assert!(validate_settings(&request(1000, "sepia", "es")).is_err());
        assert!(validate_settings(&request(1000, "light", "fr")).is_err());
    }
}
