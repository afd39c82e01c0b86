//! Append-only per-user activity log. Writes are best-effort: a failed
//! insert must never fail the request that triggered it.

use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Login,
    MealAdded,
    DrinkAdded,
    PhotoUploaded,
    AnalysisRequested,
    SettingsUpdated,
    QuickMealSaved,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Login => "login",
            Action::MealAdded => "meal_added",
            Action::DrinkAdded => "drink_added",
            Action::PhotoUploaded => "photo_uploaded",
            Action::AnalysisRequested => "analysis_requested",
            Action::SettingsUpdated => "settings_updated",
            Action::QuickMealSaved => "quick_meal_saved",
        }
    }
}

pub async fn record(db: &PgPool, user_id: Uuid, action: Action, details: serde_json::Value) {
    let result = sqlx::query(
        r#"
        INSERT INTO activity_log (id, user_id, action, details)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(action.as_str())
    .bind(details)
    .execute(db)
    .await;

    if let Err(e) = result {
        warn!(error = %e, %user_id, action = action.as_str(), "activity log write failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_names_are_stable() {
        assert_eq!(Action::Login.as_str(), "login");
        assert_eq!(Action::MealAdded.as_str(), "meal_added");
        assert_eq!(Action::AnalysisRequested.as_str(), "analysis_requested");
        assert_eq!(Action::QuickMealSaved.as_str(), "quick_meal_saved");
    }
}
