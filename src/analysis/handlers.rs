use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use tracing::{error, instrument};
use uuid::Uuid;

use super::dto::{AnalysisSummary, AnalyzeBytesRequest, AnalyzeResponse, QuickSaveResponse};
use super::services::{self, AnalyzeError};
use crate::activity::{self, Action};
use crate::auth::jwt::AuthUser;
use crate::images::repo as images_repo;
use crate::images::services::{is_supported_image, presign_image, UploadImage};
use crate::state::AppState;
use crate::vision::VisionError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/images/analyze", post(analyze_multipart))
        .route("/images/analyze-b64", post(analyze_bytes))
        .route("/images/:id/photo", get(get_presigned_photo))
        .route("/analyses/:id", get(get_analysis))
        .route("/analyses/:id/save", post(quick_save_meal))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB
}

/// POST /images/analyze (multipart, field `image`)
#[instrument(skip(state, mp))]
pub async fn analyze_multipart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut mp: Multipart,
) -> Result<(StatusCode, Json<AnalyzeResponse>), (StatusCode, String)> {
    let mut upload: Option<UploadImage> = None;
    while let Ok(Some(field)) = mp.next_field().await {
        if field.name() == Some("image") {
            let original_name = field
                .file_name()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "upload".into());
            let content_type = field
                .content_type()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "application/octet-stream".into());
            let body = field.bytes().await.map_err(internal)?;
            upload = Some(UploadImage {
                body,
                content_type,
                original_name,
            });
        }
    }
    let Some(upload) = upload else {
        return Err((StatusCode::BAD_REQUEST, "image field is required".into()));
    };

    run_analysis(&state, user_id, upload).await
}

/// POST /images/analyze-b64 { image: <bytes>, content_type?, original_name? }
#[instrument(skip(state, body))]
pub async fn analyze_bytes(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<AnalyzeBytesRequest>,
) -> Result<(StatusCode, Json<AnalyzeResponse>), (StatusCode, String)> {
    if body.image.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "image is required".into()));
    }
    let upload = UploadImage {
        body: Bytes::from(body.image.into_vec()),
        content_type: body.content_type,
        original_name: body.original_name.unwrap_or_else(|| "upload".into()),
    };
    run_analysis(&state, user_id, upload).await
}

async fn run_analysis(
    state: &AppState,
    user_id: Uuid,
    upload: UploadImage,
) -> Result<(StatusCode, Json<AnalyzeResponse>), (StatusCode, String)> {
    if !is_supported_image(&upload.content_type) {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("unsupported image type: {}", upload.content_type),
        ));
    }

    match services::analyze_and_save(state, user_id, upload).await {
        Ok((analysis, normalized)) => Ok((
            StatusCode::CREATED,
            Json(AnalyzeResponse {
                success: true,
                analysis_id: analysis.id,
                image_id: analysis.image_id,
                data: normalized,
            }),
        )),
        Err(AnalyzeError::Vision(VisionError::ImageUnreadable(msg))) => {
            Err((StatusCode::BAD_REQUEST, msg))
        }
        Err(AnalyzeError::Vision(e)) => {
            error!(error = %e, %user_id, "analysis failed");
            Err((StatusCode::BAD_GATEWAY, "image analysis failed".into()))
        }
        Err(AnalyzeError::Other(e)) => {
            error!(error = %e, %user_id, "analyze flow failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

/// GET /analyses/:id
#[instrument(skip(state))]
pub async fn get_analysis(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<AnalysisSummary>, (StatusCode, String)> {
    let analysis = super::repo::find_for_user(&state.db, id, user_id)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "Analysis not found".into()))?;

    let data = services::normalized_from_stored(&analysis);
    Ok(Json(AnalysisSummary {
        analysis_id: analysis.id,
        image_id: analysis.image_id,
        data,
        created_at: analysis.created_at,
    }))
}

/// POST /analyses/:id/save — one-tap save of a stored analysis as a meal.
#[instrument(skip(state))]
pub async fn quick_save_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<QuickSaveResponse>), (StatusCode, String)> {
    let analysis = super::repo::find_for_user(&state.db, id, user_id)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "Analysis not found".into()))?;

    let meal = crate::meals::services::save_meal_from_stored(&state, user_id, &analysis)
        .await
        .map_err(|e| {
            error!(error = %e, %user_id, analysis_id = %id, "quick save failed");
            internal(e)
        })?;

    activity::record(
        &state.db,
        user_id,
        Action::QuickMealSaved,
        serde_json::json!({
            "meal_id": meal.id,
            "analysis_id": analysis.id,
            "total_calories": meal.total_calories,
        }),
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(QuickSaveResponse {
            meal_id: meal.id,
            total_calories: meal.total_calories,
        }),
    ))
}

/// 302 → presigned url of the stored photo
#[instrument(skip(state))]
pub async fn get_presigned_photo(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let image = match images_repo::find_for_user(&state.db, id, user_id).await {
        Ok(Some(image)) => image,
        Ok(None) => return (StatusCode::NOT_FOUND, "Photo not found").into_response(),
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };

    let Ok(url) = presign_image(&state, &image).await else {
        return (StatusCode::INTERNAL_SERVER_ERROR, "presign failed").into_response();
    };

    Redirect::temporary(&url).into_response()
}

fn internal<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
