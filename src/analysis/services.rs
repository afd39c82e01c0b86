use anyhow::Context;
use serde_json::json;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::normalize::{self, NormalizedAnalysis};
use super::repo::{self, ImageAnalysis};
use crate::activity::{self, Action};
use crate::images::services::{self as images, UploadImage};
use crate::state::AppState;
use crate::vision::{pipeline, VisionError};

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("{0}")]
    Vision(#[from] VisionError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Full analyze flow for one uploaded photo: store it, run the vision
/// pipeline, persist the analysis, return the display shape.
///
/// Vision failures delete the freshly stored image so no orphaned record
/// is left behind, then propagate to the caller.
pub async fn analyze_and_save(
    st: &AppState,
    user_id: Uuid,
    upload: UploadImage,
) -> Result<(ImageAnalysis, NormalizedAnalysis), AnalyzeError> {
    let image = images::store_image(st, user_id, &upload)
        .await
        .context("store image")?;
    activity::record(
        &st.db,
        user_id,
        Action::PhotoUploaded,
        json!({ "image_id": image.id, "file_size": image.file_size }),
    )
    .await;

    // read the stored bytes back; an unreadable image fails before any
    // network call
    let bytes = match st.storage.get_object(&image.s3_key).await {
        Ok(bytes) => bytes,
        Err(e) => {
            if let Err(del) = images::delete_image(st, &image).await {
                warn!(error = %del, image_id = %image.id, "cleanup of unreadable image failed");
            }
            error!(error = %e, image_id = %image.id, "stored image unreadable");
            return Err(VisionError::ImageUnreadable(e.to_string()).into());
        }
    };

    let outcome = match pipeline::analyze_image(
        st.vision.as_ref(),
        &bytes,
        &image.mime_type,
        st.config.openai.max_tokens,
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            // compensating cleanup: the image row must not outlive a failed analysis
            if let Err(del) = images::delete_image(st, &image).await {
                warn!(error = %del, image_id = %image.id, "cleanup of orphaned image failed");
            }
            error!(error = %e, image_id = %image.id, "vision analysis failed");
            return Err(e.into());
        }
    };

    let normalized = normalize::normalize(&outcome.raw);

    let identified_foods =
        serde_json::to_value(&outcome.raw.foods).context("serialize identified foods")?;
    let analysis = repo::insert(
        &st.db,
        image.id,
        &outcome.prompt_sent,
        &outcome.response_received,
        identified_foods,
        normalized.total_calories,
        outcome.raw.analysis_confidence,
    )
    .await
    .context("persist analysis")?;

    activity::record(
        &st.db,
        user_id,
        Action::AnalysisRequested,
        json!({
            "image_id": image.id,
            "analysis_id": analysis.id,
            "stage": outcome.stage,
            "calories_found": normalized.total_calories,
        }),
    )
    .await;

    info!(
        analysis_id = %analysis.id,
        image_id = %image.id,
        stage = ?outcome.stage,
        total_calories = normalized.total_calories,
        "analysis stored"
    );
    Ok((analysis, normalized))
}

/// Re-derive the display shape from a stored analysis.
pub fn normalized_from_stored(analysis: &ImageAnalysis) -> NormalizedAnalysis {
    let foods = serde_json::from_value(analysis.identified_foods.clone()).unwrap_or_default();
    // notes only survive inside the raw response text
    let notes = serde_json::from_str::<serde_json::Value>(&analysis.response_received)
        .ok()
        .and_then(|v| v.get("notes").and_then(|n| n.as_str()).map(str::to_string))
        .unwrap_or_default();
    normalize::normalize(&crate::vision::RawAnalysis {
        foods,
        total_calories: analysis.calculated_calories,
        analysis_confidence: analysis.confidence_score,
        notes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::RawFood;
    use time::OffsetDateTime;

    #[test]
    fn stored_analysis_round_trips_into_display_shape() {
        let foods = vec![RawFood {
            name: "apple".into(),
            estimated_grams: 150.0,
            calories_per_100g: 52.0,
            confidence: 0.9,
        }];
        let analysis = ImageAnalysis {
            id: Uuid::new_v4(),
            image_id: Uuid::new_v4(),
            prompt_sent: "prompt".into(),
            response_received: r#"{"foods":[],"total_calories":78,"analysis_confidence":0.9,"notes":"one apple"}"#.into(),
            identified_foods: serde_json::to_value(&foods).unwrap(),
            calculated_calories: 78.0,
            confidence_score: 0.9,
            created_at: OffsetDateTime::UNIX_EPOCH,
        };
        let normalized = normalized_from_stored(&analysis);
        assert_eq!(normalized.foods.len(), 1);
        assert_eq!(normalized.total_calories, 78.0);
        assert_eq!(normalized.analysis_confidence, 0.9);
        assert_eq!(normalized.notes, "one apple");
    }

    #[test]
    fn unparseable_stored_foods_degrade_to_empty() {
        let analysis = ImageAnalysis {
            id: Uuid::new_v4(),
            image_id: Uuid::new_v4(),
            prompt_sent: "prompt".into(),
            response_received: "not json".into(),
            identified_foods: serde_json::json!("garbage"),
            calculated_calories: 10.0,
            confidence_score: 0.5,
            created_at: OffsetDateTime::UNIX_EPOCH,
        };
        let normalized = normalized_from_stored(&analysis);
        assert!(normalized.foods.is_empty());
        assert_eq!(normalized.total_calories, 0.0);
    }
}
