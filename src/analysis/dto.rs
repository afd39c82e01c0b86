use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::normalize::NormalizedAnalysis;

/// JSON upload variant: raw image bytes in the request body.
#[derive(Debug, Deserialize)]
pub struct AnalyzeBytesRequest {
    pub image: serde_bytes::ByteBuf,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[serde(default)]
    pub original_name: Option<String>,
}

fn default_content_type() -> String {
    "image/jpeg".to_string()
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub analysis_id: Uuid,
    pub image_id: Uuid,
    pub data: NormalizedAnalysis,
}

#[derive(Debug, Serialize)]
pub struct QuickSaveResponse {
    pub meal_id: Uuid,
    pub total_calories: f64,
}

#[derive(Debug, Serialize)]
pub struct AnalysisSummary {
    pub analysis_id: Uuid,
    pub image_id: Uuid,
    pub data: NormalizedAnalysis,
    pub created_at: OffsetDateTime,
}
