use anyhow::Context;
use bytes::Bytes;
use tracing::warn;
use uuid::Uuid;

use super::repo::{self, MealImage};
use crate::state::AppState;

pub struct UploadImage {
    pub body: Bytes,
    pub content_type: String,
    pub original_name: String,
}

/// MIME types the analysis pipeline accepts.
pub fn is_supported_image(content_type: &str) -> bool {
    matches!(
        content_type,
        "image/jpeg" | "image/jpg" | "image/png" | "image/webp"
    )
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

/// Upload the photo to object storage and create its metadata row.
pub async fn store_image(
    st: &AppState,
    user_id: Uuid,
    upload: &UploadImage,
) -> anyhow::Result<MealImage> {
    anyhow::ensure!(!upload.body.is_empty(), "image payload is empty");

    let id = Uuid::new_v4();
    let ext = ext_from_mime(&upload.content_type).unwrap_or("bin");
    let key = format!("images/{}/{}.{}", user_id, id, ext);

    st.storage
        .put_object(&key, upload.body.clone(), &upload.content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;

    let image = repo::insert(
        &st.db,
        id,
        user_id,
        &key,
        &upload.original_name,
        upload.body.len() as i64,
        &upload.content_type,
    )
    .await?;

    Ok(image)
}

/// Remove the row and the stored object. Used by the analysis-failure
/// cleanup path; a failed object delete is logged, not propagated, so the
/// row is always gone.
pub async fn delete_image(st: &AppState, image: &MealImage) -> anyhow::Result<()> {
    if let Err(e) = st.storage.delete_object(&image.s3_key).await {
        warn!(error = %e, key = %image.s3_key, "failed to delete stored object");
    }
    repo::delete(&st.db, image.id).await
}

pub async fn presign_image(st: &AppState, image: &MealImage) -> anyhow::Result<String> {
    const TTL_SECS: u64 = 30 * 60;
    st.storage
        .presign_get(&image.s3_key, TTL_SECS)
        .await
        .with_context(|| format!("presign url for s3_key {}", image.s3_key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("image/heic"), Some("heic"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
        assert_eq!(ext_from_mime("whatever/else"), None);
    }

    #[test]
    fn analysis_accepts_only_photo_mime_types() {
        assert!(is_supported_image("image/jpeg"));
        assert!(is_supported_image("image/png"));
        assert!(is_supported_image("image/webp"));
        assert!(!is_supported_image("image/gif"));
        assert!(!is_supported_image("application/pdf"));
    }

    #[tokio::test]
    async fn presign_uses_the_stored_key() {
        let state = crate::state::AppState::fake();
        let image = MealImage {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            s3_key: "images/u/i.jpg".into(),
            original_name: "lunch.jpg".into(),
            file_size: 123,
            mime_type: "image/jpeg".into(),
            created_at: time::OffsetDateTime::UNIX_EPOCH,
        };
        let url = presign_image(&state, &image).await.unwrap();
        assert!(url.contains("images/u/i.jpg"));
    }
}
