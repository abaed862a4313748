//! Admin image upload handler.

use axum::{
    extract::{Multipart, State},
    response::IntoResponse,
};
use serde::Serialize;
use tracing::{info, instrument};

use super::ok;
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::services::uploads::{MAX_IMAGES_PER_UPLOAD, UploadError};
use crate::state::AppState;

/// Hosted image URLs, in upload order.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub urls: Vec<String>,
}

/// Upload catalog or banner images to Cloudinary.
///
/// POST /api/uploads (multipart, every file field is uploaded)
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn upload(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let cloudinary = state.cloudinary().ok_or(UploadError::NotConfigured)?;

    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if field.file_name().is_none() {
            continue;
        }
        if files.len() == MAX_IMAGES_PER_UPLOAD {
            return Err(UploadError::TooMany {
                max: MAX_IMAGES_PER_UPLOAD,
            }
            .into());
        }
        files.push(field.bytes().await?.to_vec());
    }
    if files.is_empty() {
        return Err(UploadError::Missing.into());
    }

    let mut urls = Vec::with_capacity(files.len());
    for file in files {
        urls.push(cloudinary.upload(file).await?);
    }

    info!(count = urls.len(), "Images uploaded");
    Ok(ok(UploadResponse { urls }))
}
