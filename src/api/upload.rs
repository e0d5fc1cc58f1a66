//! Upload API endpoints
//!
//! - POST /api/v1/upload/image - multipart field `file`, authenticated

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};

use crate::api::common::{ok, ApiOk};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::services::UploadedImage;

/// Room for the multipart framing around the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build the upload router. `max_file_size` lifts axum's default body limit
/// so the service can report oversize files itself.
pub fn router(max_file_size: u64) -> Router<AppState> {
    let limit = usize::try_from(max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/image", post(upload_image))
        .layer(DefaultBodyLimit::max(limit))
}

async fn upload_image(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiOk<UploadedImage>>), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation_error(format!("Failed to read multipart: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation_error(format!("Failed to read file: {}", e)))?;

        let image = state.upload_service.store(&content_type, data.to_vec()).await?;
        tracing::debug!(user_id = user.id, url = %image.url, "Upload stored");
        return Ok((StatusCode::CREATED, ok(image)));
    }

    Err(ApiError::validation_error("No file provided"))
}
