//! `PUT /api/photos/upload?key=<path>`: raw-body photo and video upload.

use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap},
    Json,
};
use chronoframe_processing::{UploadDisposition, UploadRequest};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub key: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateWarning {
    pub title: String,
    pub message: String,
    pub existing_key: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub ok: bool,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<DuplicateWarning>,
}

pub async fn upload_photo(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<UploadResponse>, HttpAppError> {
    let declared_content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let content_length = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    let request = UploadRequest {
        key: query.key,
        body: Box::pin(body.into_data_stream().map_err(std::io::Error::other)),
        declared_content_type,
        content_length,
        acting_user: state.sessions.user_from_headers(&headers),
    };

    let outcome = state
        .pipeline
        .handle(request)
        .await
        .map_err(|e| HttpAppError::from(e).for_config(&state.config))?;

    let (skipped, warning) = match outcome.disposition {
        UploadDisposition::Stored(_) => (None, None),
        UploadDisposition::SkippedDuplicate => (Some(true), None),
        UploadDisposition::StoredDuplicate {
            ref existing_key, ..
        } => (
            None,
            Some(DuplicateWarning {
                title: "Duplicate file".to_string(),
                message: format!("The same file already exists at {}", existing_key),
                existing_key: existing_key.to_string(),
            }),
        ),
    };

    Ok(Json(UploadResponse {
        ok: true,
        key: outcome.key.into_string(),
        skipped,
        warning,
    }))
}
