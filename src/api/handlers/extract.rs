use crate::AppState;
use crate::api::error::AppError;
use crate::services::extraction::{AudioPayload, DeliveryMode, ExtractionRequest};
use crate::utils::validation::{validate_bucket_name, validate_object_key};
use axum::{
    Json,
    body::Body,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Deserialize, ToSchema, Validate)]
pub struct ExtractAudioRequest {
    /// Object key of the video (or of its first segment)
    #[validate(
        length(min = 1, message = "video_path must not be empty"),
        custom(function = "validate_object_key")
    )]
    pub video_path: String,
    /// One of `mp3`, `wav`, `flac`; defaults to the configured format
    pub audio_format: Option<String>,
    /// Defaults to the configured bucket
    #[validate(custom(function = "validate_bucket_name"))]
    pub bucket_name: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExtractAudioQuery {
    /// `stream` (default) or `buffer`
    pub mode: Option<DeliveryMode>,
}

#[utoipa::path(
    post,
    path = "/extract-audio",
    request_body = ExtractAudioRequest,
    params(ExtractAudioQuery),
    responses(
        (status = 200, description = "Extracted audio bytes (audio/mpeg, audio/wav or audio/flac)"),
        (status = 400, description = "Invalid format or malformed request", body = crate::api::error::ErrorResponse),
        (status = 404, description = "Video or one of its segments not found", body = crate::api::error::ErrorResponse),
        (status = 500, description = "Merge, transcode or storage failure", body = crate::api::error::ErrorResponse)
    ),
    tag = "audio"
)]
pub async fn extract_audio(
    State(state): State<AppState>,
    query: Result<Query<ExtractAudioQuery>, QueryRejection>,
    payload: Result<Json<ExtractAudioRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let Json(body) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    body.validate().map_err(|e| AppError::BadRequest(e.to_string()))?;

    let bucket_name = body
        .bucket_name
        .unwrap_or_else(|| state.config.default_bucket_name.clone());
    let audio_format = body
        .audio_format
        .unwrap_or_else(|| state.config.default_audio_format.to_string());
    let mode = query.mode.unwrap_or(state.config.delivery_mode);

    tracing::info!(
        "📨 Request received for bucket '{}', video '{}' with format '{}' ({:?})",
        bucket_name,
        body.video_path,
        audio_format,
        mode
    );

    let request = ExtractionRequest::new(bucket_name, body.video_path, &audio_format)?;
    let format = request.audio_format;

    let body = match state.extractor.extract(&request, mode).await? {
        AudioPayload::Buffer(bytes) => Body::from(bytes),
        AudioPayload::Stream(stream) => Body::from_stream(stream),
    };

    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, format.content_disposition()),
        ],
        body,
    )
        .into_response())
}
