use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, header},
    response::Response,
    routing::{delete, get, post},
};
use chrono::Utc;
use cyder_tools::log::{error, warn};
use serde::{Deserialize, Serialize};

use crate::controller::BaseError;
use crate::database::ListResult;
use crate::database::generation::{
    GenerationQueryPayload, NewVideoGeneration, VideoGeneration,
};
use crate::database::message::ChatMessage;
use crate::provider::types::{GenerateParams, ProviderJobStatus};
use crate::provider::VideoModel;
use crate::schema::enum_def::GenerationStatus;
use crate::service::app_state::{AppState, StateRouter, create_state_router};
use crate::service::poller::{PollPolicy, generation_status_stream};
use crate::service::storage::get_storage;
use crate::utils::pricing::resolve_cost;
use crate::utils::{HttpResult, ID_GENERATOR};

const MAX_PROMPT_CHARS: usize = 4000;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct CreateGenerationRequest {
    prompt: String,
    model: Option<String>,
    provider: Option<String>,
    aspect_ratio: Option<String>,
    duration: Option<i32>,
    resolution: Option<String>,
    conversation_id: Option<String>,
    message_id: Option<String>,
    brand_profile_id: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct ListGenerationsQuery {
    status: Option<GenerationStatus>,
    brand_profile_id: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

/// API view of a generation record.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerationView {
    id: i64,
    user_id: Option<String>,
    brand_profile_id: Option<String>,
    conversation_id: Option<String>,
    message_id: Option<String>,
    prompt: String,
    provider: String,
    provider_job_id: Option<String>,
    model: String,
    status: GenerationStatus,
    video_url: Option<String>,
    thumbnail_url: Option<String>,
    blob_key: Option<String>,
    duration: Option<i32>,
    aspect_ratio: Option<String>,
    resolution: Option<String>,
    cost: Option<i64>,
    error: Option<String>,
    created_at: i64,
    completed_at: Option<i64>,
}

impl From<VideoGeneration> for GenerationView {
    fn from(record: VideoGeneration) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            brand_profile_id: record.brand_profile_id,
            conversation_id: record.conversation_id,
            message_id: record.message_id,
            prompt: record.prompt,
            provider: record.provider,
            provider_job_id: record.provider_job_id,
            model: record.model,
            status: record.status,
            video_url: record.video_url,
            thumbnail_url: record.thumbnail_url,
            blob_key: record.blob_key,
            duration: record.duration,
            aspect_ratio: record.aspect_ratio,
            resolution: record.resolution,
            cost: record.cost,
            error: record.error,
            created_at: record.created_at,
            completed_at: record.completed_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProviderCatalog {
    provider: &'static str,
    models: Vec<VideoModel>,
}

fn validate_prompt(prompt: &str) -> Result<(), BaseError> {
    if prompt.trim().is_empty() {
        return Err(BaseError::ParamInvalid(Some(
            "prompt must not be empty".to_string(),
        )));
    }
    if prompt.chars().count() > MAX_PROMPT_CHARS {
        return Err(BaseError::ParamInvalid(Some(format!(
            "prompt must not exceed {} characters",
            MAX_PROMPT_CHARS
        ))));
    }
    Ok(())
}

// Provider vocabulary at creation time; anything unrecognized starts as
// pending and the poller sorts it out.
fn map_creation_status(status: ProviderJobStatus) -> GenerationStatus {
    match status {
        ProviderJobStatus::Processing => GenerationStatus::Generating,
        ProviderJobStatus::Complete => GenerationStatus::Complete,
        _ => GenerationStatus::Pending,
    }
}

fn user_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn create_generation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreateGenerationRequest>,
) -> Result<HttpResult<GenerationView>, BaseError> {
    validate_prompt(&payload.prompt)?;

    let provider = state
        .providers
        .select(payload.provider.as_deref())
        .ok_or_else(|| BaseError::ServiceUnavailable(None))?;

    let model = match payload.model.as_deref() {
        Some(model_id) => provider.find_model(model_id).ok_or_else(|| {
            BaseError::ParamInvalid(Some(format!(
                "model '{}' is not available on provider '{}'",
                model_id,
                provider.name()
            )))
        })?,
        None => provider
            .default_model()
            .ok_or_else(|| BaseError::ServiceUnavailable(None))?,
    };

    let duration = model.normalize_duration(payload.duration);
    let cost = resolve_cost(
        model.pricing.as_ref(),
        duration,
        payload.resolution.as_deref(),
    );

    let generation_id = ID_GENERATOR.generate_id();
    let user_id = user_id_from_headers(&headers);
    let now = Utc::now().timestamp_millis();

    let result = provider
        .generate_video(GenerateParams {
            prompt: &payload.prompt,
            model: model.id,
            duration,
            aspect_ratio: payload.aspect_ratio.as_deref(),
            resolution: payload.resolution.as_deref(),
        })
        .await;

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("generation request to '{}' failed: {}", provider.name(), e);
            // The failed attempt is still recorded; a persistence failure
            // must not mask the provider error.
            let failed = NewVideoGeneration {
                id: generation_id,
                user_id,
                brand_profile_id: payload.brand_profile_id,
                conversation_id: payload.conversation_id,
                message_id: payload.message_id,
                prompt: payload.prompt,
                provider: provider.name().to_string(),
                provider_job_id: None,
                model: model.id.to_string(),
                status: GenerationStatus::Error,
                video_url: None,
                thumbnail_url: None,
                duration,
                aspect_ratio: payload.aspect_ratio,
                resolution: payload.resolution,
                cost: None,
                error: Some(e.to_string()),
                created_at: now,
                completed_at: Some(now),
            };
            if let Err(db_err) = VideoGeneration::create(&failed) {
                warn!("failed to record failed generation: {}", db_err);
            }
            return Err(BaseError::UpstreamGateway(Some(e.to_string())));
        }
    };

    let status = map_creation_status(outcome.status);
    let record = VideoGeneration::create(&NewVideoGeneration {
        id: generation_id,
        user_id,
        brand_profile_id: payload.brand_profile_id,
        conversation_id: payload.conversation_id,
        message_id: payload.message_id.clone(),
        prompt: payload.prompt,
        provider: provider.name().to_string(),
        provider_job_id: Some(outcome.job_id),
        model: model.id.to_string(),
        status,
        video_url: outcome.video_url.clone(),
        thumbnail_url: outcome.thumbnail_url,
        duration: outcome.duration.or(duration),
        aspect_ratio: payload.aspect_ratio,
        resolution: payload.resolution,
        cost: Some(cost),
        error: outcome.error,
        created_at: now,
        completed_at: status.is_terminal().then_some(now),
    })?;

    // Some providers finish synchronously; mirror the result right away.
    if status == GenerationStatus::Complete {
        if let (Some(message_id), Some(video_url)) =
            (payload.message_id.as_deref(), outcome.video_url.as_deref())
        {
            if let Err(e) = ChatMessage::attach_media_url(message_id, video_url) {
                warn!("failed to mirror result onto message {}: {}", message_id, e);
            }
        }
    }

    Ok(HttpResult::new(record.into()))
}

async fn list_generations(
    Query(query): Query<ListGenerationsQuery>,
) -> Result<HttpResult<ListResult<GenerationView>>, BaseError> {
    let result = VideoGeneration::list(GenerationQueryPayload {
        status: query.status,
        brand_profile_id: query.brand_profile_id,
        user_id: None,
        limit: query.limit,
        offset: query.offset,
    })?;

    Ok(HttpResult::new(ListResult {
        total: result.total,
        limit: result.limit,
        offset: result.offset,
        list: result.list.into_iter().map(GenerationView::from).collect(),
    }))
}

async fn get_generation(Path(id): Path<i64>) -> Result<HttpResult<GenerationView>, BaseError> {
    let record = VideoGeneration::get_by_id(id)?;
    Ok(HttpResult::new(record.into()))
}

async fn delete_generation(Path(id): Path<i64>) -> Result<HttpResult<()>, BaseError> {
    let record = VideoGeneration::get_by_id(id)?;
    VideoGeneration::delete(id)?;

    if let Some(blob_key) = record.blob_key.as_deref() {
        if let Err(e) = get_storage().await.delete_object(blob_key).await {
            warn!("failed to delete archived blob {}: {}", blob_key, e);
        }
    }
    Ok(HttpResult::new(()))
}

async fn cancel_generation(Path(id): Path<i64>) -> Result<HttpResult<GenerationView>, BaseError> {
    let record = VideoGeneration::cancel(id)?;
    Ok(HttpResult::new(record.into()))
}

async fn list_models(
    State(state): State<Arc<AppState>>,
) -> Result<HttpResult<Vec<ProviderCatalog>>, BaseError> {
    let catalog = state
        .providers
        .iter()
        .map(|provider| ProviderCatalog {
            provider: provider.name(),
            models: provider.models().to_vec(),
        })
        .collect();
    Ok(HttpResult::new(catalog))
}

async fn stream_generation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Response, BaseError> {
    let generation = VideoGeneration::get_by_id(id)?;

    let provider = state.providers.get(&generation.provider);
    if provider.is_none() && !generation.status.is_terminal() {
        return Err(BaseError::ServiceUnavailable(Some(format!(
            "provider '{}' is not configured",
            generation.provider
        ))));
    }

    let stream = generation_status_stream(provider, generation, PollPolicy::default());
    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(stream))
        .map_err(|e| BaseError::InternalServerError(Some(e.to_string())))
}

pub fn create_generation_router() -> StateRouter {
    create_state_router().nest(
        "/generation",
        create_state_router()
            .route("/", post(create_generation))
            .route("/list", get(list_generations))
            .route("/models", get(list_models))
            .route("/{id}", get(get_generation))
            .route("/{id}", delete(delete_generation))
            .route("/{id}/cancel", post(cancel_generation))
            .route("/{id}/stream", get(stream_generation)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_validation() {
        assert!(validate_prompt("a red balloon over the sea").is_ok());
        assert!(validate_prompt("").is_err());
        assert!(validate_prompt("   ").is_err());
        assert!(validate_prompt(&"x".repeat(MAX_PROMPT_CHARS)).is_ok());
        assert!(validate_prompt(&"x".repeat(MAX_PROMPT_CHARS + 1)).is_err());
        // Counted in characters, not bytes.
        assert!(validate_prompt(&"日".repeat(MAX_PROMPT_CHARS)).is_ok());
    }

    #[test]
    fn creation_status_mapping() {
        assert_eq!(
            map_creation_status(ProviderJobStatus::Queued),
            GenerationStatus::Pending
        );
        assert_eq!(
            map_creation_status(ProviderJobStatus::Processing),
            GenerationStatus::Generating
        );
        assert_eq!(
            map_creation_status(ProviderJobStatus::Complete),
            GenerationStatus::Complete
        );
        assert_eq!(
            map_creation_status(ProviderJobStatus::Failed),
            GenerationStatus::Pending
        );
    }
}
