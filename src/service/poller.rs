use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use bytes::Bytes;
use chrono::Utc;
use cyder_tools::log::{error, info, warn};
use futures::Stream;
use serde::Serialize;

use crate::database::generation::{TerminalGenerationData, VideoGeneration};
use crate::database::message::ChatMessage;
use crate::provider::types::ProviderJobStatus;
use crate::provider::{StatusSnapshot, VideoProvider};
use crate::schema::enum_def::GenerationStatus;
use crate::service::storage::get_storage;
use crate::utils::sse::SseEvent;

/// Polling cadence for one status stream. The defaults bound a stream to ten
/// minutes of provider polling.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 120,
        }
    }
}

/// One frame of the status stream, serialized as the SSE data payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusFrame {
    pub status: GenerationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusFrame {
    pub fn from_record(record: &VideoGeneration) -> Self {
        Self {
            status: record.status,
            progress: None,
            video_url: record.video_url.clone(),
            thumbnail_url: record.thumbnail_url.clone(),
            duration: record.duration,
            error: record.error.clone(),
        }
    }

    fn terminal_error(message: &str) -> Self {
        Self {
            status: GenerationStatus::Error,
            progress: None,
            video_url: None,
            thumbnail_url: None,
            duration: None,
            error: Some(message.to_string()),
        }
    }

    fn to_bytes(&self) -> Bytes {
        let data = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        SseEvent::data_only(data).to_bytes().freeze()
    }
}

fn map_job_status(status: ProviderJobStatus) -> GenerationStatus {
    match status {
        ProviderJobStatus::Queued => GenerationStatus::Pending,
        ProviderJobStatus::Processing => GenerationStatus::Generating,
        ProviderJobStatus::Complete => GenerationStatus::Complete,
        ProviderJobStatus::Failed => GenerationStatus::Error,
    }
}

/// Streams status frames for one generation until it reaches a terminal state
/// or the polling budget runs out.
///
/// A record that is already terminal produces exactly one frame with no
/// provider traffic. A transient provider failure produces a non-terminal
/// frame carrying an advisory error so the client keeps listening. Running out
/// of attempts emits a synthetic error frame but leaves the stored record
/// untouched; the job may still finish on the provider side.
pub fn generation_status_stream(
    provider: Option<Arc<dyn VideoProvider>>,
    generation: VideoGeneration,
    policy: PollPolicy,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> {
    stream! {
        if generation.status.is_terminal() {
            yield Ok(StatusFrame::from_record(&generation).to_bytes());
            return;
        }

        let (provider, job_id) = match (provider, generation.provider_job_id.clone()) {
            (Some(provider), Some(job_id)) => (provider, job_id),
            _ => {
                warn!(
                    "generation {} has no pollable provider job; closing stream",
                    generation.id
                );
                yield Ok(StatusFrame::terminal_error("generation is not pollable").to_bytes());
                return;
            }
        };

        for attempt in 1..=policy.max_attempts {
            match provider.get_status(&job_id).await {
                Ok(snapshot) => {
                    let status = map_job_status(snapshot.status);
                    let frame = StatusFrame {
                        status,
                        progress: snapshot.progress,
                        video_url: snapshot.video_url.clone(),
                        thumbnail_url: snapshot.thumbnail_url.clone(),
                        duration: snapshot.duration,
                        error: snapshot.error.clone(),
                    };
                    if status.is_terminal() {
                        finalize_generation(provider.as_ref(), &generation, status, &snapshot)
                            .await;
                        yield Ok(frame.to_bytes());
                        return;
                    }
                    yield Ok(frame.to_bytes());
                }
                Err(e) => {
                    warn!(
                        "status poll {} for generation {} failed: {}",
                        attempt, generation.id, e
                    );
                    let frame = StatusFrame {
                        status: GenerationStatus::Generating,
                        progress: None,
                        video_url: None,
                        thumbnail_url: None,
                        duration: None,
                        error: Some(format!("status check failed: {}", e)),
                    };
                    yield Ok(frame.to_bytes());
                }
            }

            if attempt < policy.max_attempts {
                tokio::time::sleep(policy.interval).await;
            }
        }

        warn!(
            "generation {} did not reach a terminal state within {} polls",
            generation.id, policy.max_attempts
        );
        yield Ok(StatusFrame::terminal_error("generation timed out").to_bytes());
    }
}

/// Persists the terminal observation and runs the completion side effects.
/// Each step is best-effort: a failed mirror or archive never turns a finished
/// generation into an error.
async fn finalize_generation(
    provider: &dyn VideoProvider,
    generation: &VideoGeneration,
    status: GenerationStatus,
    snapshot: &StatusSnapshot,
) {
    let data = TerminalGenerationData {
        status: Some(status),
        video_url: snapshot.video_url.clone(),
        thumbnail_url: snapshot.thumbnail_url.clone(),
        duration: snapshot.duration.or(generation.duration),
        cost: None,
        error: snapshot.error.clone(),
    };
    if let Err(e) = VideoGeneration::mark_terminal(generation.id, &data) {
        error!("failed to finalize generation {}: {}", generation.id, e);
    }

    if status != GenerationStatus::Complete {
        return;
    }
    let Some(video_url) = snapshot.video_url.as_deref() else {
        warn!(
            "generation {} completed without a video url",
            generation.id
        );
        return;
    };

    if let Some(message_id) = generation.message_id.as_deref() {
        match ChatMessage::attach_media_url(message_id, video_url) {
            Ok(0) => info!("no chat message {} to mirror generation result onto", message_id),
            Ok(_) => {}
            Err(e) => warn!("failed to mirror result onto message {}: {}", message_id, e),
        }
    }

    archive_video(provider, generation.id, video_url).await;
}

/// Pulls the finished asset off the provider's short-lived URL and parks a
/// durable copy in blob storage.
async fn archive_video(provider: &dyn VideoProvider, generation_id: i64, video_url: &str) {
    let data = match provider.download_video(video_url).await {
        Ok(data) => data,
        Err(e) => {
            warn!("failed to download video for generation {}: {}", generation_id, e);
            return;
        }
    };

    let key = format!(
        "videos/{}/{}.mp4",
        Utc::now().format("%Y/%m/%d"),
        generation_id
    );
    if let Err(e) = get_storage()
        .await
        .put_object(&key, data, Some("video/mp4"))
        .await
    {
        warn!("failed to archive video for generation {}: {}", generation_id, e);
        return;
    }
    if let Err(e) = VideoGeneration::set_blob_key(generation_id, &key) {
        warn!("failed to record blob key for generation {}: {}", generation_id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::types::{GenerateOutcome, GenerateParams, ProviderError, VideoModel};
    use async_trait::async_trait;
    use futures::StreamExt;

    struct StubProvider {
        result: fn() -> Result<StatusSnapshot, ProviderError>,
    }

    #[async_trait]
    impl VideoProvider for StubProvider {
        fn name(&self) -> &'static str {
            "stub"
        }

        fn models(&self) -> &[VideoModel] {
            &[]
        }

        async fn generate_video(
            &self,
            _params: GenerateParams<'_>,
        ) -> Result<GenerateOutcome, ProviderError> {
            Err(ProviderError::Http("not implemented".to_string()))
        }

        async fn get_status(&self, _job_id: &str) -> Result<StatusSnapshot, ProviderError> {
            (self.result)()
        }

        async fn download_video(&self, _url: &str) -> Result<Bytes, ProviderError> {
            Err(ProviderError::Http("not implemented".to_string()))
        }
    }

    fn record(status: GenerationStatus, job_id: Option<&str>) -> VideoGeneration {
        VideoGeneration {
            id: 7,
            user_id: None,
            brand_profile_id: None,
            conversation_id: None,
            message_id: None,
            prompt: "a calm lake at dawn".to_string(),
            provider: "stub".to_string(),
            provider_job_id: job_id.map(str::to_string),
            model: "test-model".to_string(),
            status,
            video_url: None,
            thumbnail_url: None,
            blob_key: None,
            duration: Some(5),
            aspect_ratio: None,
            resolution: None,
            cost: Some(250_000),
            error: None,
            created_at: 0,
            completed_at: None,
        }
    }

    fn fast_policy(max_attempts: u32) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(1),
            max_attempts,
        }
    }

    async fn collect(
        stream: impl Stream<Item = Result<Bytes, std::io::Error>>,
    ) -> Vec<String> {
        stream
            .map(|item| String::from_utf8(item.unwrap().to_vec()).unwrap())
            .collect()
            .await
    }

    #[tokio::test]
    async fn terminal_record_yields_one_frame_without_polling() {
        let mut generation = record(GenerationStatus::Complete, Some("job-1"));
        generation.video_url = Some("https://cdn.example/v.mp4".to_string());

        let frames = collect(generation_status_stream(None, generation, fast_policy(3))).await;
        assert_eq!(frames.len(), 1);
        assert!(frames[0].contains("\"status\":\"complete\""));
        assert!(frames[0].contains("https://cdn.example/v.mp4"));
    }

    #[tokio::test]
    async fn missing_job_id_closes_with_error_frame() {
        let generation = record(GenerationStatus::Pending, None);
        let provider: Arc<dyn VideoProvider> = Arc::new(StubProvider {
            result: || Err(ProviderError::Http("unreachable".to_string())),
        });

        let frames =
            collect(generation_status_stream(Some(provider), generation, fast_policy(3))).await;
        assert_eq!(frames.len(), 1);
        assert!(frames[0].contains("\"status\":\"error\""));
    }

    #[tokio::test]
    async fn transient_failures_keep_the_stream_open() {
        let generation = record(GenerationStatus::Generating, Some("job-1"));
        let provider: Arc<dyn VideoProvider> = Arc::new(StubProvider {
            result: || Err(ProviderError::Http("connection reset".to_string())),
        });

        let frames =
            collect(generation_status_stream(Some(provider), generation, fast_policy(2))).await;
        // Two advisory frames, then the timeout frame.
        assert_eq!(frames.len(), 3);
        assert!(frames[0].contains("\"status\":\"generating\""));
        assert!(frames[0].contains("status check failed"));
        assert!(frames[1].contains("\"status\":\"generating\""));
        assert!(frames[2].contains("generation timed out"));
    }

    #[tokio::test]
    async fn exhausted_attempts_emit_timeout_frame() {
        let generation = record(GenerationStatus::Pending, Some("job-1"));
        let provider: Arc<dyn VideoProvider> = Arc::new(StubProvider {
            result: || {
                Ok(StatusSnapshot {
                    status: ProviderJobStatus::Processing,
                    progress: Some(40),
                    video_url: None,
                    thumbnail_url: None,
                    duration: None,
                    error: None,
                })
            },
        });

        let frames =
            collect(generation_status_stream(Some(provider), generation, fast_policy(2))).await;
        assert_eq!(frames.len(), 3);
        assert!(frames[0].contains("\"progress\":40"));
        assert!(frames[2].contains("\"status\":\"error\""));
        assert!(frames[2].contains("generation timed out"));
    }
}
