use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use super::types::{
    GenerateOutcome, GenerateParams, ProviderError, ProviderJobStatus, StatusSnapshot, VideoModel,
};
use super::{VideoProvider, build_http_client};
use crate::config::ProviderCredential;
use crate::utils::pricing::ModelPricing;

const DEFAULT_ENDPOINT: &str = "https://api.dev.runwayml.com";
const API_VERSION: &str = "2024-11-06";

static MODELS: LazyLock<Vec<VideoModel>> = LazyLock::new(|| {
    vec![
        VideoModel {
            id: "gen4_turbo",
            name: "Runway Gen-4 Turbo",
            provider: "runway",
            supported_durations: &[5, 10],
            supported_aspect_ratios: &["16:9", "9:16", "1:1", "4:3", "3:4", "21:9"],
            supported_resolutions: &["720p"],
            pricing: Some(ModelPricing {
                cost_per_second: Some(50_000),
                cost_per_generation: None,
                resolution_overrides: Default::default(),
            }),
        },
        VideoModel {
            id: "gen3a_turbo",
            name: "Runway Gen-3 Alpha Turbo",
            provider: "runway",
            supported_durations: &[5, 10],
            supported_aspect_ratios: &["16:9", "9:16"],
            supported_resolutions: &["720p"],
            pricing: Some(ModelPricing {
                cost_per_second: Some(50_000),
                cost_per_generation: None,
                resolution_overrides: Default::default(),
            }),
        },
    ]
});

pub struct RunwayProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RunwayTaskRequest<'a> {
    prompt_text: &'a str,
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ratio: Option<&'static str>,
}

#[derive(Deserialize)]
struct RunwayTaskCreated {
    id: String,
}

#[derive(Deserialize)]
struct RunwayTask {
    status: String,
    #[serde(default)]
    progress: Option<f64>,
    #[serde(default)]
    output: Vec<String>,
    #[serde(default)]
    failure: Option<String>,
}

impl RunwayProvider {
    pub fn new(credential: &ProviderCredential, proxy: Option<&str>) -> Self {
        Self {
            client: build_http_client(credential.use_proxy, proxy),
            api_key: credential.api_key.clone(),
            endpoint: credential
                .endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
        }
    }
}

// Runway task statuses: PENDING/THROTTLED -> RUNNING -> SUCCEEDED | FAILED.
fn map_status(status: &str) -> ProviderJobStatus {
    match status {
        "SUCCEEDED" => ProviderJobStatus::Complete,
        "FAILED" => ProviderJobStatus::Failed,
        "RUNNING" => ProviderJobStatus::Processing,
        _ => ProviderJobStatus::Queued,
    }
}

// Runway addresses output size as an exact pixel ratio, not an aspect label.
fn map_ratio(aspect_ratio: &str) -> Option<&'static str> {
    match aspect_ratio {
        "16:9" => Some("1280:720"),
        "9:16" => Some("720:1280"),
        "1:1" => Some("960:960"),
        "4:3" => Some("1104:832"),
        "3:4" => Some("832:1104"),
        "21:9" => Some("1584:672"),
        _ => None,
    }
}

async fn decode_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(ProviderError::Api {
            status: status.as_u16(),
            message,
        });
    }
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| ProviderError::Decode(e.to_string()))
}

#[async_trait]
impl VideoProvider for RunwayProvider {
    fn name(&self) -> &'static str {
        "runway"
    }

    fn models(&self) -> &[VideoModel] {
        &MODELS
    }

    async fn generate_video(
        &self,
        params: GenerateParams<'_>,
    ) -> Result<GenerateOutcome, ProviderError> {
        let request = RunwayTaskRequest {
            prompt_text: params.prompt,
            model: params.model,
            duration: params.duration,
            ratio: params.aspect_ratio.and_then(map_ratio),
        };

        let response = self
            .client
            .post(format!("{}/v1/text_to_video", self.endpoint))
            .bearer_auth(&self.api_key)
            .header("X-Runway-Version", API_VERSION)
            .json(&request)
            .send()
            .await?;
        let created: RunwayTaskCreated = decode_response(response).await?;

        Ok(GenerateOutcome {
            job_id: created.id,
            status: ProviderJobStatus::Queued,
            video_url: None,
            thumbnail_url: None,
            duration: params.duration,
            error: None,
        })
    }

    async fn get_status(&self, job_id: &str) -> Result<StatusSnapshot, ProviderError> {
        let response = self
            .client
            .get(format!("{}/v1/tasks/{}", self.endpoint, job_id))
            .bearer_auth(&self.api_key)
            .header("X-Runway-Version", API_VERSION)
            .send()
            .await?;
        let task: RunwayTask = decode_response(response).await?;

        Ok(StatusSnapshot {
            status: map_status(&task.status),
            progress: task.progress.map(|p| (p * 100.0).round() as u8),
            video_url: task.output.into_iter().next(),
            thumbnail_url: None,
            duration: None,
            error: task.failure,
        })
    }

    async fn download_video(&self, url: &str) -> Result<Bytes, ProviderError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: "video asset fetch failed".to_string(),
            });
        }
        Ok(response.bytes().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(map_status("PENDING"), ProviderJobStatus::Queued);
        assert_eq!(map_status("THROTTLED"), ProviderJobStatus::Queued);
        assert_eq!(map_status("RUNNING"), ProviderJobStatus::Processing);
        assert_eq!(map_status("SUCCEEDED"), ProviderJobStatus::Complete);
        assert_eq!(map_status("FAILED"), ProviderJobStatus::Failed);
    }

    #[test]
    fn ratio_mapping() {
        assert_eq!(map_ratio("16:9"), Some("1280:720"));
        assert_eq!(map_ratio("9:16"), Some("720:1280"));
        assert_eq!(map_ratio("2:1"), None);
    }
}
