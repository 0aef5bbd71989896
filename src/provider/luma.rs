use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use super::types::{
    GenerateOutcome, GenerateParams, ProviderError, ProviderJobStatus, StatusSnapshot, VideoModel,
};
use super::{VideoProvider, build_http_client};
use crate::config::ProviderCredential;
use crate::utils::pricing::{ModelPricing, ResolutionPricing};

const DEFAULT_ENDPOINT: &str = "https://api.lumalabs.ai/dream-machine/v1";

static MODELS: LazyLock<Vec<VideoModel>> = LazyLock::new(|| {
    vec![
        VideoModel {
            id: "ray-2",
            name: "Luma Ray 2",
            provider: "luma",
            supported_durations: &[5, 9],
            supported_aspect_ratios: &["16:9", "9:16", "1:1", "4:3", "3:4", "21:9"],
            supported_resolutions: &["540p", "720p", "1080p", "4k"],
            pricing: Some(ModelPricing {
                cost_per_second: Some(64_000),
                cost_per_generation: None,
                resolution_overrides: [
                    (
                        "1080p".to_string(),
                        ResolutionPricing {
                            cost_per_second: Some(128_000),
                            cost_per_generation: None,
                        },
                    ),
                    (
                        "4k".to_string(),
                        ResolutionPricing {
                            cost_per_second: Some(512_000),
                            cost_per_generation: None,
                        },
                    ),
                ]
                .into_iter()
                .collect(),
            }),
        },
        VideoModel {
            id: "ray-flash-2",
            name: "Luma Ray Flash 2",
            provider: "luma",
            supported_durations: &[5, 9],
            supported_aspect_ratios: &["16:9", "9:16", "1:1", "4:3", "3:4", "21:9"],
            supported_resolutions: &["540p", "720p"],
            pricing: Some(ModelPricing {
                cost_per_second: None,
                cost_per_generation: Some(140_000),
                resolution_overrides: Default::default(),
            }),
        },
    ]
});

pub struct LumaProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

#[derive(Serialize)]
struct LumaGenerationRequest<'a> {
    prompt: &'a str,
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolution: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    aspect_ratio: Option<&'a str>,
}

#[derive(Deserialize)]
struct LumaGeneration {
    id: String,
    state: String,
    #[serde(default)]
    failure_reason: Option<String>,
    #[serde(default)]
    assets: Option<LumaAssets>,
}

#[derive(Deserialize, Default)]
struct LumaAssets {
    #[serde(default)]
    video: Option<String>,
    #[serde(default)]
    image: Option<String>,
}

impl LumaProvider {
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

    async fn fetch_generation(&self, job_id: &str) -> Result<LumaGeneration, ProviderError> {
        let response = self
            .client
            .get(format!("{}/generations/{}", self.endpoint, job_id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        decode_response(response).await
    }
}

// Luma states: queued -> dreaming -> completed | failed.
fn map_state(state: &str) -> ProviderJobStatus {
    match state {
        "completed" => ProviderJobStatus::Complete,
        "failed" => ProviderJobStatus::Failed,
        "dreaming" | "processing" => ProviderJobStatus::Processing,
        _ => ProviderJobStatus::Queued,
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
impl VideoProvider for LumaProvider {
    fn name(&self) -> &'static str {
        "luma"
    }

    fn models(&self) -> &[VideoModel] {
        &MODELS
    }

    async fn generate_video(
        &self,
        params: GenerateParams<'_>,
    ) -> Result<GenerateOutcome, ProviderError> {
        let request = LumaGenerationRequest {
            prompt: params.prompt,
            model: params.model,
            resolution: params.resolution,
            // Luma takes durations as "5s" strings.
            duration: params.duration.map(|d| format!("{d}s")),
            aspect_ratio: params.aspect_ratio,
        };

        let response = self
            .client
            .post(format!("{}/generations", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let generation: LumaGeneration = decode_response(response).await?;

        let assets = generation.assets.unwrap_or_default();
        Ok(GenerateOutcome {
            job_id: generation.id,
            status: map_state(&generation.state),
            video_url: assets.video,
            thumbnail_url: assets.image,
            duration: params.duration,
            error: generation.failure_reason,
        })
    }

    async fn get_status(&self, job_id: &str) -> Result<StatusSnapshot, ProviderError> {
        let generation = self.fetch_generation(job_id).await?;
        let assets = generation.assets.unwrap_or_default();
        Ok(StatusSnapshot {
            status: map_state(&generation.state),
            progress: None,
            video_url: assets.video,
            thumbnail_url: assets.image,
            duration: None,
            error: generation.failure_reason,
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
    fn state_mapping() {
        assert_eq!(map_state("queued"), ProviderJobStatus::Queued);
        assert_eq!(map_state("dreaming"), ProviderJobStatus::Processing);
        assert_eq!(map_state("completed"), ProviderJobStatus::Complete);
        assert_eq!(map_state("failed"), ProviderJobStatus::Failed);
        // Unknown states stay queued rather than erroring the poll loop.
        assert_eq!(map_state("warming_up"), ProviderJobStatus::Queued);
    }

    #[test]
    fn models_carry_pricing() {
        let ray2 = MODELS.iter().find(|m| m.id == "ray-2").unwrap();
        let pricing = ray2.pricing.as_ref().unwrap();
        assert_eq!(pricing.cost_per_second, Some(64_000));
        assert!(pricing.resolution_overrides.contains_key("4k"));
    }
}
