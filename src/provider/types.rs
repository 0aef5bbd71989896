use serde::Serialize;
use thiserror::Error;

use crate::utils::pricing::ModelPricing;

/// Static descriptor for one generation model. Materialized once at process
/// start; never mutated at runtime.
#[derive(Debug, Clone, Serialize)]
pub struct VideoModel {
    pub id: &'static str,
    pub name: &'static str,
    pub provider: &'static str,
    pub supported_durations: &'static [i32],
    pub supported_aspect_ratios: &'static [&'static str],
    pub supported_resolutions: &'static [&'static str],
    pub pricing: Option<ModelPricing>,
}

impl VideoModel {
    /// Snaps a requested duration onto the model's discrete accepted set. An
    /// out-of-set value becomes "unspecified" so the provider default applies;
    /// it is never an error.
    pub fn normalize_duration(&self, requested: Option<i32>) -> Option<i32> {
        requested.filter(|d| self.supported_durations.contains(d))
    }
}

/// Provider job-status vocabulary, normalized at the adapter boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderJobStatus {
    Queued,
    Processing,
    Complete,
    Failed,
}

#[derive(Debug, Clone)]
pub struct GenerateParams<'a> {
    pub prompt: &'a str,
    pub model: &'a str,
    pub duration: Option<i32>,
    pub aspect_ratio: Option<&'a str>,
    pub resolution: Option<&'a str>,
}

/// What a provider hands back from its generation entry point.
#[derive(Debug, Clone)]
pub struct GenerateOutcome {
    pub job_id: String,
    pub status: ProviderJobStatus,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub duration: Option<i32>,
    pub error: Option<String>,
}

/// One status-poll observation of a running job.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub status: ProviderJobStatus,
    pub progress: Option<u8>,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub duration: Option<i32>,
    pub error: Option<String>,
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Http(String),
    #[error("provider returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("failed to decode provider response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Http(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: VideoModel = VideoModel {
        id: "test-model",
        name: "Test Model",
        provider: "test",
        supported_durations: &[4, 8, 12],
        supported_aspect_ratios: &["16:9"],
        supported_resolutions: &["720p"],
        pricing: None,
    };

    #[test]
    fn in_set_duration_is_kept() {
        assert_eq!(MODEL.normalize_duration(Some(8)), Some(8));
    }

    #[test]
    fn out_of_set_duration_becomes_unspecified() {
        assert_eq!(MODEL.normalize_duration(Some(7)), None);
        assert_eq!(MODEL.normalize_duration(Some(0)), None);
        assert_eq!(MODEL.normalize_duration(None), None);
    }
}
