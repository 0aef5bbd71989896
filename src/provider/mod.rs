use async_trait::async_trait;
use bytes::Bytes;
use cyder_tools::log::info;
use std::sync::Arc;

use crate::config::{ProviderCredential, ProvidersConfig};

pub mod luma;
pub mod runway;
pub mod types;

use luma::LumaProvider;
use runway::RunwayProvider;
pub use types::{GenerateOutcome, GenerateParams, ProviderError, StatusSnapshot, VideoModel};

/// Capability surface of one external video-generation service.
#[async_trait]
pub trait VideoProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn models(&self) -> &[VideoModel];

    fn find_model(&self, model_id: &str) -> Option<&VideoModel> {
        self.models().iter().find(|m| m.id == model_id)
    }

    fn default_model(&self) -> Option<&VideoModel> {
        self.models().first()
    }

    async fn generate_video(
        &self,
        params: GenerateParams<'_>,
    ) -> Result<GenerateOutcome, ProviderError>;

    async fn get_status(&self, job_id: &str) -> Result<StatusSnapshot, ProviderError>;

    async fn download_video(&self, url: &str) -> Result<Bytes, ProviderError>;
}

/// Closed set of provider implementations, keyed by name and built once from
/// the configuration object at startup.
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn VideoProvider>>,
    default_name: Option<String>,
}

impl ProviderRegistry {
    pub fn from_config(config: &ProvidersConfig, proxy: Option<&str>) -> Self {
        let mut providers: Vec<Arc<dyn VideoProvider>> = Vec::new();

        if let Some(credential) = enabled(&config.luma) {
            providers.push(Arc::new(LumaProvider::new(credential, proxy)));
        }
        if let Some(credential) = enabled(&config.runway) {
            providers.push(Arc::new(RunwayProvider::new(credential, proxy)));
        }

        for provider in &providers {
            info!(
                "video provider '{}' registered with {} model(s)",
                provider.name(),
                provider.models().len()
            );
        }

        Self {
            providers,
            default_name: config.default.clone(),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn VideoProvider>> {
        self.providers.iter().find(|p| p.name() == name).cloned()
    }

    /// Picks the provider for a request: the caller's choice when given, else
    /// the configured default, else the first registered one.
    pub fn select(&self, preferred: Option<&str>) -> Option<Arc<dyn VideoProvider>> {
        preferred
            .and_then(|name| self.get(name))
            .or_else(|| self.default_name.as_deref().and_then(|name| self.get(name)))
            .or_else(|| self.providers.first().cloned())
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn VideoProvider>> {
        self.providers.iter()
    }
}

fn enabled(slot: &Option<ProviderCredential>) -> Option<&ProviderCredential> {
    slot.as_ref().filter(|c| c.is_enabled)
}

/// Shared client builder for provider adapters; routes through the configured
/// egress proxy when the credential asks for it.
pub(crate) fn build_http_client(use_proxy: bool, proxy: Option<&str>) -> reqwest::Client {
    let mut builder = reqwest::Client::builder();
    if use_proxy {
        if let Some(proxy_url) = proxy {
            if let Ok(proxy) = reqwest::Proxy::all(proxy_url) {
                builder = builder.proxy(proxy);
            }
        }
    }
    builder.build().expect("failed to build provider http client")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderCredential;

    fn credential() -> ProviderCredential {
        ProviderCredential {
            api_key: "test-key".to_string(),
            endpoint: None,
            is_enabled: true,
            use_proxy: false,
        }
    }

    fn registry_with(default_name: Option<&str>) -> ProviderRegistry {
        let config = ProvidersConfig {
            default: default_name.map(str::to_string),
            luma: Some(credential()),
            runway: Some(credential()),
        };
        ProviderRegistry::from_config(&config, None)
    }

    #[test]
    fn select_prefers_caller_choice() {
        let registry = registry_with(Some("luma"));
        assert_eq!(registry.select(Some("runway")).unwrap().name(), "runway");
    }

    #[test]
    fn select_falls_back_to_default_then_first() {
        let registry = registry_with(Some("runway"));
        assert_eq!(registry.select(None).unwrap().name(), "runway");
        // Unknown preferred name falls through to the default.
        assert_eq!(registry.select(Some("pika")).unwrap().name(), "runway");

        let registry = registry_with(None);
        assert_eq!(registry.select(None).unwrap().name(), "luma");
    }

    #[test]
    fn disabled_credentials_are_skipped() {
        let config = ProvidersConfig {
            default: None,
            luma: Some(ProviderCredential {
                is_enabled: false,
                ..credential()
            }),
            runway: None,
        };
        let registry = ProviderRegistry::from_config(&config, None);
        assert!(registry.is_empty());
        assert!(registry.select(Some("luma")).is_none());
    }
}
