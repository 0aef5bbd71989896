use std::{fs, path::Path};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

// --- STORAGE CONFIG ---

/// Storage driver type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageDriver {
    #[default]
    Local,
    S3,
}

/// Local storage specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalStorageConfig {
    #[serde(default = "default_local_storage_root")]
    pub root: String,
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            root: default_local_storage_root(),
        }
    }
}

/// S3 storage specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3StorageConfig {
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub bucket: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub public_url: Option<String>,
}

/// Overall storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub driver: StorageDriver,
    #[serde(default)]
    pub local: LocalStorageConfig,
    pub s3: Option<S3StorageConfig>,
}

#[derive(Debug, Deserialize, Serialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialLocalStorageConfig {
    pub root: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialS3StorageConfig {
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub bucket: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub public_url: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialStorageConfig {
    pub driver: Option<StorageDriver>,
    pub local: Option<PartialLocalStorageConfig>,
    pub s3: Option<PartialS3StorageConfig>,
}

impl PartialStorageConfig {
    fn merge_into(self, final_config: &mut StorageConfig) {
        if let Some(driver) = self.driver {
            final_config.driver = driver;
        }

        if let Some(local_partial) = self.local {
            if let Some(root) = local_partial.root {
                final_config.local.root = root;
            }
        }

        if let Some(s3_partial) = self.s3 {
            match &mut final_config.s3 {
                Some(s3_final) => {
                    if let Some(endpoint) = s3_partial.endpoint {
                        s3_final.endpoint = Some(endpoint);
                    }
                    if let Some(region) = s3_partial.region {
                        s3_final.region = Some(region);
                    }
                    if let Some(bucket) = s3_partial.bucket {
                        s3_final.bucket = bucket;
                    }
                    if let Some(access_key) = s3_partial.access_key {
                        s3_final.access_key = Some(access_key);
                    }
                    if let Some(secret_key) = s3_partial.secret_key {
                        s3_final.secret_key = Some(secret_key);
                    }
                    if let Some(public_url) = s3_partial.public_url {
                        s3_final.public_url = Some(public_url);
                    }
                }
                None => {
                    if let Some(bucket) = s3_partial.bucket {
                        final_config.s3 = Some(S3StorageConfig {
                            bucket,
                            endpoint: s3_partial.endpoint,
                            region: s3_partial.region,
                            access_key: s3_partial.access_key,
                            secret_key: s3_partial.secret_key,
                            public_url: s3_partial.public_url,
                        });
                    }
                }
            }
        }
    }
}

// --- PROVIDER CONFIG ---

/// Credential for one external video-generation provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCredential {
    pub api_key: String,
    /// Overrides the provider's public API endpoint (for self-hosted relays).
    pub endpoint: Option<String>,
    #[serde(default = "default_enabled")]
    pub is_enabled: bool,
    #[serde(default)]
    pub use_proxy: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    /// Provider preferred when a request does not name one.
    pub default: Option<String>,
    pub luma: Option<ProviderCredential>,
    pub runway: Option<ProviderCredential>,
}

#[derive(Debug, Deserialize, Serialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialProviderCredential {
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub is_enabled: Option<bool>,
    pub use_proxy: Option<bool>,
}

impl PartialProviderCredential {
    fn merge_into(self, slot: &mut Option<ProviderCredential>) {
        match slot {
            Some(existing) => {
                if let Some(api_key) = self.api_key {
                    existing.api_key = api_key;
                }
                if let Some(endpoint) = self.endpoint {
                    existing.endpoint = Some(endpoint);
                }
                if let Some(is_enabled) = self.is_enabled {
                    existing.is_enabled = is_enabled;
                }
                if let Some(use_proxy) = self.use_proxy {
                    existing.use_proxy = use_proxy;
                }
            }
            None => {
                if let Some(api_key) = self.api_key {
                    *slot = Some(ProviderCredential {
                        api_key,
                        endpoint: self.endpoint,
                        is_enabled: self.is_enabled.unwrap_or(true),
                        use_proxy: self.use_proxy.unwrap_or(false),
                    });
                }
            }
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialProvidersConfig {
    pub default: Option<String>,
    pub luma: Option<PartialProviderCredential>,
    pub runway: Option<PartialProviderCredential>,
}

impl PartialProvidersConfig {
    fn merge_into(self, final_config: &mut ProvidersConfig) {
        if let Some(default) = self.default {
            final_config.default = Some(default);
        }
        if let Some(luma) = self.luma {
            luma.merge_into(&mut final_config.luma);
        }
        if let Some(runway) = self.runway {
            runway.merge_into(&mut final_config.runway);
        }
    }
}

fn default_local_storage_root() -> String {
    "storage/media".to_string()
}

fn default_enabled() -> bool {
    true
}

// Used for deserializing user-provided config files where all fields are optional.
#[derive(Debug, Deserialize, Serialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub base_path: Option<String>,
    pub db_url: Option<String>,
    pub proxy: Option<String>,
    pub log_level: Option<String>,
    pub storage: Option<PartialStorageConfig>,
    pub providers: Option<PartialProvidersConfig>,
}

impl PartialConfig {
    /// Merges the fields of this partial config into a final config, overwriting existing values.
    fn merge_into(self, final_config: &mut FinalConfig) {
        if let Some(host) = self.host {
            final_config.host = host;
        }
        if let Some(port) = self.port {
            final_config.port = port;
        }
        if let Some(base_path) = self.base_path {
            final_config.base_path = base_path;
        }
        if let Some(db_url) = self.db_url {
            final_config.db_url = db_url;
        }
        if let Some(proxy) = self.proxy {
            final_config.proxy = Some(proxy);
        }
        if let Some(log_level) = self.log_level {
            final_config.log_level = log_level;
        }
        if let Some(storage) = self.storage {
            storage.merge_into(&mut final_config.storage)
        }
        if let Some(providers) = self.providers {
            providers.merge_into(&mut final_config.providers)
        }
    }
}

// The fully resolved configuration used by the application.
// This is also the format for the default configuration file.
#[derive(Debug, Deserialize, Serialize)]
pub struct FinalConfig {
    pub host: String,
    pub port: u16,
    pub base_path: String,
    pub db_url: String,
    pub proxy: Option<String>,
    pub log_level: String,
    pub storage: StorageConfig,
    pub providers: ProvidersConfig,
}

fn get_env_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn get_config_from_env() -> PartialConfig {
    let provider_from_env = |key_var: &str| -> Option<PartialProviderCredential> {
        get_env_var::<String>(key_var).map(|api_key| PartialProviderCredential {
            api_key: Some(api_key),
            ..Default::default()
        })
    };

    PartialConfig {
        host: get_env_var("HOST"),
        port: get_env_var("PORT"),
        base_path: get_env_var("BASE_PATH"),
        db_url: get_env_var("DB_URL"),
        proxy: get_env_var("PROXY"),
        log_level: get_env_var("LOG_LEVEL"),
        storage: None,
        providers: Some(PartialProvidersConfig {
            default: get_env_var("DEFAULT_PROVIDER"),
            luma: provider_from_env("LUMA_API_KEY"),
            runway: provider_from_env("RUNWAY_API_KEY"),
        }),
    }
}

pub static CONFIG: Lazy<FinalConfig> = Lazy::new(|| {
    let default_config_path = Path::new("config.default.yaml");
    let user_config_path_primary = Path::new("config.local.yaml");
    let user_config_path_fallback = Path::new("config.yaml");

    // Determine which user config file to use for overrides
    let user_config_path = if user_config_path_primary.exists() {
        user_config_path_primary
    } else {
        user_config_path_fallback
    };

    // Create a FinalConfig with programmatic defaults.
    let mut effective_default_config = FinalConfig {
        host: "0.0.0.0".to_string(),
        port: 8100,
        base_path: "/media".to_string(),
        db_url: "./storage/sqlite.db".to_string(),
        proxy: None,
        log_level: "info".to_string(),
        storage: StorageConfig::default(),
        providers: ProvidersConfig::default(),
    };

    // If a default config file exists, load it as partial and merge it over the programmatic defaults.
    if default_config_path.exists() {
        if let Ok(config_str) = fs::read_to_string(default_config_path) {
            let file_defaults: PartialConfig =
                serde_yaml::from_str(&config_str).unwrap_or_else(|e| {
                    panic!(
                        "Failed to parse default configuration file at {:?}: {}",
                        default_config_path, e
                    )
                });

            file_defaults.merge_into(&mut effective_default_config);
        }
    }

    // Start with the effective defaults.
    let mut final_config = effective_default_config;

    // Load the user's config if it exists. It's optional and overrides the defaults.
    if user_config_path.exists() {
        if let Ok(config_str) = fs::read_to_string(user_config_path) {
            let user_config: PartialConfig =
                serde_yaml::from_str(&config_str).unwrap_or_else(|e| {
                    panic!(
                        "Failed to parse user configuration file at {:?}: {}",
                        user_config_path, e
                    )
                });

            user_config.merge_into(&mut final_config);
        }
    }

    // Load config from environment variables, which have the highest priority.
    get_config_from_env().merge_into(&mut final_config);

    if final_config.storage.driver == StorageDriver::S3 && final_config.storage.s3.is_none() {
        final_config.storage.driver = StorageDriver::Local;
    }

    final_config
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_provider_merge_creates_credential() {
        let mut providers = ProvidersConfig::default();
        let partial = PartialProvidersConfig {
            default: Some("luma".to_string()),
            luma: Some(PartialProviderCredential {
                api_key: Some("luma-key".to_string()),
                ..Default::default()
            }),
            runway: None,
        };
        partial.merge_into(&mut providers);

        let luma = providers.luma.expect("credential should be created");
        assert_eq!(luma.api_key, "luma-key");
        assert!(luma.is_enabled);
        assert!(!luma.use_proxy);
        assert_eq!(providers.default.as_deref(), Some("luma"));
    }

    #[test]
    fn partial_provider_merge_overrides_fields_only() {
        let mut providers = ProvidersConfig {
            luma: Some(ProviderCredential {
                api_key: "old".to_string(),
                endpoint: Some("https://relay.internal".to_string()),
                is_enabled: true,
                use_proxy: false,
            }),
            ..Default::default()
        };
        let partial = PartialProvidersConfig {
            luma: Some(PartialProviderCredential {
                api_key: Some("new".to_string()),
                is_enabled: Some(false),
                ..Default::default()
            }),
            ..Default::default()
        };
        partial.merge_into(&mut providers);

        let luma = providers.luma.unwrap();
        assert_eq!(luma.api_key, "new");
        assert!(!luma.is_enabled);
        assert_eq!(luma.endpoint.as_deref(), Some("https://relay.internal"));
    }
}
