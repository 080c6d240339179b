//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.summarizerrrr/config.toml` (user)
//! 3. `/etc/summarizerrrr/config.toml` (system)
//!
//! Secrets are loaded separately with mandatory permission checks:
//! 1. `~/.summarizerrrr/secrets.toml` (user, must be 0600)
//! 2. `/etc/summarizerrrr/secrets.toml` (system, must be 0600)
//!
//! and fall back to `<PROVIDER>_API_KEYS` (comma-separated) or
//! `<PROVIDER>_API_KEY` environment variables.
//!
//! ```toml
//! [orchestrator]
//! execution_context = "privileged"
//! request_timeout_secs = 120
//!
//! [fallback]
//! initial_delay_ms = 250
//!
//! [[providers]]
//! id = "gemini"
//! kind = "gemini"
//!
//! [[providers.models]]
//! name = "gemini-2.5-pro"
//! max_output_tokens = 8192
//!
//! [[providers.models]]
//! name = "gemini-2.5-flash"
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::fallback::FallbackPolicy;
use crate::gateway::{Summarizerrrr, SummarizerrrrBuilder};
use crate::providers::{ClassificationRule, ClassificationTable};
use crate::types::{ExecutionContext, ModelSpec, ProviderDescriptor, ProviderKind};
use crate::{Result, SummarizerError};

const APP_DIR: &str = ".summarizerrrr";
const SYSTEM_DIR: &str = "/etc/summarizerrrr";

/// Orchestrator configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

/// Orchestrator-wide settings.
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    /// Where requests run (default: privileged).
    #[serde(default)]
    pub execution_context: ExecutionContext,
    /// Stream when the provider allows it (default: true).
    #[serde(default = "default_true")]
    pub prefer_streaming: bool,
    /// HTTP request timeout in seconds (default: 120).
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    /// Spawn a proxy worker for local providers (default: false).
    #[serde(default)]
    pub local_proxy: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            execution_context: ExecutionContext::default(),
            prefer_streaming: true,
            request_timeout_secs: default_timeout(),
            local_proxy: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    120
}

/// Fallback policy settings.
#[derive(Debug, Clone, Deserialize)]
pub struct FallbackConfig {
    #[serde(default = "default_true")]
    pub key_rotation: bool,
    #[serde(default = "default_true")]
    pub model_downgrade: bool,
    #[serde(default = "default_true")]
    pub transport_downgrade: bool,
    /// Delay before the first retry in milliseconds (default: 250).
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,
    /// Cap on the retry delay in milliseconds (default: 10000).
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            key_rotation: true,
            model_downgrade: true,
            transport_downgrade: true,
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

fn default_initial_delay() -> u64 {
    250
}

fn default_max_delay() -> u64 {
    10_000
}

impl FallbackConfig {
    pub fn policy(&self) -> FallbackPolicy {
        FallbackPolicy::new()
            .key_rotation(self.key_rotation)
            .model_downgrade(self.model_downgrade)
            .transport_downgrade(self.transport_downgrade)
            .initial_delay(Duration::from_millis(self.initial_delay_ms))
            .max_delay(Duration::from_millis(self.max_delay_ms))
    }
}

/// One provider entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub kind: ProviderKind,
    /// Endpoint override (default: the kind's public or local endpoint).
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_true")]
    pub supports_streaming: bool,
    /// Candidate models, heaviest first.
    #[serde(default)]
    pub models: Vec<ModelSpec>,
    /// Classification rules consulted before the defaults.
    #[serde(default)]
    pub classification: Vec<ClassificationRule>,
}

impl ProviderConfig {
    /// Descriptor for this provider with the given keys.
    pub fn descriptor(&self, api_keys: Vec<String>) -> ProviderDescriptor {
        let mut descriptor = ProviderDescriptor::new(&self.id, self.kind)
            .supports_streaming(self.supports_streaming);
        descriptor.models = self.models.clone();
        for key in api_keys {
            descriptor = descriptor.api_key(key);
        }
        descriptor
    }
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.summarizerrrr/config.toml`
    /// 3. `/etc/summarizerrrr/config.toml`
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        let content = fs::read_to_string(&path).map_err(|e| {
            SummarizerError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            SummarizerError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(SummarizerError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(APP_DIR).join("config.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        let system_config = Path::new(SYSTEM_DIR).join("config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }

        Err(SummarizerError::Configuration(
            "No config file found. Create ~/.summarizerrrr/config.toml or /etc/summarizerrrr/config.toml"
                .to_string(),
        ))
    }

    pub fn provider(&self, id: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.id == id)
    }

    /// A builder with every configured provider, keys from `secrets`.
    ///
    /// Listener and proxy handle can still be added before `build()`.
    pub fn builder(&self, secrets: &Secrets) -> SummarizerrrrBuilder {
        let mut builder = Summarizerrrr::builder()
            .timeout(Duration::from_secs(self.orchestrator.request_timeout_secs))
            .policy(self.fallback.policy())
            .execution_context(self.orchestrator.execution_context)
            .local_proxy(self.orchestrator.local_proxy);
        for provider in &self.providers {
            let keys = if provider.kind.requires_api_key() {
                secrets.api_keys(&provider.id)
            } else {
                Vec::new()
            };
            builder = builder.provider_with_table(
                provider.descriptor(keys),
                provider.base_url.clone(),
                ClassificationTable::with_rules(provider.classification.clone()),
            );
        }
        builder
    }
}

/// API keys per provider id.
///
/// ```toml
/// [gemini]
/// api_keys = ["first-key", "second-key"]
///
/// [openrouter]
/// api_key = "single-key"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Secrets {
    providers: HashMap<String, ProviderSecret>,
}

/// Keys of one provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderSecret {
    #[serde(default)]
    pub api_keys: Vec<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl ProviderSecret {
    fn keys(&self) -> Vec<String> {
        self.api_key
            .iter()
            .chain(self.api_keys.iter())
            .filter(|k| !k.trim().is_empty())
            .cloned()
            .collect()
    }
}

impl Secrets {
    /// Load secrets from the standard locations with permission checks.
    ///
    /// Returns empty secrets if no file exists (providers may use env vars).
    pub fn load() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(APP_DIR).join("secrets.toml");
            if user_secrets.exists() {
                return Self::load_from(&user_secrets);
            }
        }

        let system_secrets = Path::new(SYSTEM_DIR).join("secrets.toml");
        if system_secrets.exists() {
            return Self::load_from(&system_secrets);
        }

        Ok(Secrets::default())
    }

    /// Load one secrets file, after checking its permissions.
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::check_permissions(path)?;
        let content = fs::read_to_string(path).map_err(|e| {
            SummarizerError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            SummarizerError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            SummarizerError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            return Err(SummarizerError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// API keys for a provider, falling back to environment variables.
    pub fn api_keys(&self, provider: &str) -> Vec<String> {
        self.api_keys_with(provider, |name| std::env::var(name).ok())
    }

    fn api_keys_with(&self, provider: &str, env: impl Fn(&str) -> Option<String>) -> Vec<String> {
        if let Some(secret) = self.providers.get(provider) {
            let keys = secret.keys();
            if !keys.is_empty() {
                return keys;
            }
        }

        let prefix = env_prefix(provider);
        if let Some(list) = env(&format!("{prefix}_API_KEYS")) {
            let keys: Vec<String> = list
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(String::from)
                .collect();
            if !keys.is_empty() {
                return keys;
            }
        }
        env(&format!("{prefix}_API_KEY"))
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .into_iter()
            .collect()
    }
}

/// `open-router.eu` → `OPEN_ROUTER_EU`
fn env_prefix(provider: &str) -> String {
    provider
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
