use anyhow::{Context, Result};
use directories::UserDirs;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

const CONFIG_FILE_NAME: &str = "config.toml";

pub const DEFAULT_MODEL: &str = "gpt-5-chat-latest";
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Your goal is to give contemplative, yet concise answers.";

// ── Top-level config ──────────────────────────────────────────────

/// Top-level stockchat configuration, loaded from `config.toml`.
///
/// Resolution order: `STOCKCHAT_CONFIG_DIR` env → `~/.stockchat/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Config {
    /// Path to config.toml - computed at load time, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,
    /// API key for the model provider. Overridden by `STOCKCHAT_API_KEY` or `OPENAI_API_KEY`.
    /// Chat turns are refused with a visible error while this is unset.
    pub api_key: Option<String>,
    /// Base URL override for the provider API (e.g. a local OpenAI-compatible proxy).
    pub api_url: Option<String>,
    /// Provider ID. Default: `"openai"`.
    #[serde(default = "default_provider")]
    pub default_provider: String,
    /// Model identifier sent to the provider. Default: `"gpt-5-chat-latest"`.
    #[serde(default = "default_model")]
    pub default_model: String,
    /// System instructions given to the chat agent on every turn.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Sampling temperature (0.0–2.0). Default: `0.7`.
    #[serde(default = "default_temperature")]
    pub default_temperature: f64,

    /// Gateway server configuration: host, port, limits (`[gateway]`).
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Fixture data source (`[fixtures]`).
    #[serde(default)]
    pub fixtures: FixturesConfig,
}

fn default_provider() -> String {
    "openai".into()
}

fn default_model() -> String {
    DEFAULT_MODEL.into()
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.into()
}

fn default_temperature() -> f64 {
    0.7
}

/// Parse a sampling temperature in `0.0..=2.0`.
pub fn parse_temperature(s: &str) -> std::result::Result<f64, String> {
    let t: f64 = s.trim().parse().map_err(|e| format!("{e}"))?;
    if !(0.0..=2.0).contains(&t) {
        return Err("temperature must be between 0.0 and 2.0".to_string());
    }
    Ok(t)
}

// ── Gateway ──────────────────────────────────────────────────────

/// Gateway server configuration (`[gateway]` section).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GatewayConfig {
    /// Gateway port (default: 8000)
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    /// Gateway host (default: 0.0.0.0)
    #[serde(default = "default_gateway_host")]
    pub host: String,
    /// Timeout for plain HTTP requests. WebSocket sessions are not affected.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Maximum accepted request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_gateway_port() -> u16 {
    8000
}

fn default_gateway_host() -> String {
    "0.0.0.0".into()
}

fn default_request_timeout_secs() -> u64 {
    300
}

fn default_max_body_bytes() -> usize {
    65_536
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            host: default_gateway_host(),
            request_timeout_secs: default_request_timeout_secs(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

// ── Fixtures ─────────────────────────────────────────────────────

/// Fixture data configuration (`[fixtures]` section).
///
/// When `data_dir` is unset the JSON fixtures compiled into the binary are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct FixturesConfig {
    /// Directory holding `inventory.json`, `orders.json`, `products.json`,
    /// `customers.json` and `salesHistory.json`. `~` is expanded.
    #[serde(default)]
    pub data_dir: Option<String>,
}

impl FixturesConfig {
    pub fn resolved_data_dir(&self) -> Option<PathBuf> {
        let raw = self.data_dir.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        Some(PathBuf::from(shellexpand::tilde(raw).into_owned()))
    }
}

// ── Config impl ──────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        let config_dir = default_config_dir().unwrap_or_else(|_| PathBuf::from(".stockchat"));

        Self {
            config_path: config_dir.join(CONFIG_FILE_NAME),
            api_key: None,
            api_url: None,
            default_provider: default_provider(),
            default_model: default_model(),
            system_prompt: default_system_prompt(),
            default_temperature: default_temperature(),
            gateway: GatewayConfig::default(),
            fixtures: FixturesConfig::default(),
        }
    }
}

fn default_config_dir() -> Result<PathBuf> {
    let home = UserDirs::new()
        .map(|u| u.home_dir().to_path_buf())
        .context("Could not find home directory")?;
    Ok(home.join(".stockchat"))
}

fn resolve_config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("STOCKCHAT_CONFIG_DIR") {
        let dir = dir.trim();
        if !dir.is_empty() {
            return Ok(PathBuf::from(shellexpand::tilde(dir).into_owned()));
        }
    }
    default_config_dir()
}

impl Config {
    pub async fn load_or_init() -> Result<Self> {
        let config_dir = resolve_config_dir()?;
        let mut config = Self::load_or_init_at(&config_dir).await?;
        config.apply_env_overrides();
        config.validate()?;
        tracing::info!(
            path = %config.config_path.display(),
            model = %config.default_model,
            credential = config.credential().is_some(),
            "Config loaded"
        );
        Ok(config)
    }

    /// Read `config.toml` from `config_dir`, writing defaults first when the
    /// file does not exist yet. Environment overrides are not applied here.
    pub async fn load_or_init_at(config_dir: &Path) -> Result<Self> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        fs::create_dir_all(config_dir).await.with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        if config_path.exists() {
            let contents = fs::read_to_string(&config_path)
                .await
                .context("Failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            config.config_path = config_path;
            Ok(config)
        } else {
            let mut config = Config::default();
            config.config_path = config_path.clone();
            config.save().await?;

            // Restrict permissions on newly created config file (may contain API keys)
            #[cfg(unix)]
            {
                use std::{fs::Permissions, os::unix::fs::PermissionsExt};
                let _ = fs::set_permissions(&config_path, Permissions::from_mode(0o600)).await;
            }

            tracing::info!(path = %config_path.display(), "Wrote default config");
            Ok(config)
        }
    }

    /// Validate configuration values that would cause runtime failures.
    pub fn validate(&self) -> Result<()> {
        if self.gateway.host.trim().is_empty() {
            anyhow::bail!("gateway.host must not be empty");
        }
        if self.gateway.max_body_bytes == 0 {
            anyhow::bail!("gateway.max_body_bytes must be greater than 0");
        }
        if self.default_provider.trim().is_empty() {
            anyhow::bail!("default_provider must not be empty");
        }
        if self.default_model.trim().is_empty() {
            anyhow::bail!("default_model must not be empty");
        }
        if !(0.0..=2.0).contains(&self.default_temperature) {
            anyhow::bail!(
                "default_temperature must be between 0.0 and 2.0 (got {})",
                self.default_temperature
            );
        }
        Ok(())
    }

    /// The provider credential, if one is configured and non-blank.
    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// Apply environment variable overrides to config
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable lookup. The first non-empty
    /// candidate in each list wins.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |names: &[&str]| -> Option<String> {
            names
                .iter()
                .filter_map(|name| lookup(*name))
                .map(|value| value.trim().to_string())
                .find(|value| !value.is_empty())
        };

        if let Some(key) = first(&["STOCKCHAT_API_KEY", "OPENAI_API_KEY"]) {
            self.api_key = Some(key);
        }

        if let Some(url) = first(&["STOCKCHAT_API_URL", "OPENAI_BASE_URL"]) {
            self.api_url = Some(url);
        }

        if let Some(provider) = first(&["STOCKCHAT_PROVIDER"]) {
            self.default_provider = provider;
        }

        if let Some(model) = first(&["STOCKCHAT_MODEL", "OPENAI_MODEL"]) {
            self.default_model = model;
        }

        if let Some(prompt) = first(&["SYSTEM_PROMPT"]) {
            self.system_prompt = prompt;
        }

        if let Some(port_str) = first(&["STOCKCHAT_GATEWAY_PORT", "PORT"]) {
            match port_str.parse::<u16>() {
                Ok(port) => self.gateway.port = port,
                Err(_) => tracing::warn!(value = %port_str, "Ignoring invalid gateway port override"),
            }
        }

        if let Some(host) = first(&["STOCKCHAT_GATEWAY_HOST", "HOST"]) {
            self.gateway.host = host;
        }

        if let Some(temp_str) = first(&["STOCKCHAT_TEMPERATURE"]) {
            match parse_temperature(&temp_str) {
                Ok(temp) => self.default_temperature = temp,
                Err(e) => {
                    tracing::warn!(value = %temp_str, "Ignoring invalid temperature override: {e}");
                }
            }
        }

        if let Some(dir) = first(&["STOCKCHAT_DATA_DIR"]) {
            self.fixtures.data_dir = Some(dir);
        }
    }

    pub async fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;

        let parent_dir = self
            .config_path
            .parent()
            .context("Config path must have a parent directory")?;

        fs::create_dir_all(parent_dir).await.with_context(|| {
            format!(
                "Failed to create config directory: {}",
                parent_dir.display()
            )
        })?;

        let temp_path = parent_dir.join(format!(".{CONFIG_FILE_NAME}.tmp-{}", uuid::Uuid::new_v4()));

        let mut temp_file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .with_context(|| format!("Failed to create {}", temp_path.display()))?;
        temp_file
            .write_all(toml_str.as_bytes())
            .await
            .context("Failed to write config")?;
        temp_file.sync_all().await.context("Failed to sync config")?;
        drop(temp_file);

        fs::rename(&temp_path, &self.config_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to move config into place at {}",
                    self.config_path.display()
                )
            })?;

        Ok(())
    }
}
