use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::{AppError, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub github: GitHubConfig,
    pub completion: CompletionConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub commit: CommitConfig,
    #[serde(default)]
    pub brain: BrainConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Deserialize, Clone)]
pub struct GitHubConfig {
    pub token: String,
    #[serde(default)]
    pub webhook_secret: String,
    #[serde(default = "default_trigger_label")]
    pub trigger_label: String,
}

// Manual Debug impl to avoid leaking the token and webhook secret
impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("token", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .field("trigger_label", &self.trigger_label)
            .finish()
    }
}

#[derive(Deserialize, Clone)]
pub struct CompletionConfig {
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
}

// Manual Debug impl to avoid leaking the API key
impl std::fmt::Debug for CompletionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("max_turns", &self.max_turns)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkspaceConfig {
    #[serde(default = "default_workspace_dir")]
    pub base_dir: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            base_dir: default_workspace_dir(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: default_max_file_size(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CommitConfig {
    #[serde(default = "default_author_name")]
    pub author_name: String,
    #[serde(default = "default_author_email")]
    pub author_email: String,
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            author_name: default_author_name(),
            author_email: default_author_email(),
        }
    }
}

/// The `[brain]` table: a strategy id plus free-form strategy options.
#[derive(Debug, Deserialize, Clone)]
pub struct BrainConfig {
    #[serde(default = "default_brain_id")]
    pub id: String,
    #[serde(flatten)]
    pub options: BrainOptions,
}

impl Default for BrainConfig {
    fn default() -> Self {
        Self {
            id: default_brain_id(),
            options: BrainOptions::default(),
        }
    }
}

/// Strategy options keyed by name.
///
/// Keys a strategy does not recognize are never an error; the brain reports
/// them as unused when it is constructed.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct BrainOptions(BTreeMap<String, serde_json::Value>);

impl BrainOptions {
    pub fn new(options: BTreeMap<String, serde_json::Value>) -> Self {
        Self(options)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Read a typed option, `None` when absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.0
            .get(key)
            .map(|value| {
                serde_json::from_value(value.clone()).map_err(|e| {
                    AppError::Config(format!("Invalid value for brain option `{key}`: {e}"))
                })
            })
            .transpose()
    }

    /// Option keys not present in `known`, in sorted order.
    pub fn unused(&self, known: &[&str]) -> Vec<String> {
        self.0
            .keys()
            .filter(|key| !known.contains(&key.as_str()))
            .cloned()
            .collect()
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_trigger_label() -> String {
    "hyphae".to_string()
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    16384
}

fn default_max_turns() -> u32 {
    50
}

fn default_workspace_dir() -> PathBuf {
    PathBuf::from("/tmp/hyphae-workspaces")
}

fn default_max_file_size() -> usize {
    512 * 1024 // 512 KB
}

fn default_author_name() -> String {
    "Hyphae Bot".to_string()
}

fn default_author_email() -> String {
    "hyphae[bot]@users.noreply.github.com".to_string()
}

fn default_brain_id() -> String {
    "linear-v1".to_string()
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        } else {
            builder = builder.add_source(config::File::with_name("hyphae").required(false));
        }

        // Environment variable overrides with HYPHAE_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("HYPHAE")
                .separator("__")
                .try_parsing(true),
        );

        Self::from_builder(builder)
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        let config = builder.build()?;
        config.try_deserialize().map_err(AppError::from)
    }

    pub fn webhook_secret(&self) -> &str {
        &self.github.webhook_secret
    }

    pub fn github_token(&self) -> &str {
        &self.github.token
    }

    pub fn completion_api_key(&self) -> &str {
        &self.completion.api_key
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Config with test credentials and every other table defaulted.
    pub fn config() -> AppConfig {
        AppConfig::from_builder(config::Config::builder().add_source(config::File::from_str(
            r#"
            [github]
            token = "ghp_test"
            webhook_secret = "s3cret"

            [completion]
            api_key = "sk-test"
            "#,
            config::FileFormat::Toml,
        )))
        .unwrap()
    }
}
