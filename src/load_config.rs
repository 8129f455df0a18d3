/// `load_config` module: Loads a static YAML config and injects secrets from the environment.
///
/// This module is the only place where the YAML file and the process environment are read.
/// Everything downstream receives an explicit [`AppConfig`].
///
/// # Responsibilities
/// - Parse the user-supplied YAML file into typed sections
/// - Inject `GITHUB_TOKEN`, `ALGOLIA_APP_ID`, `ALGOLIA_API_KEY` and `ALGOLIA_INDEX_NAME`
/// - Leave the index configuration empty when credentials are absent, so replay runs
///   work without any secrets; live runs ask for it through [`AppConfig::require_index`]
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::Result;
use issue_sync_core::config::{RunMode, SourceRepo, SyncConfig};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_MAX_POLLS: u32 = 600;

#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub api_url: String,
    pub token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub app_id: String,
    pub api_key: String,
    pub index_name: String,
    pub host: String,
    pub batch_size: usize,
    pub poll_interval: Duration,
    pub max_polls: u32,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub sync: SyncConfig,
    pub github: GitHubConfig,
    pub index: Option<IndexConfig>,
}

impl AppConfig {
    /// Index settings, or an error naming what is missing. Needed for live runs only.
    pub fn require_index(&self) -> Result<&IndexConfig> {
        self.index.as_ref().ok_or_else(|| {
            anyhow::anyhow!(
                "Live runs need ALGOLIA_APP_ID, ALGOLIA_API_KEY and an index name (index.name or ALGOLIA_INDEX_NAME)"
            )
        })
    }
}

#[derive(Debug, Deserialize)]
struct SyncSection {
    #[serde(default)]
    mode: RunMode,
    data_dir: PathBuf,
    #[serde(default)]
    max_pages: Option<u32>,
    #[serde(default)]
    unordered_fields: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct GitHubSection {
    #[serde(default)]
    api_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct IndexSection {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    batch_size: Option<usize>,
    #[serde(default)]
    poll_interval_ms: Option<u64>,
    #[serde(default)]
    max_polls: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    sync: SyncSection,
    #[serde(default)]
    github: GitHubSection,
    #[serde(default)]
    sources: Vec<SourceRepo>,
    #[serde(default)]
    index: IndexSection,
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Loads a static YAML config file (no secrets) and injects the secrets from env vars.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let raw: RawConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    let mut sync = SyncConfig::new(raw.sync.data_dir, raw.sources);
    sync.mode = raw.sync.mode;
    sync.max_pages = raw.sync.max_pages;
    if let Some(fields) = raw.sync.unordered_fields {
        sync.unordered_fields = fields;
    }
    if sync.max_pages == Some(0) {
        anyhow::bail!("sync.max_pages must be at least 1 when set");
    }
    if let Err(e) = sync.validate() {
        error!(error = %e, config_path = ?path_ref, "Invalid sources section");
        return Err(anyhow::anyhow!("Invalid sources in config: {e}"));
    }

    let github = GitHubConfig {
        api_url: raw
            .github
            .api_url
            .unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string()),
        token: env_non_empty("GITHUB_TOKEN"),
    };
    info!(
        api_url = %github.api_url,
        token_set = github.token.is_some(),
        "GitHub settings resolved"
    );

    let index = match (
        env_non_empty("ALGOLIA_APP_ID"),
        env_non_empty("ALGOLIA_API_KEY"),
        raw.index.name.or_else(|| env_non_empty("ALGOLIA_INDEX_NAME")),
    ) {
        (Some(app_id), Some(api_key), Some(index_name)) => {
            let host = raw
                .index
                .host
                .unwrap_or_else(|| format!("https://{app_id}.algolia.net"));
            info!(index_name = %index_name, host = %host, "Index settings resolved");
            Some(IndexConfig {
                app_id,
                api_key,
                index_name,
                host,
                batch_size: raw.index.batch_size.unwrap_or(DEFAULT_BATCH_SIZE).max(1),
                poll_interval: Duration::from_millis(
                    raw.index.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS),
                ),
                max_polls: raw.index.max_polls.unwrap_or(DEFAULT_MAX_POLLS),
            })
        }
        (app_id, api_key, index_name) => {
            info!(
                app_id_set = app_id.is_some(),
                api_key_set = api_key.is_some(),
                index_name_set = index_name.is_some(),
                "Index credentials incomplete, uploads unavailable"
            );
            None
        }
    };

    Ok(AppConfig {
        sync,
        github,
        index,
    })
}
