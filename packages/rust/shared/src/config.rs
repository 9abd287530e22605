//! Application configuration for notepress.
//!
//! User config lives at `~/.notepress/notepress.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{NotepressError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "notepress.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".notepress";

// ---------------------------------------------------------------------------
// Config structs (matching notepress.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Document API connection settings.
    #[serde(default)]
    pub notion: NotionConfig,

    /// Content fetching and normalization.
    #[serde(default)]
    pub content: ContentConfig,

    /// Asset URL handling.
    #[serde(default)]
    pub assets: AssetsConfig,
}

/// `[notion]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotionConfig {
    /// Name of the env var holding the integration token (never store the token itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// API base URL. Overridden in tests.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Value sent in the `Notion-Version` header.
    #[serde(default = "default_notion_version")]
    pub notion_version: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Minimum ms between consecutive API requests.
    #[serde(default = "default_min_request_interval")]
    pub min_request_interval_ms: u64,

    /// How many times a rate-limited request is retried.
    #[serde(default = "default_rate_limit_retries")]
    pub max_rate_limit_retries: u32,
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            notion_version: default_notion_version(),
            timeout_secs: default_timeout_secs(),
            min_request_interval_ms: default_min_request_interval(),
            max_rate_limit_retries: default_rate_limit_retries(),
        }
    }
}

fn default_api_key_env() -> String {
    "NOTION_API_KEY".into()
}
fn default_base_url() -> String {
    "https://api.notion.com".into()
}
fn default_notion_version() -> String {
    "2022-06-28".into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_min_request_interval() -> u64 {
    334
}
fn default_rate_limit_retries() -> u32 {
    3
}

/// `[content]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    /// Page size for search and block-children listings (API maximum is 100).
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Deepest block nesting that is fetched.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Retries for a failed child-block listing before it is marked failed.
    #[serde(default = "default_child_fetch_retries")]
    pub child_fetch_retries: u32,

    /// Base backoff between child-listing retries.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_depth: default_max_depth(),
            child_fetch_retries: default_child_fetch_retries(),
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

fn default_page_size() -> u32 {
    100
}
fn default_max_depth() -> usize {
    32
}
fn default_child_fetch_retries() -> u32 {
    2
}
fn default_retry_backoff() -> u64 {
    500
}

/// How asset URLs are rewritten.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetStrategyKind {
    /// Rewrite signed storage URLs to the public image proxy.
    #[default]
    Proxy,
    /// Serve prefetched local copies listed in the mapping file.
    LocalMapping,
}

/// `[assets]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsConfig {
    #[serde(default)]
    pub strategy: AssetStrategyKind,

    /// Host of the public image proxy.
    #[serde(default = "default_proxy_host")]
    pub proxy_host: String,

    /// JSON file mapping stable URLs to local paths.
    #[serde(default = "default_mapping_file")]
    pub mapping_file: String,

    /// Directory prefetched images are written to.
    #[serde(default = "default_assets_output_dir")]
    pub output_dir: String,

    /// URL prefix under which `output_dir` is served.
    #[serde(default = "default_public_prefix")]
    pub public_prefix: String,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            strategy: AssetStrategyKind::default(),
            proxy_host: default_proxy_host(),
            mapping_file: default_mapping_file(),
            output_dir: default_assets_output_dir(),
            public_prefix: default_public_prefix(),
        }
    }
}

fn default_proxy_host() -> String {
    "www.notion.so".into()
}
fn default_mapping_file() -> String {
    "public/images/image-mapping.json".into()
}
fn default_assets_output_dir() -> String {
    "public/images".into()
}
fn default_public_prefix() -> String {
    "/images".into()
}

// ---------------------------------------------------------------------------
// Fetch options (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime fetch configuration derived from `[content]`.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub page_size: u32,
    pub max_depth: usize,
    pub child_fetch_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for FetchOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            // The API rejects page sizes above 100.
            page_size: config.content.page_size.clamp(1, 100),
            max_depth: config.content.max_depth,
            child_fetch_retries: config.content.child_fetch_retries,
            retry_backoff_ms: config.content.retry_backoff_ms,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.notepress/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| NotepressError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.notepress/notepress.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| NotepressError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| NotepressError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| NotepressError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| NotepressError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| NotepressError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the integration token from the env var named in the config.
pub fn api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.notion.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(NotepressError::config(format!(
            "Notion API key not found. Set the {var_name} environment variable.\n\
             Create an integration at https://www.notion.so/my-integrations"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("NOTION_API_KEY"));
        assert!(toml_str.contains("strategy = \"proxy\""));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.notion.min_request_interval_ms, 334);
        assert_eq!(parsed.content.max_depth, 32);
        assert_eq!(parsed.assets.proxy_host, "www.notion.so");
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let toml_str = r#"
[notion]
base_url = "http://127.0.0.1:9999"

[assets]
strategy = "local-mapping"
mapping_file = "/tmp/mapping.json"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.notion.base_url, "http://127.0.0.1:9999");
        assert_eq!(config.notion.notion_version, "2022-06-28");
        assert_eq!(config.assets.strategy, AssetStrategyKind::LocalMapping);
        assert_eq!(config.assets.public_prefix, "/images");
        assert_eq!(config.content.page_size, 100);
    }

    #[test]
    fn fetch_options_clamp_page_size() {
        let mut app = AppConfig::default();
        app.content.page_size = 500;
        let options = FetchOptions::from(&app);
        assert_eq!(options.page_size, 100);
        assert_eq!(options.child_fetch_retries, 2);

        app.content.page_size = 0;
        assert_eq!(FetchOptions::from(&app).page_size, 1);
    }

    #[test]
    fn api_key_missing() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.notion.api_key_env = "NP_TEST_NONEXISTENT_KEY_12345".into();
        let result = api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
