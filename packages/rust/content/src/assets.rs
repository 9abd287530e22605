//! Asset URL stabilization.
//!
//! Hosted files come back as signed storage URLs that expire within the
//! hour. They are rewritten to the public image proxy, or to prefetched
//! local copies listed in an [`ImageMapping`].

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use notepress_shared::{
    AssetReference, AssetStrategyKind, AssetsConfig, NotepressError, Result,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

/// Host prefix of the current signed file storage.
const SIGNED_STORAGE_PREFIX: &str = "prod-files-secure.s3";

/// Legacy signed file storage host.
const LEGACY_STORAGE_HOST: &str = "s3.us-west-2.amazonaws.com";

/// Default image proxy host.
pub const DEFAULT_PROXY_HOST: &str = "www.notion.so";

static WORKSPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"amazonaws\.com/([^/]+)/").expect("valid regex"));

/// Whether `url` points at signed, expiring file storage.
pub fn is_signed_storage_url(url: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(is_storage_host))
        .unwrap_or(false)
}

fn is_storage_host(host: &str) -> bool {
    host == LEGACY_STORAGE_HOST
        || (host.starts_with(SIGNED_STORAGE_PREFIX) && host.ends_with(".amazonaws.com"))
}

/// Rewrite a signed storage URL to the public image proxy.
///
/// Anything that is not a signed storage URL is returned unchanged, which
/// makes the rewrite idempotent: the proxy URL's host is the proxy host even
/// though its encoded path still names the storage host.
pub fn stabilize(url: &str, block_id: &str, proxy_host: &str) -> String {
    if !is_signed_storage_url(url) {
        return url.to_string();
    }

    let base = url.split_once('?').map_or(url, |(base, _)| base);
    let workspace_id = WORKSPACE_RE
        .captures(base)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str());

    let mut stable = format!(
        "https://{proxy_host}/image/{}?table=block&id={block_id}",
        encode_component(base)
    );
    if let Some(workspace_id) = workspace_id {
        stable.push_str("&spaceId=");
        stable.push_str(workspace_id);
    }
    stable.push_str("&cache=v2");
    stable
}

/// Percent-encode a full URL for use as a single path segment.
fn encode_component(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

// ---------------------------------------------------------------------------
// ImageMapping
// ---------------------------------------------------------------------------

/// Stable asset URL to locally served path, persisted as a flat JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageMapping {
    entries: BTreeMap<String, String>,
}

impl ImageMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a mapping file. A missing file is an empty mapping.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(?path, "image mapping not found, starting empty");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| NotepressError::io(path, e))?;
        serde_json::from_str(&content).map_err(|e| {
            NotepressError::parse(format!("invalid image mapping {}: {e}", path.display()))
        })
    }

    /// Write the mapping as pretty-printed JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| NotepressError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| NotepressError::parse(format!("failed to serialize mapping: {e}")))?;
        std::fs::write(path, json).map_err(|e| NotepressError::io(path, e))
    }

    pub fn get(&self, stable_url: &str) -> Option<&str> {
        self.entries.get(stable_url).map(String::as_str)
    }

    pub fn insert(&mut self, stable_url: impl Into<String>, local_path: impl Into<String>) {
        self.entries.insert(stable_url.into(), local_path.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// AssetStrategy
// ---------------------------------------------------------------------------

/// The single way asset URLs are rewritten during one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetStrategy {
    /// Live rewrite to the image proxy.
    Proxy { host: String },
    /// Rewrite to the proxy, then substitute the prefetched local path when
    /// one is mapped.
    LocalMapping { host: String, mapping: ImageMapping },
}

impl Default for AssetStrategy {
    fn default() -> Self {
        Self::Proxy {
            host: DEFAULT_PROXY_HOST.to_string(),
        }
    }
}

impl AssetStrategy {
    /// Build the configured strategy, loading the mapping file if needed.
    pub fn from_config(config: &AssetsConfig) -> Result<Self> {
        let host = config.proxy_host.clone();
        match config.strategy {
            AssetStrategyKind::Proxy => Ok(Self::Proxy { host }),
            AssetStrategyKind::LocalMapping => {
                let mapping = ImageMapping::load(Path::new(&config.mapping_file))?;
                debug!(entries = mapping.len(), "loaded image mapping");
                Ok(Self::LocalMapping { host, mapping })
            }
        }
    }

    pub fn proxy_host(&self) -> &str {
        match self {
            Self::Proxy { host } | Self::LocalMapping { host, .. } => host,
        }
    }

    /// Final URL for an asset referenced by `block_id`. Empty stays empty.
    pub fn resolve(&self, url: &str, block_id: &str) -> String {
        if url.is_empty() {
            return String::new();
        }
        let stable = stabilize(url, block_id, self.proxy_host());
        match self {
            Self::Proxy { .. } => stable,
            Self::LocalMapping { mapping, .. } => mapping
                .get(&stable)
                .map(str::to_string)
                .unwrap_or(stable),
        }
    }

    pub fn reference(&self, url: &str, block_id: &str) -> AssetReference {
        AssetReference {
            original_url: url.to_string(),
            stable_url: self.resolve(url, block_id),
        }
    }
}
