//! Build-time image pre-fetcher.
//!
//! Downloads every image a post references into the static output tree and
//! records `{stable url -> public path}` so later runs can serve them through
//! [`AssetStrategy::LocalMapping`](notepress_content::AssetStrategy).

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info, instrument, warn};
use url::Url;

use notepress_content::ImageMapping;
use notepress_shared::{AppConfig, NormalizedBlock, NotepressError, ParsedBlock, PostDetail, Result};

use crate::bundle::file_stem;
use crate::pipeline::ProgressReporter;

const USER_AGENT: &str = concat!("Notepress/", env!("CARGO_PKG_VERSION"));

/// Extension used when neither the response nor the URL names one.
const FALLBACK_EXTENSION: &str = "bin";

#[derive(Debug, Clone)]
pub struct PrefetchConfig {
    /// Directory images are written under, one subdirectory per post.
    pub output_dir: PathBuf,
    /// URL prefix the output directory is served from.
    pub public_prefix: String,
    pub timeout: Duration,
}

impl From<&AppConfig> for PrefetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            output_dir: PathBuf::from(&config.assets.output_dir),
            public_prefix: config.assets.public_prefix.clone(),
            timeout: Duration::from_secs(config.notion.timeout_secs),
        }
    }
}

/// Counts for one pre-fetch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefetchResult {
    pub downloaded: usize,
    /// Already on disk from an earlier run.
    pub skipped: usize,
    pub failed: usize,
}

impl PrefetchResult {
    pub fn merge(&mut self, other: &PrefetchResult) {
        self.downloaded += other.downloaded;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Image URLs of a post: the cover first, then image blocks depth-first.
///
/// Duplicates, empty URLs and already-local paths are dropped.
pub fn collect_image_urls(detail: &PostDetail) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    let mut push = |url: &str| {
        if !url.is_empty() && !url.starts_with('/') && seen.insert(url.to_string()) {
            urls.push(url.to_string());
        }
    };

    if let Some(cover) = &detail.post.cover_image {
        push(cover.as_str());
    }
    walk_images(&detail.blocks, &mut push);
    urls
}

fn walk_images(blocks: &[NormalizedBlock], push: &mut impl FnMut(&str)) {
    for block in blocks {
        if let ParsedBlock::Image { url, .. } = &block.block {
            push(url.as_str());
        }
        walk_images(&block.children, push);
    }
}

pub struct ImagePrefetcher {
    client: Client,
    config: PrefetchConfig,
}

impl ImagePrefetcher {
    pub fn new(config: PrefetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|e| NotepressError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Download the images of one post and record them in `mapping`.
    #[instrument(skip_all, fields(slug = %detail.post.slug()))]
    pub async fn prefetch_post(
        &self,
        detail: &PostDetail,
        mapping: &mut ImageMapping,
        progress: &dyn ProgressReporter,
    ) -> Result<PrefetchResult> {
        let stem = file_stem(detail.post.slug());
        let post_dir = self.config.output_dir.join(&stem);
        std::fs::create_dir_all(&post_dir).map_err(|e| NotepressError::io(&post_dir, e))?;

        let urls = collect_image_urls(detail);
        let total = urls.len();
        let mut result = PrefetchResult::default();

        for (i, url) in urls.iter().enumerate() {
            let ordinal = i + 1;
            progress.image_processed(url, ordinal, total);

            if let Some(existing) = find_existing(&post_dir, ordinal) {
                debug!(%url, file = %existing, "image already downloaded");
                mapping.insert(url.as_str(), self.public_path(&stem, &existing));
                result.skipped += 1;
                continue;
            }

            match self.download(url, &post_dir, ordinal).await {
                Ok(file_name) => {
                    mapping.insert(url.as_str(), self.public_path(&stem, &file_name));
                    result.downloaded += 1;
                }
                Err(e) => {
                    warn!(%url, error = %e, "image download failed, leaving unmapped");
                    result.failed += 1;
                }
            }
        }

        info!(
            images = total,
            downloaded = result.downloaded,
            skipped = result.skipped,
            failed = result.failed,
            "post images processed"
        );
        Ok(result)
    }

    async fn download(&self, url: &str, dir: &Path, ordinal: usize) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| NotepressError::Network(format!("GET {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotepressError::Network(format!("GET {url}: HTTP {status}")));
        }

        let extension = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(extension_for_content_type)
            .or_else(|| extension_from_url(url))
            .unwrap_or_else(|| FALLBACK_EXTENSION.to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| NotepressError::Network(format!("GET {url}: {e}")))?;

        let file_name = format!("{ordinal}.{extension}");
        let target = dir.join(&file_name);
        let temp = dir.join(format!(".{file_name}.tmp"));
        std::fs::write(&temp, &bytes).map_err(|e| NotepressError::io(&temp, e))?;
        std::fs::rename(&temp, &target).map_err(|e| NotepressError::io(&target, e))?;

        debug!(%url, file = %file_name, size = bytes.len(), "image downloaded");
        Ok(file_name)
    }

    fn public_path(&self, stem: &str, file_name: &str) -> String {
        format!(
            "{}/{stem}/{file_name}",
            self.config.public_prefix.trim_end_matches('/')
        )
    }
}

/// A file named `{ordinal}.*` from an earlier run.
fn find_existing(dir: &Path, ordinal: usize) -> Option<String> {
    let wanted = ordinal.to_string();
    std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .find(|name| {
            Path::new(name)
                .file_stem()
                .is_some_and(|stem| stem.to_string_lossy() == wanted)
        })
}

fn extension_for_content_type(content_type: &str) -> Option<String> {
    let mime = content_type.split(';').next()?.trim().to_ascii_lowercase();
    let ext = match mime.as_str() {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        "image/avif" => "avif",
        _ => return None,
    };
    Some(ext.to_string())
}

fn extension_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?.to_string();
    let (_, ext) = last.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    let plausible = (1..=5).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric());
    plausible.then_some(ext)
}
