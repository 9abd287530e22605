//! End-to-end build pipelines: document API → normalized posts → bundle, and
//! document API → downloaded images → mapping file.

use std::path::PathBuf;
use std::time::Instant;

use tracing::{info, instrument, warn};

use notepress_content::ImageMapping;
use notepress_notion::DocumentApi;
use notepress_shared::{NotepressError, PostDetail, Result};

use crate::bundle::{BundleConfig, write_bundle};
use crate::fetcher::PostFetcher;
use crate::prefetch::{ImagePrefetcher, PrefetchConfig, PrefetchResult};

/// Configuration for [`export_bundle`].
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub out_dir: PathBuf,
    pub tool_version: String,
}

/// Result of [`export_bundle`].
#[derive(Debug)]
pub struct ExportResult {
    pub out_dir: PathBuf,
    pub post_count: usize,
    /// Posts exported with some nested content missing.
    pub partial_posts: Vec<String>,
    pub elapsed: std::time::Duration,
}

/// Result of [`prefetch_images`].
#[derive(Debug)]
pub struct ImagesResult {
    pub mapping_file: PathBuf,
    pub mapped: usize,
    pub counts: PrefetchResult,
    pub elapsed: std::time::Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each post detail is fetched.
    fn post_fetched(&self, slug: &str, current: usize, total: usize);
    /// Called before each image is downloaded or skipped.
    fn image_processed(&self, url: &str, current: usize, total: usize);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn post_fetched(&self, _slug: &str, _current: usize, _total: usize) {}
    fn image_processed(&self, _url: &str, _current: usize, _total: usize) {}
}

/// Fetch every published post with its content and write a bundle.
///
/// 1. List published posts
/// 2. Fetch each post's detail
/// 3. Write the bundle directory
#[instrument(skip_all, fields(out_dir = %config.out_dir.display()))]
pub async fn export_bundle<A: DocumentApi>(
    fetcher: &PostFetcher<A>,
    config: &ExportConfig,
    progress: &dyn ProgressReporter,
) -> Result<ExportResult> {
    let start = Instant::now();

    progress.phase("Listing posts");
    let details = fetch_all_details(fetcher, progress).await?;

    let partial_posts: Vec<String> = details
        .iter()
        .filter(|d| d.partial_content)
        .map(|d| d.post.slug().to_string())
        .collect();
    if !partial_posts.is_empty() {
        warn!(count = partial_posts.len(), "exporting posts with partial content");
    }

    progress.phase("Writing bundle");
    let bundle = write_bundle(
        &BundleConfig {
            out_dir: config.out_dir.clone(),
            tool_version: config.tool_version.clone(),
        },
        &details,
    )?;

    let result = ExportResult {
        out_dir: bundle.out_dir,
        post_count: bundle.post_count,
        partial_posts,
        elapsed: start.elapsed(),
    };

    info!(
        post_count = result.post_count,
        partial = result.partial_posts.len(),
        elapsed_ms = result.elapsed.as_millis(),
        "export complete"
    );

    Ok(result)
}

/// Download every post image and merge the results into the mapping file.
///
/// Existing mapping entries are kept; the file is rewritten once at the end.
#[instrument(skip_all, fields(mapping_file = %mapping_file.display()))]
pub async fn prefetch_images<A: DocumentApi>(
    fetcher: &PostFetcher<A>,
    config: PrefetchConfig,
    mapping_file: PathBuf,
    progress: &dyn ProgressReporter,
) -> Result<ImagesResult> {
    let start = Instant::now();
    let mut mapping = ImageMapping::load(&mapping_file)?;
    let prefetcher = ImagePrefetcher::new(config)?;

    progress.phase("Listing posts");
    let details = fetch_all_details(fetcher, progress).await?;

    progress.phase("Downloading images");
    let mut counts = PrefetchResult::default();
    for detail in &details {
        let post_counts = prefetcher
            .prefetch_post(detail, &mut mapping, progress)
            .await?;
        counts.merge(&post_counts);
    }

    mapping.save(&mapping_file)?;

    let result = ImagesResult {
        mapping_file,
        mapped: mapping.len(),
        counts,
        elapsed: start.elapsed(),
    };

    info!(
        mapped = result.mapped,
        downloaded = result.counts.downloaded,
        failed = result.counts.failed,
        elapsed_ms = result.elapsed.as_millis(),
        "image prefetch complete"
    );

    Ok(result)
}

/// Details of all listed posts; posts that vanish after listing are skipped.
async fn fetch_all_details<A: DocumentApi>(
    fetcher: &PostFetcher<A>,
    progress: &dyn ProgressReporter,
) -> Result<Vec<PostDetail>> {
    let posts = fetcher.list_posts().await?;
    let total = posts.len();
    let mut details = Vec::with_capacity(total);

    for (i, post) in posts.iter().enumerate() {
        match fetcher.get_post_by_page_id(&post.id).await {
            Ok(detail) => {
                progress.post_fetched(post.slug(), i + 1, total);
                details.push(detail);
            }
            Err(NotepressError::PostNotFound { key }) => {
                warn!(%key, "post disappeared after listing, skipping");
            }
            Err(e) => return Err(e),
        }
    }

    Ok(details)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use notepress_content::AssetStrategy;
    use notepress_shared::FetchOptions;
    use serde_json::json;

    use crate::bundle::validate_bundle;
    use crate::fetcher::tests::{FakeApi, page, text_block};

    const PAGE_A: &str = "11111111-2222-3333-4444-555555555555";
    const PAGE_B: &str = "aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee";

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("np-pipeline-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn fetcher(api: FakeApi) -> PostFetcher<FakeApi> {
        PostFetcher::new(
            api,
            AssetStrategy::default(),
            FetchOptions {
                retry_backoff_ms: 0,
                ..FetchOptions::default()
            },
        )
    }

    #[derive(Default)]
    struct RecordingProgress {
        phases: Mutex<Vec<String>>,
        posts: Mutex<Vec<String>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn phase(&self, name: &str) {
            self.phases.lock().unwrap().push(name.to_string());
        }
        fn post_fetched(&self, slug: &str, _current: usize, _total: usize) {
            self.posts.lock().unwrap().push(slug.to_string());
        }
        fn image_processed(&self, _url: &str, _current: usize, _total: usize) {}
    }

    #[tokio::test]
    async fn export_writes_valid_bundle() {
        let api = FakeApi::default()
            .with_page(page(PAGE_A, "Alpha", true, "2024-01-01T00:00:00Z"))
            .with_page(page(PAGE_B, "Beta", true, "2024-02-01T00:00:00Z"))
            .with_children(
                PAGE_A,
                vec![
                    text_block("h", "heading_1", "Title", false),
                    text_block("t", "toggle", "more", true),
                ],
            )
            .failing("t", u32::MAX);

        let dir = temp_dir();
        let progress = RecordingProgress::default();
        let result = export_bundle(
            &fetcher(api),
            &ExportConfig {
                out_dir: dir.clone(),
                tool_version: "0.1.0-test".into(),
            },
            &progress,
        )
        .await
        .unwrap();

        assert_eq!(result.post_count, 2);
        assert_eq!(result.partial_posts, ["alpha-11111111222233334444555555555555"]);
        assert_eq!(progress.posts.lock().unwrap().len(), 2);
        assert_eq!(
            *progress.phases.lock().unwrap(),
            ["Listing posts", "Writing bundle"]
        );

        let manifest = validate_bundle(&dir).unwrap();
        assert_eq!(manifest.post_count, 2);
        let md = std::fs::read_to_string(
            dir.join("posts/alpha-11111111222233334444555555555555.md"),
        )
        .unwrap();
        assert!(md.starts_with("# Title"));
        assert!(md.contains("nested content unavailable"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn prefetch_merges_into_existing_mapping() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .insert_header("content-type", "image/webp")
                    .set_body_bytes(vec![0u8; 4]),
            )
            .mount(&server)
            .await;

        let image_url = format!("{}/shot.webp", server.uri());
        let api = FakeApi::default()
            .with_page(page(PAGE_A, "Alpha", true, "2024-01-01T00:00:00Z"))
            .with_children(
                PAGE_A,
                vec![json!({
                    "id": "img",
                    "type": "image",
                    "has_children": false,
                    "image": { "type": "external", "external": { "url": image_url } }
                })],
            );

        let dir = temp_dir();
        let mapping_file = dir.join("image-mapping.json");
        std::fs::write(&mapping_file, r#"{ "https://old.test/a.png": "/images/old/1.png" }"#)
            .unwrap();

        let result = prefetch_images(
            &fetcher(api),
            PrefetchConfig {
                output_dir: dir.join("images"),
                public_prefix: "/images".into(),
                timeout: std::time::Duration::from_secs(5),
            },
            mapping_file.clone(),
            &SilentProgress,
        )
        .await
        .unwrap();

        assert_eq!(result.counts.downloaded, 1);
        assert_eq!(result.mapped, 2);

        let saved = ImageMapping::load(&mapping_file).unwrap();
        assert_eq!(
            saved.get(&image_url),
            Some("/images/alpha-11111111222233334444555555555555/1.webp")
        );
        assert_eq!(saved.get("https://old.test/a.png"), Some("/images/old/1.png"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
