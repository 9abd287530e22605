//! Bundle writer.
//!
//! Serializes fetched posts into a directory the site renderer reads at
//! build time, then records every file with its checksum in a manifest.

use std::path::{Path, PathBuf};

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use notepress_content::blocks_to_markdown;
use notepress_shared::{
    BundleFile, BundleManifest, CURRENT_SCHEMA_VERSION, NotepressError, Post, PostDetail, Result,
};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const POSTS_INDEX_FILE: &str = "posts.json";
pub const POSTS_DIR: &str = "posts";

/// Configuration for a bundle export.
#[derive(Debug, Clone)]
pub struct BundleConfig {
    /// Bundle root directory; created if missing.
    pub out_dir: PathBuf,
    /// Tool version string.
    pub tool_version: String,
}

/// Output from a successful bundle write.
#[derive(Debug, Clone)]
pub struct BundleResult {
    pub out_dir: PathBuf,
    pub post_count: usize,
    pub manifest: BundleManifest,
}

/// Write a complete bundle.
///
/// Layout:
/// ```text
/// <out_dir>/
/// ├── manifest.json
/// ├── posts.json
/// └── posts/
///     ├── <slug>.json
///     └── <slug>.md
/// ```
///
/// The manifest is written last, so a bundle with a manifest is complete.
#[instrument(skip_all, fields(out_dir = %config.out_dir.display(), posts = details.len()))]
pub fn write_bundle(config: &BundleConfig, details: &[PostDetail]) -> Result<BundleResult> {
    let root = &config.out_dir;
    let posts_dir = root.join(POSTS_DIR);
    std::fs::create_dir_all(&posts_dir).map_err(|e| NotepressError::io(&posts_dir, e))?;

    let mut files = Vec::with_capacity(details.len() * 2 + 1);

    let index: Vec<&Post> = details.iter().map(|d| &d.post).collect();
    files.push(write_file(root, POSTS_INDEX_FILE, &to_json(&index)?)?);

    for detail in details {
        let stem = file_stem(detail.post.slug());
        files.push(write_file(
            root,
            &format!("{POSTS_DIR}/{stem}.json"),
            &to_json(detail)?,
        )?);

        let mut markdown = blocks_to_markdown(&detail.blocks);
        markdown.push('\n');
        files.push(write_file(root, &format!("{POSTS_DIR}/{stem}.md"), &markdown)?);
    }

    let manifest = BundleManifest {
        schema_version: CURRENT_SCHEMA_VERSION,
        tool_version: config.tool_version.clone(),
        generated_at: Utc::now(),
        post_count: details.len(),
        files,
    };
    write_file(root, MANIFEST_FILE, &to_json(&manifest)?)?;

    info!(
        post_count = details.len(),
        files = manifest.files.len(),
        path = %root.display(),
        "bundle written"
    );

    Ok(BundleResult {
        out_dir: root.clone(),
        post_count: details.len(),
        manifest,
    })
}

/// Verify that a bundle directory is well-formed and its files are intact.
pub fn validate_bundle(out_dir: &Path) -> Result<BundleManifest> {
    let manifest_path = out_dir.join(MANIFEST_FILE);
    if !manifest_path.exists() {
        return Err(NotepressError::validation("missing manifest.json"));
    }

    let manifest: BundleManifest = read_json(&manifest_path, MANIFEST_FILE)?;
    if manifest.schema_version != CURRENT_SCHEMA_VERSION {
        return Err(NotepressError::validation(format!(
            "unsupported schema_version: {} (expected {})",
            manifest.schema_version, CURRENT_SCHEMA_VERSION
        )));
    }

    let posts: Vec<Post> = read_json(&out_dir.join(POSTS_INDEX_FILE), POSTS_INDEX_FILE)?;
    if posts.len() != manifest.post_count {
        return Err(NotepressError::validation(format!(
            "posts.json lists {} posts, manifest says {}",
            posts.len(),
            manifest.post_count
        )));
    }

    for post in &posts {
        let rel = format!("{POSTS_DIR}/{}.json", file_stem(post.slug()));
        if !manifest.files.iter().any(|f| f.path == rel) {
            return Err(NotepressError::validation(format!(
                "post {} has no detail file",
                post.slug()
            )));
        }
    }

    for file in &manifest.files {
        let path = out_dir.join(&file.path);
        let content = std::fs::read(&path).map_err(|e| NotepressError::io(&path, e))?;
        if sha256_hex(&content) != file.sha256 {
            return Err(NotepressError::validation(format!(
                "checksum mismatch for {}",
                file.path
            )));
        }
    }

    debug!(files = manifest.files.len(), "bundle validated");
    Ok(manifest)
}

/// File name stem for a post; composite slugs never contain path separators,
/// but explicit slug properties might.
pub fn file_stem(slug: &str) -> String {
    slug.replace(['/', '\\'], "_")
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn to_json<T: serde::Serialize + ?Sized>(data: &T) -> Result<String> {
    serde_json::to_string_pretty(data)
        .map_err(|e| NotepressError::validation(format!("JSON serialization failed: {e}")))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, label: &str) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| NotepressError::io(path, e))?;
    serde_json::from_str(&content)
        .map_err(|e| NotepressError::validation(format!("invalid {label}: {e}")))
}

/// Write `content` to `root/rel` via a temp file and rename.
fn write_file(root: &Path, rel: &str, content: &str) -> Result<BundleFile> {
    let target = root.join(rel);
    let dir = target.parent().unwrap_or(root);
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = dir.join(format!(".{name}.tmp"));

    std::fs::write(&temp, content).map_err(|e| NotepressError::io(&temp, e))?;
    std::fs::rename(&temp, &target).map_err(|e| NotepressError::io(&target, e))?;

    debug!(path = %rel, size = content.len(), "wrote bundle file");

    Ok(BundleFile {
        path: rel.to_string(),
        sha256: sha256_hex(content.as_bytes()),
        size_bytes: content.len(),
    })
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use notepress_shared::{
        HeadingLevel, NormalizedBlock, ParsedBlock, PostIdentity, RichTextRun, Taxon, TocEntry,
    };

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("np-bundle-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn detail(slug: &str, title: &str) -> PostDetail {
        let now = Utc::now();
        PostDetail {
            post: Post {
                id: "page-id".into(),
                identity: PostIdentity {
                    page_id: "page-id".into(),
                    title_slug: slug.into(),
                    composite_slug: slug.into(),
                },
                title: title.into(),
                published: true,
                created_at: now,
                published_at: now,
                updated_at: now,
                category: "Rust".into(),
                tags: vec![],
                excerpt: None,
                cover_image: None,
                reading_time: 3,
            },
            category: Taxon {
                name: "Rust".into(),
                slug: "rust".into(),
            },
            tags: vec![],
            blocks: vec![NormalizedBlock::leaf(
                "h",
                ParsedBlock::Heading {
                    level: HeadingLevel::One,
                    rich_text: vec![RichTextRun::plain(title)],
                },
            )],
            toc: vec![TocEntry {
                anchor_id: "heading-1".into(),
                title: title.into(),
                level: HeadingLevel::One,
                block_id: "h".into(),
            }],
            partial_content: false,
        }
    }

    fn config(out_dir: &Path) -> BundleConfig {
        BundleConfig {
            out_dir: out_dir.to_path_buf(),
            tool_version: "0.1.0-test".into(),
        }
    }

    #[test]
    fn writes_complete_layout() {
        let dir = temp_dir();
        let details = vec![detail("hello-abc", "Hello"), detail("second-def", "Second")];

        let result = write_bundle(&config(&dir), &details).unwrap();

        assert_eq!(result.post_count, 2);
        assert!(dir.join(MANIFEST_FILE).exists());
        assert!(dir.join(POSTS_INDEX_FILE).exists());
        assert!(dir.join("posts/hello-abc.json").exists());
        let md = std::fs::read_to_string(dir.join("posts/second-def.md")).unwrap();
        assert_eq!(md, "# Second\n");

        // index + 2 files per post
        assert_eq!(result.manifest.files.len(), 5);
        assert!(
            !std::fs::read_dir(dir.join(POSTS_DIR))
                .unwrap()
                .any(|e| e.unwrap().file_name().to_string_lossy().ends_with(".tmp"))
        );

        let restored: PostDetail = serde_json::from_str(
            &std::fs::read_to_string(dir.join("posts/hello-abc.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(restored, details[0]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn written_bundle_validates() {
        let dir = temp_dir();
        write_bundle(&config(&dir), &[detail("hello-abc", "Hello")]).unwrap();

        let manifest = validate_bundle(&dir).unwrap();
        assert_eq!(manifest.post_count, 1);
        assert_eq!(manifest.schema_version, CURRENT_SCHEMA_VERSION);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn empty_bundle_is_valid() {
        let dir = temp_dir();
        write_bundle(&config(&dir), &[]).unwrap();
        assert_eq!(validate_bundle(&dir).unwrap().post_count, 0);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn validate_rejects_missing_manifest() {
        let dir = temp_dir();
        let err = validate_bundle(&dir).unwrap_err();
        assert!(err.to_string().contains("manifest.json"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn validate_detects_tampering() {
        let dir = temp_dir();
        write_bundle(&config(&dir), &[detail("hello-abc", "Hello")]).unwrap();
        std::fs::write(dir.join("posts/hello-abc.md"), "# Changed\n").unwrap();

        let err = validate_bundle(&dir).unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn validate_rejects_wrong_schema_version() {
        let dir = temp_dir();
        write_bundle(&config(&dir), &[]).unwrap();

        let path = dir.join(MANIFEST_FILE);
        let mut manifest: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        manifest["schema_version"] = serde_json::json!(99);
        std::fs::write(&path, manifest.to_string()).unwrap();

        let err = validate_bundle(&dir).unwrap_err();
        assert!(err.to_string().contains("unsupported schema_version"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn file_stem_replaces_separators() {
        assert_eq!(file_stem("a/b\\c-123"), "a_b_c-123");
        assert_eq!(file_stem("plain-slug"), "plain-slug");
    }
}
