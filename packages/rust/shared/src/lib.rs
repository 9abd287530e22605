//! Shared types, error model, and configuration for notepress.
//!
//! This crate is the foundation depended on by all other notepress crates.
//! It provides:
//! - [`NotepressError`]: the unified error type
//! - The normalized document model ([`ParsedBlock`], [`NormalizedBlock`], [`Post`], [`TocEntry`])
//! - Configuration ([`AppConfig`], [`FetchOptions`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, AssetStrategyKind, AssetsConfig, ContentConfig, FetchOptions, NotionConfig,
    api_key, config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{NotepressError, OBJECT_NOT_FOUND_CODE, Result};
pub use types::{
    AssetReference, BlockKind, BundleFile, BundleManifest, CURRENT_SCHEMA_VERSION,
    ChildrenStatus, HeadingLevel, NormalizedBlock, ParsedBlock, Post, PostDetail, PostIdentity,
    RichTextRun, Taxon, TextStyle, TocEntry, runs_plain_text,
};
