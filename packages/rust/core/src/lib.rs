//! Core orchestration for notepress.
//!
//! [`PostFetcher`] turns the document API into published posts with
//! normalized content. The pipelines on top of it export a bundle for the
//! site renderer and pre-fetch images for local serving.

pub mod bundle;
pub mod fetcher;
pub mod pipeline;
pub mod prefetch;
pub mod slug;

pub use bundle::{BundleConfig, BundleResult, validate_bundle, write_bundle};
pub use fetcher::{DEFAULT_CATEGORY, PostFetcher};
pub use pipeline::{
    ExportConfig, ExportResult, ImagesResult, ProgressReporter, SilentProgress, export_bundle,
    prefetch_images,
};
pub use prefetch::{ImagePrefetcher, PrefetchConfig, PrefetchResult, collect_image_urls};
pub use slug::{build_composite_slug, identity_for, resolve_page_id, slugify};
