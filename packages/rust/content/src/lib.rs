//! Content normalization: vendor blocks to the internal document model.
//!
//! Pure and synchronous. The pipeline per block is
//! [`extract`](extract::extract) then [`parse`], with the active
//! [`AssetStrategy`] applied to media URLs inline. Pages are then summarized
//! by [`generate_toc`] and can be serialized with [`blocks_to_markdown`].

pub mod assets;
pub mod extract;
pub mod markdown;
pub mod parse;
pub mod rich_text;
pub mod toc;

pub use assets::{AssetStrategy, ImageMapping, is_signed_storage_url, stabilize};
pub use extract::{BlockContent, extract, to_runs};
pub use markdown::blocks_to_markdown;
pub use parse::{heading_level, parse};
pub use rich_text::{RenderNode, RenderTree, render};
pub use toc::{anchor_id, filter_by_level, generate_toc};
