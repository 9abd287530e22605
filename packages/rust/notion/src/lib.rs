//! Document API access: the raw wire model and a throttled HTTP client.
//!
//! The rest of notepress depends only on the [`DocumentApi`] trait and the
//! raw types re-exported here. Nothing outside this crate touches HTTP.

mod client;
pub mod raw;

pub use client::{ClientConfig, DocumentApi, NotionHttpClient};
pub use raw::{
    BookmarkPayload, CodePayload, MediaPayload, PaginatedList, RawBlock, RawPage, RawProperty,
    RawRichText, SearchResult, TextPayload, VendorBlockType,
};
