//! Block content extraction: vendor payload in, structured content out.
//!
//! Extraction is total. A payload that is missing or has an unexpected shape
//! yields empty content, never an error.

use notepress_notion::raw;
use notepress_notion::{
    BookmarkPayload, CodePayload, MediaPayload, RawBlock, RawRichText, TextPayload,
    VendorBlockType,
};
use notepress_shared::RichTextRun;
use serde::Deserialize;
use serde_json::Value;

/// Language reported for code blocks that carry none.
pub const DEFAULT_CODE_LANGUAGE: &str = "text";

/// The structured content of one block, before it is given a final kind.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockContent {
    /// Ordered runs of a text-bearing block.
    Rich(Vec<RichTextRun>),
    Code { text: String, language: String },
    /// Image or video. An empty `url` means there is no asset.
    Media { url: String, caption: String },
    Bookmark { url: String, caption: String },
    /// Divider.
    Empty,
    /// A vendor type outside the supported set.
    Fallback {
        original_type: String,
        rich_text: Vec<RichTextRun>,
        fallback_text: String,
    },
}

/// Best-effort payload of an unknown block type.
#[derive(Debug, Default, Deserialize)]
struct FallbackPayload {
    #[serde(default)]
    rich_text: Vec<RawRichText>,
    #[serde(default)]
    title: Vec<RawRichText>,
    #[serde(default)]
    text: Option<Value>,
}

/// Extract the content of one block according to its vendor type.
pub fn extract(block: &RawBlock) -> BlockContent {
    match block.kind() {
        VendorBlockType::Paragraph
        | VendorBlockType::Heading(_)
        | VendorBlockType::BulletedListItem
        | VendorBlockType::NumberedListItem
        | VendorBlockType::Quote => {
            let payload: TextPayload = block.payload_as();
            BlockContent::Rich(to_runs(&payload.rich_text))
        }
        VendorBlockType::Code => {
            let payload: CodePayload = block.payload_as();
            let language = payload
                .language
                .filter(|lang| !lang.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CODE_LANGUAGE.to_string());
            BlockContent::Code {
                text: raw::plain_text(&payload.rich_text),
                language,
            }
        }
        VendorBlockType::Image | VendorBlockType::Video => {
            let payload: MediaPayload = block.payload_as();
            BlockContent::Media {
                url: payload.url(),
                caption: raw::plain_text(&payload.caption),
            }
        }
        VendorBlockType::Bookmark => {
            let payload: BookmarkPayload = block.payload_as();
            BlockContent::Bookmark {
                url: payload.url,
                caption: raw::plain_text(&payload.caption),
            }
        }
        VendorBlockType::Divider => BlockContent::Empty,
        VendorBlockType::Unsupported(original_type) => fallback(block, original_type),
    }
}

fn fallback(block: &RawBlock, original_type: String) -> BlockContent {
    let payload: FallbackPayload = block.payload_as();
    let items = if payload.rich_text.is_empty() {
        &payload.title
    } else {
        &payload.rich_text
    };

    let mut fallback_text = raw::plain_text(items);
    if fallback_text.is_empty() {
        if let Some(Value::String(text)) = &payload.text {
            fallback_text = text.clone();
        }
    }

    BlockContent::Fallback {
        original_type,
        rich_text: to_runs(items),
        fallback_text,
    }
}

/// Convert API rich-text items into runs, keeping reading order.
pub fn to_runs(items: &[RawRichText]) -> Vec<RichTextRun> {
    items
        .iter()
        .map(|item| RichTextRun {
            text: item.plain_text.clone(),
            link: item.href.clone().filter(|href| !href.is_empty()),
            style: item.annotations,
        })
        .collect()
}
