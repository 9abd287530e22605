//! Block mapper: raw vendor block to [`ParsedBlock`].

use notepress_notion::{RawBlock, VendorBlockType};
use notepress_shared::{HeadingLevel, ParsedBlock, RichTextRun};
use tracing::trace;

use crate::assets::AssetStrategy;
use crate::extract::{BlockContent, DEFAULT_CODE_LANGUAGE, extract};

/// Map one raw block into the internal schema.
///
/// Total: unknown or malformed blocks become [`ParsedBlock::Default`] or
/// carry empty content. Image and video URLs go through `assets`.
pub fn parse(block: &RawBlock, assets: &AssetStrategy) -> ParsedBlock {
    let content = extract(block);

    match block.kind() {
        VendorBlockType::Paragraph => ParsedBlock::Paragraph {
            rich_text: runs(content),
        },
        VendorBlockType::Heading(suffix) => ParsedBlock::Heading {
            level: heading_level(&suffix),
            rich_text: runs(content),
        },
        VendorBlockType::BulletedListItem => ParsedBlock::ListItem {
            ordered: false,
            rich_text: runs(content),
        },
        VendorBlockType::NumberedListItem => ParsedBlock::ListItem {
            ordered: true,
            rich_text: runs(content),
        },
        VendorBlockType::Quote => ParsedBlock::Quote {
            rich_text: runs(content),
        },
        VendorBlockType::Code => match content {
            BlockContent::Code { text, language } => ParsedBlock::Code { text, language },
            _ => ParsedBlock::Code {
                text: String::new(),
                language: DEFAULT_CODE_LANGUAGE.to_string(),
            },
        },
        VendorBlockType::Image => {
            let (url, caption) = media(content);
            ParsedBlock::Image {
                url: assets.resolve(&url, &block.id),
                caption,
            }
        }
        VendorBlockType::Video => {
            let (url, caption) = media(content);
            ParsedBlock::Video {
                url: assets.resolve(&url, &block.id),
                caption,
            }
        }
        VendorBlockType::Bookmark => match content {
            BlockContent::Bookmark { url, caption } => ParsedBlock::Bookmark { url, caption },
            _ => ParsedBlock::Bookmark {
                url: String::new(),
                caption: String::new(),
            },
        },
        VendorBlockType::Divider => ParsedBlock::Divider,
        VendorBlockType::Unsupported(original_type) => {
            trace!(block_id = %block.id, %original_type, "unsupported block type");
            match content {
                BlockContent::Fallback {
                    rich_text,
                    fallback_text,
                    ..
                } => ParsedBlock::Default {
                    original_type,
                    rich_text,
                    fallback_text,
                },
                _ => ParsedBlock::Default {
                    original_type,
                    rich_text: Vec::new(),
                    fallback_text: String::new(),
                },
            }
        }
    }
}

fn runs(content: BlockContent) -> Vec<RichTextRun> {
    match content {
        BlockContent::Rich(rich_text) => rich_text,
        _ => Vec::new(),
    }
}

fn media(content: BlockContent) -> (String, String) {
    match content {
        BlockContent::Media { url, caption } => (url, caption),
        _ => (String::new(), String::new()),
    }
}

/// Heading level from the numeric suffix of a `heading_N` tag.
///
/// Suffixes that are not 1, 2 or 3 map to level 1.
pub fn heading_level(suffix: &str) -> HeadingLevel {
    suffix
        .parse::<u8>()
        .ok()
        .and_then(|n| HeadingLevel::try_from(n).ok())
        .unwrap_or(HeadingLevel::One)
}
