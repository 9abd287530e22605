//! Core domain types for the normalized document model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current schema version for the exported bundle manifest.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Rich text
// ---------------------------------------------------------------------------

/// Style annotations carried by one rich-text run. Absent flags are `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextStyle {
    pub bold: bool,
    pub italic: bool,
    pub strikethrough: bool,
    pub underline: bool,
    /// Inline code span.
    pub code: bool,
}

impl TextStyle {
    /// True when no annotation is set.
    pub fn is_plain(&self) -> bool {
        *self == Self::default()
    }
}

/// A contiguous span of text sharing one style and an optional link target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RichTextRun {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "TextStyle::is_plain")]
    pub style: TextStyle,
}

impl RichTextRun {
    /// An unstyled, unlinked run.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Concatenate the text of a run sequence in reading order.
pub fn runs_plain_text(runs: &[RichTextRun]) -> String {
    runs.iter().map(|run| run.text.as_str()).collect()
}

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

/// Heading depth. Only three levels exist in the normalized model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum HeadingLevel {
    One,
    Two,
    Three,
}

impl HeadingLevel {
    /// Numeric level (1-3).
    pub fn as_u8(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Three => 3,
        }
    }
}

impl From<HeadingLevel> for u8 {
    fn from(level: HeadingLevel) -> Self {
        level.as_u8()
    }
}

impl TryFrom<u8> for HeadingLevel {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            3 => Ok(Self::Three),
            other => Err(format!("heading level {other} is outside 1..=3")),
        }
    }
}

/// Flat block kind, for callers that only need the discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Paragraph,
    Heading1,
    Heading2,
    Heading3,
    BulletedItem,
    NumberedItem,
    Code,
    Quote,
    Image,
    Video,
    Bookmark,
    Divider,
    Default,
}

/// A vendor block after mapping into the closed internal schema.
///
/// Everything downstream of the block mapper works on this type and never on
/// the vendor payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParsedBlock {
    Paragraph {
        rich_text: Vec<RichTextRun>,
    },
    Heading {
        level: HeadingLevel,
        rich_text: Vec<RichTextRun>,
    },
    ListItem {
        ordered: bool,
        rich_text: Vec<RichTextRun>,
    },
    Code {
        text: String,
        language: String,
    },
    Quote {
        rich_text: Vec<RichTextRun>,
    },
    /// `url` is empty when the source had no asset; render nothing then.
    Image {
        url: String,
        caption: String,
    },
    Video {
        url: String,
        caption: String,
    },
    Divider,
    Bookmark {
        url: String,
        caption: String,
    },
    /// Any vendor block type outside the supported set.
    Default {
        original_type: String,
        rich_text: Vec<RichTextRun>,
        fallback_text: String,
    },
}

impl ParsedBlock {
    pub fn kind(&self) -> BlockKind {
        match self {
            Self::Paragraph { .. } => BlockKind::Paragraph,
            Self::Heading { level, .. } => match level {
                HeadingLevel::One => BlockKind::Heading1,
                HeadingLevel::Two => BlockKind::Heading2,
                HeadingLevel::Three => BlockKind::Heading3,
            },
            Self::ListItem { ordered: false, .. } => BlockKind::BulletedItem,
            Self::ListItem { ordered: true, .. } => BlockKind::NumberedItem,
            Self::Code { .. } => BlockKind::Code,
            Self::Quote { .. } => BlockKind::Quote,
            Self::Image { .. } => BlockKind::Image,
            Self::Video { .. } => BlockKind::Video,
            Self::Divider => BlockKind::Divider,
            Self::Bookmark { .. } => BlockKind::Bookmark,
            Self::Default { .. } => BlockKind::Default,
        }
    }

    /// The styled runs of text-bearing blocks.
    pub fn rich_text(&self) -> Option<&[RichTextRun]> {
        match self {
            Self::Paragraph { rich_text }
            | Self::Heading { rich_text, .. }
            | Self::ListItem { rich_text, .. }
            | Self::Quote { rich_text }
            | Self::Default { rich_text, .. } => Some(rich_text),
            _ => None,
        }
    }

    /// Flattened plain text: runs for text blocks, source for code, caption
    /// for media and bookmarks.
    pub fn plain_text(&self) -> String {
        match self {
            Self::Paragraph { rich_text }
            | Self::Heading { rich_text, .. }
            | Self::ListItem { rich_text, .. }
            | Self::Quote { rich_text } => runs_plain_text(rich_text),
            Self::Code { text, .. } => text.clone(),
            Self::Image { caption, .. }
            | Self::Video { caption, .. }
            | Self::Bookmark { caption, .. } => caption.clone(),
            Self::Divider => String::new(),
            Self::Default { fallback_text, .. } => fallback_text.clone(),
        }
    }
}

/// Outcome of loading a block's nested children.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ChildrenStatus {
    /// The source reported no nested content.
    #[default]
    Leaf,
    /// Children were fetched completely.
    Loaded,
    /// The source reported children but fetching them failed.
    Failed { reason: String },
    /// Nesting exceeded the configured depth; children were not fetched.
    Truncated { depth: usize },
}

impl ChildrenStatus {
    /// True for the lossy outcomes.
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::Truncated { .. })
    }
}

/// One normalized block with its children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedBlock {
    /// Same id as the vendor block.
    pub id: String,
    pub block: ParsedBlock,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NormalizedBlock>,
    #[serde(default)]
    pub children_status: ChildrenStatus,
}

impl NormalizedBlock {
    /// A block with no nested content.
    pub fn leaf(id: impl Into<String>, block: ParsedBlock) -> Self {
        Self {
            id: id.into(),
            block,
            children: Vec::new(),
            children_status: ChildrenStatus::Leaf,
        }
    }

    pub fn kind(&self) -> BlockKind {
        self.block.kind()
    }

    /// Whether this block or any descendant lost content during fetching.
    pub fn has_partial_content(&self) -> bool {
        self.children_status.is_partial()
            || self.children.iter().any(NormalizedBlock::has_partial_content)
    }
}

// ---------------------------------------------------------------------------
// TocEntry
// ---------------------------------------------------------------------------

/// A single entry in a page's table of contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    /// In-page anchor, `heading-{n}`.
    pub anchor_id: String,
    pub title: String,
    pub level: HeadingLevel,
    /// Id of the heading block the anchor belongs to.
    pub block_id: String,
}

// ---------------------------------------------------------------------------
// Posts
// ---------------------------------------------------------------------------

/// Slug-addressable identity of a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostIdentity {
    /// Page id as returned by the document API.
    pub page_id: String,
    /// Human-readable part of the slug.
    pub title_slug: String,
    /// `title_slug` + `-` + page id without separators.
    pub composite_slug: String,
}

/// Listing metadata for a published post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub identity: PostIdentity,
    pub title: String,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub published_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    /// Cover image URL after asset stabilization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    /// Estimated reading time in minutes.
    #[serde(default)]
    pub reading_time: u32,
}

impl Post {
    /// The composite slug used in URLs.
    pub fn slug(&self) -> &str {
        &self.identity.composite_slug
    }
}

/// A category or tag with its URL slug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taxon {
    pub name: String,
    pub slug: String,
}

/// A post with its normalized content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDetail {
    pub post: Post,
    pub category: Taxon,
    pub tags: Vec<Taxon>,
    pub blocks: Vec<NormalizedBlock>,
    pub toc: Vec<TocEntry>,
    /// Set when some branch of the block tree could not be loaded.
    #[serde(default)]
    pub partial_content: bool,
}

/// An asset URL before and after stabilization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetReference {
    pub original_url: String,
    pub stable_url: String,
}

// ---------------------------------------------------------------------------
// Bundle manifest
// ---------------------------------------------------------------------------

/// A file recorded in the bundle manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleFile {
    /// Path relative to the bundle root.
    pub path: String,
    pub sha256: String,
    pub size_bytes: usize,
}

/// The `manifest.json` written at the root of an exported bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleManifest {
    pub schema_version: u32,
    pub tool_version: String,
    pub generated_at: DateTime<Utc>,
    pub post_count: usize,
    #[serde(default)]
    pub files: Vec<BundleFile>,
}
