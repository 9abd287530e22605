//! Wire model for the document API's pages, blocks and properties.
//!
//! Everything here deserializes leniently: payloads that are missing or do
//! not match the expected shape degrade to empty values instead of failing
//! the whole response.

use chrono::{DateTime, NaiveDate, Utc};
use notepress_shared::TextStyle;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Rich text
// ---------------------------------------------------------------------------

/// One rich-text item as returned by the API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRichText {
    #[serde(default)]
    pub plain_text: String,
    #[serde(default)]
    pub href: Option<String>,
    /// The API's annotation object uses the same flag names as [`TextStyle`];
    /// `color` is ignored.
    #[serde(default)]
    pub annotations: TextStyle,
}

/// Concatenate the plain text of all items.
pub fn plain_text(items: &[RawRichText]) -> String {
    items.iter().map(|item| item.plain_text.as_str()).collect()
}

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

/// Vendor block types the pipeline understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VendorBlockType {
    Paragraph,
    /// `heading_{suffix}`; the suffix is validated by the block mapper.
    Heading(String),
    BulletedListItem,
    NumberedListItem,
    Code,
    Quote,
    Image,
    Video,
    Divider,
    Bookmark,
    Unsupported(String),
}

impl VendorBlockType {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "paragraph" => Self::Paragraph,
            "bulleted_list_item" => Self::BulletedListItem,
            "numbered_list_item" => Self::NumberedListItem,
            "code" => Self::Code,
            "quote" => Self::Quote,
            "image" => Self::Image,
            "video" => Self::Video,
            "divider" => Self::Divider,
            "bookmark" => Self::Bookmark,
            other => match other.strip_prefix("heading_") {
                Some(suffix) => Self::Heading(suffix.to_string()),
                None => Self::Unsupported(other.to_string()),
            },
        }
    }
}

/// A block exactly as the API returned it.
///
/// The type-specific payload lives under a key equal to the type tag
/// (`paragraph.rich_text`, `code.language`, ...), so it is kept as raw JSON
/// and decoded on demand.
#[derive(Debug, Clone, Deserialize)]
pub struct RawBlock {
    pub id: String,
    #[serde(rename = "type", default)]
    pub block_type: String,
    #[serde(default)]
    pub has_children: bool,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl RawBlock {
    pub fn kind(&self) -> VendorBlockType {
        VendorBlockType::from_tag(&self.block_type)
    }

    /// The payload object stored under the block's type tag.
    pub fn payload(&self) -> Option<&Value> {
        self.fields.get(&self.block_type)
    }

    /// Decode the payload, falling back to `T::default()` when it is absent
    /// or malformed.
    pub fn payload_as<T: DeserializeOwned + Default>(&self) -> T {
        self.payload()
            .and_then(|value| T::deserialize(value).ok())
            .unwrap_or_default()
    }
}

/// Payload of text-bearing blocks (paragraph, headings, list items, quote).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TextPayload {
    #[serde(default)]
    pub rich_text: Vec<RawRichText>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CodePayload {
    #[serde(default)]
    pub rich_text: Vec<RawRichText>,
    #[serde(default)]
    pub language: Option<String>,
}

/// A hosted (`file`) or linked (`external`) file reference.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileRef {
    #[serde(default)]
    pub url: String,
}

/// Payload of image and video blocks.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaPayload {
    #[serde(default)]
    pub external: Option<FileRef>,
    #[serde(default)]
    pub file: Option<FileRef>,
    #[serde(default)]
    pub caption: Vec<RawRichText>,
}

impl MediaPayload {
    /// First non-empty of the external URL and the hosted file URL, else empty.
    pub fn url(&self) -> String {
        [self.external.as_ref(), self.file.as_ref()]
            .into_iter()
            .flatten()
            .map(|f| f.url.as_str())
            .find(|url| !url.is_empty())
            .unwrap_or_default()
            .to_string()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookmarkPayload {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub caption: Vec<RawRichText>,
}

// ---------------------------------------------------------------------------
// Pages and properties
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NamedOption {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DateValue {
    #[serde(default)]
    pub start: Option<String>,
}

/// An entry of a `files` property.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileObject {
    #[serde(default)]
    pub file: Option<FileRef>,
    #[serde(default)]
    pub external: Option<FileRef>,
}

/// A typed page property value.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawProperty {
    Title {
        #[serde(default)]
        title: Vec<RawRichText>,
    },
    RichText {
        #[serde(default)]
        rich_text: Vec<RawRichText>,
    },
    Checkbox {
        #[serde(default)]
        checkbox: bool,
    },
    Select {
        #[serde(default)]
        select: Option<NamedOption>,
    },
    MultiSelect {
        #[serde(default)]
        multi_select: Vec<NamedOption>,
    },
    Date {
        #[serde(default)]
        date: Option<DateValue>,
    },
    Url {
        #[serde(default)]
        url: Option<String>,
    },
    Number {
        #[serde(default)]
        number: Option<f64>,
    },
    Files {
        #[serde(default)]
        files: Vec<FileObject>,
    },
    #[serde(other)]
    Other,
}

/// A page object with its property bag.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPage {
    #[serde(default)]
    pub object: String,
    pub id: String,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub last_edited_time: Option<String>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl RawPage {
    /// Decode one property; `None` when absent or of an unexpected shape.
    pub fn property(&self, name: &str) -> Option<RawProperty> {
        self.properties
            .get(name)
            .and_then(|value| RawProperty::deserialize(value).ok())
    }

    /// The `title` property, else the first title-typed property.
    pub fn title(&self) -> Option<String> {
        let named = self.text_property("title");
        if named.is_some() {
            return named;
        }
        self.properties
            .values()
            .filter_map(|value| RawProperty::deserialize(value).ok())
            .find_map(|prop| match prop {
                RawProperty::Title { title } => non_empty(plain_text(&title)),
                _ => None,
            })
    }

    /// Text of a title, rich-text, select or url property.
    pub fn text_property(&self, name: &str) -> Option<String> {
        match self.property(name)? {
            RawProperty::Title { title: items } | RawProperty::RichText { rich_text: items } => {
                non_empty(plain_text(&items))
            }
            RawProperty::Select { select } => select.and_then(|s| non_empty(s.name)),
            RawProperty::Url { url } => url.and_then(non_empty),
            _ => None,
        }
    }

    pub fn checkbox(&self, name: &str) -> bool {
        matches!(
            self.property(name),
            Some(RawProperty::Checkbox { checkbox: true })
        )
    }

    /// Option names of a multi-select property, in source order.
    pub fn multi_select(&self, name: &str) -> Vec<String> {
        match self.property(name) {
            Some(RawProperty::MultiSelect { multi_select }) => multi_select
                .into_iter()
                .map(|option| option.name)
                .filter(|name| !name.is_empty())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// A URL from a url property, or the first entry of a files property.
    pub fn url_property(&self, name: &str) -> Option<String> {
        match self.property(name)? {
            RawProperty::Url { url } => url.and_then(non_empty),
            RawProperty::Files { files } => files.into_iter().find_map(|f| {
                f.external
                    .or(f.file)
                    .and_then(|file_ref| non_empty(file_ref.url))
            }),
            RawProperty::RichText { rich_text } => non_empty(plain_text(&rich_text)),
            _ => None,
        }
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        match self.property(name)? {
            RawProperty::Number { number } => number,
            _ => None,
        }
    }

    /// Start of a date property.
    pub fn date(&self, name: &str) -> Option<DateTime<Utc>> {
        match self.property(name)? {
            RawProperty::Date { date } => date?.start.as_deref().and_then(parse_timestamp),
            _ => None,
        }
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_time.as_deref().and_then(parse_timestamp)
    }

    pub fn last_edited_at(&self) -> Option<DateTime<Utc>> {
        self.last_edited_time.as_deref().and_then(parse_timestamp)
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Parse an RFC 3339 timestamp or a bare `YYYY-MM-DD` date (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

/// Minimal view of a search hit; full page metadata is retrieved separately.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub object: String,
    pub id: String,
}

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, Deserialize)]
pub struct PaginatedList<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}
