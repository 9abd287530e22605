//! Slug-addressable post identity.
//!
//! A composite slug is `{title-slug}-{page id without hyphens}`. The page id
//! is recovered by string parsing alone, so renaming a post changes its URL
//! but old links still resolve to the same page.

use std::sync::LazyLock;

use notepress_shared::{NotepressError, PostIdentity, Result};
use regex::Regex;

/// Title slug used when neither an explicit slug nor the title yields one.
pub const FALLBACK_SLUG: &str = "post";

/// Length of a page id with its hyphens removed.
const COMPACT_ID_LEN: usize = 32;

static DISALLOWED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("valid regex"));

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Lowercase, drop everything but word characters, whitespace and hyphens,
/// then join words with single hyphens.
///
/// Word characters are Unicode-aware, so non-Latin titles keep their text.
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped = DISALLOWED_RE.replace_all(&lowered, "");
    let hyphenated = WHITESPACE_RE.replace_all(stripped.trim(), "-");
    hyphenated.trim_matches('-').to_string()
}

/// Build the composite slug for a page.
pub fn build_composite_slug(page_id: &str, explicit_slug: Option<&str>, title: &str) -> String {
    identity_for(page_id, explicit_slug, title).composite_slug
}

/// Full identity of a page, derived from its id, slug property and title.
pub fn identity_for(page_id: &str, explicit_slug: Option<&str>, title: &str) -> PostIdentity {
    let title_slug = title_slug(explicit_slug, title);
    let composite_slug = format!("{title_slug}-{}", page_id.replace('-', ""));
    PostIdentity {
        page_id: page_id.to_string(),
        title_slug,
        composite_slug,
    }
}

fn title_slug(explicit_slug: Option<&str>, title: &str) -> String {
    if let Some(explicit) = explicit_slug.map(str::trim).filter(|s| !s.is_empty()) {
        return explicit.to_string();
    }
    let generated = slugify(title);
    if generated.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        generated
    }
}

/// Recover the hyphenated page id from a composite slug.
pub fn resolve_page_id(composite_slug: &str) -> Result<String> {
    let compact = composite_slug.rsplit('-').next().unwrap_or_default();

    if compact.chars().count() != COMPACT_ID_LEN {
        return Err(NotepressError::invalid_slug(
            composite_slug,
            format!(
                "page id segment has {} characters, expected {COMPACT_ID_LEN}",
                compact.chars().count()
            ),
        ));
    }
    if !compact.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(NotepressError::invalid_slug(
            composite_slug,
            "page id segment must be ASCII alphanumeric",
        ));
    }

    Ok(format!(
        "{}-{}-{}-{}-{}",
        &compact[0..8],
        &compact[8..12],
        &compact[12..16],
        &compact[16..20],
        &compact[20..32]
    ))
}
