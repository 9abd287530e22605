//! Table-of-contents extraction from a normalized block list.

use notepress_shared::{HeadingLevel, NormalizedBlock, ParsedBlock, TocEntry, runs_plain_text};

/// In-page anchor for the `n`th heading (1-based).
pub fn anchor_id(n: usize) -> String {
    format!("heading-{n}")
}

/// Build the TOC from the top-level blocks of a page.
///
/// Nested headings are not inspected. Headings with an empty title are
/// skipped and do not consume an anchor number, so anchors stay contiguous.
/// Vendor headings deeper than 3 arrive as level 1 and are indexed.
pub fn generate_toc(blocks: &[NormalizedBlock]) -> Vec<TocEntry> {
    let mut entries = Vec::new();

    for block in blocks {
        let ParsedBlock::Heading { level, rich_text } = &block.block else {
            continue;
        };
        let title = runs_plain_text(rich_text).trim().to_string();
        if title.is_empty() {
            continue;
        }
        entries.push(TocEntry {
            anchor_id: anchor_id(entries.len() + 1),
            title,
            level: *level,
            block_id: block.id.clone(),
        });
    }

    entries
}

/// Keep entries at or above `max_level`.
pub fn filter_by_level(toc: &[TocEntry], max_level: HeadingLevel) -> Vec<TocEntry> {
    toc.iter()
        .filter(|entry| entry.level <= max_level)
        .cloned()
        .collect()
}
