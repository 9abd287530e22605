//! Markdown serialization of a normalized block tree.

use notepress_shared::{NormalizedBlock, ParsedBlock, RichTextRun};

use crate::rich_text::render;

/// Indent applied per nesting level; wide enough for `1. ` list markers.
const INDENT: &str = "   ";

/// Render blocks (and their children) to Markdown.
pub fn blocks_to_markdown(blocks: &[NormalizedBlock]) -> String {
    let mut out = String::new();
    write_blocks(&mut out, blocks, 0);
    out.trim().to_string()
}

fn write_blocks(out: &mut String, blocks: &[NormalizedBlock], depth: usize) {
    let indent = INDENT.repeat(depth);
    let mut ordinal = 0;
    let mut in_list = false;

    for block in blocks {
        let is_list = matches!(block.block, ParsedBlock::ListItem { .. });
        if in_list && !is_list {
            out.push('\n');
        }
        in_list = is_list;

        match &block.block {
            ParsedBlock::Paragraph { rich_text } => {
                let text = inline(rich_text);
                if !text.trim().is_empty() {
                    push_lines(out, &indent, &text);
                    out.push('\n');
                }
            }
            ParsedBlock::Heading { level, rich_text } => {
                let hashes = "#".repeat(level.as_u8() as usize);
                out.push_str(&format!("{indent}{hashes} {}\n\n", inline(rich_text)));
            }
            ParsedBlock::ListItem { ordered, rich_text } => {
                let marker = if *ordered {
                    ordinal += 1;
                    format!("{ordinal}. ")
                } else {
                    "- ".to_string()
                };
                out.push_str(&format!("{indent}{marker}{}\n", inline(rich_text)));
            }
            ParsedBlock::Code { text, language } => {
                out.push_str(&format!("{indent}```{language}\n"));
                for line in text.lines() {
                    out.push_str(&indent);
                    out.push_str(line);
                    out.push('\n');
                }
                out.push_str(&format!("{indent}```\n\n"));
            }
            ParsedBlock::Quote { rich_text } => {
                for line in inline(rich_text).lines() {
                    out.push_str(&format!("{indent}> {line}\n"));
                }
                out.push('\n');
            }
            ParsedBlock::Image { url, caption } => {
                if !url.is_empty() {
                    out.push_str(&format!("{indent}![{caption}]({url})\n\n"));
                }
            }
            ParsedBlock::Video { url, caption } | ParsedBlock::Bookmark { url, caption } => {
                if !url.is_empty() {
                    let label = if caption.is_empty() { url } else { caption };
                    out.push_str(&format!("{indent}[{label}]({url})\n\n"));
                }
            }
            ParsedBlock::Divider => out.push_str(&format!("{indent}---\n\n")),
            ParsedBlock::Default {
                rich_text,
                fallback_text,
                ..
            } => {
                let text = if rich_text.is_empty() {
                    fallback_text.clone()
                } else {
                    inline(rich_text)
                };
                if !text.trim().is_empty() {
                    push_lines(out, &indent, &text);
                    out.push('\n');
                }
            }
        }

        if !is_list {
            ordinal = 0;
        }

        // Indent only under list items; four spaces elsewhere open a code block.
        let child_depth = if is_list { depth + 1 } else { depth };
        if block.children_status.is_partial() {
            let child_indent = INDENT.repeat(child_depth);
            out.push_str(&format!("{child_indent}<!-- nested content unavailable -->\n\n"));
        }
        if !block.children.is_empty() {
            write_blocks(out, &block.children, child_depth);
        }
    }
}

fn inline(runs: &[RichTextRun]) -> String {
    render(runs).to_markdown()
}

fn push_lines(out: &mut String, indent: &str, text: &str) {
    for line in text.lines() {
        out.push_str(indent);
        out.push_str(line);
        out.push('\n');
    }
}
