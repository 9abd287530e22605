//! Rich-text runs as a renderable tree of nested style markers.

use notepress_shared::RichTextRun;

/// One rendered node. Style wrappers nest around the text they decorate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderNode {
    Text(String),
    Strong(Box<RenderNode>),
    Emphasis(Box<RenderNode>),
    Strikethrough(Box<RenderNode>),
    Underline(Box<RenderNode>),
    InlineCode(Box<RenderNode>),
    Link { href: String, child: Box<RenderNode> },
}

/// Rendered runs in reading order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderTree {
    pub nodes: Vec<RenderNode>,
}

/// Wrap each run in its style markers.
///
/// Markers are applied innermost-first in the order bold, italic,
/// strikethrough, underline, inline code; a link always wraps the result.
pub fn render(runs: &[RichTextRun]) -> RenderTree {
    RenderTree {
        nodes: runs.iter().map(render_run).collect(),
    }
}

fn render_run(run: &RichTextRun) -> RenderNode {
    let style = run.style;
    let mut node = RenderNode::Text(run.text.clone());

    if style.bold {
        node = RenderNode::Strong(Box::new(node));
    }
    if style.italic {
        node = RenderNode::Emphasis(Box::new(node));
    }
    if style.strikethrough {
        node = RenderNode::Strikethrough(Box::new(node));
    }
    if style.underline {
        node = RenderNode::Underline(Box::new(node));
    }
    if style.code {
        node = RenderNode::InlineCode(Box::new(node));
    }
    if let Some(href) = &run.link {
        node = RenderNode::Link {
            href: href.clone(),
            child: Box::new(node),
        };
    }
    node
}

impl RenderNode {
    fn push_plain(&self, out: &mut String) {
        match self {
            Self::Text(text) => out.push_str(text),
            Self::Strong(child)
            | Self::Emphasis(child)
            | Self::Strikethrough(child)
            | Self::Underline(child)
            | Self::InlineCode(child)
            | Self::Link { child, .. } => child.push_plain(out),
        }
    }

    fn plain(&self) -> String {
        let mut out = String::new();
        self.push_plain(&mut out);
        out
    }

    fn push_markdown(&self, out: &mut String) {
        match self {
            Self::Text(text) => out.push_str(text),
            Self::Strong(child) => wrap_markdown(out, "**", child),
            Self::Emphasis(child) => wrap_markdown(out, "_", child),
            Self::Strikethrough(child) => wrap_markdown(out, "~~", child),
            // No Markdown syntax for underline.
            Self::Underline(child) => child.push_markdown(out),
            // Markers inside a code span would be shown literally.
            Self::InlineCode(child) => {
                out.push('`');
                out.push_str(&child.plain());
                out.push('`');
            }
            Self::Link { href, child } => {
                out.push('[');
                child.push_markdown(out);
                out.push_str("](");
                out.push_str(href);
                out.push(')');
            }
        }
    }

    fn push_html(&self, out: &mut String) {
        match self {
            Self::Text(text) => out.push_str(&escape_html(text)),
            Self::Strong(child) => wrap_html(out, "strong", child),
            Self::Emphasis(child) => wrap_html(out, "em", child),
            Self::Strikethrough(child) => wrap_html(out, "s", child),
            Self::Underline(child) => wrap_html(out, "u", child),
            Self::InlineCode(child) => wrap_html(out, "code", child),
            Self::Link { href, child } => {
                out.push_str("<a href=\"");
                out.push_str(&escape_html(href));
                out.push_str("\">");
                child.push_html(out);
                out.push_str("</a>");
            }
        }
    }
}

fn wrap_markdown(out: &mut String, marker: &str, child: &RenderNode) {
    out.push_str(marker);
    child.push_markdown(out);
    out.push_str(marker);
}

fn wrap_html(out: &mut String, tag: &str, child: &RenderNode) {
    out.push('<');
    out.push_str(tag);
    out.push('>');
    child.push_html(out);
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

impl RenderTree {
    /// Text without any markers.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            node.push_plain(&mut out);
        }
        out
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            node.push_markdown(&mut out);
        }
        out
    }

    /// HTML fragment with all text and attributes escaped.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            node.push_html(&mut out);
        }
        out
    }
}
