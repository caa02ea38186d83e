//! Plain-text rendering of HTML content strings.
//!
//! Only structure that matters in a terminal survives: block-level tags and
//! `<br>` become line breaks, list items get a bullet, entities are decoded,
//! and everything else is stripped. Script-like elements and comments are
//! dropped with their contents.

use std::borrow::Cow;

use html_escape::decode_html_entities;
use textwrap::{Options, WordSplitter, WrapAlgorithm};

use super::PanelContent;

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "header", "footer", "ul", "ol", "tr", "table", "h1", "h2",
    "h3", "h4", "h5", "h6", "pre", "blockquote", "hr",
];

/// Elements whose text is never shown.
const HIDDEN_TAGS: &[&str] = &["script", "style", "template", "noscript"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlContent {
    title: Option<String>,
    paragraphs: Vec<String>,
}

impl HtmlContent {
    pub fn parse(html: &str) -> Self {
        let mut paragraphs = Vec::new();
        let mut current = String::new();
        let mut title = None;
        let mut title_text: Option<String> = None;
        let mut rest = html;

        let flush = |current: &mut String, paragraphs: &mut Vec<String>| {
            let cleaned = clean(current);
            if !cleaned.is_empty() {
                paragraphs.push(cleaned);
            }
            current.clear();
        };

        while let Some(open) = rest.find('<') {
            let text = &rest[..open];
            match title_text.as_mut() {
                Some(title_text) => title_text.push_str(text),
                None => current.push_str(text),
            }
            let after = &rest[open + 1..];
            if let Some(comment) = after.strip_prefix("!--") {
                rest = comment.find("-->").map_or("", |end| &comment[end + 3..]);
                continue;
            }
            let Some(close) = after.find('>') else {
                // A lone '<' is text.
                current.push('<');
                rest = after;
                continue;
            };
            let tag = &after[..close];
            rest = &after[close + 1..];

            let name = tag_name(tag);
            let closing = tag.trim_start().starts_with('/');
            if !closing && !tag.trim_end().ends_with('/') && HIDDEN_TAGS.contains(&name.as_str())
            {
                rest = skip_element(rest, &name);
                continue;
            }
            match name.as_str() {
                "title" if !closing => title_text = Some(String::new()),
                "title" => {
                    if let Some(text) = title_text.take() {
                        title = Some(clean(&text));
                    }
                }
                "br" => flush(&mut current, &mut paragraphs),
                "li" if !closing => {
                    flush(&mut current, &mut paragraphs);
                    current.push_str("• ");
                }
                name if BLOCK_TAGS.contains(&name) => flush(&mut current, &mut paragraphs),
                _ => {}
            }
        }
        current.push_str(rest);
        flush(&mut current, &mut paragraphs);

        paragraphs.retain(|p| p != "•");
        Self {
            title: title.filter(|t| !t.is_empty()),
            paragraphs,
        }
    }

    pub fn paragraphs(&self) -> &[String] {
        &self.paragraphs
    }
}

impl PanelContent for HtmlContent {
    fn title(&self) -> Option<String> {
        self.title.clone()
    }

    fn body(&self, width: u16) -> Vec<String> {
        self.paragraphs
            .iter()
            .flat_map(|p| wrap(p, width))
            .collect()
    }
}

fn tag_name(tag: &str) -> String {
    tag.trim()
        .trim_start_matches('/')
        .split(|c: char| c.is_whitespace() || c == '/')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// Skip past the closing tag of `name`. An unterminated element hides the
/// rest of the document, as a browser would.
fn skip_element<'a>(rest: &'a str, name: &str) -> &'a str {
    // ASCII lowercasing keeps byte offsets aligned with `rest`.
    let lower = rest.to_ascii_lowercase();
    match lower.find(&format!("</{name}")) {
        Some(start) => {
            let tail = &rest[start..];
            tail.find('>').map_or("", |end| &tail[end + 1..])
        }
        None => "",
    }
}

fn clean(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    decode_html_entities(&collapsed).into_owned()
}

/// Greedy word wrap to `width` terminal cells. Words wider than a line are
/// split; wide glyphs count as two cells.
pub fn wrap(text: &str, width: u16) -> Vec<String> {
    let options = Options::new(width.max(1) as usize)
        .wrap_algorithm(WrapAlgorithm::FirstFit)
        .word_splitter(WordSplitter::NoHyphenation);
    let mut lines = Vec::new();
    for raw in text.lines() {
        if raw.trim().is_empty() {
            lines.push(String::new());
            continue;
        }
        lines.extend(textwrap::wrap(raw, &options).into_iter().map(Cow::into_owned));
    }
    lines
}
