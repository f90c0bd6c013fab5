//! Locating query terms inside titles and body text for display.

use crate::tokenizer::Tokenizer;
use serde::Serialize;
use std::collections::BTreeSet;
use std::ops::Range;

/// Byte ranges of the tokens in `text` whose normalized form is one of `terms`.
pub fn highlight_ranges(tokenizer: &Tokenizer, text: &str, terms: &BTreeSet<String>) -> Vec<Range<usize>> {
    tokenizer
        .tokenize(text)
        .into_iter()
        .filter(|t| terms.contains(&t.term))
        .map(|t| t.start..t.end)
        .collect()
}

/// Wrap each range of `text` in `open`/`close`. Ranges must be ordered and non-overlapping.
pub fn mark(text: &str, ranges: &[Range<usize>], open: &str, close: &str) -> String {
    mark_with(text, ranges, open, close, |s| s.to_string())
}

/// Like [`mark`] with `<em>` tags, escaping the text for HTML.
pub fn mark_html(text: &str, ranges: &[Range<usize>]) -> String {
    mark_with(text, ranges, "<em>", "</em>", escape_html)
}

fn mark_with(text: &str, ranges: &[Range<usize>], open: &str, close: &str, escape: impl Fn(&str) -> String) -> String {
    let mut out = String::with_capacity(text.len() + ranges.len() * (open.len() + close.len()));
    let mut cursor = 0;
    for r in ranges {
        if r.start < cursor || r.end > text.len() { continue; }
        out.push_str(&escape(&text[cursor..r.start]));
        out.push_str(open);
        out.push_str(&escape(&text[r.start..r.end]));
        out.push_str(close);
        cursor = r.end;
    }
    out.push_str(&escape(&text[cursor..]));
    out
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// A window of body text around the first query-term match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snippet {
    pub text: String,
    /// Relative to `text`.
    pub highlights: Vec<Range<usize>>,
}

impl Snippet {
    pub fn to_html(&self) -> String { mark_html(&self.text, &self.highlights) }
}

/// Extract up to `radius` bytes before and `2 * radius` after the first match.
/// Without a match the head of the text is returned.
pub fn snippet(tokenizer: &Tokenizer, text: &str, terms: &BTreeSet<String>, radius: usize) -> Option<Snippet> {
    if text.is_empty() { return None; }
    let ranges = highlight_ranges(tokenizer, text, terms);
    let (start, end) = match ranges.first() {
        Some(first) => (
            floor_boundary(text, first.start.saturating_sub(radius)),
            ceil_boundary(text, first.end.saturating_add(radius * 2)),
        ),
        None => (0, ceil_boundary(text, radius * 2)),
    };
    let highlights = ranges
        .into_iter()
        .filter(|r| r.start >= start && r.end <= end)
        .map(|r| (r.start - start)..(r.end - start))
        .collect();
    Some(Snippet { text: text[start..end].to_string(), highlights })
}

fn floor_boundary(text: &str, mut idx: usize) -> usize {
    idx = idx.min(text.len());
    while !text.is_char_boundary(idx) { idx -= 1; }
    idx
}

fn ceil_boundary(text: &str, mut idx: usize) -> usize {
    idx = idx.min(text.len());
    while !text.is_char_boundary(idx) { idx += 1; }
    idx
}
