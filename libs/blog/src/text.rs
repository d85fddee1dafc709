//! Plain-text helpers for card previews and editor input.

use std::{collections::HashSet, sync::OnceLock};

use chrono::{DateTime, Local, Utc};
use regex::Regex;

pub const ELLIPSIS: &str = "...";

fn block_boundary() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)<\s*(br|/p|/div|/li|/h[1-6]|/blockquote)\b[^>]*>")
            .expect("block boundary pattern is valid")
    })
}

fn markup() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"<[a-zA-Z/!][^>]*>").expect("markup pattern is valid")
    })
}

pub fn has_markup(input: &str) -> bool {
    markup().is_match(input)
}

/// Text content of an HTML fragment with whitespace collapsed. Script and
/// style bodies are dropped entirely.
pub fn strip_markup(html: &str) -> String {
    let spaced = block_boundary().replace_all(html, " ");
    let text = ammonia::Builder::empty()
        .clean_content_tags(HashSet::from(["script", "style"]))
        .clean(&spaced)
        .to_string();

    unescape(&text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// First `max_chars` characters of the text content, with an ellipsis when
/// something was cut.
pub fn preview(html: &str, max_chars: usize) -> String {
    let text = strip_markup(html);
    if text.chars().count() <= max_chars {
        return text;
    }

    let mut preview: String = text.chars().take(max_chars).collect();
    preview.truncate(preview.trim_end().len());
    preview.push_str(ELLIPSIS);
    preview
}

/// Turns plain textarea input into paragraphs; blank lines become breaks.
pub fn paragraphs(plain: &str) -> String {
    plain
        .lines()
        .map(|line| match line.trim() {
            "" => "<br>".to_string(),
            line => format!("<p>{}</p>", escape(line)),
        })
        .collect()
}

pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn unescape(input: &str) -> String {
    input
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Local calendar date, `dd.mm.yyyy`.
pub fn format_date(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%d.%m.%Y").to_string()
}
