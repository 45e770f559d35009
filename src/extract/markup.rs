//! Markup handling: format detection and line-preserving text extraction

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;

/// Elements whose content is never part of the readable text
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "head", "noscript", "template"];

/// Elements rendered on their own line
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "li", "main", "nav", "ol", "p", "pre", "section", "table", "tbody", "thead", "tfoot",
    "tr", "ul",
];

/// Table cells, kept on the row's line
const CELL_ELEMENTS: &[&str] = &["td", "th"];

fn markup_token_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r"(?i)<(?:!doctype|html|head|body|div|table|tr|td|p|br|span|font|b|meta)\b[^>]*>",
            )
            .ok()
        })
        .as_ref()
}

/// Check whether content carries characteristic markup tokens
pub fn looks_like_markup(content: &str) -> bool {
    markup_token_pattern()
        .map(|pattern| pattern.is_match(content))
        .unwrap_or(false)
}

/// Text of an element with block elements on their own lines
pub fn block_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    push_block_text(element, &mut out);
    normalize_whitespace(&out)
}

fn push_block_text(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if SKIPPED_ELEMENTS.contains(&name) {
        return;
    }

    let block = BLOCK_ELEMENTS.contains(&name);
    if block {
        out.push('\n');
    }

    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            push_block_text(child_element, out);
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
        }
    }

    if block {
        out.push('\n');
    } else if CELL_ELEMENTS.contains(&name) {
        out.push(' ');
    }
}

/// Readable text of a whole document, body first
pub fn document_text(document: &Html) -> String {
    let body = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next());

    match body {
        Some(body) => block_text(body),
        None => block_text(document.root_element()),
    }
}

/// Value of a labeled table row (`<tr><td>Relator:</td><td>value</td></tr>`)
pub fn table_row_value(document: &Html, label: &str) -> Option<String> {
    let row_selector = Selector::parse("tr").ok()?;
    let cell_selector = Selector::parse("td, th").ok()?;

    for row in document.select(&row_selector) {
        let mut cells = row.select(&cell_selector);
        let Some(first) = cells.next() else {
            continue;
        };

        let heading = block_text(first);
        let heading = heading.trim().trim_end_matches(':').trim().to_lowercase();
        if heading != label {
            continue;
        }

        let value = cells
            .map(block_text)
            .filter(|text| !text.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        if !value.trim().is_empty() {
            return Some(value.trim().to_string());
        }
    }

    None
}

/// Normalize whitespace in text, keeping line and paragraph breaks
pub fn normalize_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut last_was_whitespace = true;
    let mut newline_count = 0;

    for c in text.chars() {
        if c.is_whitespace() {
            if c == '\n' {
                newline_count += 1;
            }
            last_was_whitespace = true;
        } else {
            if last_was_whitespace && !result.is_empty() {
                if newline_count >= 2 {
                    result.push_str("\n\n");
                } else if newline_count == 1 {
                    result.push('\n');
                } else {
                    result.push(' ');
                }
            }
            newline_count = 0;
            result.push(c);
            last_was_whitespace = false;
        }
    }

    result.trim().to_string()
}
