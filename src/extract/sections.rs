//! Body heuristics: descriptor lists, reasoning excerpt and co-signers

use crate::config::ExtractConfig;
use crate::error::Result;
use regex::Regex;

/// Split a raw descriptor string into ordered, trimmed tags
pub fn split_descriptors(raw: &str) -> Vec<String> {
    raw.split([',', ';', '\n'])
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

/// Byte index of the `n`th character, clamped to the end of the text
fn char_boundary(text: &str, n: usize) -> usize {
    text.char_indices()
        .nth(n)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len())
}

/// Compiled section heuristics
#[derive(Debug)]
pub struct SectionRules {
    reasoning_headers: Vec<Regex>,
    decision_headers: Vec<Regex>,
    fallback_offset: usize,
    decision_min_offset: usize,
    cosigner_window: usize,
    cosigner_min_len: usize,
    cosigner_max_len: usize,
    noise_markers: Vec<String>,
    leading_numbering: Regex,
    blank_line: Regex,
}

impl SectionRules {
    pub fn from_config(config: &ExtractConfig) -> Result<Self> {
        let reasoning_headers = config
            .reasoning_headers
            .iter()
            .map(|p| Regex::new(p))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let decision_headers = config
            .decision_headers
            .iter()
            .map(|p| Regex::new(p))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            reasoning_headers,
            decision_headers,
            fallback_offset: config.reasoning_fallback_offset,
            decision_min_offset: config.decision_min_offset,
            cosigner_window: config.cosigner_window,
            cosigner_min_len: config.cosigner_min_len,
            cosigner_max_len: config.cosigner_max_len,
            noise_markers: config
                .noise_markers
                .iter()
                .map(|m| m.to_lowercase())
                .collect(),
            leading_numbering: Regex::new(r"^[\s\d.,;:)(\-–—*•ºª]+")?,
            blank_line: Regex::new(r"\n[ \t]*\r?\n")?,
        })
    }

    /// Byte offset where the legal reasoning starts, if a header marks it
    pub fn reasoning_header(&self, text: &str) -> Option<usize> {
        self.reasoning_headers
            .iter()
            .find_map(|pattern| pattern.find(text).map(|m| m.start()))
    }

    /// Isolate the legal reasoning excerpt.
    ///
    /// Without a header the start falls back to a fixed character offset, which
    /// is only attempted when `allow_fallback` is set (the document was
    /// recognized as a decision). The excerpt ends at the first decision header
    /// found at least `decision_min_offset` characters past its start.
    pub fn isolate_reasoning(&self, text: &str, allow_fallback: bool) -> Option<String> {
        let start = match self.reasoning_header(text) {
            Some(start) => start,
            None if allow_fallback => char_boundary(text, self.fallback_offset),
            None => return None,
        };

        let body = &text[start..];
        let min_end = char_boundary(body, self.decision_min_offset);
        let end = self
            .decision_headers
            .iter()
            .filter_map(|pattern| {
                pattern
                    .find_iter(body)
                    .map(|m| m.start())
                    .find(|&pos| pos >= min_end)
            })
            .min()
            .unwrap_or(body.len());

        let excerpt = body[..end].trim();
        if excerpt.is_empty() {
            None
        } else {
            Some(excerpt.to_string())
        }
    }

    /// Cut a labeled summary down to its own block.
    ///
    /// The block ends at the first blank line, or at the first reasoning or
    /// decision header below its opening line.
    pub fn summary_block(&self, text: &str) -> String {
        let text = text.trim();
        let mut end = self
            .blank_line
            .find(text)
            .map(|m| m.start())
            .unwrap_or(text.len());

        for pattern in self.reasoning_headers.iter().chain(&self.decision_headers) {
            if let Some(pos) = pattern.find_iter(text).map(|m| m.start()).find(|&pos| pos > 0) {
                end = end.min(pos);
            }
        }

        text[..end].trim().to_string()
    }

    /// Names signed right after the reporting judge
    pub fn cosigners(&self, text: &str, relator: &str) -> Vec<String> {
        let needle = relator.trim().to_lowercase();
        if needle.is_empty() || crate::models::is_unknown(relator) {
            return Vec::new();
        }

        let lines: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();

        let Some(anchor) = lines
            .iter()
            .rposition(|line| line.to_lowercase().contains(&needle))
        else {
            return Vec::new();
        };

        lines[anchor + 1..]
            .iter()
            .take(self.cosigner_window)
            .filter(|line| {
                let len = line.chars().count();
                len >= self.cosigner_min_len && len <= self.cosigner_max_len
            })
            .filter(|line| !self.is_noise(line))
            .map(|line| self.leading_numbering.replace(line, "").trim().to_string())
            .filter(|name| !name.is_empty())
            .collect()
    }

    fn is_noise(&self, line: &str) -> bool {
        let lower = line.to_lowercase();
        self.noise_markers
            .iter()
            .any(|marker| lower.contains(marker.as_str()))
    }
}
