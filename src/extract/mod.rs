//! Heuristic field extraction
//!
//! This module turns a captured document (portal markup or pasted text) into a
//! [`LegalRecord`]:
//! - Format detection (markup vs plain text)
//! - Per-field resolver chains with sentinel fallback
//! - Descriptor splitting, reasoning isolation and co-signer detection
//!
//! Field misses never fail an extraction; they degrade to [`UNKNOWN`] or empty
//! values. Only input that cannot be processed at all is an error.

mod markup;
mod rules;
mod sections;

pub use markup::{looks_like_markup, normalize_whitespace};
pub use rules::{decode_locator_ecli, Field, FieldRule, RuleSet};
pub use sections::{split_descriptors, SectionRules};

use crate::config::ExtractConfig;
use crate::error::Result;
use crate::models::{is_unknown, CapturedDocument, LegalRecord, UNKNOWN};
use crate::store::{sanitize_name, MAX_NAME_CHARS};
use chrono::Utc;
use scraper::Html;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Detected shape of a captured document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Markup,
    PlainText,
}

impl DocumentFormat {
    /// Classify content by the presence of markup tokens
    pub fn detect(content: &str) -> Self {
        if looks_like_markup(content) {
            DocumentFormat::Markup
        } else {
            DocumentFormat::PlainText
        }
    }
}

/// Why an extraction failed as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    ParseFailure,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::ParseFailure => write!(f, "parse-failure"),
        }
    }
}

/// Extraction failure returned across the extractor boundary
#[derive(Debug, Clone, Error)]
#[error("{reason}: {message}")]
pub struct ExtractionError {
    pub reason: FailureReason,
    pub message: String,
}

impl ExtractionError {
    pub fn parse_failure(message: impl Into<String>) -> Self {
        Self {
            reason: FailureReason::ParseFailure,
            message: message.into(),
        }
    }
}

/// A document prepared for rule evaluation
#[derive(Debug)]
pub struct DocumentView {
    pub format: DocumentFormat,
    pub html: Option<Html>,
    pub text: String,
    pub locator: String,
}

impl DocumentView {
    pub fn new(raw_content: &str, source_locator: &str) -> Self {
        let normalized = raw_content.replace("\r\n", "\n").replace('\r', "\n");
        let format = DocumentFormat::detect(&normalized);

        let (html, text) = match format {
            DocumentFormat::Markup => {
                let html = Html::parse_document(&normalized);
                let text = markup::document_text(&html);
                (Some(html), text)
            }
            DocumentFormat::PlainText => (None, normalized.trim().to_string()),
        };

        Self {
            format,
            html,
            text,
            locator: source_locator.trim().to_string(),
        }
    }
}

/// Check if content appears to be binary
pub fn is_binary_content(data: &[u8]) -> bool {
    let check_len = std::cmp::min(data.len(), 8192);
    data[..check_len].iter().any(|&b| b == 0)
}

/// Field extractor with compiled rules
#[derive(Debug)]
pub struct Extractor {
    rules: RuleSet,
    sections: SectionRules,
    isolate_reasoning: bool,
}

impl Extractor {
    /// Compile the portal rules and the configured section heuristics
    pub fn new(config: &ExtractConfig) -> Result<Self> {
        Ok(Self {
            rules: RuleSet::portal_defaults()?,
            sections: SectionRules::from_config(config)?,
            isolate_reasoning: config.isolate_reasoning,
        })
    }

    /// Extract a captured document
    pub fn extract_document(
        &self,
        document: &CapturedDocument,
    ) -> std::result::Result<LegalRecord, ExtractionError> {
        self.extract(&document.raw_content, &document.source_locator)
    }

    /// Turn raw content into a structured record
    pub fn extract(
        &self,
        raw_content: &str,
        source_locator: &str,
    ) -> std::result::Result<LegalRecord, ExtractionError> {
        if is_binary_content(raw_content.as_bytes()) {
            return Err(ExtractionError::parse_failure(format!(
                "binary content from '{}'",
                source_locator
            )));
        }

        let view = DocumentView::new(raw_content, source_locator);
        debug!(format = ?view.format, locator = %view.locator, "Extracting document");

        let ecli = self
            .field(Field::Ecli, &view)
            .map(|value| value.trim_end_matches('.').to_string());
        let processo = self.field(Field::Processo, &view);
        let data = self.field(Field::Data, &view);
        let relator = self.field(Field::Relator, &view);
        let recognized =
            ecli.is_some() || processo.is_some() || data.is_some() || relator.is_some();

        let ecli = ecli.unwrap_or_else(|| UNKNOWN.to_string());
        let processo = processo.unwrap_or_else(|| UNKNOWN.to_string());
        let data = data.unwrap_or_else(|| UNKNOWN.to_string());
        let relator = relator.unwrap_or_else(|| UNKNOWN.to_string());

        let descritores = self
            .field(Field::Descritores, &view)
            .map(|raw| split_descriptors(&raw))
            .unwrap_or_default();
        // A labeled summary runs to the end of the text unless cut to its block
        let sumario = match self.rules.resolve_with_rule(Field::Sumario, &view) {
            Some((value, FieldRule::Label(_))) => self.sections.summary_block(&value),
            Some((value, _)) => value,
            None => {
                debug!(field = %Field::Sumario, "Field unresolved");
                String::new()
            }
        };
        let texto_integral = self
            .field(Field::TextoIntegral, &view)
            .unwrap_or_else(|| view.text.clone());

        let fundamentacao = if self.isolate_reasoning {
            self.sections.isolate_reasoning(&texto_integral, recognized)
        } else {
            None
        };
        let adjuntos = self.sections.cosigners(&texto_integral, &relator);

        let id = if is_unknown(&ecli) {
            synthetic_id(&processo)
        } else {
            ecli.clone()
        };

        Ok(LegalRecord {
            file_name: Some(sanitize_name(&id)),
            id,
            ecli,
            processo,
            data,
            relator,
            descritores,
            sumario,
            texto_integral,
            fundamentacao,
            adjuntos,
            url: view.locator.clone(),
        })
    }

    fn field(&self, field: Field, view: &DocumentView) -> Option<String> {
        let value = self.rules.resolve(field, view);
        if value.is_none() {
            debug!(%field, "Field unresolved");
        }
        value
    }
}

/// Room left in a storage name for `_<unix millis>`
const SYNTHETIC_SUFFIX_CHARS: usize = 20;

/// Identifier for records without an ECLI: case number plus creation time.
///
/// The case number is shortened so the timestamp survives name sanitizing.
fn synthetic_id(processo: &str) -> String {
    let prefix: String = sanitize_name(processo)
        .chars()
        .take(MAX_NAME_CHARS - SYNTHETIC_SUFFIX_CHARS)
        .collect();
    format!("{}_{}", prefix, Utc::now().timestamp_millis())
}
