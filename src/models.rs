//! Core records: captured documents, raw captures and structured decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder for fields that could not be recovered from a document
pub const UNKNOWN: &str = "Desconhecido";

/// Returns true when a field holds the unknown placeholder
pub fn is_unknown(value: &str) -> bool {
    value == UNKNOWN
}

/// A document as captured, before anything is persisted
#[derive(Debug, Clone)]
pub struct CapturedDocument {
    /// Markup or unstructured pasted text
    pub raw_content: String,

    /// Origin URL or a synthetic identifier
    pub source_locator: String,
}

impl CapturedDocument {
    pub fn new(raw_content: impl Into<String>, source_locator: impl Into<String>) -> Self {
        Self {
            raw_content: raw_content.into(),
            source_locator: source_locator.into(),
        }
    }
}

/// Unstructured capture awaiting extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCapture {
    pub name: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subfolder: Option<String>,

    /// Locator the content was captured from (portal URL or pasted locator)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl RawCapture {
    pub fn new(name: String, content: String, subfolder: Option<String>) -> Self {
        Self {
            name,
            content,
            subfolder,
            source: None,
            timestamp: Utc::now(),
        }
    }

    /// Record the locator this capture came from
    pub fn with_source(mut self, source: Option<String>) -> Self {
        self.source = source;
        self
    }
}

/// Structured representation of one court decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalRecord {
    /// Primary key: the ECLI when known, otherwise a synthetic id
    pub id: String,

    /// European Case Law Identifier or [`UNKNOWN`]
    pub ecli: String,

    /// Case number, free text
    pub processo: String,

    /// Decision date as written in the document
    pub data: String,

    /// Reporting judge
    pub relator: String,

    /// Keyword tags in extraction order
    #[serde(default)]
    pub descritores: Vec<String>,

    /// Summary block, may be empty
    #[serde(default)]
    pub sumario: String,

    /// Full decision text
    #[serde(rename = "textoIntegral", default)]
    pub texto_integral: String,

    /// Legal reasoning excerpt, when it could be isolated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fundamentacao: Option<String>,

    /// Co-deciding judges
    #[serde(default)]
    pub adjuntos: Vec<String>,

    /// Capture source
    #[serde(default)]
    pub url: String,

    /// Sanitized storage name
    #[serde(rename = "fileName", default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl LegalRecord {
    /// Key used by both storage backends
    pub fn storage_key(&self) -> &str {
        if self.id.trim().is_empty() {
            &self.ecli
        } else {
            &self.id
        }
    }

    /// Names of fields still holding the unknown placeholder
    pub fn unresolved_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if is_unknown(&self.ecli) {
            fields.push("ecli");
        }
        if is_unknown(&self.processo) {
            fields.push("processo");
        }
        if is_unknown(&self.data) {
            fields.push("data");
        }
        if is_unknown(&self.relator) {
            fields.push("relator");
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LegalRecord {
        LegalRecord {
            id: "ECLI:PT:STJ:2022:167.15".to_string(),
            ecli: "ECLI:PT:STJ:2022:167.15".to_string(),
            processo: "167/15.0T8LSB.L1.S1".to_string(),
            data: "12/05/2022".to_string(),
            relator: "João Silva".to_string(),
            descritores: vec!["RECURSO DE REVISTA".to_string()],
            sumario: "I - Sumário.".to_string(),
            texto_integral: "Texto".to_string(),
            fundamentacao: None,
            adjuntos: vec!["Ana Costa".to_string()],
            url: "http://www.dgsi.pt/jstj.nsf/abc".to_string(),
            file_name: Some("ECLI_PT_STJ_2022_167.15".to_string()),
        }
    }

    #[test]
    fn test_serialized_field_names() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json.get("textoIntegral").is_some());
        assert!(json.get("fileName").is_some());
        assert!(json.get("fundamentacao").is_none());
        assert!(json.get("texto_integral").is_none());
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let json = r#"{"id":"x","ecli":"Desconhecido","processo":"1/20","data":"","relator":"R"}"#;
        let record: LegalRecord = serde_json::from_str(json).unwrap();
        assert!(record.descritores.is_empty());
        assert!(record.file_name.is_none());
        assert_eq!(record.unresolved_fields(), vec!["ecli"]);
    }

    #[test]
    fn test_storage_key_falls_back_to_ecli() {
        let mut record = sample();
        record.id = String::new();
        assert_eq!(record.storage_key(), "ECLI:PT:STJ:2022:167.15");
    }
}
