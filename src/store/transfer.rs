//! JSON import and export of record collections

use crate::error::{Error, Result};
use crate::models::LegalRecord;
use chrono::NaiveDate;
use serde_json::Value;

/// Parsed import payload
#[derive(Debug, Default)]
pub struct ImportReport {
    pub records: Vec<LegalRecord>,

    /// One description per skipped entry
    pub malformed: Vec<String>,
}

/// Parse a single record object or an array of records.
///
/// A payload that is not JSON, or is neither an object nor an array, is an
/// error. Individual entries that do not describe a record are reported in
/// [`ImportReport::malformed`] and skipped.
pub fn parse_records(bytes: &[u8]) -> Result<ImportReport> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| Error::ImportMalformed(e.to_string()))?;

    let entries = match value {
        Value::Array(entries) => entries,
        Value::Object(_) => vec![value],
        other => {
            return Err(Error::ImportMalformed(format!(
                "expected a record or an array of records, found {}",
                json_kind(&other)
            )))
        }
    };

    let mut report = ImportReport::default();
    for (index, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<LegalRecord>(entry) {
            Ok(record) if record.storage_key().trim().is_empty() => {
                report
                    .malformed
                    .push(format!("entry {}: missing id and ecli", index));
            }
            Ok(record) => report.records.push(record),
            Err(e) => report.malformed.push(format!("entry {}: {}", index, e)),
        }
    }

    Ok(report)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Serialize every record into one pretty-printed JSON array
pub fn export_all(records: &[LegalRecord]) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(records)?)
}

/// File name for an export made on `date`
pub fn export_file_name(date: NaiveDate) -> String {
    format!("jurisprudencia_{}.json", date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE: &str = r#"{"id":"ECLI:PT:STJ:2022:1","ecli":"ECLI:PT:STJ:2022:1","processo":"1/22","data":"01/02/2022","relator":"Ana Costa"}"#;

    #[test]
    fn test_single_object() {
        let report = parse_records(ONE.as_bytes()).unwrap();
        assert_eq!(report.records.len(), 1);
        assert!(report.malformed.is_empty());
    }

    #[test]
    fn test_array_with_bad_entries() {
        let payload = format!(r#"[{ONE}, "texto", {{"id":"","ecli":"","processo":"","data":"","relator":""}}]"#);
        let report = parse_records(payload.as_bytes()).unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.malformed.len(), 2);
        assert!(report.malformed[1].contains("missing id"));
    }

    #[test]
    fn test_rejected_payloads() {
        assert!(matches!(parse_records(b"42"), Err(Error::ImportMalformed(_))));
        assert!(matches!(parse_records(b"{broken"), Err(Error::ImportMalformed(_))));
    }

    #[test]
    fn test_export_is_importable() {
        let records = parse_records(ONE.as_bytes()).unwrap().records;
        let bytes = export_all(&records).unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("\n  {"));
        assert_eq!(parse_records(&bytes).unwrap().records, records);
        assert!(export_all(&[]).unwrap().starts_with(b"["));
    }

    #[test]
    fn test_export_file_name() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(export_file_name(date), "jurisprudencia_2024-03-07.json");
    }
}
