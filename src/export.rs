//! `ExportFormatter` (spec §4.J "export" archive method): the formatter
//! registry is an external collaborator — only `format_emails`/
//! `file_extension` are consumed here.

use crate::store::EmailIndex;

pub trait ExportFormatter: Send + Sync {
    fn format_emails(&self, emails: &[EmailIndex]) -> Vec<u8>;
    fn file_extension(&self) -> &'static str;
}

/// Minimal default formatter: one JSON array of the exported rows.
pub struct JsonExportFormatter;

impl ExportFormatter for JsonExportFormatter {
    fn format_emails(&self, emails: &[EmailIndex]) -> Vec<u8> {
        serde_json::to_vec_pretty(emails).unwrap_or_default()
    }

    fn file_extension(&self) -> &'static str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_formatter_round_trips_through_serde() {
        let formatter = JsonExportFormatter;
        let email = EmailIndex::new_minimal("e1", Some("u1".to_string()));
        let bytes = formatter.format_emails(&[email]);
        let parsed: Vec<EmailIndex> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(formatter.file_extension(), "json");
    }
}
