//! Prepared answers for driving a wizard without a UI.
//!
//! Used by the demo binary: a JSON file with the auth subject, field values
//! and document contents keyed by slot.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::wizard::Record;

fn default_subject() -> String {
    "demo-user".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Answers {
    #[serde(default = "default_subject")]
    pub subject: String,
    #[serde(default)]
    pub fields: Record,
    /// Slot → file contents.
    #[serde(default)]
    pub documents: BTreeMap<String, String>,
}

impl Answers {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = tokio::fs::read_to_string(path).await?;
        Self::from_json(&raw)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::wizard::FieldValue;

    #[test]
    fn parses_mixed_field_values() {
        let answers = Answers::from_json(
            r#"{
                "fields": {
                    "email": "ana@clinic.mx",
                    "work_days": ["monday", "friday"],
                    "accept_terms": true
                },
                "documents": {"id_document": "scan"}
            }"#,
        )
        .unwrap();
        assert_eq!(answers.subject, "demo-user");
        assert_eq!(answers.fields["email"], FieldValue::text("ana@clinic.mx"));
        assert_eq!(
            answers.fields["work_days"],
            FieldValue::text_set(["friday", "monday"])
        );
        assert_eq!(answers.fields["accept_terms"], FieldValue::Flag(true));
        assert_eq!(answers.documents["id_document"], "scan");
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            Answers::from_json("{not json"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[tokio::test]
    async fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"subject": "pro-9", "fields": {{"full_name": "Ana"}}}}"#).unwrap();
        let answers = Answers::load(file.path()).await.unwrap();
        assert_eq!(answers.subject, "pro-9");
        assert!(answers.documents.is_empty());
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Answers::load(&dir.path().join("absent.json")).await.unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
