//! Field values, the snapshot, and the error map.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Unique key of a field within one wizard.
pub type FieldId = String;

/// Field-identifier-keyed validation failures.
pub type ErrorMap = BTreeMap<FieldId, String>;

/// A flat set of field values, as sent to or returned from persistence.
pub type Record = BTreeMap<FieldId, FieldValue>;

/// Key inside a document record that flags a completed upload.
pub const DOCUMENT_UPLOADED_KEY: &str = "uploaded";
/// Key inside a document record holding the stored file's URL.
pub const DOCUMENT_URL_KEY: &str = "url";

/// The kind a field is declared with. Rules are checked against it at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    TextSet,
    Record,
    Flag,
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Text => "text",
            Self::TextSet => "text_set",
            Self::Record => "record",
            Self::Flag => "flag",
        };
        write!(f, "{s}")
    }
}

/// The value of one field.
///
/// Serialized untagged so host payloads read naturally: `null`, `true`,
/// `"text"`, `["a", "b"]`, `{"uploaded": true}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    #[default]
    Empty,
    Flag(bool),
    Text(String),
    TextSet(BTreeSet<String>),
    Record(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn text_set<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::TextSet(items.into_iter().map(Into::into).collect())
    }

    /// Document-slot value recorded after a successful upload.
    pub fn uploaded_document(url: impl Into<String>) -> Self {
        let mut record = BTreeMap::new();
        record.insert(DOCUMENT_UPLOADED_KEY.to_string(), Self::Flag(true));
        record.insert(DOCUMENT_URL_KEY.to_string(), Self::Text(url.into()));
        Self::Record(record)
    }

    /// The kind of this value, or `None` for `Empty` (which fits every kind).
    pub fn kind(&self) -> Option<FieldKind> {
        match self {
            Self::Empty => None,
            Self::Flag(_) => Some(FieldKind::Flag),
            Self::Text(_) => Some(FieldKind::Text),
            Self::TextSet(_) => Some(FieldKind::TextSet),
            Self::Record(_) => Some(FieldKind::Record),
        }
    }

    pub fn fits(&self, kind: FieldKind) -> bool {
        self.kind().is_none_or(|k| k == kind)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_text_set(&self) -> Option<&BTreeSet<String>> {
        match self {
            Self::TextSet(set) => Some(set),
            _ => None,
        }
    }

    /// Whether a document record carries a truthy `uploaded` flag.
    pub fn is_uploaded(&self) -> bool {
        match self {
            Self::Record(r) => matches!(r.get(DOCUMENT_UPLOADED_KEY), Some(Self::Flag(true))),
            _ => false,
        }
    }

    /// Whether the value counts as "not provided".
    ///
    /// Whitespace-only text is blank. A flag is blank when false. A record
    /// is blank unless it carries `uploaded: true`.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Flag(b) => !b,
            Self::Text(s) => s.trim().is_empty(),
            Self::TextSet(set) => set.is_empty(),
            Self::Record(_) => !self.is_uploaded(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Flag(b)
    }
}

static EMPTY: FieldValue = FieldValue::Empty;

/// The complete current set of field values for one wizard session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    values: Record,
}

impl Snapshot {
    pub fn new(values: Record) -> Self {
        Self { values }
    }

    /// Current value of a field; absent fields read as `Empty`.
    pub fn get(&self, id: &str) -> &FieldValue {
        self.values.get(id).unwrap_or(&EMPTY)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.values.contains_key(id)
    }

    pub(crate) fn set(&mut self, id: impl Into<FieldId>, value: FieldValue) {
        self.values.insert(id.into(), value);
    }

    /// Copy out the named fields as a record.
    pub fn project<'a, I>(&self, ids: I) -> Record
    where
        I: IntoIterator<Item = &'a FieldId>,
    {
        ids.into_iter()
            .map(|id| (id.clone(), self.get(id).clone()))
            .collect()
    }

    pub fn values(&self) -> &Record {
        &self.values
    }
}
