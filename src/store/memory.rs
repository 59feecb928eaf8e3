//! In-memory record and document store.
//!
//! Reference implementation of the persistence collaborators, used by the
//! demo binary and tests. Text values are trimmed on write, so the canonical
//! record can differ from what was sent.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{SubmissionError, UploadError};
use crate::wizard::value::{FieldId, FieldValue, Record};

use super::traits::{AuthContext, CanonicalRecord, DocumentStore, RecordStore};

#[derive(Debug, Clone)]
struct StoredRecord {
    owner: String,
    fields: Record,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Stored file metadata, for inspection.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub owner_id: String,
    pub slot: String,
    pub size: usize,
    pub uploaded_at: DateTime<Utc>,
}

pub struct InMemoryStore {
    records: RwLock<HashMap<String, StoredRecord>>,
    documents: RwLock<HashMap<(String, String), (StoredDocument, Vec<u8>)>>,
    /// Field whose value must be unique across records (duplicate-key check).
    unique_field: Option<FieldId>,
    /// Largest accepted upload, in bytes.
    max_document_size: Option<usize>,
    base_url: String,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            documents: RwLock::new(HashMap::new()),
            unique_field: None,
            max_document_size: None,
            base_url: "memory://documents".to_string(),
        }
    }

    /// Reject creates and updates that would duplicate `field`'s value.
    pub fn with_unique_field(mut self, field: impl Into<FieldId>) -> Self {
        self.unique_field = Some(field.into());
        self
    }

    /// Reject uploads larger than `bytes`.
    pub fn with_max_document_size(mut self, bytes: usize) -> Self {
        self.max_document_size = Some(bytes);
        self
    }

    /// Fetch a record as canonical data.
    pub async fn get(&self, id: &str) -> Option<CanonicalRecord> {
        let records = self.records.read().await;
        records.get(id).map(|r| CanonicalRecord {
            id: id.to_string(),
            fields: r.fields.clone(),
        })
    }

    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }

    /// When a record was created and last updated.
    pub async fn timestamps(&self, id: &str) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let records = self.records.read().await;
        records.get(id).map(|r| (r.created_at, r.updated_at))
    }

    pub async fn document(&self, owner_id: &str, slot: &str) -> Option<StoredDocument> {
        let documents = self.documents.read().await;
        documents
            .get(&(owner_id.to_string(), slot.to_string()))
            .map(|(meta, _)| meta.clone())
    }

    fn conflicts(
        &self,
        records: &HashMap<String, StoredRecord>,
        skip_id: Option<&str>,
        incoming: &Record,
    ) -> Option<SubmissionError> {
        let field = self.unique_field.as_ref()?;
        let value = incoming.get(field).filter(|v| !v.is_blank())?;
        records
            .iter()
            .filter(|(id, _)| Some(id.as_str()) != skip_id)
            .any(|(_, r)| r.fields.get(field) == Some(value))
            .then(|| SubmissionError::conflict(format!("duplicate value for {field}")))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Server-side canonicalization: trim text.
fn normalize(record: Record) -> Record {
    record
        .into_iter()
        .map(|(k, v)| match v {
            FieldValue::Text(s) => (k, FieldValue::Text(s.trim().to_string())),
            other => (k, other),
        })
        .collect()
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn create(
        &self,
        auth: &AuthContext,
        record: Record,
    ) -> Result<CanonicalRecord, SubmissionError> {
        let fields = normalize(record);
        let mut records = self.records.write().await;
        if let Some(conflict) = self.conflicts(&records, None, &fields) {
            return Err(conflict);
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        records.insert(
            id.clone(),
            StoredRecord {
                owner: auth.subject.clone(),
                fields: fields.clone(),
                created_at: now,
                updated_at: now,
            },
        );
        info!(record_id = %id, owner = %auth.subject, "Record created");
        Ok(CanonicalRecord { id, fields })
    }

    async fn update(
        &self,
        auth: &AuthContext,
        id: &str,
        partial: Record,
    ) -> Result<CanonicalRecord, SubmissionError> {
        let partial = normalize(partial);
        let mut records = self.records.write().await;
        if let Some(conflict) = self.conflicts(&records, Some(id), &partial) {
            return Err(conflict);
        }

        let stored = records
            .get_mut(id)
            .ok_or_else(|| SubmissionError::unknown(format!("record {id} not found")))?;
        if stored.owner != auth.subject {
            return Err(SubmissionError::permission(format!(
                "{} may not edit record {id}",
                auth.subject
            )));
        }

        let changed = partial.len();
        stored.fields.extend(partial);
        stored.updated_at = Utc::now();
        debug!(record_id = %id, fields = changed, "Record updated");
        Ok(CanonicalRecord {
            id: id.to_string(),
            fields: stored.fields.clone(),
        })
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn upload(
        &self,
        owner_id: &str,
        slot: &str,
        bytes: Vec<u8>,
    ) -> Result<String, UploadError> {
        if bytes.is_empty() {
            return Err(UploadError::EmptyFile {
                slot: slot.to_string(),
            });
        }
        if let Some(max) = self.max_document_size.filter(|max| bytes.len() > *max) {
            warn!(slot = %slot, size = bytes.len(), max, "Rejecting oversized upload");
            return Err(UploadError::Failed {
                slot: slot.to_string(),
                reason: format!("file exceeds {max} bytes"),
            });
        }
        let meta = StoredDocument {
            owner_id: owner_id.to_string(),
            slot: slot.to_string(),
            size: bytes.len(),
            uploaded_at: Utc::now(),
        };
        let mut documents = self.documents.write().await;
        documents.insert((owner_id.to_string(), slot.to_string()), (meta, bytes));
        Ok(format!("{}/{owner_id}/{slot}", self.base_url))
    }
}
