//! Boundary traits for the collaborators the wizard engine drives.
//!
//! Timeouts and retries belong to implementations; the engine only sees
//! success or an opaque, categorized failure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{SubmissionError, UploadError};
use crate::wizard::value::Record;

/// Identity captured at engine construction, used to scope persistence calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    /// Opaque subject identifier supplied by the host's auth layer.
    pub subject: String,
}

impl AuthContext {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
        }
    }
}

/// The authoritative record as returned by persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub id: String,
    pub fields: Record,
}

/// Persistence collaborator.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Create a record; the returned record carries the newly assigned id.
    async fn create(
        &self,
        auth: &AuthContext,
        record: Record,
    ) -> Result<CanonicalRecord, SubmissionError>;

    /// Apply a partial update to an existing record.
    async fn update(
        &self,
        auth: &AuthContext,
        id: &str,
        partial: Record,
    ) -> Result<CanonicalRecord, SubmissionError>;
}

/// Document-upload collaborator.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store `bytes` under `owner_id`/`slot`, returning the file's URL.
    async fn upload(
        &self,
        owner_id: &str,
        slot: &str,
        bytes: Vec<u8>,
    ) -> Result<String, UploadError>;
}
