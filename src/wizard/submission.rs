//! Create-vs-update branching and merge of canonical data.

use serde::Serialize;
use tracing::{info, warn};

use crate::error::SubmissionError;
use crate::store::{AuthContext, CanonicalRecord, RecordStore};

use super::value::{FieldId, Record, Snapshot};

/// Which persistence call the next submission makes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SubmissionMode {
    Create,
    Update { record_id: String },
}

/// A prepared submission: the fields it covers and their values at send time.
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub mode: SubmissionMode,
    pub fields: Vec<FieldId>,
    pub payload: Record,
}

/// Owns the create/update decision for one wizard session.
#[derive(Debug, Clone)]
pub struct SubmissionCoordinator {
    mode: SubmissionMode,
    auth: AuthContext,
}

impl SubmissionCoordinator {
    pub fn new(mode: SubmissionMode, auth: AuthContext) -> Self {
        Self { mode, auth }
    }

    pub fn mode(&self) -> &SubmissionMode {
        &self.mode
    }

    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    pub fn record_id(&self) -> Option<&str> {
        match &self.mode {
            SubmissionMode::Create => None,
            SubmissionMode::Update { record_id } => Some(record_id),
        }
    }

    /// Freeze the values of `fields` into a request.
    pub fn prepare(&self, snapshot: &Snapshot, fields: Vec<FieldId>) -> SubmissionRequest {
        let payload = snapshot.project(&fields);
        SubmissionRequest {
            mode: self.mode.clone(),
            fields,
            payload,
        }
    }

    /// Invoke the persistence collaborator exactly once.
    pub async fn send(
        &self,
        store: &dyn RecordStore,
        request: &SubmissionRequest,
    ) -> Result<CanonicalRecord, SubmissionError> {
        match &request.mode {
            SubmissionMode::Create => store.create(&self.auth, request.payload.clone()).await,
            SubmissionMode::Update { record_id } => {
                store
                    .update(&self.auth, record_id, request.payload.clone())
                    .await
            }
        }
    }

    /// Bind to the record returned by a successful create, so later
    /// submissions update instead of creating a duplicate.
    pub fn bind(&mut self, record: &CanonicalRecord) {
        match &self.mode {
            SubmissionMode::Create => {
                info!(record_id = %record.id, "Created record, switching to update mode");
                self.mode = SubmissionMode::Update {
                    record_id: record.id.clone(),
                };
            }
            SubmissionMode::Update { record_id } if *record_id != record.id => {
                warn!(
                    expected = %record_id,
                    returned = %record.id,
                    "Store returned a different record id on update; keeping the bound id"
                );
            }
            SubmissionMode::Update { .. } => {}
        }
    }

    /// Server wins for the submitted fields it returned; every other field
    /// keeps its local value.
    pub fn merge(snapshot: &mut Snapshot, submitted: &[FieldId], canonical: &CanonicalRecord) {
        for field in submitted {
            if let Some(value) = canonical.fields.get(field) {
                snapshot.set(field.clone(), value.clone());
            }
        }
    }
}
