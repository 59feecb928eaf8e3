//! WizardEngine — the per-session state machine a host UI drives.
//!
//! The engine is pure state: every operation returns synchronously except
//! the two collaborator calls (submit, upload). The host re-reads
//! `snapshot`, `errors`, `current_step` and `submission_state` after each call.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{self, EngineError, SubmissionError, UploadError};
use crate::store::{AuthContext, CanonicalRecord, DocumentStore, RecordStore};

use super::definition::WizardDefinition;
use super::submission::{SubmissionCoordinator, SubmissionMode, SubmissionRequest};
use super::value::{ErrorMap, FieldId, FieldKind, FieldValue, Snapshot};

/// Why the last submission attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailureReason {
    /// At least one field was invalid; nothing was sent.
    Validation { field: FieldId, step: usize },
    /// The persistence collaborator rejected or could not complete the call.
    Persistence { error: SubmissionError },
}

/// Submission lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum SubmissionState {
    #[default]
    Idle,
    InFlight,
    Succeeded,
    Failed(FailureReason),
}

impl std::fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::InFlight => "submitting",
            Self::Succeeded => "submitted",
            Self::Failed(_) => "submission_failed",
        };
        write!(f, "{s}")
    }
}

/// Result of `go_next`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepTransition {
    Advanced { from: usize, to: usize },
    /// The active step has errors; `field`/`message` is the first of them.
    Blocked { field: FieldId, message: String },
}

/// Result of a submission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Validation failed; the engine jumped to `step`.
    Invalid {
        step: usize,
        field: FieldId,
        message: String,
    },
    Saved { record_id: String },
    Failed(SubmissionError),
}

/// Handed out by `begin_submit` and consumed by `complete_submit`.
#[derive(Debug)]
pub struct SubmissionTicket {
    request: SubmissionRequest,
    /// Fields that stop counting as unsent once this submission succeeds.
    settles: Vec<FieldId>,
}

impl SubmissionTicket {
    pub fn request(&self) -> &SubmissionRequest {
        &self.request
    }
}

/// Either a ticket to send, or the validation failure that blocked it.
#[derive(Debug)]
pub enum SubmitStart {
    Ready(SubmissionTicket),
    Blocked(SubmitOutcome),
}

/// Per-step completion, recomputed on every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepStatus {
    pub index: usize,
    pub id: String,
    pub complete: bool,
    pub error_count: usize,
}

/// Serializable read model for hosts.
#[derive(Debug, Clone, Serialize)]
pub struct EngineView<'a> {
    pub wizard: &'a str,
    pub current_step: usize,
    pub step_id: &'a str,
    pub step_count: usize,
    pub snapshot: &'a Snapshot,
    pub errors: &'a ErrorMap,
    pub dirty: bool,
    pub submission: &'a SubmissionState,
    pub mode: &'a SubmissionMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<&'a str>,
}

pub struct WizardEngine {
    definition: Arc<WizardDefinition>,
    snapshot: Snapshot,
    current_step: usize,
    errors: ErrorMap,
    /// Fields edited since they were last part of a successful submission.
    unsent: BTreeSet<FieldId>,
    submission: SubmissionState,
    coordinator: SubmissionCoordinator,
    /// Edits made while a submission is in flight, applied once it settles.
    queued: Vec<(FieldId, FieldValue)>,
    /// Operation-shaped failure message for a single dismissible notice.
    notice: Option<String>,
}

/// Earliest failure in wizard order among `errors`.
fn first_failure(definition: &WizardDefinition, errors: &ErrorMap) -> (FieldId, String) {
    match definition.first_error(errors) {
        Some((f, m)) => (f.clone(), m.to_string()),
        // Errors keyed outside the wizard cannot occur: every rule target is
        // owned by a step. Routing falls back to the active step.
        None => (FieldId::new(), String::new()),
    }
}

impl WizardEngine {
    /// A fresh session that will create a new record on first submit.
    pub fn new(definition: Arc<WizardDefinition>, auth: AuthContext) -> Self {
        let snapshot = definition.default_snapshot();
        Self::with_parts(definition, snapshot, SubmissionMode::Create, auth)
    }

    /// An edit session bound to an existing record, seeded from its data.
    /// Fields the wizard doesn't know, or values of the wrong kind, are skipped.
    pub fn for_existing(
        definition: Arc<WizardDefinition>,
        auth: AuthContext,
        record: CanonicalRecord,
    ) -> Self {
        let mut snapshot = definition.default_snapshot();
        for (field, value) in record.fields {
            match definition.kind_of(&field) {
                Some(kind) if value.fits(kind) => snapshot.set(field, value),
                Some(_) => warn!(field = %field, "Ignoring seeded value of the wrong kind"),
                None => debug!(field = %field, "Ignoring seeded value for unknown field"),
            }
        }
        let mode = SubmissionMode::Update {
            record_id: record.id,
        };
        Self::with_parts(definition, snapshot, mode, auth)
    }

    fn with_parts(
        definition: Arc<WizardDefinition>,
        snapshot: Snapshot,
        mode: SubmissionMode,
        auth: AuthContext,
    ) -> Self {
        Self {
            definition,
            snapshot,
            current_step: 0,
            errors: ErrorMap::new(),
            unsent: BTreeSet::new(),
            submission: SubmissionState::Idle,
            coordinator: SubmissionCoordinator::new(mode, auth),
            queued: Vec::new(),
            notice: None,
        }
    }

    // ── Reads ───────────────────────────────────────────────────────

    pub fn definition(&self) -> &WizardDefinition {
        &self.definition
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn value(&self, field: &str) -> &FieldValue {
        self.snapshot.get(field)
    }

    pub fn errors(&self) -> &ErrorMap {
        &self.errors
    }

    pub fn error_for(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn is_dirty(&self) -> bool {
        !self.unsent.is_empty()
    }

    pub fn submission_state(&self) -> &SubmissionState {
        &self.submission
    }

    pub fn mode(&self) -> &SubmissionMode {
        self.coordinator.mode()
    }

    pub fn record_id(&self) -> Option<&str> {
        self.coordinator.record_id()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn queued_edits(&self) -> usize {
        self.queued.len()
    }

    pub fn view(&self) -> EngineView<'_> {
        let step_id = self
            .definition
            .step(self.current_step)
            .map(|s| s.id.as_str())
            .unwrap_or_default();
        EngineView {
            wizard: self.definition.name(),
            current_step: self.current_step,
            step_id,
            step_count: self.definition.step_count(),
            snapshot: &self.snapshot,
            errors: &self.errors,
            dirty: self.is_dirty(),
            submission: &self.submission,
            mode: self.coordinator.mode(),
            notice: self.notice(),
        }
    }

    /// Completion of every step against the current snapshot.
    pub fn step_statuses(&self) -> Vec<StepStatus> {
        self.definition
            .steps()
            .iter()
            .enumerate()
            .map(|(index, step)| {
                let error_count = self.definition.validate_step(index, &self.snapshot).len();
                StepStatus {
                    index,
                    id: step.id.clone(),
                    complete: error_count == 0,
                    error_count,
                }
            })
            .collect()
    }

    // ── Edits ───────────────────────────────────────────────────────

    /// Set a field's value. Allowed for any known field regardless of the
    /// active step. While a submission is in flight the edit is queued and
    /// applied once it settles, so it lands in the next submission.
    pub fn update_field(
        &mut self,
        field: &str,
        value: impl Into<FieldValue>,
    ) -> Result<(), EngineError> {
        let value = value.into();
        let kind = self
            .definition
            .kind_of(field)
            .ok_or_else(|| EngineError::UnknownField(field.to_string()))?;
        if !value.fits(kind) {
            return Err(EngineError::KindMismatch {
                field: field.to_string(),
                expected: kind.to_string(),
            });
        }

        if self.submission == SubmissionState::InFlight {
            debug!(field = %field, "Queueing edit until the in-flight submission settles");
            self.queued.push((field.to_string(), value));
            return Ok(());
        }

        self.apply_edit(field.to_string(), value);
        Ok(())
    }

    fn apply_edit(&mut self, field: FieldId, value: FieldValue) {
        debug!(field = %field, "Field updated");
        if self.errors.remove(&field).is_some() {
            debug!(field = %field, "Cleared stale error");
        }
        if self.submission == SubmissionState::Succeeded {
            self.submission = SubmissionState::Idle;
        }
        self.unsent.insert(field.clone());
        self.snapshot.set(field, value);
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    // ── Navigation ──────────────────────────────────────────────────

    fn ensure_not_in_flight(&self, action: &str) -> Result<(), EngineError> {
        if self.submission == SubmissionState::InFlight {
            return Err(self.invalid_transition(action));
        }
        Ok(())
    }

    fn invalid_transition(&self, action: &str) -> EngineError {
        EngineError::InvalidTransition {
            action: action.to_string(),
            state: format!("on step {} ({})", self.current_step, self.submission),
        }
    }

    /// Validate the active step and advance if it has no errors.
    pub fn go_next(&mut self) -> Result<StepTransition, EngineError> {
        self.ensure_not_in_flight("advance")?;
        if self.current_step >= self.definition.last_step() {
            return Err(self.invalid_transition("advance past the last step"));
        }

        let from = self.current_step;
        let step_errors = self.definition.validate_step(from, &self.snapshot);

        if let Some((field, message)) = self.definition.first_error(&step_errors) {
            let blocked = StepTransition::Blocked {
                field: field.clone(),
                message: message.to_string(),
            };
            debug!(step = from, errors = step_errors.len(), "Step blocked by validation");
            self.errors.extend(step_errors);
            return Ok(blocked);
        }

        if let Some(step) = self.definition.step(from) {
            for field in step.field_ids() {
                self.errors.remove(field);
            }
        }
        self.current_step = from + 1;
        info!(from, to = self.current_step, "Advanced wizard step");
        Ok(StepTransition::Advanced {
            from,
            to: self.current_step,
        })
    }

    /// Move back one step without validating.
    pub fn go_back(&mut self) -> Result<usize, EngineError> {
        self.ensure_not_in_flight("go back")?;
        if self.current_step == 0 {
            return Err(self.invalid_transition("go back from the first step"));
        }
        self.current_step -= 1;
        debug!(to = self.current_step, "Moved back one step");
        Ok(self.current_step)
    }

    /// Jump directly to a step, ignoring order.
    pub fn jump_to_step(&mut self, index: usize) -> Result<(), EngineError> {
        self.ensure_not_in_flight("jump")?;
        let count = self.definition.step_count();
        if index >= count {
            return Err(EngineError::StepOutOfRange { index, count });
        }
        self.current_step = index;
        Ok(())
    }

    /// Jump to the step owning `field`. Returns that step's index.
    pub fn jump_to_field(&mut self, field: &str) -> Result<usize, EngineError> {
        let index = self
            .definition
            .step_of(field)
            .ok_or_else(|| EngineError::UnknownField(field.to_string()))?;
        self.jump_to_step(index)?;
        Ok(index)
    }

    // ── Submission ──────────────────────────────────────────────────

    /// Validate every step and, if all pass, move to in-flight and hand back
    /// a ticket. Only valid on the last step and when nothing is in flight.
    pub fn begin_submit(&mut self) -> Result<SubmitStart, EngineError> {
        self.ensure_not_in_flight("submit")?;
        if self.current_step != self.definition.last_step() {
            return Err(self.invalid_transition("submit before the last step"));
        }

        let errors = self.definition.validate_all(&self.snapshot);
        if !errors.is_empty() {
            self.errors = errors;
            let (field, message) = first_failure(&self.definition, &self.errors);
            return Ok(SubmitStart::Blocked(self.route_validation_failure(field, message)));
        }

        self.errors.clear();
        // Transient fields are validated but never sent. A successful full
        // submission still settles them.
        let fields = self.definition.persisted_fields().to_vec();
        let settles = self.definition.field_order().to_vec();
        Ok(SubmitStart::Ready(self.start_flight(fields, settles)))
    }

    /// Like `begin_submit`, but for a subset of fields on a bound record
    /// (e.g. a photo change). Not restricted to the last step.
    pub fn begin_submit_fields(&mut self, fields: &[&str]) -> Result<SubmitStart, EngineError> {
        self.ensure_not_in_flight("submit")?;
        if self.coordinator.record_id().is_none() {
            return Err(EngineError::PartialSubmitInCreateMode);
        }
        let mut owned = Vec::with_capacity(fields.len());
        for field in fields {
            if self.definition.kind_of(field).is_none() {
                return Err(EngineError::UnknownField(field.to_string()));
            }
            if self.definition.is_transient(field) {
                return Err(EngineError::NotPersisted(field.to_string()));
            }
            owned.push(field.to_string());
        }

        let mut all = self.definition.validate_all(&self.snapshot);
        all.retain(|field, _| owned.contains(field));
        if !all.is_empty() {
            // Route by the submitted fields only; unrelated stale errors
            // elsewhere in the map must not redirect the host.
            let (field, message) = first_failure(&self.definition, &all);
            self.errors.extend(all);
            return Ok(SubmitStart::Blocked(self.route_validation_failure(field, message)));
        }

        for field in &owned {
            self.errors.remove(field);
        }
        Ok(SubmitStart::Ready(self.start_flight(owned.clone(), owned)))
    }

    fn route_validation_failure(&mut self, field: FieldId, message: String) -> SubmitOutcome {
        let step = self
            .definition
            .step_of(&field)
            .unwrap_or(self.current_step);
        self.current_step = step;
        self.submission = SubmissionState::Failed(FailureReason::Validation {
            field: field.clone(),
            step,
        });
        debug!(step, field = %field, errors = self.errors.len(), "Submission blocked by validation");
        SubmitOutcome::Invalid {
            step,
            field,
            message,
        }
    }

    fn start_flight(&mut self, fields: Vec<FieldId>, settles: Vec<FieldId>) -> SubmissionTicket {
        let request = self.coordinator.prepare(&self.snapshot, fields);
        self.submission = SubmissionState::InFlight;
        self.notice = None;
        info!(
            wizard = %self.definition.name(),
            fields = request.fields.len(),
            mode = ?request.mode,
            "Submission started"
        );
        SubmissionTicket { request, settles }
    }

    /// Settle an in-flight submission with the collaborator's result.
    pub fn complete_submit(
        &mut self,
        ticket: SubmissionTicket,
        result: Result<CanonicalRecord, SubmissionError>,
    ) -> Result<SubmitOutcome, EngineError> {
        if self.submission != SubmissionState::InFlight {
            return Err(self.invalid_transition("complete a submission"));
        }
        let SubmissionTicket { request, settles } = ticket;

        let outcome = match result {
            Ok(record) => {
                self.coordinator.bind(&record);
                SubmissionCoordinator::merge(&mut self.snapshot, &request.fields, &record);
                for field in &settles {
                    self.unsent.remove(field);
                }
                self.submission = SubmissionState::Succeeded;
                info!(record_id = %record.id, "Submission succeeded");
                SubmitOutcome::Saved {
                    record_id: record.id,
                }
            }
            Err(error) => {
                warn!(kind = %error.kind, error = %error, "Submission failed");
                self.notice = Some(error.user_message().to_string());
                self.submission = SubmissionState::Failed(FailureReason::Persistence {
                    error: error.clone(),
                });
                SubmitOutcome::Failed(error)
            }
        };

        for (field, value) in std::mem::take(&mut self.queued) {
            self.apply_edit(field, value);
        }
        Ok(outcome)
    }

    /// Validate everything and, if valid, persist through `store`.
    pub async fn submit(&mut self, store: &dyn RecordStore) -> Result<SubmitOutcome, EngineError> {
        match self.begin_submit()? {
            SubmitStart::Blocked(outcome) => Ok(outcome),
            SubmitStart::Ready(ticket) => self.send(store, ticket).await,
        }
    }

    /// Persist a subset of fields on a bound record.
    pub async fn submit_fields(
        &mut self,
        store: &dyn RecordStore,
        fields: &[&str],
    ) -> Result<SubmitOutcome, EngineError> {
        match self.begin_submit_fields(fields)? {
            SubmitStart::Blocked(outcome) => Ok(outcome),
            SubmitStart::Ready(ticket) => self.send(store, ticket).await,
        }
    }

    async fn send(
        &mut self,
        store: &dyn RecordStore,
        ticket: SubmissionTicket,
    ) -> Result<SubmitOutcome, EngineError> {
        let result = self.coordinator.send(store, &ticket.request).await;
        self.complete_submit(ticket, result)
    }

    // ── Documents ───────────────────────────────────────────────────

    /// Upload a file into a document slot and mark the slot as uploaded.
    /// Files are owned by the bound record, or by the auth subject before
    /// the record exists.
    pub async fn upload_document(
        &mut self,
        store: &dyn DocumentStore,
        slot: &str,
        bytes: Vec<u8>,
    ) -> error::Result<String> {
        match self.definition.kind_of(slot) {
            Some(FieldKind::Record) => {}
            Some(_) => return Err(EngineError::NotADocumentSlot(slot.to_string()).into()),
            None => return Err(EngineError::UnknownField(slot.to_string()).into()),
        }
        if bytes.is_empty() {
            return Err(UploadError::EmptyFile {
                slot: slot.to_string(),
            }
            .into());
        }

        let owner = self
            .coordinator
            .record_id()
            .unwrap_or(self.coordinator.auth().subject.as_str())
            .to_string();
        let size = bytes.len();
        let url = store.upload(&owner, slot, bytes).await?;
        info!(slot = %slot, owner = %owner, size, "Document uploaded");

        self.update_field(slot, FieldValue::uploaded_document(url.clone()))?;
        Ok(url)
    }
}
