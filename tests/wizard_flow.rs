//! End-to-end tests for the wizard engine through its public API.
//!
//! Drives real engines against mock and in-memory persistence collaborators.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use nutri_wizard::config::WizardConfig;
use nutri_wizard::error::{EngineError, SubmissionError, SubmissionErrorKind};
use nutri_wizard::flows::{self, professional::categories, professional::fields};
use nutri_wizard::store::{AuthContext, CanonicalRecord, InMemoryStore, RecordStore};
use nutri_wizard::wizard::{
    ConditionalRequirementSet, FailureReason, FieldRule, FieldSpec, FieldValue, Record,
    StepDefinition, StepTransition, SubmissionMode, SubmissionState, SubmitOutcome,
    WizardDefinition, WizardEngine,
};

/// Records every persistence call; create always returns id "abc".
#[derive(Default)]
struct CallLog {
    calls: Mutex<Vec<String>>,
}

impl CallLog {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordStore for CallLog {
    async fn create(
        &self,
        _auth: &AuthContext,
        record: Record,
    ) -> Result<CanonicalRecord, SubmissionError> {
        self.calls.lock().unwrap().push("create".to_string());
        Ok(CanonicalRecord {
            id: "abc".to_string(),
            fields: record,
        })
    }

    async fn update(
        &self,
        _auth: &AuthContext,
        id: &str,
        partial: Record,
    ) -> Result<CanonicalRecord, SubmissionError> {
        self.calls.lock().unwrap().push(format!("update:{id}"));
        Ok(CanonicalRecord {
            id: id.to_string(),
            fields: partial,
        })
    }
}

/// Always fails with the given category.
struct FailingStore(SubmissionErrorKind);

#[async_trait]
impl RecordStore for FailingStore {
    async fn create(
        &self,
        _auth: &AuthContext,
        _record: Record,
    ) -> Result<CanonicalRecord, SubmissionError> {
        Err(SubmissionError::new(self.0, "rejected"))
    }

    async fn update(
        &self,
        _auth: &AuthContext,
        _id: &str,
        _partial: Record,
    ) -> Result<CanonicalRecord, SubmissionError> {
        Err(SubmissionError::new(self.0, "rejected"))
    }
}

/// Two steps: account (email, password) and a kind discriminator with
/// A → {docA}, B → {docB1, docB2}.
fn scenario_definition() -> Arc<WizardDefinition> {
    let steps = vec![
        StepDefinition::new("account")
            .field(
                FieldSpec::text("email")
                    .rule(FieldRule::email().with_message("invalid format")),
            )
            .field(
                FieldSpec::text("password")
                    .rule(FieldRule::min_length(8).with_message("too short")),
            ),
        StepDefinition::new("documents")
            .field(FieldSpec::text("kind"))
            .field(FieldSpec::record("docA"))
            .field(FieldSpec::record("docB1"))
            .field(FieldSpec::record("docB2"))
            .conditional(
                ConditionalRequirementSet::new("kind")
                    .choice("A", ["docA"])
                    .choice("B", ["docB1", "docB2"]),
            ),
    ];
    Arc::new(WizardDefinition::new("scenario", steps).unwrap())
}

fn scenario_engine() -> WizardEngine {
    WizardEngine::new(scenario_definition(), AuthContext::new("user-1"))
}

fn error_keys(engine: &WizardEngine) -> Vec<&str> {
    engine.errors().keys().map(String::as_str).collect()
}

#[tokio::test]
async fn concrete_two_step_scenario() {
    let store = CallLog::default();
    let mut engine = scenario_engine();

    engine.update_field("email", "x").unwrap();
    engine.update_field("password", "short").unwrap();
    assert!(matches!(
        engine.go_next().unwrap(),
        StepTransition::Blocked { .. }
    ));
    assert_eq!(engine.current_step(), 0);
    assert_eq!(engine.error_for("email"), Some("invalid format"));
    assert_eq!(engine.error_for("password"), Some("too short"));
    assert_eq!(engine.errors().len(), 2);

    engine.update_field("email", "ana@clinic.mx").unwrap();
    engine.update_field("password", "longenough").unwrap();
    assert_eq!(
        engine.go_next().unwrap(),
        StepTransition::Advanced { from: 0, to: 1 }
    );
    assert_eq!(engine.current_step(), 1);

    engine.update_field("kind", "B").unwrap();
    let outcome = engine.submit(&store).await.unwrap();

    assert!(matches!(outcome, SubmitOutcome::Invalid { step: 1, .. }));
    assert_eq!(error_keys(&engine), vec!["docB1", "docB2"]);
    assert_eq!(engine.error_for("docB1"), Some("This field is required"));
    assert_eq!(engine.current_step(), 1);
    assert!(matches!(
        engine.submission_state(),
        SubmissionState::Failed(FailureReason::Validation { step: 1, .. })
    ));
    assert!(store.calls().is_empty(), "persistence must not be called");
}

#[test]
fn revalidation_is_idempotent() {
    let engine = scenario_engine();
    let def = engine.definition();
    for index in 0..def.step_count() {
        assert_eq!(
            def.validate_step(index, engine.snapshot()),
            def.validate_step(index, engine.snapshot())
        );
    }
}

#[test]
fn error_clears_on_edit_even_if_others_remain() {
    let mut engine = scenario_engine();
    engine.go_next().unwrap();
    assert_eq!(error_keys(&engine), vec!["email", "password"]);

    engine.update_field("password", "longenough").unwrap();
    assert_eq!(error_keys(&engine), vec!["email"]);
}

#[test]
fn no_skip_ahead_while_step_invalid() {
    let mut engine = scenario_engine();
    for _ in 0..3 {
        engine.go_next().unwrap();
        assert_eq!(engine.current_step(), 0);
    }
}

#[test]
fn back_is_unconditional() {
    let mut engine = scenario_engine();
    engine.jump_to_step(1).unwrap();
    engine.update_field("email", "broken").unwrap();
    engine.update_field("kind", "Z").unwrap();
    assert_eq!(engine.go_back().unwrap(), 0);
}

#[tokio::test]
async fn discriminator_switch_enforces_only_new_choice() {
    let mut engine = scenario_engine();
    engine.update_field("email", "ana@clinic.mx").unwrap();
    engine.update_field("password", "longenough").unwrap();
    engine.update_field("kind", "A").unwrap();
    engine
        .update_field("docA", FieldValue::uploaded_document("https://f/docA"))
        .unwrap();
    engine.jump_to_step(1).unwrap();

    engine.update_field("kind", "B").unwrap();
    engine.submit(&CallLog::default()).await.unwrap();

    assert_eq!(error_keys(&engine), vec!["docB1", "docB2"]);
    // Data for the abandoned choice is retained.
    assert!(engine.value("docA").is_uploaded());
}

#[tokio::test]
async fn submit_routes_to_lowest_failing_step() {
    let mut engine = scenario_engine();
    engine.update_field("password", "longenough").unwrap();
    engine.update_field("kind", "A").unwrap();
    engine.jump_to_step(1).unwrap();

    let outcome = engine.submit(&CallLog::default()).await.unwrap();
    assert_eq!(
        outcome,
        SubmitOutcome::Invalid {
            step: 0,
            field: "email".to_string(),
            message: "invalid format".to_string(),
        }
    );
    assert_eq!(engine.current_step(), 0);
    assert!(engine.errors().contains_key("docA"));
}

#[tokio::test]
async fn create_then_update() {
    let store = CallLog::default();
    let mut engine = scenario_engine();
    engine.update_field("email", "ana@clinic.mx").unwrap();
    engine.update_field("password", "longenough").unwrap();
    engine.update_field("kind", "A").unwrap();
    engine
        .update_field("docA", FieldValue::uploaded_document("u"))
        .unwrap();
    engine.jump_to_step(1).unwrap();

    assert_eq!(
        engine.submit(&store).await.unwrap(),
        SubmitOutcome::Saved {
            record_id: "abc".to_string()
        }
    );
    assert_eq!(
        engine.mode(),
        &SubmissionMode::Update {
            record_id: "abc".to_string()
        }
    );

    engine.update_field("docB1", FieldValue::uploaded_document("extra")).unwrap();
    engine.submit(&store).await.unwrap();

    assert_eq!(store.calls(), vec!["create", "update:abc"]);
}

#[tokio::test]
async fn persistence_failure_is_retryable_and_not_field_shaped() {
    let mut engine = scenario_engine();
    engine.update_field("email", "ana@clinic.mx").unwrap();
    engine.update_field("password", "longenough").unwrap();
    engine.update_field("kind", "A").unwrap();
    engine
        .update_field("docA", FieldValue::uploaded_document("u"))
        .unwrap();
    engine.jump_to_step(1).unwrap();

    let outcome = engine
        .submit(&FailingStore(SubmissionErrorKind::Permission))
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        SubmitOutcome::Failed(SubmissionError {
            kind: SubmissionErrorKind::Permission,
            ..
        })
    ));
    assert!(engine.errors().is_empty());
    assert_eq!(engine.current_step(), 1);
    assert_eq!(
        engine.notice(),
        Some("You don't have permission to save this profile.")
    );

    engine.dismiss_notice();
    let retry = engine.submit(&CallLog::default()).await.unwrap();
    assert!(matches!(retry, SubmitOutcome::Saved { .. }));
    assert_eq!(engine.submission_state(), &SubmissionState::Succeeded);
}

#[tokio::test]
async fn professional_onboarding_end_to_end() {
    let config = WizardConfig::default();
    let definition = Arc::new(flows::onboarding(&config).unwrap());
    let store = InMemoryStore::new().with_unique_field(fields::EMAIL);
    let mut engine = WizardEngine::new(definition, AuthContext::new("pro-1"));

    engine.update_field(fields::EMAIL, " ana@clinic.mx ").unwrap();
    engine.update_field(fields::PASSWORD, "s3cure-pass").unwrap();
    engine.update_field(fields::CONFIRM_PASSWORD, "s3cure-pass").unwrap();
    engine.update_field(fields::ACCEPT_TERMS, true).unwrap();
    assert!(matches!(
        engine.go_next().unwrap(),
        StepTransition::Advanced { to: 1, .. }
    ));

    engine.update_field(fields::FULL_NAME, "Ana Ruiz").unwrap();
    engine
        .update_field(
            fields::BIO,
            "Clinical nutritionist focused on metabolic health and sports performance.",
        )
        .unwrap();
    engine
        .update_field(fields::SPECIALIZATIONS, FieldValue::text_set(["sports", "diabetes"]))
        .unwrap();
    engine.go_next().unwrap();

    engine
        .update_field(fields::CONSULTATION_TYPES, FieldValue::text_set(["online"]))
        .unwrap();
    engine
        .update_field(fields::SERVICES, FieldValue::text_set(["meal_plan"]))
        .unwrap();
    engine
        .update_field(fields::WORK_DAYS, FieldValue::text_set(["monday", "thursday"]))
        .unwrap();
    assert!(matches!(
        engine.go_next().unwrap(),
        StepTransition::Advanced { to: 3, .. }
    ));

    engine
        .update_field(fields::CATEGORY, categories::NUTRITIONIST)
        .unwrap();
    for slot in [
        fields::ID_DOCUMENT,
        fields::DEGREE_CERTIFICATE,
        fields::PROFESSIONAL_LICENSE,
    ] {
        engine
            .upload_document(&store, slot, b"%PDF-1.7".to_vec())
            .await
            .unwrap();
    }
    assert!(store.document("pro-1", fields::ID_DOCUMENT).await.is_some());

    let SubmitOutcome::Saved { record_id } = engine.submit(&store).await.unwrap() else {
        panic!("expected the profile to be saved");
    };
    // Server canonicalization (trimmed email) wins for submitted fields.
    assert_eq!(
        engine.value(fields::EMAIL),
        &FieldValue::text("ana@clinic.mx")
    );
    assert!(!engine.is_dirty());

    // Credentials are validated but never stored with the profile.
    let stored = store.get(&record_id).await.unwrap();
    assert!(!stored.fields.contains_key(fields::PASSWORD));
    assert!(!stored.fields.contains_key(fields::CONFIRM_PASSWORD));
    assert_eq!(stored.fields[fields::ACCEPT_TERMS], FieldValue::Flag(true));
    assert_eq!(
        engine.submit_fields(&store, &[fields::PASSWORD]).await,
        Err(EngineError::NotPersisted(fields::PASSWORD.to_string()))
    );

    // A later photo change is a partial update on the same record.
    engine
        .upload_document(&store, fields::PHOTO, b"PNG".to_vec())
        .await
        .unwrap();
    engine.update_field(fields::BIO, "Draft bio, not saved yet").unwrap();
    let photo = engine.submit_fields(&store, &[fields::PHOTO]).await.unwrap();
    assert_eq!(photo, SubmitOutcome::Saved { record_id: record_id.clone() });
    assert_eq!(store.record_count().await, 1);

    let saved = store.get(&record_id).await.unwrap();
    assert!(saved.fields[fields::PHOTO].is_uploaded());
    assert_ne!(
        saved.fields[fields::BIO],
        FieldValue::text("Draft bio, not saved yet")
    );
    assert_eq!(
        engine.value(fields::BIO),
        &FieldValue::text("Draft bio, not saved yet")
    );
    assert!(engine.is_dirty());
}

#[tokio::test]
async fn duplicate_unique_field_surfaces_as_conflict() {
    let config = WizardConfig::default();
    let definition = Arc::new(flows::profile_edit(&config).unwrap());
    let store = InMemoryStore::new().with_unique_field(fields::FULL_NAME);

    let fill = |engine: &mut WizardEngine| {
        engine.update_field(fields::FULL_NAME, "Ana Ruiz").unwrap();
        engine
            .update_field(fields::BIO, "x".repeat(config.min_bio_len))
            .unwrap();
        engine
            .update_field(fields::SPECIALIZATIONS, FieldValue::text_set(["sports"]))
            .unwrap();
        engine
            .update_field(fields::CONSULTATION_TYPES, FieldValue::text_set(["online"]))
            .unwrap();
        engine
            .update_field(fields::SERVICES, FieldValue::text_set(["coaching"]))
            .unwrap();
        engine
            .update_field(fields::WORK_DAYS, FieldValue::text_set(["friday"]))
            .unwrap();
        engine
            .update_field(fields::CATEGORY, categories::DIETETIC_TECHNICIAN)
            .unwrap();
        engine
            .update_field(fields::ID_DOCUMENT, FieldValue::uploaded_document("id"))
            .unwrap();
        engine
            .update_field(
                fields::TECHNICAL_CERTIFICATE,
                FieldValue::uploaded_document("cert"),
            )
            .unwrap();
        engine.jump_to_step(2).unwrap();
    };

    let mut first = WizardEngine::new(definition.clone(), AuthContext::new("pro-1"));
    fill(&mut first);
    assert!(matches!(
        first.submit(&store).await.unwrap(),
        SubmitOutcome::Saved { .. }
    ));

    let mut second = WizardEngine::new(definition, AuthContext::new("pro-2"));
    fill(&mut second);
    let outcome = second.submit(&store).await.unwrap();
    assert!(matches!(
        outcome,
        SubmitOutcome::Failed(SubmissionError {
            kind: SubmissionErrorKind::Conflict,
            ..
        })
    ));
    assert_eq!(second.record_id(), None, "a failed create stays in create mode");
}

#[test]
fn malformed_definition_fails_fast() {
    let steps = vec![
        StepDefinition::new("one").field(FieldSpec::text("shared")),
        StepDefinition::new("two").field(FieldSpec::text("shared")),
    ];
    let err = WizardDefinition::new("broken", steps).unwrap_err();
    assert!(err.to_string().contains("shared"));
}

#[tokio::test]
async fn document_slot_without_upload_flag_is_still_missing() {
    let definition = Arc::new(flows::profile_edit(&WizardConfig::default()).unwrap());
    let store = InMemoryStore::new();
    let mut engine = WizardEngine::new(definition, AuthContext::new("pro-1"));

    engine.update_field(fields::FULL_NAME, "Ana Ruiz").unwrap();
    engine.update_field(fields::BIO, "b".repeat(60)).unwrap();
    engine
        .update_field(fields::SPECIALIZATIONS, FieldValue::text_set(["sports"]))
        .unwrap();
    engine
        .update_field(fields::CONSULTATION_TYPES, FieldValue::text_set(["online"]))
        .unwrap();
    engine
        .update_field(fields::SERVICES, FieldValue::text_set(["coaching"]))
        .unwrap();
    engine
        .update_field(fields::WORK_DAYS, FieldValue::text_set(["friday"]))
        .unwrap();
    engine
        .update_field(fields::CATEGORY, categories::DIETETIC_TECHNICIAN)
        .unwrap();
    engine
        .update_field(fields::ID_DOCUMENT, FieldValue::uploaded_document("id"))
        .unwrap();
    let mut pending = BTreeMap::new();
    pending.insert("note".to_string(), FieldValue::text("pending"));
    engine
        .update_field(fields::TECHNICAL_CERTIFICATE, FieldValue::Record(pending))
        .unwrap();
    engine.jump_to_step(2).unwrap();

    let outcome = engine.submit(&store).await.unwrap();
    assert!(matches!(
        outcome,
        SubmitOutcome::Invalid { ref field, .. } if field == fields::TECHNICAL_CERTIFICATE
    ));
    assert_eq!(store.record_count().await, 0);

    engine
        .upload_document(&store, fields::TECHNICAL_CERTIFICATE, b"%PDF".to_vec())
        .await
        .unwrap();
    assert!(matches!(
        engine.submit(&store).await.unwrap(),
        SubmitOutcome::Saved { .. }
    ));
}
