//! Wizard & validation engine.
//!
//! A `WizardDefinition` (ordered steps of fields, rules and discriminator
//! requirements) is built once and shared; each session drives its own
//! `WizardEngine` through updates, step transitions and submission.

pub mod conditional;
pub mod definition;
pub mod engine;
pub mod rules;
pub mod step;
pub mod submission;
pub mod value;

pub use conditional::ConditionalRequirementSet;
pub use definition::WizardDefinition;
pub use engine::{
    EngineView, FailureReason, StepStatus, StepTransition, SubmissionState, SubmissionTicket,
    SubmitOutcome, SubmitStart, WizardEngine,
};
pub use rules::{FieldRule, Outcome};
pub use step::{CrossRule, FieldSpec, StepDefinition, ValidationContext};
pub use submission::{SubmissionCoordinator, SubmissionMode, SubmissionRequest};
pub use value::{ErrorMap, FieldId, FieldKind, FieldValue, Record, Snapshot};
