use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use nutri_wizard::answers::Answers;
use nutri_wizard::config::WizardConfig;
use nutri_wizard::flows::{self, professional::fields};
use nutri_wizard::store::{AuthContext, InMemoryStore};
use nutri_wizard::wizard::{FieldKind, StepTransition, SubmitOutcome, WizardEngine};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let answers_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("NUTRI_WIZARD_ANSWERS").ok())
        .map(PathBuf::from)
        .context("usage: nutri-wizard <answers.json> (or set NUTRI_WIZARD_ANSWERS)")?;

    let config = WizardConfig::from_env()?;
    let answers = Answers::load(&answers_path)
        .await
        .with_context(|| format!("loading {}", answers_path.display()))?;

    eprintln!("🥗 Nutri Wizard v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Answers: {}", answers_path.display());
    eprintln!("   Subject: {}", answers.subject);

    let definition = Arc::new(flows::onboarding(&config)?);
    let store = InMemoryStore::new().with_unique_field(fields::EMAIL);
    let mut engine = WizardEngine::new(definition.clone(), AuthContext::new(&answers.subject));

    // Walk the steps in order, filling each one before advancing.
    for (index, step) in definition.steps().iter().enumerate() {
        for field in step.field_ids() {
            if let Some(value) = answers.fields.get(field) {
                engine.update_field(field, value.clone())?;
            }
        }

        if index < definition.last_step() {
            match engine.go_next()? {
                StepTransition::Advanced { to, .. } => {
                    eprintln!("   ✓ {} → step {}", step.id, to);
                }
                StepTransition::Blocked { field, message } => {
                    eprintln!("   ✗ {}: {field}: {message}", step.id);
                    break;
                }
            }
        }
    }

    if engine.current_step() == definition.last_step() {
        for (slot, contents) in &answers.documents {
            if definition.kind_of(slot) != Some(FieldKind::Record) {
                eprintln!("   Skipping unknown document slot {slot}");
                continue;
            }
            let url = engine
                .upload_document(&store, slot, contents.clone().into_bytes())
                .await?;
            eprintln!("   Uploaded {slot} → {url}");
        }

        match engine.submit(&store).await? {
            SubmitOutcome::Saved { record_id } => eprintln!("   Saved record {record_id}"),
            SubmitOutcome::Invalid {
                step,
                field,
                message,
            } => eprintln!("   Submission blocked on step {step}: {field}: {message}"),
            SubmitOutcome::Failed(error) => eprintln!("   Submission failed: {error}"),
        }
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "current_step": engine.current_step(),
            "errors": engine.errors(),
            "submission": engine.submission_state(),
            "mode": engine.mode(),
            "steps": engine.step_statuses(),
            "notice": engine.notice(),
        }))?
    );

    Ok(())
}
