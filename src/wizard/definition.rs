//! Wizard definitions: ordered steps plus the field→step index used for
//! error routing. Construction rejects malformed definitions.

use std::collections::{HashMap, HashSet};

use crate::error::DefinitionError;

use super::step::{StepDefinition, ValidationContext};
use super::value::{ErrorMap, FieldId, FieldKind, Snapshot};

const DEFAULT_FALLBACK_MESSAGE: &str = "This field could not be validated";

/// An immutable, validated wizard.
#[derive(Debug)]
pub struct WizardDefinition {
    name: String,
    steps: Vec<StepDefinition>,
    /// Every field in wizard order: step order, then declaration order.
    field_order: Vec<FieldId>,
    /// `field_order` without transient fields.
    persisted: Vec<FieldId>,
    owner: HashMap<FieldId, usize>,
    kinds: HashMap<FieldId, FieldKind>,
    labels: HashMap<FieldId, String>,
    fallback_message: String,
}

impl WizardDefinition {
    pub fn new(
        name: impl Into<String>,
        steps: Vec<StepDefinition>,
    ) -> Result<Self, DefinitionError> {
        if steps.is_empty() {
            return Err(DefinitionError::NoSteps);
        }

        let mut step_ids = HashSet::new();
        let mut field_order = Vec::new();
        let mut persisted = Vec::new();
        let mut owner: HashMap<FieldId, usize> = HashMap::new();
        let mut kinds = HashMap::new();
        let mut labels = HashMap::new();

        for (index, step) in steps.iter().enumerate() {
            if !step_ids.insert(step.id.as_str()) {
                return Err(DefinitionError::DuplicateStep(step.id.clone()));
            }
            for field in &step.fields {
                if let Some(&first) = owner.get(&field.id) {
                    return Err(DefinitionError::DuplicateField {
                        field: field.id.clone(),
                        first: steps[first].id.clone(),
                        second: step.id.clone(),
                    });
                }
                if !field.default.fits(field.kind) {
                    return Err(DefinitionError::DefaultKindMismatch {
                        field: field.id.clone(),
                        kind: field.kind.to_string(),
                    });
                }
                if let Some(rule) = field.rules.iter().find(|r| !r.applies_to(field.kind)) {
                    return Err(DefinitionError::RuleKindMismatch {
                        field: field.id.clone(),
                        rule: rule.name(),
                        kind: field.kind.to_string(),
                    });
                }
                owner.insert(field.id.clone(), index);
                kinds.insert(field.id.clone(), field.kind);
                if let Some(ref label) = field.label {
                    labels.insert(field.id.clone(), label.clone());
                }
                if !field.transient {
                    persisted.push(field.id.clone());
                }
                field_order.push(field.id.clone());
            }
        }

        // Rule references are checked once every step's fields are known,
        // so a rule may point at a field owned by a later step.
        for step in &steps {
            let unowned = |field: &FieldId| DefinitionError::UnownedField {
                step: step.id.clone(),
                field: field.clone(),
            };

            for cross in &step.cross_rules {
                let kind = kinds.get(&cross.target).ok_or_else(|| unowned(&cross.target))?;
                if !cross.rule.applies_to(*kind) {
                    return Err(DefinitionError::RuleKindMismatch {
                        field: cross.target.clone(),
                        rule: cross.rule.name(),
                        kind: kind.to_string(),
                    });
                }
            }

            for set in &step.conditionals {
                let discriminator = set.discriminator();
                let kind = kinds.get(discriminator).ok_or_else(|| unowned(discriminator))?;
                if *kind != FieldKind::Text {
                    return Err(DefinitionError::RuleKindMismatch {
                        field: discriminator.clone(),
                        rule: "discriminator".to_string(),
                        kind: kind.to_string(),
                    });
                }
                if set.is_empty() {
                    return Err(DefinitionError::EmptyChoices {
                        field: discriminator.clone(),
                    });
                }
                if let Some(field) = set.referenced_fields().find(|f| !owner.contains_key(*f)) {
                    return Err(unowned(field));
                }
            }
        }

        Ok(Self {
            name: name.into(),
            steps,
            field_order,
            persisted,
            owner,
            kinds,
            labels,
            fallback_message: DEFAULT_FALLBACK_MESSAGE.to_string(),
        })
    }

    /// Message reported when a rule cannot be evaluated.
    pub fn with_fallback_message(mut self, message: impl Into<String>) -> Self {
        self.fallback_message = message.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    pub fn step(&self, index: usize) -> Option<&StepDefinition> {
        self.steps.get(index)
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn last_step(&self) -> usize {
        self.steps.len() - 1
    }

    pub fn field_order(&self) -> &[FieldId] {
        &self.field_order
    }

    /// Fields sent on a full submission, in wizard order.
    pub fn persisted_fields(&self) -> &[FieldId] {
        &self.persisted
    }

    pub fn is_transient(&self, field: &str) -> bool {
        self.step_of(field)
            .and_then(|i| self.steps[i].fields.iter().find(|f| f.id == field))
            .is_some_and(|f| f.transient)
    }

    /// Index of the step that owns `field`.
    pub fn step_of(&self, field: &str) -> Option<usize> {
        self.owner.get(field).copied()
    }

    pub fn kind_of(&self, field: &str) -> Option<FieldKind> {
        self.kinds.get(field).copied()
    }

    pub fn label_of(&self, field: &str) -> Option<&str> {
        self.labels.get(field).map(String::as_str)
    }

    /// A snapshot holding every field's default.
    pub fn default_snapshot(&self) -> Snapshot {
        Snapshot::new(
            self.steps
                .iter()
                .flat_map(|s| &s.fields)
                .map(|f| (f.id.clone(), f.default.clone()))
                .collect(),
        )
    }

    fn context(&self) -> ValidationContext<'_> {
        ValidationContext::new(&self.fallback_message, &self.labels)
    }

    /// Validate one step against the snapshot. Never cached.
    pub fn validate_step(&self, index: usize, snapshot: &Snapshot) -> ErrorMap {
        self.steps
            .get(index)
            .map(|step| step.validate(snapshot, &self.context()))
            .unwrap_or_default()
    }

    /// Validate every step; the union of all step errors.
    pub fn validate_all(&self, snapshot: &Snapshot) -> ErrorMap {
        let ctx = self.context();
        let mut errors = ErrorMap::new();
        for step in &self.steps {
            for (field, message) in step.validate(snapshot, &ctx) {
                errors.entry(field).or_insert(message);
            }
        }
        errors
    }

    /// Earliest field in wizard order that has an error.
    pub fn first_error<'a>(&'a self, errors: &'a ErrorMap) -> Option<(&'a FieldId, &'a str)> {
        self.field_order
            .iter()
            .find_map(|f| errors.get(f).map(|m| (f, m.as_str())))
    }

    /// Step owning the earliest field in wizard order that has an error.
    pub fn first_error_step(&self, errors: &ErrorMap) -> Option<usize> {
        self.first_error(errors).and_then(|(f, _)| self.step_of(f))
    }
}
