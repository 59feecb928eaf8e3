//! Step definitions: the fields a step owns and how the step is validated.

use std::collections::HashMap;

use super::conditional::ConditionalRequirementSet;
use super::rules::{FieldRule, Outcome};
use super::value::{ErrorMap, FieldId, FieldKind, FieldValue, Snapshot};

/// Wizard-wide lookups a validation run needs.
pub struct ValidationContext<'a> {
    fallback: &'a str,
    labels: &'a HashMap<FieldId, String>,
}

impl<'a> ValidationContext<'a> {
    pub fn new(fallback: &'a str, labels: &'a HashMap<FieldId, String>) -> Self {
        Self { fallback, labels }
    }

    pub fn fallback(&self) -> &str {
        self.fallback
    }

    pub fn label(&self, field: &str) -> Option<&str> {
        self.labels.get(field).map(String::as_str)
    }
}

/// Declaration of one field.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub id: FieldId,
    pub kind: FieldKind,
    /// Display label, used only in error messages.
    pub label: Option<String>,
    pub default: FieldValue,
    pub rules: Vec<FieldRule>,
    /// Validated, but never sent to persistence.
    pub transient: bool,
}

impl FieldSpec {
    pub fn new(id: impl Into<FieldId>, kind: FieldKind) -> Self {
        Self {
            id: id.into(),
            kind,
            label: None,
            default: FieldValue::Empty,
            rules: Vec::new(),
            transient: false,
        }
    }

    pub fn text(id: impl Into<FieldId>) -> Self {
        Self::new(id, FieldKind::Text)
    }

    pub fn text_set(id: impl Into<FieldId>) -> Self {
        Self::new(id, FieldKind::TextSet)
    }

    pub fn record(id: impl Into<FieldId>) -> Self {
        Self::new(id, FieldKind::Record)
    }

    pub fn flag(id: impl Into<FieldId>) -> Self {
        Self::new(id, FieldKind::Flag)
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn default_value(mut self, value: FieldValue) -> Self {
        self.default = value;
        self
    }

    pub fn rule(mut self, rule: FieldRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Keep the value session-local (e.g. a password).
    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    /// First failing rule's outcome; rules after it are not reported.
    fn validate(&self, snapshot: &Snapshot, ctx: &ValidationContext<'_>) -> Option<String> {
        let value = snapshot.get(&self.id);
        self.rules.iter().find_map(|rule| {
            match rule.evaluate(value, snapshot, self.label.as_deref(), ctx.fallback()) {
                Outcome::Valid => None,
                Outcome::Invalid(message) => Some(message),
            }
        })
    }
}

/// A cross-field rule whose failure is reported against `target`.
#[derive(Debug, Clone)]
pub struct CrossRule {
    pub target: FieldId,
    pub rule: FieldRule,
}

/// One step (or tab) of a wizard.
#[derive(Debug, Clone)]
pub struct StepDefinition {
    pub id: String,
    pub title: Option<String>,
    pub fields: Vec<FieldSpec>,
    pub cross_rules: Vec<CrossRule>,
    pub conditionals: Vec<ConditionalRequirementSet>,
}

impl StepDefinition {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            fields: Vec::new(),
            cross_rules: Vec::new(),
            conditionals: Vec::new(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn cross_rule(mut self, target: impl Into<FieldId>, rule: FieldRule) -> Self {
        self.cross_rules.push(CrossRule {
            target: target.into(),
            rule,
        });
        self
    }

    pub fn conditional(mut self, set: ConditionalRequirementSet) -> Self {
        self.conditionals.push(set);
        self
    }

    pub fn field_ids(&self) -> impl Iterator<Item = &FieldId> {
        self.fields.iter().map(|f| &f.id)
    }

    pub fn owns(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f.id == field)
    }

    /// Run every field rule, then conditional requirements, then cross-field
    /// rules. All failures are accumulated; a field keeps its first message.
    pub fn validate(&self, snapshot: &Snapshot, ctx: &ValidationContext<'_>) -> ErrorMap {
        let mut errors = ErrorMap::new();

        for field in &self.fields {
            if let Some(message) = field.validate(snapshot, ctx) {
                errors.insert(field.id.clone(), message);
            }
        }

        for set in &self.conditionals {
            for (field, message) in set.evaluate(snapshot, ctx) {
                errors.entry(field).or_insert(message);
            }
        }

        for cross in &self.cross_rules {
            if errors.contains_key(&cross.target) {
                continue;
            }
            let outcome = cross.rule.evaluate(
                snapshot.get(&cross.target),
                snapshot,
                ctx.label(&cross.target),
                ctx.fallback(),
            );
            if let Outcome::Invalid(message) = outcome {
                errors.insert(cross.target.clone(), message);
            }
        }

        errors
    }
}
