//! Discriminator-driven requirements.
//!
//! A discriminator field with a closed set of values selects which extra
//! fields are mandatory. Unknown values fail closed; an unset discriminator
//! is reported before any of its sub-fields.

use std::collections::BTreeMap;

use tracing::warn;

use super::rules::{FieldRule, Outcome};
use super::step::ValidationContext;
use super::value::{ErrorMap, FieldId, FieldValue, Snapshot};

#[derive(Debug, Clone)]
pub struct ConditionalRequirementSet {
    discriminator: FieldId,
    choices: BTreeMap<String, Vec<FieldId>>,
    unset_message: String,
    unknown_message: String,
}

impl ConditionalRequirementSet {
    pub fn new(discriminator: impl Into<FieldId>) -> Self {
        Self {
            discriminator: discriminator.into(),
            choices: BTreeMap::new(),
            unset_message: "Choose an option first".to_string(),
            unknown_message: "Unsupported option".to_string(),
        }
    }

    /// Register `value` and the fields it makes mandatory. An empty list is
    /// allowed: the value is known but imposes nothing extra.
    pub fn choice<I, S>(mut self, value: impl Into<String>, required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<FieldId>,
    {
        self.choices
            .insert(value.into(), required.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_unset_message(mut self, message: impl Into<String>) -> Self {
        self.unset_message = message.into();
        self
    }

    pub fn with_unknown_message(mut self, message: impl Into<String>) -> Self {
        self.unknown_message = message.into();
        self
    }

    pub fn discriminator(&self) -> &FieldId {
        &self.discriminator
    }

    pub fn choices(&self) -> impl Iterator<Item = &str> {
        self.choices.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }

    /// Every field any choice can require.
    pub fn referenced_fields(&self) -> impl Iterator<Item = &FieldId> {
        self.choices.values().flatten()
    }

    /// Extra required fields for `value`, or `None` if the value is not in
    /// the enumeration.
    pub fn required_extra_fields(&self, value: &str) -> Option<&[FieldId]> {
        self.choices.get(value).map(Vec::as_slice)
    }

    /// Check the snapshot against the requirements selected by the current
    /// discriminator value.
    pub fn evaluate(&self, snapshot: &Snapshot, ctx: &ValidationContext<'_>) -> ErrorMap {
        let mut errors = ErrorMap::new();
        let current = snapshot.get(&self.discriminator);

        if current.is_blank() {
            errors.insert(self.discriminator.clone(), self.unset_message.clone());
            return errors;
        }

        let required = match current {
            FieldValue::Text(value) => self.required_extra_fields(value.trim()),
            _ => None,
        };
        let Some(required) = required else {
            warn!(
                discriminator = %self.discriminator,
                "Discriminator holds a value outside its enumeration"
            );
            errors.insert(self.discriminator.clone(), self.unknown_message.clone());
            return errors;
        };

        let rule = FieldRule::required();
        for field in required {
            let outcome = rule.evaluate(
                snapshot.get(field),
                snapshot,
                ctx.label(field),
                ctx.fallback(),
            );
            if let Outcome::Invalid(message) = outcome {
                errors.insert(field.clone(), message);
            }
        }
        errors
    }
}
