//! Declarative field validators.
//!
//! A rule is a pure function of the field's value and the whole snapshot.
//! Evaluation never fails open: a rule that cannot decide (wrong value kind,
//! panicking predicate) reports the configured fallback message.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::warn;

use super::value::{FieldKind, FieldValue, Snapshot};

/// Loose email shape check: something@something.tld, no whitespace.
static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid"));

/// Predicate used by custom rules.
pub type Predicate = Arc<dyn Fn(&FieldValue, &Snapshot) -> bool + Send + Sync>;

/// Result of evaluating one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Valid,
    Invalid(String),
}

impl Outcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

#[derive(Clone)]
enum RuleKind {
    Required,
    MinLength(usize),
    Pattern(Regex),
    NonEmptyCollection,
    Custom { name: String, predicate: Predicate },
}

/// A validator attached to one field.
#[derive(Clone)]
pub struct FieldRule {
    kind: RuleKind,
    message: Option<String>,
}

impl std::fmt::Debug for FieldRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldRule")
            .field("rule", &self.name())
            .field("message", &self.message)
            .finish()
    }
}

impl FieldRule {
    fn from_kind(kind: RuleKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }

    /// Invalid if the value is empty text, an empty collection, or absent.
    pub fn required() -> Self {
        Self::from_kind(RuleKind::Required)
    }

    /// Invalid if the text is shorter than `n` characters.
    pub fn min_length(n: usize) -> Self {
        Self::from_kind(RuleKind::MinLength(n))
    }

    /// Invalid if the text does not match `pattern`.
    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self::from_kind(RuleKind::Pattern(Regex::new(pattern)?)))
    }

    /// Email-format pattern rule.
    pub fn email() -> Self {
        Self::from_kind(RuleKind::Pattern(EMAIL_REGEX.clone()))
            .with_message("Enter a valid email address")
    }

    /// Invalid if a set field has zero elements.
    pub fn non_empty_collection() -> Self {
        Self::from_kind(RuleKind::NonEmptyCollection)
    }

    /// Arbitrary predicate over the value and the full snapshot.
    pub fn custom<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&FieldValue, &Snapshot) -> bool + Send + Sync + 'static,
    {
        Self::from_kind(RuleKind::Custom {
            name: name.into(),
            predicate: Arc::new(predicate),
        })
    }

    /// Override the default failure message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Short rule name, used in definition errors and logs.
    pub fn name(&self) -> String {
        match &self.kind {
            RuleKind::Required => "required".to_string(),
            RuleKind::MinLength(n) => format!("min_length({n})"),
            RuleKind::Pattern(re) => format!("pattern({})", re.as_str()),
            RuleKind::NonEmptyCollection => "non_empty_collection".to_string(),
            RuleKind::Custom { name, .. } => format!("custom({name})"),
        }
    }

    /// Whether this rule can be attached to a field of `kind`.
    pub fn applies_to(&self, kind: FieldKind) -> bool {
        match self.kind {
            RuleKind::Required | RuleKind::Custom { .. } => true,
            RuleKind::MinLength(_) | RuleKind::Pattern(_) => kind == FieldKind::Text,
            RuleKind::NonEmptyCollection => kind == FieldKind::TextSet,
        }
    }

    /// Evaluate against `value`. `label` personalizes default messages;
    /// `fallback` is reported when the rule cannot decide.
    pub fn evaluate(
        &self,
        value: &FieldValue,
        snapshot: &Snapshot,
        label: Option<&str>,
        fallback: &str,
    ) -> Outcome {
        match self.check(value, snapshot) {
            Some(true) => Outcome::Valid,
            Some(false) => Outcome::Invalid(self.failure_message(label)),
            None => {
                warn!(rule = %self.name(), "Rule could not be evaluated, failing closed");
                Outcome::Invalid(fallback.to_string())
            }
        }
    }

    /// `None` means undecidable.
    fn check(&self, value: &FieldValue, snapshot: &Snapshot) -> Option<bool> {
        match &self.kind {
            RuleKind::Required => Some(!value.is_blank()),
            RuleKind::MinLength(n) => match value {
                FieldValue::Empty => Some(false),
                FieldValue::Text(s) => Some(s.chars().count() >= *n),
                _ => None,
            },
            RuleKind::Pattern(re) => match value {
                FieldValue::Empty => Some(false),
                FieldValue::Text(s) => Some(re.is_match(s.trim())),
                _ => None,
            },
            RuleKind::NonEmptyCollection => match value {
                FieldValue::Empty => Some(false),
                FieldValue::TextSet(set) => Some(!set.is_empty()),
                _ => None,
            },
            RuleKind::Custom { predicate, .. } => {
                catch_unwind(AssertUnwindSafe(|| predicate(value, snapshot))).ok()
            }
        }
    }

    fn failure_message(&self, label: Option<&str>) -> String {
        if let Some(ref message) = self.message {
            return message.clone();
        }
        let subject = label.unwrap_or("This field");
        match &self.kind {
            RuleKind::Required => format!("{subject} is required"),
            RuleKind::MinLength(n) => format!("{subject} must be at least {n} characters"),
            RuleKind::Pattern(_) => format!("{subject} has an invalid format"),
            RuleKind::NonEmptyCollection => format!("{subject}: select at least one option"),
            RuleKind::Custom { .. } => format!("{subject} is invalid"),
        }
    }
}
