//! Validation of raw, untyped task input into the typed field sets the store accepts.
use serde::Deserialize;
use std::fmt;

use super::{NewTask, TaskChanges};

/// Maximum number of characters allowed in a task title.
pub const TITLE_MAX_LENGTH: usize = 200;

/// Value of `completed` when a new task is submitted without one.
pub const DEFAULT_COMPLETED: bool = false;

/// Task fields exactly as submitted, before any validation.
///
/// Every field is optional because nothing about the submission is trusted.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct RawTaskFields {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<String>,
}

/// Why a single field was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldErrorReason {
    Required,
    TooLong { max: usize, actual: usize },
}

impl FieldErrorReason {
    /// Short machine-readable code for the reason.
    pub fn code(&self) -> &'static str {
        match self {
            FieldErrorReason::Required => "required",
            FieldErrorReason::TooLong { .. } => "too_long",
        }
    }
}

impl fmt::Display for FieldErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldErrorReason::Required => write!(f, "This field is required."),
            FieldErrorReason::TooLong { max, actual } => write!(
                f,
                "Ensure this value has at most {} characters (it has {}).",
                max, actual
            ),
        }
    }
}

/// A rejection scoped to one named field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    field: &'static str,
    reason: FieldErrorReason,
}

impl FieldError {
    pub fn new(field: &'static str, reason: FieldErrorReason) -> Self {
        Self { field, reason }
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn reason(&self) -> FieldErrorReason {
        self.reason
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// The full set of field errors found in one submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    /// Returns the first error recorded for `field`, if any.
    pub fn for_field(&self, field: &str) -> Option<&FieldError> {
        self.errors.iter().find(|error| error.field == field)
    }

    /// Human-readable message for `field`, used by the form templates.
    pub fn message_for(&self, field: &str) -> Option<String> {
        self.for_field(field).map(|error| error.reason.to_string())
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = self
            .errors
            .iter()
            .map(|error| format!("{} ({})", error.field, error.reason.code()))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "Invalid task fields: {}", summary)
    }
}

impl std::error::Error for ValidationErrors {}

impl From<FieldError> for ValidationErrors {
    fn from(error: FieldError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

/// Checks a title as submitted. No trimming is done.
pub fn validate_title(title: &str) -> Result<(), FieldError> {
    let length = title.chars().count();
    if length == 0 {
        return Err(FieldError::new("title", FieldErrorReason::Required));
    }
    if length > TITLE_MAX_LENGTH {
        return Err(FieldError::new(
            "title",
            FieldErrorReason::TooLong {
                max: TITLE_MAX_LENGTH,
                actual: length,
            },
        ));
    }
    Ok(())
}

/// Coerces a submitted checkbox value into a boolean.
///
/// `""`, `"0"` and `"false"` (any case) are false; every other value is true.
pub fn parse_checkbox(value: &str) -> bool {
    !(value.is_empty() || value == "0" || value.eq_ignore_ascii_case("false"))
}

impl RawTaskFields {
    /// Validates the submission as a brand new task.
    ///
    /// A missing title counts as empty; a missing `completed` falls back to
    /// [`DEFAULT_COMPLETED`].
    pub fn validate_new(&self) -> Result<NewTask, ValidationErrors> {
        let title = self.title.clone().unwrap_or_default();
        validate_title(&title)?;

        Ok(NewTask {
            title,
            description: self.description.clone(),
            completed: Some(
                self.completed
                    .as_deref()
                    .map(parse_checkbox)
                    .unwrap_or(DEFAULT_COMPLETED),
            ),
        })
    }

    /// Validates the submission as changes to an existing task.
    ///
    /// Missing fields stay `None` and leave the stored value untouched.
    pub fn validate_changes(&self) -> Result<TaskChanges, ValidationErrors> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }

        Ok(TaskChanges {
            title: self.title.clone(),
            description: self.description.clone(),
            completed: self.completed.as_deref().map(parse_checkbox),
        })
    }
}
