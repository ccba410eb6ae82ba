//! Request validation helpers
//!
//! Provides type-safe validation with clear error messages.

use crate::error::{AppError, ValidationBuilder};

/// Validation result type
pub type ValidationResult<T> = Result<T, AppError>;

/// Validated wrapper type - indicates the value has been validated
#[derive(Debug, Clone)]
pub struct Validated<T>(pub T);

impl<T> Validated<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> std::ops::Deref for Validated<T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Validator builder for complex validations
pub struct Validator {
    builder: ValidationBuilder,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            builder: ValidationBuilder::new(),
        }
    }

    /// Add error for a field
    pub fn error(mut self, field: &str, message: &str) -> Self {
        self.builder = self.builder.error(field, message);
        self
    }

    /// Add error if condition is true
    pub fn error_if(self, condition: bool, field: &str, message: &str) -> Self {
        if condition {
            self.error(field, message)
        } else {
            self
        }
    }

    /// Validate required string
    pub fn required_string(self, value: &Option<String>, field: &str) -> Self {
        match value {
            Some(s) if !s.trim().is_empty() => self,
            Some(_) => self.error(field, &format!("{} cannot be empty", field)),
            None => self.error(field, &format!("{} is required", field)),
        }
    }

    /// Validate max length in characters, ignoring surrounding whitespace
    pub fn max_length(self, value: &Option<String>, field: &str, max: usize) -> Self {
        match value {
            Some(s) if s.trim().chars().count() > max => {
                self.error(field, &format!("{} must be {} characters or less", field, max))
            }
            _ => self,
        }
    }

    /// Finish validation, returning error if any
    pub fn finish(self) -> ValidationResult<()> {
        match self.builder.build() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Finish with a value if valid
    pub fn finish_with<T>(self, value: T) -> ValidationResult<Validated<T>> {
        self.finish()?;
        Ok(Validated(value))
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}
