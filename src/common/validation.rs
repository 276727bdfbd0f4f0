// Common validation types and traits

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
        }
    }

    pub fn add_error(&mut self, field: &str, message: &str) {
        self.is_valid = false;
        self.errors.push(ValidationError {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    /// Turns an invalid result into an `Err` for `?` in handlers.
    pub fn into_result(self) -> Result<(), ValidationResult> {
        if self.is_valid {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

pub trait Validator<T> {
    fn validate(&self, data: &T) -> ValidationResult;
}

/// Checks the shape of an email address, not its deliverability.
pub fn is_valid_email(email: &str) -> bool {
    email.len() <= 254 && email_regex().is_match(email)
}

/// Validates an email field and records the error under `field`.
pub fn validate_email_field(result: &mut ValidationResult, field: &str, email: &str) {
    if email.trim().is_empty() {
        result.add_error(field, "Email is required");
    } else if !is_valid_email(email) {
        result.add_error(field, "Email must be a valid email address");
    }
}

/// Validates an optional name field's length.
pub fn validate_name_field(result: &mut ValidationResult, field: &str, value: Option<&str>) {
    if let Some(value) = value {
        if value.len() > 100 {
            result.add_error(field, "Name must be less than 100 characters");
        }
    }
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid"))
}
