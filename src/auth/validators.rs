// src/auth/validators.rs

use super::models::*;
use crate::common::validation::{validate_email_field, validate_name_field};
use crate::common::{ValidationResult, Validator};

/// bcrypt only reads the first 72 bytes of a password.
pub const MAX_PASSWORD_BYTES: usize = 72;
pub const MIN_PASSWORD_CHARS: usize = 6;

/// Length rules for any password that is about to be hashed.
pub fn validate_password_field(result: &mut ValidationResult, field: &str, password: &str) {
    if password.chars().count() < MIN_PASSWORD_CHARS {
        result.add_error(field, "Password must be at least 6 characters");
    } else if password.len() > MAX_PASSWORD_BYTES {
        result.add_error(field, "Password must be at most 72 bytes");
    }
}

pub struct RegisterValidator;

impl Validator<RegisterRequest> for RegisterValidator {
    fn validate(&self, data: &RegisterRequest) -> ValidationResult {
        let mut result = ValidationResult::new();

        validate_email_field(&mut result, "email", &data.email);

        validate_password_field(&mut result, "password", &data.password);

        validate_name_field(&mut result, "firstName", data.first_name.as_deref());
        validate_name_field(&mut result, "lastName", data.last_name.as_deref());

        result
    }
}

pub struct LoginValidator;

impl Validator<LoginRequest> for LoginValidator {
    fn validate(&self, data: &LoginRequest) -> ValidationResult {
        let mut result = ValidationResult::new();

        validate_email_field(&mut result, "email", &data.email);
        if data.password.is_empty() {
            result.add_error("password", "Password is required");
        }

        result
    }
}

pub struct RefreshTokenValidator;

impl Validator<RefreshTokenRequest> for RefreshTokenValidator {
    fn validate(&self, data: &RefreshTokenRequest) -> ValidationResult {
        let mut result = ValidationResult::new();

        if data.refresh_token.trim().is_empty() {
            result.add_error("refreshToken", "Refresh token is required");
        }

        result
    }
}
