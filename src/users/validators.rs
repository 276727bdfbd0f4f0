// src/users/validators.rs

use super::models::*;
use crate::auth::validators::validate_password_field;
use crate::common::validation::{validate_email_field, validate_name_field};
use crate::common::{ValidationResult, Validator};

pub struct CreateAccountValidator;

impl Validator<CreateAccountRequest> for CreateAccountValidator {
    fn validate(&self, data: &CreateAccountRequest) -> ValidationResult {
        let mut result = ValidationResult::new();

        validate_email_field(&mut result, "email", &data.email);
        if let Some(password) = &data.password {
            validate_password_field(&mut result, "password", password);
        }
        validate_name_field(&mut result, "firstName", data.first_name.as_deref());
        validate_name_field(&mut result, "lastName", data.last_name.as_deref());

        result
    }
}

pub struct UpdateAccountValidator;

impl Validator<UpdateAccountRequest> for UpdateAccountValidator {
    fn validate(&self, data: &UpdateAccountRequest) -> ValidationResult {
        let mut result = ValidationResult::new();

        if let Some(email) = &data.email {
            validate_email_field(&mut result, "email", email);
        }
        if let Some(password) = &data.password {
            validate_password_field(&mut result, "password", password);
        }
        validate_name_field(&mut result, "firstName", data.first_name.as_deref());
        validate_name_field(&mut result, "lastName", data.last_name.as_deref());

        result
    }
}

pub struct ListAccountsValidator;

impl Validator<ListAccountsQuery> for ListAccountsValidator {
    fn validate(&self, data: &ListAccountsQuery) -> ValidationResult {
        let mut result = ValidationResult::new();

        if let Some(role) = &data.role {
            if role.parse::<Role>().is_err() {
                result.add_error("role", "Role must be one of admin, user, guest");
            }
        }

        if let Some(page) = &data.page {
            if !page.parse::<u32>().map_or(false, |p| p >= 1) {
                result.add_error("page", "Page must be a whole number of at least 1");
            }
        }

        if let Some(limit) = &data.limit {
            if !limit
                .parse::<u32>()
                .map_or(false, |l| (1..=MAX_PAGE_LIMIT).contains(&l))
            {
                result.add_error("limit", "Limit must be between 1 and 100");
            }
        }

        if let Some(sort_by) = &data.sort_by {
            if sort_by.parse::<SortField>().is_err() {
                result.add_error("sortBy", "Unknown sort field");
            }
        }

        if let Some(sort_order) = &data.sort_order {
            if sort_order.parse::<SortOrder>().is_err() {
                result.add_error("sortOrder", "Sort order must be ASC or DESC");
            }
        }

        result
    }
}
