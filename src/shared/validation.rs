//! Validation Utilities

use validator::{Validate, ValidationErrors};

use super::error::AppError;

/// Validate a request body, folding field errors into a single `AppError`.
pub fn validate_request<T: Validate>(request: &T) -> Result<(), AppError> {
    request.validate().map_err(validation_error)
}

/// Convert validation errors to AppError.
///
/// Fields are reported in alphabetical order so the message is stable.
pub fn validation_error(errors: ValidationErrors) -> AppError {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                let detail = e
                    .message
                    .clone()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string());
                format!("{}: {}", field, detail)
            })
        })
        .collect();
    messages.sort();

    if messages.is_empty() {
        AppError::Validation("Validation failed".into())
    } else {
        AppError::Validation(messages.join("; "))
    }
}
