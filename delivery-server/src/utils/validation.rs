//! Input validation helpers
//!
//! DTOs derive `validator::Validate`; [`validate_request`] turns the field
//! errors into a single [`AppError`]. The text helpers cover fields checked
//! outside a DTO.

use validator::Validate;

use crate::utils::AppError;

/// Free-text reasons and comments (cancellation reason, rating comment)
pub const MAX_NOTE_LEN: usize = 500;

/// Special instructions on an order
pub const MAX_INSTRUCTIONS_LEN: usize = 1000;

/// Phone numbers in any common notation
pub const MAX_PHONE_LEN: usize = 20;

/// Proof-of-delivery references (URL or storage key)
pub const MAX_URL_LEN: usize = 2048;

/// Run derived validation and flatten the errors
pub fn validate_request<T: Validate>(value: &T) -> Result<(), AppError> {
    value.validate().map_err(|errors| {
        let mut fields: Vec<String> = errors
            .field_errors()
            .iter()
            .map(|(field, errs)| {
                let reason = errs
                    .first()
                    .and_then(|e| e.message.as_ref())
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "is invalid".to_string());
                format!("{field} {reason}")
            })
            .collect();
        fields.sort();
        AppError::validation(fields.join("; "))
    })
}

/// Validate that a required string is non-empty and within the length limit.
pub fn validate_required_text(value: &str, field: &str, max_len: usize) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} must not be empty")));
    }
    if value.len() > max_len {
        return Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            value.len()
        )));
    }
    Ok(())
}

/// Validate that an optional string, if present, is within the length limit.
pub fn validate_optional_text(
    value: Option<&str>,
    field: &str,
    max_len: usize,
) -> Result<(), AppError> {
    match value {
        Some(v) if v.len() > max_len => Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            v.len()
        ))),
        _ => Ok(()),
    }
}

/// Mobile-money payer number: digits with an optional leading `+`
pub fn validate_phone(value: &str) -> Result<(), AppError> {
    let digits = value.strip_prefix('+').unwrap_or(value);
    if digits.len() < 8 || value.len() > MAX_PHONE_LEN || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::validation(format!("invalid phone number: {value}")));
    }
    Ok(())
}
