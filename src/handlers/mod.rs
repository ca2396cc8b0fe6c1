pub mod auth;
pub mod category;
pub mod post;
pub mod topic;

use crate::error::{AppError, AppResult};
use chrono::NaiveDateTime;
use validator::{Validate, ValidationError};

pub use auth::{get_current_user, login, logout, register};

fn validate_payload<T: Validate>(payload: &T) -> AppResult<()> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(format!("Validation error: {e}")))
}

/// Rejects strings made only of whitespace.
fn non_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// Stored timestamps are naive UTC.
fn timestamp(value: NaiveDateTime) -> String {
    value.and_utc().to_rfc3339()
}
