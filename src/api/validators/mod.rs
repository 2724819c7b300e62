pub mod account;

use serde::{Deserialize, Serialize};

pub use account::{sanitize, sanitize_opt, AgeValidator, EmailValidator};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    pub code: String,
    pub message: String,
    pub field: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl From<ValidationError> for crate::error::AppError {
    fn from(e: ValidationError) -> Self {
        crate::error::AppError::Validation(e.message)
    }
}

pub trait Validator<T: ?Sized> {
    fn validate(&self, input: &T) -> Result<(), ValidationError>;
}
