//! Errors shared by the content services

use thiserror::Error;
use validator::ValidationErrors;

use super::captcha::CaptchaError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Field-level failures from `validator`
    #[error("Invalid input")]
    InvalidFields(ValidationErrors),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ValidationErrors> for ServiceError {
    fn from(errors: ValidationErrors) -> Self {
        ServiceError::InvalidFields(errors)
    }
}

impl From<CaptchaError> for ServiceError {
    fn from(error: CaptchaError) -> Self {
        match error {
            CaptchaError::Unavailable(msg) => ServiceError::Internal(anyhow::anyhow!("CAPTCHA service unavailable: {}", msg)),
            other => ServiceError::Validation(other.to_string()),
        }
    }
}

impl ServiceError {
    pub fn not_found(what: impl Into<String>) -> Self {
        ServiceError::NotFound(what.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ServiceError::Forbidden(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ServiceError::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ServiceError::Conflict(msg.into())
    }

    /// A status change the state machine does not allow
    pub fn bad_transition(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        ServiceError::Validation(format!("Cannot change status from {} to {}", from, to))
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Probe {
        #[validate(length(min = 3))]
        name: String,
    }

    #[test]
    fn test_validation_errors_convert() {
        let err: ServiceError = Probe { name: "a".into() }.validate().unwrap_err().into();
        match err {
            ServiceError::InvalidFields(errors) => assert!(errors.field_errors().contains_key("name")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_bad_transition_message() {
        let err = ServiceError::bad_transition("pending", "banned");
        assert_eq!(err.to_string(), "Validation error: Cannot change status from pending to banned");
    }

    #[test]
    fn test_captcha_errors_map() {
        assert!(matches!(ServiceError::from(CaptchaError::MissingToken), ServiceError::Validation(_)));
        assert!(matches!(
            ServiceError::from(CaptchaError::Unavailable("timeout".into())),
            ServiceError::Internal(_)
        ));
    }
}
