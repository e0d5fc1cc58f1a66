//! Theme engine error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ThemeError {
    /// Parsing, inheritance or rendering failed
    #[error("Template error: {0}")]
    TemplateError(String),
}
