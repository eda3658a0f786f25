use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("Unknown filter field: {0}")]
    UnknownField(String),

    #[error("Filter '{0}' given more than once")]
    DuplicateField(String),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Invalid page: {0}")]
    InvalidPage(String),

    #[error("Invalid limit: {0}")]
    InvalidLimit(String),
}

impl FilterError {
    /// Query key the error refers to, for field-level error reporting.
    pub fn field(&self) -> &str {
        match self {
            FilterError::UnknownField(f) | FilterError::DuplicateField(f) => f,
            FilterError::InvalidValue { field, .. } => field,
            FilterError::InvalidPage(_) => "page",
            FilterError::InvalidLimit(_) => "limit",
        }
    }
}
