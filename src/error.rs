use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Invalid {name}: '{value}' (expected {expected})")]
    InvalidArgument {
        name: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("Required column not found in header: {column}")]
    MissingColumn { column: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ReportError {
    pub fn invalid_argument(
        name: &'static str,
        value: impl Into<String>,
        expected: &'static str,
    ) -> Self {
        Self::InvalidArgument {
            name,
            value: value.into(),
            expected,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;
