use thiserror::Error;

pub type CealResult<T> = Result<T, CealError>;

#[derive(Error, Debug)]
pub enum CealError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl From<rust_xlsxwriter::XlsxError> for CealError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        CealError::Export(e.to_string())
    }
}
