use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown action: {0}")]
    InvalidAction(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Navigation to {url} failed: {cause}")]
    NavigationError { url: String, cause: String },

    #[error("Element '{selector}' did not appear within {wait_secs}s")]
    ElementWaitTimeout { selector: String, wait_secs: u64 },

    #[error("Search backend error: {0}")]
    SearchBackendError(String),

    #[error("Search backend unavailable: {0}")]
    SearchUnavailable(String),

    #[error("Text to summarize is empty")]
    EmptyInput,

    #[error("Summarization model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Stable machine-readable kind used in wire-level error objects.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidAction(_) => "invalid_action",
            Error::MissingField(_) => "missing_field",
            Error::NavigationError { .. } => "navigation_error",
            Error::ElementWaitTimeout { .. } => "element_wait_timeout",
            Error::SearchBackendError(_) => "search_backend_error",
            Error::SearchUnavailable(_) => "search_unavailable",
            Error::EmptyInput => "empty_input",
            Error::ModelUnavailable(_) => "model_unavailable",
            Error::Config(_) => "config_error",
            Error::Session(_) => "session_error",
            Error::Io(_) => "io_error",
            Error::Json(_) => "json_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
