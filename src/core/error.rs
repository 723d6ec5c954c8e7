use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("No active session: {0}. Start a new query.")]
    NotFound(String),

    #[error("No more results: page {page} is out of range for session {session_id}")]
    PageOutOfRange { session_id: String, page: usize },
}

#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Model returned an empty completion")]
    EmptyCompletion,

    #[error("Missing API key: {0}")]
    MissingApiKey(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Rejected query: {0}")]
    RejectedQuery(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}
