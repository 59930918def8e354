use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading bibliographies, talking to a model backend,
/// interpreting its reply or persisting analysis records.
#[derive(Error, Debug)]
pub enum SabimError {
    #[error("No such file: {0:?}")]
    NotFound(PathBuf),

    #[error("Error parsing BibTeX file: {0}")]
    Parse(String),

    #[error("Unsupported input format {0:?}: only BibTeX (.bib) and JSON record files are supported")]
    UnsupportedFormat(PathBuf),

    #[error("Invalid record collection: {0}")]
    InvalidInput(String),

    #[error("Unsupported model '{0}': model names must start with 'llama' or 'gemini'")]
    UnsupportedModel(String),

    #[error("Error decoding JSON from AI response: {0}")]
    MalformedResponse(String),

    #[error("No JSON found in AI response")]
    NoStructuredData,

    #[error("Model backend returned status {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl SabimError {
    /// Errors the enrichment loop records against a single article and moves past.
    pub fn is_interpretation_failure(&self) -> bool {
        matches!(self, SabimError::MalformedResponse(_) | SabimError::NoStructuredData)
    }
}

pub type Result<T> = std::result::Result<T, SabimError>;
