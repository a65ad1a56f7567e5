use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the pipeline's precondition errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal preconditions. Anything in here stops the run before any pack is touched.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// No generation API key in the environment or `.env`.
    #[error("OPENAI_API_KEY missing (set it in the environment or in .env)")]
    MissingApiKey,

    #[error("CSV not found: {path}")]
    MissingCsv { path: PathBuf },

    #[error("CSV is empty: {path}")]
    EmptyCsv { path: PathBuf },

    #[error("CSV has no product column (headers found: {headers:?})")]
    MissingProductColumn { headers: Vec<String> },

    #[error("Guide file not found: {path}")]
    MissingGuide { path: PathBuf },

    #[error("Packs root not found: {path}")]
    MissingPacksRoot { path: PathBuf },

    #[error("No packs found in {path}")]
    NoPacks { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Config { message: String },

    #[error("IO error accessing '{path}': {message}")]
    Io { path: PathBuf, message: String },

    #[error("CSV error in '{path}': {message}")]
    Csv { path: PathBuf, message: String },
}

impl Error {
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: source.to_string(),
        }
    }

    #[must_use]
    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            message: source.to_string(),
        }
    }

    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
