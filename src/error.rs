use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApnexusError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A threshold is missing or inconsistent. This is a deployment problem,
    /// so it is the one evaluator condition surfaced to the caller.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown vehicle: {0}")]
    UnknownVehicle(String),

    #[error("Unknown transaction: {0}")]
    UnknownTransaction(i64),

    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ApnexusError>;
