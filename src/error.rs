use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("Invalid month '{0}': expected YYYY-MM or YYYY-MM-DD")]
    InvalidMonth(String),

    #[error("Invalid forecast horizon {0}: must be at least 1")]
    InvalidHorizon(usize),

    #[error("Unknown forecast method: {0}")]
    UnknownMethod(String),

    #[error("Plan has no lines to save")]
    EmptyPlan,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Data source error: {0}")]
    DataSource(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PlannerError>;
