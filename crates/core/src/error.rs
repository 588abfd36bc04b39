use thiserror::Error;

/// Top-level error type for the Cadence system.
#[derive(Debug, Error)]
pub enum CadenceError {
    #[error("state error: {0}")]
    State(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("engine error: {0}")]
    Engine(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{0}")]
    Other(String),
}
