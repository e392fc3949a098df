use thiserror::Error;

// Internal failure taxonomy. Nothing here escapes the public grading entry
// point: `verdict::grade` converts any of these into a score-0 verdict.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A configuration layer (dataset config, per-record override) did not
    /// deserialize into the expected shape.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The expected/actual payload was not a proposal object or an array of
    /// proposal objects.
    #[error("invalid input: {0}")]
    Input(String),
}

// Type alias for results that use `EngineError` as the error type
pub type Result<T> = std::result::Result<T, EngineError>;
