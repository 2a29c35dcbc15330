use thiserror::Error;

/// Errors returned synchronously by engine operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A strategy with this id is already registered.
    #[error("strategy already exists: {0}")]
    DuplicateId(String),

    /// No strategy with this id is registered.
    #[error("strategy not found: {0}")]
    NotFound(String),

    /// Strategy parameters are inconsistent.
    #[error("invalid strategy {id}: {reason}")]
    InvalidStrategy {
        /// Offending strategy id.
        id: String,
        /// What is wrong with it.
        reason: String,
    },

    /// `start` was called on a running engine.
    #[error("engine is already running")]
    AlreadyRunning,

    /// `stop` was called on an engine that is not running.
    #[error("engine is not running")]
    NotRunning,
}

impl EngineError {
    pub(crate) fn invalid(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidStrategy {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
