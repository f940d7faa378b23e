use thiserror::Error;

/// Errors surfaced at the scheduling API boundary.
///
/// `InvalidInput` covers everything wrong with the request itself (missing
/// fields, malformed clock or date strings, negative numerics); the model is
/// never built in that case. `Internal` covers unexpected faults during
/// modeling or solving.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal error: {0}")]
    Internal(String),
}
