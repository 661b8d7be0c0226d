//! Typed error taxonomy for the marketplace core.
//!
//! Validation and state-machine failures are expected, user-facing outcomes
//! and travel as values; only storage failures represent something actually
//! going wrong underneath.

/// A defect in one submitted inventory row.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("row {row}: required field {field} is missing or empty")]
    MissingRequired { row: usize, field: &'static str },
    #[error("row {row}: {field} must be a positive number (got {value})")]
    NonPositive {
        row: usize,
        field: &'static str,
        value: String,
    },
    #[error("row {row}: duplicate stock id {stock_id} in batch")]
    DuplicateStockId { row: usize, stock_id: String },
}

/// Outcome of a rejected shard upload. The whole batch is refused; every
/// row error is reported back to the uploader.
#[derive(thiserror::Error, Debug)]
pub enum UploadError {
    #[error("shard upload rejected with {} row error(s)", .0.len())]
    Rejected(Vec<ValidationError>),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures surfaced by deal lifecycle operations.
#[derive(thiserror::Error, Debug)]
pub enum DealError {
    #[error("stone {0} is locked or no longer available")]
    StoneUnavailable(String),
    #[error("deal {0} not found")]
    DealNotFound(String),
    #[error("{caller} does not own deal {deal_id}")]
    NotOwner { deal_id: String, caller: String },
    #[error("{0} is not an approved admin")]
    Unauthorized(String),
    #[error("deal {0} is already final")]
    AlreadyFinal(String),
    #[error("deal {deal_id}: {reason}")]
    InvalidPrecondition { deal_id: String, reason: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Backing-store failures. `Unavailable` is the one retry-worthy class and
/// is always surfaced to the caller; `Corrupt` means a stored object failed
/// to decode and must never be fed back into the combined view.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(#[from] sled::Error),
    #[error("corrupt record at {key}: {reason}")]
    Corrupt { key: String, reason: String },
}
