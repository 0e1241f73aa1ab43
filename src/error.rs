//! Error type for populating entry references.

use crate::pair::Lifecycle;
use thiserror::Error;

/// Errors returned when a `PairEntryReference` cannot be populated.
///
/// Collection of a soft or weak referent is never an error; readers observe
/// it as an empty `get`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceError {
    /// A populated slot requires a concrete referent.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The pair has left the table and cannot be repopulated.
    #[error("pair is {state} and cannot be repopulated")]
    Inactive { state: Lifecycle },
}

pub type Result<T> = std::result::Result<T, ReferenceError>;
