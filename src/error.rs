//! Error types for ABI loading and registration

use thiserror::Error;

/// Errors surfaced by `AbiInfo` construction and repository registration.
///
/// Lookup misses are not errors: every query on the repository returns an
/// `Option` or an empty `Vec` instead, so decoding loops over arbitrary
/// on-chain data never pay an error-handling cost for unknown selectors.
#[derive(Debug, Error)]
pub enum AbiError {
    /// A factory was handed an empty required source.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The ABI JSON document could not be parsed.
    #[error("failed to parse ABI JSON: {source}")]
    MalformedAbi {
        #[from]
        source: serde_json::Error,
    },
}
