use thiserror::Error;

/// Errors reported by [`RbMap`](crate::RbMap) operations.
///
/// Every failure leaves the map unmodified.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    /// The key is already present; insertion never overwrites.
    #[error("key is already present in the tree")]
    DuplicateKey,

    /// The key is not present.
    #[error("key is not present in the tree")]
    MissingKey,
}
