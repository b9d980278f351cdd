use thiserror::Error;

/// Errors surfaced by [`crate::domain::MirrorStore`] mutations.
///
/// Missing ids are not errors: updates and deletes of an unknown id are
/// reported as `Ok(None)` / `Ok(false)`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The collection could not be written; in-memory state is unchanged and
    /// the call can be retried.
    #[error("could not save your changes: {0:#}")]
    Storage(#[from] anyhow::Error),

    #[error("savings balance cannot go below zero (current {current:.2}, change {delta:.2})")]
    NegativeSavingsBalance { current: f64, delta: f64 },

    /// The stored collection failed to load, so writing would replace data
    /// this session never saw. Cleared once `reload` reads it.
    #[error("{collection} could not be read; reload before making changes")]
    UnreadableCollection { collection: &'static str },
}
