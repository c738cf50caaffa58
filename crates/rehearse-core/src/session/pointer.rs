//! Durable session pointer trait.

use async_trait::async_trait;

use crate::error::Result;

/// A client-persisted pointer to "the current session id".
///
/// The pointer exists purely to resume a session after a reload; it is
/// never treated as authoritative. The store clears it when a pointed-to
/// session can no longer be fetched, so a stale pointer cannot wedge
/// rehydration.
///
/// Constructor-injected into the store so tests can substitute an
/// in-memory implementation.
#[async_trait]
pub trait SessionPointer: Send + Sync {
    /// Returns the stored session id, if any.
    async fn get(&self) -> Option<String>;

    /// Stores a session id, replacing any previous value.
    async fn set(&self, session_id: &str) -> Result<()>;

    /// Removes the stored session id.
    async fn clear(&self) -> Result<()>;
}
