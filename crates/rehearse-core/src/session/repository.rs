//! Session repository trait.
//!
//! Defines the interface the sync engine consumes from the persistence
//! collaborator. The collaborator owns the authoritative record; every
//! session-returning call yields its full, current view of the session,
//! which the store swaps in wholesale during reconciliation.

use async_trait::async_trait;

use crate::error::Result;
use crate::session::model::{RetryContext, Session};
use crate::session::patch::SessionPatch;

/// An abstract repository for session persistence.
///
/// Implementations are request/response adapters (HTTP in production,
/// in-memory mocks in tests). They are not expected to retry or enforce
/// timeouts; failures surface as errors and the caller decides what to
/// keep.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Creates a new session for the given role.
    ///
    /// # Returns
    ///
    /// The collaborator-assigned session, status `NotStarted`.
    async fn create(&self, role: &str) -> Result<Session>;

    /// Finds a session by its ID.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Session))`: session found
    /// - `Ok(None)`: session not found
    /// - `Err(_)`: retrieval failed
    async fn find_by_id(&self, session_id: &str) -> Result<Option<Session>>;

    /// Applies a batch of patches to the persisted session.
    ///
    /// All patches in one call are applied atomically by the collaborator.
    ///
    /// # Returns
    ///
    /// The updated session.
    async fn update(&self, session_id: &str, patches: &[SessionPatch]) -> Result<Session>;

    /// Persists in-progress draft text for one question.
    ///
    /// Dedicated lightweight endpoint; does not touch submission state and
    /// returns no session body.
    async fn save_draft(&self, session_id: &str, question_id: &str, draft: &str) -> Result<()>;

    /// Submits a final answer for evaluation.
    ///
    /// # Returns
    ///
    /// The updated session. The collaborator may have computed analysis
    /// synchronously, in which case it is already attached.
    async fn submit_answer(
        &self,
        session_id: &str,
        question_id: &str,
        text: &str,
    ) -> Result<Session>;

    /// Triggers (or polls) evaluation of one question. Idempotent.
    ///
    /// # Returns
    ///
    /// The updated session.
    async fn request_analysis(&self, session_id: &str, question_id: &str) -> Result<Session>;

    /// Reopens a question for another attempt.
    ///
    /// # Returns
    ///
    /// The updated session.
    async fn retry_question(
        &self,
        session_id: &str,
        question_id: &str,
        context: &RetryContext,
    ) -> Result<Session>;

    /// Clears all answers and rewinds the session to its first question.
    ///
    /// Acknowledgement-only; the collaborator returns no session body.
    async fn reset(&self, session_id: &str) -> Result<()>;
}
