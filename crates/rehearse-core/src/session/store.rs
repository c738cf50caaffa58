//! Session store: the optimistic sync engine.
//!
//! `SessionStore` is the single owner of the in-memory session replica.
//! Every action follows the same shape:
//!
//! 1. optional precondition check
//! 2. synchronous optimistic local mutation
//! 3. asynchronous call to the persistence collaborator
//! 4. reconciliation: on success the local session is replaced wholesale
//!    with the collaborator's response; on failure the optimistic state is
//!    retained and the error is logged
//!
//! The store never surfaces expected failures to the caller. The resulting
//! behavior is "stay usable but possibly stale" rather than blocking the
//! UI on server truth.
//!
//! # Ordering
//!
//! Within one action the local mutation strictly precedes the network call.
//! Across actions there is no ordering guarantee: two responses can arrive
//! out of order. Each request carries a monotonically increasing sequence
//! number, and a response older than the last one applied is discarded
//! instead of clobbering newer state. The only other mutual-exclusion
//! mechanism is the in-flight latch guarding [`SessionStore::submit`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::selector::{select_now, NowState};
use crate::session::model::{RetryContext, RetryTrigger, Session, SessionStatus};
use crate::session::patch::{AnswersPatch, MetadataPatch, SessionPatch};
use crate::session::pointer::SessionPointer;
use crate::session::repository::SessionRepository;

const TARGET: &str = "session_store";

struct Inner {
    session: Option<Session>,
    /// Sequence number of the newest reconciled response.
    applied_seq: u64,
}

/// Owns the canonical in-memory session replica and exposes the action
/// vocabulary the UI drives it with.
///
/// Exactly one store instance owns the session per mount. Collaborators are
/// constructor-injected; tests substitute in-memory implementations.
pub struct SessionStore {
    inner: RwLock<Inner>,
    repository: Arc<dyn SessionRepository>,
    pointer: Arc<dyn SessionPointer>,
    /// Latch preventing concurrent submissions.
    submit_in_flight: AtomicBool,
    /// Issues request sequence numbers in call order.
    issued_seq: AtomicU64,
}

impl SessionStore {
    pub fn new(repository: Arc<dyn SessionRepository>, pointer: Arc<dyn SessionPointer>) -> Self {
        SessionStore {
            inner: RwLock::new(Inner {
                session: None,
                applied_seq: 0,
            }),
            repository,
            pointer,
            submit_in_flight: AtomicBool::new(false),
            issued_seq: AtomicU64::new(0),
        }
    }

    /// Returns a clone of the current session replica, if loaded.
    pub async fn current_session(&self) -> Option<Session> {
        self.inner.read().await.session.clone()
    }

    /// Computes the derived [`NowState`] for the current replica.
    pub async fn now_state(&self) -> NowState {
        select_now(self.inner.read().await.session.as_ref())
    }

    /// Creates a new session via the collaborator and stores a durable
    /// pointer to its id.
    ///
    /// On failure nothing is exposed; the store stays empty.
    pub async fn init(&self, role: &str) {
        let seq = self.next_seq();
        match self.repository.create(role).await {
            Ok(session) => {
                if let Err(e) = self.pointer.set(&session.id).await {
                    tracing::warn!(target: TARGET, "Failed to store session pointer: {e}");
                }
                self.reconcile(seq, session).await;
            }
            Err(e) => {
                tracing::warn!(target: TARGET, "Session creation failed: {e}");
            }
        }
    }

    /// Loads a session into the store at mount time.
    ///
    /// An explicitly supplied id takes precedence over the stored pointer.
    /// On fetch failure the pointer is cleared only when it was the source
    /// of the id: explicit ids are retried on the next mount, not
    /// discarded.
    pub async fn hydrate(&self, explicit_id: Option<&str>) {
        let from_pointer = explicit_id.is_none();
        let target = match explicit_id {
            Some(id) => Some(id.to_string()),
            None => self.pointer.get().await,
        };
        let Some(target) = target else {
            tracing::debug!(target: TARGET, "No session to rehydrate");
            return;
        };

        let seq = self.next_seq();
        match self.repository.find_by_id(&target).await {
            Ok(Some(session)) => {
                self.reconcile(seq, session).await;
            }
            Ok(None) => {
                tracing::warn!(target: TARGET, "Session '{target}' not found");
                if from_pointer {
                    self.clear_pointer().await;
                }
            }
            Err(e) => {
                tracing::warn!(target: TARGET, "Failed to fetch session '{target}': {e}");
                if from_pointer {
                    self.clear_pointer().await;
                }
            }
        }
    }

    /// Moves the session out of the landing page.
    pub async fn start(&self) {
        let patch = SessionPatch::Metadata(MetadataPatch {
            status: Some(SessionStatus::InSession),
            ..MetadataPatch::default()
        });
        self.mutate_and_persist(vec![patch]).await;
    }

    /// Records the candidate's initials and drops the initials gate.
    pub async fn submit_initials(&self, initials: &str) {
        let patch = SessionPatch::Metadata(MetadataPatch {
            entered_initials: Some(initials.to_string()),
            initials_required: Some(false),
            ..MetadataPatch::default()
        });
        self.mutate_and_persist(vec![patch]).await;
    }

    /// Saves in-progress draft text for the current question.
    ///
    /// Uses the dedicated lightweight endpoint; submission state is
    /// untouched and no reconciliation happens.
    pub async fn save_draft(&self, text: &str) {
        let Some((session_id, question_id)) = self.current_target().await else {
            tracing::warn!(target: TARGET, "save_draft with no current question, ignoring");
            return;
        };

        self.apply_optimistic(&[SessionPatch::Answers(AnswersPatch::SetDraft {
            question_id: question_id.clone(),
            draft: text.to_string(),
        })])
        .await;

        if let Err(e) = self
            .repository
            .save_draft(&session_id, &question_id, text)
            .await
        {
            tracing::warn!(target: TARGET, "Draft save failed, keeping local draft: {e}");
        }
    }

    /// Submits the current question's answer for evaluation.
    ///
    /// Guarded by an in-flight latch: a second call while one is pending is
    /// a silent no-op. The latch is released whatever the outcome.
    pub async fn submit(&self, answer_text: &str) {
        if self.submit_in_flight.swap(true, Ordering::SeqCst) {
            tracing::debug!(target: TARGET, "Submission already in flight, ignoring");
            return;
        }
        self.submit_inner(answer_text).await;
        self.submit_in_flight.store(false, Ordering::SeqCst);
    }

    async fn submit_inner(&self, answer_text: &str) {
        let Some((session_id, question_id)) = self.current_target().await else {
            tracing::warn!(target: TARGET, "submit with no current question, ignoring");
            return;
        };

        self.apply_optimistic(&[
            SessionPatch::Metadata(MetadataPatch {
                status: Some(SessionStatus::AwaitingEvaluation),
                ..MetadataPatch::default()
            }),
            SessionPatch::Answers(AnswersPatch::RecordSubmission {
                question_id: question_id.clone(),
                transcript: answer_text.to_string(),
                submitted_at: Utc::now(),
            }),
        ])
        .await;

        let seq = self.next_seq();
        match self
            .repository
            .submit_answer(&session_id, &question_id, answer_text)
            .await
        {
            // The collaborator may have computed analysis synchronously,
            // advancing the selector straight to review feedback.
            Ok(session) => self.reconcile(seq, session).await,
            Err(e) => {
                tracing::warn!(target: TARGET, "Submission failed, keeping optimistic state: {e}");
            }
        }
    }

    /// Triggers or polls evaluation of the current question.
    ///
    /// Idempotent; safe to call on a fixed interval while awaiting
    /// evaluation.
    pub async fn analyze_current_question(&self) {
        let Some((session_id, question_id)) = self.current_target().await else {
            tracing::debug!(target: TARGET, "analyze with no current question, ignoring");
            return;
        };

        let seq = self.next_seq();
        match self
            .repository
            .request_analysis(&session_id, &question_id)
            .await
        {
            Ok(session) => self.reconcile(seq, session).await,
            Err(e) => {
                tracing::warn!(target: TARGET, "Analysis request failed: {e}");
            }
        }
    }

    /// Reopens the current question for another attempt.
    ///
    /// Clears the submission timestamp and analysis while keeping the
    /// transcript and draft, and forces the session back in-session.
    /// Idempotent: retrying an already-retried question is a no-op on the
    /// answer fields.
    pub async fn retry(&self, trigger: RetryTrigger, reason: Option<String>) {
        let Some((session_id, question_id)) = self.current_target().await else {
            tracing::warn!(target: TARGET, "retry with no current question, ignoring");
            return;
        };
        let context = RetryContext { trigger, reason };

        self.apply_optimistic(&[
            SessionPatch::Answers(AnswersPatch::ClearEvaluation {
                question_id: question_id.clone(),
                retry_context: context.clone(),
            }),
            SessionPatch::Metadata(MetadataPatch {
                status: Some(SessionStatus::InSession),
                ..MetadataPatch::default()
            }),
        ])
        .await;

        let seq = self.next_seq();
        match self
            .repository
            .retry_question(&session_id, &question_id, &context)
            .await
        {
            Ok(session) => self.reconcile(seq, session).await,
            Err(e) => {
                tracing::warn!(target: TARGET, "Retry failed, keeping optimistic state: {e}");
            }
        }
    }

    /// Advances to the next question, or completes the session when the
    /// current question was the last one. Status and index are persisted
    /// atomically in one patch.
    pub async fn next(&self) {
        let Some(session) = self.current_session().await else {
            tracing::warn!(target: TARGET, "next with no session, ignoring");
            return;
        };

        let next_index = session.current_question_index + 1;
        let status = if next_index >= session.questions.len() {
            SessionStatus::Completed
        } else {
            SessionStatus::InSession
        };
        let patch = SessionPatch::Metadata(MetadataPatch {
            status: Some(status),
            current_question_index: Some(next_index.min(session.questions.len())),
            ..MetadataPatch::default()
        });
        self.mutate_and_persist(vec![patch]).await;
    }

    /// Jumps to a previously answered question.
    ///
    /// Navigation is limited to the first unanswered question (monotonic
    /// progress); once the final question has a submitted answer, the full
    /// range up to the last index opens. The escape hatch overrides the
    /// first-unanswered rule even when earlier questions have gaps.
    /// An out-of-range index is rejected with a warning, never an error.
    pub async fn go_to_question(&self, index: usize) {
        let Some(session) = self.current_session().await else {
            tracing::warn!(target: TARGET, "go_to_question with no session, ignoring");
            return;
        };
        if session.questions.is_empty() {
            tracing::warn!(target: TARGET, "go_to_question with no questions, ignoring");
            return;
        }

        let max_allowed = if session.is_last_question_answered() {
            session.questions.len() - 1
        } else {
            session.first_unanswered_index()
        };
        if index > max_allowed {
            tracing::warn!(
                target: TARGET,
                "go_to_question({index}) beyond allowed progress (max {max_allowed}), ignoring"
            );
            return;
        }

        let patch = SessionPatch::Metadata(MetadataPatch {
            status: Some(SessionStatus::InSession),
            current_question_index: Some(index),
            ..MetadataPatch::default()
        });
        self.mutate_and_persist(vec![patch]).await;
    }

    /// Generic optimistic mutation + persist for cross-cutting fields.
    pub async fn update_session(&self, patches: Vec<SessionPatch>) {
        self.mutate_and_persist(patches).await;
    }

    /// Folds an engagement delta into the session's engaged-seconds total.
    ///
    /// This is the target of the engagement tracker's flush callback. Delta
    /// semantics keep the tracker's cadence independent of save cycles.
    pub async fn record_engagement(&self, delta_seconds: u64) {
        if delta_seconds == 0 {
            return;
        }
        let Some(session) = self.current_session().await else {
            tracing::debug!(target: TARGET, "Engagement delta with no session, dropping");
            return;
        };
        let patch = SessionPatch::Metadata(MetadataPatch {
            engaged_time_seconds: Some(session.engaged_time_seconds + delta_seconds),
            ..MetadataPatch::default()
        });
        self.mutate_and_persist(vec![patch]).await;
    }

    /// Clears all answers and rewinds to the first question.
    ///
    /// The collaborator's reset is acknowledgement-only, so the optimistic
    /// cleared state stands as-is.
    pub async fn reset(&self) {
        let Some(session) = self.current_session().await else {
            tracing::warn!(target: TARGET, "reset with no session, ignoring");
            return;
        };

        self.apply_optimistic(&[
            SessionPatch::Answers(AnswersPatch::ClearAll),
            SessionPatch::Metadata(MetadataPatch {
                status: Some(SessionStatus::InSession),
                current_question_index: Some(0),
                ..MetadataPatch::default()
            }),
        ])
        .await;

        if let Err(e) = self.repository.reset(&session.id).await {
            tracing::warn!(target: TARGET, "Reset failed, keeping optimistic state: {e}");
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn next_seq(&self) -> u64 {
        self.issued_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Applies patches locally, then persists them through the PATCH
    /// endpoint and reconciles the response.
    async fn mutate_and_persist(&self, patches: Vec<SessionPatch>) {
        let Some(session_id) = self.session_id().await else {
            tracing::warn!(target: TARGET, "Action with no session, ignoring");
            return;
        };

        if !self.apply_optimistic(&patches).await {
            return;
        }

        let seq = self.next_seq();
        match self.repository.update(&session_id, &patches).await {
            Ok(session) => self.reconcile(seq, session).await,
            Err(e) => {
                tracing::warn!(target: TARGET, "Update failed, keeping optimistic state: {e}");
            }
        }
    }

    /// Applies patches to the local replica. Validation failures are
    /// logged and abort the whole batch.
    async fn apply_optimistic(&self, patches: &[SessionPatch]) -> bool {
        let mut inner = self.inner.write().await;
        let Some(session) = inner.session.as_mut() else {
            tracing::warn!(target: TARGET, "Optimistic mutation with no session, ignoring");
            return false;
        };

        // Validate against a scratch copy so a mid-batch failure leaves the
        // replica untouched.
        let mut scratch = session.clone();
        for patch in patches {
            if let Err(e) = scratch.apply_patch(patch) {
                tracing::warn!(target: TARGET, "Rejected local mutation: {e}");
                return false;
            }
        }
        *session = scratch;
        true
    }

    /// Replaces the replica with a collaborator response unless a newer
    /// response has already been applied.
    async fn reconcile(&self, seq: u64, session: Session) {
        let mut inner = self.inner.write().await;
        if seq < inner.applied_seq {
            tracing::debug!(
                target: TARGET,
                "Discarding stale response (seq {seq} < {})",
                inner.applied_seq
            );
            return;
        }
        inner.applied_seq = seq;
        inner.session = Some(session);
    }

    async fn session_id(&self) -> Option<String> {
        self.inner
            .read()
            .await
            .session
            .as_ref()
            .map(|s| s.id.clone())
    }

    /// Resolves (session id, current question id) for answer-scoped actions.
    async fn current_target(&self) -> Option<(String, String)> {
        let inner = self.inner.read().await;
        let session = inner.session.as_ref()?;
        let question = session.current_question()?;
        Some((session.id.clone(), question.id.clone()))
    }

    async fn clear_pointer(&self) {
        if let Err(e) = self.pointer.clear().await {
            tracing::warn!(target: TARGET, "Failed to clear session pointer: {e}");
        }
    }
}
