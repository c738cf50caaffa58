//! Derives the one canonical UI screen from a persisted session.
//!
//! The persistence layer only tracks a small status enum; finer-grained UI
//! state (awaiting evaluation vs. reviewing feedback) is reconstructed from
//! the current question's answer sub-record. [`select_now`] is pure and
//! total: it never panics and is deterministic for a given session value.

use serde::{Deserialize, Serialize};

use crate::session::{Session, SessionStatus};

/// A derived, closed-set UI mode. Computed, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    /// Error surface. Also doubles as the placeholder while no session is
    /// loaded; check [`NowState::is_loaded`] to tell the two apart.
    Error,
    /// Initials capture gate shown before anything else
    Initials,
    /// Pre-start landing page
    Landing,
    /// Post-completion summary
    Summary,
    /// Feedback for the current question's evaluated answer
    ReviewFeedback,
    /// Submitted, waiting for analysis to come back
    PendingEvaluation,
    /// The candidate is answering the current question
    ActiveQuestion,
}

/// Ephemeral view of the session for rendering. Recomputed on every render,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NowState {
    /// False while no session has been loaded into the store
    pub is_loaded: bool,
    pub status: SessionStatus,
    pub screen: Screen,
    pub requires_initials: bool,
    /// Whether the start action is currently meaningful
    pub can_start: bool,
    pub is_complete: bool,
    pub current_question_id: Option<String>,
    pub current_question_index: usize,
    pub total_questions: usize,
}

impl NowState {
    fn not_loaded() -> Self {
        NowState {
            is_loaded: false,
            status: SessionStatus::NotStarted,
            screen: Screen::Error,
            requires_initials: false,
            can_start: false,
            is_complete: false,
            current_question_id: None,
            current_question_index: 0,
            total_questions: 0,
        }
    }
}

/// Computes the current [`NowState`] for a session.
///
/// Screen derivation is a strict priority ladder; the first rule that
/// matches wins:
///
/// 1. status `Error` -> `Error`
/// 2. initials required -> `Initials`
/// 3. status `NotStarted` -> `Landing`
/// 4. status `Completed` -> `Summary`
/// 5. otherwise, inspect the current question's answer:
///    a. answer has analysis -> `ReviewFeedback`
///    b. status `AwaitingEvaluation` -> `PendingEvaluation`
///    c. answer submitted but not yet analyzed -> `PendingEvaluation`
///       (covers persisted-status lag behind the true UI state)
///    d. status `Reviewing` -> `ReviewFeedback`
///    e. default -> `ActiveQuestion`
pub fn select_now(session: Option<&Session>) -> NowState {
    let Some(session) = session else {
        return NowState::not_loaded();
    };

    let screen = derive_screen(session);

    NowState {
        is_loaded: true,
        status: session.status,
        screen,
        requires_initials: session.initials_required,
        can_start: session.status == SessionStatus::NotStarted && !session.initials_required,
        is_complete: session.status == SessionStatus::Completed,
        current_question_id: session.current_question().map(|q| q.id.clone()),
        current_question_index: session.current_question_index,
        total_questions: session.questions.len(),
    }
}

fn derive_screen(session: &Session) -> Screen {
    if session.status == SessionStatus::Error {
        return Screen::Error;
    }
    if session.initials_required {
        return Screen::Initials;
    }
    match session.status {
        SessionStatus::NotStarted => return Screen::Landing,
        SessionStatus::Completed => return Screen::Summary,
        _ => {}
    }

    // In-session: the answer sub-record refines the coarse persisted status.
    let answer = session.current_answer();
    if answer.is_some_and(|a| a.analysis.is_some()) {
        return Screen::ReviewFeedback;
    }
    if session.status == SessionStatus::AwaitingEvaluation {
        return Screen::PendingEvaluation;
    }
    if answer.is_some_and(|a| a.is_submitted()) {
        return Screen::PendingEvaluation;
    }
    if session.status == SessionStatus::Reviewing {
        return Screen::ReviewFeedback;
    }
    Screen::ActiveQuestion
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Answer, Question};
    use chrono::Utc;
    use std::collections::HashMap;

    fn question(id: &str, index: usize) -> Question {
        Question {
            id: id.to_string(),
            text: "q".to_string(),
            category: String::new(),
            framework: String::new(),
            competency_id: None,
            difficulty: None,
            index,
        }
    }

    fn session(status: SessionStatus) -> Session {
        Session {
            id: "s-1".to_string(),
            status,
            role: "PM".to_string(),
            job_description: None,
            questions: vec![question("q0", 0), question("q1", 1)],
            current_question_index: 0,
            answers: HashMap::new(),
            initials_required: false,
            entered_initials: None,
            coaching_preference: None,
            candidate: Default::default(),
            engaged_time_seconds: 0,
            intake: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn with_answer(mut s: Session, submitted: bool, analyzed: bool) -> Session {
        s.answers.insert(
            "q0".to_string(),
            Answer {
                question_id: "q0".to_string(),
                transcript: "answer".to_string(),
                submitted_at: submitted.then(Utc::now),
                analysis: analyzed.then(|| serde_json::json!({"score": 4})),
                ..Answer::default()
            },
        );
        s
    }

    #[test]
    fn absent_session_yields_not_loaded_placeholder() {
        let state = select_now(None);
        assert!(!state.is_loaded);
        assert_eq!(state.screen, Screen::Error);
        assert_eq!(state.total_questions, 0);
    }

    #[test]
    fn error_status_wins_over_everything() {
        let mut s = session(SessionStatus::Error);
        s.initials_required = true;
        assert_eq!(select_now(Some(&s)).screen, Screen::Error);
    }

    #[test]
    fn initials_gate_precedes_landing() {
        let mut s = session(SessionStatus::NotStarted);
        s.initials_required = true;
        let state = select_now(Some(&s));
        assert_eq!(state.screen, Screen::Initials);
        assert!(!state.can_start);
    }

    #[test]
    fn not_started_yields_landing() {
        let state = select_now(Some(&session(SessionStatus::NotStarted)));
        assert_eq!(state.screen, Screen::Landing);
        assert!(state.can_start);
    }

    #[test]
    fn completed_yields_summary() {
        let state = select_now(Some(&session(SessionStatus::Completed)));
        assert_eq!(state.screen, Screen::Summary);
        assert!(state.is_complete);
    }

    #[test]
    fn in_session_without_answer_is_active_question() {
        let state = select_now(Some(&session(SessionStatus::InSession)));
        assert_eq!(state.screen, Screen::ActiveQuestion);
        assert_eq!(state.current_question_id.as_deref(), Some("q0"));
    }

    #[test]
    fn analyzed_answer_yields_review_feedback() {
        let s = with_answer(session(SessionStatus::InSession), true, true);
        assert_eq!(select_now(Some(&s)).screen, Screen::ReviewFeedback);
    }

    #[test]
    fn analysis_beats_awaiting_evaluation_status() {
        // The collaborator may attach analysis before its status catches up.
        let s = with_answer(session(SessionStatus::AwaitingEvaluation), true, true);
        assert_eq!(select_now(Some(&s)).screen, Screen::ReviewFeedback);
    }

    #[test]
    fn awaiting_evaluation_yields_pending() {
        let s = with_answer(session(SessionStatus::AwaitingEvaluation), true, false);
        assert_eq!(select_now(Some(&s)).screen, Screen::PendingEvaluation);
    }

    #[test]
    fn submitted_answer_yields_pending_despite_stale_status() {
        // Persisted status lags: still InSession but the answer is submitted.
        let s = with_answer(session(SessionStatus::InSession), true, false);
        assert_eq!(select_now(Some(&s)).screen, Screen::PendingEvaluation);
    }

    #[test]
    fn reviewing_status_yields_review_feedback() {
        let s = session(SessionStatus::Reviewing);
        assert_eq!(select_now(Some(&s)).screen, Screen::ReviewFeedback);
    }

    #[test]
    fn retried_answer_returns_to_active_question() {
        // submitted_at cleared by a retry: the answer no longer pins the screen
        let s = with_answer(session(SessionStatus::InSession), false, false);
        assert_eq!(select_now(Some(&s)).screen, Screen::ActiveQuestion);
    }

    #[test]
    fn selector_is_deterministic() {
        let s = with_answer(session(SessionStatus::AwaitingEvaluation), true, false);
        assert_eq!(select_now(Some(&s)), select_now(Some(&s)));
    }

    #[test]
    fn index_past_the_end_never_panics() {
        let mut s = session(SessionStatus::InSession);
        s.current_question_index = 2;
        let state = select_now(Some(&s));
        assert_eq!(state.screen, Screen::ActiveQuestion);
        assert!(state.current_question_id.is_none());
    }
}
