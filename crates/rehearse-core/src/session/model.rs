//! Session domain model.
//!
//! This module contains the core `Session` entity that represents one
//! candidate's practice run, along with its question and answer sub-records.
//!
//! The persisted record is deliberately coarse: the collaborator only stores
//! a small [`SessionStatus`] enum. Finer-grained UI state (awaiting
//! evaluation vs. reviewing feedback) is reconstructed from the [`Answer`]
//! sub-records by the selector, so the collaborator never needs to store
//! transient states.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Coarse persisted lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    NotStarted,
    InSession,
    AwaitingEvaluation,
    Reviewing,
    Completed,
    Error,
}

/// One interview question, stable 0-based ordering via `index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Unique question identifier
    pub id: String,
    /// The question text shown to the candidate
    pub text: String,
    /// Question category (e.g. "behavioral", "technical")
    #[serde(default)]
    pub category: String,
    /// Suggested answering framework (e.g. "STAR")
    #[serde(default)]
    pub framework: String,
    /// Competency this question probes
    #[serde(default)]
    pub competency_id: Option<String>,
    /// Difficulty label
    #[serde(default)]
    pub difficulty: Option<String>,
    /// Stable 0-based position within the session
    pub index: usize,
}

/// Who triggered a retry of an already-evaluated question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryTrigger {
    Candidate,
    Coach,
    System,
}

/// Context recorded when a question is reopened for another attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryContext {
    pub trigger: RetryTrigger,
    #[serde(default)]
    pub reason: Option<String>,
}

/// A candidate's answer to one question.
///
/// `draft` holds in-progress text and is cleared on submission. `analysis`
/// is an opaque result blob attached by the evaluation collaborator; it is
/// absent until the answer has been evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Answer {
    pub question_id: String,
    /// Final transcript text
    #[serde(default)]
    pub transcript: String,
    /// In-progress draft text
    #[serde(default)]
    pub draft: String,
    /// Set when the answer was submitted; absent for unanswered questions
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    /// Opaque evaluation result, absent until evaluated
    #[serde(default)]
    pub analysis: Option<serde_json::Value>,
    /// Present if this question was reopened for a retry
    #[serde(default)]
    pub retry_context: Option<RetryContext>,
}

impl Answer {
    /// Returns true once the answer has been submitted and not yet retried.
    pub fn is_submitted(&self) -> bool {
        self.submitted_at.is_some()
    }
}

/// Candidate identity attached to the session by the invite collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Candidate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Canonical persisted record of one candidate's practice run.
///
/// Created by the external invite/init collaborator, loaded into the
/// [`SessionStore`](crate::session::SessionStore) at mount, and mutated
/// exclusively through the store's action set. Never deleted by this core.
///
/// Invariants:
/// - `answers` keys are a subset of question ids
/// - `0 <= current_question_index <= questions.len()`
/// - `engaged_time_seconds` is monotonically non-decreasing client-side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier (collaborator-assigned)
    pub id: String,
    /// Coarse persisted lifecycle status
    pub status: SessionStatus,
    /// Role the candidate is practicing for
    pub role: String,
    /// Job description the questions were generated from
    #[serde(default)]
    pub job_description: Option<String>,
    /// Ordered question list
    #[serde(default)]
    pub questions: Vec<Question>,
    /// Index of the question currently in front of the candidate
    #[serde(default)]
    pub current_question_index: usize,
    /// Answers keyed by question id
    #[serde(default)]
    pub answers: HashMap<String, Answer>,
    /// Whether the candidate must enter initials before starting
    #[serde(default)]
    pub initials_required: bool,
    /// Initials entered by the candidate, if any
    #[serde(default)]
    pub entered_initials: Option<String>,
    /// Candidate-selected coaching preference
    #[serde(default)]
    pub coaching_preference: Option<String>,
    /// Candidate identity
    #[serde(default)]
    pub candidate: Candidate,
    /// Total engaged seconds accumulated by the engagement tracker
    #[serde(default)]
    pub engaged_time_seconds: u64,
    /// Opaque intake data collected by the invite flow
    #[serde(default)]
    pub intake: Option<serde_json::Value>,
    /// Timestamp when the session was created
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Timestamp when the session was last updated
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Returns the question at `current_question_index`, if in bounds.
    ///
    /// The index may legally equal `questions.len()` transiently (just
    /// before completion), in which case there is no current question.
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_question_index)
    }

    /// Returns the answer record for the current question, if any.
    pub fn current_answer(&self) -> Option<&Answer> {
        let question = self.current_question()?;
        self.answers.get(&question.id)
    }

    /// Returns the answer record for a given question id, if any.
    pub fn answer_for(&self, question_id: &str) -> Option<&Answer> {
        self.answers.get(question_id)
    }

    /// Index of the first question lacking a submitted answer.
    ///
    /// Returns `questions.len()` when every question has been submitted.
    pub fn first_unanswered_index(&self) -> usize {
        self.questions
            .iter()
            .position(|q| {
                self.answers
                    .get(&q.id)
                    .map_or(true, |a| !a.is_submitted())
            })
            .unwrap_or(self.questions.len())
    }

    /// Whether the final question has a submitted answer.
    pub fn is_last_question_answered(&self) -> bool {
        self.questions
            .last()
            .and_then(|q| self.answers.get(&q.id))
            .is_some_and(Answer::is_submitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: &str, index: usize) -> Question {
        Question {
            id: id.to_string(),
            text: format!("Question {index}"),
            category: "behavioral".to_string(),
            framework: "STAR".to_string(),
            competency_id: None,
            difficulty: None,
            index,
        }
    }

    fn submitted_answer(question_id: &str) -> Answer {
        Answer {
            question_id: question_id.to_string(),
            transcript: "an answer".to_string(),
            submitted_at: Some(Utc::now()),
            ..Answer::default()
        }
    }

    fn session_with_questions(n: usize) -> Session {
        Session {
            id: "s-1".to_string(),
            status: SessionStatus::InSession,
            role: "Product Manager".to_string(),
            job_description: None,
            questions: (0..n).map(|i| question(&format!("q{i}"), i)).collect(),
            current_question_index: 0,
            answers: HashMap::new(),
            initials_required: false,
            entered_initials: None,
            coaching_preference: None,
            candidate: Candidate::default(),
            engaged_time_seconds: 0,
            intake: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn first_unanswered_index_starts_at_zero() {
        let session = session_with_questions(3);
        assert_eq!(session.first_unanswered_index(), 0);
    }

    #[test]
    fn first_unanswered_index_skips_submitted_answers() {
        let mut session = session_with_questions(3);
        session
            .answers
            .insert("q0".to_string(), submitted_answer("q0"));
        assert_eq!(session.first_unanswered_index(), 1);
    }

    #[test]
    fn first_unanswered_index_ignores_sparse_gaps() {
        // q0 unanswered, q2 answered: the first gap still wins
        let mut session = session_with_questions(3);
        session
            .answers
            .insert("q2".to_string(), submitted_answer("q2"));
        assert_eq!(session.first_unanswered_index(), 0);
        assert!(session.is_last_question_answered());
    }

    #[test]
    fn first_unanswered_index_is_len_when_all_answered() {
        let mut session = session_with_questions(2);
        for id in ["q0", "q1"] {
            session.answers.insert(id.to_string(), submitted_answer(id));
        }
        assert_eq!(session.first_unanswered_index(), 2);
    }

    #[test]
    fn draft_only_answer_is_not_submitted() {
        let mut session = session_with_questions(1);
        session.answers.insert(
            "q0".to_string(),
            Answer {
                question_id: "q0".to_string(),
                draft: "thinking...".to_string(),
                ..Answer::default()
            },
        );
        assert_eq!(session.first_unanswered_index(), 0);
    }

    #[test]
    fn current_question_is_none_past_the_end() {
        let mut session = session_with_questions(2);
        session.current_question_index = 2;
        assert!(session.current_question().is_none());
        assert!(session.current_answer().is_none());
    }

    #[test]
    fn session_round_trips_through_json() {
        let mut session = session_with_questions(1);
        session
            .answers
            .insert("q0".to_string(), submitted_answer("q0"));
        let json = serde_json::to_string(&session).unwrap();
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(session, back);
    }

    #[test]
    fn session_tolerates_missing_optional_fields() {
        let json = r#"{"id":"s-1","status":"not_started","role":"PM"}"#;
        let session: Session = serde_json::from_str(json).unwrap();
        assert_eq!(session.status, SessionStatus::NotStarted);
        assert!(session.questions.is_empty());
        assert_eq!(session.engaged_time_seconds, 0);
    }
}
