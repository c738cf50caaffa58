//! Tagged session patches.
//!
//! Local mutation and the PATCH wire format share one vocabulary: a
//! [`SessionPatch`] names the field group it touches (metadata, answers,
//! questions) and [`Session::apply_patch`] is a total, validated merge.
//! Shape problems are caught at this boundary instead of being trusted
//! implicitly by a shallow merge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RehearseError, Result};
use crate::session::model::{Answer, Question, RetryContext, Session, SessionStatus};

/// Cross-cutting scalar fields, all optional; absent fields are untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MetadataPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SessionStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_question_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initials_required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entered_initials: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coaching_preference: Option<String>,
    /// New engaged-seconds total. Must not decrease.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engaged_time_seconds: Option<u64>,
}

/// Operations on the answers map, keyed by question id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum AnswersPatch {
    /// Update the in-progress draft text only.
    SetDraft { question_id: String, draft: String },
    /// Record a submission: final transcript set, draft cleared,
    /// any previous analysis discarded.
    RecordSubmission {
        question_id: String,
        transcript: String,
        submitted_at: DateTime<Utc>,
    },
    /// Reopen a question for another attempt: submission timestamp and
    /// analysis cleared, transcript and draft kept.
    ClearEvaluation {
        question_id: String,
        retry_context: RetryContext,
    },
    /// Drop every answer record (session reset).
    ClearAll,
}

/// Replacement of the question list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionsPatch {
    pub questions: Vec<Question>,
}

/// One validated mutation of a [`Session`], tagged by field group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum SessionPatch {
    Metadata(MetadataPatch),
    Answers(AnswersPatch),
    Questions(QuestionsPatch),
}

impl Session {
    /// Applies a patch after validating it against the session's invariants.
    ///
    /// On error the session is unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`RehearseError::InvalidPatch`] when the patch references an
    /// unknown question, moves `current_question_index` out of bounds,
    /// decreases `engaged_time_seconds`, or carries a malformed question
    /// list.
    pub fn apply_patch(&mut self, patch: &SessionPatch) -> Result<()> {
        self.validate_patch(patch)?;

        match patch {
            SessionPatch::Metadata(meta) => {
                if let Some(status) = meta.status {
                    self.status = status;
                }
                if let Some(index) = meta.current_question_index {
                    self.current_question_index = index;
                }
                if let Some(required) = meta.initials_required {
                    self.initials_required = required;
                }
                if let Some(initials) = &meta.entered_initials {
                    self.entered_initials = Some(initials.clone());
                }
                if let Some(preference) = &meta.coaching_preference {
                    self.coaching_preference = Some(preference.clone());
                }
                if let Some(total) = meta.engaged_time_seconds {
                    self.engaged_time_seconds = total;
                }
            }
            SessionPatch::Answers(answers) => self.apply_answers_patch(answers),
            SessionPatch::Questions(QuestionsPatch { questions }) => {
                self.questions = questions.clone();
                // Keep the answers-keys-subset invariant: drop records whose
                // question no longer exists.
                let known: Vec<&str> = self.questions.iter().map(|q| q.id.as_str()).collect();
                self.answers.retain(|id, _| known.contains(&id.as_str()));
                if self.current_question_index > self.questions.len() {
                    self.current_question_index = self.questions.len();
                }
            }
        }
        Ok(())
    }

    fn apply_answers_patch(&mut self, patch: &AnswersPatch) {
        match patch {
            AnswersPatch::SetDraft { question_id, draft } => {
                let answer = self.answer_entry(question_id);
                answer.draft = draft.clone();
            }
            AnswersPatch::RecordSubmission {
                question_id,
                transcript,
                submitted_at,
            } => {
                let answer = self.answer_entry(question_id);
                answer.transcript = transcript.clone();
                answer.submitted_at = Some(*submitted_at);
                answer.analysis = None;
                answer.draft = String::new();
            }
            AnswersPatch::ClearEvaluation {
                question_id,
                retry_context,
            } => {
                let answer = self.answer_entry(question_id);
                answer.submitted_at = None;
                answer.analysis = None;
                answer.retry_context = Some(retry_context.clone());
            }
            AnswersPatch::ClearAll => self.answers.clear(),
        }
    }

    fn answer_entry(&mut self, question_id: &str) -> &mut Answer {
        self.answers
            .entry(question_id.to_string())
            .or_insert_with(|| Answer {
                question_id: question_id.to_string(),
                ..Answer::default()
            })
    }

    fn validate_patch(&self, patch: &SessionPatch) -> Result<()> {
        match patch {
            SessionPatch::Metadata(meta) => {
                if let Some(index) = meta.current_question_index {
                    if index > self.questions.len() {
                        return Err(RehearseError::invalid_patch(format!(
                            "current_question_index {} out of bounds (max {})",
                            index,
                            self.questions.len()
                        )));
                    }
                }
                if let Some(total) = meta.engaged_time_seconds {
                    if total < self.engaged_time_seconds {
                        return Err(RehearseError::invalid_patch(format!(
                            "engaged_time_seconds may not decrease ({} -> {})",
                            self.engaged_time_seconds, total
                        )));
                    }
                }
                Ok(())
            }
            SessionPatch::Answers(answers) => {
                let question_id = match answers {
                    AnswersPatch::SetDraft { question_id, .. }
                    | AnswersPatch::RecordSubmission { question_id, .. }
                    | AnswersPatch::ClearEvaluation { question_id, .. } => question_id,
                    AnswersPatch::ClearAll => return Ok(()),
                };
                if !self.questions.iter().any(|q| &q.id == question_id) {
                    return Err(RehearseError::invalid_patch(format!(
                        "unknown question id '{question_id}'"
                    )));
                }
                Ok(())
            }
            SessionPatch::Questions(QuestionsPatch { questions }) => {
                for (position, question) in questions.iter().enumerate() {
                    if question.index != position {
                        return Err(RehearseError::invalid_patch(format!(
                            "question '{}' has index {} at position {}",
                            question.id, question.index, position
                        )));
                    }
                    if questions[..position].iter().any(|q| q.id == question.id) {
                        return Err(RehearseError::invalid_patch(format!(
                            "duplicate question id '{}'",
                            question.id
                        )));
                    }
                }
                Ok(())
            }
        }
    }
}
