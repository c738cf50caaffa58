//! Session domain module.
//!
//! Contains the session domain model, the tagged patch vocabulary, the
//! collaborator seams (repository + durable pointer), and the optimistic
//! sync engine that owns the in-memory replica.
//!
//! # Module Structure
//!
//! - `model`: core domain types (`Session`, `Question`, `Answer`)
//! - `patch`: tagged, validated session patches
//! - `repository`: persistence collaborator trait
//! - `pointer`: durable rehydration pointer trait
//! - `store`: the optimistic sync engine (`SessionStore`)

mod model;
mod patch;
mod pointer;
mod repository;
mod store;

// Re-export public API
pub use model::{
    Answer, Candidate, Question, RetryContext, RetryTrigger, Session, SessionStatus,
};
pub use patch::{AnswersPatch, MetadataPatch, QuestionsPatch, SessionPatch};
pub use pointer::SessionPointer;
pub use repository::SessionRepository;
pub use store::SessionStore;
