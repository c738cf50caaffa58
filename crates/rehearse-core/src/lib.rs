//! # rehearse-core
//!
//! Headless core of the Rehearse interview-practice system: the canonical
//! session replica, the pure screen selector, the optimistic sync engine,
//! and the engagement window tracker.
//!
//! UI composition, audio capture, speech-to-text, evaluation prompts and
//! the storage schema all live with external collaborators; this crate
//! only consumes the [`session::SessionRepository`] /
//! [`session::SessionPointer`] seams and exposes derived state for
//! rendering.

pub mod engagement;
pub mod error;
pub mod selector;
pub mod session;

// Re-export common types at the crate root
pub use error::{RehearseError, Result};
pub use selector::{select_now, NowState, Screen};
pub use session::{Session, SessionStatus, SessionStore};
