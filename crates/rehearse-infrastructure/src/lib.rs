//! Concrete persistence collaborators for Rehearse.
//!
//! Production implementations of the seams `rehearse-core` defines:
//! an HTTP-backed [`rehearse_core::session::SessionRepository`] and a
//! file-backed [`rehearse_core::session::SessionPointer`].

pub mod file_pointer;
pub mod http_repository;

pub use crate::file_pointer::FileSessionPointer;
pub use crate::http_repository::HttpSessionRepository;
