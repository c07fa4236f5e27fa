//! Core of quire: the comment store, reply-tree assembly, submission, and the
//! moderation state machine for a personal blog.
//!
//! Every operation takes an explicit `&rusqlite::Connection` and, where
//! authorization matters, an explicit [`identity::Identity`] or
//! [`identity::Moderator`]. Nothing here holds process-wide state.

pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod model;
pub mod moderation;
pub mod posts;
pub mod read;
pub mod submit;
pub mod tree;

pub use error::{Error, ErrorCode, Result};
