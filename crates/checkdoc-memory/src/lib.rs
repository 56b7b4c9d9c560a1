//! # checkdoc-memory
//!
//! Process-memory binding of local sessions to remote conversation contexts.

pub mod store;

pub use store::{EvictionPolicy, Session, SessionStore};
