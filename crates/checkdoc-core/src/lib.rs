//! # checkdoc-core
//!
//! Core types, traits, configuration, and error handling for the CheckDoc relay.

pub mod assistant;
pub mod config;
pub mod error;
pub mod message;
pub mod traits;
