//! # checkdoc-channels
//!
//! Messaging transports for CheckDoc.

pub mod telegram;
