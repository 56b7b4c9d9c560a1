//! # checkdoc-providers
//!
//! Remote assistant implementations for CheckDoc.

pub mod openai;

pub use openai::OpenAiAssistantProvider;
