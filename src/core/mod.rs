//! Core types for the voice agent
//!
//! This module provides the fundamental types used throughout the crate:
//! - `AgentError` - Error taxonomy shared by every component
//! - `LoopState` - Current state of the session loop
//! - `RetryPolicy` - Backoff policy for remote calls

pub mod error;
pub mod retry;
pub mod state;

pub use error::{AgentError, AgentResult};
pub use retry::{retry, RetryPolicy};
pub use state::LoopState;
