//! Voice-driven coding assistant
//!
//! Listens on the microphone, runs a turn against Gemini with a single
//! `run_command` tool, persists the transcript per session and writes the
//! spoken reply to a WAV file.

pub mod core;
pub mod session;
pub mod tools;

pub mod cli;
pub mod config;
pub mod llm;
pub mod logging;

// Turn processing and the session loop
pub mod agent;

// Microphone, speech recognition and synthesis
pub mod voice;

pub use config::AppConfig;
