//! Conversation driving
//!
//! - `TurnProcessor` - one utterance to one final reply, with tool round-trips
//! - `SessionLoop` - listen / process / speak until stopped

mod config;
mod session_loop;
mod system_prompt;
mod turn;

pub use config::{TurnConfig, DEFAULT_MAX_ROUNDS};
pub use session_loop::{watch_ctrl_c, SessionLoop};
pub use system_prompt::{load_system_prompt, DEFAULT_SYSTEM_PROMPT};
pub use turn::TurnProcessor;
