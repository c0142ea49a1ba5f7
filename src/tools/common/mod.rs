//! Built-in tools

mod run_command;

pub use run_command::{RunCommandTool, DEFAULT_TIMEOUT_MS, TOOL_NAME as RUN_COMMAND};
