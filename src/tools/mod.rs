//! Tool system
//!
//! This module provides:
//! - `Tool` trait - Interface for implementing tools
//! - `ToolResult` - Result type for tool execution
//! - `ToolRegistry` - Resolves and invokes tools by name
//! - `CommandPolicy` - Optional allow-list for shell commands
//! - `common` - Built-in tools (`run_command`)

mod policy;
mod registry;
mod tool;

/// Common/built-in tools
pub mod common;

pub use common::RunCommandTool;
pub use policy::{CommandPolicy, PrefixRule};
pub use registry::ToolRegistry;
pub use tool::{Tool, ToolResult};
