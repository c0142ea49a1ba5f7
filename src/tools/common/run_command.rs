//! `run_command`: execute a shell command and report its exit status
//!
//! Output streams are inherited, so whatever the command prints goes straight
//! to the operator's terminal. Only the exit status is returned to the model.
//! A non-zero status is a normal result, not a tool error.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use super::super::policy::CommandPolicy;
use super::super::tool::{Tool, ToolResult};
use crate::core::AgentResult;
use crate::llm::{ToolDefinition, ToolInputSchema};

/// Default timeout in milliseconds (2 minutes)
pub const DEFAULT_TIMEOUT_MS: u64 = 120000;

/// Status reported for timed-out or signal-killed commands
const ABNORMAL_EXIT: i32 = -1;

pub const TOOL_NAME: &str = "run_command";

/// Shell command tool
pub struct RunCommandTool {
    working_dir: PathBuf,
    timeout: Duration,
    policy: CommandPolicy,
}

#[derive(Debug, Deserialize)]
struct RunCommandInput {
    cmd: String,
}

impl RunCommandTool {
    /// Create a tool that runs commands in `working_dir`
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            policy: CommandPolicy::allow_all(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_policy(mut self, policy: CommandPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[cfg(windows)]
    fn shell(command: &str) -> Command {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command);
        c
    }

    #[cfg(not(windows))]
    fn shell(command: &str) -> Command {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    }

    /// Run a command and return its exit status
    async fn run(&self, command: &str) -> AgentResult<i32> {
        tracing::info!("[run_command] Executing: {}", command);
        tracing::debug!("[run_command] Working directory: {}", self.working_dir.display());

        let mut child = Self::shell(command)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let code = match timeout(self.timeout, child.wait()).await {
            Ok(status) => status?.code().unwrap_or(ABNORMAL_EXIT),
            Err(_) => {
                tracing::warn!(
                    "[run_command] Timed out after {:?}, killing: {}",
                    self.timeout,
                    command
                );
                // Best effort; kill_on_drop covers the rest
                let _ = child.kill().await;
                ABNORMAL_EXIT
            }
        };

        tracing::debug!("[run_command] Exit code: {}", code);
        Ok(code)
    }
}

impl Default for RunCommandTool {
    fn default() -> Self {
        Self::new(".")
    }
}

#[async_trait]
impl Tool for RunCommandTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Run a shell command on the user's machine and return its exit status."
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: TOOL_NAME.to_string(),
            description: "Runs a command on the user's machine through the system shell \
                and returns the exit status (0 means success). The command's output is \
                shown to the user, not returned."
                .to_string(),
            input_schema: ToolInputSchema::object(
                json!({
                    "cmd": {
                        "type": "string",
                        "description": "The shell command to execute"
                    }
                }),
                &["cmd"],
            ),
        }
    }

    async fn execute(&self, input: &Value) -> AgentResult<ToolResult> {
        let input: RunCommandInput = match serde_json::from_value(input.clone()) {
            Ok(input) => input,
            Err(e) => return Ok(ToolResult::error(format!("Invalid run_command input: {}", e))),
        };

        if !self.policy.allows(&input.cmd) {
            tracing::warn!("[run_command] Denied by policy: {}", input.cmd);
            return Ok(ToolResult::error(format!(
                "Command not allowed by policy: {}",
                input.cmd
            )));
        }

        match self.run(&input.cmd).await {
            Ok(code) => Ok(ToolResult::success(code.to_string())),
            Err(e) => Ok(ToolResult::error(format!("Failed to execute command: {}", e))),
        }
    }
}
