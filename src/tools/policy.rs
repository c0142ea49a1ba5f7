//! Command allow-list for `run_command`
//!
//! A policy with no rules allows everything. Once at least one prefix is
//! configured, a command must start with one of them on a word boundary and
//! must not contain shell control characters, since it runs through the
//! platform shell.

use serde::{Deserialize, Serialize};

/// A single allow rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixRule {
    /// Command prefix, e.g. "ls" or "git status"
    pub prefix: String,
}

impl PrefixRule {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The command is the prefix itself or the prefix followed by arguments
    pub fn matches(&self, command: &str) -> bool {
        match command.trim().strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with(char::is_whitespace),
            None => false,
        }
    }
}

/// Characters that let a shell chain, substitute or redirect
const SHELL_CONTROL: &[char] = &[';', '&', '|', '$', '`', '(', ')', '<', '>', '\n', '\r'];

fn has_shell_control(command: &str) -> bool {
    command.contains(SHELL_CONTROL)
}

/// Which shell commands may run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandPolicy {
    rules: Vec<PrefixRule>,
}

impl CommandPolicy {
    /// Policy that allows every command
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Policy that allows only commands starting with one of `prefixes`.
    /// Blank prefixes are ignored.
    pub fn allow_prefixes<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rules = prefixes
            .into_iter()
            .map(Into::into)
            .map(|p: String| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .map(PrefixRule::new)
            .collect();
        Self { rules }
    }

    /// Whether the policy restricts anything
    pub fn is_open(&self) -> bool {
        self.rules.is_empty()
    }

    /// Check a command against the policy
    pub fn allows(&self, command: &str) -> bool {
        if self.is_open() {
            return true;
        }
        if has_shell_control(command) {
            tracing::warn!("[CommandPolicy] Refusing command with shell control characters");
            return false;
        }
        self.rules.iter().any(|r| r.matches(command))
    }

    pub fn rules(&self) -> &[PrefixRule] {
        &self.rules
    }
}
