use colored::*;
use std::io::{self, Write};
use std::path::Path;

use crate::llm::{Message, Role};

/// Maximum characters of a tool result shown on the console
const MAX_RESULT_DISPLAY: usize = 500;

/// Console handles all operator-facing terminal output with colored formatting
#[derive(Debug, Clone)]
pub struct Console {
    user_color: Color,
    assistant_color: Color,
    tool_color: Color,
}

impl Console {
    /// Create a new Console with default colors
    pub fn new() -> Self {
        Self {
            user_color: Color::Cyan,
            assistant_color: Color::Green,
            tool_color: Color::Magenta,
        }
    }

    /// Create a new Console with custom colors
    pub fn with_colors(user_color: Color, assistant_color: Color, tool_color: Color) -> Self {
        Self {
            user_color,
            assistant_color,
            tool_color,
        }
    }

    /// Print a welcome banner
    pub fn print_banner(&self, session_id: &str, model: &str) {
        println!("{}", "=".repeat(60).bright_blue());
        println!("{}", "  Voice Agent - Powered by Gemini".bright_blue().bold());
        println!("{}", "=".repeat(60).bright_blue());
        println!();
        println!(
            "Session {} · model {}",
            session_id.bold(),
            model.bright_black()
        );
        println!("Speak after the prompt. Press Ctrl+C to exit.");
        println!();
    }

    /// Print a newline
    pub fn println(&self) {
        println!();
    }

    /// Print a short status line (Listening..., Recognizing...)
    pub fn print_status(&self, status: &str) {
        println!("{}", status.bright_black());
        let _ = io::stdout().flush();
    }

    /// Print the recognized utterance
    pub fn print_heard(&self, text: &str) {
        println!("{} {}", "You said:".color(self.user_color).bold(), text);
    }

    /// Print a user message with colored formatting
    pub fn print_user(&self, message: &str) {
        println!("{} {}", "User:".color(self.user_color).bold(), message);
    }

    /// Print a complete assistant message with colored formatting
    pub fn print_assistant(&self, message: &str) {
        println!(
            "{} {}",
            "Assistant:".color(self.assistant_color).bold(),
            message.color(self.assistant_color)
        );
    }

    /// Print a tool action message
    pub fn print_tool_action(&self, tool_name: &str, action: &str) {
        println!(
            "{} {} {}",
            "Tool:".color(self.tool_color).bold(),
            format!("[{}]", tool_name).color(self.tool_color),
            action
        );
    }

    /// Print a tool result
    pub fn print_tool_result(&self, tool_name: &str, result: &str, is_error: bool) {
        if is_error {
            println!("{} {}", "Tool Error:".red().bold(), result);
            return;
        }

        let display = if result.chars().count() > MAX_RESULT_DISPLAY {
            let cut: String = result.chars().take(MAX_RESULT_DISPLAY).collect();
            format!("{}...\n(output truncated)", cut)
        } else {
            result.to_string()
        };
        println!(
            "{} {}",
            format!("[{}] returned", tool_name).color(self.tool_color),
            display.bright_black()
        );
    }

    /// Pretty-print one transcript message
    pub fn print_message(&self, message: &Message) {
        match message.role {
            Role::User => self.print_user(&message.content),
            Role::Assistant => {
                if !message.content.is_empty() {
                    self.print_assistant(&message.content);
                }
                if let Some(ref call) = message.tool_call {
                    let args = serde_json::to_string(&call.arguments).unwrap_or_default();
                    self.print_tool_action(&call.name, &args);
                }
            }
            Role::Tool => self.print_tool_result(
                message.tool_name.as_deref().unwrap_or("tool"),
                &message.content,
                message.is_error,
            ),
            Role::System => self.print_system(&message.content),
        }
    }

    /// Print a system message (info, notices)
    pub fn print_system(&self, message: &str) {
        println!("{} {}", "System:".yellow().bold(), message);
    }

    /// Print a recoverable problem
    pub fn print_warning(&self, message: &str) {
        println!("{} {}", "Warning:".yellow().bold(), message);
    }

    /// Print an error message
    pub fn print_error(&self, error: &str) {
        eprintln!("{} {}", "Error:".red().bold(), error);
    }

    /// Print where the synthesized reply was written
    pub fn print_saved(&self, path: &Path) {
        println!("{} {}", "TTS audio saved as:".green(), path.display());
    }

    /// Print the exit message
    pub fn print_goodbye(&self) {
        println!();
        println!("{}", "Exiting voice chat. Goodbye!".bright_blue());
    }

    /// Print a separator line
    pub fn print_separator(&self) {
        println!("{}", "-".repeat(60).bright_black());
    }

    /// Read a line of input from the operator
    pub fn read_input(&self) -> io::Result<Option<String>> {
        print!("{} ", ">".color(self.user_color).bold());
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(None);
        }
        Ok(Some(input.trim().to_string()))
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}
