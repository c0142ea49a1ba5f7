//! Session loop
//!
//! Listen, run a turn, speak, repeat. Recognition and service failures send
//! the loop back to listening; fatal errors end it with an error; the stop
//! flag (set on Ctrl+C) ends it cleanly at the top of the next iteration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::cli::Console;
use crate::core::{AgentError, AgentResult, LoopState};
use crate::session::ConversationSession;
use crate::voice::{InputChannel, OutputChannel};

use super::turn::TurnProcessor;

/// Pause after input errors other than recognition failures, so a missing
/// device does not spin the loop
const INPUT_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Owns the collaborators of one voice session
pub struct SessionLoop {
    input: Box<dyn InputChannel>,
    output: Box<dyn OutputChannel>,
    turn: TurnProcessor,
    session: ConversationSession,
    console: Console,
    stop: Arc<AtomicBool>,
    state: LoopState,
    max_iterations: Option<usize>,
    input_error_backoff: Duration,
}

impl SessionLoop {
    pub fn new(
        input: Box<dyn InputChannel>,
        output: Box<dyn OutputChannel>,
        turn: TurnProcessor,
        session: ConversationSession,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            input,
            output,
            turn,
            session,
            console: Console::new(),
            stop,
            state: LoopState::Idle,
            max_iterations: None,
            input_error_backoff: INPUT_ERROR_BACKOFF,
        }
    }

    pub fn with_console(mut self, console: Console) -> Self {
        self.console = console;
        self
    }

    /// Stop after `n` listen attempts (used by tests and one-shot runs)
    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = Some(n);
        self
    }

    pub fn with_input_error_backoff(mut self, backoff: Duration) -> Self {
        self.input_error_backoff = backoff;
        self
    }

    /// Current loop state
    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn session(&self) -> &ConversationSession {
        &self.session
    }

    /// Give the session back once the loop is done
    pub fn into_session(self) -> ConversationSession {
        self.session
    }

    fn transition(&mut self, next: LoopState) {
        if !self.state.can_transition_to(next) {
            tracing::warn!("[SessionLoop] Unexpected transition {} -> {}", self.state, next);
        }
        tracing::debug!("[SessionLoop] {} -> {}", self.state, next);
        self.state = next;
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Run until the stop flag is set, the iteration cap is hit, or a fatal
    /// error occurs
    pub async fn run(&mut self) -> AgentResult<()> {
        tracing::info!("[SessionLoop] Started for session {}", self.session.id());
        let mut iterations = 0usize;

        loop {
            if self.stop_requested() {
                self.transition(LoopState::Stopped);
                tracing::info!("[SessionLoop] Stop requested");
                return Ok(());
            }
            if self.max_iterations.is_some_and(|max| iterations >= max) {
                tracing::info!("[SessionLoop] Iteration limit reached");
                return Ok(());
            }
            iterations += 1;

            self.step().await?;
        }
    }

    /// One listen/process/speak cycle
    async fn step(&mut self) -> AgentResult<()> {
        self.transition(LoopState::Listening);
        self.console.println();
        self.console.print_status("Say something...");

        let text = match self.input.listen().await {
            Ok(text) => text,
            Err(e) => {
                self.report_input_error(&e).await;
                return Ok(());
            }
        };
        self.console.print_heard(&text);

        self.transition(LoopState::Processing);
        let start = self.session.len();
        let result = self.turn.process_turn(&mut self.session, &text).await;

        for message in &self.session.messages()[start..] {
            self.console.print_message(message);
        }

        let reply = match result {
            Ok(reply) => reply,
            Err(e) if e.is_fatal() => {
                tracing::error!("[SessionLoop] Fatal error: {}", e);
                self.console.print_error(&e.to_string());
                return Err(e);
            }
            Err(e) => {
                tracing::error!("[SessionLoop] Turn failed: {}", e);
                self.console.print_error(&e.to_string());
                return Ok(());
            }
        };

        self.transition(LoopState::Speaking);
        if !reply.content.trim().is_empty() {
            self.console.print_status("Generating TTS audio...");
        }
        match self.output.speak(&reply.content).await {
            Ok(()) => {
                if let Some(path) = self.output.destination() {
                    if !reply.content.trim().is_empty() {
                        self.console.print_saved(path);
                    }
                }
            }
            Err(e) => {
                tracing::error!("[SessionLoop] Speech output failed: {}", e);
                self.console.print_error(&format!("Error generating TTS: {}", e));
            }
        }

        self.transition(LoopState::Idle);
        Ok(())
    }

    async fn report_input_error(&self, e: &AgentError) {
        match e {
            AgentError::RecognitionFailure(reason) => {
                tracing::info!("[SessionLoop] Not recognized: {}", reason);
                if !self.stop_requested() {
                    self.console
                        .print_warning("Sorry, I couldn't understand that. Please try again.");
                }
            }
            AgentError::ServiceUnavailable(reason) => {
                tracing::warn!("[SessionLoop] Speech service unavailable: {}", reason);
                self.console.print_warning(&format!(
                    "Could not reach the speech recognition service: {}",
                    reason
                ));
            }
            other => {
                tracing::error!("[SessionLoop] Input failed: {}", other);
                self.console.print_error(&other.to_string());
                tokio::time::sleep(self.input_error_backoff).await;
            }
        }
    }
}

/// Spawn a task that sets `stop` on Ctrl+C.
///
/// The loop finishes its current step before stopping. A second Ctrl+C exits
/// the process immediately, for when that step is stuck waiting on input.
pub fn watch_ctrl_c(stop: Arc<AtomicBool>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::info!("[SessionLoop] Ctrl+C received, stopping after the current step");
        stop.store(true, Ordering::SeqCst);

        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("[SessionLoop] Second Ctrl+C, exiting now");
            std::process::exit(130);
        }
    })
}
