//! Turn processor
//!
//! One turn takes a user utterance to a final assistant reply:
//!
//! 1. Append the user message.
//! 2. Ask the model for the next reply.
//! 3. No tool call: append the reply and return it.
//! 4. One tool call: append the reply, run the tool, append its result, go to 2.
//! 5. Several tool calls: fail with [`AgentError::MultipleToolCalls`] without
//!    touching the session again.

use std::sync::Arc;

use crate::core::{AgentError, AgentResult};
use crate::llm::{LlmProvider, Message, StopReason, ToolDefinition};
use crate::session::ConversationSession;
use crate::tools::ToolRegistry;

use super::config::TurnConfig;

/// Drives chat completion and tool execution for a single turn
pub struct TurnProcessor {
    llm: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    config: TurnConfig,
    tool_definitions: Vec<ToolDefinition>,
}

impl TurnProcessor {
    pub fn new(llm: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>, config: TurnConfig) -> Self {
        let tool_definitions = tools.get_definitions();
        Self {
            llm,
            tools,
            config,
            tool_definitions,
        }
    }

    pub fn config(&self) -> &TurnConfig {
        &self.config
    }

    /// Model name of the underlying provider
    pub fn model(&self) -> String {
        self.llm.model()
    }

    pub fn provider_name(&self) -> &str {
        self.llm.provider_name()
    }

    /// Run one turn and return the final assistant message.
    ///
    /// Every message is persisted as soon as it is produced, so an error
    /// part-way through leaves the transcript with whatever was appended so far.
    pub async fn process_turn(
        &self,
        session: &mut ConversationSession,
        user_text: &str,
    ) -> AgentResult<Message> {
        session.append(Message::user(user_text))?;

        let max_rounds = self.config.max_rounds;

        for round in 1..=max_rounds {
            let context = session.context(self.config.history_window);

            tracing::info!(
                "[TurnProcessor] Calling LLM with {} messages (round {}/{})",
                context.len(),
                round,
                max_rounds
            );

            let response = self
                .llm
                .complete(
                    context,
                    Some(&self.config.system_prompt),
                    &self.tool_definitions,
                )
                .await?;

            tracing::info!(
                "[TurnProcessor] LLM response: stop_reason={:?}, tool_calls={}",
                response.stop_reason,
                response.tool_calls.len()
            );

            let mut calls = response.tool_calls;
            if calls.len() > 1 {
                tracing::error!(
                    "[TurnProcessor] Model requested {} tool calls in one reply",
                    calls.len()
                );
                return Err(AgentError::MultipleToolCalls { count: calls.len() });
            }

            let Some(call) = calls.pop() else {
                match response.stop_reason {
                    Some(StopReason::MaxTokens) => {
                        tracing::warn!("[TurnProcessor] Response truncated (max tokens)")
                    }
                    Some(StopReason::Refusal) => {
                        tracing::warn!("[TurnProcessor] Model refused to respond")
                    }
                    _ => {}
                }

                let reply = Message::assistant(response.content);
                session.append(reply.clone())?;
                return Ok(reply);
            };

            tracing::info!("[TurnProcessor] Tool use: {} ({})", call.name, call.id);
            session.append(Message::assistant_with_tool_call(
                response.content,
                call.clone(),
            ))?;

            let result = self.tools.invoke(&call.name, &call.arguments).await?;
            session.append(result.into_message(&call))?;
        }

        tracing::warn!("[TurnProcessor] Max rounds ({}) reached", max_rounds);
        Err(AgentError::ToolLoopLimitExceeded { limit: max_rounds })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatResponse, Role, ToolCall};
    use crate::session::{HistoryWindow, SessionMetadata, SessionStore, SqliteSessionStore};
    use crate::tools::RunCommandTool;
    use async_trait::async_trait;
    use serde_json::{json, Map};
    use std::sync::Mutex;

    /// Replays canned responses and records the context it was given
    struct Scripted {
        replies: Mutex<Vec<ChatResponse>>,
        seen: Mutex<Vec<usize>>,
    }

    impl Scripted {
        fn new(mut replies: Vec<ChatResponse>) -> Self {
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for Scripted {
        async fn complete(
            &self,
            messages: &[Message],
            _system_prompt: Option<&str>,
            _tools: &[ToolDefinition],
        ) -> AgentResult<ChatResponse> {
            self.seen.lock().unwrap().push(messages.len());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| AgentError::llm("script exhausted"))
        }

        fn model(&self) -> String {
            "scripted".into()
        }

        fn provider_name(&self) -> &str {
            "test"
        }
    }

    fn cmd(c: &str) -> ToolCall {
        let mut args = Map::new();
        args.insert("cmd".into(), json!(c));
        ToolCall::new("run_command", args)
    }

    fn session() -> ConversationSession {
        let store: Arc<dyn SessionStore> = Arc::new(SqliteSessionStore::open_in_memory().unwrap());
        ConversationSession::open(store, SessionMetadata::new("t")).unwrap()
    }

    fn processor(llm: Arc<Scripted>, config: TurnConfig) -> TurnProcessor {
        let mut tools = ToolRegistry::new();
        tools.register(RunCommandTool::default());
        TurnProcessor::new(llm, Arc::new(tools), config)
    }

    #[tokio::test]
    async fn test_plain_reply() {
        let llm = Arc::new(Scripted::new(vec![ChatResponse::text("Hello!")]));
        let turn = processor(llm, TurnConfig::default());
        let mut s = session();

        let reply = turn.process_turn(&mut s, "hi").await.unwrap();
        assert_eq!(reply, Message::assistant("Hello!"));
        assert_eq!(s.messages(), &[Message::user("hi"), Message::assistant("Hello!")]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_single_tool_round_trip() {
        let llm = Arc::new(Scripted::new(vec![
            ChatResponse::with_tool_calls("", vec![cmd("true")]),
            ChatResponse::text("Done."),
        ]));
        let turn = processor(llm.clone(), TurnConfig::default());
        let mut s = session();

        turn.process_turn(&mut s, "run it").await.unwrap();

        let roles: Vec<Role> = s.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]);
        assert_eq!(s.messages()[2].content, "0");
        // Second call saw the tool result
        assert_eq!(*llm.seen.lock().unwrap(), vec![1, 3]);
    }

    #[tokio::test]
    async fn test_two_tool_calls_are_fatal() {
        let llm = Arc::new(Scripted::new(vec![ChatResponse::with_tool_calls(
            "",
            vec![cmd("ls"), cmd("pwd")],
        )]));
        let turn = processor(llm, TurnConfig::default());
        let mut s = session();

        let err = turn.process_turn(&mut s, "go").await.unwrap_err();
        assert!(matches!(err, AgentError::MultipleToolCalls { count: 2 }));
        assert!(err.is_fatal());
        assert_eq!(s.messages(), &[Message::user("go")]);
    }

    #[tokio::test]
    async fn test_round_limit() {
        let llm = Arc::new(Scripted::new(vec![
            ChatResponse::with_tool_calls("", vec![ToolCall::new("nope", Map::new())]),
            ChatResponse::with_tool_calls("", vec![ToolCall::new("nope", Map::new())]),
            ChatResponse::text("never reached"),
        ]));
        let turn = processor(llm, TurnConfig::default().with_max_rounds(2));
        let mut s = session();

        let err = turn.process_turn(&mut s, "loop").await.unwrap_err();
        assert!(matches!(err, AgentError::ToolLoopLimitExceeded { limit: 2 }));
        assert!(!err.is_fatal());
        // user + 2 x (call, error result)
        assert_eq!(s.len(), 5);
        assert!(s.messages()[2].is_error);
    }

    #[tokio::test]
    async fn test_window_limits_context() {
        let llm = Arc::new(Scripted::new(vec![
            ChatResponse::text("one"),
            ChatResponse::text("two"),
        ]));
        let config = TurnConfig::default().with_history_window(HistoryWindow::LastMessages(2));
        let turn = processor(llm.clone(), config);
        let mut s = session();

        turn.process_turn(&mut s, "a").await.unwrap();
        turn.process_turn(&mut s, "b").await.unwrap();

        assert_eq!(*llm.seen.lock().unwrap(), vec![1, 1]);
        assert_eq!(s.len(), 4);
    }
}
