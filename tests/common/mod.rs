//! Fakes shared by the integration tests
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Map};

use voice_agent::agent::{TurnConfig, TurnProcessor};
use voice_agent::core::{AgentError, AgentResult};
use voice_agent::llm::{ChatResponse, LlmProvider, Message, ToolCall, ToolDefinition};
use voice_agent::tools::{RunCommandTool, ToolRegistry};
use voice_agent::voice::{InputChannel, OutputChannel};

/// Chat model that replays canned responses in order
pub struct ScriptedModel {
    replies: Mutex<VecDeque<ChatResponse>>,
    pub calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn new(replies: Vec<ChatResponse>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl LlmProvider for ScriptedModel {
    async fn complete(
        &self,
        _messages: &[Message],
        _system_prompt: Option<&str>,
        _tools: &[ToolDefinition],
    ) -> AgentResult<ChatResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AgentError::llm("no scripted reply left"))
    }

    fn model(&self) -> String {
        "scripted".to_string()
    }

    fn provider_name(&self) -> &str {
        "test"
    }
}

/// Input that replays utterances, then sets the stop flag
pub struct ScriptedInput {
    utterances: Mutex<VecDeque<AgentResult<String>>>,
    stop: Arc<AtomicBool>,
    pub listens: Arc<AtomicUsize>,
}

impl ScriptedInput {
    pub fn new(utterances: Vec<AgentResult<String>>, stop: Arc<AtomicBool>) -> Self {
        Self {
            utterances: Mutex::new(utterances.into()),
            stop,
            listens: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn said(texts: &[&str], stop: Arc<AtomicBool>) -> Self {
        Self::new(texts.iter().map(|t| Ok(t.to_string())).collect(), stop)
    }
}

#[async_trait]
impl InputChannel for ScriptedInput {
    async fn listen(&self) -> AgentResult<String> {
        self.listens.fetch_add(1, Ordering::SeqCst);
        match self.utterances.lock().unwrap().pop_front() {
            Some(next) => next,
            None => {
                self.stop.store(true, Ordering::SeqCst);
                Err(AgentError::RecognitionFailure("script finished".into()))
            }
        }
    }
}

/// Output that records what it was asked to say
#[derive(Default)]
pub struct RecordingOutput {
    pub spoken: Arc<Mutex<Vec<String>>>,
    pub fail: bool,
}

impl RecordingOutput {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl OutputChannel for RecordingOutput {
    async fn speak(&self, text: &str) -> AgentResult<()> {
        if self.fail {
            return Err(AgentError::SynthesisFailure("tts offline".into()));
        }
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// A `run_command` call with a fixed id
pub fn run_command(id: &str, cmd: &str) -> ToolCall {
    let mut args = Map::new();
    args.insert("cmd".into(), json!(cmd));
    ToolCall::with_id(id, "run_command", args)
}

pub fn processor(model: Arc<ScriptedModel>) -> TurnProcessor {
    processor_with(model, TurnConfig::default())
}

pub fn processor_with(model: Arc<ScriptedModel>, config: TurnConfig) -> TurnProcessor {
    let mut tools = ToolRegistry::new();
    tools.register(RunCommandTool::default());
    TurnProcessor::new(model, Arc::new(tools), config)
}
