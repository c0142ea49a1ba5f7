use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Context;

use voice_agent::agent::{load_system_prompt, watch_ctrl_c, SessionLoop, TurnProcessor};
use voice_agent::cli::Console;
use voice_agent::llm::GeminiProvider;
use voice_agent::session::{connect, ConversationSession, SessionMetadata};
use voice_agent::tools::{RunCommandTool, ToolRegistry};
use voice_agent::voice::{
    ConsoleInput, GeminiTextToSpeech, GoogleSpeechToText, InputChannel, MicrophoneInput,
    OutputChannel, SilentOutput, SpeechOutput,
};
use voice_agent::{logging, AppConfig};

#[tokio::main]
async fn main() -> ExitCode {
    let config = AppConfig::from_args();

    let _guard = match logging::init_logging(&config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("failed to initialize logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            Console::new().print_error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    tracing::info!("=== Voice Agent Starting ===");
    config.validate()?;

    let console = Console::new();
    let chat_key = config.credentials.chat_key()?;

    // Transcript
    let store = connect(&config.store).context("opening session store")?;
    tracing::info!("[Main] Session store: {}", store.describe());
    let metadata = SessionMetadata::new(&config.session).with_model(&config.model, "gemini");
    let session = ConversationSession::open(store, metadata)?;
    tracing::info!(
        "[Main] Session {} loaded with {} messages",
        session.id(),
        session.len()
    );

    // Chat model and tools
    let llm = GeminiProvider::new(chat_key, config.http_timeout())?
        .with_model(&config.model)
        .with_retry(config.retry_policy());

    let policy = config.command_policy();
    if !policy.is_open() {
        tracing::info!("[Main] Command allow-list: {} prefixes", policy.rules().len());
    }
    let mut tools = ToolRegistry::new();
    tools.register(
        RunCommandTool::new(&config.working_dir)
            .with_timeout(config.command_timeout())
            .with_policy(policy),
    );
    tracing::info!("[Main] Registered {} tools", tools.len());

    let system_prompt = load_system_prompt(config.system_prompt_file.as_deref())?;
    let turn = TurnProcessor::new(
        Arc::new(llm),
        Arc::new(tools),
        config.turn_config(system_prompt),
    );

    let stop = Arc::new(AtomicBool::new(false));

    // Input
    let input: Box<dyn InputChannel> = if config.text {
        Box::new(ConsoleInput::new(stop.clone()))
    } else {
        let speech_key = config.credentials.speech_key().unwrap_or(chat_key);
        let stt = GoogleSpeechToText::new(speech_key, config.http_timeout())?
            .with_language(&config.language)
            .with_retry(config.retry_policy());
        Box::new(
            MicrophoneInput::new(Arc::new(stt), stop.clone())
                .with_settings(config.listen_settings())
                .with_console(console.clone()),
        )
    };

    // Output
    let output: Box<dyn OutputChannel> = match config.credentials.tts_key() {
        Some(key) if !config.no_tts => {
            let tts = GeminiTextToSpeech::new(key, config.http_timeout())?
                .with_model(&config.tts_model)
                .with_voice(&config.tts_voice)
                .with_retry(config.retry_policy());
            Box::new(SpeechOutput::new(Arc::new(tts), &config.output_path))
        }
        _ => {
            if !config.no_tts {
                tracing::warn!("[Main] No TTS credential, speech output disabled");
                console.print_warning("No Gemini API key for TTS, replies will not be spoken.");
            }
            Box::new(SilentOutput)
        }
    };

    console.print_banner(session.id(), &config.model);
    let _watcher = watch_ctrl_c(stop.clone());

    let mut session_loop =
        SessionLoop::new(input, output, turn, session, stop).with_console(console.clone());
    let result = session_loop.run().await;

    console.print_goodbye();
    tracing::info!("=== Voice Agent Shutting Down ===");
    result?;
    Ok(())
}
