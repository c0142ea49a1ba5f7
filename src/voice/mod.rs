//! Voice input and output
//!
//! - `capture` - microphone samples via `cpal`, WAV encoding via `hound`
//! - `calibration` - ambient-noise threshold and utterance segmentation
//! - `stt` / `tts` - remote speech recognition and synthesis
//! - `input` / `output` - the channels the session loop talks to

pub mod calibration;
pub mod capture;
pub mod input;
pub mod output;
pub mod stt;
pub mod tts;

pub use calibration::ListenSettings;
pub use input::{ConsoleInput, InputChannel, MicrophoneInput};
pub use output::{OutputChannel, SilentOutput, SpeechOutput, DEFAULT_OUTPUT_PATH};
pub use stt::{GoogleSpeechToText, SpeechToText};
pub use tts::{GeminiTextToSpeech, TextToSpeech};
