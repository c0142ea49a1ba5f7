//! Audio capture from the microphone
//!
//! Capture is blocking: [`MicrophoneSource`] owns a live `cpal` stream and must
//! stay on the thread that opened it, so callers run it inside
//! `tokio::task::spawn_blocking`.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};

use crate::core::{AgentError, AgentResult};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// Samples per chunk handed to the segmenter (100 ms)
pub const CHUNK_SAMPLES: usize = (SAMPLE_RATE / 10) as usize;

/// A blocking source of mono `f32` samples at [`SAMPLE_RATE`]
pub trait AudioSource {
    /// Block until the next chunk is available.
    ///
    /// Returns `Ok(None)` when the source is exhausted.
    fn next_chunk(&mut self) -> AgentResult<Option<Vec<f32>>>;
}

/// Captures audio from the default input device
pub struct MicrophoneSource {
    buffer: Arc<Mutex<Vec<f32>>>,
    // Dropping the stream stops capture
    _stream: Stream,
    read_timeout: Duration,
}

impl MicrophoneSource {
    /// Open the default input device and start capturing
    pub fn open() -> AgentResult<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| AgentError::Audio("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| AgentError::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.sample_format() == cpal::SampleFormat::F32
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .ok_or_else(|| AgentError::Audio("no mono 16 kHz input config found".to_string()))?;

        let config: StreamConfig = supported_config
            .with_sample_rate(SampleRate(SAMPLE_RATE))
            .config();

        tracing::debug!(
            "[Capture] Device {} at {} Hz, {} channel(s)",
            device.name().unwrap_or_default(),
            SAMPLE_RATE,
            config.channels
        );

        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buffer);

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = sink.lock() {
                        buf.extend_from_slice(data);
                    }
                },
                |err| {
                    tracing::error!("[Capture] Stream error: {}", err);
                },
                None,
            )
            .map_err(|e| AgentError::Audio(e.to_string()))?;

        stream.play().map_err(|e| AgentError::Audio(e.to_string()))?;
        tracing::debug!("[Capture] Started");

        Ok(Self {
            buffer,
            _stream: stream,
            read_timeout: Duration::from_secs(5),
        })
    }
}

impl AudioSource for MicrophoneSource {
    fn next_chunk(&mut self) -> AgentResult<Option<Vec<f32>>> {
        let started = Instant::now();

        loop {
            {
                let mut buf = self
                    .buffer
                    .lock()
                    .map_err(|_| AgentError::Audio("capture buffer poisoned".to_string()))?;
                if buf.len() >= CHUNK_SAMPLES {
                    return Ok(Some(buf.drain(..CHUNK_SAMPLES).collect()));
                }
            }

            if started.elapsed() > self.read_timeout {
                return Err(AgentError::Audio(
                    "input device stopped delivering samples".to_string(),
                ));
            }
            std::thread::sleep(Duration::from_millis(20));
        }
    }
}

/// Calculate RMS energy of audio samples
pub fn rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Convert f32 samples to 16-bit PCM WAV bytes for STT APIs
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> AgentResult<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| AgentError::Audio(e.to_string()))?;

        for &sample in samples {
            // f32 [-1.0, 1.0] to i16
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| AgentError::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| AgentError::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
