//! Ambient-noise calibration and utterance segmentation
//!
//! Before every listen the source is sampled passively to measure the room's
//! noise floor. The speech threshold is a multiple of that floor, never below
//! a fixed minimum. Segmentation then waits for a chunk above the threshold
//! and ends the utterance after a pause or at the phrase time limit.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::capture::{rms_energy, AudioSource, SAMPLE_RATE};
use crate::core::{AgentError, AgentResult};

/// Parameters for one listen
#[derive(Debug, Clone)]
pub struct ListenSettings {
    /// Passive sampling before each listen
    pub calibration: Duration,
    /// Threshold multiplier over the ambient RMS
    pub energy_ratio: f32,
    /// Lowest threshold allowed
    pub min_threshold: f32,
    /// Silence after speech that ends the utterance
    pub pause: Duration,
    /// Hard cap on utterance length once speech has started
    pub phrase_limit: Duration,
    /// Audio kept from just before the first speech chunk
    pub pre_roll: Duration,
    /// Utterances with less speech than this are discarded
    pub min_speech: Duration,
}

impl Default for ListenSettings {
    fn default() -> Self {
        Self {
            calibration: Duration::from_secs(1),
            energy_ratio: 1.5,
            min_threshold: 0.01,
            pause: Duration::from_millis(800),
            phrase_limit: Duration::from_secs(30),
            pre_roll: Duration::from_millis(300),
            min_speech: Duration::from_millis(300),
        }
    }
}

fn samples_for(duration: Duration) -> usize {
    (duration.as_millis() as usize) * SAMPLE_RATE as usize / 1000
}

/// Speech threshold for a measured ambient RMS
pub fn threshold_from_ambient(ambient_rms: f32, settings: &ListenSettings) -> f32 {
    (ambient_rms * settings.energy_ratio).max(settings.min_threshold)
}

/// Sample the source passively and return the speech threshold
pub fn calibrate<S: AudioSource + ?Sized>(
    source: &mut S,
    settings: &ListenSettings,
) -> AgentResult<f32> {
    let wanted = samples_for(settings.calibration);
    let mut ambient = Vec::with_capacity(wanted);

    while ambient.len() < wanted {
        match source.next_chunk()? {
            Some(chunk) => ambient.extend_from_slice(&chunk),
            None => break,
        }
    }

    let ambient_rms = rms_energy(&ambient);
    let threshold = threshold_from_ambient(ambient_rms, settings);
    tracing::debug!(
        "[Calibration] Ambient RMS {:.4} over {} samples, threshold {:.4}",
        ambient_rms,
        ambient.len(),
        threshold
    );
    Ok(threshold)
}

/// Progress of the segmenter after a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentStatus {
    /// No speech yet
    Waiting,
    /// Speech started, utterance still open
    Capturing,
    /// Utterance ended (pause or phrase limit)
    Complete,
}

/// Energy-based utterance segmenter
pub struct UtteranceSegmenter {
    threshold: f32,
    pause_samples: usize,
    limit_samples: usize,
    pre_roll_samples: usize,
    pre_roll: VecDeque<f32>,
    utterance: Vec<f32>,
    speech_samples: usize,
    silence_samples: usize,
    started: bool,
}

impl UtteranceSegmenter {
    pub fn new(threshold: f32, settings: &ListenSettings) -> Self {
        Self {
            threshold,
            pause_samples: samples_for(settings.pause),
            limit_samples: samples_for(settings.phrase_limit),
            pre_roll_samples: samples_for(settings.pre_roll),
            pre_roll: VecDeque::new(),
            utterance: Vec::new(),
            speech_samples: 0,
            silence_samples: 0,
            started: false,
        }
    }

    /// Feed one chunk
    pub fn push(&mut self, chunk: &[f32]) -> SegmentStatus {
        let is_speech = rms_energy(chunk) > self.threshold;

        if !self.started {
            if !is_speech {
                self.pre_roll.extend(chunk.iter().copied());
                while self.pre_roll.len() > self.pre_roll_samples {
                    self.pre_roll.pop_front();
                }
                return SegmentStatus::Waiting;
            }

            tracing::trace!("[Segmenter] Speech started");
            self.started = true;
            self.utterance.extend(self.pre_roll.drain(..));
        }

        self.utterance.extend_from_slice(chunk);
        if is_speech {
            self.speech_samples += chunk.len();
            self.silence_samples = 0;
        } else {
            self.silence_samples += chunk.len();
        }

        if self.silence_samples >= self.pause_samples {
            tracing::debug!("[Segmenter] Pause detected, {} samples", self.utterance.len());
            return SegmentStatus::Complete;
        }
        if self.utterance.len() >= self.limit_samples {
            tracing::debug!("[Segmenter] Phrase limit reached");
            return SegmentStatus::Complete;
        }

        SegmentStatus::Capturing
    }

    /// Samples classified as speech so far
    pub fn speech_samples(&self) -> usize {
        self.speech_samples
    }

    /// Take the captured utterance
    pub fn finish(self) -> Vec<f32> {
        self.utterance
    }
}

/// Calibrate, then capture one utterance.
///
/// `on_listening` runs once calibration is done. The `stop` flag is polled
/// between chunks so an operator interrupt does not wait for speech.
pub fn capture_utterance<S: AudioSource + ?Sized>(
    source: &mut S,
    settings: &ListenSettings,
    stop: &AtomicBool,
    on_listening: impl FnOnce(),
) -> AgentResult<Vec<f32>> {
    let threshold = calibrate(source, settings)?;
    on_listening();

    let min_speech = samples_for(settings.min_speech);
    let mut segmenter = UtteranceSegmenter::new(threshold, settings);

    loop {
        if stop.load(Ordering::SeqCst) {
            return Err(AgentError::RecognitionFailure("listening interrupted".to_string()));
        }

        let Some(chunk) = source.next_chunk()? else {
            break;
        };
        if segmenter.push(&chunk) == SegmentStatus::Complete {
            break;
        }
    }

    if segmenter.speech_samples() < min_speech {
        return Err(AgentError::RecognitionFailure(
            "no speech detected".to_string(),
        ));
    }

    Ok(segmenter.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::capture::CHUNK_SAMPLES;

    /// Replays fixed-amplitude chunks
    struct Scripted {
        chunks: VecDeque<Vec<f32>>,
    }

    impl Scripted {
        fn new(levels: &[(f32, usize)]) -> Self {
            let mut chunks = VecDeque::new();
            for &(amp, count) in levels {
                for _ in 0..count {
                    chunks.push_back(vec![amp; CHUNK_SAMPLES]);
                }
            }
            Self { chunks }
        }
    }

    impl AudioSource for Scripted {
        fn next_chunk(&mut self) -> AgentResult<Option<Vec<f32>>> {
            Ok(self.chunks.pop_front())
        }
    }

    #[test]
    fn test_threshold_respects_minimum_and_scales() {
        let settings = ListenSettings::default();
        assert_eq!(threshold_from_ambient(0.0, &settings), 0.01);
        assert!((threshold_from_ambient(0.1, &settings) - 0.15).abs() < 1e-6);
        assert!(threshold_from_ambient(0.2, &settings) > threshold_from_ambient(0.1, &settings));
    }

    #[test]
    fn test_calibrate_consumes_one_second() {
        let settings = ListenSettings::default();
        let mut source = Scripted::new(&[(0.02, 10), (0.5, 1)]);
        let threshold = calibrate(&mut source, &settings).unwrap();
        assert!((threshold - 0.03).abs() < 1e-4);
        assert_eq!(source.chunks.len(), 1);
    }

    #[test]
    fn test_utterance_ends_after_pause() {
        let settings = ListenSettings::default();
        // calibration, leading silence, speech, pause, trailing audio never read
        let mut source = Scripted::new(&[(0.0, 10), (0.0, 5), (0.3, 10), (0.0, 8), (0.3, 5)]);
        let stop = AtomicBool::new(false);

        let mut listening = false;
        let utterance =
            capture_utterance(&mut source, &settings, &stop, || listening = true).unwrap();

        assert!(listening);
        // 3 pre-roll chunks + 10 speech + 8 silence
        assert_eq!(utterance.len(), 21 * CHUNK_SAMPLES);
        assert_eq!(source.chunks.len(), 5);
    }

    #[test]
    fn test_phrase_limit_caps_utterance() {
        let settings = ListenSettings {
            phrase_limit: Duration::from_secs(1),
            pre_roll: Duration::ZERO,
            ..ListenSettings::default()
        };
        let mut source = Scripted::new(&[(0.0, 10), (0.4, 50)]);
        let stop = AtomicBool::new(false);

        let utterance = capture_utterance(&mut source, &settings, &stop, || {}).unwrap();
        assert_eq!(utterance.len(), SAMPLE_RATE as usize);
    }

    #[test]
    fn test_silence_only_is_recognition_failure() {
        let settings = ListenSettings::default();
        let mut source = Scripted::new(&[(0.0, 30)]);
        let stop = AtomicBool::new(false);

        let err = capture_utterance(&mut source, &settings, &stop, || {}).unwrap_err();
        assert!(matches!(err, AgentError::RecognitionFailure(_)));
    }

    #[test]
    fn test_stop_flag_interrupts_wait() {
        let settings = ListenSettings::default();
        let mut source = Scripted::new(&[(0.0, 100)]);
        let stop = AtomicBool::new(true);

        let err = capture_utterance(&mut source, &settings, &stop, || {}).unwrap_err();
        assert!(matches!(err, AgentError::RecognitionFailure(_)));
        assert!(source.chunks.len() > 80);
    }
}
