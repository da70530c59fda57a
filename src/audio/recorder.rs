use super::backend::{AudioFrame, CaptureBackend, CaptureBackendFactory, CaptureConfig};
use crate::error::TurnError;
use chrono::{DateTime, Utc};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Cursor;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// One finished capture: WAV-encoded audio plus its negotiated MIME type.
///
/// Transient by design; the next turn overwrites it and nothing persists it.
#[derive(Debug, Clone)]
pub struct Recording {
    pub wav_bytes: Vec<u8>,
    pub mime_type: String,
    pub duration_secs: f64,
    pub started_at: DateTime<Utc>,
}

/// Recording controller: owns the capture device lifecycle.
///
/// At most one capture session exists at a time. `stop()` releases the
/// device on every path before anything downstream (encoding, upload) can
/// fail, so the OS recording indicator always clears.
pub struct Recorder {
    backend: Box<dyn CaptureBackend>,
    config: CaptureConfig,
    collector: Option<JoinHandle<Vec<i16>>>,
    started_at: Option<DateTime<Utc>>,
}

impl Recorder {
    /// Controller over the platform microphone backend.
    pub fn new(config: CaptureConfig) -> Self {
        let backend = CaptureBackendFactory::create(config.clone());
        Self::with_backend(backend, config)
    }

    /// Controller over an injected backend (used by tests).
    pub fn with_backend(backend: Box<dyn CaptureBackend>, config: CaptureConfig) -> Self {
        Self {
            backend,
            config,
            collector: None,
            started_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.collector.is_some()
    }

    /// Start a capture session.
    ///
    /// Fails with `Busy` if a session is already active. Backend failures
    /// (`PermissionDenied`, `DeviceUnavailable`) leave no partial session.
    pub async fn start(&mut self) -> Result<(), TurnError> {
        if self.is_active() {
            return Err(TurnError::Busy);
        }

        let mut frame_rx = self.backend.start().await?;

        let target_rate = self.config.target_sample_rate;
        let target_channels = self.config.target_channels;

        // Accumulate processed frames until the backend closes the channel.
        let collector = tokio::spawn(async move {
            let mut buffer: Vec<i16> = Vec::new();
            while let Some(frame) = frame_rx.recv().await {
                let frame = process_frame(frame, target_rate, target_channels);
                buffer.extend_from_slice(&frame.samples);
            }
            buffer
        });

        self.collector = Some(collector);
        self.started_at = Some(Utc::now());

        info!("recording started ({})", self.backend.name());
        Ok(())
    }

    /// Stop the capture session and return the accumulated audio.
    ///
    /// The device is released first, unconditionally; only then is the
    /// buffer collected and encoded. A failure after the release point
    /// still leaves the hardware stopped.
    pub async fn stop(&mut self) -> Result<Recording, TurnError> {
        let collector = self.collector.take().ok_or(TurnError::NoActiveRecording)?;
        let started_at = self.started_at.take().unwrap_or_else(Utc::now);

        // Release the device before anything that can fail downstream.
        let stop_result = self.backend.stop().await;

        // The backend dropped its sender, so the collector drains and ends.
        let samples = match collector.await {
            Ok(samples) => samples,
            Err(e) => {
                error!("frame collector task failed: {}", e);
                Vec::new()
            }
        };

        stop_result?;

        let sample_rate = self.config.target_sample_rate;
        let channels = self.config.target_channels;
        let wav_bytes = encode_wav(&samples, sample_rate, channels)?;
        let duration_secs = samples.len() as f64 / (sample_rate as f64 * channels as f64);

        info!(
            "recording stopped: {:.1}s, {} bytes",
            duration_secs,
            wav_bytes.len()
        );

        Ok(Recording {
            wav_bytes,
            mime_type: "audio/wav".to_string(),
            duration_secs,
            started_at,
        })
    }

    /// Stop and discard the capture without producing a recording.
    /// The device-release guarantee is the same as `stop()`.
    pub async fn cancel(&mut self) -> Result<(), TurnError> {
        let collector = self.collector.take().ok_or(TurnError::NoActiveRecording)?;
        self.started_at = None;

        let stop_result = self.backend.stop().await;
        collector.abort();
        stop_result?;

        info!("recording cancelled");
        Ok(())
    }
}

/// Encode interleaved i16 PCM as an in-memory WAV file.
pub fn encode_wav(samples: &[i16], sample_rate: u32, channels: u16) -> Result<Vec<u8>, TurnError> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)
            .map_err(|e| TurnError::Internal(format!("wav writer: {}", e)))?;

        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| TurnError::Internal(format!("wav sample: {}", e)))?;
        }

        writer
            .finalize()
            .map_err(|e| TurnError::Internal(format!("wav finalize: {}", e)))?;
    }

    Ok(cursor.into_inner())
}

/// Process audio frame: downsample and convert to target format
fn process_frame(frame: AudioFrame, target_sample_rate: u32, target_channels: u16) -> AudioFrame {
    let mut processed = frame;

    // Convert to mono first so decimation sees one channel
    if processed.channels != target_channels && target_channels == 1 {
        processed = stereo_to_mono(processed);
    }

    if processed.sample_rate != target_sample_rate {
        processed = resample_frame(processed, target_sample_rate);
    }

    processed
}

/// Resample a mono frame to the target rate by linear interpolation.
///
/// Device rates are whatever cpal negotiates (44100 is common), so the
/// ratio is rarely an integer; interpolation keeps the output at exactly
/// the rate the WAV header will claim, preserving duration and pitch.
fn resample_frame(frame: AudioFrame, target_rate: u32) -> AudioFrame {
    if frame.sample_rate == target_rate || frame.samples.is_empty() {
        return AudioFrame {
            sample_rate: target_rate,
            ..frame
        };
    }

    let ratio = frame.sample_rate as f64 / target_rate as f64;
    let out_len =
        ((frame.samples.len() as u64 * target_rate as u64) / frame.sample_rate as u64) as usize;

    let mut resampled = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let pos = i as f64 * ratio;
        let idx = pos as usize;
        let frac = pos - idx as f64;

        let a = frame.samples[idx] as f64;
        let b = frame
            .samples
            .get(idx + 1)
            .copied()
            .unwrap_or(frame.samples[idx]) as f64;

        resampled.push((a + (b - a) * frac).round() as i16);
    }

    AudioFrame {
        samples: resampled,
        sample_rate: target_rate,
        channels: frame.channels,
        timestamp_ms: frame.timestamp_ms,
    }
}

/// Convert stereo to mono by summing channels
fn stereo_to_mono(frame: AudioFrame) -> AudioFrame {
    if frame.channels != 2 {
        return frame; // Only support stereo -> mono
    }

    let mut mono_samples = Vec::with_capacity(frame.samples.len() / 2);

    for chunk in frame.samples.chunks_exact(2) {
        let left = chunk[0] as i32;
        let right = chunk[1] as i32;
        let sum = left + right;
        let mono = sum.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        mono_samples.push(mono);
    }

    AudioFrame {
        samples: mono_samples,
        sample_rate: frame.sample_rate,
        channels: 1,
        timestamp_ms: frame.timestamp_ms,
    }
}
