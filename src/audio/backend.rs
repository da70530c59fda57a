use crate::error::TurnError;
use tokio::sync::mpsc;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Configuration for a capture backend
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Target sample rate (device audio is downsampled to this)
    pub target_sample_rate: u32,
    /// Target channel count (1 = mono, 2 = stereo)
    pub target_channels: u16,
    /// Buffer size in milliseconds (affects latency)
    pub buffer_duration_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16000, // 16kHz, what the transcription models expect
            target_channels: 1,        // Mono
            buffer_duration_ms: 100,   // 100ms buffers
        }
    }
}

/// Audio capture backend trait
///
/// The microphone backend owns the device handle exclusively for the
/// duration of one capture; `stop()` must release it on every path so the
/// OS recording indicator always clears.
#[async_trait::async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive audio frames. Fails
    /// with `DeviceUnavailable` when no input device exists and
    /// `PermissionDenied` when the OS refuses the stream; on failure no
    /// partial capture remains.
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, TurnError>;

    /// Stop capturing and release the device. Idempotent.
    async fn stop(&mut self) -> Result<(), TurnError>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Capture backend factory
pub struct CaptureBackendFactory;

impl CaptureBackendFactory {
    /// Create the microphone backend.
    pub fn create(config: CaptureConfig) -> Box<dyn CaptureBackend> {
        Box::new(super::mic::MicBackend::new(config))
    }
}
