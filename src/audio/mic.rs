use super::backend::{AudioFrame, CaptureBackend, CaptureConfig};
use crate::error::TurnError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

/// Microphone capture backend built on cpal.
///
/// The cpal stream is not `Send`, so it lives on a dedicated OS thread for
/// the whole capture. The thread forwards interleaved i16 frames over an
/// mpsc channel and drops the stream (releasing the hardware) as soon as
/// the stop flag is raised.
pub struct MicBackend {
    config: CaptureConfig,
    stop_flag: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl MicBackend {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            stop_flag: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }

    /// List input device names, marking the default.
    pub fn list_input_devices() -> Result<Vec<String>, TurnError> {
        let host = cpal::default_host();
        let default_name = host
            .default_input_device()
            .and_then(|d| d.name().ok())
            .unwrap_or_default();

        let devices = host
            .input_devices()
            .map_err(|e| TurnError::DeviceUnavailable(e.to_string()))?;

        let mut names = Vec::new();
        for device in devices {
            let name = device.name().unwrap_or_else(|_| "unknown".to_string());
            if name == default_name {
                names.push(format!("{} (default)", name));
            } else {
                names.push(name);
            }
        }

        Ok(names)
    }
}

#[async_trait::async_trait]
impl CaptureBackend for MicBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, TurnError> {
        if self.is_capturing() {
            return Err(TurnError::Busy);
        }

        self.stop_flag = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&self.stop_flag);
        let buffer_duration_ms = self.config.buffer_duration_ms;

        let (frame_tx, frame_rx) = mpsc::channel(64);
        let (ready_tx, ready_rx) = oneshot::channel();

        let handle = std::thread::spawn(move || {
            run_capture(stop_flag, frame_tx, ready_tx, buffer_duration_ms);
        });

        // Wait for the thread to report whether the device opened. On
        // failure the thread has already exited and nothing is left open.
        match ready_rx.await {
            Ok(Ok(())) => {
                info!("microphone capture started");
                self.thread = Some(handle);
                Ok(frame_rx)
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(TurnError::DeviceUnavailable(
                    "capture thread exited before the device opened".to_string(),
                ))
            }
        }
    }

    async fn stop(&mut self) -> Result<(), TurnError> {
        self.stop_flag.store(true, Ordering::SeqCst);

        if let Some(handle) = self.thread.take() {
            let join = tokio::task::spawn_blocking(move || handle.join());
            match join.await {
                Ok(Ok(())) => info!("microphone capture stopped"),
                Ok(Err(_)) => error!("capture thread panicked"),
                Err(e) => error!("failed to join capture thread: {}", e),
            }
        }

        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.thread.is_some()
    }

    fn name(&self) -> &str {
        "cpal-microphone"
    }
}

impl Drop for MicBackend {
    fn drop(&mut self) {
        // Raise the flag so a leaked backend still releases the device;
        // the thread detaches and exits on its own.
        self.stop_flag.store(true, Ordering::SeqCst);
    }
}

/// Body of the capture thread: open the device, report readiness, then
/// hold the stream until the stop flag is raised.
fn run_capture(
    stop_flag: Arc<AtomicBool>,
    frame_tx: mpsc::Sender<AudioFrame>,
    ready_tx: oneshot::Sender<Result<(), TurnError>>,
    buffer_duration_ms: u64,
) {
    let stream = match open_stream(frame_tx, buffer_duration_ms) {
        Ok(stream) => {
            let _ = ready_tx.send(Ok(()));
            stream
        }
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    while !stop_flag.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(25));
    }

    // Dropping the stream stops the underlying hardware tracks.
    drop(stream);
}

fn open_stream(
    frame_tx: mpsc::Sender<AudioFrame>,
    buffer_duration_ms: u64,
) -> Result<cpal::Stream, TurnError> {
    let host = cpal::default_host();

    let device = host.default_input_device().ok_or_else(|| {
        TurnError::DeviceUnavailable("no default input device found".to_string())
    })?;

    let supported = device
        .default_input_config()
        .map_err(|e| TurnError::DeviceUnavailable(e.to_string()))?;

    let sample_format = supported.sample_format();
    let stream_config: cpal::StreamConfig = supported.config();

    info!(
        "opening input device '{}' ({} Hz, {} ch, {:?})",
        device.name().unwrap_or_else(|_| "unknown".to_string()),
        stream_config.sample_rate.0,
        stream_config.channels,
        sample_format
    );

    let stream = match sample_format {
        cpal::SampleFormat::F32 => {
            build_stream::<f32>(&device, &stream_config, buffer_duration_ms, frame_tx)?
        }
        cpal::SampleFormat::I16 => {
            build_stream::<i16>(&device, &stream_config, buffer_duration_ms, frame_tx)?
        }
        cpal::SampleFormat::U16 => {
            build_stream::<u16>(&device, &stream_config, buffer_duration_ms, frame_tx)?
        }
        other => {
            return Err(TurnError::DeviceUnavailable(format!(
                "unsupported input sample format: {:?}",
                other
            )))
        }
    };

    stream.play().map_err(|e| match e {
        cpal::PlayStreamError::DeviceNotAvailable => {
            TurnError::DeviceUnavailable("input device disappeared".to_string())
        }
        other => TurnError::PermissionDenied(other.to_string()),
    })?;

    Ok(stream)
}

fn build_stream<T>(
    device: &cpal::Device,
    stream_config: &cpal::StreamConfig,
    buffer_duration_ms: u64,
    frame_tx: mpsc::Sender<AudioFrame>,
) -> Result<cpal::Stream, TurnError>
where
    T: cpal::SizedSample + Send + 'static,
    f32: cpal::FromSample<T>,
{
    let sample_rate = stream_config.sample_rate.0;
    let channels = stream_config.channels;

    // Interleaved samples per buffered frame.
    let frame_len =
        ((sample_rate as u64 * channels as u64 * buffer_duration_ms) / 1000).max(1) as usize;

    let mut pending: Vec<i16> = Vec::with_capacity(frame_len);
    let mut sent_samples: u64 = 0;

    let stream = device
        .build_input_stream(
            stream_config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                for &sample in data {
                    let value: f32 = cpal::Sample::from_sample(sample);
                    pending.push((value.clamp(-1.0, 1.0) * i16::MAX as f32) as i16);

                    if pending.len() >= frame_len {
                        let samples = std::mem::take(&mut pending);
                        let timestamp_ms =
                            sent_samples * 1000 / (sample_rate as u64 * channels as u64);
                        sent_samples += samples.len() as u64;

                        let frame = AudioFrame {
                            samples,
                            sample_rate,
                            channels,
                            timestamp_ms,
                        };

                        // The consumer is behind; dropping a frame is better
                        // than blocking inside the audio callback.
                        if frame_tx.try_send(frame).is_err() {
                            warn!("dropping audio frame: channel full or closed");
                        }
                    }
                }
            },
            move |err| {
                error!("input stream error: {}", err);
            },
            None,
        )
        .map_err(|e| match e {
            cpal::BuildStreamError::DeviceNotAvailable => {
                TurnError::DeviceUnavailable("input device disappeared".to_string())
            }
            cpal::BuildStreamError::StreamConfigNotSupported => {
                TurnError::DeviceUnavailable("input config not supported".to_string())
            }
            other => TurnError::PermissionDenied(other.to_string()),
        })?;

    Ok(stream)
}
