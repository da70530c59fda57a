// Integration tests for the recording controller.
//
// The one invariant worth testing precisely: every call path that stops a
// session must release the capture device, and must release it exactly
// once. A scripted capture backend counts releases.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use voiceturn::{AudioFrame, CaptureBackend, CaptureConfig, Recorder, TurnError};

/// Capture backend that feeds pre-scripted frames and counts releases.
struct ScriptedCapture {
    frames: Vec<AudioFrame>,
    fail_start: Option<TurnError>,
    releases: Arc<AtomicUsize>,
    tx: Option<mpsc::Sender<AudioFrame>>,
}

impl ScriptedCapture {
    fn new(frames: Vec<AudioFrame>) -> (Self, Arc<AtomicUsize>) {
        let releases = Arc::new(AtomicUsize::new(0));
        (
            Self {
                frames,
                fail_start: None,
                releases: Arc::clone(&releases),
                tx: None,
            },
            releases,
        )
    }

    fn failing(error: TurnError) -> (Self, Arc<AtomicUsize>) {
        let (mut capture, releases) = Self::new(Vec::new());
        capture.fail_start = Some(error);
        (capture, releases)
    }
}

#[async_trait::async_trait]
impl CaptureBackend for ScriptedCapture {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, TurnError> {
        if let Some(error) = self.fail_start.take() {
            return Err(error);
        }

        let (tx, rx) = mpsc::channel(64);
        for frame in self.frames.drain(..) {
            tx.try_send(frame).expect("scripted frame channel overflow");
        }
        // Keep the sender alive until stop() so the collector stays open.
        self.tx = Some(tx);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), TurnError> {
        if self.tx.take().is_some() {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.tx.is_some()
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn mono_frame(samples: Vec<i16>, timestamp_ms: u64) -> AudioFrame {
    AudioFrame {
        samples,
        sample_rate: 16000,
        channels: 1,
        timestamp_ms,
    }
}

fn recorder_with(capture: ScriptedCapture) -> Recorder {
    Recorder::with_backend(Box::new(capture), CaptureConfig::default())
}

#[tokio::test]
async fn stop_releases_device_exactly_once() {
    let (capture, releases) = ScriptedCapture::new(vec![mono_frame(vec![1i16; 1600], 0)]);
    let mut recorder = recorder_with(capture);

    recorder.start().await.unwrap();
    assert!(recorder.is_active());

    let recording = recorder.stop().await.unwrap();
    assert_eq!(releases.load(Ordering::SeqCst), 1);
    assert_eq!(recording.mime_type, "audio/wav");
    assert!(!recorder.is_active());

    // A second stop has no session to release.
    let err = recorder.stop().await.unwrap_err();
    assert!(matches!(err, TurnError::NoActiveRecording));
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_start_leaves_no_partial_session() {
    let (capture, releases) =
        ScriptedCapture::failing(TurnError::PermissionDenied("declined".to_string()));
    let mut recorder = recorder_with(capture);

    let err = recorder.start().await.unwrap_err();
    assert!(matches!(err, TurnError::PermissionDenied(_)));
    assert!(!recorder.is_active());

    // Stop after a failed start must not release anything a second time;
    // the device was never acquired.
    let err = recorder.stop().await.unwrap_err();
    assert!(matches!(err, TurnError::NoActiveRecording));
    assert_eq!(releases.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn second_start_is_rejected_while_active() {
    let (capture, releases) = ScriptedCapture::new(Vec::new());
    let mut recorder = recorder_with(capture);

    recorder.start().await.unwrap();
    let err = recorder.start().await.unwrap_err();
    assert!(matches!(err, TurnError::Busy));

    recorder.stop().await.unwrap();
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cancel_releases_device_without_a_recording() {
    let (capture, releases) = ScriptedCapture::new(vec![mono_frame(vec![5i16; 160], 0)]);
    let mut recorder = recorder_with(capture);

    recorder.start().await.unwrap();
    recorder.cancel().await.unwrap();

    assert!(!recorder.is_active());
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn captured_frames_come_back_as_wav() {
    let first: Vec<i16> = (0..1600).map(|i| (i % 100) as i16).collect();
    let second: Vec<i16> = vec![42i16; 1600];

    let (capture, _) = ScriptedCapture::new(vec![
        mono_frame(first.clone(), 0),
        mono_frame(second.clone(), 100),
    ]);
    let mut recorder = recorder_with(capture);

    recorder.start().await.unwrap();
    let recording = recorder.stop().await.unwrap();

    let mut reader = hound::WavReader::new(std::io::Cursor::new(recording.wav_bytes)).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.sample_rate, 16000);
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.bits_per_sample, 16);

    let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    let mut expected = first;
    expected.extend(second);
    assert_eq!(samples, expected);

    assert!((recording.duration_secs - 0.2).abs() < 1e-9);
}

#[tokio::test]
async fn device_rate_audio_keeps_its_duration() {
    // One second of mono audio at the common 44100 Hz device rate. The
    // ratio to 16000 Hz is not an integer; the encoded WAV must still hold
    // exactly one second at the rate its header claims.
    let frame = AudioFrame {
        samples: vec![1000i16; 44100],
        sample_rate: 44100,
        channels: 1,
        timestamp_ms: 0,
    };

    let (capture, _) = ScriptedCapture::new(vec![frame]);
    let mut recorder = recorder_with(capture);

    recorder.start().await.unwrap();
    let recording = recorder.stop().await.unwrap();

    let mut reader = hound::WavReader::new(std::io::Cursor::new(recording.wav_bytes)).unwrap();
    assert_eq!(reader.spec().sample_rate, 16000);

    let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(samples.len(), 16000);
    assert!(samples.iter().all(|&s| s == 1000));
    assert!((recording.duration_secs - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn stereo_input_is_mixed_down_and_downsampled() {
    // One 48kHz stereo frame: 4800 interleaved samples = 50ms.
    let samples: Vec<i16> = vec![100i16; 4800];
    let frame = AudioFrame {
        samples,
        sample_rate: 48000,
        channels: 2,
        timestamp_ms: 0,
    };

    let (capture, _) = ScriptedCapture::new(vec![frame]);
    let mut recorder = recorder_with(capture);

    recorder.start().await.unwrap();
    let recording = recorder.stop().await.unwrap();

    let mut reader = hound::WavReader::new(std::io::Cursor::new(recording.wav_bytes)).unwrap();
    let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();

    // 4800 interleaved -> 2400 mono at 48kHz -> 800 at 16kHz, summed channels.
    assert_eq!(samples.len(), 800);
    assert!(samples.iter().all(|&s| s == 200));
}
