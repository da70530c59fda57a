use super::recorder::Recording;
use anyhow::{Context, Result};
use chrono::Utc;
use std::path::Path;
use tracing::info;

/// Load a WAV file as a `Recording` for an upload-triggered turn.
///
/// The file is validated with hound but uploaded byte-for-byte as read,
/// so the backend sees exactly what was on disk.
pub fn load_wav(path: &Path) -> Result<Recording> {
    let reader = hound::WavReader::open(path)
        .with_context(|| format!("failed to open WAV file {}", path.display()))?;

    let spec = reader.spec();
    let duration_secs = reader.duration() as f64 / spec.sample_rate as f64;

    let wav_bytes = std::fs::read(path)
        .with_context(|| format!("failed to read WAV file {}", path.display()))?;

    info!(
        "loaded {}: {:.1}s, {} Hz, {} ch",
        path.display(),
        duration_secs,
        spec.sample_rate,
        spec.channels
    );

    Ok(Recording {
        wav_bytes,
        mime_type: "audio/wav".to_string(),
        duration_secs,
        started_at: Utc::now(),
    })
}
