pub mod backend;
pub mod file;
pub mod gesture;
pub mod mic;
pub mod recorder;

pub use backend::{AudioFrame, CaptureBackend, CaptureBackendFactory, CaptureConfig};
pub use gesture::{DoublePress, HoldGesture, HoldOutcome};
pub use mic::MicBackend;
pub use recorder::{Recorder, Recording};
