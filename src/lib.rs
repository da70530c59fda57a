pub mod access;
pub mod api;
pub mod audio;
pub mod config;
pub mod error;
pub mod turn;
pub mod usage;

pub use access::{AccessGate, Capability, PlanTier, Role, SessionContext, UpgradePrompt};
pub use api::{Backend, HttpBackend, RoleInfo, TranslateRequest, Translation};
pub use audio::{
    AudioFrame, CaptureBackend, CaptureBackendFactory, CaptureConfig, DoublePress, HoldGesture,
    HoldOutcome, MicBackend, Recorder, Recording,
};
pub use config::Config;
pub use error::TurnError;
pub use turn::{TurnEvent, TurnOptions, TurnOrchestrator, TurnPhase, TurnResult};
pub use usage::{escape_key, unescape_key, MemoryCounterStore, UsageLedger};
