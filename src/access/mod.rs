pub mod context;
pub mod gate;

pub use context::SessionContext;
pub use gate::{AccessGate, Capability, PlanTier, Role, UpgradePrompt};
