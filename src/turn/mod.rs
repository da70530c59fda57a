pub mod events;
pub mod options;
pub mod orchestrator;

pub use events::{TurnEvent, TurnPhase};
pub use options::TurnOptions;
pub use orchestrator::{TurnOrchestrator, TurnResult};
