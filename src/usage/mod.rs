pub mod escape;
pub mod ledger;

pub use escape::{escape_key, unescape_key};
pub use ledger::{monthly_allowance, CounterStore, MemoryCounterStore, UsageLedger};
