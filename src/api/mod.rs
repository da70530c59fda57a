pub mod client;
pub mod types;

pub use client::{Backend, HttpBackend};
pub use types::{RoleInfo, TranslateRequest, Translation};
