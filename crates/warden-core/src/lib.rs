pub mod config;
pub mod error;
pub mod types;

pub use config::{AuditFailureMode, WardenConfig};
pub use error::{Result, WardenError};
pub use types::*;
