/*!
 * Core Module
 * Fundamental scheduling types, configuration and error handling
 */

pub mod config;
pub mod data_structures;
pub mod errors;
pub mod id;
pub mod limits;
pub mod sync;
pub mod types;

// Re-export for convenience
pub use config::SchedulerConfig;
pub use data_structures::InlineString;
pub use errors::*;
pub use id::{next_pid, Pid};
pub use types::*;
