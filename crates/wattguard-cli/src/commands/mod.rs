//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `analyze` - Bill extraction with the vision model
//! - `core` - Init and shared utilities (open_db, load_split_config)
//! - `history` - Stored analysis commands (list, show, usage, delete)
//! - `savings` - Savings and forecast recalculation
//! - `serve` - Web server command
//! - `split` - Fair split calculation
//! - `tags` - Tag catalog listing

pub mod analyze;
pub mod core;
pub mod history;
pub mod savings;
pub mod serve;
pub mod split;
pub mod tags;

// Re-export command functions for main.rs
pub use analyze::*;
pub use core::*;
pub use history::*;
pub use savings::*;
pub use serve::*;
pub use split::*;
pub use tags::*;
