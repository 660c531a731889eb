//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod analyze;
pub mod auth;
pub mod history;
pub mod savings;
pub mod sessions;
pub mod split;
pub mod tags;

// Re-export all handlers for use in router
pub use analyze::*;
pub use auth::*;
pub use history::*;
pub use savings::*;
pub use sessions::*;
pub use split::*;
pub use tags::*;
