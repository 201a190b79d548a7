//! CLI command handlers
//!
//! - serve: sync loops plus the HTTP surface
//! - sync: one-shot publish or harvest cycle
//! - info: effective configuration

pub mod info;
pub mod serve;
pub mod sync;

pub use info::*;
pub use serve::*;
pub use sync::*;
