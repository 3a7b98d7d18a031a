//! Configuration system for nua
//!
//! Settings come from built-in defaults, an optional YAML file, NUA_*
//! environment variables and command line flags, in increasing precedence.
//! They are loaded and validated once at startup.

mod defaults;
pub mod loader;
pub mod paths;
pub mod schema;

pub use loader::{SettingsLoader, SettingsOverrides};
pub use schema::{ReadinessConfig, Settings};
