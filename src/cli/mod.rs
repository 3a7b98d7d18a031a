//! CLI command handling module
//!
//! Handles all CLI subcommands and argument parsing.

mod commands;
mod logging;
mod version;

pub use commands::{CommonArgs, KubernetesArgs, NodeArgs, run_kubernetes, run_node};
pub use logging::*;
pub use version::display_version;
