//! Display module for colour management and table output
//!
//! Renders runtime state for the command line: registered plugins with their
//! lifecycle states, created components, and creation failures.

pub mod colours;
pub mod table;

pub use colours::{ColourManager, ColourMode};
pub use table::{component_table, creation_failures, format_compact_table, plugin_table};
