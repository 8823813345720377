//! Plinth: a plugin and component lifecycle runtime
//!
//! The [`runtime::Runtime`] composition root discovers plugin packages,
//! drives them through their lifecycle states, and creates the components
//! they and the host declare, publishing lifecycle events on a bus with
//! synchronous and pooled asynchronous delivery. Orchestration operations
//! are guarded: only tokens issued to the runtime's own call sites pass.

pub mod cli;
pub mod component;
pub mod config;
pub mod display;
pub mod errors;
pub mod events;
pub mod guard;
pub mod logging;
pub mod messages;
pub mod plugin;
pub mod runtime;
pub mod version;
