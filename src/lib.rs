//! idlecat - pipe stdin to stdout while watching for activity transitions.
//!
//! Classifies the relayed stream as IDLE or ACTIVE from inter-arrival gaps
//! and runs user-supplied shell commands on qualifying transitions and on
//! end-of-stream.

pub mod config;
pub mod hooks;
pub mod monitor;
pub mod state;

pub use config::Config;
pub use hooks::ShellHooks;
pub use monitor::Monitor;
