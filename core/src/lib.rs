//! Core engine: document store, JSON pointer/patch, spec merge, scope
//! compiler, config-change agent, MBT executor, transports, settings.
//!
//! The compile path is deliberately tolerant: malformed optional fields in
//! the source documents degrade to empty values and surface in the report,
//! never as errors. Errors are reserved for store I/O, patch application,
//! validation, and the agent-runner boundary.

// Library output goes through tracing; the CLI owns stdout.
#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod agent;
pub mod compile;
pub mod config_agent;
pub mod defaults;
mod docs;
pub mod error;
pub mod executor;
pub mod merge;
pub mod patch;
pub mod pointer;
pub mod settings;
pub mod store;
pub mod template;
pub mod transport;
pub mod validate;

pub use agent::AgentRunner;
pub use agent::NullAgentRunner;
pub use compile::CompileOutput;
pub use compile::compile_assets;
pub use config_agent::ConfigProposal;
pub use config_agent::propose_config_change;
pub use error::AtForgeError;
pub use error::Result;
pub use executor::plan_transitions;
pub use executor::run;
pub use settings::Settings;
pub use store::DocumentStore;
pub use store::SaveMode;
pub use transport::AdbTransport;
pub use transport::SerialConfig;
pub use transport::SerialTransport;
pub use transport::Transport;
pub use transport::debug_checks;
pub use transport::list_adb_devices;
pub use transport::list_serial_ports;
