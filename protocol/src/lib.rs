//! Shared data types for the atforge compiler and executor.
//!
//! Everything the system itself produces or exchanges is typed here: patch
//! operations, EFSM transition actions, compile reports, run summaries and
//! step traces, transport exchange results, and device discovery listings.
//! Source documents (spec/profile/manifest/extension/EFSM) stay as
//! `serde_json::Value` on purpose: the compile path must tolerate malformed
//! optional fields instead of failing deserialization.

pub mod action;
pub mod device;
pub mod patch;
pub mod report;
pub mod run;

pub use action::Action;
pub use action::step_sends;
pub use device::AdbDeviceEntry;
pub use device::AdbDeviceList;
pub use device::DebugReport;
pub use device::SerialPortEntry;
pub use device::SerialPortList;
pub use patch::PatchKind;
pub use patch::PatchOp;
pub use report::AdvisorNote;
pub use report::COMPILER_VERSION;
pub use report::CompileReport;
pub use report::CompileStats;
pub use report::PrunedTransition;
pub use run::CommandEntry;
pub use run::CoverageSummary;
pub use run::ExchangeResult;
pub use run::RunSummary;
pub use run::StepTrace;
pub use run::TransportMode;
