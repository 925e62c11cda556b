//! Probe harness for the `VM.debug find` diagnostic command.
//!
//! The harness asks a running VM to describe arbitrary addresses and checks
//! the answers: a thread address must come back as a thread, a locked object
//! as an oop with its fields, `0x0` and `-1` as unsafe, and a byte-by-byte
//! walk around real pointers must never break the command channel.

pub mod address;
pub mod channel;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod log;
pub mod oracle;
pub mod probe;
pub mod scenario;
pub mod shell_completion;
pub mod sweep;

pub use address::Address;
pub use channel::{CommandChannel, CommandOutput};
pub use error::{ChannelError, HarnessError};
pub use oracle::{Classification, Expectation, FieldMarker};
pub use scenario::{ScenarioAbort, ScenarioReport, ScenarioRunner, ScenarioSettings, ScenarioState};
