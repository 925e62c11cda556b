//! `VM.debug find` probes.

use std::fmt;

use tracing::debug;

use crate::address::Address;
use crate::channel::CommandChannel;
use crate::error::HarnessError;

pub const THREAD_PRINT: &str = "Thread.print";
const FIND: &str = "VM.debug find";

/// What to put after `VM.debug find`.
///
/// `Literal` is passed through untouched so the VM's own argument parsing is
/// exercised (`-1` must reach it as `-1`, not as a reformatted number).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeTarget {
    Address(Address),
    Literal(String),
}

impl ProbeTarget {
    pub fn null() -> Self {
        ProbeTarget::Address(Address::zero())
    }

    pub fn minus_one() -> Self {
        ProbeTarget::Literal("-1".to_string())
    }

    /// Parse a user-supplied target. Anything that is not hex is kept literal.
    pub fn parse(text: &str) -> Self {
        match Address::parse_hex(text) {
            Ok(address) if text.trim().starts_with("0x") || text.trim().starts_with("0X") => {
                ProbeTarget::Address(address)
            }
            _ => ProbeTarget::Literal(text.trim().to_string()),
        }
    }
}

impl From<Address> for ProbeTarget {
    fn from(address: Address) -> Self {
        ProbeTarget::Address(address)
    }
}

impl fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeTarget::Address(address) => write!(f, "{address}"),
            ProbeTarget::Literal(text) => f.write_str(text),
        }
    }
}

/// Raw text returned for one probe. Only the oracle looks inside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub command: String,
    pub verbose: bool,
    pub text: String,
}

pub fn find_command(target: &ProbeTarget, verbose: bool) -> String {
    if verbose {
        format!("{FIND} -verbose {target}")
    } else {
        format!("{FIND} {target}")
    }
}

/// Run one command, mapping channel errors to [`HarnessError::ChannelFailure`].
pub fn run(channel: &mut dyn CommandChannel, command: &str) -> Result<String, HarnessError> {
    channel
        .execute(command)
        .map(|output| output.text)
        .map_err(|source| HarnessError::ChannelFailure {
            command: command.to_string(),
            source,
        })
}

pub fn thread_print(channel: &mut dyn CommandChannel) -> Result<String, HarnessError> {
    run(channel, THREAD_PRINT)
}

pub fn probe(
    channel: &mut dyn CommandChannel,
    target: &ProbeTarget,
    verbose: bool,
) -> Result<ProbeResponse, HarnessError> {
    let command = find_command(target, verbose);
    let text = run(channel, &command)?;
    debug!(command = %command, response_len = text.len(), "probe answered");
    Ok(ProbeResponse {
        command,
        verbose,
        text,
    })
}
