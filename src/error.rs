//! Error taxonomy for the probe harness.
//!
//! Every variant of [`HarnessError`] is terminal for the scenario that hit it.
//! Nothing in the harness retries or swallows these.

use thiserror::Error;

use crate::address::Address;

/// Failure reported by a command channel binding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("failed to spawn `{program}`: {reason}")]
    Spawn { program: String, reason: String },

    #[error("`{command}` exited with status {status:?}:\n{output}")]
    NonZeroExit {
        command: String,
        status: Option<i32>,
        output: String,
    },

    #[error("no scripted response for command `{0}`")]
    Unscripted(String),

    #[error("scripted failure for `{command}`: {reason}")]
    Scripted { command: String, reason: String },
}

/// A string that is not a base-16 address.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid hex address: {0:?}")]
pub struct AddressParseError(pub String);

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("failed to find '{pattern}' in output:\n{text}")]
    ExtractionFailure { pattern: String, text: String },

    #[error("expected {expected}, but response to `{command}` is missing {missing:?}:\n{response}")]
    ClassificationMismatch {
        expected: String,
        command: String,
        missing: String,
        response: String,
    },

    #[error("channel failed while running `{command}`")]
    ChannelFailure {
        command: String,
        #[source]
        source: ChannelError,
    },

    #[error("empty response while probing {address}")]
    EmptyResponse { address: Address },

    #[error("invalid extraction pattern '{name}': {reason}")]
    InvalidPattern { name: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_failure_keeps_source() {
        let err = HarnessError::ChannelFailure {
            command: "Thread.print".to_string(),
            source: ChannelError::Unscripted("Thread.print".to_string()),
        };
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(
            source.to_string(),
            "no scripted response for command `Thread.print`"
        );
    }

    #[test]
    fn mismatch_message_contains_full_response() {
        let err = HarnessError::ClassificationMismatch {
            expected: "thread".to_string(),
            command: "VM.debug find 0x10".to_string(),
            missing: " is a thread".to_string(),
            response: "0x10 is pointing into metadata\nline two".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("expected thread"));
        assert!(msg.contains("line two"));
    }
}
