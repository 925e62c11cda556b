//! Command channel abstraction.
//!
//! The harness never talks to the inspected VM directly. Everything goes
//! through a [`CommandChannel`]: one diagnostic command in, its complete text
//! out. Bindings:
//!
//! - [`jcmd::JcmdChannel`] attaches to a local VM by pid via the `jcmd` tool.
//! - [`scripted::ScriptedChannel`] answers from an in-memory rule table, either
//!   built in code or loaded from a TOML transcript for offline replay.

pub mod jcmd;
pub mod scripted;

use crate::error::ChannelError;

pub use jcmd::JcmdChannel;
pub use scripted::ScriptedChannel;

/// Complete result of one diagnostic command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// stdout, followed by stderr after a `--- stderr ---` separator when the
    /// command wrote any.
    pub text: String,
    pub exit_status: Option<i32>,
}

impl CommandOutput {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            exit_status: Some(0),
        }
    }
}

/// Blocking request/response transport to the inspected process.
pub trait CommandChannel {
    /// Short label for logs (e.g. `jcmd:4242`).
    fn name(&self) -> &str;

    /// Run one diagnostic command and return its complete output.
    fn execute(&mut self, command: &str) -> Result<CommandOutput, ChannelError>;
}

impl<C: CommandChannel + ?Sized> CommandChannel for Box<C> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn execute(&mut self, command: &str) -> Result<CommandOutput, ChannelError> {
        (**self).execute(command)
    }
}

pub(crate) fn combine_streams(stdout: &[u8], stderr: &[u8]) -> String {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr);
    if stderr.is_empty() {
        stdout.to_string()
    } else {
        format!("{stdout}\n--- stderr ---\n{stderr}")
    }
}
