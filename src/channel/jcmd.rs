//! `jcmd` binding: attach to a local VM by process id.

use std::path::Path;
use std::process::Command;

use tracing::{debug, trace};

use super::{CommandChannel, CommandOutput, combine_streams};
use crate::error::ChannelError;

const DEFAULT_PROGRAM: &str = "jcmd";

/// Runs `<program> <pid> <command...>` once per request.
#[derive(Debug, Clone)]
pub struct JcmdChannel {
    program: String,
    pid: u32,
    label: String,
}

impl JcmdChannel {
    pub fn new(program: impl Into<String>, pid: u32) -> Self {
        Self {
            program: program.into(),
            pid,
            label: format!("jcmd:{pid}"),
        }
    }

    /// Pick the `jcmd` executable: explicit override, then `$JAVA_HOME/bin/jcmd`,
    /// then whatever `jcmd` resolves to on `PATH`.
    pub fn resolve_program(configured: Option<&str>) -> String {
        if let Some(program) = configured {
            return program.to_string();
        }
        if let Some(home) = std::env::var_os("JAVA_HOME") {
            let candidate = Path::new(&home).join("bin").join(DEFAULT_PROGRAM);
            if candidate.is_file() {
                return candidate.display().to_string();
            }
        }
        DEFAULT_PROGRAM.to_string()
    }
}

impl CommandChannel for JcmdChannel {
    fn name(&self) -> &str {
        &self.label
    }

    fn execute(&mut self, command: &str) -> Result<CommandOutput, ChannelError> {
        debug!(channel = %self.label, command = %command, "executing");

        let output = Command::new(&self.program)
            .arg(self.pid.to_string())
            .args(command.split_whitespace())
            .output()
            .map_err(|e| ChannelError::Spawn {
                program: self.program.clone(),
                reason: e.to_string(),
            })?;

        let text = combine_streams(&output.stdout, &output.stderr);
        let exit_status = output.status.code();
        trace!(exit_status = ?exit_status, output_len = text.len(), "command finished");

        // jcmd exits non-zero when the target VM is gone or refuses the attach.
        if !output.status.success() {
            return Err(ChannelError::NonZeroExit {
                command: command.to_string(),
                status: exit_status,
                output: text,
            });
        }

        Ok(CommandOutput { text, exit_status })
    }
}
