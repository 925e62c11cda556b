//! In-process channel answering from a rule table.
//!
//! Rules are checked in insertion order and the first one whose matcher
//! accepts the command answers it. The same table can be loaded from a TOML
//! transcript so a captured session can be replayed without a live VM:
//!
//! ```toml
//! [[rule]]
//! command = "Thread.print"
//! output = """
//! "main" #1 prio=5 tid=0x1a2b3c nid=0x42 in Object.wait()
//! """
//!
//! [[rule]]
//! prefix = "VM.debug find 0x"
//! output = "0x7ffe0010 is an unknown value"
//! ```

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use super::{CommandChannel, CommandOutput};
use crate::error::ChannelError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Matcher {
    Exact(String),
    Prefix(String),
}

impl Matcher {
    fn accepts(&self, command: &str) -> bool {
        match self {
            Matcher::Exact(expected) => command == expected,
            Matcher::Prefix(prefix) => command.starts_with(prefix.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Reply {
    Output(CommandOutput),
    Fail(String),
}

pub struct ScriptedChannel {
    label: String,
    rules: Vec<(Matcher, Reply)>,
    history: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Transcript {
    #[serde(default)]
    rule: Vec<TranscriptRule>,
}

#[derive(Debug, Deserialize)]
struct TranscriptRule {
    command: Option<String>,
    prefix: Option<String>,
    #[serde(default)]
    output: String,
    exit_status: Option<i32>,
    fail: Option<String>,
}

impl ScriptedChannel {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            rules: Vec::new(),
            history: Vec::new(),
        }
    }

    /// Answer `command` exactly with `text`.
    pub fn exact(mut self, command: &str, text: &str) -> Self {
        self.rules.push((
            Matcher::Exact(command.to_string()),
            Reply::Output(CommandOutput::ok(text)),
        ));
        self
    }

    /// Answer every command starting with `prefix` with `text`.
    pub fn prefix(mut self, prefix: &str, text: &str) -> Self {
        self.rules.push((
            Matcher::Prefix(prefix.to_string()),
            Reply::Output(CommandOutput::ok(text)),
        ));
        self
    }

    /// Fail `command` at the channel level.
    pub fn fail(mut self, command: &str, reason: &str) -> Self {
        self.rules.push((
            Matcher::Exact(command.to_string()),
            Reply::Fail(reason.to_string()),
        ));
        self
    }

    /// Load rules from a TOML transcript file.
    pub fn from_transcript(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read transcript {}", path.display()))?;
        Self::parse_transcript(&path.display().to_string(), &contents)
            .with_context(|| format!("failed to parse transcript {}", path.display()))
    }

    pub fn parse_transcript(label: &str, contents: &str) -> Result<Self> {
        let transcript: Transcript = toml::from_str(contents)?;
        let mut channel = Self::new(label);
        for (index, rule) in transcript.rule.into_iter().enumerate() {
            let matcher = match (rule.command, rule.prefix) {
                (Some(command), None) => Matcher::Exact(command),
                (None, Some(prefix)) => Matcher::Prefix(prefix),
                _ => bail!("rule {index} must set exactly one of `command` or `prefix`"),
            };
            let reply = match rule.fail {
                Some(reason) => Reply::Fail(reason),
                None => Reply::Output(CommandOutput {
                    text: rule.output,
                    exit_status: Some(rule.exit_status.unwrap_or(0)),
                }),
            };
            channel.rules.push((matcher, reply));
        }
        Ok(channel)
    }

    /// Every command received so far, in order.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

impl CommandChannel for ScriptedChannel {
    fn name(&self) -> &str {
        &self.label
    }

    fn execute(&mut self, command: &str) -> Result<CommandOutput, ChannelError> {
        self.history.push(command.to_string());
        let reply = self
            .rules
            .iter()
            .find(|(matcher, _)| matcher.accepts(command))
            .map(|(_, reply)| reply.clone());

        match reply {
            Some(Reply::Output(output)) => Ok(output),
            Some(Reply::Fail(reason)) => Err(ChannelError::Scripted {
                command: command.to_string(),
                reason,
            }),
            None => Err(ChannelError::Unscripted(command.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_matching_rule_wins() {
        let mut channel = ScriptedChannel::new("t")
            .exact("VM.debug find 0x0", "address not safe")
            .prefix("VM.debug find ", "0x10 is an unknown value");
        assert_eq!(
            channel.execute("VM.debug find 0x0").unwrap().text,
            "address not safe"
        );
        assert_eq!(
            channel.execute("VM.debug find 0x10").unwrap().text,
            "0x10 is an unknown value"
        );
    }

    #[test]
    fn unscripted_command_fails() {
        let mut channel = ScriptedChannel::new("t");
        assert_eq!(
            channel.execute("Thread.print").unwrap_err(),
            ChannelError::Unscripted("Thread.print".to_string())
        );
    }

    #[test]
    fn scripted_failure() {
        let mut channel = ScriptedChannel::new("t").fail("Thread.print", "VM exited");
        assert!(matches!(
            channel.execute("Thread.print"),
            Err(ChannelError::Scripted { .. })
        ));
    }

    #[test]
    fn records_history() {
        let mut channel = ScriptedChannel::new("t").prefix("", "ok");
        channel.execute("Thread.print").unwrap();
        channel.execute("VM.debug find 0x0").unwrap();
        assert_eq!(channel.history(), ["Thread.print", "VM.debug find 0x0"]);
    }

    #[test]
    fn parses_transcript() {
        let toml = r#"
[[rule]]
command = "Thread.print"
output = "tid=0x10 "

[[rule]]
prefix = "VM.debug find"
output = "gone"
exit_status = 3

[[rule]]
command = "VM.version"
fail = "attach refused"
"#;
        let mut channel = ScriptedChannel::parse_transcript("replay", toml).unwrap();
        assert_eq!(channel.rule_count(), 3);
        assert_eq!(channel.execute("Thread.print").unwrap().text, "tid=0x10 ");
        let out = channel.execute("VM.debug find 0x1").unwrap();
        assert_eq!(out.exit_status, Some(3));
        assert!(channel.execute("VM.version").is_err());
    }

    #[test]
    fn transcript_rule_needs_one_matcher() {
        let both = r#"
[[rule]]
command = "a"
prefix = "b"
"#;
        assert!(ScriptedChannel::parse_transcript("x", both).is_err());
        let neither = r#"
[[rule]]
output = "x"
"#;
        assert!(ScriptedChannel::parse_transcript("x", neither).is_err());
    }

    #[test]
    fn loads_transcript_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("session.toml");
        std::fs::write(&path, "[[rule]]\ncommand = \"Thread.print\"\noutput = \"dump\"\n").unwrap();
        let mut channel = ScriptedChannel::from_transcript(&path).unwrap();
        assert_eq!(channel.execute("Thread.print").unwrap().text, "dump");
    }
}
