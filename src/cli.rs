use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "vmprobe",
    about = "Probe and classify VM addresses through the VM.debug find diagnostic command",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

/// Where diagnostic commands are sent.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct ChannelArgs {
    /// Attach to a local VM with jcmd
    #[arg(long)]
    pub pid: Option<u32>,

    /// Replay responses from a TOML transcript instead of a live VM
    #[arg(long, value_name = "TRANSCRIPT")]
    pub replay: Option<PathBuf>,
}

/// Which extraction pattern to apply.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct PatternArgs {
    /// Use the thread header pattern (tid=0x...)
    #[arg(long)]
    pub thread: bool,

    /// Use the "waiting on <0x...> (a CLASS)" pattern
    #[arg(long, value_name = "CLASS")]
    pub lock: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExpectKind {
    Thread,
    Object,
    Unsafe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the full thread / sentinel / object / sweep scenario
    Run {
        #[command(flatten)]
        channel: ChannelArgs,

        /// Override the jcmd executable
        #[arg(long)]
        jcmd: Option<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Append a JSON-lines execution log to this file
        #[arg(long)]
        log: Option<PathBuf>,
    },

    /// Probe a single address and print its classification
    Find {
        /// Address (0x-prefixed hex) or literal argument such as -1
        #[arg(allow_hyphen_values = true)]
        address: String,

        #[command(flatten)]
        channel: ChannelArgs,

        /// Override the jcmd executable
        #[arg(long)]
        jcmd: Option<String>,

        /// Ask the VM for extended detail (VM.debug find -verbose)
        #[arg(long)]
        detail: bool,

        /// Fail unless the response classifies as this kind
        #[arg(long)]
        expect: Option<ExpectKind>,
    },

    /// Sweep the neighborhood of an address
    Sweep {
        /// Center address (0x-prefixed hex)
        address: String,

        #[command(flatten)]
        channel: ChannelArgs,

        /// Override the jcmd executable
        #[arg(long)]
        jcmd: Option<String>,

        /// Bytes to start before the center
        #[arg(long)]
        lookback: Option<u64>,

        /// Number of addresses to probe
        #[arg(long)]
        count: Option<u64>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract an address from saved Thread.print output
    Extract {
        #[command(flatten)]
        pattern: PatternArgs,

        /// Read from this file instead of stdin
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Show harness configuration
    Config {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}
