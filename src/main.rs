use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::info;

use vmprobe::address::Address;
use vmprobe::channel::{CommandChannel, JcmdChannel, ScriptedChannel};
use vmprobe::cli::{ChannelArgs, Cli, Command, ExpectKind, PatternArgs};
use vmprobe::config::HarnessConfig;
use vmprobe::extract::{ExtractionPattern, extract};
use vmprobe::log::ExecutionLog;
use vmprobe::oracle::{self, Expectation};
use vmprobe::probe::{self, ProbeTarget};
use vmprobe::scenario::{ScenarioReport, ScenarioRunner, ScenarioSettings};
use vmprobe::shell_completion;
use vmprobe::sweep::{self, SweepReport};

fn open_channel(
    args: &ChannelArgs,
    jcmd: Option<&str>,
    config: &HarnessConfig,
) -> Result<Box<dyn CommandChannel>> {
    if let Some(path) = &args.replay {
        let channel = ScriptedChannel::from_transcript(path)?;
        info!(transcript = %path.display(), rules = channel.rule_count(), "replaying transcript");
        return Ok(Box::new(channel));
    }
    let Some(pid) = args.pid else {
        bail!("either --pid or --replay is required");
    };
    let program = JcmdChannel::resolve_program(jcmd.or(config.channel.program.as_deref()));
    info!(program = %program, pid, "attaching with jcmd");
    Ok(Box::new(JcmdChannel::new(program, pid)))
}

fn parse_address(text: &str) -> Result<Address> {
    Address::parse_hex(text).with_context(|| format!("'{text}' is not a hex address"))
}

fn push_kv(output: &mut String, key: &str, value: impl std::fmt::Display) {
    output.push_str(&format!("  {key:<20} {value}\n"));
}

fn render_sweep_human(output: &mut String, title: &str, report: &SweepReport) {
    output.push_str(title);
    output.push('\n');
    push_kv(output, "center", &report.center);
    if let (Some(first), Some(last)) = (&report.first, &report.last) {
        push_kv(output, "range", format!("{first} ..= {last}"));
    }
    push_kv(output, "probes", report.probes);
    push_kv(output, "thread", report.tally.thread);
    push_kv(output, "object", report.tally.object);
    push_kv(output, "unsafe", report.tally.unsafe_address);
    push_kv(output, "unknown", report.tally.unknown);
    push_kv(output, "empty", report.tally.empty);
}

fn render_report_human(report: &ScenarioReport) -> String {
    let mut output = String::new();
    output.push_str("Scenario\n");
    push_kv(&mut output, "result", "passed");
    if let Some(thread) = &report.thread {
        push_kv(&mut output, "thread", thread);
    }
    if let Some(object) = &report.object {
        push_kv(&mut output, "object", object);
    }
    push_kv(&mut output, "commands", report.commands);
    if let Some(sweep) = &report.thread_sweep {
        output.push('\n');
        render_sweep_human(&mut output, "Thread Sweep", sweep);
    }
    if let Some(sweep) = &report.object_sweep {
        output.push('\n');
        render_sweep_human(&mut output, "Object Sweep", sweep);
    }
    output
}

fn config_source_label(config_path: Option<&Path>) -> String {
    config_path
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(defaults — no .vmprobe/config.toml found)".to_string())
}

fn render_config_human(config: &HarnessConfig, config_path: Option<&Path>) -> String {
    let mut output = String::new();
    output.push_str("Channel\n");
    push_kv(
        &mut output,
        "program",
        JcmdChannel::resolve_program(config.channel.program.as_deref()),
    );
    output.push('\n');

    output.push_str("Sweep\n");
    push_kv(&mut output, "lookback", config.sweep.lookback);
    push_kv(&mut output, "count", config.sweep.count);
    push_kv(&mut output, "sweep_thread", config.sweep.sweep_thread);
    push_kv(&mut output, "reject_empty", config.sweep.reject_empty);
    output.push('\n');

    output.push_str("Fixture\n");
    push_kv(&mut output, "lock_class", &config.fixture.lock_class);
    push_kv(&mut output, "field", config.fixture.field_marker());
    output.push('\n');

    output.push_str("Log\n");
    push_kv(
        &mut output,
        "path",
        config
            .log
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(disabled)".to_string()),
    );
    output.push('\n');

    output.push_str("Source Path\n");
    push_kv(&mut output, "path", config_source_label(config_path));

    output
}

fn render_config_json(config: &HarnessConfig, config_path: Option<&Path>) -> Result<String> {
    let payload = serde_json::json!({
        "config": config,
        "source_path": config_source_label(config_path)
    });
    serde_json::to_string_pretty(&payload).context("failed to serialize config to JSON")
}

fn run_scenario(
    channel: &mut dyn CommandChannel,
    config: &HarnessConfig,
    log: Option<&ExecutionLog>,
    json: bool,
) -> Result<()> {
    let mut runner = ScenarioRunner::new(channel, ScenarioSettings::from_config(config));
    if let Some(log) = log {
        runner = runner.with_log(log);
    }
    let report = runner.run()?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("failed to serialize report")?
        );
    } else {
        print!("{}", render_report_human(&report));
    }
    Ok(())
}

fn find(
    channel: &mut dyn CommandChannel,
    config: &HarnessConfig,
    address: &str,
    detail: bool,
    expect: Option<ExpectKind>,
) -> Result<()> {
    let target = ProbeTarget::parse(address);
    let response = probe::probe(channel, &target, detail)?;
    print!("{}", response.text);
    if !response.text.ends_with('\n') {
        println!();
    }
    println!("classification: {}", oracle::classify(&response));

    if let Some(kind) = expect {
        let expected = match kind {
            ExpectKind::Thread => Expectation::Thread { verbose: detail },
            ExpectKind::Object => Expectation::ManagedObject {
                field: Some(config.fixture.field_marker()),
            },
            ExpectKind::Unsafe => Expectation::Unsafe,
        };
        oracle::assert_classification(&response, &expected)?;
        println!("expectation met: {expected}");
    }
    Ok(())
}

fn extract_from_input(pattern: &PatternArgs, input: Option<&Path>) -> Result<()> {
    let text = match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            buf
        }
    };
    let pattern = match &pattern.lock {
        Some(class) => ExtractionPattern::waiting_on(class),
        None => ExtractionPattern::thread_id(),
    };
    let address = extract(&text, &pattern)?;
    println!("{address}");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let is_quiet_command = matches!(
        &cli.command,
        Command::Config { .. } | Command::Completions { .. } | Command::Extract { .. }
    );

    let filter = match cli.verbose {
        0 if is_quiet_command => "vmprobe=warn",
        0 => "vmprobe=info",
        1 => "vmprobe=debug",
        _ => "vmprobe=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cwd = std::env::current_dir().context("failed to get current directory (was it deleted?)")?;
    let (config, config_path) = HarnessConfig::load(&cwd)?;

    if !is_quiet_command || cli.verbose > 0 {
        match config_path {
            Some(ref p) => info!("loaded config from {}", p.display()),
            None => info!("no .vmprobe/config.toml found, using defaults"),
        }
    }

    match cli.command {
        Command::Run {
            channel,
            jcmd,
            json,
            log,
        } => {
            let mut channel = open_channel(&channel, jcmd.as_deref(), &config)?;
            let log = match log.or_else(|| config.log.path.clone()) {
                Some(path) => Some(ExecutionLog::new(&path)?),
                None => None,
            };
            if let Some(log) = &log {
                info!(path = %log.path().display(), run_id = %log.run_id(), "execution log");
            }
            run_scenario(channel.as_mut(), &config, log.as_ref(), json)?;
        }
        Command::Find {
            address,
            channel,
            jcmd,
            detail,
            expect,
        } => {
            let mut channel = open_channel(&channel, jcmd.as_deref(), &config)?;
            find(channel.as_mut(), &config, &address, detail, expect)?;
        }
        Command::Sweep {
            address,
            channel,
            jcmd,
            lookback,
            count,
            json,
        } => {
            let center = parse_address(&address)?;
            let mut settings = config.sweep.settings();
            if let Some(lookback) = lookback {
                settings.lookback = lookback;
            }
            if let Some(count) = count {
                settings.count = count;
            }
            let mut channel = open_channel(&channel, jcmd.as_deref(), &config)?;
            let report = sweep::sweep(channel.as_mut(), &center, &settings)?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&report).context("failed to serialize report")?
                );
            } else {
                let mut output = String::new();
                render_sweep_human(&mut output, "Sweep", &report);
                print!("{output}");
            }
        }
        Command::Extract { pattern, input } => {
            extract_from_input(&pattern, input.as_deref())?;
        }
        Command::Config { json } => {
            if json {
                println!("{}", render_config_json(&config, config_path.as_deref())?);
            } else {
                print!("{}", render_config_human(&config, config_path.as_deref()));
            }
        }
        Command::Completions { shell } => shell_completion::print(shell)?,
    }

    Ok(())
}
