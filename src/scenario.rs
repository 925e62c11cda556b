//! End-to-end `VM.debug find` scenario.
//!
//! ## State machine
//!
//! ```text
//! Init
//!  → ThreadAddressFound    Thread.print, extract a tid
//!  → ThreadClassified      plain + verbose probe, optional sweep
//!  → BadAddressesChecked   0x0 and -1 are unsafe
//!  → ObjectAddressFound    Thread.print, extract the waited-on lock
//!  → ObjectClassified      probe shows the oop and its field
//!  → NeighborhoodSwept     sweep around the lock
//!  → Done
//! ```
//!
//! The first failure aborts the run in the state it was reached in. Nothing
//! is retried.

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::address::Address;
use crate::channel::CommandChannel;
use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::extract::{ExtractionPattern, extract};
use crate::log::{ExecutionLog, LogEvent};
use crate::oracle::{self, Expectation, FieldMarker};
use crate::probe::{self, ProbeTarget, THREAD_PRINT};
use crate::sweep::{self, SweepReport, SweepSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioState {
    Init,
    ThreadAddressFound,
    ThreadClassified,
    BadAddressesChecked,
    ObjectAddressFound,
    ObjectClassified,
    NeighborhoodSwept,
    Done,
}

impl ScenarioState {
    pub fn next(self) -> Self {
        match self {
            ScenarioState::Init => ScenarioState::ThreadAddressFound,
            ScenarioState::ThreadAddressFound => ScenarioState::ThreadClassified,
            ScenarioState::ThreadClassified => ScenarioState::BadAddressesChecked,
            ScenarioState::BadAddressesChecked => ScenarioState::ObjectAddressFound,
            ScenarioState::ObjectAddressFound => ScenarioState::ObjectClassified,
            ScenarioState::ObjectClassified => ScenarioState::NeighborhoodSwept,
            ScenarioState::NeighborhoodSwept | ScenarioState::Done => ScenarioState::Done,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScenarioState::Init => "init",
            ScenarioState::ThreadAddressFound => "thread_address_found",
            ScenarioState::ThreadClassified => "thread_classified",
            ScenarioState::BadAddressesChecked => "bad_addresses_checked",
            ScenarioState::ObjectAddressFound => "object_address_found",
            ScenarioState::ObjectClassified => "object_classified",
            ScenarioState::NeighborhoodSwept => "neighborhood_swept",
            ScenarioState::Done => "done",
        }
    }
}

impl fmt::Display for ScenarioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ScenarioSettings {
    pub lock_class: String,
    /// Field line the lock object's dump must show.
    pub field: Option<FieldMarker>,
    pub sweep: SweepSettings,
    pub sweep_thread: bool,
}

impl Default for ScenarioSettings {
    fn default() -> Self {
        Self::from_config(&HarnessConfig::default())
    }
}

impl ScenarioSettings {
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self {
            lock_class: config.fixture.lock_class.clone(),
            field: Some(config.fixture.field_marker()),
            sweep: config.sweep.settings(),
            sweep_thread: config.sweep.sweep_thread,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScenarioReport {
    pub thread: Option<Address>,
    pub object: Option<Address>,
    pub thread_sweep: Option<SweepReport>,
    pub object_sweep: Option<SweepReport>,
    /// Commands issued, sweep probes included.
    pub commands: u64,
}

#[derive(Error, Debug)]
#[error("scenario aborted in state {state}")]
pub struct ScenarioAbort {
    pub state: ScenarioState,
    #[source]
    pub error: HarnessError,
}

pub struct ScenarioRunner<'a> {
    channel: &'a mut dyn CommandChannel,
    settings: ScenarioSettings,
    state: ScenarioState,
    log: Option<&'a ExecutionLog>,
    report: ScenarioReport,
}

impl<'a> ScenarioRunner<'a> {
    pub fn new(channel: &'a mut dyn CommandChannel, settings: ScenarioSettings) -> Self {
        Self {
            channel,
            settings,
            state: ScenarioState::Init,
            log: None,
            report: ScenarioReport::default(),
        }
    }

    pub fn with_log(mut self, log: &'a ExecutionLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Drive the scenario to `Done`, or stop at the first failure.
    pub fn run(mut self) -> Result<ScenarioReport, ScenarioAbort> {
        let channel = self.channel.name().to_string();
        info!(channel = %channel, "scenario started");
        self.record(LogEvent::RunStarted { channel });

        match self.drive() {
            Ok(()) => {
                let summary = format!(
                    "thread {} object {} after {} commands",
                    display_opt(&self.report.thread),
                    display_opt(&self.report.object),
                    self.report.commands
                );
                info!(%summary, "scenario passed");
                self.record(LogEvent::RunCompleted { summary });
                Ok(self.report)
            }
            Err(error) => {
                warn!(state = %self.state, error = %error, "scenario aborted");
                self.record(LogEvent::RunFailed {
                    state: self.state.to_string(),
                    reason: error.to_string(),
                });
                Err(ScenarioAbort {
                    state: self.state,
                    error,
                })
            }
        }
    }

    fn drive(&mut self) -> Result<(), HarnessError> {
        let dump = self.command(THREAD_PRINT)?;
        let thread = extract(&dump, &ExtractionPattern::thread_id())?;
        self.report.thread = Some(thread.clone());
        self.advance();

        let target = ProbeTarget::from(thread.clone());
        self.check(&target, false, &Expectation::Thread { verbose: false })?;
        self.check(&target, true, &Expectation::Thread { verbose: true })?;
        if self.settings.sweep_thread {
            self.report.thread_sweep = Some(self.sweep(&thread)?);
        }
        self.advance();

        for target in [ProbeTarget::null(), ProbeTarget::minus_one()] {
            self.check(&target, false, &Expectation::Unsafe)?;
        }
        self.advance();

        // Fresh dump: the lock line is only printed once the waiter is parked.
        let dump = self.command(THREAD_PRINT)?;
        let pattern = ExtractionPattern::waiting_on(&self.settings.lock_class);
        let object = extract(&dump, &pattern)?;
        self.report.object = Some(object.clone());
        self.advance();

        let expected = Expectation::ManagedObject {
            field: self.settings.field.clone(),
        };
        self.check(&ProbeTarget::from(object.clone()), false, &expected)?;
        self.advance();

        self.report.object_sweep = Some(self.sweep(&object)?);
        self.advance();

        // NeighborhoodSwept → Done
        self.advance();
        Ok(())
    }

    fn advance(&mut self) {
        self.state = self.state.next();
        info!(state = %self.state, "scenario state");
        self.record(LogEvent::StateEntered {
            state: self.state.to_string(),
        });
    }

    fn command(&mut self, command: &str) -> Result<String, HarnessError> {
        let text = probe::run(self.channel, command)?;
        self.report.commands += 1;
        self.record(LogEvent::CommandIssued {
            command: command.to_string(),
            response_len: text.len(),
        });
        Ok(text)
    }

    fn check(
        &mut self,
        target: &ProbeTarget,
        verbose: bool,
        expected: &Expectation,
    ) -> Result<(), HarnessError> {
        let response = probe::probe(self.channel, target, verbose)?;
        self.report.commands += 1;
        self.record(LogEvent::CommandIssued {
            command: response.command.clone(),
            response_len: response.text.len(),
        });

        let outcome = oracle::assert_classification(&response, expected);
        self.record(LogEvent::Classified {
            command: response.command.clone(),
            expected: expected.to_string(),
            passed: outcome.is_ok(),
        });
        outcome
    }

    fn sweep(&mut self, center: &Address) -> Result<SweepReport, HarnessError> {
        let report = sweep::sweep(self.channel, center, &self.settings.sweep)?;
        self.report.commands += report.probes;
        self.record(LogEvent::SweepCompleted {
            center: center.to_string(),
            probes: report.probes,
            unsafe_addresses: report.tally.unsafe_address,
            unknown: report.tally.unknown,
        });
        Ok(report)
    }

    /// Best-effort: a failed log write is warned about and the run continues.
    fn record(&self, event: LogEvent) {
        if let Some(log) = self.log {
            if let Err(e) = log.log(event) {
                warn!(path = %log.path().display(), error = %e, "failed to write execution log");
            }
        }
    }
}

fn display_opt(address: &Option<Address>) -> String {
    address
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "-".to_string())
}
