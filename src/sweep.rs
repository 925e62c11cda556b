//! Neighborhood sweep around a known-good address.
//!
//! Probes every byte address in a window around a real pointer, one at a
//! time and in increasing order, so the first address that breaks the channel
//! is the one reported. Responses are tallied but never asserted on.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::address::Address;
use crate::channel::CommandChannel;
use crate::error::HarnessError;
use crate::oracle::{self, Classification};
use crate::probe::{self, ProbeTarget};

pub const DEFAULT_LOOKBACK: u64 = 256;
pub const DEFAULT_COUNT: u64 = 512;
const PROGRESS_EVERY: u64 = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepSettings {
    pub lookback: u64,
    pub count: u64,
    /// Treat an empty response as a failure.
    pub reject_empty: bool,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            lookback: DEFAULT_LOOKBACK,
            count: DEFAULT_COUNT,
            reject_empty: false,
        }
    }
}

/// Contiguous addresses `start, start + 1, ...`, generated on demand.
#[derive(Debug, Clone)]
pub struct SweepRange {
    next: Address,
    remaining: u64,
}

impl SweepRange {
    pub fn new(start: Address, count: u64) -> Self {
        Self {
            next: start,
            remaining: count,
        }
    }

    /// Window starting `lookback` bytes before `center`, clamped at zero.
    pub fn around(center: &Address, lookback: u64, count: u64) -> Self {
        Self::new(center.saturating_sub(lookback), count)
    }
}

impl Iterator for SweepRange {
    type Item = Address;

    fn next(&mut self) -> Option<Address> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let current = self.next.next();
        Some(std::mem::replace(&mut self.next, current))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        (n, Some(n))
    }
}

impl ExactSizeIterator for SweepRange {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassTally {
    pub thread: u64,
    pub object: u64,
    #[serde(rename = "unsafe")]
    pub unsafe_address: u64,
    pub unknown: u64,
    pub empty: u64,
}

impl ClassTally {
    fn record(&mut self, class: &Classification, empty: bool) {
        match class {
            Classification::IsThread => self.thread += 1,
            Classification::IsManagedObject { .. } => self.object += 1,
            Classification::Unsafe => self.unsafe_address += 1,
            Classification::Unknown => self.unknown += 1,
        }
        if empty {
            self.empty += 1;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub center: Address,
    pub first: Option<Address>,
    pub last: Option<Address>,
    pub probes: u64,
    pub tally: ClassTally,
}

/// Probe the window around `center`. Only channel failures (and, with
/// `reject_empty`, empty answers) stop the sweep.
pub fn sweep(
    channel: &mut dyn CommandChannel,
    center: &Address,
    settings: &SweepSettings,
) -> Result<SweepReport, HarnessError> {
    let range = SweepRange::around(center, settings.lookback, settings.count);
    if center.checked_sub(settings.lookback).is_none() {
        warn!(center = %center, lookback = settings.lookback, "sweep window clamped at 0x0");
    }

    let mut report = SweepReport {
        center: center.clone(),
        first: None,
        last: None,
        probes: 0,
        tally: ClassTally::default(),
    };

    for address in range {
        let target = ProbeTarget::Address(address.clone());
        let response = probe::probe(channel, &target, false)?;
        let empty = response.text.trim().is_empty();
        if empty && settings.reject_empty {
            return Err(HarnessError::EmptyResponse { address });
        }
        report.tally.record(&oracle::classify(&response), empty);

        report.probes += 1;
        if report.probes % PROGRESS_EVERY == 0 {
            debug!(probes = report.probes, at = %address, "sweep progress");
        }
        if report.first.is_none() {
            report.first = Some(address.clone());
        }
        report.last = Some(address);
    }

    info!(
        center = %center,
        probes = report.probes,
        threads = report.tally.thread,
        objects = report.tally.object,
        unsafe_addresses = report.tally.unsafe_address,
        unknown = report.tally.unknown,
        "sweep finished"
    );
    Ok(report)
}
