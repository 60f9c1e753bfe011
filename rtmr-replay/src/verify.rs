// SPDX-FileCopyrightText: © 2025 Phala Network <dstack@phala.network>
//
// SPDX-License-Identifier: Apache-2.0

use cc_eventlog::{BootEventLog, ImaRecord, RuntimeLog};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    error::{ReplayError, Result},
    replay::{Replay, Replayer},
    MeasurementSource, ReplayConfig,
};

/// Outcome of comparing a replayed register against the reported one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Match,
    Mismatch,
}

/// Exact byte comparison.
pub fn verify(replayed: &[u8], reported: &[u8]) -> Verdict {
    if replayed == reported {
        Verdict::Match
    } else {
        Verdict::Mismatch
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterReport {
    pub index: u32,
    #[serde(with = "serde_human_bytes")]
    pub replayed: Vec<u8>,
    #[serde(with = "serde_human_bytes")]
    pub reported: Vec<u8>,
    pub verdict: Verdict,
    pub boot_events: usize,
    pub runtime_events: usize,
}

impl RegisterReport {
    pub fn is_match(&self) -> bool {
        self.verdict == Verdict::Match
    }
}

/// Logs fetched once for a verification run.
struct Logs {
    boot_log: BootEventLog,
    runtime_records: Vec<ImaRecord>,
}

/// Verifies registers against the values reported by a [`MeasurementSource`].
pub struct RtmrVerifier<S> {
    config: ReplayConfig,
    source: S,
}

impl<S: MeasurementSource> RtmrVerifier<S> {
    pub fn new(config: ReplayConfig, source: S) -> Self {
        Self { config, source }
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    fn fetch_logs(&self) -> Result<Logs> {
        let boot_log = self
            .source
            .boot_event_log()
            .map(BootEventLog::new)
            .map_err(|err| ReplayError::retrieval("boot event log", err))?;
        if boot_log.is_empty() {
            warn!("boot event log is empty, registers replay to zero");
        } else {
            debug!("fetched {} boot events", boot_log.len());
        }
        let runtime_log = RuntimeLog::new(self.config.runtime_log_enabled);
        let runtime_text = if runtime_log.is_enabled() {
            self.source
                .runtime_log()
                .map_err(|err| ReplayError::retrieval("runtime log", err))?
        } else {
            info!("runtime log not enabled, verifying boot measurements only");
            None
        };
        Ok(Logs {
            boot_log,
            runtime_records: runtime_log.records(runtime_text.as_deref()),
        })
    }

    /// Replay all registers without comparing them.
    pub fn replay_all(&self) -> Result<Vec<(u32, Result<Replay>)>> {
        let logs = self.fetch_logs()?;
        Ok(Replayer::new(&self.config, &logs.boot_log, &logs.runtime_records).replay_all())
    }

    /// Replay a single register without comparing it.
    ///
    /// An index outside the configured range replays to the zero register.
    pub fn replay_register(&self, index: u32) -> Result<Replay> {
        let logs = self.fetch_logs()?;
        Replayer::new(&self.config, &logs.boot_log, &logs.runtime_records).replay(index)
    }

    fn check(&self, replayer: &Replayer<'_>, index: u32) -> Result<RegisterReport> {
        let replay = replayer.replay(index)?;
        let reported = self
            .source
            .live_register(index)
            .map_err(|err| ReplayError::retrieval(&format!("register {index}"), err))?;
        let verdict = verify(&replay.value, &reported);
        if verdict == Verdict::Mismatch {
            warn!(
                "RTMR{index} mismatch, reported: {}, replayed: {}",
                hex::encode(&reported),
                hex::encode(&replay.value)
            );
        }
        Ok(RegisterReport {
            index,
            replayed: replay.value,
            reported,
            verdict,
            boot_events: replay.boot_events,
            runtime_events: replay.runtime_events,
        })
    }

    /// Verify a single register.
    pub fn verify_register(&self, index: u32) -> Result<RegisterReport> {
        let logs = self.fetch_logs()?;
        let replayer = Replayer::new(&self.config, &logs.boot_log, &logs.runtime_records);
        self.check(&replayer, index)
    }
}

impl<S: MeasurementSource + Sync> RtmrVerifier<S> {
    /// Verify every register in the configured range.
    ///
    /// The logs are fetched once; if that fails every register reports the same
    /// retrieval error. Registers are replayed concurrently and a failure of one
    /// register does not affect the others.
    pub fn verify_all(&self) -> Vec<(u32, Result<RegisterReport>)> {
        let logs = match self.fetch_logs() {
            Ok(logs) => logs,
            Err(err) => {
                return self
                    .config
                    .registers()
                    .map(|index| (index, Err(err.clone())))
                    .collect()
            }
        };
        let replayer = Replayer::new(&self.config, &logs.boot_log, &logs.runtime_records);
        std::thread::scope(|scope| {
            let handles: Vec<_> = self
                .config
                .registers()
                .map(|index| {
                    let replayer = &replayer;
                    (index, scope.spawn(move || self.check(replayer, index)))
                })
                .collect();
            handles
                .into_iter()
                .map(|(index, handle)| {
                    let result = handle.join().unwrap_or_else(|e| std::panic::resume_unwind(e));
                    (index, result)
                })
                .collect()
        })
    }
}
