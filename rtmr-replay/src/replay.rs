// SPDX-FileCopyrightText: © 2025 Phala Network <dstack@phala.network>
//
// SPDX-License-Identifier: Apache-2.0

use cc_eventlog::{BootEventLog, ImaRecord};
use serde::Serialize;
use tracing::{debug, trace};

use crate::{error::Result, extend::extend, ReplayConfig};

/// Phases of a single register replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayPhase {
    Init,
    BootReplay,
    RuntimeReplay,
    Done,
}

/// The replayed value of one register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Replay {
    pub index: u32,
    #[serde(with = "serde_human_bytes")]
    pub value: Vec<u8>,
    /// Boot-time events folded into the value
    pub boot_events: usize,
    /// Runtime records folded into the value
    pub runtime_events: usize,
}

/// Replays registers from a boot log and the (already gated) runtime records.
///
/// Every call starts from a fresh zero register; nothing is cached between calls.
pub struct Replayer<'a> {
    config: &'a ReplayConfig,
    boot_log: &'a BootEventLog,
    runtime_records: &'a [ImaRecord],
}

impl<'a> Replayer<'a> {
    pub fn new(
        config: &'a ReplayConfig,
        boot_log: &'a BootEventLog,
        runtime_records: &'a [ImaRecord],
    ) -> Self {
        Self {
            config,
            boot_log,
            runtime_records,
        }
    }

    fn takes_runtime_log(&self, index: u32) -> bool {
        index == self.config.runtime_register
            && self.config.runtime_log_enabled
            && !self.runtime_records.is_empty()
    }

    /// Replay register `index`.
    ///
    /// An index that has no boot entries, including one outside the register
    /// range, replays to all zeros.
    pub fn replay(&self, index: u32) -> Result<Replay> {
        let algo = self.config.algorithm;
        let mut phase = ReplayPhase::Init;
        let mut value = algo.zeros();
        let mut boot_events = 0;
        let mut runtime_events = 0;

        loop {
            trace!(index, ?phase, "replay");
            phase = match phase {
                ReplayPhase::Init => ReplayPhase::BootReplay,
                ReplayPhase::BootReplay => {
                    for digest in self.boot_log.digests_for(index) {
                        value = extend(algo, &value, digest)?;
                        boot_events += 1;
                    }
                    if self.takes_runtime_log(index) {
                        ReplayPhase::RuntimeReplay
                    } else {
                        ReplayPhase::Done
                    }
                }
                ReplayPhase::RuntimeReplay => {
                    for record in self.runtime_records {
                        value = extend(algo, &value, &record.template_digest)?;
                        runtime_events += 1;
                    }
                    ReplayPhase::Done
                }
                ReplayPhase::Done => break,
            };
        }

        debug!(
            index,
            boot_events,
            runtime_events,
            "replayed register: {}",
            hex::encode(&value)
        );
        Ok(Replay {
            index,
            value,
            boot_events,
            runtime_events,
        })
    }

    /// Replay every register in the configured range.
    pub fn replay_all(&self) -> Vec<(u32, Result<Replay>)> {
        debug!(
            "boot events per register: {:?}",
            self.boot_log.count_by_imr(self.config.register_count)
        );
        self.config
            .registers()
            .map(|index| (index, self.replay(index)))
            .collect()
    }
}
