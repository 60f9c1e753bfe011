// SPDX-FileCopyrightText: © 2025 Phala Network <dstack@phala.network>
//
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Context, Result};
use cc_eventlog::BootEvent;

/// Where logs and live register values come from.
///
/// Implementations wrap the attestation agent client. Any failure, including a
/// timeout imposed by the implementation, is reported as an error and never as
/// an empty result.
pub trait MeasurementSource {
    /// The full boot-time event log, in log order.
    fn boot_event_log(&self) -> Result<Vec<BootEvent>>;

    /// Raw text of the runtime log.
    ///
    /// Only called when the runtime log is enabled. `None` means nothing has been
    /// recorded yet.
    fn runtime_log(&self) -> Result<Option<String>>;

    /// The value the platform reports for register `index`.
    fn live_register(&self, index: u32) -> Result<Vec<u8>>;
}

impl<S: MeasurementSource + ?Sized> MeasurementSource for &S {
    fn boot_event_log(&self) -> Result<Vec<BootEvent>> {
        (**self).boot_event_log()
    }

    fn runtime_log(&self) -> Result<Option<String>> {
        (**self).runtime_log()
    }

    fn live_register(&self, index: u32) -> Result<Vec<u8>> {
        (**self).live_register(index)
    }
}

/// A source holding everything in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pub boot_events: Vec<BootEvent>,
    pub runtime_log: Option<String>,
    pub registers: Vec<Vec<u8>>,
}

impl MemorySource {
    pub fn new(
        boot_events: Vec<BootEvent>,
        runtime_log: Option<String>,
        registers: Vec<Vec<u8>>,
    ) -> Self {
        Self {
            boot_events,
            runtime_log,
            registers,
        }
    }
}

impl MeasurementSource for MemorySource {
    fn boot_event_log(&self) -> Result<Vec<BootEvent>> {
        Ok(self.boot_events.clone())
    }

    fn runtime_log(&self) -> Result<Option<String>> {
        Ok(self.runtime_log.clone())
    }

    fn live_register(&self, index: u32) -> Result<Vec<u8>> {
        self.registers
            .get(index as usize)
            .cloned()
            .with_context(|| format!("register {index} is not reported"))
    }
}
