// SPDX-FileCopyrightText: © 2025 Phala Network <dstack@phala.network>
//
// SPDX-License-Identifier: Apache-2.0

//! Independent replay of TDX RTMRs.
//!
//! The expected value of each register is recomputed from the boot-time event log
//! and, for the runtime register, the IMA runtime log, then compared byte for byte
//! with the value the platform reports.

pub use algorithm::HashAlgorithm;
pub use config::{ima_hash_matches, ReplayConfig, RTMR_COUNT, RUNTIME_RTMR};
pub use error::{Operand, ReplayError, Result};
pub use extend::{extend, extend_all};
pub use replay::{Replay, ReplayPhase, Replayer};
pub use source::{MeasurementSource, MemorySource};
pub use verify::{verify, RegisterReport, RtmrVerifier, Verdict};

pub use cc_eventlog as eventlog;

pub mod algorithm;
mod config;
mod error;
mod extend;
mod replay;
mod source;
mod verify;
