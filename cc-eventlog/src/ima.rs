// SPDX-FileCopyrightText: © 2025 Phala Network <dstack@phala.network>
//
// SPDX-License-Identifier: Apache-2.0

//! IMA runtime measurement log.
//!
//! The kernel exposes the log as text, one measurement per line:
//!
//! ```text
//! 10 <template-digest> ima-ng sha384:<file-digest> /usr/bin/bash
//! ```
//!
//! Only the second field, the template digest that was extended into the
//! runtime register, is used for replay.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// The path to the IMA ascii runtime measurement list.
pub const IMA_RUNTIME_MEASUREMENTS_FILE: &str =
    "/run/security/integrity/ima/ascii_runtime_measurements";

/// A line of the runtime log that could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MalformedRecord {
    #[error("expected at least 2 fields, got {0}")]
    MissingFields(usize),
    #[error("template digest is not hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

/// One measurement of the runtime log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImaRecord {
    /// PCR the kernel reported, if the first field is numeric
    #[serde(default)]
    pub pcr: Option<u32>,
    /// Digest extended into the runtime register
    #[serde(with = "serde_human_bytes")]
    pub template_digest: Vec<u8>,
    /// Template name, e.g. `ima-ng`
    #[serde(default)]
    pub template: Option<String>,
}

impl ImaRecord {
    /// Parse one line of the log.
    ///
    /// Blank lines yield `Ok(None)`. The digest length is not checked here;
    /// the accumulator rejects digests of the wrong size.
    pub fn parse_line(line: &str) -> Result<Option<Self>, MalformedRecord> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            return Ok(None);
        }
        if fields.len() < 2 {
            return Err(MalformedRecord::MissingFields(fields.len()));
        }
        let template_digest = hex::decode(fields[1])?;
        Ok(Some(Self {
            pcr: fields[0].parse().ok(),
            template_digest,
            template: fields.get(2).map(|s| s.to_string()),
        }))
    }
}

/// Parse the whole runtime log, skipping blank and malformed lines.
pub fn parse_runtime_log(text: &str) -> Vec<ImaRecord> {
    let mut records = vec![];
    for (lineno, line) in text.lines().enumerate() {
        match ImaRecord::parse_line(line) {
            Ok(Some(record)) => records.push(record),
            Ok(None) => {}
            Err(err) => warn!("skipping runtime log line {}: {err}", lineno + 1),
        }
    }
    debug!("parsed {} runtime measurements", records.len());
    records
}

/// Read the runtime log text from `path`.
pub fn read_runtime_log(path: impl AsRef<Path>) -> Result<String> {
    fs_err::read_to_string(path.as_ref()).context("Failed to read IMA runtime measurements")
}

/// Gate in front of the runtime log.
///
/// The runtime log only takes part in replay when the platform records it with
/// the same hash algorithm as the boot log and the registers. That decision is
/// made once per run and handed in as `enabled`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuntimeLog {
    enabled: bool,
}

impl RuntimeLog {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Records of the runtime log, or nothing if the gate is closed.
    pub fn records(&self, text: Option<&str>) -> Vec<ImaRecord> {
        match (self.enabled, text) {
            (true, Some(text)) => parse_runtime_log(text),
            _ => vec![],
        }
    }
}
