// SPDX-FileCopyrightText: © 2025 Phala Network <dstack@phala.network>
//
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use rtmr_replay::{ima_hash_matches, HashAlgorithm, ReplayConfig};
use tracing::info;

/// How to decide whether the IMA log takes part in replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ImaGate {
    /// Enabled when the kernel command line sets `ima_hash` to the register algorithm
    Auto,
    On,
    Off,
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// JSON file with replay settings
    #[arg(long, env = "RTMR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Register hash algorithm (sha256, sha384, sha512)
    #[arg(long, env = "RTMR_ALGORITHM")]
    pub algorithm: Option<HashAlgorithm>,

    /// Index of the register that absorbs the IMA log
    #[arg(long, env = "RTMR_RUNTIME_REGISTER")]
    pub runtime_register: Option<u32>,

    /// Whether to replay the IMA log [default: the config file setting, or auto]
    #[arg(long, value_enum, env = "RTMR_IMA_GATE")]
    pub ima_gate: Option<ImaGate>,

    /// Kernel command line consulted by `--ima-gate auto`
    #[arg(long, default_value = "/proc/cmdline")]
    pub cmdline: PathBuf,
}

impl ConfigArgs {
    /// Build the replay settings. The IMA gate is evaluated here, once.
    pub fn resolve(&self) -> Result<ReplayConfig> {
        let mut config: ReplayConfig = match &self.config {
            Some(path) => {
                let data = fs_err::read(path).context("Failed to read config file")?;
                serde_json::from_slice(&data).context("Failed to parse config file")?
            }
            None => ReplayConfig::default(),
        };
        if let Some(algorithm) = self.algorithm {
            config.algorithm = algorithm;
        }
        if let Some(runtime_register) = self.runtime_register {
            config.runtime_register = runtime_register;
        }
        let gate = match (self.ima_gate, &self.config) {
            (Some(gate), _) => gate,
            (None, Some(_)) => return Ok(config),
            (None, None) => ImaGate::Auto,
        };
        config.runtime_log_enabled = match gate {
            ImaGate::On => true,
            ImaGate::Off => false,
            ImaGate::Auto => self.detect_ima(config.algorithm)?,
        };
        Ok(config)
    }

    fn detect_ima(&self, algorithm: HashAlgorithm) -> Result<bool> {
        let cmdline =
            fs_err::read_to_string(&self.cmdline).context("Failed to read kernel cmdline")?;
        let enabled = ima_hash_matches(&cmdline, algorithm);
        if !enabled {
            info!("IMA over RTMR not enabled, verifying boot measurements only");
        }
        Ok(enabled)
    }
}
