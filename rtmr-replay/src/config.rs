// SPDX-FileCopyrightText: © 2025 Phala Network <dstack@phala.network>
//
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::HashAlgorithm;

/// Number of RTMRs in a TDX guest.
pub const RTMR_COUNT: u32 = 4;
/// The RTMR that IMA extends at runtime.
pub const RUNTIME_RTMR: u32 = 2;

/// Settings of a replay run, resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Hash algorithm of the registers and of the boot-time digests
    pub algorithm: HashAlgorithm,
    /// Number of registers, indices run from 0
    pub register_count: u32,
    /// The register that also absorbs the runtime log
    pub runtime_register: u32,
    /// Whether the runtime log is recorded with `algorithm`.
    ///
    /// When false the runtime register is replayed from the boot log only.
    pub runtime_log_enabled: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::Sha384,
            register_count: RTMR_COUNT,
            runtime_register: RUNTIME_RTMR,
            runtime_log_enabled: false,
        }
    }
}

impl ReplayConfig {
    pub fn with_runtime_log(mut self, enabled: bool) -> Self {
        self.runtime_log_enabled = enabled;
        self
    }

    pub fn registers(&self) -> std::ops::Range<u32> {
        0..self.register_count
    }
}

/// Whether a kernel command line enables IMA with `algorithm`.
///
/// Like the kernel, only the first `ima_hash=` parameter counts and its value
/// is compared case-sensitively.
pub fn ima_hash_matches(cmdline: &str, algorithm: HashAlgorithm) -> bool {
    cmdline
        .split_whitespace()
        .find_map(|param| param.strip_prefix("ima_hash="))
        .is_some_and(|value| value == algorithm.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cmdline_token_match() {
        let algo = HashAlgorithm::Sha384;
        assert!(ima_hash_matches(
            "console=ttyS0 ima_hash=sha384 ima_policy=critical_data\n",
            algo
        ));
        assert!(!ima_hash_matches("console=ttyS0 ima_hash=sha256", algo));
        assert!(!ima_hash_matches("xima_hash=sha384", algo));
        assert!(!ima_hash_matches("ima_hash=sha3840", algo));
        assert!(!ima_hash_matches("", algo));
        assert!(!ima_hash_matches("ima_hash=SHA384", algo));
        assert!(!ima_hash_matches("ima_hash=sha256 ima_hash=sha384", algo));
        assert!(ima_hash_matches("ima_hash=sha384 ima_hash=sha256", algo));
    }

    #[test]
    fn partial_config_uses_defaults() {
        let config: ReplayConfig =
            serde_json::from_str(r#"{"runtime_log_enabled": true, "algorithm": "sha256"}"#)
                .unwrap();
        assert_eq!(config.algorithm, HashAlgorithm::Sha256);
        assert!(config.runtime_log_enabled);
        assert_eq!(config.runtime_register, RUNTIME_RTMR);
        assert_eq!(config.registers(), 0..4);
    }
}
