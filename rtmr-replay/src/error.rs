// SPDX-FileCopyrightText: © 2025 Phala Network <dstack@phala.network>
//
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Which side of an extend carried the bad digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    State,
    Input,
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::State => f.write_str("register state"),
            Operand::Input => f.write_str("extended digest"),
        }
    }
}

/// Failures that abort the verification of a single register.
///
/// A register value that differs from its replay is not an error, see
/// [`Verdict::Mismatch`](crate::Verdict::Mismatch).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplayError {
    #[error("retrieval failure: {0}")]
    Retrieval(String),
    #[error("{operand} has {actual} bytes, expected {expected}")]
    LengthMismatch {
        operand: Operand,
        expected: usize,
        actual: usize,
    },
}

impl ReplayError {
    pub(crate) fn retrieval(what: &str, err: anyhow::Error) -> Self {
        ReplayError::Retrieval(format!("{what}: {err:#}"))
    }

    pub fn is_retrieval(&self) -> bool {
        matches!(self, ReplayError::Retrieval(_))
    }
}

pub type Result<T, E = ReplayError> = std::result::Result<T, E>;
