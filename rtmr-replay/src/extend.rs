// SPDX-FileCopyrightText: © 2025 Phala Network <dstack@phala.network>
//
// SPDX-License-Identifier: Apache-2.0

use crate::{
    error::{Operand, ReplayError, Result},
    HashAlgorithm,
};

fn check_len(algo: HashAlgorithm, operand: Operand, value: &[u8]) -> Result<()> {
    if value.len() != algo.digest_size() {
        return Err(ReplayError::LengthMismatch {
            operand,
            expected: algo.digest_size(),
            actual: value.len(),
        });
    }
    Ok(())
}

/// Extend `state` with `input`: `Hash(state || input)`.
///
/// Both operands must be exactly one digest long.
pub fn extend(algo: HashAlgorithm, state: &[u8], input: &[u8]) -> Result<Vec<u8>> {
    check_len(algo, Operand::State, state)?;
    check_len(algo, Operand::Input, input)?;
    Ok(algo.hash([state, input]))
}

/// Fold `inputs` into `state` in order, stopping at the first bad digest.
pub fn extend_all<'a>(
    algo: HashAlgorithm,
    state: Vec<u8>,
    inputs: impl IntoIterator<Item = &'a [u8]>,
) -> Result<Vec<u8>> {
    inputs
        .into_iter()
        .try_fold(state, |state, input| extend(algo, &state, input))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHA384: HashAlgorithm = HashAlgorithm::Sha384;

    #[test]
    fn known_vector() {
        let zero = SHA384.zeros();
        let value = extend(SHA384, &zero, &[0u8; 48]).unwrap();
        assert_eq!(
            hex::encode(value),
            "f57bb7ed82c6ae4a29e6c9879338c592c7d42a39135583e8ccbe3940f2344b0e\
             b6eb8503db0ffd6a39ddd00cd07d8317"
        );
    }

    #[test]
    fn deterministic() {
        let state = [0x11; 48];
        let input = [0x22; 48];
        assert_eq!(
            extend(SHA384, &state, &input).unwrap(),
            extend(SHA384, &state, &input).unwrap()
        );
    }

    #[test]
    fn order_matters() {
        let a = [0xaa; 48];
        let b = [0xbb; 48];
        let ab = extend_all(SHA384, SHA384.zeros(), [&a[..], &b[..]]).unwrap();
        let ba = extend_all(SHA384, SHA384.zeros(), [&b[..], &a[..]]).unwrap();
        assert_ne!(ab, ba);
    }

    #[test]
    fn empty_fold_is_identity() {
        let value = extend_all(SHA384, SHA384.zeros(), std::iter::empty()).unwrap();
        assert_eq!(value, vec![0; 48]);
    }

    #[test]
    fn rejects_short_input() {
        let err = extend(SHA384, &[0; 48], &[0xaa]).unwrap_err();
        assert_eq!(
            err,
            ReplayError::LengthMismatch {
                operand: Operand::Input,
                expected: 48,
                actual: 1,
            }
        );
    }

    #[test]
    fn rejects_wrong_state() {
        let err = extend(SHA384, &[0; 32], &[0; 48]).unwrap_err();
        assert!(matches!(
            err,
            ReplayError::LengthMismatch {
                operand: Operand::State,
                actual: 32,
                ..
            }
        ));
    }

    #[test]
    fn fold_aborts_on_bad_digest() {
        let good = [0x01; 48];
        let bad = [0x02; 64];
        assert!(extend_all(SHA384, SHA384.zeros(), [&good[..], &bad[..], &good[..]]).is_err());
    }

    #[test]
    fn sha256_registers() {
        let algo = HashAlgorithm::Sha256;
        let value = extend(algo, &algo.zeros(), &[0x5a; 32]).unwrap();
        assert_eq!(value.len(), 32);
        assert!(extend(algo, &algo.zeros(), &[0x5a; 48]).is_err());
    }
}
