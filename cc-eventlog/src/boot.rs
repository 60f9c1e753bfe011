// SPDX-FileCopyrightText: © 2025 Phala Network <dstack@phala.network>
//
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One entry of the boot-time event log as delivered by the attestation agent.
///
/// Only `imr` and `digest` take part in replay. The remaining fields are carried
/// along so that mismatch reports can point at the offending event. The IMR index
/// is zero-based, matching the RTMR numbering of a TDX guest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootEvent {
    /// IMR index, starts from 0
    pub imr: u32,
    /// Event type
    #[serde(default)]
    pub event_type: u32,
    /// Digest extended into the IMR, raw bytes
    #[serde(with = "serde_human_bytes")]
    pub digest: Vec<u8>,
    /// Event name
    #[serde(default)]
    pub event: String,
    /// Event payload
    #[serde(with = "serde_human_bytes", default)]
    pub event_payload: Vec<u8>,
}

impl BootEvent {
    pub fn new(imr: u32, digest: Vec<u8>) -> Self {
        Self {
            imr,
            event_type: 0,
            digest,
            event: String::new(),
            event_payload: Vec::new(),
        }
    }
}

/// The full, ordered boot-time event log.
///
/// The order of entries is the historical extend order and is never changed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BootEventLog {
    events: Vec<BootEvent>,
}

impl BootEventLog {
    pub fn new(events: Vec<BootEvent>) -> Self {
        Self { events }
    }

    /// Decode a JSON array of [`BootEvent`]s.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let events: Vec<BootEvent> =
            serde_json::from_slice(data).context("Failed to decode boot event log")?;
        Ok(Self::new(events))
    }

    pub fn events(&self) -> &[BootEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Entries extended into `imr`, in log order.
    pub fn events_for(&self, imr: u32) -> impl Iterator<Item = &BootEvent> + '_ {
        self.events.iter().filter(move |event| event.imr == imr)
    }

    /// Digests extended into `imr`, in log order.
    ///
    /// An index that never appears in the log yields an empty list.
    pub fn digests_for(&self, imr: u32) -> Vec<&[u8]> {
        self.events_for(imr)
            .map(|event| event.digest.as_slice())
            .collect()
    }

    /// Number of events per IMR for indices `0..imr_count`.
    pub fn count_by_imr(&self, imr_count: u32) -> Vec<usize> {
        let mut counts = vec![0; imr_count as usize];
        for event in &self.events {
            if let Some(count) = counts.get_mut(event.imr as usize) {
                *count += 1;
            }
        }
        counts
    }
}

impl From<Vec<BootEvent>> for BootEventLog {
    fn from(events: Vec<BootEvent>) -> Self {
        Self::new(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_log() -> BootEventLog {
        BootEventLog::new(vec![
            BootEvent::new(0, vec![0xa0; 48]),
            BootEvent::new(1, vec![0xb0; 48]),
            BootEvent::new(0, vec![0xa1; 48]),
            BootEvent::new(2, vec![0xc0; 48]),
            BootEvent::new(0, vec![0xa2; 48]),
        ])
    }

    #[test]
    fn digests_keep_log_order() {
        let log = sample_log();
        let digests = log.digests_for(0);
        assert_eq!(
            digests,
            vec![&[0xa0u8; 48][..], &[0xa1u8; 48][..], &[0xa2u8; 48][..]]
        );
        assert_eq!(log.digests_for(1), vec![&[0xb0u8; 48][..]]);
    }

    #[test]
    fn unknown_imr_has_no_digests() {
        assert!(sample_log().digests_for(7).is_empty());
    }

    #[test]
    fn counts_ignore_out_of_range_indices() {
        let mut events = sample_log().events().to_vec();
        events.push(BootEvent::new(9, vec![0; 48]));
        let log = BootEventLog::new(events);
        assert_eq!(log.count_by_imr(4), vec![3, 1, 1, 0]);
    }

    #[test]
    fn decode_json_log() {
        let digest = "ab".repeat(48);
        let json = format!(
            r#"[
                {{"imr": 1, "event_type": 13, "digest": "{digest}", "event": "kernel"}},
                {{"imr": 3, "digest": "{digest}", "event_payload": "0102"}}
            ]"#
        );
        let log = BootEventLog::from_json(json.as_bytes()).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log.events()[0].event_type, 13);
        assert_eq!(log.events()[0].event, "kernel");
        assert_eq!(log.events()[0].digest, vec![0xab; 48]);
        assert_eq!(log.events()[1].event_payload, vec![1, 2]);
        assert!(log.events()[1].event.is_empty());
    }

    #[test]
    fn decode_rejects_bad_digest() {
        let json = r#"[{"imr": 0, "digest": "not hex"}]"#;
        assert!(BootEventLog::from_json(json.as_bytes()).is_err());
    }
}
