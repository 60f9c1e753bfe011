// SPDX-FileCopyrightText: © 2025 Phala Network <dstack@phala.network>
//
// SPDX-License-Identifier: Apache-2.0

use std::{
    path::{Path, PathBuf},
    sync::OnceLock,
};

use anyhow::{anyhow, Context, Result};
use cc_eventlog::{read_runtime_log, BootEvent, BootEventLog};
use rtmr_replay::MeasurementSource;
use serde::Deserialize;

/// Register values dumped by the attestation agent.
#[derive(Debug, Deserialize)]
struct RegisterDump {
    /// Hex-encoded register values, indexed by register
    rtmrs: Vec<String>,
}

fn load_register_dump(path: &Path) -> Result<Vec<String>> {
    let data = fs_err::read(path).context("Failed to read register dump")?;
    let dump: RegisterDump =
        serde_json::from_slice(&data).context("Failed to parse register dump")?;
    Ok(dump.rtmrs)
}

/// Reads logs and register values from files saved from the attestation agent.
///
/// The register dump is read once, on the first register lookup.
#[derive(Debug)]
pub struct FileSource {
    event_log: PathBuf,
    ima_log: PathBuf,
    rtmrs: Option<PathBuf>,
    register_dump: OnceLock<Result<Vec<String>, String>>,
}

impl FileSource {
    pub fn new(event_log: PathBuf, ima_log: PathBuf, rtmrs: Option<PathBuf>) -> Self {
        Self {
            event_log,
            ima_log,
            rtmrs,
            register_dump: OnceLock::new(),
        }
    }

    fn registers(&self) -> Result<&[String]> {
        let path = self.rtmrs.as_ref().context("No register dump given")?;
        self.register_dump
            .get_or_init(|| load_register_dump(path).map_err(|err| format!("{err:#}")))
            .as_deref()
            .map_err(|err| anyhow!("{err}"))
    }
}

impl MeasurementSource for FileSource {
    fn boot_event_log(&self) -> Result<Vec<BootEvent>> {
        let data = fs_err::read(&self.event_log).context("Failed to read boot event log")?;
        let log = BootEventLog::from_json(&data)?;
        Ok(log.events().to_vec())
    }

    fn runtime_log(&self) -> Result<Option<String>> {
        read_runtime_log(&self.ima_log).map(Some)
    }

    fn live_register(&self, index: u32) -> Result<Vec<u8>> {
        let value = self
            .registers()?
            .get(index as usize)
            .with_context(|| format!("RTMR{index} missing from register dump"))?;
        hex::decode(value).with_context(|| format!("Invalid hex for RTMR{index}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = fs_err::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn reads_all_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let digest = "11".repeat(48);
        let source = FileSource::new(
            write_file(
                &dir,
                "eventlog.json",
                &format!(r#"[{{"imr": 1, "digest": "{digest}"}}]"#),
            ),
            write_file(&dir, "ima", &format!("10 {digest} ima-ng\n")),
            Some(write_file(
                &dir,
                "rtmrs.json",
                &format!(r#"{{"rtmrs": ["{digest}", "zz"]}}"#),
            )),
        );
        let events = source.boot_event_log().unwrap();
        assert_eq!(events, vec![BootEvent::new(1, vec![0x11; 48])]);
        assert!(source.runtime_log().unwrap().unwrap().starts_with("10 "));
        assert_eq!(source.live_register(0).unwrap(), vec![0x11; 48]);
        assert!(source.live_register(1).is_err());
        assert!(source.live_register(2).is_err());
    }

    #[test]
    fn missing_files_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileSource::new(
            dir.path().join("eventlog.json"),
            dir.path().join("ima"),
            None,
        );
        assert!(source.boot_event_log().is_err());
        assert!(source.runtime_log().is_err());
        assert!(source.live_register(0).is_err());

        let source = FileSource::new(
            dir.path().join("eventlog.json"),
            dir.path().join("ima"),
            Some(dir.path().join("rtmrs.json")),
        );
        let err = source.live_register(0).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read register dump"));
        assert!(source.live_register(1).is_err());
    }

    #[test]
    fn register_dump_is_read_once() {
        let dir = tempfile::tempdir().unwrap();
        let rtmrs = write_file(
            &dir,
            "rtmrs.json",
            &format!(r#"{{"rtmrs": ["{}", "{}"]}}"#, "11".repeat(48), "22".repeat(48)),
        );
        let source = FileSource::new(
            dir.path().join("eventlog.json"),
            dir.path().join("ima"),
            Some(rtmrs.clone()),
        );
        assert_eq!(source.live_register(0).unwrap(), vec![0x11; 48]);
        fs_err::remove_file(&rtmrs).unwrap();
        assert_eq!(source.live_register(1).unwrap(), vec![0x22; 48]);
    }
}
