// SPDX-FileCopyrightText: © 2024-2025 Phala Network <dstack@phala.network>
//
// SPDX-License-Identifier: Apache-2.0

use std::{io, path::PathBuf};

use anyhow::{bail, Context, Result};
use cc_eventlog::{parse_runtime_log, read_runtime_log, IMA_RUNTIME_MEASUREMENTS_FILE};
use clap::{Args, Parser, Subcommand};
use rtmr_replay::{RegisterReport, Replay, ReplayError, RtmrVerifier};
use tracing::error;

use config::ConfigArgs;
use source::FileSource;

mod config;
mod source;

/// Replay TDX RTMRs from the boot-time and IMA logs
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay the logs and show the calculated RTMR values
    Replay(ReplayArgs),
    /// Replay the logs and compare with the reported RTMR values
    Verify(VerifyArgs),
    /// Parse the IMA runtime log and print the records
    Ima(ImaArgs),
}

#[derive(Args)]
struct LogArgs {
    /// JSON boot-time event log saved from the attestation agent
    #[arg(short, long, env = "RTMR_EVENT_LOG")]
    event_log: PathBuf,

    /// IMA ascii runtime measurement list
    #[arg(long, env = "RTMR_IMA_LOG", default_value = IMA_RUNTIME_MEASUREMENTS_FILE)]
    ima_log: PathBuf,

    /// Only handle this register
    #[arg(short, long)]
    index: Option<u32>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Args)]
struct ReplayArgs {
    #[command(flatten)]
    logs: LogArgs,
}

#[derive(Args)]
struct VerifyArgs {
    #[command(flatten)]
    logs: LogArgs,

    /// JSON file with the reported registers: {"rtmrs": ["<hex>", ...]}
    #[arg(short, long, env = "RTMR_VALUES")]
    rtmrs: PathBuf,
}

#[derive(Args)]
struct ImaArgs {
    /// IMA ascii runtime measurement list
    #[arg(long, default_value = IMA_RUNTIME_MEASUREMENTS_FILE)]
    ima_log: PathBuf,
}

fn verifier(logs: &LogArgs, rtmrs: Option<PathBuf>) -> Result<RtmrVerifier<FileSource>> {
    let config = logs.config.resolve()?;
    let source = FileSource::new(logs.event_log.clone(), logs.ima_log.clone(), rtmrs);
    Ok(RtmrVerifier::new(config, source))
}

fn replay(verifier: &RtmrVerifier<FileSource>, index: Option<u32>) -> Result<Vec<Replay>> {
    if let Some(index) = index {
        let replay = verifier
            .replay_register(index)
            .with_context(|| format!("Failed to replay RTMR{index}"))?;
        return Ok(vec![replay]);
    }
    verifier
        .replay_all()
        .context("Failed to replay event logs")?
        .into_iter()
        .map(|(index, replay)| replay.with_context(|| format!("Failed to replay RTMR{index}")))
        .collect()
}

fn cmd_replay(args: ReplayArgs) -> Result<()> {
    let verifier = verifier(&args.logs, None)?;
    let replays = replay(&verifier, args.logs.index)?;

    if args.logs.json {
        serde_json::to_writer_pretty(io::stdout(), &replays)
            .context("Failed to write replay result")?;
        println!();
        return Ok(());
    }
    for replay in replays {
        println!(
            "RTMR{} ({} boot, {} runtime events) → {}",
            replay.index,
            replay.boot_events,
            replay.runtime_events,
            hex::encode(&replay.value)
        );
    }
    Ok(())
}

fn print_report(index: u32, result: &Result<RegisterReport, ReplayError>) {
    match result {
        Ok(report) => {
            println!("RTMR{index}: {:?}", report.verdict);
            println!("  replayed: {}", hex::encode(&report.replayed));
            println!("  reported: {}", hex::encode(&report.reported));
        }
        Err(err) => println!("RTMR{index}: error: {err}"),
    }
}

fn cmd_verify(args: VerifyArgs) -> Result<()> {
    let verifier = verifier(&args.logs, Some(args.rtmrs))?;
    let results = match args.logs.index {
        Some(index) => vec![(index, verifier.verify_register(index))],
        None => verifier.verify_all(),
    };

    let mut failed = 0;
    for (index, result) in &results {
        match result {
            Ok(report) if report.is_match() => {}
            Ok(_) => {
                error!("RTMR{index} does not match its replay");
                failed += 1;
            }
            Err(err) => {
                error!("RTMR{index} could not be verified: {err}");
                failed += 1;
            }
        }
    }

    if args.logs.json {
        let reports: Vec<_> = results
            .iter()
            .map(|(index, result)| match result {
                Ok(report) => serde_json::json!({ "index": index, "report": report }),
                Err(err) => serde_json::json!({ "index": index, "error": err.to_string() }),
            })
            .collect();
        serde_json::to_writer_pretty(io::stdout(), &reports)
            .context("Failed to write verification result")?;
        println!();
    } else {
        for (index, result) in &results {
            print_report(*index, result);
        }
    }

    if failed > 0 {
        bail!("{failed} of {} registers failed verification", results.len());
    }
    Ok(())
}

fn cmd_ima(args: ImaArgs) -> Result<()> {
    let text = read_runtime_log(&args.ima_log)?;
    let records = parse_runtime_log(&text);
    serde_json::to_writer_pretty(io::stdout(), &records).context("Failed to write records")?;
    println!();
    Ok(())
}

fn main() -> Result<()> {
    {
        use tracing_subscriber::{fmt, EnvFilter};
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt().with_env_filter(filter).with_writer(io::stderr).init();
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::Replay(args) => cmd_replay(args)?,
        Commands::Verify(args) => cmd_verify(args)?,
        Commands::Ima(args) => cmd_ima(args)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_verify_args() {
        let cli = Cli::try_parse_from([
            "rtmr-verify",
            "verify",
            "--event-log",
            "eventlog.json",
            "--rtmrs",
            "rtmrs.json",
            "--ima-gate",
            "off",
            "--algorithm",
            "sha384",
            "-i",
            "2",
        ])
        .unwrap();
        let Commands::Verify(args) = cli.command else {
            panic!("expected verify command");
        };
        assert_eq!(args.logs.index, Some(2));
        assert_eq!(args.logs.config.ima_gate, Some(config::ImaGate::Off));
        assert_eq!(
            args.logs.ima_log,
            PathBuf::from(IMA_RUNTIME_MEASUREMENTS_FILE)
        );
    }

    #[test]
    fn replay_index_outside_range_is_zero() {
        let dir = tempfile::tempdir().unwrap();
        let event_log = dir.path().join("eventlog.json");
        let digest = "11".repeat(48);
        fs_err::write(
            &event_log,
            format!(r#"[{{"imr": 0, "digest": "{digest}"}}]"#),
        )
        .unwrap();
        let cli = Cli::try_parse_from([
            "rtmr-verify",
            "replay",
            "--event-log",
            event_log.to_str().unwrap(),
            "--ima-gate",
            "off",
            "-i",
            "7",
        ])
        .unwrap();
        let Commands::Replay(args) = cli.command else {
            panic!("expected replay command");
        };
        let verifier = verifier(&args.logs, None).unwrap();

        let replays = replay(&verifier, args.logs.index).unwrap();
        assert_eq!(replays.len(), 1);
        assert_eq!(replays[0].index, 7);
        assert_eq!(replays[0].value, vec![0u8; 48]);

        let replays = replay(&verifier, None).unwrap();
        assert_eq!(replays.len(), 4);
        assert_ne!(replays[0].value, vec![0u8; 48]);
    }
}
