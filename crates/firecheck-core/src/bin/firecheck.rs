//! WeaponFire conformance checker.
//!
//! # Usage
//!
//! ```bash
//! # Re-verify a saved capture against the reference dataset
//! firecheck check --config tc_param.json --capture capture.json
//!
//! # Full test case against an in-process bus, replaying the reference
//! # dataset every 500 ms with 5% duplicated deliveries
//! firecheck loopback --config tc_param.json --period-ms 500 --duplicate-ppm 50000
//!
//! # List the reference dataset
//! firecheck summary --reference fad/
//! ```
//!
//! Exit status: 0 PASS, 1 FAIL, 2 INCONCLUSIVE, 3 usage or I/O error.

use clap::{Parser, Subcommand};
use firecheck_core::capture::CaptureLog;
use firecheck_core::config::{AggregationMode, CheckConfig};
use firecheck_core::countdown::Interrupt;
use firecheck_core::oracle::{ConformanceReport, Verdict};
use firecheck_core::reference::ReferenceSet;
use firecheck_core::report::{format_reference_summary, format_report};
use firecheck_core::runner::{ConfigSource, Overrides, WeaponFireTestCase};
use firecheck_core::verifier::{ConformanceVerifier, FULL_CHECK};
use firecheck_protocol::InteractionBus;
use firecheck_replay::bus::{BusConfig, DeliveryFaults, LocalBus};
use firecheck_replay::replay::{ReplayConfig, Replayer};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const EXIT_ERROR: i32 = 3;

#[derive(Parser)]
#[command(name = "firecheck")]
#[command(about = "WeaponFire interaction conformance checker")]
#[command(version)]
struct Cli {
    /// Print reports as JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify a saved capture file against the reference dataset.
    Check {
        /// Test-case parameter file (JSON).
        #[arg(short, long)]
        config: PathBuf,

        /// Capture file written by `loopback --capture-out`.
        #[arg(long)]
        capture: PathBuf,

        /// Override the configured aggregation mode.
        #[arg(short, long, value_enum)]
        mode: Option<ModeArg>,
    },

    /// Run the test case against an in-process bus fed by the replayer.
    Loopback {
        /// Test-case parameter file (JSON).
        #[arg(short, long)]
        config: PathBuf,

        /// Replay period in milliseconds.
        #[arg(long, default_value = "6000")]
        period_ms: u64,

        /// Number of bus delivery threads.
        #[arg(long, default_value = "4")]
        workers: usize,

        /// Share of deliveries duplicated, in parts per million.
        #[arg(long, default_value = "0")]
        duplicate_ppm: u32,

        /// Seed for delivery faults.
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Save the discovered events to this file.
        #[arg(long)]
        capture_out: Option<PathBuf>,

        /// Override the configured aggregation mode.
        #[arg(short, long, value_enum)]
        mode: Option<ModeArg>,

        /// Override the configured observation window, in seconds.
        #[arg(short, long)]
        waiting_period: Option<u64>,
    },

    /// List the events of a reference dataset.
    Summary {
        /// Directory of reference JSON files.
        #[arg(short, long)]
        reference: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum ModeArg {
    AggregateAll,
    FailFast,
}

impl From<ModeArg> for AggregationMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::AggregateAll => AggregationMode::AggregateAll,
            ModeArg::FailFast => AggregationMode::FailFast,
        }
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Check {
            config,
            capture,
            mode,
        } => cmd_check(config, capture, mode, cli.json),
        Commands::Loopback {
            config,
            period_ms,
            workers,
            duplicate_ppm,
            seed,
            capture_out,
            mode,
            waiting_period,
        } => cmd_loopback(
            config,
            LoopbackArgs {
                period_ms,
                workers,
                duplicate_ppm,
                seed,
                capture_out,
                overrides: Overrides {
                    mode: mode.map(Into::into),
                    waiting_period,
                },
            },
            cli.json,
        ),
        Commands::Summary { reference } => cmd_summary(reference),
    };
    std::process::exit(code);
}

fn exit_code(verdict: Verdict) -> i32 {
    match verdict {
        Verdict::Pass => 0,
        Verdict::Fail => 1,
        Verdict::Inconclusive => 2,
    }
}

fn emit(report: &ConformanceReport, json: bool) -> i32 {
    if json {
        match serde_json::to_string_pretty(report) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error: failed to serialize report: {}", e);
                return EXIT_ERROR;
            }
        }
    } else {
        print!("{}", format_report(report));
    }
    exit_code(report.verdict)
}

fn cmd_check(
    config_path: PathBuf,
    capture_path: PathBuf,
    mode: Option<ModeArg>,
    json: bool,
) -> i32 {
    let capture = match CaptureLog::load(&capture_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}: {}", capture_path.display(), e);
            return EXIT_ERROR;
        }
    };
    eprintln!(
        "Loaded {} captured events ({} at {})",
        capture.events.len(),
        capture.metadata.source,
        capture.metadata.captured_at
    );

    let setup = CheckConfig::load(&config_path)
        .map_err(|e| format!("config: {}", e))
        .and_then(|config| {
            ReferenceSet::load_dir(&config.reference_dir)
                .map(|reference| (config, reference))
                .map_err(|e| format!("reference dataset: {}", e))
        });
    let report = match setup {
        Ok((config, reference)) => {
            let mode = mode.map(Into::into).unwrap_or(config.mode);
            ConformanceVerifier::from_config(&config).verify(
                &reference,
                &capture.into_discovered(),
                mode,
            )
        }
        Err(reason) => ConformanceReport::inconclusive(FULL_CHECK, reason),
    };
    emit(&report, json)
}

struct LoopbackArgs {
    period_ms: u64,
    workers: usize,
    duplicate_ppm: u32,
    seed: u64,
    capture_out: Option<PathBuf>,
    overrides: Overrides,
}

fn cmd_loopback(config_path: PathBuf, args: LoopbackArgs, json: bool) -> i32 {
    // The replayer needs the reference dataset up front; the test case
    // loads its own copy during setup.
    let events = match CheckConfig::load(&config_path)
        .map_err(|e| e.to_string())
        .and_then(|c| ReferenceSet::load_dir(&c.reference_dir).map_err(|e| e.to_string()))
    {
        Ok(reference) => reference.events().to_vec(),
        Err(reason) => {
            let report =
                ConformanceReport::inconclusive(FULL_CHECK, format!("setup failed: {}", reason));
            return emit(&report, json);
        }
    };

    let bus = match LocalBus::new(BusConfig {
        workers: args.workers,
        faults: DeliveryFaults {
            seed: args.seed,
            duplicate_ppm: args.duplicate_ppm,
            drop_ppm: 0,
        },
    }) {
        Ok(bus) => Arc::new(bus),
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_ERROR;
        }
    };

    let mut test_case = WeaponFireTestCase::new(
        bus.clone() as Arc<dyn InteractionBus>,
        ConfigSource::File(config_path),
    )
    .with_overrides(args.overrides);
    ctrlc_simple(&test_case.interrupt_handle());

    let replayer = match Replayer::start(
        bus.clone(),
        &events,
        ReplayConfig {
            period: Duration::from_millis(args.period_ms),
            rounds: None,
        },
    ) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_ERROR;
        }
    };

    let report = match test_case.run() {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_ERROR;
        }
    };
    let replay = replayer.stop();
    bus.wait_idle(Duration::from_secs(5));

    let stats = bus.stats();
    eprintln!(
        "Bus: {} published, {} delivered, {} duplicated; replay: {} rounds",
        stats.published, stats.delivered, stats.duplicated, replay.rounds
    );

    if let Some(path) = args.capture_out {
        let capture = CaptureLog::from_snapshot("loopback", &test_case.collector().snapshot());
        if let Err(e) = capture.save(&path) {
            eprintln!("Error: failed to save capture {}: {}", path.display(), e);
            return EXIT_ERROR;
        }
        eprintln!("Capture saved to {}", path.display());
    }

    emit(&report, json)
}

fn cmd_summary(reference_dir: PathBuf) -> i32 {
    match ReferenceSet::load_dir(&reference_dir) {
        Ok(reference) => {
            print!("{}", format_reference_summary(&reference));
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            EXIT_ERROR
        }
    }
}

/// Route SIGINT/SIGTERM to the observation-window interrupt.
fn ctrlc_simple(interrupt: &Interrupt) {
    // The handler reads the flag through a raw pointer for the rest of
    // the process lifetime, so the handle is leaked.
    let interrupt: &'static Interrupt = Box::leak(Box::new(interrupt.clone()));
    unsafe {
        static mut FLAG: *const AtomicBool = std::ptr::null();
        FLAG = interrupt.flag() as *const AtomicBool;

        extern "C" fn handler(_: libc::c_int) {
            unsafe {
                if !FLAG.is_null() {
                    (*FLAG).store(true, Ordering::SeqCst);
                }
            }
        }

        let h = handler as *const () as libc::sighandler_t;
        libc::signal(libc::SIGINT, h);
        libc::signal(libc::SIGTERM, h);
    }
}
