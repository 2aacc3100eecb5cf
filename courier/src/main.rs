//! Command-line entry point for the courier.

use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::error;

use courier::core::registry::CATEGORIES;
use courier::cycle::Courier;
use courier::exit_codes;
use courier::io::chain::RpcChain;
use courier::io::config::{CourierConfig, load_config};
use courier::io::http::build_client;
use courier::io::scanner::AtomicAssetsScanner;
use courier::io::submitter::TransactionSubmitter;
use courier::logging;
use courier::looping::{LoopStop, Schedule, run_loop};

#[derive(Parser)]
#[command(
    name = "courier",
    version,
    about = "Unattended NFT transfer agent for EOSIO chains"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan the inventory and transfer each recipient's quota.
    Run {
        /// Path to the TOML config.
        #[arg(short, long)]
        config: PathBuf,
        /// Number of scan cycles to run.
        #[arg(long, default_value_t = 1, conflicts_with = "forever")]
        cycles: u32,
        /// Keep scanning until the process is stopped.
        #[arg(long)]
        forever: bool,
    },
    /// Validate the config and print signers and quotas. No network access.
    Check {
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    let code = match cli.command {
        Command::Run {
            config,
            cycles,
            forever,
        } => {
            let schedule = if forever {
                Schedule::UntilCancelled
            } else {
                Schedule::Cycles(cycles)
            };
            cmd_run(&config, schedule)
        }
        Command::Check { config } => cmd_check(&config),
    };
    process::exit(code);
}

fn cmd_run(path: &Path, schedule: Schedule) -> i32 {
    let courier = match load_config(path).and_then(build_courier) {
        Ok(courier) => courier,
        Err(err) => {
            error!(error = %format!("{err:#}"), "cannot start");
            eprintln!("{err:#}");
            return exit_codes::INVALID;
        }
    };
    let cancel = AtomicBool::new(false);
    let outcome = run_loop(&courier, schedule, &cancel);
    match outcome.stop {
        LoopStop::Halted { .. } => exit_codes::HALTED,
        LoopStop::Completed | LoopStop::Cancelled => exit_codes::OK,
    }
}

fn build_courier(config: CourierConfig) -> Result<Courier<AtomicAssetsScanner, RpcChain>> {
    let client = build_client(config.timing.request_timeout(), config.proxy.as_deref())
        .context("build http client")?;
    let scanner = AtomicAssetsScanner::new(
        client.clone(),
        &config.assets_url,
        &config.collection,
        config.scan_limit,
        config.http_retry(),
    );
    let chain = RpcChain::new(client, &config.rpc_url);
    let submitter = TransactionSubmitter::from_config(chain, &config)?;
    Ok(Courier::new(config, scanner, submitter))
}

fn cmd_check(path: &Path) -> i32 {
    match check(path) {
        Ok(report) => {
            print!("{report}");
            exit_codes::OK
        }
        Err(err) => {
            eprintln!("{err:#}");
            exit_codes::INVALID
        }
    }
}

fn check(path: &Path) -> Result<String> {
    let config = load_config(path)?;
    let mut report = String::new();
    report.push_str(&format!(
        "account: {} ({})\n",
        config.account,
        config.signing_key()?.public_key()
    ));
    if let Some(payer) = &config.fee_payer {
        let key: courier::core::keys::PrivateKey =
            payer.private_key.parse().context("fee_payer.private_key")?;
        report.push_str(&format!("fee payer: {} ({})\n", payer.account, key.public_key()));
    }
    for recipient in &config.recipients {
        let quota = CATEGORIES
            .iter()
            .map(|category| format!("{}={}", category.name, recipient.requested(category)))
            .collect::<Vec<_>>()
            .join(" ");
        report.push_str(&format!("recipient {}: {quota}\n", recipient.account));
    }
    Ok(report)
}
