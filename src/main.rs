#[macro_use]
extern crate log;

use clap::Parser;
use colored::*;
use eyre::{Result, WrapErr, bail, eyre};
use std::io::Write;
use std::path::{Path, PathBuf};

use alloy::{
    network::EthereumWallet,
    primitives::{Address, U256},
    signers::local::PrivateKeySigner,
};

use eth_depositor::{
    batch::{self, BatchProcessor, Outcome, RecordFailure},
    chain,
    config::{self, Cli, CliArgs, CliCmd, FeeArgs},
    deposit::{self, DepositData},
    helpers,
    ledger::Ledger,
    logger,
    rpc::Client,
    submitter::ContractSubmitter,
    tx_db::TxDb,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse args with clap
    let args = Cli::parse();

    // Load config file & shellexpand datadir so we can use "~/...", etc
    let mut config = config::merge_args_from_file::<CliArgs>(args.config, args.config_path)?;
    config.datadir = Some(
        shellexpand::full(
            &config
                .datadir
                .unwrap()
                .into_os_string()
                .into_string()
                .unwrap(),
        )?
        .to_string()
        .into(),
    );

    // Setup our global logger
    logger::init(config.log_level.unwrap_or(3u8));

    match args.command {
        CliCmd::Version {} => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        CliCmd::Root { file } => cmd_root(&file),
        CliCmd::Status { file, lock_dir } => cmd_status(&file, lock_dir),
        CliCmd::History { chain_id } => cmd_history(&config, chain_id),
        CliCmd::Submit {
            file,
            private_key,
            keyfile,
            contract,
            lock_dir,
            yes,
            fees,
        } => {
            cmd_submit(
                &config,
                &file,
                private_key,
                keyfile,
                contract,
                lock_dir,
                yes,
                fees,
            )
            .await
        }
    }
}

fn load_signer(private_key: Option<String>, keyfile: Option<PathBuf>) -> Result<PrivateKeySigner> {
    let key = match (private_key, keyfile) {
        (Some(key), _) => key,
        (None, Some(path)) => {
            let path = shellexpand::full(path.to_str().unwrap_or_default())?.to_string();
            std::fs::read_to_string(&path).wrap_err_with(|| format!("{:?}", path))?
        }
        (None, None) => bail!("either --private-key or --keyfile is required"),
    };
    key.trim()
        .parse::<PrivateKeySigner>()
        .map_err(|e| eyre!("operator private key parsing failed: {e}"))
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim() == "YES")
}

#[allow(clippy::too_many_arguments)]
async fn cmd_submit(
    config: &CliArgs,
    file: &Path,
    private_key: Option<String>,
    keyfile: Option<PathBuf>,
    contract: Option<String>,
    lock_dir: Option<PathBuf>,
    yes: bool,
    fees: FeeArgs,
) -> Result<()> {
    let entries = deposit::load_batch(file)?;
    if entries.is_empty() {
        bail!("no deposit records in {:?}", file);
    }

    let signer = load_signer(private_key, keyfile)?;
    let from = signer.address();

    let rpc_url = config
        .rpc_url
        .clone()
        .ok_or_else(|| eyre!("--rpc-url is required for submission"))?;
    let client = Client::new(&rpc_url, EthereumWallet::from(signer))?;
    client.connect().await?;
    let chain_id = client.chain_id();

    let contract = match contract {
        Some(addr) => addr
            .parse::<Address>()
            .wrap_err("invalid --contract address")?,
        None => match chain::by_id(chain_id) {
            Some(cd) => cd.deposit_contract,
            None => bail!("unknown chain {chain_id}, an explicit --contract is required"),
        },
    };

    let ledger = Ledger::open(lock_dir.unwrap_or_else(|| Ledger::default_dir(file)))?;

    let balance = client.balance(&from).await?;
    let total_gwei: u128 = entries.iter().map(|e| e.amount as u128).sum();
    let total_wei = U256::from(total_gwei) * U256::from(1_000_000_000u64);

    let align = 16;
    let mut pretty = String::default();
    macro_rules! push_field {
        ($s:expr, $v:expr, $c:ident) => {
            pretty.push_str(
                format!(
                    "\n    {:align$}{}",
                    format!("{}:", $s).white().bold(),
                    format!("{}", $v).$c(),
                )
                .as_str(),
            );
        };
    }
    push_field!("batch", file.display(), white);
    push_field!("records", entries.len(), magenta);
    push_field!(
        "chain",
        format!("{} ({})", chain::name(chain_id), chain_id),
        green
    );
    push_field!("contract", contract, blue);
    push_field!("operator", from, blue);
    push_field!(
        "balance",
        format!("{} eth", helpers::format_eth(&balance)),
        yellow
    );
    push_field!(
        "total",
        format!("{} eth", helpers::format_eth(&total_wei)),
        yellow
    );
    push_field!("lock_dir", ledger.dir().display(), white);
    println!("{pretty}\n");

    if !yes
        && !confirm(
            format!(
                "{} {} {}\n",
                "Please type".green(),
                "YES".red().bold(),
                "to confirm submitting the batch, anything else aborts.".green(),
            )
            .as_str(),
        )?
    {
        bail!("aborted");
    }

    let submitter = ContractSubmitter::new(&client, contract, from, fees);
    let report = BatchProcessor::new(&ledger, &submitter)
        .process(&entries)
        .await?;

    // Best-effort audit trail, the ledger already recorded completion
    let dbfile = config
        .datadir
        .clone()
        .unwrap()
        .join(config.tx_db.clone().unwrap());
    match TxDb::open(&dbfile) {
        Ok(db) => {
            for record in &report.outcomes {
                let tx_hash = match &record.outcome {
                    Outcome::Submitted(tx_hash) => Some(tx_hash),
                    Outcome::Failed(RecordFailure::PostSubmitRecording { tx_hash, .. }) => {
                        Some(tx_hash)
                    }
                    _ => None,
                };
                if let Some(tx_hash) = tx_hash {
                    if let Err(e) = db.record(chain_id, &record.pubkey, tx_hash) {
                        warn!("failed recording tx {tx_hash} in the history DB: {e}");
                    }
                }
            }
        }
        Err(e) => warn!("history DB unavailable: {e}"),
    }

    batch::print_report(&report);
    match report.failed() {
        0 => Ok(()),
        n => bail!("{} of {} records failed", n, report.outcomes.len()),
    }
}

fn cmd_root(file: &Path) -> Result<()> {
    let entries = deposit::load_batch(file)?;
    let mut malformed = 0;
    for (i, entry) in entries.iter().enumerate() {
        match DepositData::try_from(entry) {
            Ok(data) => println!(
                "{:<3} {} {}",
                format!("{}.", i + 1).green().bold(),
                helpers::short_hex(data.pubkey.as_slice()).blue(),
                data.deposit_root().to_string().red(),
            ),
            Err(e) => {
                malformed += 1;
                println!(
                    "{:<3} {} {}",
                    format!("{}.", i + 1).green().bold(),
                    entry.pubkey.blue(),
                    e.to_string().red(),
                );
            }
        }
    }
    match malformed {
        0 => Ok(()),
        n => bail!("{} of {} records are malformed", n, entries.len()),
    }
}

fn cmd_status(file: &Path, lock_dir: Option<PathBuf>) -> Result<()> {
    let entries = deposit::load_batch(file)?;
    let ledger = Ledger::open(lock_dir.unwrap_or_else(|| Ledger::default_dir(file)))?;
    let mut pending = 0;
    for (i, entry) in entries.iter().enumerate() {
        let status = match deposit::parse_pubkey(&entry.pubkey) {
            Ok(pubkey) => match ledger.is_complete(&pubkey)? {
                true => "SUBMITTED".green().bold(),
                false => {
                    pending += 1;
                    "PENDING".yellow().bold()
                }
            },
            Err(_) => {
                pending += 1;
                "MALFORMED".red().bold()
            }
        };
        println!(
            "{:<3} {:<10} {}",
            format!("{}.", i + 1).green().bold(),
            status,
            entry.pubkey.blue(),
        );
    }
    println!(
        "\n{} {} of {} records pending",
        "Status:".white().bold(),
        pending.to_string().yellow(),
        entries.len(),
    );
    Ok(())
}

fn cmd_history(config: &CliArgs, chain_id: Option<u64>) -> Result<()> {
    let dbfile = config
        .datadir
        .clone()
        .unwrap()
        .join(config.tx_db.clone().unwrap());
    TxDb::open(&dbfile)?.print(chain_id)
}
