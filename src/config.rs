use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::{fs::File, io::BufReader};

use eyre::{Result, WrapErr, bail};
use serde_derive::Deserialize;

use clap_serde_derive::{
    ClapSerde,
    clap::{self, Parser, Subcommand},
};

#[allow(deprecated)]
fn datadir() -> PathBuf {
    std::env::home_dir().unwrap().join(".eth-depositor")
}

#[allow(deprecated)]
fn config_file() -> PathBuf {
    match std::env::var("XDG_CONFIG_HOME") {
        Ok(dir) => PathBuf::from(OsString::from(dir)),
        _ => std::env::home_dir().unwrap().join(".config"),
    }
    .join("eth-depositor")
    .join("config.toml")
}

#[derive(Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Config file
    #[arg(short, long = "config", default_value = config_file().into_os_string())]
    pub config_path: Option<PathBuf>,

    /// Global arguments
    #[command(flatten)]
    pub config: <CliArgs as ClapSerde>::Opt,

    // Subcommands
    #[command(subcommand)]
    pub command: CliCmd,
}

// Make sure all values are optional or parsing fails if a value
// is missing in the config file
#[derive(Debug, Clone, ClapSerde, Deserialize)]
pub struct CliArgs {
    /// Logging level
    #[arg(short, long = "log-level", required = false, default_value = "3")]
    pub log_level: Option<u8>,

    /// Data directory
    #[arg(long = "datadir", default_value = datadir().into_os_string())]
    pub datadir: Option<PathBuf>,

    /// Transaction DB
    #[arg(long = "tx-db", default_value = "tx_db.json")]
    pub tx_db: Option<PathBuf>,

    /// JsonRPC URL
    #[arg(long = "rpc-url", required = false)]
    pub rpc_url: Option<String>,
}

// Command line cmds
#[derive(Subcommand)]
pub enum CliCmd {
    /// Print version information
    #[clap(visible_alias = "ver")]
    Version {},
    /// Submit every pending deposit in a batch file
    #[clap(visible_alias = "s")]
    Submit {
        /// Deposit data file (staking-cli deposit_data.json)
        #[arg(required = true)]
        file: PathBuf,
        /// Operator private key (hex)
        #[arg(long, required = false, visible_alias = "key", conflicts_with = "keyfile")]
        private_key: Option<String>,
        /// File containing the operator private key (hex)
        #[arg(short, long, required = false)]
        keyfile: Option<PathBuf>,
        /// Deposit contract address (defaults to the connected chain's)
        #[arg(long, required = false)]
        contract: Option<String>,
        /// Completion marker directory (defaults to "<file>-locks")
        #[arg(long = "lock-dir", required = false)]
        lock_dir: Option<PathBuf>,
        /// Skip user confirmation ("YES" prompt)
        #[arg(short, long, required = false, action = clap::ArgAction::SetTrue)]
        yes: bool,
        /// fee args
        #[command(flatten)]
        fees: FeeArgs,
    },
    /// Compute and print deposit roots without touching the network
    #[clap(visible_alias = "r")]
    Root {
        /// Deposit data file
        #[arg(required = true)]
        file: PathBuf,
    },
    /// Show per-record completion state for a batch file
    #[clap(visible_alias = "st")]
    Status {
        /// Deposit data file
        #[arg(required = true)]
        file: PathBuf,
        /// Completion marker directory (defaults to "<file>-locks")
        #[arg(long = "lock-dir", required = false)]
        lock_dir: Option<PathBuf>,
    },
    /// List previously submitted deposit transactions
    #[clap(visible_alias = "h")]
    History {
        /// Chain id (omit for all)
        chain_id: Option<u64>,
    },
}

#[derive(Debug, Clone, Parser)]
#[clap(
    // Fees are "all-or-none", if one is present the other must be as well
    group(clap::ArgGroup::new("fee_args")
        .required(false)
        .multiple(true)
        .requires_all(&["max_fee", "max_priority"])
        .args(&["max_fee", "max_priority"])
    )
)]
pub struct FeeArgs {
    /// Max priority fee per gas in gwei
    #[arg(long, required = false)]
    pub max_priority: Option<f64>,
    /// Max fee per gas in gwei
    #[arg(long, required = false)]
    pub max_fee: Option<f64>,
    /// TX gas limit
    #[arg(long, required = false)]
    pub gas_limit: Option<u64>,
}

pub fn merge_args_from_file<T>(
    args: <T as ClapSerde>::Opt,
    maybe_path: Option<PathBuf>,
) -> Result<T>
where
    T: ClapSerde + serde::de::DeserializeOwned,
{
    match maybe_path {
        Some(path) => {
            let config_path = std::path::Path::new(&path);
            match config_path.exists() {
                true => {
                    let config = match config_path.extension().and_then(OsStr::to_str) {
                        Some("toml") => read_toml_config::<T, _>(config_path),
                        Some("json") => read_json_config::<T, _>(config_path),
                        Some("jsonc") => read_jsonc_config::<T, _>(config_path),
                        _ => {
                            bail!("Unsupported config file type: {:?}", path);
                        }
                    }?;
                    // Fields which are not None in `other` will be cleared and used to update `self`.
                    // Fields which are None in `other` will not be modified in `self`.
                    Ok(T::from(args).merge(config))
                }
                false => Ok(T::from(args)),
            }
        }
        None => Ok(T::from(args)),
    }
}

fn read_toml_config<T, P: AsRef<std::path::Path>>(path: P) -> Result<<T as ClapSerde>::Opt>
where
    P: AsRef<std::path::Path> + std::fmt::Debug + Copy,
    T: ClapSerde + serde::de::DeserializeOwned,
{
    let content = std::fs::read_to_string(path).wrap_err_with(|| format!("{:?}", path))?;
    Ok(toml::from_str(&content)?)
}

fn read_json_config<T: ClapSerde, P: AsRef<std::path::Path>>(
    path: P,
) -> Result<<T as ClapSerde>::Opt>
where
    P: AsRef<std::path::Path> + std::fmt::Debug + Copy,
{
    let f = File::open(path).wrap_err_with(|| format!("{:?}", path))?;
    let json_cfg = serde_json::from_reader::<_, <T as ClapSerde>::Opt>(BufReader::new(f))?;
    Ok(json_cfg)
}

fn read_jsonc_config<T: ClapSerde, P: AsRef<std::path::Path>>(
    path: P,
) -> Result<<T as ClapSerde>::Opt>
where
    P: AsRef<std::path::Path> + std::fmt::Debug + Copy,
{
    let f = File::open(path).wrap_err_with(|| format!("{:?}", path))?;
    let jsonc_cfg = serde_jsonc::from_reader::<_, <T as ClapSerde>::Opt>(BufReader::new(f))?;
    Ok(jsonc_cfg)
}
