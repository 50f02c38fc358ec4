use colored::*;
use eyre::Result;
use serde_derive::{Deserialize, Serialize};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use time::OffsetDateTime;

use alloy::primitives::TxHash;

use crate::chain;
use crate::helpers::datetime::Timezone;

/// One successfully sent deposit transaction. Audit trail only, the
/// completion ledger is what carries the idempotency guarantee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxEntry {
    pub timestamp: u64,
    pub chain_id: u64,
    pub pubkey: String,
    pub tx_hash: TxHash,
}

pub struct TxDb {
    store: jfs::Store,
}

impl TxDb {
    pub fn open(dbfile: &Path) -> Result<TxDb> {
        if let Some(dir) = dbfile.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let mut cfg = jfs::Config::default();
        cfg.single = true;
        cfg.pretty = true;
        Ok(TxDb {
            store: jfs::Store::new_with_cfg(dbfile, cfg)?,
        })
    }

    pub fn record(&self, chain_id: u64, pubkey: &str, tx_hash: &TxHash) -> Result<()> {
        let entry = TxEntry {
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_secs(),
            chain_id,
            pubkey: pubkey.to_string(),
            tx_hash: *tx_hash,
        };
        self.store
            .save_with_id(&entry, entry.tx_hash.to_string().as_str())?;
        Ok(())
    }

    pub fn print(&self, chain_id: Option<u64>) -> Result<()> {
        let all = self.store.all::<TxEntry>()?;
        let mut sorted: Vec<&TxEntry> = all.iter().map(|(_hash, entry)| entry).collect();
        sorted.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        let mut i = 0;
        for entry in sorted {
            if chain_id.is_some() && chain_id.unwrap() != entry.chain_id {
                continue;
            }
            i = i + 1;
            println!(
                "{:<3} {}\n    {:<12}{}\n    {:<12}{}\n    {:<12}{}",
                format!("{}.", i).green().bold(),
                entry.tx_hash.to_string().red(),
                "timestamp:".white().bold(),
                OffsetDateTime::from_unix_timestamp(i64::try_from(entry.timestamp)?)
                    .unwrap_or(OffsetDateTime::UNIX_EPOCH)
                    .to_localtime()
                    .to_formatted_string()
                    .white(),
                "chain:".white().bold(),
                format!("{} ({})", chain::name(entry.chain_id), entry.chain_id).green(),
                "pubkey:".white().bold(),
                entry.pubkey.blue(),
            );
        }
        Ok(())
    }
}
