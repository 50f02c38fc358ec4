use colored::*;
use log::*;
use thiserror::Error;

use alloy::primitives::TxHash;

use crate::{
    deposit::{DepositData, DepositEntry, MalformedRecord},
    helpers,
    ledger::{Ledger, LedgerError},
    submitter::{SubmitError, Submitter},
};

/// Why a record failed. In every case the completion marker is absent
/// and a future batch run retries the record, except for
/// `PostSubmitRecording` where the transaction DID go out.
#[derive(Debug, Error)]
pub enum RecordFailure {
    #[error("malformed record: {0}")]
    Malformed(#[from] MalformedRecord),
    #[error("submission failed: {0}")]
    Submit(#[from] SubmitError),
    /// The one state where re-running would double-submit, requires
    /// operator reconciliation before the next run
    #[error("tx {tx_hash} sent but the completion marker could not be written: {source}")]
    PostSubmitRecording { tx_hash: TxHash, source: LedgerError },
}

#[derive(Debug)]
pub enum Outcome {
    /// Completion marker already present, submitter not invoked
    Skipped,
    Submitted(TxHash),
    Failed(RecordFailure),
}

#[derive(Debug)]
pub struct RecordOutcome {
    /// Position in the input batch
    pub index: usize,
    /// Pubkey as it appeared in the input
    pub pubkey: String,
    pub outcome: Outcome,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<RecordOutcome>,
    /// Set when the pass stopped before reaching the end of the batch
    pub halted: bool,
}

impl BatchReport {
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped))
    }

    pub fn submitted(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Submitted(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.outcomes.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Walks the batch strictly in input order, one record's full
/// lifecycle (marker check -> root -> submit -> mark) completes before
/// the next record starts. Per-record failures never abort the pass,
/// an unreadable ledger always does.
pub struct BatchProcessor<'a, S: Submitter> {
    ledger: &'a Ledger,
    submitter: &'a S,
}

impl<'a, S: Submitter> BatchProcessor<'a, S> {
    pub fn new(ledger: &'a Ledger, submitter: &'a S) -> Self {
        BatchProcessor { ledger, submitter }
    }

    pub async fn process(&self, entries: &[DepositEntry]) -> Result<BatchReport, LedgerError> {
        let mut report = BatchReport::default();
        for (index, entry) in entries.iter().enumerate() {
            let push = |report: &mut BatchReport, outcome| {
                report.outcomes.push(RecordOutcome {
                    index,
                    pubkey: entry.pubkey.clone(),
                    outcome,
                });
            };

            let data = match DepositData::try_from(entry) {
                Ok(data) => data,
                Err(e) => {
                    warn!("record {index} ({}): {e}", entry.pubkey);
                    push(&mut report, Outcome::Failed(e.into()));
                    continue;
                }
            };
            let pubkey = helpers::short_hex(data.pubkey.as_slice());

            if self.ledger.is_complete(&data.pubkey)? {
                info!("deposit for {} already processed, skipping", pubkey.blue());
                push(&mut report, Outcome::Skipped);
                continue;
            }

            let root = data.deposit_root();
            trace!("deposit root for {}: {}", pubkey, root);

            match self.submitter.submit(&data, root).await {
                Ok(tx_hash) => {
                    if let Err(source) = self.ledger.mark_complete(&data.pubkey) {
                        // Loud and terminal: the tx went out unrecorded,
                        // a re-run before reconciliation double-submits
                        error!(
                            "tx {} for {} SENT but marker write failed, \
                             reconcile manually before the next run: {source}",
                            tx_hash.to_string().red(),
                            pubkey.blue(),
                        );
                        push(
                            &mut report,
                            Outcome::Failed(RecordFailure::PostSubmitRecording { tx_hash, source }),
                        );
                        report.halted = true;
                        break;
                    }
                    info!(
                        "deposit for {} sent, tx {}",
                        pubkey.blue(),
                        tx_hash.to_string().red()
                    );
                    push(&mut report, Outcome::Submitted(tx_hash));
                }
                Err(e) => {
                    error!("deposit for {} failed: {e}", pubkey.blue());
                    push(&mut report, Outcome::Failed(e.into()));
                }
            }
        }
        Ok(report)
    }
}

pub fn print_report(report: &BatchReport) {
    for record in &report.outcomes {
        let (status, detail) = match &record.outcome {
            Outcome::Skipped => ("SKIPPED".yellow().bold(), String::default()),
            Outcome::Submitted(tx_hash) => {
                ("SUBMITTED".green().bold(), tx_hash.to_string().red().to_string())
            }
            Outcome::Failed(e) => ("FAILED".red().bold(), e.to_string()),
        };
        println!(
            "{:<3} {:<10} {}  {}",
            format!("{}.", record.index + 1).green().bold(),
            status,
            record.pubkey.blue(),
            detail,
        );
    }
    println!(
        "\n{} {} submitted, {} skipped, {} failed{}",
        "Batch complete:".white().bold(),
        report.submitted().to_string().green(),
        report.skipped().to_string().yellow(),
        report.failed().to_string().red(),
        match report.halted {
            true => " (halted early)".red().bold().to_string(),
            false => String::default(),
        },
    );
}
