use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use alloy::primitives::{FixedBytes, hex};

/// Marker storage is broken, the batch cannot safely continue:
/// treating "unknown" as "not done" risks a double submission and
/// treating it as "done" silently skips a real deposit.
#[derive(Debug, Error)]
#[error("completion ledger unavailable at {path:?}: {source}")]
pub struct LedgerError {
    pub path: PathBuf,
    pub source: io::Error,
}

/// Persistent at-most-once marker store. One empty `<pubkey>.lock`
/// file per submitted validator, created exclusively and never
/// modified or removed. Marker presence is the datum, so a concurrent
/// run racing on the same key loses the create and degrades to a
/// harmless no-op instead of a second submission.
pub struct Ledger {
    dir: PathBuf,
}

impl Ledger {
    /// Open the marker directory, creating it if needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Ledger, LedgerError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| LedgerError {
            path: dir.clone(),
            source,
        })?;
        Ok(Ledger { dir })
    }

    /// Default marker namespace for a batch file: `<file>-locks`
    /// alongside the input
    pub fn default_dir(batch_file: &Path) -> PathBuf {
        let mut os = batch_file.as_os_str().to_os_string();
        os.push("-locks");
        PathBuf::from(os)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn marker_path(&self, pubkey: &FixedBytes<48>) -> PathBuf {
        self.dir.join(format!("{}.lock", hex::encode(pubkey)))
    }

    pub fn is_complete(&self, pubkey: &FixedBytes<48>) -> Result<bool, LedgerError> {
        let path = self.marker_path(pubkey);
        match fs::metadata(&path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(LedgerError { path, source }),
        }
    }

    /// Atomic create-exclusive, a lost race (marker already present)
    /// is a no-op success
    pub fn mark_complete(&self, pubkey: &FixedBytes<48>) -> Result<(), LedgerError> {
        let path = self.marker_path(pubkey);
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
            Err(source) => Err(LedgerError { path, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pubkey(fill: u8) -> FixedBytes<48> {
        [fill; 48].into()
    }

    #[test]
    fn fresh_key_is_not_complete() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(tmp.path().join("locks")).unwrap();
        assert!(!ledger.is_complete(&pubkey(1)).unwrap());
    }

    #[test]
    fn marked_key_is_complete() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(tmp.path().join("locks")).unwrap();
        ledger.mark_complete(&pubkey(1)).unwrap();
        assert!(ledger.is_complete(&pubkey(1)).unwrap());
        assert!(!ledger.is_complete(&pubkey(2)).unwrap());
    }

    #[test]
    fn mark_complete_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(tmp.path().join("locks")).unwrap();
        ledger.mark_complete(&pubkey(1)).unwrap();
        ledger.mark_complete(&pubkey(1)).unwrap();
        assert!(ledger.is_complete(&pubkey(1)).unwrap());
    }

    #[test]
    fn marker_create_is_exclusive() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(tmp.path().join("locks")).unwrap();
        let path = ledger.marker_path(&pubkey(1));
        std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .unwrap();
        // Second exclusive create loses the race
        assert!(
            std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .is_err()
        );
        // But mark_complete treats the lost race as done
        ledger.mark_complete(&pubkey(1)).unwrap();
    }

    #[test]
    fn broken_storage_is_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        // A regular file where the marker directory should be
        let clash = tmp.path().join("locks");
        std::fs::write(&clash, b"").unwrap();
        assert!(Ledger::open(&clash).is_err());

        let ledger = Ledger { dir: clash };
        assert!(ledger.is_complete(&pubkey(1)).is_err());
        assert!(ledger.mark_complete(&pubkey(1)).is_err());
    }

    #[test]
    fn default_dir_sits_next_to_the_batch_file() {
        assert_eq!(
            Ledger::default_dir(Path::new("/tmp/deposit_data.json")),
            PathBuf::from("/tmp/deposit_data.json-locks")
        );
    }
}
