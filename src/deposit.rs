use eyre::{Result, WrapErr};
use serde_derive::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tree_hash::TreeHash;

use alloy::primitives::{B256, FixedBytes, U256, hex};

const WEI_PER_GWEI: u64 = 1_000_000_000;

/// Input shape errors, fatal for the record but never for the batch
#[derive(Debug, Error)]
pub enum MalformedRecord {
    #[error("{field} must be {expected} bytes, got {actual}")]
    BadLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("{field} is not valid hex: {source}")]
    BadHex {
        field: &'static str,
        source: hex::FromHexError,
    },
    #[error("deposit_data_root mismatch: file has {expected}, computed {computed}")]
    RootMismatch { expected: B256, computed: B256 },
}

/// One entry of a `deposit_data.json` batch file as written by the
/// staking deposit tooling. Hex fields typically carry no 0x prefix,
/// both forms are accepted.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DepositEntry {
    pub pubkey: String,
    pub withdrawal_credentials: String,
    #[serde(with = "serde_utils::quoted_u64")]
    pub amount: u64,
    pub signature: String,
    /// Root as computed by the generating tool, cross-checked when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deposit_data_root: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, tree_hash_derive::TreeHash, serde::Serialize)]
pub struct DepositData {
    /// Validator public key
    pub pubkey: FixedBytes<48>,
    /// Withdrawal credentials
    pub withdrawal_credentials: B256,
    /// Amount of ether deposited in gwei
    #[serde(with = "serde_utils::quoted_u64")]
    pub amount: u64,
    /// Deposit signature
    pub signature: FixedBytes<96>,
}

fn decode_fixed<const N: usize>(
    field: &'static str,
    s: &str,
) -> Result<FixedBytes<N>, MalformedRecord> {
    let bytes = hex::decode(s).map_err(|source| MalformedRecord::BadHex { field, source })?;
    match bytes.len() == N {
        true => Ok(FixedBytes::from_slice(&bytes)),
        false => Err(MalformedRecord::BadLength {
            field,
            expected: N,
            actual: bytes.len(),
        }),
    }
}

pub fn parse_pubkey(s: &str) -> Result<FixedBytes<48>, MalformedRecord> {
    decode_fixed::<48>("pubkey", s)
}

impl TryFrom<&DepositEntry> for DepositData {
    type Error = MalformedRecord;

    fn try_from(entry: &DepositEntry) -> Result<Self, Self::Error> {
        let data = DepositData {
            pubkey: parse_pubkey(&entry.pubkey)?,
            withdrawal_credentials: decode_fixed::<32>(
                "withdrawal_credentials",
                &entry.withdrawal_credentials,
            )?,
            amount: entry.amount,
            signature: decode_fixed::<96>("signature", &entry.signature)?,
        };
        if let Some(expected) = &entry.deposit_data_root {
            let expected: B256 = decode_fixed::<32>("deposit_data_root", expected)?;
            let computed = data.deposit_root();
            if expected != computed {
                return Err(MalformedRecord::RootMismatch { expected, computed });
            }
        }
        Ok(data)
    }
}

impl DepositData {
    /// SSZ hash tree root of the container, the deposit contract
    /// recomputes this from calldata and reverts on mismatch
    pub fn deposit_root(&self) -> B256 {
        self.tree_hash_root()
    }

    /// Deposit value in wei. Exact integer scaling, a u64 gwei amount
    /// always fits in 96 bits so the multiply cannot overflow.
    pub fn amount_wei(&self) -> U256 {
        U256::from(self.amount) * U256::from(WEI_PER_GWEI)
    }
}

/// Read and parse a `deposit_data.json` batch file
pub fn load_batch(path: &Path) -> Result<Vec<DepositEntry>> {
    let file = std::fs::File::open(path).wrap_err_with(|| format!("{:?}", path))?;
    let entries = serde_json::from_reader::<_, Vec<DepositEntry>>(std::io::BufReader::new(file))
        .wrap_err_with(|| format!("failed parsing {:?}", path))?;
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::b256;
    use std::collections::HashSet;

    fn zero_record() -> DepositData {
        DepositData {
            pubkey: FixedBytes::ZERO,
            withdrawal_credentials: B256::ZERO,
            amount: 32_000_000_000,
            signature: FixedBytes::ZERO,
        }
    }

    fn entry(pubkey: &str, credentials: &str, amount: u64, signature: &str) -> DepositEntry {
        DepositEntry {
            pubkey: pubkey.to_string(),
            withdrawal_credentials: credentials.to_string(),
            amount,
            signature: signature.to_string(),
            deposit_data_root: None,
        }
    }

    #[test]
    fn deposit_root_is_deterministic() {
        assert_eq!(zero_record().deposit_root(), zero_record().deposit_root());
    }

    // Pinned golden vector, any change to the merkleization breaks this
    #[test]
    fn zero_record_golden_root() {
        assert_eq!(
            zero_record().deposit_root(),
            b256!("05125366a514ddd17fc8158440399c02d631cdb991dffa30623107f27e43673d")
        );
    }

    // Recompute the 4-leaf container root by hand: pubkey and signature
    // byte vectors are chunked into 32-byte words, zero padded to the
    // next power of two and hashed pairwise, the amount is its 8-byte
    // little-endian serialization in a zero padded chunk
    #[test]
    fn root_matches_manual_merkleization() {
        use sha2::{Digest, Sha256};
        fn hash_pair(a: &[u8], b: &[u8]) -> [u8; 32] {
            let mut hasher = Sha256::new();
            hasher.update(a);
            hasher.update(b);
            hasher.finalize().into()
        }

        let data = DepositData {
            pubkey: [0xaa; 48].into(),
            withdrawal_credentials: [0xbb; 32].into(),
            amount: 32_000_000_000,
            signature: [0xcc; 96].into(),
        };

        let zero_chunk = [0u8; 32];
        let mut pubkey = [0u8; 64];
        pubkey[..48].copy_from_slice(data.pubkey.as_slice());
        let leaf_pubkey = hash_pair(&pubkey[..32], &pubkey[32..]);

        let leaf_credentials = data.withdrawal_credentials.0;

        let mut leaf_amount = [0u8; 32];
        leaf_amount[..8].copy_from_slice(&data.amount.to_le_bytes());

        let signature = data.signature.as_slice();
        let leaf_signature = hash_pair(
            &hash_pair(&signature[..32], &signature[32..64]),
            &hash_pair(&signature[64..96], &zero_chunk),
        );

        let root = hash_pair(
            &hash_pair(&leaf_pubkey, &leaf_credentials),
            &hash_pair(&leaf_amount, &leaf_signature),
        );
        assert_eq!(data.deposit_root(), B256::from(root));
    }

    #[test]
    fn any_field_change_moves_the_root() {
        let base = zero_record();
        let mut roots = vec![base.deposit_root()];

        let mut flipped = base.clone();
        let mut pubkey = [0u8; 48];
        pubkey[0] = 1;
        flipped.pubkey = pubkey.into();
        roots.push(flipped.deposit_root());

        let mut flipped = base.clone();
        let mut credentials = [0u8; 32];
        credentials[31] = 1;
        flipped.withdrawal_credentials = credentials.into();
        roots.push(flipped.deposit_root());

        let mut flipped = base.clone();
        flipped.amount += 1;
        roots.push(flipped.deposit_root());

        let mut flipped = base.clone();
        let mut signature = [0u8; 96];
        signature[95] = 1;
        flipped.signature = signature.into();
        roots.push(flipped.deposit_root());

        let unique: HashSet<_> = roots.iter().collect();
        assert_eq!(unique.len(), roots.len());
    }

    #[test]
    fn short_pubkey_is_rejected() {
        let e = entry(
            &"00".repeat(47),
            &"00".repeat(32),
            32_000_000_000,
            &"00".repeat(96),
        );
        match DepositData::try_from(&e) {
            Err(MalformedRecord::BadLength {
                field: "pubkey",
                expected: 48,
                actual: 47,
            }) => {}
            other => panic!("expected BadLength, got {other:?}"),
        }
    }

    #[test]
    fn bad_hex_is_rejected() {
        let e = entry(
            &"zz".repeat(48),
            &"00".repeat(32),
            32_000_000_000,
            &"00".repeat(96),
        );
        assert!(matches!(
            DepositData::try_from(&e),
            Err(MalformedRecord::BadHex { field: "pubkey", .. })
        ));
    }

    #[test]
    fn prefixed_hex_is_accepted() {
        let bare = entry(
            &"aa".repeat(48),
            &"bb".repeat(32),
            32_000_000_000,
            &"cc".repeat(96),
        );
        let prefixed = entry(
            &format!("0x{}", "aa".repeat(48)),
            &format!("0x{}", "bb".repeat(32)),
            32_000_000_000,
            &format!("0x{}", "cc".repeat(96)),
        );
        assert_eq!(
            DepositData::try_from(&bare).unwrap(),
            DepositData::try_from(&prefixed).unwrap()
        );
    }

    #[test]
    fn file_root_is_cross_checked() {
        let mut e = entry(
            &"00".repeat(48),
            &"00".repeat(32),
            32_000_000_000,
            &"00".repeat(96),
        );
        e.deposit_data_root =
            Some("05125366a514ddd17fc8158440399c02d631cdb991dffa30623107f27e43673d".to_string());
        assert!(DepositData::try_from(&e).is_ok());

        e.deposit_data_root = Some("11".repeat(32));
        assert!(matches!(
            DepositData::try_from(&e),
            Err(MalformedRecord::RootMismatch { .. })
        ));
    }

    #[test]
    fn amount_scaling_is_exact() {
        let mut data = zero_record();
        data.amount = 1;
        assert_eq!(data.amount_wei(), U256::from(1_000_000_000u64));

        // Not a multiple of 1e9 gwei, must scale without loss
        data.amount = 32_000_000_007;
        assert_eq!(
            data.amount_wei(),
            U256::from(32_000_000_007u64) * U256::from(1_000_000_000u64)
        );

        data.amount = u64::MAX;
        assert_eq!(
            data.amount_wei(),
            U256::from(u64::MAX) * U256::from(1_000_000_000u64)
        );
    }

    #[test]
    fn parses_staking_cli_entries() {
        // amount as a bare number (original deposit file format)
        let json = format!(
            r#"[{{"pubkey":"{}","withdrawal_credentials":"{}","amount":32000000000,"signature":"{}"}}]"#,
            "aa".repeat(48),
            "bb".repeat(32),
            "cc".repeat(96),
        );
        let entries: Vec<DepositEntry> = serde_json::from_str(&json).unwrap();
        assert_eq!(entries[0].amount, 32_000_000_000);
        assert!(entries[0].deposit_data_root.is_none());

        // amount quoted
        let json = format!(
            r#"[{{"pubkey":"{}","withdrawal_credentials":"{}","amount":"1000000000","signature":"{}"}}]"#,
            "aa".repeat(48),
            "bb".repeat(32),
            "cc".repeat(96),
        );
        let entries: Vec<DepositEntry> = serde_json::from_str(&json).unwrap();
        assert_eq!(entries[0].amount, 1_000_000_000);
    }
}
