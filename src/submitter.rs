use log::*;
use thiserror::Error;

use alloy::{
    network::TransactionBuilder,
    primitives::{Address, B256, Bytes, TxHash},
    providers::Provider,
    sol_types::SolCall,
    transports::{RpcError, TransportErrorKind},
};

use crate::{config::FeeArgs, deposit::DepositData, rpc::Client};

// https://github.com/ethereum/consensus-specs/blob/dev/solidity_deposit_contract/deposit_contract.sol
alloy::sol! {
    #[derive(Debug, PartialEq)]
    interface IDepositContract {
        /// @notice Submit a Phase 0 DepositData object.
        /// @param pubkey A BLS12-381 public key.
        /// @param withdrawal_credentials Commitment to a public key for withdrawals.
        /// @param signature A BLS12-381 signature.
        /// @param deposit_data_root The SHA-256 hash of the SSZ-encoded DepositData object.
        /// Used as a protection against malformed input.
        function deposit(
            bytes calldata pubkey,
            bytes calldata withdrawal_credentials,
            bytes calldata signature,
            bytes32 deposit_data_root
        ) external payable;
    }
}

/// A failed submission leaves the record unmarked, a future batch run
/// picks it up again
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("network error: {0}")]
    Network(String),
    /// The deposit contract rejected the calldata, typically a deposit
    /// root mismatch
    #[error("contract reverted: {0}")]
    ContractRevert(String),
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),
}

/// Sends one deposit transaction per call. Called at most once per
/// record per batch pass, implementations must not retry internally.
/// Success is the send call returning a hash, confirmation/finality is
/// not awaited.
pub trait Submitter {
    async fn submit(&self, data: &DepositData, root: B256) -> Result<TxHash, SubmitError>;
}

fn classify(err: RpcError<TransportErrorKind>) -> SubmitError {
    match &err {
        RpcError::ErrorResp(payload) => {
            let msg = payload.message.to_lowercase();
            if msg.contains("insufficient funds") {
                SubmitError::InsufficientFunds(payload.message.to_string())
            } else if msg.contains("revert") {
                SubmitError::ContractRevert(payload.message.to_string())
            } else {
                SubmitError::Network(payload.message.to_string())
            }
        }
        _ => SubmitError::Network(err.to_string()),
    }
}

/// Submits deposits straight to the deposit contract with the
/// operator's wallet
pub struct ContractSubmitter<'a> {
    client: &'a Client,
    contract: Address,
    from: Address,
    fees: FeeArgs,
}

impl<'a> ContractSubmitter<'a> {
    pub fn new(client: &'a Client, contract: Address, from: Address, fees: FeeArgs) -> Self {
        ContractSubmitter {
            client,
            contract,
            from,
            fees,
        }
    }
}

impl Submitter for ContractSubmitter<'_> {
    async fn submit(&self, data: &DepositData, root: B256) -> Result<TxHash, SubmitError> {
        let input = IDepositContract::depositCall {
            pubkey: Bytes::copy_from_slice(data.pubkey.as_slice()),
            withdrawal_credentials: Bytes::copy_from_slice(data.withdrawal_credentials.as_slice()),
            signature: Bytes::copy_from_slice(data.signature.as_slice()),
            deposit_data_root: root,
        }
        .abi_encode();

        let tx = self
            .client
            .tx_request(self.from, self.contract, &self.fees)
            .await
            .map_err(|e| SubmitError::Network(format!("{e:#}")))?
            .with_value(data.amount_wei())
            .with_input(input);

        let provider = self
            .client
            .provider()
            .await
            .map_err(|e| SubmitError::Network(format!("{e:#}")))?;

        // Bail early if simulation fails
        provider.call(tx.clone()).await.map_err(classify)?;

        let gas_limit = match self.fees.gas_limit {
            Some(gas_limit) => gas_limit,
            None => provider.estimate_gas(tx.clone()).await.map_err(classify)?,
        };
        debug!("gas_limit: {gas_limit}");
        let tx = tx.with_gas_limit(gas_limit);
        trace!("{:#?}", tx);

        let pending = provider.send_transaction(tx).await.map_err(classify)?;
        Ok(*pending.tx_hash())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::rpc::json_rpc::ErrorPayload;

    fn resp(msg: &str) -> RpcError<TransportErrorKind> {
        let payload: ErrorPayload =
            serde_json::from_value(serde_json::json!({ "code": 3, "message": msg })).unwrap();
        RpcError::ErrorResp(payload)
    }

    #[test]
    fn classifies_node_errors() {
        assert!(matches!(
            classify(resp("execution reverted: DepositContract: reconstructed DepositData does not match supplied deposit_data_root")),
            SubmitError::ContractRevert(_)
        ));
        assert!(matches!(
            classify(resp("insufficient funds for gas * price + value")),
            SubmitError::InsufficientFunds(_)
        ));
        assert!(matches!(
            classify(resp("nonce too low")),
            SubmitError::Network(_)
        ));
        assert!(matches!(
            classify(RpcError::NullResp),
            SubmitError::Network(_)
        ));
    }
}
