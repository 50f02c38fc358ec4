use alloy::{
    eips::eip1559::Eip1559Estimation,
    network::{EthereumWallet, TransactionBuilder},
    primitives::{Address, U256, utils::parse_units},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::TransactionRequest,
};
use colored::*;
use eyre::{Result, WrapErr, bail};
use log::*;
use std::sync::Mutex;

use crate::{chain, config::FeeArgs};

/// Lazily connected JsonRPC client. An explicit handle passed to
/// whoever needs the network instead of process-global state, so the
/// batch core can be wired with fakes in tests.
pub struct Client {
    pub rpc_url: String,
    wallet: EthereumWallet,
    chain_id: Mutex<u64>,
    provider: Mutex<Option<DynProvider>>,
}

impl Client {
    pub fn new(url: &str, wallet: EthereumWallet) -> Result<Client> {
        if url.trim().is_empty() {
            bail!("must specify a valid --rpc-url")
        };
        Ok(Client {
            rpc_url: url.to_string(),
            wallet,
            chain_id: Mutex::new(0),
            provider: Mutex::new(None),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.provider.lock().unwrap().is_some() && *self.chain_id.lock().unwrap() != 0
    }

    pub async fn connect(&self) -> Result<&Self> {
        match self.is_connected() {
            true => Ok(self),
            false => self._connect().await,
        }
    }

    pub async fn provider(&self) -> Result<DynProvider> {
        if !self.is_connected() {
            self._connect().await?;
        }
        Ok(DynProvider::clone(
            self.provider.lock().unwrap().as_ref().unwrap(),
        ))
    }

    async fn _connect(&self) -> Result<&Self> {
        // Wallet-enabled provider so send_transaction signs locally
        // before broadcasting
        let provider = DynProvider::new(
            ProviderBuilder::new()
                .wallet(self.wallet.clone())
                .connect(self.rpc_url.as_str())
                .await
                .wrap_err_with(|| format!("Connect failed to '{}'", self.rpc_url))?,
        );

        // Get chain ID and height
        let chain_id = provider.get_chain_id().await?;
        let height = provider.get_block_number().await?;

        *self.provider.lock().unwrap() = Some(provider);
        *self.chain_id.lock().unwrap() = chain_id;

        debug!(
            "Connected to {} {}:{} {}:{}",
            chain::name(chain_id).green().bold(),
            "chainId".white().bold(),
            format!("{:?}", chain_id).blue(),
            "height".white().bold(),
            format!("{:?}", height).blue(),
        );
        Ok(self)
    }

    pub fn chain_id(&self) -> u64 {
        *self.chain_id.lock().unwrap()
    }

    pub async fn estimate_fees(&self) -> Result<Eip1559Estimation> {
        Ok(self.provider().await?.estimate_eip1559_fees().await?)
    }

    pub async fn balance(&self, addr: &Address) -> Result<U256> {
        Ok(self.provider().await?.get_balance(*addr).await?)
    }

    pub async fn nonce(&self, addr: &Address) -> Result<u64> {
        Ok(self.provider().await?.get_transaction_count(*addr).await?)
    }

    /// Skeleton request with chain id, nonce and EIP-1559 fees, the
    /// fees either explicit (both flags set) or estimated from the node
    pub async fn tx_request(
        &self,
        from: Address,
        to: Address,
        fees: &FeeArgs,
    ) -> Result<TransactionRequest> {
        let nonce = self.nonce(&from).await?;
        let estimation = match fees.max_priority.is_some() {
            true => Eip1559Estimation {
                max_fee_per_gas: parse_units(&fees.max_fee.unwrap().to_string(), "gwei")?
                    .try_into()?,
                max_priority_fee_per_gas: parse_units(
                    &fees.max_priority.unwrap().to_string(),
                    "gwei",
                )?
                .try_into()?,
            },
            false => self.estimate_fees().await?,
        };

        let tx = TransactionRequest::default()
            .with_from(from)
            .with_to(to)
            .with_nonce(nonce)
            .with_chain_id(self.chain_id())
            .with_max_priority_fee_per_gas(estimation.max_priority_fee_per_gas)
            .with_max_fee_per_gas(estimation.max_fee_per_gas);

        Ok(tx)
    }
}
