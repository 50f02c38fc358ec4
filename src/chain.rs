use alloy::primitives::Address;
use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::macros::parse_address;

#[derive(Debug, Clone)]
pub struct ChainData {
    pub id: u64,
    pub name: &'static str,
    pub deposit_contract: Address,
}

pub fn by_id(chain_id: u64) -> Option<&'static ChainData> {
    CHAINDATA.get(&chain_id)
}

pub fn name(chain_id: u64) -> &'static str {
    match by_id(chain_id) {
        Some(cd) => cd.name,
        None => "unknown",
    }
}

pub static CHAINDATA: Lazy<HashMap<u64, ChainData>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert(1, CHAIN_ETH_MAINNET.clone());
    m.insert(17000, CHAIN_ETH_HOLESKY.clone());
    m.insert(560048, CHAIN_ETH_HOODI.clone());
    m
});

static CHAIN_ETH_MAINNET: Lazy<ChainData> = Lazy::new(|| {
    let c = ChainData {
        id: 1,
        name: "mainnet",
        deposit_contract: parse_address!("0x00000000219ab540356cBB839Cbe05303d7705Fa"),
    };
    c
});

static CHAIN_ETH_HOLESKY: Lazy<ChainData> = Lazy::new(|| {
    let c = ChainData {
        id: 17000,
        name: "holesky",
        deposit_contract: parse_address!("0x4242424242424242424242424242424242424242"),
    };
    c
});

static CHAIN_ETH_HOODI: Lazy<ChainData> = Lazy::new(|| {
    let c = ChainData {
        id: 560048,
        name: "hoodi",
        deposit_contract: parse_address!("0x00000000219ab540356cBB839Cbe05303d7705Fa"),
    };
    c
});
