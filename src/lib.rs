pub mod macros;

pub mod batch;
pub mod chain;
pub mod config;
pub mod deposit;
pub mod helpers;
pub mod ledger;
pub mod logger;
pub mod rpc;
pub mod submitter;
pub mod tx_db;
