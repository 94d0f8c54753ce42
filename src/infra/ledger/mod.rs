//! Token ledger client implementations.

pub mod gateway;

pub use gateway::{LedgerGatewayClient, LedgerGatewayConfig};
