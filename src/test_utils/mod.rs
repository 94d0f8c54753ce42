//! Test doubles for the engine's external collaborators.

pub mod mocks;

pub use mocks::{MockConfig, MockLedgerClient, MockQueueStore};
