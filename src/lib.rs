//! Airdrop queue and execution engine.
//!
//! A durable work queue of pending token transfers, converted exactly once
//! per entry into on-chain transactions through an injected token ledger
//! client, with validation, batching, rate-limited sequential submission,
//! bounded retry, and auditable terminal outcomes.
//!
//! Layers:
//! - [`domain`]: core types, the error taxonomy, validation rules, and the
//!   traits external collaborators implement
//! - [`app`]: the queue manager, execution engine, reporting, and the
//!   background worker
//! - [`infra`]: PostgreSQL store and ledger gateway adapters
//! - [`api`]: axum handlers and routing

pub mod api;
pub mod app;
pub mod domain;
pub mod infra;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
