//! Application layer containing the engine components and shared state.

pub mod config;
pub mod executor;
pub mod queue;
pub mod reporting;
pub mod state;
pub mod worker;

pub use config::EngineConfig;
pub use executor::ExecutionEngine;
pub use queue::QueueManager;
pub use reporting::ReportingService;
pub use state::AppState;
pub use worker::{WorkerConfig, spawn_worker};
