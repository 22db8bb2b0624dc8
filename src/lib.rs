//! baler — a durable job-chain orchestrator.
//!
//! A chain is an ordered sequence of bales (units of work) executed
//! strictly one at a time: the next bale is only dispatched after the
//! previous one reports a terminal outcome. Chains are assembled with
//! the fluent [`ChainBuilder`], persisted through a [`ChainStore`],
//! executed by a [`JobRunner`] and driven by the [`ExecutionEngine`]
//! state machine, with lifecycle hooks and per-dispatch middleware.
//!
//! ```no_run
//! use std::sync::Arc;
//! use baler::{ChainBuilder, ExecutionEngine, JobPayload, MemoryStore, QueueRunner};
//!
//! # async fn example() -> Result<(), baler::ChainError> {
//! let store = Arc::new(MemoryStore::new());
//! let runner = Arc::new(QueueRunner::new());
//! let engine = ExecutionEngine::new(store, runner);
//!
//! let chain = ChainBuilder::new()
//!     .add_job(JobPayload::new("send-welcome-mail"))
//!     .add_job(JobPayload::new("provision-account").delay(30))
//!     .on_queue("onboarding")
//!     .dispatch(&engine)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod chain;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod hook;
pub mod middleware;
pub mod runner;
pub mod store;
pub mod ui;

pub use builder::ChainBuilder;
pub use chain::{Bale, BaleStatus, Chain, ChainStatus, JobPayload, PendingBale};
pub use config::BalerConfig;
pub use engine::ExecutionEngine;
pub use error::{ChainError, RunnerError, StoreError};
pub use hook::{Hook, HookInvoker, Invokable};
pub use middleware::{Middleware, MiddlewarePipeline, MiddlewareResolver, Next, ResolvesMiddleware};
pub use runner::{Completion, JobRunner, QueueRunner, RunnerOutcome};
pub use store::{ChainStore, MemoryStore};
