//! Fluent assembly of a chain before persistence.
//!
//! The builder accumulates pending bales, chain-wide defaults, lifecycle
//! hooks and a middleware resolver, then resolves everything into a
//! persisted [`Chain`] at `create()` time. Attribute precedence, highest
//! wins: explicit per-job override, payload-intrinsic value, chain-wide
//! global, absolute default (delay 0, queue none, connection none).

use crate::chain::{Bale, BaleStatus, Chain, JobPayload, PendingBale};
use crate::engine::ExecutionEngine;
use crate::error::ChainError;
use crate::hook::Hook;
use crate::middleware::MiddlewareResolver;
use crate::runner::JobRunner;
use crate::store::ChainStore;

/// Evaluate an ordered list of optional sources; the first set value
/// wins. Every attribute resolves through this single function.
fn first_set<T>(sources: impl IntoIterator<Item = Option<T>>) -> Option<T> {
    sources.into_iter().flatten().next()
}

/// Accumulates bales and chain-wide configuration, then materializes a
/// persisted chain. The builder is discarded after `create()` or
/// `dispatch()`.
#[derive(Debug, Default)]
pub struct ChainBuilder {
    jobs: Vec<PendingBale>,
    global_delay: Option<i64>,
    global_queue: Option<String>,
    global_connection: Option<String>,
    on_then: Option<Hook>,
    on_catch: Option<Hook>,
    on_finally: Option<Hook>,
    middleware: Option<MiddlewareResolver>,
}

impl ChainBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a unit of work with no per-job overrides. The payload's
    /// own intrinsic delay/queue/connection, if any, are captured.
    pub fn add_job(self, payload: JobPayload) -> Self {
        self.add_job_with(payload, None, None, None)
    }

    /// Append a unit of work with explicit per-job overrides. An
    /// explicit override always beats the payload's intrinsic value and
    /// any chain-wide global, regardless of call order.
    pub fn add_job_with(
        mut self,
        payload: JobPayload,
        delay: Option<i64>,
        queue: Option<&str>,
        connection: Option<&str>,
    ) -> Self {
        self.jobs.push(PendingBale::capture(
            payload,
            delay,
            queue.map(str::to_owned),
            connection.map(str::to_owned),
        ));
        self
    }

    /// Alias for [`add_job`](Self::add_job).
    pub fn add_bale(self, payload: JobPayload) -> Self {
        self.add_job(payload)
    }

    /// Alias for [`add_job_with`](Self::add_job_with).
    pub fn add_bale_with(
        self,
        payload: JobPayload,
        delay: Option<i64>,
        queue: Option<&str>,
        connection: Option<&str>,
    ) -> Self {
        self.add_job_with(payload, delay, queue, connection)
    }

    /// Set the chain-wide delay default, in seconds.
    pub fn with_delay(mut self, seconds: i64) -> Self {
        self.global_delay = Some(seconds);
        self
    }

    /// Set the chain-wide queue default.
    pub fn on_queue(mut self, queue: impl Into<String>) -> Self {
        self.global_queue = Some(queue.into());
        self
    }

    /// Set the chain-wide connection default.
    pub fn on_connection(mut self, connection: impl Into<String>) -> Self {
        self.global_connection = Some(connection.into());
        self
    }

    /// Register the success hook. Calling twice overwrites.
    pub fn then(mut self, hook: Hook) -> Self {
        self.on_then = Some(hook);
        self
    }

    /// Register the always-run hook. Calling twice overwrites.
    pub fn finally(mut self, hook: Hook) -> Self {
        self.on_finally = Some(hook);
        self
    }

    /// Register the failure hook. Calling twice overwrites.
    pub fn catch(mut self, hook: Hook) -> Self {
        self.on_catch = Some(hook);
        self
    }

    /// Register the middleware resolver. Calling twice overwrites.
    pub fn with_middleware(mut self, resolver: MiddlewareResolver) -> Self {
        self.middleware = Some(resolver);
        self
    }

    /// Apply `then_fn` when the condition holds; otherwise do nothing.
    /// Evaluated immediately, so `when` calls compose left-to-right.
    pub fn when(self, condition: bool, then_fn: impl FnOnce(Self) -> Self) -> Self {
        if condition { then_fn(self) } else { self }
    }

    /// Apply `then_fn` when the condition holds, `else_fn` otherwise.
    pub fn when_else(
        self,
        condition: bool,
        then_fn: impl FnOnce(Self) -> Self,
        else_fn: impl FnOnce(Self) -> Self,
    ) -> Self {
        if condition { then_fn(self) } else { else_fn(self) }
    }

    // Read accessors expose the raw stored state, not state resolved
    // against defaults.

    pub fn jobs(&self) -> &[PendingBale] {
        &self.jobs
    }

    pub fn global_delay(&self) -> Option<i64> {
        self.global_delay
    }

    pub fn global_queue(&self) -> Option<&str> {
        self.global_queue.as_deref()
    }

    pub fn global_connection(&self) -> Option<&str> {
        self.global_connection.as_deref()
    }

    pub fn on_then(&self) -> Option<&Hook> {
        self.on_then.as_ref()
    }

    pub fn on_finally(&self) -> Option<&Hook> {
        self.on_finally.as_ref()
    }

    pub fn on_catch(&self) -> Option<&Hook> {
        self.on_catch.as_ref()
    }

    pub fn global_middleware(&self) -> Option<&MiddlewareResolver> {
        self.middleware.as_ref()
    }

    /// Resolve every pending bale, persist the chain and its bales, and
    /// return the chain in `Pending` status with `current_index = 0`.
    ///
    /// Malformed input (a negative delay at any tier) is rejected here
    /// and the chain is never persisted.
    pub async fn create<S: ChainStore>(self, store: &S) -> Result<Chain, ChainError> {
        let (chain, bales) = self.materialize()?;
        store.create_chain(chain.clone(), bales).await?;
        Ok(chain)
    }

    /// `create()` followed by immediately submitting the chain for
    /// execution. The returned chain observes `started == true`; a
    /// zero-bale chain comes back already `Finished` with its hooks run.
    pub async fn dispatch<S: ChainStore, R: JobRunner>(
        self,
        engine: &ExecutionEngine<S, R>,
    ) -> Result<Chain, ChainError> {
        let chain = self.create(engine.store()).await?;
        engine.start(&chain.id).await?;
        Ok(engine.store().load_chain(&chain.id).await?)
    }

    /// Validate and resolve the builder state into persistable records.
    fn materialize(self) -> Result<(Chain, Vec<Bale>), ChainError> {
        if let Some(delay) = self.global_delay
            && delay < 0
        {
            return Err(ChainError::Configuration(format!(
                "chain-wide delay must not be negative, got {delay}"
            )));
        }
        for (index, pending) in self.jobs.iter().enumerate() {
            if let Some(delay) = pending.delay
                && delay < 0
            {
                return Err(ChainError::Configuration(format!(
                    "job {index} delay must not be negative, got {delay}"
                )));
            }
        }

        let mut chain = Chain::new(self.jobs.len());
        chain.delay_seconds = self.global_delay.unwrap_or(0) as u64;
        chain.queue = self.global_queue.clone();
        chain.connection = self.global_connection.clone();
        chain.hooks.on_then = self.on_then;
        chain.hooks.on_catch = self.on_catch;
        chain.hooks.on_finally = self.on_finally;
        chain.middleware = self.middleware;

        let bales = self
            .jobs
            .into_iter()
            .enumerate()
            .map(|(index, pending)| Bale {
                chain_id: chain.id.clone(),
                index,
                delay_seconds: first_set([pending.delay, self.global_delay]).unwrap_or(0) as u64,
                queue: first_set([pending.queue, self.global_queue.clone()]),
                connection: first_set([pending.connection, self.global_connection.clone()]),
                payload: pending.payload,
                status: BaleStatus::Pending,
            })
            .collect();

        Ok((chain, bales))
    }
}
