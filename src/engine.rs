//! The execution state machine that advances a chain one bale at a
//! time.
//!
//! Chains flow `Pending → Running → {Finished, Failed}`. The engine
//! only ever submits the bale at `current_index` and only advances that
//! index after a terminal outcome is recorded for it, so at most one
//! bale per chain is in flight. Duplicate or late completion
//! notifications are no-ops; the pure [`plan_completion`] function
//! decides every transition before any persistence happens.

use std::sync::Arc;

use chrono::Utc;

use crate::chain::{Bale, BaleStatus, Chain, ChainStatus};
use crate::error::{ChainError, StoreError};
use crate::hook::{DirectHookInvoker, HookInvoker};
use crate::middleware::MiddlewarePipeline;
use crate::runner::{Completion, JobRunner, RunnerOutcome};
use crate::store::ChainStore;

/// Why a completion notification produced no transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The chain is already Finished or Failed (e.g. cancelled).
    TerminalChain,
    /// The notification is for a bale the chain has moved past.
    StaleIndex,
    /// The bale was never dispatched, or its recorded state
    /// contradicts the reported outcome.
    BaleNotInFlight,
    /// The runner will retry on its own; the bale stays Dispatched.
    Retryable,
}

impl std::fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IgnoreReason::TerminalChain => write!(f, "chain already terminal"),
            IgnoreReason::StaleIndex => write!(f, "stale bale index"),
            IgnoreReason::BaleNotInFlight => write!(f, "bale not in flight"),
            IgnoreReason::Retryable => write!(f, "retryable failure, runner retries"),
        }
    }
}

/// The transition a completion notification calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advancement {
    /// Mark the bale Succeeded and dispatch the next one.
    Advance,
    /// Mark the last bale Succeeded and finish the chain.
    Finish,
    /// Mark the bale Failed and fail the chain.
    Fail,
    /// Leave chain and bale untouched.
    Ignore(IgnoreReason),
}

/// Compute the transition for a completion notification. Pure: the
/// engine applies the result against the store.
pub fn plan_completion(
    chain: &Chain,
    index: usize,
    bale_status: BaleStatus,
    outcome: RunnerOutcome,
) -> Advancement {
    if chain.status.is_terminal() {
        return Advancement::Ignore(IgnoreReason::TerminalChain);
    }
    if index != chain.current_index {
        return Advancement::Ignore(IgnoreReason::StaleIndex);
    }
    match (bale_status, outcome) {
        (BaleStatus::Dispatched, RunnerOutcome::FailedRetryable) => {
            Advancement::Ignore(IgnoreReason::Retryable)
        }
        // A terminal bale with the matching outcome while the chain
        // still points at it is a half-applied transition: the bale
        // save landed but the chain save did not. Re-apply the
        // chain-side advancement instead of ignoring.
        (BaleStatus::Dispatched | BaleStatus::Failed, RunnerOutcome::FailedPermanent) => {
            Advancement::Fail
        }
        (BaleStatus::Dispatched | BaleStatus::Succeeded, RunnerOutcome::Succeeded) => {
            if chain.has_next_bale() {
                Advancement::Advance
            } else {
                Advancement::Finish
            }
        }
        _ => Advancement::Ignore(IgnoreReason::BaleNotInFlight),
    }
}

/// Drives chains through their lifecycle against a store and a runner.
///
/// `process_automatically` decides *when* the next bale is dispatched
/// after a success (in-process, or deferred to an explicit
/// [`dispatch_next`](Self::dispatch_next) trigger), never *which*
/// transition fires.
pub struct ExecutionEngine<S, R> {
    store: Arc<S>,
    runner: Arc<R>,
    invoker: Arc<dyn HookInvoker>,
    process_automatically: bool,
}

impl<S: ChainStore, R: JobRunner> ExecutionEngine<S, R> {
    pub fn new(store: Arc<S>, runner: Arc<R>) -> Self {
        Self {
            store,
            runner,
            invoker: Arc::new(DirectHookInvoker),
            process_automatically: true,
        }
    }

    /// Defer advancement after a success to an external trigger instead
    /// of dispatching the next bale in-process.
    pub fn with_process_automatically(mut self, value: bool) -> Self {
        self.process_automatically = value;
        self
    }

    /// Route hook execution through a custom invoker.
    pub fn with_hook_invoker(mut self, invoker: Arc<dyn HookInvoker>) -> Self {
        self.invoker = invoker;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn process_automatically(&self) -> bool {
        self.process_automatically
    }

    /// Submit a pending chain: mark it started and dispatch its first
    /// bale. A chain with no bales finishes immediately, hooks
    /// included. Anything but a Pending chain is a no-op.
    pub async fn start(&self, chain_id: &str) -> Result<(), ChainError> {
        let mut chain = self.store.load_chain(chain_id).await?;
        if chain.status != ChainStatus::Pending {
            return Ok(());
        }

        chain.started = true;
        chain.started_at = Some(Utc::now());

        if chain.bale_count == 0 {
            return self.finish(&mut chain, ChainStatus::Finished).await;
        }

        chain.status = ChainStatus::Running;
        self.store.save_chain_state(&mut chain).await?;
        self.dispatch_current(&mut chain).await
    }

    /// Apply a runner completion notification for `(chain_id, index)`.
    ///
    /// Safe under duplicates and races: terminal chains, stale indices
    /// and bales not in flight are ignored (logged only), and a version
    /// conflict on the chain save means another writer already applied
    /// the same advancement.
    ///
    /// Also safe under persistence failures: a store error between the
    /// bale save and the chain save surfaces to the caller, and
    /// retrying the same notification resumes the half-applied
    /// transition.
    pub async fn handle_completion(
        &self,
        chain_id: &str,
        index: usize,
        completion: Completion,
    ) -> Result<(), ChainError> {
        let mut chain = self.store.load_chain(chain_id).await?;

        if chain.status.is_terminal() {
            log_ignored(chain_id, index, IgnoreReason::TerminalChain);
            return Ok(());
        }
        if index != chain.current_index {
            log_ignored(chain_id, index, IgnoreReason::StaleIndex);
            return Ok(());
        }

        let mut bale = self.store.load_bale(chain_id, index).await?;

        match plan_completion(&chain, index, bale.status, completion.outcome) {
            Advancement::Ignore(reason) => {
                log_ignored(chain_id, index, reason);
                Ok(())
            }
            Advancement::Advance => {
                bale.status = BaleStatus::Succeeded;
                self.store.save_bale_state(&bale).await?;
                if let Some(data) = completion.data {
                    chain.results.insert(index, data);
                }
                chain.current_index += 1;
                match self.store.save_chain_state(&mut chain).await {
                    Ok(()) => {}
                    Err(StoreError::VersionConflict { .. }) => {
                        // Another writer advanced the chain first.
                        log_ignored(chain_id, index, IgnoreReason::StaleIndex);
                        return Ok(());
                    }
                    Err(err) => return Err(err.into()),
                }
                if self.process_automatically {
                    self.dispatch_current(&mut chain).await
                } else {
                    Ok(())
                }
            }
            Advancement::Finish => {
                bale.status = BaleStatus::Succeeded;
                self.store.save_bale_state(&bale).await?;
                if let Some(data) = completion.data {
                    chain.results.insert(index, data);
                }
                self.finish(&mut chain, ChainStatus::Finished).await
            }
            Advancement::Fail => {
                bale.status = BaleStatus::Failed;
                self.store.save_bale_state(&bale).await?;
                if let Some(data) = completion.data {
                    chain.results.insert(index, data);
                }
                self.finish(&mut chain, ChainStatus::Failed).await
            }
        }
    }

    /// Manual-advancement trigger: dispatch the bale at `current_index`
    /// of a running chain. No-op when the chain is not Running or the
    /// bale is already in flight.
    pub async fn dispatch_next(&self, chain_id: &str) -> Result<(), ChainError> {
        let mut chain = self.store.load_chain(chain_id).await?;
        if chain.status != ChainStatus::Running {
            return Ok(());
        }
        self.dispatch_current(&mut chain).await
    }

    /// Externally mark a chain Failed. Terminal hooks run once; any
    /// in-flight completion notification arriving afterwards is
    /// ignored. Cancelling an already-terminal chain is a no-op.
    pub async fn cancel(&self, chain_id: &str) -> Result<(), ChainError> {
        let mut chain = self.store.load_chain(chain_id).await?;
        if chain.status.is_terminal() {
            return Ok(());
        }
        self.finish(&mut chain, ChainStatus::Failed).await
    }

    /// Hand the bale at `current_index` to the runner, wrapped by the
    /// chain's middleware pipeline. A middleware error is the bale's
    /// permanent failure; a short-circuit leaves the bale Pending.
    async fn dispatch_current(&self, chain: &mut Chain) -> Result<(), ChainError> {
        let mut bale = self.store.load_bale(&chain.id, chain.current_index).await?;
        if bale.status != BaleStatus::Pending {
            return Ok(());
        }

        let pipeline = MiddlewarePipeline::resolve(chain.middleware.as_ref());
        let mut forwarded = false;
        if let Err(err) = pipeline.run(&bale, &mut |_: &Bale| {
            forwarded = true;
            Ok(())
        }) {
            log_middleware_failure(&chain.id, bale.index, &err);
            bale.status = BaleStatus::Failed;
            self.store.save_bale_state(&bale).await?;
            return self.finish(chain, ChainStatus::Failed).await;
        }

        if !forwarded {
            // Short-circuited: not handed to the runner this time.
            return Ok(());
        }

        bale.status = BaleStatus::Dispatched;
        self.store.save_bale_state(&bale).await?;

        if let Err(err) = self.runner.submit(&bale).await {
            // The submission did not happen; make the dispatch
            // retryable by a later trigger.
            bale.status = BaleStatus::Pending;
            self.store.save_bale_state(&bale).await?;
            return Err(err.into());
        }
        Ok(())
    }

    /// Persist the terminal status, then run `on_finally` followed by
    /// the outcome-specific hook, each exactly once. Hook failures are
    /// surfaced after both hooks were attempted and never reverse the
    /// persisted status.
    async fn finish(&self, chain: &mut Chain, status: ChainStatus) -> Result<(), ChainError> {
        debug_assert!(chain.status.can_transition_to(status));
        chain.status = status;
        chain.finished_at = Some(Utc::now());

        match self.store.save_chain_state(chain).await {
            Ok(()) => {}
            Err(StoreError::VersionConflict { .. }) => {
                let current = self.store.load_chain(&chain.id).await?;
                if current.status.is_terminal() {
                    // Another writer already terminated the chain and
                    // ran the hooks.
                    return Ok(());
                }
                return Err(StoreError::VersionConflict {
                    chain_id: chain.id.clone(),
                    expected: chain.version,
                    found: current.version,
                }
                .into());
            }
            Err(err) => return Err(err.into()),
        }

        self.run_terminal_hooks(chain)
    }

    fn run_terminal_hooks(&self, chain: &Chain) -> Result<(), ChainError> {
        let mut first_err: Option<anyhow::Error> = None;

        if let Some(hook) = &chain.hooks.on_finally
            && let Err(err) = self.invoker.invoke(hook, chain)
        {
            first_err = Some(err);
        }

        let outcome_hook = match chain.status {
            ChainStatus::Finished => chain.hooks.on_then.as_ref(),
            ChainStatus::Failed => chain.hooks.on_catch.as_ref(),
            ChainStatus::Pending | ChainStatus::Running => None,
        };
        if let Some(hook) = outcome_hook
            && let Err(err) = self.invoker.invoke(hook, chain)
        {
            if first_err.is_none() {
                first_err = Some(err);
            } else {
                log_hook_failure(&chain.id, &err);
            }
        }

        match first_err {
            Some(err) => Err(ChainError::Hook(err)),
            None => Ok(()),
        }
    }
}

fn log_ignored(chain_id: &str, index: usize, reason: IgnoreReason) {
    eprintln!("  · chain {chain_id}: ignoring completion for bale {index} ({reason})");
}

fn log_hook_failure(chain_id: &str, err: &anyhow::Error) {
    eprintln!("  ! chain {chain_id}: hook failed: {err}");
}

fn log_middleware_failure(chain_id: &str, index: usize, err: &anyhow::Error) {
    eprintln!("  ✗ chain {chain_id}: middleware failed for bale {index}: {err}");
}
