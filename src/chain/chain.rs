use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hook::Hook;
use crate::middleware::MiddlewareResolver;

/// Tracks the lifecycle status of a chain.
///
/// Valid transitions: Pending → Running → {Finished, Failed}. Terminal
/// states admit no further transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainStatus {
    Pending,
    Running,
    Finished,
    Failed,
}

impl ChainStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChainStatus::Finished | ChainStatus::Failed)
    }

    /// Whether moving from `self` to `to` is a legal transition.
    pub fn can_transition_to(&self, to: ChainStatus) -> bool {
        matches!(
            (self, to),
            (ChainStatus::Pending, ChainStatus::Running)
                | (ChainStatus::Pending, ChainStatus::Finished)
                | (ChainStatus::Pending, ChainStatus::Failed)
                | (ChainStatus::Running, ChainStatus::Finished)
                | (ChainStatus::Running, ChainStatus::Failed)
        )
    }
}

impl fmt::Display for ChainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainStatus::Pending => write!(f, "pending"),
            ChainStatus::Running => write!(f, "running"),
            ChainStatus::Finished => write!(f, "finished"),
            ChainStatus::Failed => write!(f, "failed"),
        }
    }
}

/// The lifecycle hooks registered on a chain.
///
/// `on_finally` runs for both outcomes, always before the
/// outcome-specific hook. Hooks live in process memory only; a chain
/// loaded from a cold durable backend carries none.
#[derive(Clone, Default, PartialEq)]
pub struct ChainHooks {
    pub on_then: Option<Hook>,
    pub on_catch: Option<Hook>,
    pub on_finally: Option<Hook>,
}

impl fmt::Debug for ChainHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainHooks")
            .field("on_then", &self.on_then.is_some())
            .field("on_catch", &self.on_catch.is_some())
            .field("on_finally", &self.on_finally.is_some())
            .finish()
    }
}

/// The aggregate root of a job sequence.
///
/// A chain owns its bale sequence exclusively: the ordered bale
/// identifiers are the dense index range `0..bale_count`, keyed in the
/// store by `(id, index)`. The `version` counter backs the store's
/// optimistic concurrency check so two concurrent completion
/// notifications can never double-advance `current_index`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chain {
    pub id: String,
    pub bale_count: usize,
    pub current_index: usize,
    pub status: ChainStatus,

    /// Chain-wide defaults, recorded for inspection. Resolution into
    /// bale attributes happened at creation; these are never re-applied.
    pub delay_seconds: u64,
    pub queue: Option<String>,
    pub connection: Option<String>,

    /// Set once the chain has been submitted for execution.
    pub started: bool,
    pub version: u64,

    /// Per-bale result data reported by the runner, readable by hooks.
    #[serde(default)]
    pub results: BTreeMap<usize, serde_json::Value>,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,

    #[serde(skip)]
    pub hooks: ChainHooks,

    #[serde(skip)]
    pub middleware: Option<MiddlewareResolver>,
}

impl Chain {
    /// Create a fresh pending chain with default attributes.
    pub fn new(bale_count: usize) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            bale_count,
            current_index: 0,
            status: ChainStatus::Pending,
            delay_seconds: 0,
            queue: None,
            connection: None,
            started: false,
            version: 0,
            results: BTreeMap::new(),
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            hooks: ChainHooks::default(),
            middleware: None,
        }
    }

    /// Whether any bale remains after the current one.
    pub fn has_next_bale(&self) -> bool {
        self.current_index + 1 < self.bale_count
    }
}
