mod bale;
mod chain;

pub use bale::{Bale, BaleStatus, JobPayload, PendingBale};
pub use chain::{Chain, ChainHooks, ChainStatus};
