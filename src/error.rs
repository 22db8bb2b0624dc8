use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Runner error: {0}")]
    Runner(#[from] RunnerError),

    #[error("Hook failed: {0}")]
    Hook(#[source] anyhow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("chain not found: {0}")]
    ChainNotFound(String),

    #[error("bale not found: chain {chain_id}, index {index}")]
    BaleNotFound { chain_id: String, index: usize },

    #[error("version conflict for chain {chain_id}: expected {expected}, found {found}")]
    VersionConflict {
        chain_id: String,
        expected: u64,
        found: u64,
    },

    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("submit failed: {0}")]
    Submit(String),
}
