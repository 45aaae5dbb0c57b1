use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("session store is unavailable: {0}")]
    StoreUnavailable(String),

    #[error("session `{0}` was not found")]
    SessionNotFound(String),

    #[error("failed to (de)serialize session payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("no authentication strategy matched the request")]
    NoStrategyMatched,
}

impl From<Error> for anvil_core::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::NoStrategyMatched => anvil_core::Error::Unauthorized,
            other => anvil_core::Error::Internal(anyhow::anyhow!(other)),
        }
    }
}
