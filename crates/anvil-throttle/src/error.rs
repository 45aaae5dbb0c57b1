use thiserror::Error;

use crate::entry::RateLimitEntry;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("rate limit store is unavailable: {0}")]
    StoreUnavailable(String),

    #[error("rate limited, retry after {:.3}s", .0.reset_at.as_secs_f64())]
    Blocked(RateLimitEntry),
}

impl Error {
    pub fn retry_after(&self) -> Option<std::time::Duration> {
        match self {
            Error::Blocked(entry) => Some(entry.reset_at),
            Error::StoreUnavailable(_) => None,
        }
    }
}
