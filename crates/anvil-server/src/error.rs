use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to bind listener: {0}")]
    Bind(#[source] std::io::Error),

    #[error("failed to read request body: {0}")]
    BodyRead(String),

    #[error("request body of {actual} bytes exceeds the {limit} byte limit")]
    BodyTooLarge { limit: usize, actual: usize },
}

impl From<Error> for anvil_core::Error {
    fn from(err: Error) -> Self {
        anvil_core::Error::Internal(anyhow::anyhow!(err))
    }
}
