use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no binding registered for `{0}`")]
    Unbound(&'static str),

    #[error("circular dependency detected while constructing: {0:?}")]
    Cyclic(Vec<&'static str>),

    #[error("factory for `{0}` panicked or was cancelled mid-construction")]
    ConstructionFailed(&'static str),
}

impl From<Error> for anvil_core::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Cyclic(chain) => {
                anvil_core::Error::CyclicProviders(chain.into_iter().map(str::to_string).collect())
            }
            other => anvil_core::Error::Internal(anyhow::anyhow!(other)),
        }
    }
}
