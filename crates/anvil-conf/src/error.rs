use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no value at `{0}`")]
    Missing(String),

    #[error("`{path}` could not be coerced to the requested type: {reason}")]
    TypeMismatch { path: String, reason: String },

    #[error("failed to parse config file {path}: {source}")]
    FileParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid duration literal `{0}`")]
    InvalidDuration(String),
}

impl From<Error> for anvil_core::Error {
    fn from(err: Error) -> Self {
        anvil_core::Error::Internal(anyhow::anyhow!(err))
    }
}
