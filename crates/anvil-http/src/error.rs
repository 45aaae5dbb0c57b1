use thiserror::Error;

/// Errors raised while constructing or reading HTTP primitives.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URI: {0}")]
    InvalidUri(#[from] http::uri::InvalidUri),

    #[error("invalid header value for {name}: {source}")]
    InvalidHeaderValue {
        name: String,
        #[source]
        source: http::header::InvalidHeaderValue,
    },

    #[error("failed to decode JSON body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to decode form body: {0}")]
    Form(#[from] serde_urlencoded::de::Error),

    #[error("request body exceeded the configured maximum of {max} bytes")]
    BodyTooLarge { max: usize },

    #[error("malformed multipart body: {0}")]
    Multipart(String),

    #[error("malformed XML body: {0}")]
    Xml(String),
}
