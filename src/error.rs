use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApmError {
    /// The request could not be sent: connection, DNS or protocol failure.
    #[error("failed to send transaction: {0}")]
    Transport(#[source] reqwest::Error),

    /// The request went through but reading the response body failed.
    #[error("failed to read intake response: {0}")]
    ResponseBody(#[source] reqwest::Error),

    #[error("failed to encode payload: {0}")]
    Serialize(#[from] serde_json::Error),
}
