use mesh_payload::PayloadError;
use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Payload error: {0}")]
    Payload(#[from] PayloadError),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid topic: {0}")]
    InvalidTopic(String),

    #[error("Transport failed: {0}")]
    TransportFailed(String),

    #[error("Persistence failed: {0}")]
    PersistenceFailed(#[from] anyhow::Error),
}

impl DomainError {
    /// True when the outer envelope could not be decoded and the message was
    /// dropped without reaching storage.
    pub fn is_envelope_malformed(&self) -> bool {
        matches!(self, DomainError::Payload(PayloadError::EnvelopeMalformed(_)))
    }
}
