use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("malformed envelope: {0}")]
    EnvelopeMalformed(#[from] prost::DecodeError),

    #[error("invalid channel key length: expected 16 or 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("invalid channel key encoding: {0}")]
    InvalidKeyEncoding(String),

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("failed to decode payload for port {portnum}: {source}")]
    TypedDecodeFailed {
        portnum: i32,
        #[source]
        source: prost::DecodeError,
    },

    #[error("json serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PayloadError>;
