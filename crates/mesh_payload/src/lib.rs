//! Decoding for mesh radio envelopes delivered over MQTT.
//!
//! The pipeline is split into three pure stages:
//! - [`decode_envelope`] parses the outer `ServiceEnvelope` into an [`Envelope`]
//! - [`decrypt`] turns an encrypted packet payload into a [`DecodedPayload`]
//! - [`decode_typed`] dispatches a decoded payload on its port number
//!
//! None of the stages perform I/O.

pub mod crypto;
pub mod envelope;
mod error;
pub mod portnum;
pub mod proto;
pub mod typed_payload;

pub use crypto::{build_nonce, decrypt, ChannelKey};
pub use envelope::{decode_envelope, DecodedPayload, Envelope, Packet};
pub use error::{PayloadError, Result};
pub use portnum::{portnum_type, PortNum};
pub use typed_payload::{
    decode_typed, NodeIdentity, OpaquePayload, PositionReport, TelemetryReport, TextMessage,
    TypedPayload,
};
