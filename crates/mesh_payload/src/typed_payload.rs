use crate::envelope::DecodedPayload;
use crate::portnum::{NODEINFO_APP, POSITION_APP, TELEMETRY_APP, TEXT_MESSAGE_APP};
use crate::proto;
use crate::{PayloadError, Result};
use base64::prelude::*;
use prost::Message;
use serde_json::Value;
use tracing::warn;

const COORDINATE_SCALE: f64 = 1e7;

/// Port-specific decoding of a payload. Exactly one variant per message.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedPayload {
    TextMessage(TextMessage),
    Position(PositionReport),
    NodeIdentity(NodeIdentity),
    Telemetry(TelemetryReport),
    Opaque(OpaquePayload),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextMessage {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PositionReport {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<i32>,
    pub time: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeIdentity {
    pub id: Option<String>,
    pub long_name: Option<String>,
    pub short_name: Option<String>,
    pub mac_address_hex: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TelemetryReport {
    pub device_metrics: Option<Value>,
    pub environment_metrics: Option<Value>,
    pub air_quality_metrics: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpaquePayload {
    pub portnum: i32,
    pub payload_base64: String,
}

impl OpaquePayload {
    pub fn from_decoded(decoded: &DecodedPayload) -> Self {
        OpaquePayload {
            portnum: decoded.portnum,
            payload_base64: BASE64_STANDARD.encode(&decoded.payload),
        }
    }
}

/// Decode the payload according to its port number.
///
/// Ports without a dedicated decoder, and payloads that fail their decoder,
/// come back as [`TypedPayload::Opaque`].
pub fn decode_typed(decoded: &DecodedPayload) -> TypedPayload {
    match try_decode_typed(decoded) {
        Ok(typed) => typed,
        Err(e) => {
            warn!(
                portnum = decoded.portnum,
                payload_size = decoded.payload.len(),
                error = %e,
                "typed payload decode failed, storing as opaque"
            );
            TypedPayload::Opaque(OpaquePayload::from_decoded(decoded))
        }
    }
}

fn try_decode_typed(decoded: &DecodedPayload) -> Result<TypedPayload> {
    let bytes = decoded.payload.as_slice();
    let portnum = decoded.portnum;
    let typed = match portnum {
        TEXT_MESSAGE_APP => TypedPayload::TextMessage(decode_text(portnum, bytes)?),
        POSITION_APP => TypedPayload::Position(decode_position(portnum, bytes)?),
        NODEINFO_APP => TypedPayload::NodeIdentity(decode_node_identity(portnum, bytes)?),
        TELEMETRY_APP => TypedPayload::Telemetry(decode_telemetry(portnum, bytes)?),
        _ => TypedPayload::Opaque(OpaquePayload::from_decoded(decoded)),
    };
    Ok(typed)
}

fn parse<M: Message + Default>(portnum: i32, bytes: &[u8]) -> Result<M> {
    M::decode(bytes).map_err(|source| PayloadError::TypedDecodeFailed { portnum, source })
}

// The text port carries a nested data structure whose payload is the UTF-8 text.
fn decode_text(portnum: i32, bytes: &[u8]) -> Result<TextMessage> {
    let inner: proto::Data = parse(portnum, bytes)?;
    Ok(TextMessage {
        text: String::from_utf8_lossy(&inner.payload).into_owned(),
    })
}

fn decode_position(portnum: i32, bytes: &[u8]) -> Result<PositionReport> {
    let position: proto::Position = parse(portnum, bytes)?;
    Ok(PositionReport {
        latitude: scale_coordinate(position.latitude_i),
        longitude: scale_coordinate(position.longitude_i),
        altitude: position.altitude.filter(|a| *a != 0),
        time: (position.time != 0).then_some(i64::from(position.time)),
    })
}

// A zero coordinate is indistinguishable from "not sent" on the wire and is
// reported as absent.
fn scale_coordinate(value: Option<i32>) -> Option<f64> {
    value
        .filter(|v| *v != 0)
        .map(|v| f64::from(v) / COORDINATE_SCALE)
}

fn decode_node_identity(portnum: i32, bytes: &[u8]) -> Result<NodeIdentity> {
    let user: proto::User = parse(portnum, bytes)?;
    Ok(NodeIdentity {
        id: non_empty(user.id),
        long_name: non_empty(user.long_name),
        short_name: non_empty(user.short_name),
        mac_address_hex: (!user.macaddr.is_empty()).then(|| hex::encode(&user.macaddr)),
    })
}

fn decode_telemetry(portnum: i32, bytes: &[u8]) -> Result<TelemetryReport> {
    let telemetry: proto::Telemetry = parse(portnum, bytes)?;
    Ok(TelemetryReport {
        device_metrics: telemetry.device_metrics.map(serde_json::to_value).transpose()?,
        environment_metrics: telemetry
            .environment_metrics
            .map(serde_json::to_value)
            .transpose()?,
        air_quality_metrics: telemetry
            .air_quality_metrics
            .map(serde_json::to_value)
            .transpose()?,
    })
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}
