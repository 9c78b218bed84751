//! Wire messages for the mesh MQTT bridge.
//!
//! Field numbers follow the firmware's published protobuf schema. Only the
//! fields this service reads are declared; unknown fields are skipped by prost.

/// Outer wrapper published by a gateway node onto the MQTT broker.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ServiceEnvelope {
    #[prost(message, optional, tag = "1")]
    pub packet: Option<MeshPacket>,
    #[prost(string, tag = "2")]
    pub channel_id: String,
    #[prost(string, tag = "3")]
    pub gateway_id: String,
}

/// A single over-the-air transmission.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MeshPacket {
    #[prost(fixed32, tag = "1")]
    pub from: u32,
    #[prost(fixed32, tag = "2")]
    pub to: u32,
    #[prost(uint32, tag = "3")]
    pub channel: u32,
    #[prost(fixed32, tag = "6")]
    pub id: u32,
    #[prost(fixed32, tag = "7")]
    pub rx_time: u32,
    #[prost(float, tag = "8")]
    pub rx_snr: f32,
    #[prost(uint32, tag = "9")]
    pub hop_limit: u32,
    #[prost(bool, tag = "10")]
    pub want_ack: bool,
    #[prost(int32, tag = "11")]
    pub priority: i32,
    #[prost(int32, tag = "12")]
    pub rx_rssi: i32,
    #[prost(bool, tag = "14")]
    pub via_mqtt: bool,
    #[prost(uint32, tag = "15")]
    pub hop_start: u32,
    #[prost(oneof = "mesh_packet::PayloadVariant", tags = "4, 5")]
    pub payload_variant: Option<mesh_packet::PayloadVariant>,
}

pub mod mesh_packet {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum PayloadVariant {
        #[prost(message, tag = "4")]
        Decoded(super::Data),
        #[prost(bytes, tag = "5")]
        Encrypted(Vec<u8>),
    }
}

/// Application payload with its port number. Also the plaintext shape of an
/// encrypted packet.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Data {
    #[prost(int32, tag = "1")]
    pub portnum: i32,
    #[prost(bytes = "vec", tag = "2")]
    pub payload: Vec<u8>,
    #[prost(bool, tag = "3")]
    pub want_response: bool,
    #[prost(fixed32, tag = "4")]
    pub dest: u32,
    #[prost(fixed32, tag = "5")]
    pub source: u32,
    #[prost(fixed32, tag = "6")]
    pub request_id: u32,
    #[prost(fixed32, tag = "7")]
    pub reply_id: u32,
    #[prost(fixed32, tag = "8")]
    pub emoji: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Position {
    #[prost(sfixed32, optional, tag = "1")]
    pub latitude_i: Option<i32>,
    #[prost(sfixed32, optional, tag = "2")]
    pub longitude_i: Option<i32>,
    #[prost(int32, optional, tag = "3")]
    pub altitude: Option<i32>,
    #[prost(fixed32, tag = "4")]
    pub time: u32,
    #[prost(uint32, optional, tag = "15")]
    pub ground_speed: Option<u32>,
    #[prost(uint32, optional, tag = "16")]
    pub ground_track: Option<u32>,
    #[prost(uint32, tag = "19")]
    pub sats_in_view: u32,
    #[prost(uint32, tag = "23")]
    pub precision_bits: u32,
}

/// Node identity broadcast on the node-info port.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct User {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub long_name: String,
    #[prost(string, tag = "3")]
    pub short_name: String,
    #[prost(bytes = "vec", tag = "4")]
    pub macaddr: Vec<u8>,
    #[prost(int32, tag = "5")]
    pub hw_model: i32,
    #[prost(bool, tag = "6")]
    pub is_licensed: bool,
    #[prost(int32, tag = "7")]
    pub role: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Telemetry {
    #[prost(fixed32, tag = "1")]
    pub time: u32,
    #[prost(message, optional, tag = "2")]
    pub device_metrics: Option<DeviceMetrics>,
    #[prost(message, optional, tag = "3")]
    pub environment_metrics: Option<EnvironmentMetrics>,
    #[prost(message, optional, tag = "4")]
    pub air_quality_metrics: Option<AirQualityMetrics>,
}

#[derive(Clone, PartialEq, ::prost::Message, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceMetrics {
    #[prost(uint32, optional, tag = "1")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<u32>,
    #[prost(float, optional, tag = "2")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voltage: Option<f32>,
    #[prost(float, optional, tag = "3")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_utilization: Option<f32>,
    #[prost(float, optional, tag = "4")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub air_util_tx: Option<f32>,
    #[prost(uint32, optional, tag = "5")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_seconds: Option<u32>,
}

#[derive(Clone, PartialEq, ::prost::Message, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentMetrics {
    #[prost(float, optional, tag = "1")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[prost(float, optional, tag = "2")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relative_humidity: Option<f32>,
    #[prost(float, optional, tag = "3")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barometric_pressure: Option<f32>,
    #[prost(float, optional, tag = "4")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_resistance: Option<f32>,
    #[prost(float, optional, tag = "5")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voltage: Option<f32>,
    #[prost(float, optional, tag = "6")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<f32>,
    #[prost(uint32, optional, tag = "7")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iaq: Option<u32>,
    #[prost(float, optional, tag = "8")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
    #[prost(float, optional, tag = "9")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lux: Option<f32>,
    #[prost(float, optional, tag = "10")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub white_lux: Option<f32>,
    #[prost(float, optional, tag = "11")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ir_lux: Option<f32>,
    #[prost(float, optional, tag = "12")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uv_lux: Option<f32>,
    #[prost(uint32, optional, tag = "13")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_direction: Option<u32>,
    #[prost(float, optional, tag = "14")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_speed: Option<f32>,
}

#[derive(Clone, PartialEq, ::prost::Message, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AirQualityMetrics {
    #[prost(uint32, optional, tag = "1")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pm10_standard: Option<u32>,
    #[prost(uint32, optional, tag = "2")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pm25_standard: Option<u32>,
    #[prost(uint32, optional, tag = "3")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pm100_standard: Option<u32>,
    #[prost(uint32, optional, tag = "4")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pm10_environmental: Option<u32>,
    #[prost(uint32, optional, tag = "5")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pm25_environmental: Option<u32>,
    #[prost(uint32, optional, tag = "6")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pm100_environmental: Option<u32>,
    #[prost(uint32, optional, tag = "7")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub particles_03um: Option<u32>,
    #[prost(uint32, optional, tag = "8")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub particles_05um: Option<u32>,
    #[prost(uint32, optional, tag = "9")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub particles_10um: Option<u32>,
    #[prost(uint32, optional, tag = "10")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub particles_25um: Option<u32>,
    #[prost(uint32, optional, tag = "11")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub particles_50um: Option<u32>,
    #[prost(uint32, optional, tag = "12")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub particles_100um: Option<u32>,
    #[prost(uint32, optional, tag = "13")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub co2: Option<u32>,
}
