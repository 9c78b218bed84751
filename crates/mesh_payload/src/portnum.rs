// Port numbers from the firmware's portnums schema. Values are part of the wire
// format and must never be renumbered.
pub const UNKNOWN_APP: i32 = 0;
pub const TEXT_MESSAGE_APP: i32 = 1;
pub const REMOTE_HARDWARE_APP: i32 = 2;
pub const POSITION_APP: i32 = 3;
pub const NODEINFO_APP: i32 = 4;
pub const ROUTING_APP: i32 = 5;
pub const ADMIN_APP: i32 = 6;
pub const TEXT_MESSAGE_COMPRESSED_APP: i32 = 7;
pub const WAYPOINT_APP: i32 = 8;
pub const AUDIO_APP: i32 = 9;
pub const DETECTION_SENSOR_APP: i32 = 10;
pub const ALERT_APP: i32 = 11;
pub const KEY_VERIFICATION_APP: i32 = 12;
pub const REPLY_APP: i32 = 32;
pub const IP_TUNNEL_APP: i32 = 33;
pub const PAXCOUNTER_APP: i32 = 34;
pub const SERIAL_APP: i32 = 64;
pub const STORE_FORWARD_APP: i32 = 65;
pub const RANGE_TEST_APP: i32 = 66;
pub const TELEMETRY_APP: i32 = 67;
pub const ZPS_APP: i32 = 68;
pub const SIMULATOR_APP: i32 = 69;
pub const TRACEROUTE_APP: i32 = 70;
pub const NEIGHBORINFO_APP: i32 = 71;
pub const ATAK_PLUGIN: i32 = 72;
pub const MAP_REPORT_APP: i32 = 73;
pub const POWERSTRESS_APP: i32 = 74;
pub const RETICULUM_TUNNEL_APP: i32 = 76;
pub const CEMS_APP: i32 = 77;
pub const PRIVATE_APP: i32 = 256;
pub const ATAK_FORWARDER: i32 = 257;
pub const MAX: i32 = 511;

/// Symbolic port number of a decoded payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum PortNum {
    UnknownApp = UNKNOWN_APP,
    TextMessageApp = TEXT_MESSAGE_APP,
    RemoteHardwareApp = REMOTE_HARDWARE_APP,
    PositionApp = POSITION_APP,
    NodeinfoApp = NODEINFO_APP,
    RoutingApp = ROUTING_APP,
    AdminApp = ADMIN_APP,
    TextMessageCompressedApp = TEXT_MESSAGE_COMPRESSED_APP,
    WaypointApp = WAYPOINT_APP,
    AudioApp = AUDIO_APP,
    DetectionSensorApp = DETECTION_SENSOR_APP,
    AlertApp = ALERT_APP,
    KeyVerificationApp = KEY_VERIFICATION_APP,
    ReplyApp = REPLY_APP,
    IpTunnelApp = IP_TUNNEL_APP,
    PaxcounterApp = PAXCOUNTER_APP,
    SerialApp = SERIAL_APP,
    StoreForwardApp = STORE_FORWARD_APP,
    RangeTestApp = RANGE_TEST_APP,
    TelemetryApp = TELEMETRY_APP,
    ZpsApp = ZPS_APP,
    SimulatorApp = SIMULATOR_APP,
    TracerouteApp = TRACEROUTE_APP,
    NeighborinfoApp = NEIGHBORINFO_APP,
    AtakPlugin = ATAK_PLUGIN,
    MapReportApp = MAP_REPORT_APP,
    PowerstressApp = POWERSTRESS_APP,
    ReticulumTunnelApp = RETICULUM_TUNNEL_APP,
    CemsApp = CEMS_APP,
    PrivateApp = PRIVATE_APP,
    AtakForwarder = ATAK_FORWARDER,
    Max = MAX,
}

impl PortNum {
    pub const ALL: [PortNum; 32] = [
        PortNum::UnknownApp,
        PortNum::TextMessageApp,
        PortNum::RemoteHardwareApp,
        PortNum::PositionApp,
        PortNum::NodeinfoApp,
        PortNum::RoutingApp,
        PortNum::AdminApp,
        PortNum::TextMessageCompressedApp,
        PortNum::WaypointApp,
        PortNum::AudioApp,
        PortNum::DetectionSensorApp,
        PortNum::AlertApp,
        PortNum::KeyVerificationApp,
        PortNum::ReplyApp,
        PortNum::IpTunnelApp,
        PortNum::PaxcounterApp,
        PortNum::SerialApp,
        PortNum::StoreForwardApp,
        PortNum::RangeTestApp,
        PortNum::TelemetryApp,
        PortNum::ZpsApp,
        PortNum::SimulatorApp,
        PortNum::TracerouteApp,
        PortNum::NeighborinfoApp,
        PortNum::AtakPlugin,
        PortNum::MapReportApp,
        PortNum::PowerstressApp,
        PortNum::ReticulumTunnelApp,
        PortNum::CemsApp,
        PortNum::PrivateApp,
        PortNum::AtakForwarder,
        PortNum::Max,
    ];

    pub fn from_i32(value: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|port| *port as i32 == value)
    }

    pub fn as_str_name(&self) -> &'static str {
        match self {
            PortNum::UnknownApp => "UNKNOWN_APP",
            PortNum::TextMessageApp => "TEXT_MESSAGE_APP",
            PortNum::RemoteHardwareApp => "REMOTE_HARDWARE_APP",
            PortNum::PositionApp => "POSITION_APP",
            PortNum::NodeinfoApp => "NODEINFO_APP",
            PortNum::RoutingApp => "ROUTING_APP",
            PortNum::AdminApp => "ADMIN_APP",
            PortNum::TextMessageCompressedApp => "TEXT_MESSAGE_COMPRESSED_APP",
            PortNum::WaypointApp => "WAYPOINT_APP",
            PortNum::AudioApp => "AUDIO_APP",
            PortNum::DetectionSensorApp => "DETECTION_SENSOR_APP",
            PortNum::AlertApp => "ALERT_APP",
            PortNum::KeyVerificationApp => "KEY_VERIFICATION_APP",
            PortNum::ReplyApp => "REPLY_APP",
            PortNum::IpTunnelApp => "IP_TUNNEL_APP",
            PortNum::PaxcounterApp => "PAXCOUNTER_APP",
            PortNum::SerialApp => "SERIAL_APP",
            PortNum::StoreForwardApp => "STORE_FORWARD_APP",
            PortNum::RangeTestApp => "RANGE_TEST_APP",
            PortNum::TelemetryApp => "TELEMETRY_APP",
            PortNum::ZpsApp => "ZPS_APP",
            PortNum::SimulatorApp => "SIMULATOR_APP",
            PortNum::TracerouteApp => "TRACEROUTE_APP",
            PortNum::NeighborinfoApp => "NEIGHBORINFO_APP",
            PortNum::AtakPlugin => "ATAK_PLUGIN",
            PortNum::MapReportApp => "MAP_REPORT_APP",
            PortNum::PowerstressApp => "POWERSTRESS_APP",
            PortNum::ReticulumTunnelApp => "RETICULUM_TUNNEL_APP",
            PortNum::CemsApp => "CEMS_APP",
            PortNum::PrivateApp => "PRIVATE_APP",
            PortNum::AtakForwarder => "ATAK_FORWARDER",
            PortNum::Max => "MAX",
        }
    }
}

/// Symbolic name for a raw port number.
///
/// Total over `i32`: values missing from the table map to `UNKNOWN_<n>`.
pub fn portnum_type(value: i32) -> String {
    match PortNum::from_i32(value) {
        Some(port) => port.as_str_name().to_string(),
        None => format!("UNKNOWN_{}", value),
    }
}
