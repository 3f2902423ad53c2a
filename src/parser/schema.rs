//! Typed protobuf messages for the subset of the mesh wire schema this crate reads.
//!
//! Only the fields the decoder renders are declared; prost skips everything else.
//! Optional scalars stay `Option<T>` so presence is explicit, and oneofs are enums.

use prost::{Enumeration, Message};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum PortNum {
    UnknownApp = 0,
    TextMessageApp = 1,
    RemoteHardwareApp = 2,
    PositionApp = 3,
    NodeinfoApp = 4,
    RoutingApp = 5,
    AdminApp = 6,
    TextMessageCompressedApp = 7,
    WaypointApp = 8,
    AudioApp = 9,
    DetectionSensorApp = 10,
    ReplyApp = 32,
    IpTunnelApp = 33,
    PaxcounterApp = 34,
    SerialApp = 64,
    StoreForwardApp = 65,
    RangeTestApp = 66,
    TelemetryApp = 67,
    ZpsApp = 68,
    SimulatorApp = 69,
    TracerouteApp = 70,
    NeighborinfoApp = 71,
    AtakPlugin = 72,
    MapReportApp = 73,
    PowerstressApp = 74,
    PrivateApp = 256,
    AtakForwarder = 257,
}

impl PortNum {
    /// Schema name of the port, as it appears in the `.proto` definition.
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
            PortNum::PrivateApp => "PRIVATE_APP",
            PortNum::AtakForwarder => "ATAK_FORWARDER",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum Priority {
    Unset = 0,
    Min = 1,
    Background = 10,
    Default = 64,
    Reliable = 70,
    Response = 80,
    High = 100,
    Alert = 110,
    Ack = 120,
    Max = 127,
}

impl Priority {
    pub fn as_str_name(&self) -> &'static str {
        match self {
            Priority::Unset => "UNSET",
            Priority::Min => "MIN",
            Priority::Background => "BACKGROUND",
            Priority::Default => "DEFAULT",
            Priority::Reliable => "RELIABLE",
            Priority::Response => "RESPONSE",
            Priority::High => "HIGH",
            Priority::Alert => "ALERT",
            Priority::Ack => "ACK",
            Priority::Max => "MAX",
        }
    }
}

/// Outer envelope carried by every datagram.
#[derive(Clone, PartialEq, Message)]
pub struct MeshPacket {
    #[prost(fixed32, tag = "1")]
    pub from: u32,
    #[prost(fixed32, tag = "2")]
    pub to: u32,
    #[prost(uint32, tag = "3")]
    pub channel: u32,
    #[prost(oneof = "mesh_packet::PayloadVariant", tags = "4, 5")]
    pub payload_variant: Option<mesh_packet::PayloadVariant>,
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
    #[prost(enumeration = "Priority", tag = "11")]
    pub priority: i32,
    #[prost(int32, tag = "12")]
    pub rx_rssi: i32,
    #[prost(bool, tag = "14")]
    pub via_mqtt: bool,
    #[prost(uint32, tag = "15")]
    pub hop_start: u32,
}

pub mod mesh_packet {
    use prost::Oneof;

    #[derive(Clone, PartialEq, Oneof)]
    pub enum PayloadVariant {
        #[prost(message, tag = "4")]
        Decoded(super::Data),
        #[prost(bytes = "vec", tag = "5")]
        Encrypted(Vec<u8>),
    }
}

/// Application payload, either plaintext inside the envelope or the result of decryption.
#[derive(Clone, PartialEq, Message)]
pub struct Data {
    #[prost(enumeration = "PortNum", tag = "1")]
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

#[derive(Clone, PartialEq, Message)]
pub struct RouteDiscovery {
    #[prost(fixed32, repeated, tag = "1")]
    pub route: Vec<u32>,
    #[prost(int32, repeated, tag = "2")]
    pub snr_towards: Vec<i32>,
    #[prost(fixed32, repeated, tag = "3")]
    pub route_back: Vec<u32>,
    #[prost(int32, repeated, tag = "4")]
    pub snr_back: Vec<i32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Routing {
    #[prost(oneof = "routing::Variant", tags = "1, 2, 3")]
    pub variant: Option<routing::Variant>,
}

pub mod routing {
    use prost::Oneof;

    #[derive(Clone, PartialEq, Oneof)]
    pub enum Variant {
        #[prost(message, tag = "1")]
        RouteRequest(super::RouteDiscovery),
        #[prost(message, tag = "2")]
        RouteReply(super::RouteDiscovery),
        // Kept as a raw code so values outside the known table survive decoding.
        #[prost(int32, tag = "3")]
        ErrorReason(i32),
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct Position {
    #[prost(sfixed32, optional, tag = "1")]
    pub latitude_i: Option<i32>,
    #[prost(sfixed32, optional, tag = "2")]
    pub longitude_i: Option<i32>,
    #[prost(int32, optional, tag = "3")]
    pub altitude: Option<i32>,
    #[prost(fixed32, tag = "4")]
    pub time: u32,
    #[prost(fixed32, tag = "7")]
    pub timestamp: u32,
    #[prost(uint32, optional, tag = "15")]
    pub ground_speed: Option<u32>,
    #[prost(uint32, optional, tag = "16")]
    pub ground_track: Option<u32>,
    #[prost(uint32, tag = "19")]
    pub sats_in_view: u32,
    #[prost(uint32, tag = "23")]
    pub precision_bits: u32,
}

#[derive(Clone, PartialEq, Message)]
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

#[derive(Clone, PartialEq, Message)]
pub struct DeviceMetrics {
    #[prost(uint32, optional, tag = "1")]
    pub battery_level: Option<u32>,
    #[prost(float, optional, tag = "2")]
    pub voltage: Option<f32>,
    #[prost(float, optional, tag = "3")]
    pub channel_utilization: Option<f32>,
    #[prost(float, optional, tag = "4")]
    pub air_util_tx: Option<f32>,
    #[prost(uint32, optional, tag = "5")]
    pub uptime_seconds: Option<u32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct EnvironmentMetrics {
    #[prost(float, optional, tag = "1")]
    pub temperature: Option<f32>,
    #[prost(float, optional, tag = "2")]
    pub relative_humidity: Option<f32>,
    #[prost(float, optional, tag = "3")]
    pub barometric_pressure: Option<f32>,
    #[prost(float, optional, tag = "4")]
    pub gas_resistance: Option<f32>,
    #[prost(float, optional, tag = "5")]
    pub voltage: Option<f32>,
    #[prost(float, optional, tag = "6")]
    pub current: Option<f32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct AirQualityMetrics {
    #[prost(uint32, optional, tag = "1")]
    pub pm10_standard: Option<u32>,
    #[prost(uint32, optional, tag = "2")]
    pub pm25_standard: Option<u32>,
    #[prost(uint32, optional, tag = "3")]
    pub pm100_standard: Option<u32>,
    #[prost(uint32, optional, tag = "4")]
    pub pm10_environmental: Option<u32>,
    #[prost(uint32, optional, tag = "5")]
    pub pm25_environmental: Option<u32>,
    #[prost(uint32, optional, tag = "6")]
    pub pm100_environmental: Option<u32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct PowerMetrics {
    #[prost(float, optional, tag = "1")]
    pub ch1_voltage: Option<f32>,
    #[prost(float, optional, tag = "2")]
    pub ch1_current: Option<f32>,
    #[prost(float, optional, tag = "3")]
    pub ch2_voltage: Option<f32>,
    #[prost(float, optional, tag = "4")]
    pub ch2_current: Option<f32>,
    #[prost(float, optional, tag = "5")]
    pub ch3_voltage: Option<f32>,
    #[prost(float, optional, tag = "6")]
    pub ch3_current: Option<f32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Telemetry {
    #[prost(fixed32, tag = "1")]
    pub time: u32,
    #[prost(oneof = "telemetry::Variant", tags = "2, 3, 4, 5")]
    pub variant: Option<telemetry::Variant>,
}

pub mod telemetry {
    use prost::Oneof;

    #[derive(Clone, PartialEq, Oneof)]
    pub enum Variant {
        #[prost(message, tag = "2")]
        DeviceMetrics(super::DeviceMetrics),
        #[prost(message, tag = "3")]
        EnvironmentMetrics(super::EnvironmentMetrics),
        #[prost(message, tag = "4")]
        AirQualityMetrics(super::AirQualityMetrics),
        #[prost(message, tag = "5")]
        PowerMetrics(super::PowerMetrics),
    }
}
