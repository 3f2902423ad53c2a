//! Per-port decoding of plaintext payloads into an ordered field list.
//!
//! Decoders never fail: a schema parse error falls back to a manual read or to a
//! raw-byte summary. Field order is part of the output contract.

use prost::Message;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::config::PlausibilityThresholds;
use crate::format::{format_node_id, format_route, format_snr_list, format_timestamp, raw_summary};
use crate::parser::schema::{
    routing, telemetry, Data, PortNum, Position, RouteDiscovery, Routing, Telemetry, User,
};

/// Routing payloads at or below this size with no sub-message are plain acknowledgments.
pub const SIMPLE_ACK_MAX_LEN: usize = 4;

/// Known routing error reasons, indexed by code.
pub const ROUTING_ERRORS: [&str; 10] = [
    "NONE (Success/ACK)",
    "NO_ROUTE",
    "GOT_NAK",
    "TIMEOUT",
    "NO_INTERFACE",
    "MAX_RETRANSMIT",
    "NO_CHANNEL",
    "TOO_LARGE",
    "NO_RESPONSE",
    "DUTY_CYCLE_LIMIT",
];

pub fn routing_error_name(code: i32) -> String {
    usize::try_from(code)
        .ok()
        .and_then(|i| ROUTING_ERRORS.get(i))
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("unknown code {}", code))
}

/// Ordered `label -> value` pairs, kept in the order the decoder pushed them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields {
    entries: Vec<(&'static str, String)>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, label: &'static str, value: impl Into<String>) {
        self.entries.push((label, value.into()));
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.entries.iter().find(|(l, _)| *l == label).map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, label: &str) -> bool {
        self.get(label).is_some()
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(l, _)| *l).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.entries.iter().map(|(l, v)| (*l, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Fields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (label, value) in &self.entries {
            map.serialize_entry(label, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum PortKind {
    Text,
    Traceroute,
    Position,
    NodeInfo,
    Telemetry,
    Routing,
    /// Encrypted payload that no key could turn into a parsed message.
    Encrypted,
    Other(i32),
}

impl PortKind {
    pub fn from_portnum(portnum: i32) -> Self {
        match PortNum::try_from(portnum) {
            Ok(PortNum::TextMessageApp) => PortKind::Text,
            Ok(PortNum::TracerouteApp) => PortKind::Traceroute,
            Ok(PortNum::PositionApp) => PortKind::Position,
            Ok(PortNum::NodeinfoApp) => PortKind::NodeInfo,
            Ok(PortNum::TelemetryApp) => PortKind::Telemetry,
            Ok(PortNum::RoutingApp) => PortKind::Routing,
            _ => PortKind::Other(portnum),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct DecodedMessage {
    pub kind: PortKind,
    pub fields: Fields,
}

/// `<NAME> (<n>)` for a port number.
pub fn port_label(portnum: i32) -> String {
    let name = PortNum::try_from(portnum).map(|p| p.as_str_name()).unwrap_or("UNKNOWN");
    format!("{} ({})", name, portnum)
}

pub struct MessageDecoder<'a> {
    thresholds: &'a PlausibilityThresholds,
}

impl<'a> MessageDecoder<'a> {
    pub fn new(thresholds: &'a PlausibilityThresholds) -> Self {
        Self { thresholds }
    }

    /// Decodes a `Data` message: port label, port-specific fields, then envelope extras.
    pub fn decode_data(&self, data: &Data) -> DecodedMessage {
        let kind = PortKind::from_portnum(data.portnum);
        let mut fields = Fields::new();
        fields.push("Port", port_label(data.portnum));

        // An empty routing payload is still an acknowledgment.
        if !data.payload.is_empty() || kind == PortKind::Routing {
            let payload = data.payload.as_slice();
            match kind {
                PortKind::Text => text_fields(payload, &mut fields),
                PortKind::Traceroute => traceroute_fields(payload, &mut fields),
                PortKind::Position => position_fields(payload, &mut fields),
                PortKind::NodeInfo => node_info_fields(payload, &mut fields),
                PortKind::Telemetry => self.telemetry_fields(payload, &mut fields),
                PortKind::Routing => routing_port_fields(payload, &mut fields),
                PortKind::Encrypted | PortKind::Other(_) => {
                    fields.push("Payload Data", raw_summary(payload))
                }
            }
        }

        if data.want_response {
            fields.push("Wants Response", "Yes");
        }
        if data.dest != 0 {
            fields.push("Destination", format_node_id(data.dest));
        }
        if data.source != 0 {
            fields.push("Source", format_node_id(data.source));
        }
        if data.request_id != 0 {
            fields.push("Request ID", format!("0x{:08x}", data.request_id));
        }
        if data.reply_id != 0 {
            fields.push("Reply ID", format!("0x{:08x}", data.reply_id));
        }

        DecodedMessage { kind, fields }
    }

    /// Decodes a plaintext that parsed directly as a `Routing` message.
    pub fn decode_routing(&self, routing: &Routing, plaintext_len: usize) -> DecodedMessage {
        let mut fields = Fields::new();
        fields.push("Message Type", "ROUTING");
        match &routing.variant {
            Some(variant) => routing_variant_fields(variant, &mut fields),
            None if plaintext_len <= SIMPLE_ACK_MAX_LEN => {
                fields.push("Routing Message", "Simple ACK packet")
            }
            None => fields.push("Routing Message", "Control message"),
        }
        DecodedMessage { kind: PortKind::Routing, fields }
    }

    /// Placeholder message for encrypted payloads with no accepted plaintext.
    pub fn undecryptable(&self, partial_plaintext: Option<&[u8]>) -> DecodedMessage {
        let mut fields = Fields::new();
        fields.push("Port", "ENCRYPTED");
        match partial_plaintext {
            Some(plain) => {
                fields.push("Status", "Partial decrypt (unverified)");
                fields.push("Plaintext", raw_summary(plain));
            }
            None => fields.push("Status", "Unable to decrypt"),
        }
        DecodedMessage { kind: PortKind::Encrypted, fields }
    }

    fn telemetry_fields(&self, payload: &[u8], fields: &mut Fields) {
        let telemetry = match Telemetry::decode(payload) {
            Ok(t) => t,
            Err(e) => {
                self.telemetry_fallback(payload, &e.to_string(), fields);
                return;
            }
        };

        match &telemetry.variant {
            Some(telemetry::Variant::DeviceMetrics(m)) => {
                if let Some(v) = m.battery_level {
                    fields.push("Battery", format!("{}%", v));
                }
                if let Some(v) = m.voltage {
                    fields.push("Voltage", format!("{:.2}V", v));
                }
                if let Some(v) = m.channel_utilization {
                    fields.push("Channel Util", format!("{:.1}%", v));
                }
                if let Some(v) = m.air_util_tx {
                    fields.push("Air Util TX", format!("{:.1}%", v));
                }
                if let Some(v) = m.uptime_seconds {
                    fields.push("Uptime", format_uptime(v));
                }
            }
            Some(telemetry::Variant::EnvironmentMetrics(m)) => {
                if let Some(v) = m.temperature {
                    fields.push("Temperature", format!("{:.1}°C", v));
                }
                if let Some(v) = m.relative_humidity {
                    fields.push("Humidity", format!("{:.1}%", v));
                }
                if let Some(v) = m.barometric_pressure {
                    fields.push("Pressure", format!("{:.1} hPa", v));
                }
                if let Some(v) = m.gas_resistance {
                    fields.push("Gas Resistance", format!("{:.0} Ω", v));
                }
                if let Some(v) = m.voltage {
                    fields.push("Voltage", format!("{:.2}V", v));
                }
                if let Some(v) = m.current {
                    fields.push("Current", format!("{:.2}A", v));
                }
            }
            Some(telemetry::Variant::AirQualityMetrics(m)) => {
                if let Some(v) = m.pm10_standard {
                    fields.push("PM1.0", format!("{} µg/m³", v));
                }
                if let Some(v) = m.pm25_standard {
                    fields.push("PM2.5", format!("{} µg/m³", v));
                }
                if let Some(v) = m.pm100_standard {
                    fields.push("PM10", format!("{} µg/m³", v));
                }
            }
            Some(telemetry::Variant::PowerMetrics(m)) => {
                let channels = [
                    (m.ch1_voltage, m.ch1_current, "CH1 Voltage", "CH1 Current"),
                    (m.ch2_voltage, m.ch2_current, "CH2 Voltage", "CH2 Current"),
                    (m.ch3_voltage, m.ch3_current, "CH3 Voltage", "CH3 Current"),
                ];
                for (voltage, current, v_label, c_label) in channels {
                    if let Some(v) = voltage {
                        fields.push(v_label, format!("{:.2}V", v));
                    }
                    if let Some(c) = current {
                        fields.push(c_label, format!("{:.2}A", c));
                    }
                }
            }
            None => {}
        }

        if telemetry.time > 0 {
            fields.push("Telemetry Time", format_timestamp(telemetry.time));
        }
        fields.push("Telemetry Size", format!("{} bytes", payload.len()));
    }

    /// Reads a leading f32 voltage and a following f32 temperature, keeping only plausible ones.
    fn telemetry_fallback(&self, payload: &[u8], reason: &str, fields: &mut Fields) {
        let voltage = read_f32_le(payload, 0).filter(|v| self.thresholds.plausible_voltage(*v));
        let temperature = read_f32_le(payload, 4).filter(|t| self.thresholds.plausible_temperature(*t));

        if voltage.is_none() && temperature.is_none() {
            fields.push("Payload Data", raw_summary(payload));
            fields.push("Parse Error", "Both protobuf and manual parsing failed");
            return;
        }

        if let Some(v) = voltage {
            fields.push("Voltage", format!("{:.2}V", v));
        }
        if let Some(t) = temperature {
            fields.push("Temperature", format!("{:.1}°C", t));
        }
        fields.push("Telemetry Size", format!("{} bytes", payload.len()));
        fields.push("Parse Status", format!("Protobuf parsing failed: {}", reason));
    }
}

fn read_f32_le(buf: &[u8], offset: usize) -> Option<f32> {
    let bytes: [u8; 4] = buf.get(offset..offset + 4)?.try_into().ok()?;
    Some(f32::from_le_bytes(bytes))
}

fn read_i32_le(buf: &[u8], offset: usize) -> Option<i32> {
    let bytes: [u8; 4] = buf.get(offset..offset + 4)?.try_into().ok()?;
    Some(i32::from_le_bytes(bytes))
}

pub fn format_uptime(seconds: u32) -> String {
    let hours = seconds as f64 / 3600.0;
    if hours < 24.0 {
        format!("{:.1} hours", hours)
    } else {
        format!("{:.1} days", hours / 24.0)
    }
}

fn text_fields(payload: &[u8], fields: &mut Fields) {
    match std::str::from_utf8(payload) {
        Ok(text) => fields.push("Message Text", format!("\"{}\"", text)),
        Err(_) => fields.push("Payload Data", raw_summary(payload)),
    }
}

fn traceroute_fields(payload: &[u8], fields: &mut Fields) {
    let route = match RouteDiscovery::decode(payload) {
        Ok(r) => r,
        Err(_) => {
            fields.push("Payload Data", raw_summary(payload));
            return;
        }
    };
    if !route.route.is_empty() {
        fields.push("Route Path", format_route(&route.route));
        fields.push("Hop Count", format!("{} nodes", route.route.len()));
    }
    if !route.snr_towards.is_empty() {
        fields.push("SNR Forward", format_snr_list(&route.snr_towards));
    }
    if !route.snr_back.is_empty() {
        fields.push("SNR Return", format_snr_list(&route.snr_back));
    }
}

fn push_location(lat_i: i32, lon_i: i32, fields: &mut Fields) {
    let lat = lat_i as f64 * 1e-7;
    let lon = lon_i as f64 * 1e-7;
    fields.push("Location", format!("{:.6}, {:.6}", lat, lon));
    fields.push("Maps Link", format!("https://maps.google.com/?q={},{}", lat, lon));
}

fn position_fields(payload: &[u8], fields: &mut Fields) {
    let position = match Position::decode(payload) {
        Ok(p) => p,
        Err(_) => {
            // Some senders put the two fixed-point coordinates first, unframed.
            match (read_i32_le(payload, 0), read_i32_le(payload, 4)) {
                (Some(lat_i), Some(lon_i)) if lat_i != 0 && lon_i != 0 => {
                    push_location(lat_i, lon_i, fields)
                }
                _ => fields.push("Payload Data", raw_summary(payload)),
            }
            return;
        }
    };

    if let (Some(lat_i), Some(lon_i)) = (position.latitude_i, position.longitude_i) {
        if lat_i != 0 && lon_i != 0 {
            push_location(lat_i, lon_i, fields);
        }
    }
    if let Some(alt) = position.altitude {
        fields.push("Altitude", format!("{}m", alt));
    }
    if let Some(speed) = position.ground_speed {
        fields.push("Speed", format!("{} km/h", speed));
    }
    if position.sats_in_view > 0 {
        fields.push("Satellites", position.sats_in_view.to_string());
    }
}

fn node_info_fields(payload: &[u8], fields: &mut Fields) {
    let user = match User::decode(payload) {
        Ok(u) => u,
        Err(_) => {
            fields.push("Payload Data", raw_summary(payload));
            return;
        }
    };
    fields.push("Node ID", user.id);
    fields.push("Long Name", user.long_name);
    fields.push("Short Name", user.short_name);
    if !user.macaddr.is_empty() {
        let mac = user.macaddr.iter().map(|b| format!("{:02x}", b)).collect::<Vec<_>>().join(":");
        fields.push("MAC Address", mac);
    }
    // Name lookup for the code belongs to the presentation layer.
    if user.hw_model != 0 {
        fields.push("Hardware", user.hw_model.to_string());
    }
}

fn routing_variant_fields(variant: &routing::Variant, fields: &mut Fields) {
    match variant {
        routing::Variant::RouteRequest(req) => {
            fields.push("Routing Type", "Route Request (Traceroute)");
            if !req.route.is_empty() {
                fields.push("Route", format_route(&req.route));
            }
            if !req.snr_towards.is_empty() {
                fields.push("SNR Values", format_snr_list(&req.snr_towards));
            }
        }
        routing::Variant::RouteReply(reply) => {
            fields.push("Routing Type", "Route Reply (Traceroute Response)");
            if !reply.route.is_empty() {
                fields.push("Forward Route", format_route(&reply.route));
            }
            if !reply.route_back.is_empty() {
                fields.push("Return Route", format_route(&reply.route_back));
            }
            if !reply.snr_towards.is_empty() {
                fields.push("Forward SNR", format_snr_list(&reply.snr_towards));
            }
            if !reply.snr_back.is_empty() {
                fields.push("Return SNR", format_snr_list(&reply.snr_back));
            }
        }
        routing::Variant::ErrorReason(code) => {
            fields.push("Routing Type", "Error Response");
            fields.push("Error", routing_error_name(*code));
            if *code == 0 {
                fields.push("Status", "Success/ACK");
            }
        }
    }
}

fn routing_port_fields(payload: &[u8], fields: &mut Fields) {
    match Routing::decode(payload) {
        Ok(routing) => match &routing.variant {
            Some(variant) => routing_variant_fields(variant, fields),
            None if payload.len() <= SIMPLE_ACK_MAX_LEN => {
                fields.push("Routing Message", "Simple ACK packet")
            }
            None => fields.push("Routing Message", "Control message"),
        },
        Err(_) if payload.len() <= SIMPLE_ACK_MAX_LEN => {
            fields.push("Routing Message", "Simple ACK packet");
            fields.push("Status", "Message acknowledged");
        }
        Err(_) => fields.push("Routing Message", "Control packet"),
    }
    fields.push("Routing Data", format!("bytes({}): {}", payload.len(), hex::encode(payload)));
}
