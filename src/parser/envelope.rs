// Outer envelope: the routing metadata wrapped around every datagram.
use prost::Message;

use crate::parser::schema::{mesh_packet::PayloadVariant, Data, MeshPacket, Priority};

pub const BROADCAST_ADDR: u32 = 0xFFFF_FFFF;

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Decoded(Data),
    Encrypted(Vec<u8>),
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub sender: u32,
    pub dest: u32,
    pub channel_hash: u8,
    pub packet_id: u32,
    pub hop_limit: u8,
    pub hop_start: u8,
    pub rssi: i32,
    pub snr: f32,
    pub want_ack: bool,
    pub priority: i32,
    pub rx_time: u32,
    pub via_mqtt: bool,
    pub payload: Payload,
}

impl Envelope {
    /// Parses a raw datagram. Fails only when the bytes are not a valid `MeshPacket`.
    pub fn parse(datagram: &[u8]) -> Result<Self, prost::DecodeError> {
        let packet = MeshPacket::decode(datagram)?;
        Ok(Self::from(packet))
    }

    pub fn is_broadcast(&self) -> bool {
        self.dest == BROADCAST_ADDR
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self.payload, Payload::Encrypted(_))
    }

    /// Known priority level, or `None` for codes outside the schema enum.
    pub fn priority_level(&self) -> Option<Priority> {
        Priority::try_from(self.priority).ok()
    }
}

impl From<MeshPacket> for Envelope {
    fn from(packet: MeshPacket) -> Self {
        let payload = match packet.payload_variant {
            Some(PayloadVariant::Decoded(data)) => Payload::Decoded(data),
            Some(PayloadVariant::Encrypted(bytes)) => Payload::Encrypted(bytes),
            None => Payload::Empty,
        };

        Self {
            sender: packet.from,
            dest: packet.to,
            // Channel hashes are a single byte on the air; the schema widens them to uint32.
            channel_hash: (packet.channel & 0xFF) as u8,
            packet_id: packet.id,
            hop_limit: packet.hop_limit.min(u8::MAX as u32) as u8,
            hop_start: packet.hop_start.min(u8::MAX as u32) as u8,
            rssi: packet.rx_rssi,
            snr: packet.rx_snr,
            want_ack: packet.want_ack,
            priority: packet.priority,
            rx_time: packet.rx_time,
            via_mqtt: packet.via_mqtt,
            payload,
        }
    }
}
