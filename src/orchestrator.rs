//! Per-datagram pipeline: envelope parse, decryption, decoding, bookkeeping.
//!
//! One datagram is processed to completion before the next. Nothing in here
//! returns an error; every outcome lands in the `PacketReport`.

use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::capture::{CaptureRecord, CaptureWriter};
use crate::config::PlausibilityThresholds;
use crate::decode::{DecodedMessage, MessageDecoder};
use crate::decrypt::{DecryptionAttempt, DecryptionEngine, FailureKind, PlaintextMessage};
use crate::format::format_node_id;
use crate::keys::KeyCatalog;
use crate::monitor::TrafficMonitor;
use crate::nodes::NodeDirectory;
use crate::parser::envelope::{Envelope, Payload};

#[derive(Debug, Clone, PartialEq)]
pub struct PacketReport {
    pub number: u64,
    /// Capture time for replayed records, receive time for live ones.
    pub timestamp: f64,
    pub source: SocketAddr,
    pub size: usize,
    pub raw: Vec<u8>,
    pub envelope: Option<Envelope>,
    pub envelope_error: Option<String>,
    pub decryption: Option<DecryptionAttempt>,
    pub decoded: Option<DecodedMessage>,
}

impl PacketReport {
    pub fn failure(&self) -> Option<FailureKind> {
        if self.envelope_error.is_some() {
            return Some(FailureKind::MalformedEnvelope);
        }
        self.decryption.as_ref().and_then(|d| d.failure)
    }

    /// One JSON object per packet for `--json` output.
    pub fn to_json(&self) -> Value {
        let envelope = self.envelope.as_ref().map(|e| {
            json!({
                "from": format_node_id(e.sender),
                "to": format_node_id(e.dest),
                "channel": e.channel_hash,
                "id": e.packet_id,
                "hop_limit": e.hop_limit,
                "hop_start": e.hop_start,
                "rssi": e.rssi,
                "snr": e.snr,
                "want_ack": e.want_ack,
                "priority": e.priority,
                "encrypted": e.is_encrypted(),
            })
        });
        let decryption = self.decryption.as_ref().map(|d| {
            json!({
                "success": d.success,
                "confidence": d.confidence.map(|c| c.to_string()),
                "key": d.key_used.as_ref().map(|k| k.label.clone()),
                "candidate_index": d.candidate_index,
                "attempts": d.attempts_tried,
                "failure": d.failure.map(|f| f.to_string()),
                "hint": d.failure_hint,
            })
        });
        json!({
            "packet": self.number,
            "timestamp": self.timestamp,
            "source": self.source.to_string(),
            "size": self.size,
            "envelope": envelope,
            "envelope_error": self.envelope_error,
            "decryption": decryption,
            "decoded": self.decoded,
        })
    }
}

pub struct PacketOrchestrator {
    catalog: KeyCatalog,
    thresholds: PlausibilityThresholds,
    monitor: Arc<TrafficMonitor>,
    nodes: Arc<NodeDirectory>,
    capture: Option<CaptureWriter>,
    packet_count: u64,
}

impl PacketOrchestrator {
    pub fn new(catalog: KeyCatalog, thresholds: PlausibilityThresholds) -> Self {
        Self {
            catalog,
            thresholds,
            monitor: Arc::new(TrafficMonitor::new()),
            nodes: Arc::new(NodeDirectory::new()),
            capture: None,
            packet_count: 0,
        }
    }

    pub fn with_monitor(mut self, monitor: Arc<TrafficMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn with_nodes(mut self, nodes: Arc<NodeDirectory>) -> Self {
        self.nodes = nodes;
        self
    }

    pub fn with_capture(mut self, capture: CaptureWriter) -> Self {
        self.capture = Some(capture);
        self
    }

    /// Starts capturing into `dir`. If the directory can't be prepared the
    /// error is counted and processing runs without capture.
    pub fn start_capture<P: AsRef<Path>>(&mut self, dir: P) -> bool {
        match CaptureWriter::new(dir) {
            Ok(writer) => {
                self.capture = Some(writer);
                true
            }
            Err(e) => {
                warn!("{}: {:#}; continuing without capture", FailureKind::CaptureFileIo, e);
                self.monitor.record_capture_error();
                false
            }
        }
    }

    pub fn catalog(&self) -> &KeyCatalog {
        &self.catalog
    }

    pub fn monitor(&self) -> &Arc<TrafficMonitor> {
        &self.monitor
    }

    pub fn nodes(&self) -> &Arc<NodeDirectory> {
        &self.nodes
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.is_some()
    }

    /// Live path: capture the raw bytes first, then process.
    pub fn handle_live(&mut self, datagram: &[u8], source: SocketAddr) -> PacketReport {
        let record = CaptureRecord::now(datagram);
        self.capture(&record);
        self.process(datagram, source, record.timestamp)
    }

    /// Appends to the capture log. An I/O failure disables capture and leaves the caller running.
    pub fn capture(&mut self, record: &CaptureRecord) {
        let Some(writer) = self.capture.as_mut() else {
            return;
        };
        if let Err(e) = writer.append(record) {
            warn!("{}: {:#}; capture disabled", FailureKind::CaptureFileIo, e);
            self.monitor.record_capture_error();
            if let Some(mut writer) = self.capture.take() {
                writer.close();
            }
        }
    }

    /// Flushes and closes any open capture file.
    pub fn shutdown(&mut self) {
        if let Some(mut writer) = self.capture.take() {
            writer.close();
        }
    }

    pub fn process(&mut self, datagram: &[u8], source: SocketAddr, timestamp: f64) -> PacketReport {
        self.packet_count += 1;
        self.monitor.record_packet(datagram.len());

        let mut report = PacketReport {
            number: self.packet_count,
            timestamp,
            source,
            size: datagram.len(),
            raw: datagram.to_vec(),
            envelope: None,
            envelope_error: None,
            decryption: None,
            decoded: None,
        };

        // 1. Envelope
        let envelope = match Envelope::parse(datagram) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!("Packet #{} from {}: {}: {}", report.number, source, FailureKind::MalformedEnvelope, e);
                self.monitor.record_malformed();
                report.envelope_error = Some(e.to_string());
                return report;
            }
        };
        self.monitor.record_sender(envelope.sender);

        // 2. Payload
        let decoder = MessageDecoder::new(&self.thresholds);
        match &envelope.payload {
            Payload::Decoded(data) => {
                self.monitor.record_plaintext();
                report.decoded = Some(decoder.decode_data(data));
            }
            Payload::Encrypted(ciphertext) => {
                let engine = DecryptionEngine::new(&self.catalog);
                let attempt = engine.decrypt(
                    ciphertext,
                    envelope.packet_id,
                    envelope.sender,
                    envelope.channel_hash,
                );
                self.monitor.record_decryption(&attempt);
                report.decoded = Some(decode_attempt(&decoder, &attempt));
                report.decryption = Some(attempt);
            }
            Payload::Empty => {}
        }

        // 3. Node names
        if let Some(decoded) = &report.decoded {
            self.nodes.observe(envelope.sender, decoded);
        }

        report.envelope = Some(envelope);
        report
    }
}

fn decode_attempt(decoder: &MessageDecoder<'_>, attempt: &DecryptionAttempt) -> DecodedMessage {
    match (&attempt.message, attempt.is_definite()) {
        (Some(PlaintextMessage::Data(data)), true) => decoder.decode_data(data),
        (Some(PlaintextMessage::Routing(routing)), true) => {
            let len = attempt.plaintext.as_ref().map_or(0, |p| p.len());
            decoder.decode_routing(routing, len)
        }
        _ if attempt.is_partial() => decoder.undecryptable(attempt.plaintext.as_deref()),
        _ => decoder.undecryptable(None),
    }
}
