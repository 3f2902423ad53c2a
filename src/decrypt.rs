//! Multi-key AES-128-CTR decryption of encrypted mesh payloads.
//!
//! The wire format carries no authentication tag, so a key is "right" only in the
//! sense that its output parses as a plausible message. Results keep the
//! `Definite`/`Partial` distinction so callers can tell the two apart.

use aes::Aes128;
use ctr::cipher::{KeyIvInit, StreamCipher};
use prost::Message;
use std::fmt;

use crate::keys::{KeyCandidate, KeyCatalog, KEY_LEN};
use crate::parser::schema::{Data, Routing};

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

pub const NONCE_LEN: usize = 16;

/// Ciphertexts longer than this that match no key likely use per-node public keys.
pub const PKI_HINT_MIN_LEN: usize = 12;

/// First bytes accepted by the `Partial` heuristic: varint tags for fields 1 through 15.
pub const PLAUSIBLE_TAG_BYTES: [u8; 15] = [
    0x08, 0x10, 0x18, 0x20, 0x28, 0x30, 0x38, 0x40, 0x48, 0x50, 0x58, 0x60, 0x68, 0x70, 0x78,
];

/// Builds the CTR initial counter block.
///
/// Bytes 0..8 hold the packet id (u64 LE), 8..12 the sender id (u32 LE), 12..16 stay zero.
pub fn nonce(packet_id: u64, sender_id: u32) -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    nonce[0..8].copy_from_slice(&packet_id.to_le_bytes());
    nonce[8..12].copy_from_slice(&sender_id.to_le_bytes());
    nonce
}

/// Runs the AES-128-CTR keystream over `data`. Encryption and decryption are the same call.
pub fn apply_keystream(key: &[u8; KEY_LEN], nonce: &[u8; NONCE_LEN], data: &[u8]) -> Vec<u8> {
    let mut buf = data.to_vec();
    let mut cipher = Aes128Ctr::new(key.into(), nonce.into());
    cipher.apply_keystream(&mut buf);
    buf
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Confidence {
    /// The plaintext parsed as a `Data` or `Routing` message.
    Definite,
    /// Parsing failed but the first byte looks like a protobuf tag. Unverified.
    Partial,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::Definite => write!(f, "definite"),
            Confidence::Partial => write!(f, "partial"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    KeyExhaustion,
    MalformedCiphertext,
    MalformedEnvelope,
    ReplayRecordMalformed,
    CaptureFileIo,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::KeyExhaustion => "key exhaustion",
            FailureKind::MalformedCiphertext => "malformed ciphertext",
            FailureKind::MalformedEnvelope => "malformed envelope",
            FailureKind::ReplayRecordMalformed => "malformed replay record",
            FailureKind::CaptureFileIo => "capture file i/o",
        };
        f.write_str(s)
    }
}

/// Message the accepted plaintext parsed as.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaintextMessage {
    Data(Data),
    Routing(Routing),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecryptionAttempt {
    pub success: bool,
    pub plaintext: Option<Vec<u8>>,
    pub key_used: Option<KeyCandidate>,
    /// Position of the accepted key within the full sweep (priority list, then hash tier).
    pub candidate_index: Option<usize>,
    pub confidence: Option<Confidence>,
    pub attempts_tried: usize,
    pub failure: Option<FailureKind>,
    pub failure_hint: Option<String>,
    pub message: Option<PlaintextMessage>,
}

impl DecryptionAttempt {
    fn failed(kind: FailureKind, attempts_tried: usize, hint: Option<String>) -> Self {
        Self {
            success: false,
            plaintext: None,
            key_used: None,
            candidate_index: None,
            confidence: None,
            attempts_tried,
            failure: Some(kind),
            failure_hint: hint,
            message: None,
        }
    }

    pub fn is_definite(&self) -> bool {
        self.success && self.confidence == Some(Confidence::Definite)
    }

    pub fn is_partial(&self) -> bool {
        self.success && self.confidence == Some(Confidence::Partial)
    }

    /// One-line status in the form the console prints.
    pub fn status_line(&self, channel_hash: u8) -> String {
        match (&self.key_used, self.confidence) {
            (Some(key), Some(Confidence::Definite)) => format!("Success (using {})", key.label),
            (Some(key), Some(Confidence::Partial)) => {
                format!("Partial success (using {}) - protobuf parsing failed", key.label)
            }
            _ => match self.failure {
                Some(FailureKind::MalformedCiphertext) => "Empty ciphertext, nothing to decrypt".to_string(),
                _ => format!(
                    "All decryption attempts failed for channel hash {} (tried {} keys){}",
                    channel_hash,
                    self.attempts_tried,
                    self.failure_hint.as_deref().map(|h| format!(" ({})", h)).unwrap_or_default()
                ),
            },
        }
    }
}

/// Outcome of judging one candidate's output.
fn judge_plaintext(plaintext: &[u8]) -> Option<(Confidence, Option<PlaintextMessage>)> {
    if let Ok(data) = Data::decode(plaintext) {
        if (0..=255).contains(&data.portnum) {
            return Some((Confidence::Definite, Some(PlaintextMessage::Data(data))));
        }
    }
    if let Ok(routing) = Routing::decode(plaintext) {
        return Some((Confidence::Definite, Some(PlaintextMessage::Routing(routing))));
    }
    match plaintext.first() {
        Some(b) if PLAUSIBLE_TAG_BYTES.contains(b) => Some((Confidence::Partial, None)),
        _ => None,
    }
}

pub struct DecryptionEngine<'a> {
    catalog: &'a KeyCatalog,
}

impl<'a> DecryptionEngine<'a> {
    pub fn new(catalog: &'a KeyCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &KeyCatalog {
        self.catalog
    }

    /// Sweeps the catalog, then the hash-derived tier, and returns on the first acceptance.
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        packet_id: u32,
        sender_id: u32,
        channel_hash: u8,
    ) -> DecryptionAttempt {
        if ciphertext.is_empty() {
            return DecryptionAttempt::failed(FailureKind::MalformedCiphertext, 0, None);
        }

        let nonce = nonce(packet_id as u64, sender_id);
        let hash_tier = self.catalog.hash_derived(channel_hash);
        let sweep = self.catalog.candidates().iter().chain(hash_tier.iter());

        let mut attempts = 0;
        for (index, candidate) in sweep.enumerate() {
            attempts += 1;
            let plaintext = apply_keystream(&candidate.key, &nonce, ciphertext);
            if let Some((confidence, message)) = judge_plaintext(&plaintext) {
                return DecryptionAttempt {
                    success: true,
                    plaintext: Some(plaintext),
                    key_used: Some(candidate.clone()),
                    candidate_index: Some(index),
                    confidence: Some(confidence),
                    attempts_tried: attempts,
                    failure: None,
                    failure_hint: None,
                    message,
                };
            }
        }

        let hint = (ciphertext.len() > PKI_HINT_MIN_LEN)
            .then(|| "Packet may use PKI encryption - requires node's private key".to_string());
        DecryptionAttempt::failed(FailureKind::KeyExhaustion, attempts, hint)
    }
}
