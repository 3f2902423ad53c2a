//! Catalog of symmetric channel keys tried against encrypted payloads.
//!
//! The catalog is built once and handed around by reference. Its order is the
//! try order of the decryption sweep, so it must never depend on anything but
//! the constants below.

/// Length of the AES-128 key material actually used for decryption.
pub const KEY_LEN: usize = 16;

/// Number of indexed variants (index 0 through 255).
pub const INDEXED_VARIANTS: usize = 256;

/// Number of hash-derived variants appended after the priority list.
pub const HASH_DERIVED_VARIANTS: usize = 2;

pub const DEFAULT_PSK: [u8; 16] = [
    0xd4, 0xf1, 0xbb, 0x3a, 0x20, 0x29, 0x07, 0x59, 0xf0, 0xbc, 0xff, 0xab, 0xcf, 0x4e, 0x69, 0x01,
];

pub const CHANNEL_1_PSK: [u8; 32] = [
    0x4e, 0x22, 0x1d, 0x8b, 0xc3, 0x09, 0x1b, 0xe2, 0x11, 0x9c, 0x89, 0x12, 0xf2, 0x25, 0x19, 0x5d,
    0x15, 0x3e, 0x30, 0x7b, 0x86, 0xb6, 0xec, 0xc4, 0x6a, 0xc3, 0x96, 0x5e, 0x9e, 0x10, 0x9d, 0xd5,
];

pub const CHANNEL_2_PSK: [u8; 32] = [
    0x15, 0x6f, 0xfe, 0x46, 0xd4, 0x56, 0x63, 0x8a, 0x54, 0x43, 0x13, 0xf2, 0xef, 0x6c, 0x63, 0x89,
    0xf0, 0x06, 0x30, 0x52, 0xce, 0x36, 0x5e, 0xb1, 0xe8, 0xbb, 0x86, 0xe6, 0x26, 0x5b, 0x1d, 0x58,
];

pub const EVENT_PSK: [u8; 32] = [
    0x38, 0x4b, 0xbc, 0xc0, 0x1d, 0xc0, 0x22, 0xd1, 0x81, 0xbf, 0x36, 0xb8, 0x61, 0x21, 0xe1, 0xfb,
    0x96, 0xb7, 0x2e, 0x55, 0xbf, 0x74, 0x22, 0x7e, 0x9d, 0x6a, 0xfb, 0x48, 0xd6, 0x4c, 0xb1, 0xa1,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyOrigin {
    Default,
    Named,
    Event,
    /// `pskIndex` 1..=255 derived from the default key.
    Indexed(u8),
    /// `pskIndex` 0: the all-zero key of an unencrypted channel.
    Unencrypted,
    /// Derived on demand from a packet's channel hash.
    HashDerived(u8),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyCandidate {
    pub key: [u8; KEY_LEN],
    pub label: String,
    pub rank: usize,
    pub origin: KeyOrigin,
}

impl KeyCandidate {
    fn new(material: &[u8], label: impl Into<String>, rank: usize, origin: KeyOrigin) -> Self {
        Self { key: truncate_key(material), label: label.into(), rank, origin }
    }
}

/// First 16 bytes of the material, zero-padded if shorter.
pub fn truncate_key(material: &[u8]) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    let n = material.len().min(KEY_LEN);
    key[..n].copy_from_slice(&material[..n]);
    key
}

/// Adds `delta` (mod 256) to the last byte of a key.
pub fn bump_last_byte(key: &[u8; KEY_LEN], delta: u8) -> [u8; KEY_LEN] {
    let mut out = *key;
    out[KEY_LEN - 1] = out[KEY_LEN - 1].wrapping_add(delta);
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCatalog {
    candidates: Vec<KeyCandidate>,
}

impl Default for KeyCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyCatalog {
    pub fn new() -> Self {
        let mut candidates = Vec::with_capacity(4 + INDEXED_VARIANTS);

        // 1. Fixed keys, most common first
        let fixed: [(&[u8], &str, KeyOrigin); 4] = [
            (&DEFAULT_PSK, "Default PSK (index 1)", KeyOrigin::Default),
            (&CHANNEL_1_PSK, "Channel 1 (NodeChat)", KeyOrigin::Named),
            (&CHANNEL_2_PSK, "Channel 2 (YardSale)", KeyOrigin::Named),
            (&EVENT_PSK, "Event PSK (32-byte)", KeyOrigin::Event),
        ];
        for (material, label, origin) in fixed {
            let rank = candidates.len();
            candidates.push(KeyCandidate::new(material, label, rank, origin));
        }

        // 2. Indexed variants 1..=255, ascending
        for index in 1..INDEXED_VARIANTS {
            let key = bump_last_byte(&DEFAULT_PSK, (index - 1) as u8);
            let rank = candidates.len();
            candidates.push(KeyCandidate::new(
                &key,
                format!("PSK variant (index {})", index),
                rank,
                KeyOrigin::Indexed(index as u8),
            ));
        }

        // 3. Index 0 goes last so it can never shadow a real key
        let rank = candidates.len();
        candidates.push(KeyCandidate::new(
            &[0u8; KEY_LEN],
            "No encryption (pskIndex 0)",
            rank,
            KeyOrigin::Unencrypted,
        ));

        Self { candidates }
    }

    /// Priority-ordered candidates, excluding the hash-derived tier.
    pub fn candidates(&self) -> &[KeyCandidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Lower-priority variants of the first two catalog keys, bumped by the channel hash.
    pub fn hash_derived(&self, channel_hash: u8) -> Vec<KeyCandidate> {
        self.candidates
            .iter()
            .take(HASH_DERIVED_VARIANTS)
            .enumerate()
            .map(|(i, base)| KeyCandidate {
                key: bump_last_byte(&base.key, channel_hash),
                label: format!("Hash-based variant (hash {})", channel_hash),
                rank: self.candidates.len() + i,
                origin: KeyOrigin::HashDerived(channel_hash),
            })
            .collect()
    }

    /// Every key a full sweep tries: the priority list plus the hash-derived tier.
    pub fn total_candidates(&self) -> usize {
        self.candidates.len() + HASH_DERIVED_VARIANTS.min(self.candidates.len())
    }
}
