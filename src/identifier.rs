//! Time-ordered 128-bit identifiers.
//!
//! Every parsed object that is going to live in an [`crate::store::ObjectStore`]
//! gets an [`Identifier`] from an [`IdentifierGenerator`]. The layout is the
//! RFC 4122 version 1 layout: a 60-bit count of 100 ns ticks since the
//! Gregorian calendar reform, a 14-bit clock sequence and a 48-bit node.
//!
//! A generator is an explicit instance rather than process-wide state, so
//! independent sessions can each own one (or share one through an `Arc`).
use std::fmt;
use std::fs;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use rand::Rng;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{NagcfgError, Result};

// 100 ns ticks between 1582-10-15 and 1970-01-01
const GREGORIAN_OFFSET: u64 = 122_192_928_000_000_000;
const CLOCK_SEQUENCE_MASK: u16 = 0x3fff;
const URN_PREFIX: &str = "urn:uuid:";
const GROUPS: [usize; 5] = [8, 4, 4, 4, 12];

// ------------- Identifier -------------
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Identifier([u8; 16]);

impl Identifier {
    pub const NIL: Identifier = Identifier([0; 16]);

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
    /// Decodes the binary form. The slice must be exactly 16 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; 16] = bytes.try_into().map_err(|_| {
            NagcfgError::Identifier(format!(
                "identifier must be exactly 16 bytes long, got {} bytes",
                bytes.len()
            ))
        })?;
        Ok(Self(bytes))
    }
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
    pub fn is_nil(&self) -> bool {
        self.0 == [0; 16]
    }
    pub fn version(&self) -> u8 {
        self.0[6] >> 4
    }
    /// True when the variant bits are the RFC 4122 `10` pattern.
    pub fn is_rfc4122(&self) -> bool {
        self.0[8] & 0xc0 == 0x80
    }
    /// Ticks of 100 ns since 1582-10-15.
    pub fn timestamp(&self) -> u64 {
        let b = &self.0;
        let low = u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as u64;
        let mid = u16::from_be_bytes([b[4], b[5]]) as u64;
        let high = (u16::from_be_bytes([b[6], b[7]]) & 0x0fff) as u64;
        low | (mid << 32) | (high << 48)
    }
    pub fn clock_sequence(&self) -> u16 {
        u16::from_be_bytes([self.0[8], self.0[9]]) & CLOCK_SEQUENCE_MASK
    }
    pub fn node(&self) -> [u8; 6] {
        let mut node = [0u8; 6];
        node.copy_from_slice(&self.0[10..]);
        node
    }

    fn pack(timestamp: u64, clock_sequence: u16, node: &[u8; 6]) -> Self {
        let mut b = [0u8; 16];
        b[0..4].copy_from_slice(&(timestamp as u32).to_be_bytes());
        b[4..6].copy_from_slice(&((timestamp >> 32) as u16).to_be_bytes());
        b[6..8].copy_from_slice(&((timestamp >> 48) as u16).to_be_bytes());
        b[8..10].copy_from_slice(&clock_sequence.to_be_bytes());
        b[10..].copy_from_slice(node);
        b[6] = (b[6] & 0x0f) | 0x10; // version 1
        b[8] = (b[8] & 0x3f) | 0x80; // RFC 4122 variant
        Self(b)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{}-{}-{}-{}-{}",
            hex::encode(&b[0..4]),
            hex::encode(&b[4..6]),
            hex::encode(&b[6..8]),
            hex::encode(&b[8..10]),
            hex::encode(&b[10..])
        )
    }
}
impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Identifier({})", self)
    }
}

impl FromStr for Identifier {
    type Err = NagcfgError;
    /// Accepts `6ba7b810-9dad-11d1-80b4-00c04fd430c8`, the same wrapped in
    /// braces, or prefixed with `urn:uuid:`.
    fn from_str(s: &str) -> Result<Self> {
        let text = if let Some(rest) = s.strip_prefix(URN_PREFIX) {
            rest
        } else if let Some(rest) = s.strip_prefix('{') {
            rest.strip_suffix('}').ok_or_else(|| {
                NagcfgError::Identifier(format!("unterminated braced identifier: {s}"))
            })?
        } else {
            s
        };
        if text.len() != 36 {
            return Err(NagcfgError::Identifier(format!(
                "identifier string has wrong length: {s}"
            )));
        }
        let mut bytes = [0u8; 16];
        let mut offset = 0;
        let mut out = 0;
        for (i, group) in GROUPS.iter().enumerate() {
            if i > 0 {
                if text.as_bytes()[offset] != b'-' {
                    return Err(NagcfgError::Identifier(format!(
                        "invalid identifier format: {s}"
                    )));
                }
                offset += 1;
            }
            let digits = text.get(offset..offset + group).ok_or_else(|| {
                NagcfgError::Identifier(format!("invalid identifier format: {s}"))
            })?;
            hex::decode_to_slice(digits, &mut bytes[out..out + group / 2])
                .map_err(|e| NagcfgError::Identifier(format!("{e} in {s}")))?;
            offset += group;
            out += group / 2;
        }
        Ok(Self(bytes))
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

// ------------- IdentifierGenerator -------------
#[derive(Debug)]
struct ClockState {
    clock_sequence: u16,
    last_timestamp: u64,
    node: [u8; 6],
}

impl ClockState {
    fn seed(node: Option<[u8; 6]>) -> Self {
        let mut rng = rand::thread_rng();
        let node = node.or_else(hardware_address).unwrap_or_else(|| {
            let mut node = [0u8; 6];
            rng.fill(&mut node);
            // multicast bit marks the node as not coming from real hardware
            node[0] |= 0x01;
            node
        });
        Self {
            clock_sequence: rng.r#gen::<u16>() & CLOCK_SEQUENCE_MASK,
            last_timestamp: 0,
            node,
        }
    }
}

/// Thread-safe generator of [`Identifier`]s.
///
/// The clock sequence, last timestamp and node live behind a single mutex and
/// are seeded on the first call to [`IdentifierGenerator::generate`].
#[derive(Debug, Default)]
pub struct IdentifierGenerator {
    node: Option<[u8; 6]>,
    state: Mutex<Option<ClockState>>,
}

impl IdentifierGenerator {
    pub fn new() -> Self {
        Self::default()
    }
    /// Uses a fixed node instead of probing network interfaces.
    pub fn with_node(node: [u8; 6]) -> Self {
        Self {
            node: Some(node),
            state: Mutex::new(None),
        }
    }
    pub fn generate(&self) -> Identifier {
        // the state is plain counters, so a poisoned lock is still consistent
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let state = guard.get_or_insert_with(|| ClockState::seed(self.node));
        let now = ticks_now();
        if now <= state.last_timestamp {
            state.clock_sequence = state.clock_sequence.wrapping_add(1) & CLOCK_SEQUENCE_MASK;
        }
        state.last_timestamp = now;
        Identifier::pack(now, state.clock_sequence, &state.node)
    }
    /// The node in use, seeding the generator if needed.
    pub fn node(&self) -> [u8; 6] {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        guard.get_or_insert_with(|| ClockState::seed(self.node)).node
    }
}

fn ticks_now() -> u64 {
    let now = Utc::now();
    let seconds = now.timestamp().max(0) as u64;
    GREGORIAN_OFFSET + seconds * 10_000_000 + (now.timestamp_subsec_nanos() as u64) / 100
}

// First non-zero hardware address found under /sys/class/net, if any.
fn hardware_address() -> Option<[u8; 6]> {
    let mut interfaces: Vec<_> = fs::read_dir("/sys/class/net")
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    interfaces.sort();
    interfaces
        .iter()
        .filter_map(|path| fs::read_to_string(path.join("address")).ok())
        .filter_map(|address| parse_mac(address.trim()))
        .find(|node| node.iter().any(|b| *b != 0))
}

fn parse_mac(address: &str) -> Option<[u8; 6]> {
    let mut node = [0u8; 6];
    let mut parts = address.split(':');
    for byte in node.iter_mut() {
        *byte = u8::from_str_radix(parts.next()?, 16).ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(node)
}
