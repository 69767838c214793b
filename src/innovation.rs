//! Hash-based key allocation for new genes.
//!
//! Structural mutations never consult a global counter. A new gene's key is a
//! deterministic hash of the structural event that created it:
//!
//! For connections: `Hash(input_key, output_key)`
//! For nodes (from split): `Hash(connection_key, SPLIT_MARKER)`
//!
//! Two agents that independently split the same connection therefore grow a hidden
//! node with the same key, and crossover treats them as the same gene.

use std::hash::{Hash, Hasher};

/// Marker value used when hashing node splits to distinguish from connection keys.
const SPLIT_MARKER: u64 = 0xDEAD_BEEF_CAFE_BABE;

/// Keys below this value are reserved for the required input and output nodes
/// (and any hand-built test genomes). Hashed keys are always `>=` this value.
pub const RESERVED_KEY_RANGE: u64 = 1 << 16;

/// FxHash-style multiplicative hasher with a final avalanche mix.
#[derive(Default)]
struct KeyHasher {
    state: u64,
}

impl Hasher for KeyHasher {
    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.state = self
                .state
                .wrapping_mul(0x517c_c1b7_2722_0a95)
                .wrapping_add(u64::from(byte));
        }
    }

    #[inline]
    fn finish(&self) -> u64 {
        let mut h = self.state;
        h ^= h >> 33;
        h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
        h ^= h >> 33;
        h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
        h ^= h >> 33;

        let range = u64::MAX - RESERVED_KEY_RANGE;
        RESERVED_KEY_RANGE + (h % range)
    }
}

/// Deterministic key for a connection from `input_key` to `output_key`.
///
/// The same pair always yields the same key, in any genome and on any thread, so
/// two lineages that grow the same connection share its gene.
///
/// # Arguments
///
/// * `input_key` - Key of the source node
/// * `output_key` - Key of the target node
///
/// # Returns
///
/// A key `>= RESERVED_KEY_RANGE`. Direction matters: `(a, b)` and `(b, a)` differ.
#[inline]
#[must_use]
pub fn connection_key(input_key: u64, output_key: u64) -> u64 {
    let mut hasher = KeyHasher::default();
    input_key.hash(&mut hasher);
    output_key.hash(&mut hasher);
    hasher.finish()
}

/// Deterministic key for the hidden node created by splitting a connection.
///
/// # Arguments
///
/// * `connection_key` - Key of the connection being split
///
/// # Returns
///
/// A key `>= RESERVED_KEY_RANGE`, distinct from [`connection_key`] outputs for
/// the same inputs because of the split marker.
#[inline]
#[must_use]
pub fn split_node_key(connection_key: u64) -> u64 {
    let mut hasher = KeyHasher::default();
    connection_key.hash(&mut hasher);
    SPLIT_MARKER.hash(&mut hasher);
    hasher.finish()
}

/// Resolve a hashed key against the keys already in use.
///
/// Returns `candidate` when it is free. Otherwise the key is re-hashed with a probe
/// counter until a free one turns up, so repeated splits of the same connection
/// (possible after crossover re-enables it) still get distinct, reproducible keys.
///
/// # Arguments
///
/// * `candidate` - Key produced by [`connection_key`] or [`split_node_key`]
/// * `taken` - Returns `true` for keys already used in the target genome
///
/// # Returns
///
/// The first key of the probe sequence for which `taken` is `false`.
#[must_use]
pub fn resolve_key(candidate: u64, mut taken: impl FnMut(u64) -> bool) -> u64 {
    let mut key = candidate;
    let mut probe = 0u64;
    while taken(key) {
        probe += 1;
        let mut hasher = KeyHasher::default();
        candidate.hash(&mut hasher);
        probe.hash(&mut hasher);
        key = hasher.finish();
    }
    key
}
