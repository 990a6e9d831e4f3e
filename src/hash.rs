//! Byte-slice hash functions for `PoolHashMap`.
//!
//! All three are pure, deterministic functions of the key bytes; the map
//! only requires that property, so callers may substitute their own.

/// FNV-1a over the key bytes.
pub fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut h = OFFSET;
    for &b in bytes {
        h ^= u64::from(b);
        h = h.wrapping_mul(PRIME);
    }
    h
}

/// Bernstein's DJB2.
pub fn djb2(bytes: &[u8]) -> u64 {
    let mut h: u64 = 5381;
    for &b in bytes {
        h = h.wrapping_mul(33).wrapping_add(u64::from(b));
    }
    h
}

/// Avalanche finalizer (splitmix64-style) applied over a running sum.
/// Cheap, and decorrelates nearby keys better than djb2 for small
/// integer-like key bytes.
pub fn mix(bytes: &[u8]) -> u64 {
    let mut h: u64 = 0x9e37_79b9_7f4a_7c15;
    for &b in bytes {
        h = h.wrapping_add(u64::from(b)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        h ^= h >> 31;
    }
    h ^= h >> 27;
    h = h.wrapping_mul(0x94d0_49bb_1331_11eb);
    h ^ (h >> 31)
}
