//! Pairing Encoder - order-independent identity for neighbor relationships.
//!
//! An edge between two tracked cells is identified across frames by the Cantor
//! pairing of its endpoint track IDs. The pair is sorted before encoding, so
//! `encode(a, b) == encode(b, a)` and `decode` always yields `(min, max)`.

/// Largest track ID that can be paired. Keeps every key inside `u64`.
pub const MAX_TRACK_ID: u32 = (1 << 31) - 1;

/// Encodes an unordered pair of track IDs into a single key.
///
/// Debug builds assert the IDs are within `MAX_TRACK_ID`; the track-ID
/// allocator never hands out anything larger.
pub fn encode(a: u32, b: u32) -> u64 {
    debug_assert!(a <= MAX_TRACK_ID && b <= MAX_TRACK_ID);
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let s = lo as u64 + hi as u64;
    s * (s + 1) / 2 + hi as u64
}

/// Decodes a key produced by [`encode`] into `(min, max)`.
pub fn decode(key: u64) -> (u32, u32) {
    let z = key as u128;
    let w = triangular_root(z);
    let t = w * (w + 1) / 2;
    let hi = z - t;
    let lo = w - hi;
    (lo as u32, hi as u32)
}

/// Largest `w` with `w * (w + 1) / 2 <= z`.
fn triangular_root(z: u128) -> u128 {
    let estimate = (((8.0 * z as f64 + 1.0).sqrt() - 1.0) / 2.0) as u128;
    let mut w = estimate;
    // Correct the float estimate in both directions
    while w > 0 && w * (w + 1) / 2 > z {
        w -= 1;
    }
    while (w + 1) * (w + 2) / 2 <= z {
        w += 1;
    }
    w
}

// ============================================================================
// TESTS
// ============================================================================
