//! Wrapping counter to absolute position.

/// Signed change from `prev` to `raw` on a counter that wraps at `modulus`.
///
/// The raw difference is taken as-is unless its magnitude exceeds half the
/// modulus, in which case the counter is assumed to have wrapped and one
/// modulus is added or removed.
pub fn unwrap_delta(prev: u32, raw: u32, modulus: u32) -> i64 {
    let m = i64::from(modulus);
    let half = m / 2;
    let delta = i64::from(raw) - i64::from(prev);
    if delta > half {
        delta - m
    } else if delta < -half {
        delta + m
    } else {
        delta
    }
}
