use std::time::{SystemTime, UNIX_EPOCH};

/// Current time in 100-microsecond units, matching the unit `CK` timestamps
/// use on the wire. RFC 6295 nominally ties this to the session's sampling
/// rate, but real peers expect plain 100us ticks.
pub fn now_100us() -> u64 {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch");
    (elapsed.as_micros() / 100) as u64
}
