//! Conversion between the cookie store's epoch and Unix time
//!
//! The store keeps timestamps as microseconds since 1601-01-01; Unix time
//! starts 11644473600 seconds later.

pub const STORE_EPOCH_DIFF_SECONDS: i64 = 11_644_473_600;
pub const MICROSECONDS_PER_SECOND: i64 = 1_000_000;

/// Unix seconds to store-native microseconds.
pub fn to_store_epoch_micros(unix_seconds: i64) -> i64 {
    (unix_seconds + STORE_EPOCH_DIFF_SECONDS) * MICROSECONDS_PER_SECOND
}

/// Store-native microseconds to fractional Unix seconds.
///
/// A stored value of exactly 0 denotes "no expiration" and maps to `None`.
/// The whole seconds and the microsecond remainder are split with integer
/// arithmetic so sub-second precision survives the conversion.
pub fn to_unix_seconds(store_micros: i64) -> Option<f64> {
    if store_micros == 0 {
        return None;
    }
    let seconds = store_micros.div_euclid(MICROSECONDS_PER_SECOND) - STORE_EPOCH_DIFF_SECONDS;
    let micros = store_micros.rem_euclid(MICROSECONDS_PER_SECOND);
    Some(seconds as f64 + micros as f64 / MICROSECONDS_PER_SECOND as f64)
}

#[cfg(test)]
mod tests {
    use super::{to_store_epoch_micros, to_unix_seconds, STORE_EPOCH_DIFF_SECONDS};

    #[test]
    fn round_trips_unix_seconds() {
        for unix_seconds in [0i64, 1, 1_700_000_000, 4_102_444_800] {
            let micros = to_store_epoch_micros(unix_seconds);
            let back = to_unix_seconds(micros).expect("present");
            assert_eq!(back, unix_seconds as f64);
        }
    }

    #[test]
    fn preserves_sub_second_precision() {
        let micros = to_store_epoch_micros(1_700_000_000) + 250_000;
        let back = to_unix_seconds(micros).expect("present");
        assert_eq!(back, 1_700_000_000.25);
    }

    #[test]
    fn zero_means_no_expiration() {
        // must never be evaluated as the epoch-difference constant
        assert_eq!(to_unix_seconds(0), None);
    }

    #[test]
    fn converts_the_epoch_origin() {
        let micros = to_store_epoch_micros(-STORE_EPOCH_DIFF_SECONDS + 1);
        assert_eq!(
            to_unix_seconds(micros),
            Some(-(STORE_EPOCH_DIFF_SECONDS as f64) + 1.0)
        );
    }
}
