pub mod error;
pub mod model;

pub use error::{ErrorCode, HoneycombError};
pub use model::*;

/// Certificates and receipts both live for 7 days from issuance.
pub const EXPIRY_MS: i64 = 604_800_000;

/// Current time in milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    let now = time::OffsetDateTime::now_utc();
    now.unix_timestamp() * 1000 + i64::from(now.millisecond())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_ms_is_monotonic_enough() {
        let a = now_ms();
        let b = now_ms();
        assert!(b >= a);
    }
}
