use rand::{rngs::OsRng, RngCore};
use time::{Duration, OffsetDateTime};

/// Number of random bytes in a reset token; hex encoding doubles the length.
pub const RESET_TOKEN_BYTES: usize = 20;

/// How long a reset token stays valid after issuance.
pub const RESET_TOKEN_TTL: Duration = Duration::hours(1);

/// A freshly issued password reset token and its expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetTicket {
    pub token: String,
    pub expires_at_ms: i64,
}

impl ResetTicket {
    pub fn issue(now: OffsetDateTime) -> Self {
        let mut bytes = [0u8; RESET_TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self {
            token: hex::encode(bytes),
            expires_at_ms: epoch_millis(now + RESET_TOKEN_TTL),
        }
    }
}

pub fn epoch_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}
