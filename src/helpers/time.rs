use chrono::{DateTime, Duration, Utc};

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Expiry instant for a token granted `expires_in` seconds at `obtained_at`.
pub fn expiry_from(obtained_at: DateTime<Utc>, expires_in: u64) -> DateTime<Utc> {
    obtained_at + Duration::seconds(expires_in as i64)
}

/// Whether a token expiring at `expiry` should be refreshed at `now`, given a
/// pre-expiry padding window in milliseconds. The padding applies uniformly
/// to hydrated and refreshed expiry dates.
pub fn needs_refresh(expiry: DateTime<Utc>, now: DateTime<Utc>, padding_ms: u64) -> bool {
    expiry - Duration::milliseconds(padding_ms as i64) <= now
}
