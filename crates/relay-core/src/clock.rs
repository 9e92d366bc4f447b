//! Wall-clock readings used for token expiry and status snapshots.
use std::time::{SystemTime, UNIX_EPOCH};

fn since_epoch() -> std::time::Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

pub fn unix_now_secs() -> u64 {
    since_epoch().as_secs()
}

pub fn unix_now_millis() -> u64 {
    u64::try_from(since_epoch().as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Where a credential's `exp` claim sits relative to now.
pub enum TokenExpiry {
    /// The credential carries no expiry.
    Unbounded,
    Live { remaining_secs: u64 },
    /// `exp` equal to now already counts as lapsed.
    Lapsed { since_secs: u64 },
}

impl TokenExpiry {
    pub fn evaluate(expires_unix: Option<u64>, now_unix: u64) -> Self {
        match expires_unix {
            None => Self::Unbounded,
            Some(exp) if exp > now_unix => Self::Live {
                remaining_secs: exp - now_unix,
            },
            Some(exp) => Self::Lapsed {
                since_secs: now_unix - exp,
            },
        }
    }

    pub fn is_lapsed(self) -> bool {
        matches!(self, Self::Lapsed { .. })
    }
}
