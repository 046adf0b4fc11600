//! Conversion between absolute expiry timestamps and `set` exptimes
//!
//! Memcached exptime rules:
//! - 0 = never expire
//! - <= 2592000 (30 days) = relative seconds from now
//! - > 2592000 = absolute Unix timestamp

use std::time::{SystemTime, UNIX_EPOCH};

/// Maximum relative TTL value (30 days in seconds)
pub const MAX_RELATIVE_TTL: u64 = 2_592_000;

/// What to do with an entry whose absolute expiry is known
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Expiry 0: store without expiration
    Never,
    /// Expiry already reached at the reference time
    Expired { overdue: u64 },
    /// Store with this exptime
    Expires(u64),
}

impl Ttl {
    /// The exptime to send with `set`, if the entry should be stored at all
    pub fn exptime(self) -> Option<u64> {
        match self {
            Ttl::Never => Some(0),
            Ttl::Expired { .. } => None,
            Ttl::Expires(exptime) => Some(exptime),
        }
    }
}

/// Work out the exptime for an absolute `expiry` as seen at `now`.
///
/// Remaining lifetimes beyond the relative limit are sent as the absolute
/// timestamp itself; sent as seconds they would be read as a date in 1970.
///
/// Only an `expiry` of exactly 0 is treated as never expiring. Some older
/// 1.4.x servers list never-expiring items in cachedump with the process
/// start time as their expiry instead of 0; those entries come out of such
/// a server already in the past and are skipped on restore.
pub fn exptime_for(expiry: u64, now: u64) -> Ttl {
    if expiry == 0 {
        return Ttl::Never;
    }
    if expiry <= now {
        return Ttl::Expired {
            overdue: now - expiry,
        };
    }

    let remaining = expiry - now;
    if remaining > MAX_RELATIVE_TTL {
        Ttl::Expires(expiry)
    } else {
        Ttl::Expires(remaining)
    }
}

/// Get the current Unix timestamp
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
