//! Per-owner request limiting
//!
//! Keyed governor limiter in front of every handler. This guards the
//! metadata endpoints against hot loops; byte-level bandwidth shaping is
//! the throttle kernel's job, not this one.

use std::num::NonZeroU32;

use governor::{DefaultKeyedRateLimiter, Quota};

/// Keyed request limiter, one cell per owner id
pub struct RequestLimiter {
    limiter: DefaultKeyedRateLimiter<i64>,
}

impl RequestLimiter {
    /// `requests_per_minute` must be positive (config validation enforces it).
    pub fn new(requests_per_minute: u32) -> Self {
        let per_minute =
            NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::new(600).unwrap());
        Self {
            limiter: DefaultKeyedRateLimiter::keyed(Quota::per_minute(per_minute)),
        }
    }

    /// True when the owner still has budget for one more request.
    pub fn allow(&self, owner_id: i64) -> bool {
        self.limiter.check_key(&owner_id).is_ok()
    }
}
