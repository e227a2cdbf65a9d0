//! One-time codes for resetting a forgotten password.
//!
//! A code is issued per user name, delivered through the notifier, and
//! consumed by the first matching redeem. Issuing again replaces the
//! previous code. Codes live in memory only, so a restart voids them.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::crypto;

/// How long an issued code stays redeemable.
pub const RESET_CODE_TTL: Duration = Duration::from_secs(320);

/// Wrong guesses allowed before a code is discarded.
pub const MAX_ATTEMPTS: u8 = 5;

struct PendingCode {
    code: String,
    expires_at: Instant,
    attempts: u8,
}

pub struct ResetCodes {
    pending: DashMap<String, PendingCode>,
    ttl: Duration,
}

impl Default for ResetCodes {
    fn default() -> Self {
        Self::new(RESET_CODE_TTL)
    }
}

impl ResetCodes {
    pub fn new(ttl: Duration) -> Self {
        Self {
            pending: DashMap::new(),
            ttl,
        }
    }

    /// Issue a fresh code for `user_name`, replacing any earlier one.
    pub fn issue(&self, user_name: &str) -> String {
        self.pending.retain(|_, p| p.expires_at > Instant::now());
        let code = crypto::random_otp();
        self.pending.insert(
            user_name.to_string(),
            PendingCode {
                code: code.clone(),
                expires_at: Instant::now() + self.ttl,
                attempts: 0,
            },
        );
        code
    }

    /// True if `code` matches the live code for `user_name`. A match
    /// consumes the code.
    pub fn redeem(&self, user_name: &str, code: &str) -> bool {
        let Some(mut pending) = self.pending.get_mut(user_name) else {
            return false;
        };
        if pending.expires_at <= Instant::now() {
            drop(pending);
            self.pending.remove(user_name);
            return false;
        }
        if pending.code != code {
            pending.attempts += 1;
            let exhausted = pending.attempts >= MAX_ATTEMPTS;
            drop(pending);
            if exhausted {
                tracing::warn!(user = %user_name, "reset code discarded after repeated wrong guesses");
                self.pending.remove(user_name);
            }
            return false;
        }
        drop(pending);
        self.pending.remove(user_name);
        true
    }
}
