//! The session token stored, encrypted, in the session cookie.

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::auth::UserID;

/// Who the session belongs to and when it stops being valid.
///
/// The expiry is serialized as a unix timestamp so it survives the round trip through the
/// cookie without any date formatting concerns.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Token {
    pub user_id: UserID,

    #[serde(with = "time::serde::timestamp")]
    pub expires_at: OffsetDateTime,
}

impl Token {
    /// A token for `user_id` that expires `duration` after `now`.
    pub fn new(user_id: UserID, now: OffsetDateTime, duration: Duration) -> Self {
        Self {
            user_id,
            expires_at: now + duration,
        }
    }

    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }

    /// Push the expiry out to `now + duration` unless it is already later.
    ///
    /// Returns `None` when the token does not need to change.
    pub fn extended(&self, now: OffsetDateTime, duration: Duration) -> Option<Self> {
        let new_expiry = now.checked_add(duration)?;

        if new_expiry.unix_timestamp() > self.expires_at.unix_timestamp() {
            Some(Self {
                user_id: self.user_id,
                expires_at: new_expiry,
            })
        } else {
            None
        }
    }
}
