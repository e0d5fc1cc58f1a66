//! Session and password reset records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Login session. `id` is the opaque token handed to the browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// Pending password reset. Only the SHA-256 of the token is stored.
#[derive(Debug, Clone)]
pub struct PasswordReset {
    pub id: i64,
    pub user_id: i64,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl PasswordReset {
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_session_expiry() {
        let now = Utc::now();
        let live = Session {
            id: "a".into(),
            user_id: 1,
            expires_at: now + Duration::days(1),
            created_at: now,
        };
        let dead = Session {
            expires_at: now - Duration::seconds(1),
            ..live.clone()
        };
        assert!(!live.is_expired());
        assert!(dead.is_expired());
    }
}
