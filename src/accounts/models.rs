use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Flat user record. Capability checks are plain booleans; the credential
/// hash never leaves this crate (API responses use their own body types).
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_verified: bool,
    pub roles: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn new(email: String, password_hash: String) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4(),
            email,
            password_hash,
            is_active: true,
            is_staff: false,
            is_superuser: false,
            is_verified: false,
            roles: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn new_superuser(email: String, password_hash: String) -> Self {
        Self {
            is_staff: true,
            is_superuser: true,
            ..Self::new(email, password_hash)
        }
    }
}

#[derive(Debug, Clone)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
}

impl Role {
    #[must_use]
    pub fn new(name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
        }
    }
}

/// What a lifecycle token authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    Verify,
    Reset,
}

impl TokenPurpose {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Verify => "VERIFY",
            Self::Reset => "RESET",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "VERIFY" => Some(Self::Verify),
            "RESET" => Some(Self::Reset),
            _ => None,
        }
    }
}

/// Opaque single-purpose token. The id doubles as the bearer secret:
/// callers present it to redeem the token.
#[derive(Debug, Clone)]
pub struct Token {
    pub id: Uuid,
    pub user_id: Uuid,
    pub purpose: TokenPurpose,
    pub expires: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_is_active_and_unverified() {
        let user = User::new("dave@x.com".to_string(), "hash".to_string());

        assert!(user.is_active);
        assert!(!user.is_verified);
        assert!(!user.is_staff);
        assert!(!user.is_superuser);
        assert!(user.roles.is_empty());
    }

    #[test]
    fn new_superuser_sets_flags() {
        let user = User::new_superuser("admin@x.com".to_string(), "hash".to_string());

        assert!(user.is_staff);
        assert!(user.is_superuser);
    }

    #[test]
    fn token_purpose_round_trips() {
        assert_eq!(TokenPurpose::parse("VERIFY"), Some(TokenPurpose::Verify));
        assert_eq!(TokenPurpose::parse("RESET"), Some(TokenPurpose::Reset));
        assert_eq!(TokenPurpose::parse("OTHER"), None);
        assert_eq!(TokenPurpose::Verify.as_str(), "VERIFY");
    }
}
