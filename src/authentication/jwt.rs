use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::error::Error;
use crate::schema::{Id, User, UserRole};

use super::permissions::ActionType;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Id,
    pub email: String,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: Id, email: String, lifetime: Duration) -> Self {
        let iat = Utc::now().timestamp();
        let exp = iat.saturating_add(lifetime.as_secs() as i64);

        Self {
            user_id: id,
            email,
            iat,
            exp,
        }
    }

    pub fn expires_at(&self) -> i64 {
        self.exp
    }
}

/// The authenticated caller, resolved from a verified token and a fresh
/// user row.
#[derive(Debug, Serialize, Clone)]
pub struct SessionData {
    pub user_id: Id,
    pub email: String,
    pub name: String,
    pub role: UserRole,
}

impl SessionData {
    pub fn authenticate(&self, action: ActionType) -> Result<(), Error> {
        if !action.authenticate(self) {
            return Err(Error::Forbidden);
        }
        Ok(())
    }
}

impl From<User> for SessionData {
    fn from(user: User) -> Self {
        SessionData {
            role: user.role(),
            user_id: user.id,
            email: user.email,
            name: user.name,
        }
    }
}

fn signing_key(secret: &str) -> Result<Hmac<Sha256>, Error> {
    Hmac::new_from_slice(secret.as_bytes()).map_err(|e| Error::Token(format!("{e}")))
}

pub fn generate_jwt_session(user: &User, secret: &str, lifetime: Duration) -> Result<String, Error> {
    let key = signing_key(secret)?;
    let claims = JwtSessionData::new(user.id, user.email.to_owned(), lifetime);

    Ok(claims.sign_with_key(&key)?)
}

pub fn verify_jwt_session(token: &str, secret: &str) -> Result<JwtSessionData, Error> {
    let key = signing_key(secret)?;

    let session: JwtSessionData = token
        .verify_with_key(&key)
        .map_err(|_| Error::InvalidSession("Invalid token"))?;

    let now = Utc::now().timestamp();
    if (session.exp - now).is_negative() {
        return Err(Error::InvalidSession("Token expired"));
    }
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 42,
            email: "test@test.com".to_string(),
            name: "Test".to_string(),
            password: String::new(),
            is_active: true,
            is_staff: false,
            is_superuser: false,
        }
    }

    #[test]
    fn signed_session_verifies() {
        let token = generate_jwt_session(&user(), "secret", Duration::from_secs(3600)).unwrap();
        let session = verify_jwt_session(&token, "secret").unwrap();

        assert_eq!(session.user_id, 42);
        assert_eq!(session.email, "test@test.com");
        assert!(session.expires_at() > Utc::now().timestamp());
    }

    #[test]
    fn wrong_key_is_rejected() {
        let token = generate_jwt_session(&user(), "secret", Duration::from_secs(3600)).unwrap();
        assert!(matches!(
            verify_jwt_session(&token, "other"),
            Err(Error::InvalidSession(_))
        ));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let token = generate_jwt_session(&user(), "secret", Duration::from_secs(3600)).unwrap();
        let tampered = format!("{token}x");
        assert!(verify_jwt_session(&tampered, "secret").is_err());
        assert!(verify_jwt_session("garbage", "secret").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let key = signing_key("secret").unwrap();
        let mut claims = JwtSessionData::new(1, "a@b.c".to_string(), Duration::ZERO);
        claims.exp -= 10;
        let token = claims.sign_with_key(&key).unwrap();

        assert!(matches!(
            verify_jwt_session(&token, "secret"),
            Err(Error::InvalidSession("Token expired"))
        ));
    }
}
