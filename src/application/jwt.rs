use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    /// Administrative capability; grants approval/rejection/purge.
    pub admin: bool,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn user_id(&self) -> AppResult<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::InvalidCredentials)
    }
}

pub fn issue(
    user_id: Uuid,
    admin: bool,
    secret: &secrecy::SecretString,
    ttl: Duration,
) -> AppResult<String> {
    let now = OffsetDateTime::now_utc().unix_timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        admin,
        iat: now,
        exp: now + ttl.whole_seconds(),
    };
    let header = Header::new(Algorithm::HS256);
    encode(
        &header,
        &claims,
        &EncodingKey::from_secret(secret.expose_secret().as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.to_string()))
}

pub fn verify(token: &str, secret: &secrecy::SecretString) -> AppResult<Claims> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.expose_secret().as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::InvalidCredentials)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn secret() -> SecretString {
        SecretString::new("test-jwt-secret".into())
    }

    #[test]
    fn issued_token_verifies_and_carries_admin_flag() {
        let user_id = Uuid::new_v4();
        let token = issue(user_id, true, &secret(), Duration::hours(1)).unwrap();
        let claims = verify(&token, &secret()).unwrap();
        assert_eq!(claims.user_id().unwrap(), user_id);
        assert!(claims.admin);
    }

    #[test]
    fn wrong_secret_is_invalid_credentials() {
        let token = issue(Uuid::new_v4(), false, &secret(), Duration::hours(1)).unwrap();
        let other = SecretString::new("other".into());
        assert!(matches!(
            verify(&token, &other),
            Err(AppError::InvalidCredentials)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = issue(Uuid::new_v4(), false, &secret(), Duration::seconds(-120)).unwrap();
        assert!(verify(&token, &secret()).is_err());
    }
}
