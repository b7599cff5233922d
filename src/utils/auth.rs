use anyhow::{Result, anyhow};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // user_id
    pub iss: String,
    pub iat: usize,
    pub exp: usize,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|e| anyhow!("Invalid subject in token: {}", e))
    }
}

pub fn create_jwt(user_id: Uuid, secret: &str, issuer: &str, ttl: Duration) -> Result<String> {
    let now = Utc::now();
    let expiration = now
        .checked_add_signed(ttl)
        .ok_or_else(|| anyhow!("Token expiry out of range"))?;

    let claims = Claims {
        sub: user_id.to_string(),
        iss: issuer.to_owned(),
        iat: now.timestamp() as usize,
        exp: expiration.timestamp() as usize,
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?;

    Ok(token)
}

/// Validates signature, expiry and issuer, returning the caller's user id.
pub fn validate_jwt(token: &str, secret: &str, issuer: &str) -> Result<Uuid> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[issuer]);

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &validation,
    )?;

    token_data.claims.user_id()
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    header_value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ISSUER: &str = "tubely-access";

    #[test]
    fn test_jwt_cycle() {
        let secret = "test_secret";
        let user_id = Uuid::new_v4();
        let token = create_jwt(user_id, secret, ISSUER, Duration::hours(1)).unwrap();
        assert_eq!(validate_jwt(&token, secret, ISSUER).unwrap(), user_id);
    }

    #[test]
    fn test_jwt_wrong_secret() {
        let token = create_jwt(Uuid::new_v4(), "one", ISSUER, Duration::hours(1)).unwrap();
        assert!(validate_jwt(&token, "two", ISSUER).is_err());
    }

    #[test]
    fn test_jwt_wrong_issuer() {
        let token = create_jwt(Uuid::new_v4(), "secret", "someone-else", Duration::hours(1)).unwrap();
        assert!(validate_jwt(&token, "secret", ISSUER).is_err());
    }

    #[test]
    fn test_jwt_expired() {
        let token = create_jwt(Uuid::new_v4(), "secret", ISSUER, Duration::hours(-2)).unwrap();
        assert!(validate_jwt(&token, "secret", ISSUER).is_err());
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Basic dXNlcg=="), None);
    }
}
