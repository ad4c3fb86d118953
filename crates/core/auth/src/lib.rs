#[macro_use]
extern crate serde;

use std::time::Duration;

use iso8601_timestamp::Timestamp;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use quad_result::{create_error, Result};

/// Identity claim carried by a bearer token
///
/// Only `sub` is load-bearing; role and email are carried for the
/// convenience of consumers that want to skip a user lookup.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Claims {
    /// Id of the user this token authenticates
    pub sub: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Issued at (seconds since epoch)
    pub iat: i64,

    /// Expiry (seconds since epoch)
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: &str, valid_for: Duration) -> Claims {
        let iat = Timestamp::now_utc()
            .duration_since(Timestamp::UNIX_EPOCH)
            .whole_seconds();

        Claims {
            sub: user_id.to_string(),
            role: None,
            email: None,
            iat,
            exp: iat + valid_for.as_secs() as i64,
        }
    }
}

/// Sign a new bearer token for the given claims.
pub fn issue(secret: &str, claims: &Claims) -> Result<String> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| create_error!(InternalError))
}

/// Verify a bearer token and recover the claims within.
///
/// Expired, tampered and otherwise malformed tokens all collapse into
/// `Unauthenticated`; callers must treat that as fatal to the session.
pub fn verify(secret: &str, token: &str) -> Result<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| create_error!(Unauthenticated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quad_result::ErrorType;

    static SECRET: &str = "quad-test-signing-secret";

    #[test]
    fn round_trip() {
        let claims = Claims::new("01H2QVSSYGQZJSHVE6VQXW89S1", Duration::from_secs(3600));
        let token = issue(SECRET, &claims).unwrap();
        let verified = verify(SECRET, &token).unwrap();

        assert_eq!(verified.sub, claims.sub);
        assert_eq!(verified.exp, claims.exp);
    }

    #[test]
    fn rejects_expired_token() {
        let mut claims = Claims::new("01H2QVSSYGQZJSHVE6VQXW89S1", Duration::from_secs(0));
        claims.iat -= 7200;
        claims.exp = claims.iat + 3600;

        let token = issue(SECRET, &claims).unwrap();
        let error = verify(SECRET, &token).unwrap_err();
        assert!(matches!(error.error_type, ErrorType::Unauthenticated));
    }

    #[test]
    fn rejects_wrong_secret() {
        let claims = Claims::new("01H2QVSSYGQZJSHVE6VQXW89S1", Duration::from_secs(3600));
        let token = issue(SECRET, &claims).unwrap();

        let error = verify("a-different-secret", &token).unwrap_err();
        assert!(matches!(error.error_type, ErrorType::Unauthenticated));
    }

    #[test]
    fn rejects_garbage() {
        let error = verify(SECRET, "not-a-token").unwrap_err();
        assert!(matches!(error.error_type, ErrorType::Unauthenticated));
    }
}
