use anyhow::Result;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use chrono::Utc;

pub const ACCESS_TOKEN_TYPE: &str = "access";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,       // user_id
    pub email: String,
    pub role: String,
    pub token_type: String,
    pub exp: usize,        // expiry timestamp
    pub iat: usize,        // issued at
}

pub fn generate(user_id: &str, email: &str, role: &str, secret: &str, expiry_hours: u64) -> Result<String> {
    let now = Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        role: role.to_string(),
        token_type: ACCESS_TOKEN_TYPE.to_string(),
        exp: now + (expiry_hours as usize * 3600),
        iat: now,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

/// Decodes an HS256 token and rejects anything that is not an access token.
pub fn verify(token: &str, secret: &str) -> Result<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )?;
    if data.claims.token_type != ACCESS_TOKEN_TYPE {
        anyhow::bail!("unexpected token type: {}", data.claims.token_type);
    }
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "test-secret-for-unit-tests-only";

    #[test]
    fn test_generate_and_verify_token() {
        let token = generate("user-123", "parent@example.com", "parent", TEST_SECRET, 24)
            .expect("Should generate token");
        assert!(!token.is_empty());

        let claims = verify(&token, TEST_SECRET)
            .expect("Should verify valid token");
        assert_eq!(claims.sub, "user-123");
        assert_eq!(claims.email, "parent@example.com");
        assert_eq!(claims.role, "parent");
        assert_eq!(claims.token_type, "access");
    }

    #[test]
    fn test_verify_wrong_secret_fails() {
        let token = generate("user-123", "a@b.co", "admin", TEST_SECRET, 24)
            .expect("Should generate token");

        let result = verify(&token, "wrong-secret");
        assert!(result.is_err(), "Verification with wrong secret should fail");
    }

    #[test]
    fn test_verify_malformed_token_fails() {
        assert!(verify("not.a.valid.jwt", TEST_SECRET).is_err());
        assert!(verify("", TEST_SECRET).is_err());
    }

    #[test]
    fn test_non_access_token_rejected() {
        let now = Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: "u1".to_string(),
            email: "a@b.co".to_string(),
            role: "parent".to_string(),
            token_type: "refresh".to_string(),
            exp: now + 3600,
            iat: now,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .expect("Should encode");
        assert!(verify(&token, TEST_SECRET).is_err());
    }

    #[test]
    fn test_token_expiry_set_correctly() {
        let before = Utc::now().timestamp() as usize;
        let token = generate("u1", "a@b.co", "parent", TEST_SECRET, 2)
            .expect("Should generate token");
        let after = Utc::now().timestamp() as usize;

        let claims = verify(&token, TEST_SECRET).expect("Should verify");
        assert!(claims.exp >= before + 2 * 3600);
        assert!(claims.exp <= after + 2 * 3600);
    }
}
