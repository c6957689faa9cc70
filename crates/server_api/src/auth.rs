use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::domain::{Role, UserId};

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub token_secret: String,
    pub token_ttl_seconds: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: i64,
    role: Role,
    iat: i64,
    exp: i64,
}

/// Identity recovered from a verified session token. The role claim is a
/// hint only; authorization decisions reload the user from storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenIdentity {
    pub user_id: UserId,
    pub role: Role,
}

pub fn mint_token(
    config: &AuthConfig,
    user_id: UserId,
    role: Role,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let exp = now + Duration::seconds(config.token_ttl_seconds);
    let claims = Claims {
        sub: user_id.0,
        role,
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.token_secret.as_bytes()),
    )
}

pub fn verify_token(
    config: &AuthConfig,
    token: &str,
) -> Result<TokenIdentity, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.token_secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(TokenIdentity {
        user_id: UserId(data.claims.sub),
        role: data.claims.role,
    })
}
