use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims issued by the CRM's identity service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub sub: Uuid, // Subject (user ID)
    pub org_id: Uuid,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub exp: i64, // Expiration time
    pub iat: i64, // Issued at
}

#[derive(Debug)]
pub struct TokenResponse {
    pub token: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

impl Claims {
    pub fn new(user_id: Uuid, org_id: Uuid, permissions: &[&str], ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id,
            org_id,
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        }
    }
}

pub fn create_jwt(claims: &Claims, secret: &str) -> Result<TokenResponse, jsonwebtoken::errors::Error> {
    let token = encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(TokenResponse {
        token,
        expires_at: chrono::DateTime::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now),
    })
}

pub fn verify_jwt(token: &str, secret: &str) -> Result<TokenData<Claims>, jsonwebtoken::errors::Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
}
