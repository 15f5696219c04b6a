//! Self-issued identity tokens and their verification.
//!
//! There are no real credentials behind these tokens. The token is minted locally
//! and only its upstream verification gives it any weight, so it is a stub and is
//! never trusted on this side.

use crate::{cache::TokenCache, config::Config};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header};
use log::{debug, warn};
use rand::RngCore;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Lifetime written into a self-issued token.
pub const TOKEN_LIFETIME_DAYS: i64 = 2;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Claims {
    user_id: String,
    session_id: String,
    iat: i64,
    exp: i64,
}

/// Token accepted by the verification endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedToken {
    pub user_id: String,
    pub token: String,
    #[serde(default)]
    pub expires: i64,
    #[serde(default, rename = "expiresISO")]
    pub expires_iso: String,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    #[serde(default)]
    success: bool,
    data: Option<VerifyData>,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    #[serde(flatten)]
    token: VerifiedToken,
    #[serde(default)]
    valid: bool,
}

/// Mint a HS256 token for a random user and session, signed with a throwaway secret.
pub fn issue_token() -> Result<String, jsonwebtoken::errors::Error> {
    let mut rng = rand::thread_rng();
    let mut user_id = [0u8; 12];
    let mut secret = [0u8; 32];
    rng.fill_bytes(&mut user_id);
    rng.fill_bytes(&mut secret);

    let now = Utc::now();
    let claims = Claims {
        user_id: hex::encode(user_id),
        session_id: uuid::Uuid::new_v4().to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::days(TOKEN_LIFETIME_DAYS)).timestamp(),
    };

    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(&secret),
    )
}

/// Issue a token, submit it for verification and cache it under the submitted string.
///
/// Returns the cache key, or `None` when anything along the way fails.
pub async fn acquire(client: &Client, config: &Config, tokens: &TokenCache) -> Option<String> {
    let token = match issue_token() {
        Ok(x) => x,
        Err(e) => {
            warn!("could not issue token: {}", e);
            return None;
        }
    };

    let verified = verify(client, config, &token).await?;
    debug!("verified token for user {}", verified.user_id);
    tokens.insert(token.clone(), verified);
    Some(token)
}

async fn verify(client: &Client, config: &Config, token: &str) -> Option<VerifiedToken> {
    let url = config.endpoint("verify-token").ok()?;
    let response = client
        .post(url)
        .json(&serde_json::json!({ "token": token }))
        .timeout(config.token_timeout())
        .send()
        .await
        .and_then(|x| x.error_for_status());

    let response = match response {
        Ok(x) => x,
        Err(e) => {
            warn!("token verification failed: {}", e);
            return None;
        }
    };

    match response.json::<VerifyResponse>().await {
        Ok(VerifyResponse {
            success: true,
            data: Some(VerifyData { token, valid: true }),
        }) => Some(token),
        Ok(_) => {
            warn!("token verification rejected the token");
            None
        }
        Err(e) => {
            warn!("token verification returned an unexpected body: {}", e);
            None
        }
    }
}
