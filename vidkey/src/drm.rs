use crate::{config::Config, headers::RequestIdentity};
use log::{debug, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Key id and its clear content key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrmInfo {
    pub kid: String,
    pub key: String,
}

#[derive(Debug, Deserialize)]
struct KeysResponse {
    #[serde(default)]
    success: bool,
    data: Option<KeysData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeysData {
    #[serde(default)]
    clear_keys: HashMap<String, String>,
}

/// Exchange `kid` for its clear key.
///
/// Best effort: every failure is logged and reported as `None`.
pub async fn fetch_key(
    client: &Client,
    config: &Config,
    identity: &RequestIdentity,
    kid: &str,
) -> Option<String> {
    let url = match config.endpoint("otp") {
        Ok(x) => x,
        Err(e) => {
            warn!("{}", e.kind);
            return None;
        }
    };

    let request = client
        .post(url)
        .json(&serde_json::json!({ "kid": kid }))
        .timeout(config.drm_timeout());
    let response = identity
        .apply(request)
        .send()
        .await
        .and_then(|x| x.error_for_status());

    let response = match response {
        Ok(x) => x,
        Err(e) => {
            warn!("content key request failed: {}", e);
            return None;
        }
    };

    match response.json::<KeysResponse>().await {
        Ok(KeysResponse {
            success: true,
            data: Some(mut data),
        }) => {
            let key = data.clear_keys.remove(kid);
            if key.is_none() {
                debug!("key server answered without key for {}", kid);
            }
            key
        }
        Ok(_) => {
            warn!("key server reported failure for {}", kid);
            None
        }
        Err(e) => {
            warn!("key server returned an unexpected body: {}", e);
            None
        }
    }
}
