use crate::{cache::TokenCache, config::Config, token};
use chrono::Utc;
use rand::{Rng, RngCore};
use reqwest::{Client, RequestBuilder, Url};
use std::sync::Arc;

const BROWSER_HINTS: [(&str, &str); 4] = [
    ("accept-language", "en-GB,en-US;q=0.9,en;q=0.8"),
    ("priority", "u=1, i"),
    (
        "sec-ch-ua",
        r#""Not(A:Brand";v="8", "Chromium";v="144", "Google Chrome";v="144""#,
    ),
    ("sec-ch-ua-mobile", "?1"),
];

const DEVICE_ID_LEN: usize = 13;
const DEVICE_ID_CHARSET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Identity presented on one outbound api call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestIdentity {
    /// Client clock in milliseconds.
    pub client_info: String,
    pub device_id: String,
    /// 64 hex characters.
    pub fingerprint: String,
    pub origin: Option<Url>,
}

impl RequestIdentity {
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("accept", "application/json".to_owned()),
            ("content-type", "application/json".to_owned()),
        ];
        headers.extend(BROWSER_HINTS.iter().map(|(k, v)| (*k, (*v).to_owned())));
        headers.extend([
            ("sec-ch-ua-platform", r#""Android""#.to_owned()),
            ("sec-fetch-dest", "empty".to_owned()),
            ("sec-fetch-mode", "cors".to_owned()),
            ("sec-fetch-site", "same-origin".to_owned()),
            ("x-client-info", self.client_info.clone()),
            ("x-device-id", self.device_id.clone()),
            ("x-user-agent", self.fingerprint.clone()),
        ]);
        headers.extend(origin_headers(self.origin.as_ref()));
        headers
    }

    /// Invalid values surface as a builder error on `send()`.
    pub fn apply(&self, mut request: RequestBuilder) -> RequestBuilder {
        for (k, v) in self.headers() {
            request = request.header(k, v);
        }
        request
    }
}

/// Headers used when downloading a manifest from the cdn.
pub fn manifest_headers(origin: Option<&Url>) -> Vec<(&'static str, String)> {
    let mut headers = vec![("accept", "*/*".to_owned())];
    headers.extend(BROWSER_HINTS.iter().map(|(k, v)| (*k, (*v).to_owned())));
    headers.extend([
        ("sec-ch-ua-platform", r#""Android""#.to_owned()),
        ("sec-fetch-dest", "empty".to_owned()),
        ("sec-fetch-mode", "cors".to_owned()),
        ("sec-fetch-site", "cross-site".to_owned()),
    ]);
    headers.extend(
        origin_headers(origin)
            .into_iter()
            .filter(|(k, _)| *k == "referer"),
    );
    headers
}

fn origin_headers(origin: Option<&Url>) -> Vec<(&'static str, String)> {
    match origin {
        Some(origin) => vec![
            ("origin", origin.origin().ascii_serialization()),
            ("referer", origin.to_string()),
        ],
        None => vec![],
    }
}

/// Builds a [`RequestIdentity`] for every outbound call.
#[derive(Clone, Debug)]
pub struct HeaderSynthesizer {
    client: Client,
    config: Arc<Config>,
    tokens: Arc<TokenCache>,
}

impl HeaderSynthesizer {
    pub fn new(client: Client, config: Arc<Config>, tokens: Arc<TokenCache>) -> Self {
        Self {
            client,
            config,
            tokens,
        }
    }

    pub async fn identity(&self) -> RequestIdentity {
        RequestIdentity {
            client_info: Utc::now().timestamp_millis().to_string(),
            device_id: self.device_id().await,
            fingerprint: random_fingerprint(),
            origin: self.config.origin.clone(),
        }
    }

    /// Key of a live verified token, else a freshly verified one, else random.
    async fn device_id(&self) -> String {
        if let Some((key, _)) = self.tokens.find_live() {
            return key;
        }

        if self.config.verify_tokens
            && let Some(key) = token::acquire(&self.client, &self.config, &self.tokens).await
        {
            return key;
        }

        random_device_id()
    }
}

pub fn random_device_id() -> String {
    let mut rng = rand::thread_rng();
    (0..DEVICE_ID_LEN)
        .map(|_| DEVICE_ID_CHARSET[rng.gen_range(0..DEVICE_ID_CHARSET.len())] as char)
        .collect()
}

pub fn random_fingerprint() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::VerifiedToken;
    use std::time::Duration;

    fn synthesizer(tokens: Arc<TokenCache>) -> HeaderSynthesizer {
        let mut config = Config::new("http://127.0.0.1:1/api".parse().unwrap(), "secret");
        config.verify_tokens = false;
        HeaderSynthesizer::new(Client::new(), Arc::new(config), tokens)
    }

    #[test]
    fn test_random_device_id() {
        let id = random_device_id();
        assert_eq!(id.len(), DEVICE_ID_LEN);
        assert!(id.bytes().all(|x| DEVICE_ID_CHARSET.contains(&x)));
    }

    #[test]
    fn test_random_fingerprint() {
        let fingerprint = random_fingerprint();
        assert_eq!(fingerprint.len(), 64);
        assert!(fingerprint.chars().all(|x| x.is_ascii_hexdigit()));
        assert_ne!(fingerprint, random_fingerprint());
    }

    #[tokio::test]
    async fn test_identity_without_token() {
        let tokens = Arc::new(TokenCache::new(Duration::from_secs(60)));
        let before = Utc::now().timestamp_millis();
        let identity = synthesizer(tokens).identity().await;

        assert!(identity.client_info.parse::<i64>().unwrap() >= before);
        assert_eq!(identity.device_id.len(), DEVICE_ID_LEN);
        assert_eq!(identity.fingerprint.len(), 64);
    }

    #[tokio::test]
    async fn test_identity_reuses_live_token() {
        let tokens = Arc::new(TokenCache::new(Duration::from_secs(60)));
        tokens.insert(
            "cached.jwt.token".to_owned(),
            VerifiedToken {
                user_id: "u1".to_owned(),
                token: "cached.jwt.token".to_owned(),
                expires: 0,
                expires_iso: String::new(),
            },
        );

        let identity = synthesizer(tokens).identity().await;
        assert_eq!(identity.device_id, "cached.jwt.token");
    }

    #[test]
    fn test_headers() {
        let identity = RequestIdentity {
            client_info: "1700000000000".to_owned(),
            device_id: "abc".to_owned(),
            fingerprint: "f".repeat(64),
            origin: Some("https://front.test/".parse().unwrap()),
        };
        let headers = identity.headers();
        let get = |name: &str| {
            headers
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("x-client-info"), Some("1700000000000"));
        assert_eq!(get("x-device-id"), Some("abc"));
        assert_eq!(get("origin"), Some("https://front.test"));
        assert_eq!(get("referer"), Some("https://front.test/"));
        assert_eq!(get("sec-fetch-site"), Some("same-origin"));
    }

    #[test]
    fn test_manifest_headers() {
        let headers = manifest_headers(None);
        assert!(headers.contains(&("accept", "*/*".to_owned())));
        assert!(headers.contains(&("sec-fetch-site", "cross-site".to_owned())));
        assert!(!headers.iter().any(|(k, _)| *k == "origin"));
    }
}
