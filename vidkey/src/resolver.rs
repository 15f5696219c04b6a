//! The resolution pipeline.
//!
//! ```text
//! cache check ─hit──────────────────────────────────────────────┐
//!     │ miss                                                     │
//! upstream fetch ─err─> Error                                    │
//!     │                                                          │
//! decrypt ─fail─> Resolution::Encrypted                          │
//!     │                                                          │
//! [manifest fetch -> kid extract -> key fetch]  (failures: no drm)
//!     │                                                          │
//! assemble -> cache store ──────────────────────────────────> done
//! ```

use crate::{
    cache::{ResultCache, TokenCache},
    cipher::{EncryptedEnvelope, PayloadCipher, StaticKeyCipher},
    config::Config,
    drm::{self, DrmInfo},
    error::{Error, ErrorKind, Result},
    headers::{HeaderSynthesizer, manifest_headers},
    request::ResolutionRequest,
};
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

pub const DECRYPTION_FAILED_NOTE: &str = "Encrypted response - decryption failed";

/// Url metadata of a resolved stream.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamMetadata {
    pub url: String,
    pub signed_url: Option<String>,
    pub url_type: Option<String>,
    pub video_container: String,
    pub is_cmaf: bool,
    pub cdn_type: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResolvedStream {
    pub success: bool,
    pub data: StreamMetadata,
    /// Base url followed by the signed suffix.
    pub stream_url: String,
    pub url_type: Option<String>,
    pub drm: Option<DrmInfo>,
    pub timestamp: DateTime<Utc>,
}

/// Upstream body handed back untouched because it could not be decrypted.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EncryptedPassthrough {
    pub success: bool,
    pub data: Value,
    pub note: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Resolution {
    Resolved(ResolvedStream),
    Encrypted(EncryptedPassthrough),
}

impl Resolution {
    pub fn stream_url(&self) -> Option<&str> {
        match self {
            Resolution::Resolved(x) => Some(&x.stream_url),
            Resolution::Encrypted(_) => None,
        }
    }

    pub fn drm(&self) -> Option<&DrmInfo> {
        match self {
            Resolution::Resolved(x) => x.drm.as_ref(),
            Resolution::Encrypted(_) => None,
        }
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, Resolution::Encrypted(_))
    }
}

#[derive(Debug, Deserialize)]
struct Payload {
    #[serde(default)]
    success: bool,
    data: Option<PayloadData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayloadData {
    url: Option<String>,
    signed_url: Option<String>,
    url_type: Option<String>,
    video_container: Option<String>,
    is_cmaf: Option<bool>,
    cdn_type: Option<String>,
}

impl PayloadData {
    /// Returns `None` when there is no base url to build a stream from.
    fn into_metadata(self) -> Option<StreamMetadata> {
        Some(StreamMetadata {
            url: self.url.filter(|x| !x.is_empty())?,
            signed_url: self.signed_url,
            url_type: self.url_type,
            video_container: self.video_container.unwrap_or_else(|| "DASH".to_owned()),
            is_cmaf: self.is_cmaf.unwrap_or(false),
            cdn_type: self.cdn_type,
        })
    }
}

impl StreamMetadata {
    fn stream_url(&self) -> String {
        format!("{}{}", self.url, self.signed_url.as_deref().unwrap_or_default())
    }

    fn is_manifest(&self) -> bool {
        self.url.contains(".mpd")
    }
}

/// Turns identifier triples into [`Resolution`]s.
///
/// Both caches are owned by whoever builds the resolver, so tests can hand in
/// fresh ones and a server can share one set across all requests.
pub struct Resolver {
    config: Arc<Config>,
    client: Client,
    cipher: Arc<dyn PayloadCipher>,
    results: Arc<ResultCache>,
    headers: HeaderSynthesizer,
}

impl Resolver {
    pub fn builder(config: Config) -> ResolverBuilder {
        ResolverBuilder {
            config,
            client: None,
            cipher: None,
            results: None,
            tokens: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Validate the identifiers and run the pipeline.
    pub async fn resolve(
        &self,
        batch_id: &str,
        subject_id: &str,
        child_id: &str,
    ) -> Result<Resolution> {
        let request = ResolutionRequest::new(batch_id, subject_id, child_id)?;
        self.resolve_request(&request).await
    }

    pub async fn resolve_request(&self, request: &ResolutionRequest) -> Result<Resolution> {
        let key = request.cache_key();

        if let Some(cached) = self.results.get(&key) {
            debug!("cache hit for {}", key);
            return Ok(cached);
        }

        info!(
            "fetching video url for batchId: {}, subjectId: {}, childId: {}",
            request.batch_id(),
            request.subject_id(),
            request.child_id()
        );

        let body = self.fetch_envelope(request).await.inspect_err(|e| {
            error!("video url request failed: {} ({})", e, e.details());
        })?;

        let Some(metadata) = self.open(&body) else {
            return Ok(Resolution::Encrypted(EncryptedPassthrough {
                success: true,
                data: body,
                note: DECRYPTION_FAILED_NOTE.to_owned(),
                timestamp: Utc::now(),
            }));
        };

        let stream_url = metadata.stream_url();
        let drm = if metadata.is_manifest() {
            self.drm_info(&stream_url).await
        } else {
            None
        };

        let resolution = Resolution::Resolved(ResolvedStream {
            success: true,
            url_type: metadata.url_type.clone(),
            data: metadata,
            stream_url,
            drm,
            timestamp: Utc::now(),
        });

        self.results.insert(key, resolution.clone());
        Ok(resolution)
    }

    async fn fetch_envelope(&self, request: &ResolutionRequest) -> Result<Value> {
        let url = self.config.endpoint("video-url")?;
        let identity = self.headers.identity().await;
        let request = self
            .client
            .post(url)
            .json(&json!({
                "batchId": request.batch_id(),
                "childId": request.child_id(),
            }))
            .timeout(self.config.request_timeout());

        let response = identity
            .apply(request)
            .send()
            .await
            .map_err(Error::from_send)?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::new(ErrorKind::UpstreamUnavailable(e.to_string())))?;
        let body = serde_json::from_str::<Value>(&text).unwrap_or_else(|_| Value::String(text));

        if !status.is_success() {
            return Err(Error::new(ErrorKind::Upstream {
                status: status.as_u16(),
                details: body,
            }));
        }

        Ok(body)
    }

    /// Decrypt the envelope. `None` sends the caller down the passthrough path.
    fn open(&self, body: &Value) -> Option<StreamMetadata> {
        let Some(envelope) = EncryptedEnvelope::from_body(body) else {
            warn!("upstream body carries no encrypted envelope");
            return None;
        };

        let document = self
            .cipher
            .decrypt(&envelope)
            .inspect_err(|e| warn!("decryption failed: {}", e))
            .ok()?;

        match serde_json::from_value::<Payload>(document) {
            Ok(Payload {
                success: true,
                data: Some(data),
            }) => data.into_metadata().or_else(|| {
                warn!("decrypted payload has no stream url");
                None
            }),
            Ok(_) => {
                warn!("decrypted payload reports failure");
                None
            }
            Err(e) => {
                warn!("decrypted payload has an unexpected shape: {}", e);
                None
            }
        }
    }

    /// Manifest fetch, key id extraction and key fetch. Never fails the resolution.
    async fn drm_info(&self, stream_url: &str) -> Option<DrmInfo> {
        debug!("fetching manifest for drm extraction");

        let manifest = match self.fetch_manifest(stream_url).await {
            Ok(x) => x,
            Err(e) => {
                warn!("manifest request failed: {}", e);
                return None;
            }
        };

        let Some(kid) = vidkey_mpd::find_kid(&manifest) else {
            warn!("no key id found in manifest");
            return None;
        };
        info!("found key id {} via {}", kid, kid.probe);

        let identity = self.headers.identity().await;
        let Some(key) = drm::fetch_key(&self.client, &self.config, &identity, &kid.value).await
        else {
            warn!("no content key found for {}", kid);
            return None;
        };

        info!("content key retrieved for {}", kid);
        Some(DrmInfo {
            kid: kid.value,
            key,
        })
    }

    async fn fetch_manifest(&self, url: &str) -> reqwest::Result<String> {
        let mut request = self
            .client
            .get(url)
            .timeout(self.config.manifest_timeout());

        for (k, v) in manifest_headers(self.config.origin.as_ref()) {
            request = request.header(k, v);
        }

        request.send().await?.error_for_status()?.text().await
    }
}

/// Builder for [`Resolver`]. Anything not provided is created from the config.
pub struct ResolverBuilder {
    config: Config,
    client: Option<Client>,
    cipher: Option<Arc<dyn PayloadCipher>>,
    results: Option<Arc<ResultCache>>,
    tokens: Option<Arc<TokenCache>>,
}

impl ResolverBuilder {
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn cipher(mut self, cipher: Arc<dyn PayloadCipher>) -> Self {
        self.cipher = Some(cipher);
        self
    }

    pub fn result_cache(mut self, results: Arc<ResultCache>) -> Self {
        self.results = Some(results);
        self
    }

    pub fn token_cache(mut self, tokens: Arc<TokenCache>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn build(self) -> Result<Resolver> {
        self.config
            .validate()
            .map_err(|e| Error::new(ErrorKind::Internal(e)))?;

        let client = match self.client {
            Some(x) => x,
            None => Client::builder()
                .build()
                .map_err(|e| Error::new(ErrorKind::Internal(e.to_string())))?,
        };
        let cipher = self
            .cipher
            .unwrap_or_else(|| Arc::new(StaticKeyCipher::from_passphrase(&self.config.passphrase)));
        let results = self
            .results
            .unwrap_or_else(|| Arc::new(ResultCache::new(self.config.result_ttl())));
        let tokens = self
            .tokens
            .unwrap_or_else(|| Arc::new(TokenCache::new(self.config.token_ttl())));
        let config = Arc::new(self.config);

        Ok(Resolver {
            headers: HeaderSynthesizer::new(client.clone(), config.clone(), tokens),
            config,
            client,
            cipher,
            results,
        })
    }
}
