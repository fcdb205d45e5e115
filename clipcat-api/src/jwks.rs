//! Bearer token verification against a JSON Web Key Set
//!
//! The key set is fetched once at startup and cached. A token whose `kid` is
//! not in the cached set triggers one refresh, which picks up rotated keys.
//! Refreshes are at most one per `REFRESH_COOLDOWN`. When a key declares its
//! algorithm, tokens must be signed with exactly that algorithm.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{Jwk, JwkSet, KeyAlgorithm};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use clipcat_common::config::AuthSettings;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Minimum time between key set fetches triggered by unknown key ids
pub const REFRESH_COOLDOWN: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum JwksError {
    #[error("Failed to fetch key set: {0}")]
    Fetch(String),

    #[error("Token header has no key id")]
    MissingKeyId,

    #[error("No key with id '{0}'")]
    UnknownKey(String),

    #[error("Unusable key '{kid}': {reason}")]
    InvalidKey { kid: String, reason: String },

    #[error("Token signed with {found:?}, key requires {expected:?}")]
    AlgorithmMismatch { expected: Algorithm, found: Algorithm },

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
}

/// Claims the service reads from a verified token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

pub struct JwksVerifier {
    jwks_url: Option<String>,
    issuer: Option<String>,
    audience: Option<String>,
    keys: RwLock<JwkSet>,
    last_refresh: Mutex<Option<Instant>>,
    client: reqwest::Client,
}

impl JwksVerifier {
    /// Fetch the key set named by `settings.jwks_url`.
    ///
    /// Returns `Ok(None)` when no URL is configured (authentication disabled).
    pub async fn from_settings(settings: &AuthSettings) -> Result<Option<Self>, JwksError> {
        let Some(url) = settings.jwks_url.clone() else {
            return Ok(None);
        };

        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| JwksError::Fetch(e.to_string()))?;
        let keys = fetch_key_set(&client, &url).await?;
        info!(url = %url, keys = keys.keys.len(), "Loaded JSON Web Key Set");

        Ok(Some(Self {
            jwks_url: Some(url),
            issuer: settings.issuer.clone(),
            audience: settings.audience.clone(),
            keys: RwLock::new(keys),
            last_refresh: Mutex::new(Some(Instant::now())),
            client,
        }))
    }

    /// Verifier over a fixed key set that never refreshes
    pub fn from_jwk_set(keys: JwkSet, issuer: Option<String>, audience: Option<String>) -> Self {
        Self {
            jwks_url: None,
            issuer,
            audience,
            keys: RwLock::new(keys),
            last_refresh: Mutex::new(None),
            client: reqwest::Client::new(),
        }
    }

    /// Validate signature and expiry (plus issuer/audience when configured)
    pub async fn verify(&self, token: &str) -> Result<Claims, JwksError> {
        let header = decode_header(token)?;

        let jwk = match self.find_key(header.kid.as_deref()).await {
            Ok(jwk) => jwk,
            Err(JwksError::UnknownKey(kid)) if self.jwks_url.is_some() => {
                if !self.claim_refresh_slot() {
                    debug!(kid = %kid, "Unknown key id, refresh on cooldown");
                    return Err(JwksError::UnknownKey(kid));
                }
                debug!(kid = %kid, "Unknown key id, refreshing key set");
                self.refresh().await?;
                self.find_key(Some(&kid)).await?
            }
            Err(e) => return Err(e),
        };

        let kid = jwk.common.key_id.clone().unwrap_or_default();
        let algorithm = match &jwk.common.key_algorithm {
            Some(declared) => {
                let expected = signing_algorithm(declared).ok_or_else(|| JwksError::InvalidKey {
                    kid: kid.clone(),
                    reason: format!("{:?} is not a signing algorithm", declared),
                })?;
                if expected != header.alg {
                    return Err(JwksError::AlgorithmMismatch {
                        expected,
                        found: header.alg,
                    });
                }
                expected
            }
            None => header.alg,
        };
        let key = DecodingKey::from_jwk(&jwk).map_err(|e| JwksError::InvalidKey {
            kid,
            reason: e.to_string(),
        })?;

        let mut validation = Validation::new(algorithm);
        match &self.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }

        let data = decode::<Claims>(token, &key, &validation)?;
        Ok(data.claims)
    }

    /// Key for `kid`. A token without `kid` is accepted only against a single-key set.
    async fn find_key(&self, kid: Option<&str>) -> Result<Jwk, JwksError> {
        let keys = self.keys.read().await;
        match kid {
            Some(kid) => keys
                .find(kid)
                .cloned()
                .ok_or_else(|| JwksError::UnknownKey(kid.to_string())),
            None if keys.keys.len() == 1 => Ok(keys.keys[0].clone()),
            None => Err(JwksError::MissingKeyId),
        }
    }

    /// Record a refresh attempt now unless one happened within the cooldown
    fn claim_refresh_slot(&self) -> bool {
        let mut last = self.last_refresh.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        match *last {
            Some(at) if now.duration_since(at) < REFRESH_COOLDOWN => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    async fn refresh(&self) -> Result<(), JwksError> {
        let Some(url) = &self.jwks_url else {
            return Ok(());
        };
        let fresh = fetch_key_set(&self.client, url).await?;
        info!(keys = fresh.keys.len(), "Refreshed JSON Web Key Set");
        *self.keys.write().await = fresh;
        Ok(())
    }
}

/// Signing algorithm named by a JWK `alg`; `None` for encryption-only values
fn signing_algorithm(declared: &KeyAlgorithm) -> Option<Algorithm> {
    serde_json::to_value(declared)
        .ok()
        .and_then(|name| serde_json::from_value(name).ok())
}

async fn fetch_key_set(client: &reqwest::Client, url: &str) -> Result<JwkSet, JwksError> {
    let response = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| {
            warn!(url = %url, "JWKS request failed: {}", e);
            JwksError::Fetch(e.to_string())
        })?;

    response
        .json::<JwkSet>()
        .await
        .map_err(|e| JwksError::Fetch(format!("malformed key set: {}", e)))
}
