//! Bearer-token verification against the identity provider.
//!
//! Two strategies, selected at startup:
//!
//! - **Introspection**: every request forwards the token to the provider's
//!   `POST /tokens/introspect` endpoint, authenticated with the server's
//!   secret key. Simple, always current, one extra round-trip per request.
//! - **JWKS**: session tokens are RS256 JWTs verified locally against the
//!   provider's published key set. Keys are cached with a TTL and re-fetched
//!   on miss so key rotation needs no restart.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::RwLock;

use tablier_api::claims::{IntrospectionResponse, TokenClaims};
use tablier_api::ServiceError;

const JWKS_CACHE_TTL_SECS: u64 = 300;
/// Floor between forced refetches when tokens carry unknown key ids.
const JWKS_REFETCH_FLOOR_SECS: u64 = 30;
const HTTP_TIMEOUT_SECS: u64 = 10;

/// A single RSA key from the provider's JWKS document.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    pub kty: String,
    pub kid: String,
    #[serde(default)]
    pub alg: Option<String>,
    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub e: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<Jwk>,
}

struct CachedJwks {
    keys: HashMap<String, Jwk>,
    fetched_at: Instant,
    expires_at: Instant,
}

#[derive(Clone)]
enum Strategy {
    Introspect {
        api_base: String,
        secret_key: String,
    },
    Jwks {
        jwks_url: String,
        issuer: Option<String>,
        cache: Arc<RwLock<Option<CachedJwks>>>,
    },
}

/// Verifies `Authorization: Bearer` credentials and yields [`TokenClaims`].
#[derive(Clone)]
pub struct TokenVerifier {
    http: reqwest::Client,
    strategy: Strategy,
}

impl TokenVerifier {
    pub fn introspection(api_base: String, secret_key: String) -> Self {
        Self {
            http: http_client(),
            strategy: Strategy::Introspect {
                api_base: api_base.trim_end_matches('/').to_string(),
                secret_key,
            },
        }
    }

    pub fn jwks(jwks_url: String, issuer: Option<String>) -> Self {
        Self {
            http: http_client(),
            strategy: Strategy::Jwks {
                jwks_url,
                issuer,
                cache: Arc::new(RwLock::new(None)),
            },
        }
    }

    /// Verify a bearer token and return its claims.
    pub async fn verify(&self, token: &str) -> Result<TokenClaims, ServiceError> {
        match &self.strategy {
            Strategy::Introspect {
                api_base,
                secret_key,
            } => self.introspect(api_base, secret_key, token).await,
            Strategy::Jwks {
                jwks_url,
                issuer,
                cache,
            } => self.verify_local(jwks_url, issuer.as_deref(), cache, token).await,
        }
    }

    // ── Remote introspection ────────────────────────────────────────────

    async fn introspect(
        &self,
        api_base: &str,
        secret_key: &str,
        token: &str,
    ) -> Result<TokenClaims, ServiceError> {
        let url = format!("{api_base}/tokens/introspect");
        let response = self
            .http
            .post(&url)
            .bearer_auth(secret_key)
            .form(&[("token", token)])
            .send()
            .await
            .map_err(|e| {
                tracing::error!("token introspection request: {e}");
                ServiceError::Unavailable("identity provider unreachable".into())
            })?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "token introspection rejected");
            return Err(ServiceError::Unauthorized("invalid token".into()));
        }

        let body: IntrospectionResponse = response.json().await.map_err(|e| {
            tracing::error!("token introspection response: {e}");
            ServiceError::Unauthorized("invalid token".into())
        })?;

        if !body.active {
            return Err(ServiceError::Unauthorized("token is not active".into()));
        }

        Ok(body.claims)
    }

    // ── Local JWKS verification ─────────────────────────────────────────

    async fn verify_local(
        &self,
        jwks_url: &str,
        issuer: Option<&str>,
        cache: &Arc<RwLock<Option<CachedJwks>>>,
        token: &str,
    ) -> Result<TokenClaims, ServiceError> {
        let header = decode_header(token)
            .map_err(|_| ServiceError::Unauthorized("invalid token".into()))?;
        let kid = header
            .kid
            .ok_or_else(|| ServiceError::Unauthorized("token has no key id".into()))?;

        let jwk = self.get_key(jwks_url, cache, &kid).await?;
        decode_claims(token, &jwk, issuer)
    }

    async fn get_key(
        &self,
        jwks_url: &str,
        cache: &Arc<RwLock<Option<CachedJwks>>>,
        kid: &str,
    ) -> Result<Jwk, ServiceError> {
        {
            let cached = cache.read().await;
            if let Some(c) = cached.as_ref() {
                if c.expires_at > Instant::now() {
                    if let Some(key) = c.keys.get(kid) {
                        return Ok(key.clone());
                    }
                    // Valid cache without this kid: the provider may have
                    // just rotated keys, so force one refetch. A floor on
                    // refetch frequency keeps garbage kids from hammering
                    // the JWKS endpoint.
                    if c.fetched_at.elapsed() < Duration::from_secs(JWKS_REFETCH_FLOOR_SECS) {
                        return Err(ServiceError::Unauthorized("invalid token".into()));
                    }
                }
            }
        }

        self.refresh_keys(jwks_url, cache).await?;

        let cached = cache.read().await;
        cached
            .as_ref()
            .and_then(|c| c.keys.get(kid).cloned())
            .ok_or_else(|| {
                tracing::warn!(%kid, "key not found in JWKS after refresh");
                ServiceError::Unauthorized("invalid token".into())
            })
    }

    async fn refresh_keys(
        &self,
        jwks_url: &str,
        cache: &Arc<RwLock<Option<CachedJwks>>>,
    ) -> Result<(), ServiceError> {
        tracing::debug!(url = %jwks_url, "fetching JWKS");
        let response = self.http.get(jwks_url).send().await.map_err(|e| {
            tracing::error!("JWKS fetch: {e}");
            ServiceError::Unavailable("identity provider unreachable".into())
        })?;

        if !response.status().is_success() {
            tracing::error!(status = %response.status(), "JWKS endpoint returned error");
            return Err(ServiceError::Unavailable(
                "identity provider unreachable".into(),
            ));
        }

        let jwks: JwksResponse = response.json().await.map_err(|e| {
            tracing::error!("JWKS parse: {e}");
            ServiceError::Unavailable("identity provider unreachable".into())
        })?;

        let keys: HashMap<String, Jwk> =
            jwks.keys.into_iter().map(|k| (k.kid.clone(), k)).collect();
        tracing::info!(key_count = keys.len(), "JWKS cache refreshed");

        let mut guard = cache.write().await;
        *guard = Some(CachedJwks {
            keys,
            fetched_at: Instant::now(),
            expires_at: Instant::now() + Duration::from_secs(JWKS_CACHE_TTL_SECS),
        });
        Ok(())
    }

    #[cfg(test)]
    async fn prime_cache(&self, keys: Vec<Jwk>, age: Duration) {
        if let Strategy::Jwks { cache, .. } = &self.strategy {
            let mut guard = cache.write().await;
            *guard = Some(CachedJwks {
                keys: keys.into_iter().map(|k| (k.kid.clone(), k)).collect(),
                fetched_at: Instant::now() - age,
                expires_at: Instant::now() + Duration::from_secs(60),
            });
        }
    }
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("failed to build HTTP client with timeout, using defaults: {e}");
            reqwest::Client::new()
        })
}

/// Verify signature + standard claims and deserialize [`TokenClaims`].
fn decode_claims(token: &str, jwk: &Jwk, issuer: Option<&str>) -> Result<TokenClaims, ServiceError> {
    if jwk.kty != "RSA" {
        tracing::warn!(kty = %jwk.kty, "unexpected JWK key type");
        return Err(ServiceError::Unauthorized("invalid token".into()));
    }

    let (n, e) = match (&jwk.n, &jwk.e) {
        (Some(n), Some(e)) => (n, e),
        _ => {
            tracing::error!(kid = %jwk.kid, "JWK missing RSA components");
            return Err(ServiceError::Unauthorized("invalid token".into()));
        }
    };

    let key = DecodingKey::from_rsa_components(n, e)
        .map_err(|_| ServiceError::Unauthorized("invalid token".into()))?;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.validate_aud = false;
    if let Some(iss) = issuer {
        validation.set_issuer(&[iss]);
    }

    let data = decode::<TokenClaims>(token, &key, &validation).map_err(|e| {
        tracing::debug!("token verification failed: {e}");
        ServiceError::Unauthorized("invalid token".into())
    })?;

    Ok(data.claims)
}
