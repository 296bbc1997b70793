//! JWT Authorizer
//!
//! Verifies bearer tokens with `jsonwebtoken` and hands back every claim the
//! token carries. Supports HS256/HS384/HS512, RS256 and ES256.

use super::{AuthError, Authorization, AuthorizeOptions, Authorizer, ClaimsMap, ProvisionOptions};
use async_trait::async_trait;
use hyper::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn, Span};

/// Where to look for a token on the incoming request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TokenSource {
    #[serde(rename = "bearer")]
    Bearer,
    #[serde(rename = "query")]
    Query { name: String },
    #[serde(rename = "header")]
    Header { name: String },
    #[serde(rename = "cookie")]
    Cookie { name: String },
}

/// JWT authorizer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtAuthorizerConfig {
    /// HMAC secret or PEM-encoded public key
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default = "default_token_sources")]
    pub token_sources: Vec<TokenSource>,
    #[serde(default)]
    pub leeway_secs: u64,
}

impl Default for JwtAuthorizerConfig {
    fn default() -> Self {
        Self {
            secret: None,
            algorithm: default_algorithm(),
            issuer: None,
            audience: None,
            token_sources: default_token_sources(),
            leeway_secs: 0,
        }
    }
}

fn default_algorithm() -> String {
    "HS256".to_string()
}

fn default_token_sources() -> Vec<TokenSource> {
    vec![TokenSource::Bearer]
}

/// Key material and rules built during provisioning
struct Provisioned {
    decoding_key: DecodingKey,
    validation: Validation,
    logger: Span,
}

/// JWT Authorizer
///
/// Must be provisioned before use.
///
/// # Example
///
/// ```
/// use jwt_auth_provider::auth::jwt::{JwtAuthorizer, JwtAuthorizerConfig};
/// use jwt_auth_provider::auth::{Authorizer, ProvisionOptions};
///
/// let mut authorizer = JwtAuthorizer::new(JwtAuthorizerConfig {
///     secret: Some("my-secret".into()),
///     issuer: Some("https://auth.example.com".into()),
///     ..Default::default()
/// });
/// authorizer
///     .provision(ProvisionOptions { logger: tracing::Span::none() })
///     .unwrap();
/// ```
#[derive(Deserialize)]
#[serde(transparent)]
pub struct JwtAuthorizer {
    config: JwtAuthorizerConfig,
    #[serde(skip)]
    state: Option<Provisioned>,
}

impl std::fmt::Debug for JwtAuthorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtAuthorizer")
            .field("algorithm", &self.config.algorithm)
            .field("issuer", &self.config.issuer)
            .field("audience", &self.config.audience)
            .field("token_sources", &self.config.token_sources)
            .field("provisioned", &self.state.is_some())
            .finish()
    }
}

impl JwtAuthorizer {
    /// Create an unprovisioned authorizer
    pub fn new(config: JwtAuthorizerConfig) -> Self {
        Self {
            config,
            state: None,
        }
    }

    /// Settings this authorizer was created with
    pub fn config(&self) -> &JwtAuthorizerConfig {
        &self.config
    }

    /// Whether `provision` has completed successfully
    pub fn is_provisioned(&self) -> bool {
        self.state.is_some()
    }

    fn build_key(&self, algorithm: Algorithm, secret: &str) -> Result<DecodingKey, AuthError> {
        match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                Ok(DecodingKey::from_secret(secret.as_bytes()))
            }
            Algorithm::RS256 => DecodingKey::from_rsa_pem(secret.as_bytes())
                .map_err(|e| AuthError::Provision(format!("invalid RSA public key: {}", e))),
            Algorithm::ES256 => DecodingKey::from_ec_pem(secret.as_bytes())
                .map_err(|e| AuthError::Provision(format!("invalid EC public key: {}", e))),
            other => Err(AuthError::Provision(format!(
                "unsupported algorithm: {:?}",
                other
            ))),
        }
    }

    /// Extract token from request, trying sources in configured order
    fn extract_token(&self, request: &Parts) -> Option<String> {
        self.config
            .token_sources
            .iter()
            .find_map(|source| token_from_source(source, request))
    }
}

fn parse_algorithm(name: &str) -> Result<Algorithm, AuthError> {
    match name.to_uppercase().as_str() {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        "RS256" => Ok(Algorithm::RS256),
        "ES256" => Ok(Algorithm::ES256),
        alg => Err(AuthError::Provision(format!(
            "unsupported algorithm: {}",
            alg
        ))),
    }
}

fn header_str<'a>(request: &'a Parts, name: &str) -> Option<&'a str> {
    request.headers.get(name).and_then(|v| v.to_str().ok())
}

fn token_from_source(source: &TokenSource, request: &Parts) -> Option<String> {
    let token = match source {
        TokenSource::Bearer => header_str(request, "authorization")
            .and_then(|auth| auth.strip_prefix("Bearer "))
            .map(|t| t.trim().to_string()),
        TokenSource::Header { name } => header_str(request, name).map(|t| t.trim().to_string()),
        TokenSource::Query { name } => request.uri.query().and_then(|query| {
            query
                .split('&')
                .filter_map(|pair| pair.split_once('='))
                .find(|(k, _)| *k == name.as_str())
                .and_then(|(_, v)| percent_decode_str(v).decode_utf8().ok())
                .map(|v| v.into_owned())
        }),
        TokenSource::Cookie { name } => request
            .headers
            .get_all("cookie")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|header| header.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(k, _)| *k == name.as_str())
            .map(|(_, v)| v.to_string()),
    };

    token.filter(|t| !t.is_empty())
}

#[async_trait]
impl Authorizer for JwtAuthorizer {
    fn provision(&mut self, opts: ProvisionOptions) -> Result<(), AuthError> {
        let algorithm = parse_algorithm(&self.config.algorithm)?;
        let secret = self
            .config
            .secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AuthError::Provision("no secret or public key configured".into()))?;
        let decoding_key = self.build_key(algorithm, secret)?;

        let mut validation = Validation::new(algorithm);
        validation.validate_exp = true;
        validation.leeway = self.config.leeway_secs;
        validation.validate_aud = false; // Only validate aud when explicitly set
        if let Some(issuer) = &self.config.issuer {
            validation.set_issuer(&[issuer]);
        }
        if let Some(audience) = &self.config.audience {
            validation.set_audience(&[audience]);
            validation.validate_aud = true;
        }

        if self.config.token_sources.is_empty() {
            return Err(AuthError::Provision("no token sources configured".into()));
        }

        info!(
            parent: &opts.logger,
            algorithm = ?algorithm,
            issuer = ?self.config.issuer,
            audience = ?self.config.audience,
            "JWT authorizer provisioned"
        );

        self.state = Some(Provisioned {
            decoding_key,
            validation,
            logger: opts.logger,
        });
        Ok(())
    }

    async fn authorize(
        &self,
        request: &Parts,
        opts: &AuthorizeOptions,
    ) -> Result<Authorization, AuthError> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| AuthError::Provision("authorizer used before provisioning".into()))?;

        let token = match self.extract_token(request) {
            Some(token) => token,
            None => {
                debug!(
                    parent: &state.logger,
                    request_id = %opts.request_id,
                    "No token present"
                );
                return Ok(Authorization::anonymous());
            }
        };

        let token_data = decode::<ClaimsMap>(&token, &state.decoding_key, &state.validation)
            .map_err(|e| {
                let err = match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                        AuthError::InvalidSignature
                    }
                    _ => AuthError::InvalidToken(e.to_string()),
                };
                warn!(
                    parent: &state.logger,
                    request_id = %opts.request_id,
                    error = %err,
                    "JWT verification failed"
                );
                err
            })?;

        debug!(
            parent: &state.logger,
            request_id = %opts.request_id,
            claims = token_data.claims.len(),
            "JWT verification successful"
        );

        Ok(Authorization::verified(token_data.claims))
    }
}
