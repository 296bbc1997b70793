//! JWT Authorizer Integration Tests
//!
//! Covers token verification, token sources and claim validation against
//! real tokens minted with `jsonwebtoken`.

mod common;

use common::{expires_in, hs256_token, user_claims, SECRET};
use hyper::http::request::Parts;
use hyper::Request;
use jwt_auth_provider::auth::jwt::{JwtAuthorizer, JwtAuthorizerConfig, TokenSource};
use jwt_auth_provider::auth::{AuthError, AuthorizeOptions, Authorizer, ProvisionOptions};
use serde_json::json;
use tracing::Span;

// ========================================================================
// Helpers
// ========================================================================

fn authorizer(config: JwtAuthorizerConfig) -> JwtAuthorizer {
    let mut auth = JwtAuthorizer::new(config);
    auth.provision(ProvisionOptions {
        logger: Span::none(),
    })
    .expect("authorizer should provision");
    auth
}

fn hs256(secret: &str) -> JwtAuthorizer {
    authorizer(JwtAuthorizerConfig {
        secret: Some(secret.into()),
        ..Default::default()
    })
}

fn request_with_token(token: &str) -> Parts {
    Request::builder()
        .uri("/protected")
        .header("authorization", format!("Bearer {}", token))
        .body(())
        .unwrap()
        .into_parts()
        .0
}

fn opts() -> AuthorizeOptions {
    AuthorizeOptions {
        request_id: "test-request".into(),
    }
}

// ========================================================================
// TEST: HS256 Algorithm
// ========================================================================

#[tokio::test]
async fn test_valid_hs256_token_accepted() {
    let auth = hs256(SECRET);
    let token = hs256_token(SECRET, &user_claims());

    let result = auth
        .authorize(&request_with_token(&token), &opts())
        .await
        .expect("Valid HS256 token should be accepted");

    assert!(result.authenticated);
    let claims = result.claims.unwrap();
    assert_eq!(claims["sub"], "s1");
    assert_eq!(claims["email"], "a@b.com");
}

#[tokio::test]
async fn test_invalid_hs256_signature_rejected() {
    let auth = hs256("correct-secret");
    let token = hs256_token("wrong-secret", &user_claims());

    let result = auth.authorize(&request_with_token(&token), &opts()).await;
    assert!(
        matches!(result, Err(AuthError::InvalidSignature)),
        "Token with wrong secret should be rejected"
    );
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let auth = hs256(SECRET);
    let mut claims = user_claims();
    claims["exp"] = json!(expires_in(-1));
    let token = hs256_token(SECRET, &claims);

    let result = auth.authorize(&request_with_token(&token), &opts()).await;
    assert!(
        matches!(result, Err(AuthError::TokenExpired)),
        "Expired token should be rejected"
    );
}

#[tokio::test]
async fn test_leeway_accepts_recently_expired_token() {
    let auth = authorizer(JwtAuthorizerConfig {
        secret: Some(SECRET.into()),
        leeway_secs: 300,
        ..Default::default()
    });
    let mut claims = user_claims();
    claims["exp"] = json!(chrono::Utc::now().timestamp() - 60);
    let token = hs256_token(SECRET, &claims);

    let result = auth.authorize(&request_with_token(&token), &opts()).await;
    assert!(result.is_ok(), "Token inside leeway should be accepted");
}

#[tokio::test]
async fn test_malformed_token_rejected() {
    let auth = hs256(SECRET);

    let result = auth
        .authorize(&request_with_token("not-a-valid-jwt-token"), &opts())
        .await;
    assert!(
        matches!(result, Err(AuthError::InvalidToken(_))),
        "Malformed token should be rejected"
    );
}

#[tokio::test]
async fn test_missing_token_is_not_an_error() {
    let auth = hs256(SECRET);
    let request = Request::builder().body(()).unwrap().into_parts().0;

    let result = auth.authorize(&request, &opts()).await.unwrap();
    assert!(!result.authenticated);
    assert!(result.claims.is_none());
}

// ========================================================================
// TEST: Other HMAC Algorithms
// ========================================================================

#[tokio::test]
async fn test_hs512_algorithm_mismatch_rejected() {
    let auth = authorizer(JwtAuthorizerConfig {
        secret: Some(SECRET.into()),
        algorithm: "HS512".into(),
        ..Default::default()
    });
    // Signed with HS256 while HS512 is required
    let token = hs256_token(SECRET, &user_claims());

    let result = auth.authorize(&request_with_token(&token), &opts()).await;
    assert!(matches!(result, Err(AuthError::InvalidToken(_))));
}

#[tokio::test]
async fn test_valid_hs384_token_accepted() {
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

    let auth = authorizer(JwtAuthorizerConfig {
        secret: Some(SECRET.into()),
        algorithm: "hs384".into(),
        ..Default::default()
    });
    let token = encode(
        &Header::new(Algorithm::HS384),
        &user_claims(),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();

    let result = auth.authorize(&request_with_token(&token), &opts()).await;
    assert!(result.unwrap().authenticated);
}

// ========================================================================
// TEST: Token Extraction
// ========================================================================

#[tokio::test]
async fn test_token_from_query_parameter() {
    let auth = authorizer(JwtAuthorizerConfig {
        secret: Some(SECRET.into()),
        token_sources: vec![TokenSource::Query {
            name: "access_token".into(),
        }],
        ..Default::default()
    });
    let token = hs256_token(SECRET, &user_claims());
    let request = Request::builder()
        .uri(format!("/protected?access_token={}", token))
        .body(())
        .unwrap()
        .into_parts()
        .0;

    let result = auth.authorize(&request, &opts()).await;
    assert!(
        result.unwrap().authenticated,
        "Should extract token from query parameter"
    );
}

#[tokio::test]
async fn test_percent_encoded_query_token() {
    let auth = authorizer(JwtAuthorizerConfig {
        secret: Some(SECRET.into()),
        token_sources: vec![TokenSource::Query {
            name: "access_token".into(),
        }],
        ..Default::default()
    });
    let token = hs256_token(SECRET, &user_claims()).replace('.', "%2E");
    let request = Request::builder()
        .uri(format!("/protected?access_token={}", token))
        .body(())
        .unwrap()
        .into_parts()
        .0;

    let result = auth.authorize(&request, &opts()).await;
    assert!(
        result.unwrap().authenticated,
        "Should decode percent-encoded query token"
    );
}

#[tokio::test]
async fn test_token_from_cookie() {
    let auth = authorizer(JwtAuthorizerConfig {
        secret: Some(SECRET.into()),
        token_sources: vec![TokenSource::Cookie {
            name: "access_token".into(),
        }],
        ..Default::default()
    });
    let token = hs256_token(SECRET, &user_claims());
    let request = Request::builder()
        .header("cookie", format!("lang=en; access_token={}", token))
        .body(())
        .unwrap()
        .into_parts()
        .0;

    let result = auth.authorize(&request, &opts()).await;
    assert!(result.unwrap().authenticated, "Should extract token from cookie");
}

#[tokio::test]
async fn test_bearer_ignored_when_not_configured() {
    let auth = authorizer(JwtAuthorizerConfig {
        secret: Some(SECRET.into()),
        token_sources: vec![TokenSource::Header {
            name: "x-api-token".into(),
        }],
        ..Default::default()
    });
    let token = hs256_token(SECRET, &user_claims());

    let result = auth
        .authorize(&request_with_token(&token), &opts())
        .await
        .unwrap();
    assert!(!result.authenticated);
}

// ========================================================================
// TEST: Claims Validation
// ========================================================================

#[tokio::test]
async fn test_issuer_validation() {
    let auth = authorizer(JwtAuthorizerConfig {
        secret: Some(SECRET.into()),
        issuer: Some("expected-issuer".into()),
        ..Default::default()
    });

    let mut claims = user_claims();
    claims["iss"] = json!("wrong-issuer");
    let token = hs256_token(SECRET, &claims);

    let result = auth.authorize(&request_with_token(&token), &opts()).await;
    assert!(
        matches!(result, Err(AuthError::InvalidToken(_))),
        "Token with wrong issuer should be rejected"
    );

    claims["iss"] = json!("expected-issuer");
    let token = hs256_token(SECRET, &claims);
    let result = auth.authorize(&request_with_token(&token), &opts()).await;
    assert!(result.is_ok(), "Token with expected issuer should be accepted");
}

#[tokio::test]
async fn test_audience_validation() {
    let auth = authorizer(JwtAuthorizerConfig {
        secret: Some(SECRET.into()),
        audience: Some("expected-audience".into()),
        ..Default::default()
    });

    let mut claims = user_claims();
    claims["aud"] = json!("wrong-audience");
    let token = hs256_token(SECRET, &claims);

    let result = auth.authorize(&request_with_token(&token), &opts()).await;
    assert!(
        matches!(result, Err(AuthError::InvalidToken(_))),
        "Token with wrong audience should be rejected"
    );
}
