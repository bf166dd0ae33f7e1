//! Forged and tampered token tests
//!
//! Every case here must fail verification as a security violation, and no
//! user may be created.

mod common;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use bossoidc_auth::{AccessToken, AuthError};
use bossoidc_store::MemoryUserStore;
use common::{access_token_claims, authenticator, mock_jwks::TestKey};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};

async fn assert_rejected(token: String, key: &TestKey) -> AuthError {
    let store = MemoryUserStore::new();
    let err = authenticator(&store, key)
        .authenticate(&AccessToken::Bearer(token), None)
        .await
        .expect_err("token must be rejected");

    assert!(err.is_security_violation(), "expected security violation, got {:?}", err);
    assert_eq!(store.user_count().await, 0);
    err
}

#[tokio::test]
async fn test_tampered_payload_rejected() {
    let key = TestKey::generate("k1");
    let token = key.sign(&access_token_claims("kc-1", "alice", &[]));

    let forged_payload = URL_SAFE_NO_PAD
        .encode(serde_json::to_vec(&access_token_claims("kc-1", "alice", &["superuser"])).unwrap());
    let parts: Vec<&str> = token.split('.').collect();
    let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

    let err = assert_rejected(forged, &key).await;
    assert!(matches!(err, AuthError::InvalidSignature));
}

#[tokio::test]
async fn test_signature_from_unknown_key_rejected() {
    let trusted = TestKey::generate("k1");
    // same kid, different key material
    let attacker = TestKey::generate("k1");
    let token = attacker.sign(&access_token_claims("kc-1", "alice", &["superuser"]));

    let err = assert_rejected(token, &trusted).await;
    assert!(matches!(err, AuthError::InvalidSignature));
}

#[tokio::test]
async fn test_hmac_token_rejected() {
    let key = TestKey::generate("k1");
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some("k1".to_string());
    let token = encode(
        &header,
        &access_token_claims("kc-1", "alice", &["superuser"]),
        &EncodingKey::from_secret(b"guessable"),
    )
    .unwrap();

    let err = assert_rejected(token, &key).await;
    assert!(matches!(err, AuthError::UnsupportedAlgorithm(_)));
}

#[tokio::test]
async fn test_unsigned_token_rejected() {
    let key = TestKey::generate("k1");
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD
        .encode(serde_json::to_vec(&access_token_claims("kc-1", "alice", &["superuser"])).unwrap());

    let err = assert_rejected(format!("{}.{}.", header, payload), &key).await;
    assert!(matches!(err, AuthError::InvalidTokenFormat(_)));
}

#[tokio::test]
async fn test_stripped_signature_rejected() {
    let key = TestKey::generate("k1");
    let token = key.sign(&access_token_claims("kc-1", "alice", &[]));
    let unsigned = format!("{}.", token.rsplit_once('.').unwrap().0);

    assert_rejected(unsigned, &key).await;
}

#[tokio::test]
async fn test_garbage_token_rejected() {
    let key = TestKey::generate("k1");
    let err = assert_rejected("definitely-not-a-jwt".to_string(), &key).await;
    assert!(matches!(err, AuthError::InvalidTokenFormat(_)));
}
