#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end tests for the JWT resolver through the SDK trait.

use std::sync::Arc;

use authn_resolver_sdk::{AuthNResolverClient, AuthOutcome, RejectionKind};
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use jwt_authn_plugin::domain::codec::VerificationKey;
use jwt_authn_plugin::{FixedClock, JwtAuthNConfig, JwtAuthNResolver};
use serde_json::{Value, json};

const KEY: &str = "integration-test-secret-0123456789";

fn sign_with(secret: &str, claims: &Value) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

fn client() -> Arc<dyn AuthNResolverClient> {
    Arc::new(JwtAuthNResolver::from_config(&JwtAuthNConfig::with_secret(KEY)).unwrap())
}

#[tokio::test]
async fn round_trip_yields_normalized_identity() {
    let token = sign_with(
        KEY,
        &json!({
            "sub": "alice",
            "userId": 42,
            "role": ["admin", "ops"],
            "exp": Utc::now().timestamp() + 3600,
        }),
    );

    let outcome = client().authenticate(&token).await;

    let AuthOutcome::Authenticated(ctx) = outcome else {
        panic!("expected an authenticated outcome");
    };
    assert_eq!(ctx.subject(), "alice");
    assert_eq!(ctx.identity().user_id(), "42");
    assert_eq!(ctx.identity().roles(), &["admin", "ops"]);
}

#[tokio::test]
async fn token_signed_with_other_key_is_bad_signature() {
    let token = sign_with(
        "some-other-secret-0123456789abcdef",
        &json!({ "sub": "alice", "exp": Utc::now().timestamp() + 3600 }),
    );

    let outcome = client().authenticate(&token).await;

    assert_eq!(
        outcome.rejection().map(authn_resolver_sdk::Rejection::kind),
        Some(RejectionKind::BadSignature)
    );
}

#[tokio::test]
async fn expiry_is_judged_against_injected_clock() {
    let token = sign_with(KEY, &json!({ "sub": "alice", "exp": 1_000 }));
    let key = VerificationKey::from_secret(KEY.as_bytes(), Algorithm::HS256, 0).unwrap();

    let before = JwtAuthNResolver::new(key.clone(), Arc::new(FixedClock::at_timestamp(999)));
    let after = JwtAuthNResolver::new(key, Arc::new(FixedClock::at_timestamp(1_001)));

    assert!(before.authenticate(&token).await.is_authenticated());
    assert_eq!(
        after
            .authenticate(&token)
            .await
            .rejection()
            .map(authn_resolver_sdk::Rejection::kind),
        Some(RejectionKind::Expired)
    );
}

#[tokio::test]
async fn adversarial_inputs_are_rejected_not_panicking() {
    let client = client();
    let inputs = [
        String::new(),
        ".".to_owned(),
        "..".to_owned(),
        "a.b.c".to_owned(),
        "\u{0}.\u{0}.\u{0}".to_owned(),
        "é.é.é".to_owned(),
        "x".repeat(64 * 1024),
        format!("{}.{}.{}", "A".repeat(100), "B".repeat(100), "C".repeat(100)),
    ];

    for input in inputs {
        let outcome = client.authenticate(&input).await;
        assert!(
            matches!(outcome, AuthOutcome::Rejected(_)),
            "input of length {} must be rejected",
            input.len()
        );
    }
}

#[tokio::test]
async fn authenticate_is_idempotent() {
    let client = client();
    let good = sign_with(KEY, &json!({ "sub": "bob", "exp": Utc::now().timestamp() + 3600 }));
    let bad = "not.a.token".to_owned();

    for token in [good, bad] {
        let first = client.authenticate(&token).await;
        let second = client.authenticate(&token).await;

        assert_eq!(first.is_authenticated(), second.is_authenticated());
        assert_eq!(
            first.rejection().map(authn_resolver_sdk::Rejection::kind),
            second.rejection().map(authn_resolver_sdk::Rejection::kind)
        );
        assert_eq!(
            first.security_context().map(|c| c.identity().clone()),
            second.security_context().map(|c| c.identity().clone())
        );
    }
}
