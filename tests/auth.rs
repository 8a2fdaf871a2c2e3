//! Auth integration tests: password hashing and JWT round trips.

use paper_exchange::api::auth::{create_token, decode_token, hash_password, verify_password};
use uuid::Uuid;

#[test]
fn hash_then_verify_roundtrip() {
    let hash = hash_password("secret123").unwrap();
    assert_ne!(hash, "secret123");
    assert!(verify_password(&hash, "secret123"));
    assert!(!verify_password(&hash, "wrong"));
}

#[test]
fn hashes_are_salted() {
    let h1 = hash_password("secret123").unwrap();
    let h2 = hash_password("secret123").unwrap();
    assert_ne!(h1, h2);
}

#[test]
fn verify_rejects_malformed_hash() {
    assert!(!verify_password("not-a-phc-string", "secret123"));
}

#[test]
fn token_roundtrip_carries_user_id() {
    let secret = b"test-jwt-secret";
    let user_id = Uuid::new_v4();
    let token = create_token(secret, user_id).unwrap();

    let claims = decode_token(secret, &token).unwrap();
    assert_eq!(claims.sub, user_id.to_string());
    assert!(claims.exp > claims.iat);
}

#[test]
fn token_rejected_with_wrong_secret() {
    let token = create_token(b"secret-a", Uuid::new_v4()).unwrap();
    assert!(decode_token(b"secret-b", &token).is_err());
}

#[test]
fn garbage_token_rejected() {
    assert!(decode_token(b"secret", "not.a.token").is_err());
}
