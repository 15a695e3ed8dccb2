use chronoframe_api::auth::SessionClaims;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

/// Session secret used by every test app.
pub const TEST_SESSION_SECRET: &str = "test-session-secret-at-least-32-characters";

/// `Cookie` header value carrying a valid session for `user_id`.
pub fn session_cookie(user_id: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = SessionClaims {
        sub: user_id.to_string(),
        name: "tester".to_string(),
        iat: now as usize,
        exp: (now + 3600) as usize,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(TEST_SESSION_SECRET.as_bytes()),
    )
    .expect("Failed to sign test session");

    format!("chronoframe-session={}", token)
}
