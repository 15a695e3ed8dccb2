pub mod session;

pub use session::{SessionClaims, SessionVerifier};
