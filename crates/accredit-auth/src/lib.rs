//! Challenge-response authentication.
//!
//! A challenge is issued to a binding public key, answered with a signature
//! over its random bytes, and consumed at most once. States:
//! `Issued -> Consumed` or `Issued -> Expired`, both terminal.

pub mod authenticator;
pub mod error;
pub mod store;
pub mod types;

pub use authenticator::{ChallengeAuthenticator, DEFAULT_CHALLENGE_TTL_SECS};
pub use error::{AuthError, AuthResult};
pub use store::{ChallengeLimits, ChallengeStore, InMemoryChallengeStore};
pub use types::{Challenge, ChallengeStatus};
