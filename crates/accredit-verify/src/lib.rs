//! Verifier orchestrator.
//!
//! [`Verifier::verify`] runs five checks in order and stops at the first
//! failure:
//!
//! 1. freshness of the claimed `(root, epoch)`
//! 2. challenge-response with the revealed binding key
//! 3. the selective disclosure proof against the trusted issuer key
//! 4. the eligibility proof and its binding to the commitment and root
//! 5. pseudonym derivation and account upsert
//!
//! Each failure class has its own reason code; see [`VerifyError`].

pub mod account;
pub mod error;
pub mod orchestrator;
pub mod request;

pub use account::{AccountRecord, AccountStore, InMemoryAccountStore};
pub use error::{ProofKind, StatusClass, VerifyError, VerifyResult};
pub use orchestrator::{
    VerificationOutcome, Verifier, VerifierConfig, DEFAULT_DATE_TOLERANCE_DAYS, DEFAULT_DOMAIN_TAG,
};
pub use request::{DecodedRequest, VerificationRequest};
