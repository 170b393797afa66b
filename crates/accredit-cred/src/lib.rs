//! Credential issuance and selective disclosure.
//!
//! The issuer samples a serial, commits to it, places the commitment in the
//! accreditation tree and signs the ordered message list
//! `[attributes in ordering..., binding key, commitment]`. The prover
//! re-derives that exact list, classifies each message as revealed or hidden
//! and asks the signature suite for a nonce-bound disclosure proof.
//!
//! The signature scheme itself sits behind `accredit_core::SignatureSuite`;
//! [`DigestSuite`] is the in-process implementation shipped here.

pub mod disclosure;
pub mod error;
pub mod issuance;
pub mod messages;
pub mod suite;
pub mod types;

pub use disclosure::{DisclosureInput, DisclosureProver};
pub use error::{CredError, CredResult};
pub use issuance::{sample_serial, verify_credential, IssuanceConfig, Issuer};
pub use messages::{credential_messages, message_count, message_names};
pub use suite::DigestSuite;
pub use types::*;
