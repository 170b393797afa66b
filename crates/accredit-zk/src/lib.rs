//! Eligibility proof adapter.
//!
//! Turns holder state into the fixed-schema circuit-input document and hands
//! it to an [`EligibilityBackend`]. The commitment and membership path are
//! always recomputed here from the serial, issuer id and leaf set; a path
//! supplied from elsewhere is never trusted.
//!
//! Backends:
//! - [`SnarkjsBackend`] drives the external circom/snarkjs toolchain, with a
//!   memoized, artifact-aware preparation step.
//! - [`NativeEligibilityBackend`] evaluates the predicate in-process and
//!   authenticates its public signals with a verifier-held HMAC key.
//!
//! Backend calls block, so async callers go through [`ProofWorkerPool`].

pub mod backend;
pub mod error;
pub mod inputs;
pub mod native;
pub mod pool;
pub mod snarkjs;

pub use backend::{
    DateSignals, EligibilityBackend, FileVerificationKey, ProofBundle, PublicSignalLayout, VerificationKeySource,
};
pub use error::{ZkError, ZkResult};
pub use inputs::{
    build_circuit_inputs, nationality_code, CircuitInputs, EligibilityAttributes, MerkleWitness,
    NATIONALITY_CODES,
};
pub use native::{NativeEligibilityBackend, DEFAULT_MIN_AGE};
pub use pool::{PoolConfig, ProofWorkerPool};
pub use snarkjs::{CommandOutput, CommandRunner, SnarkjsBackend, SnarkjsConfig, SystemRunner};
