//! Shared building blocks for the accredit credential protocol.
//!
//! Everything the other crates agree on lives here: the BN254 field element,
//! the two-to-one Poseidon hash used for commitments and tree nodes, the
//! binding keypair, attribute sets with an explicit ordering, and the
//! `SignatureSuite` seam behind which the signature scheme is swapped.

pub mod attributes;
pub mod crypto;
pub mod error;
pub mod field;
pub mod keys;
pub mod traits;
pub mod types;

pub use attributes::*;
pub use crypto::*;
pub use error::*;
pub use field::*;
pub use keys::*;
pub use traits::*;
pub use types::*;
