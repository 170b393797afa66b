//! Accreditation tree.
//!
//! A fixed-depth binary Merkle tree over credential commitments. Nodes live in
//! a flat heap-ordered arena (root at index 1, leaf `i` at `capacity + i`), so
//! a leaf mutation rehashes only its `depth` ancestors. The registry publishes
//! `(root, epoch)` pairs atomically for verifiers.

pub mod error;
pub mod proof;
pub mod registry;
pub mod tree;

pub use error::{TreeError, TreeResult};
pub use proof::MembershipPath;
pub use registry::{FileRootSource, PublishedRoot, RootRegistry, RootSource};
pub use tree::{empty_leaf, AccreditationTree, DEFAULT_DEPTH, MAX_DEPTH};
