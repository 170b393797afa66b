use accredit_core::{FieldElement, PairHasher};
use serde::{Deserialize, Serialize};

use crate::error::{TreeError, TreeResult};

/// Membership path for one leaf: sibling hashes from the leaf level upward,
/// with direction bits. Bit 0 means the current node is the left child (the
/// sibling is on the right); bit 1 the reverse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipPath {
    pub siblings: Vec<FieldElement>,
    pub directions: Vec<u8>,
}

impl MembershipPath {
    pub fn depth(&self) -> usize {
        self.siblings.len()
    }

    /// Leaf index encoded by the direction bits (least significant first).
    pub fn leaf_index(&self) -> usize {
        self.directions
            .iter()
            .enumerate()
            .fold(0usize, |acc, (level, bit)| acc | (usize::from(*bit & 1) << level))
    }

    /// Fold `leaf` upward through the path.
    pub fn compute_root(&self, leaf: &FieldElement) -> TreeResult<FieldElement> {
        if self.siblings.len() != self.directions.len() {
            return Err(TreeError::MalformedPath(format!(
                "{} siblings but {} direction bits",
                self.siblings.len(),
                self.directions.len()
            )));
        }
        let mut hasher = PairHasher::new()?;
        let mut current = *leaf;
        for (sibling, bit) in self.siblings.iter().zip(&self.directions) {
            current = match bit {
                0 => hasher.hash(&current, sibling)?,
                1 => hasher.hash(sibling, &current)?,
                other => {
                    return Err(TreeError::MalformedPath(format!(
                        "direction bit must be 0 or 1, got {}",
                        other
                    )))
                }
            };
        }
        Ok(current)
    }

    /// True iff `leaf` folds to `root`. Malformed paths verify false.
    pub fn verify(&self, leaf: &FieldElement, root: &FieldElement) -> bool {
        matches!(self.compute_root(leaf), Ok(computed) if computed == *root)
    }
}
