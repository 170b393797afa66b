use accredit_core::{FieldElement, PairHasher};
use serde::{Deserialize, Serialize};

use crate::error::{TreeError, TreeResult};
use crate::proof::MembershipPath;

pub const DEFAULT_DEPTH: usize = 8;
/// The arena is dense (`2^(depth+1)` nodes), so depth is capped.
pub const MAX_DEPTH: usize = 20;

/// Fixed-depth Merkle tree over commitment leaves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TreeSnapshot", into = "TreeSnapshot")]
pub struct AccreditationTree {
    depth: usize,
    /// Heap layout: `nodes[1]` is the root, leaf `i` sits at `capacity + i`.
    nodes: Vec<FieldElement>,
}

/// Wire form of a tree: depth plus the full leaf array.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TreeSnapshot {
    depth: usize,
    leaves: Vec<FieldElement>,
}

impl TryFrom<TreeSnapshot> for AccreditationTree {
    type Error = TreeError;

    fn try_from(snapshot: TreeSnapshot) -> TreeResult<Self> {
        AccreditationTree::build(&snapshot.leaves, snapshot.depth)
    }
}

impl From<AccreditationTree> for TreeSnapshot {
    fn from(tree: AccreditationTree) -> Self {
        TreeSnapshot {
            depth: tree.depth,
            leaves: tree.leaves().to_vec(),
        }
    }
}

impl AccreditationTree {
    /// An all-EMPTY tree of the given depth.
    pub fn new(depth: usize) -> TreeResult<Self> {
        Self::build(&[], depth)
    }

    /// Build from leaves placed at indices `0..leaves.len()`; remaining slots are EMPTY.
    pub fn build(leaves: &[FieldElement], depth: usize) -> TreeResult<Self> {
        if depth == 0 || depth > MAX_DEPTH {
            return Err(TreeError::InvalidDepth {
                depth,
                max: MAX_DEPTH,
            });
        }
        let capacity = 1usize << depth;
        if leaves.len() > capacity {
            return Err(TreeError::CapacityExceeded {
                leaves: leaves.len(),
                capacity,
            });
        }

        let mut nodes = vec![empty_leaf(); 2 * capacity];
        nodes[capacity..capacity + leaves.len()].copy_from_slice(leaves);

        let mut tree = Self { depth, nodes };
        tree.rebuild()?;
        Ok(tree)
    }

    /// Recompute every internal node. Subtrees that are entirely EMPTY reuse
    /// a precomputed per-height hash instead of rehashing.
    fn rebuild(&mut self) -> TreeResult<()> {
        let mut hasher = PairHasher::new()?;
        let empty = empty_subtree_roots(&mut hasher, self.depth)?;
        let capacity = self.capacity();

        for index in (1..capacity).rev() {
            let height = self.height_of(index);
            let left = self.nodes[2 * index];
            let right = self.nodes[2 * index + 1];
            let child_empty = empty[height - 1];
            self.nodes[index] = if left == child_empty && right == child_empty {
                empty[height]
            } else {
                hasher.hash(&left, &right)?
            };
        }
        Ok(())
    }

    fn height_of(&self, index: usize) -> usize {
        let level = (usize::BITS - 1 - index.leading_zeros()) as usize;
        self.depth - level
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn capacity(&self) -> usize {
        1usize << self.depth
    }

    pub fn root(&self) -> FieldElement {
        self.nodes[1]
    }

    pub fn leaves(&self) -> &[FieldElement] {
        &self.nodes[self.capacity()..]
    }

    pub fn leaf(&self, index: usize) -> TreeResult<FieldElement> {
        self.check_index(index)?;
        Ok(self.nodes[self.capacity() + index])
    }

    /// Number of non-EMPTY leaves.
    pub fn occupied(&self) -> usize {
        self.leaves().iter().filter(|l| **l != empty_leaf()).count()
    }

    /// Index of the first leaf equal to `value`.
    pub fn position(&self, value: &FieldElement) -> Option<usize> {
        self.leaves().iter().position(|l| l == value)
    }

    pub fn insert_at(&mut self, index: usize, value: FieldElement) -> TreeResult<()> {
        self.check_index(index)?;
        let mut hasher = PairHasher::new()?;
        let mut node = self.capacity() + index;
        self.nodes[node] = value;
        while node > 1 {
            node /= 2;
            self.nodes[node] = hasher.hash(&self.nodes[2 * node], &self.nodes[2 * node + 1])?;
        }
        Ok(())
    }

    pub fn remove_at(&mut self, index: usize) -> TreeResult<()> {
        self.insert_at(index, empty_leaf())
    }

    /// Place `value` in the first EMPTY slot and return its index.
    pub fn insert(&mut self, value: FieldElement) -> TreeResult<usize> {
        let index = self
            .position(&empty_leaf())
            .ok_or(TreeError::TreeFull)?;
        self.insert_at(index, value)?;
        Ok(index)
    }

    /// Sibling hashes and direction bits from leaf `index` up to the root.
    pub fn proof(&self, index: usize) -> TreeResult<MembershipPath> {
        self.check_index(index)?;
        let mut siblings = Vec::with_capacity(self.depth);
        let mut directions = Vec::with_capacity(self.depth);
        let mut node = self.capacity() + index;
        while node > 1 {
            siblings.push(self.nodes[node ^ 1]);
            directions.push((node & 1) as u8);
            node /= 2;
        }
        Ok(MembershipPath {
            siblings,
            directions,
        })
    }

    fn check_index(&self, index: usize) -> TreeResult<()> {
        if index >= self.capacity() {
            return Err(TreeError::IndexOutOfRange {
                index,
                capacity: self.capacity(),
            });
        }
        Ok(())
    }
}

/// Sentinel stored in unused leaf slots (field zero).
pub fn empty_leaf() -> FieldElement {
    FieldElement::zero()
}

/// `empty[h]` is the root of an all-EMPTY subtree of height `h`.
fn empty_subtree_roots(hasher: &mut PairHasher, depth: usize) -> TreeResult<Vec<FieldElement>> {
    let mut roots = Vec::with_capacity(depth + 1);
    roots.push(empty_leaf());
    for h in 0..depth {
        let below = roots[h];
        roots.push(hasher.hash(&below, &below)?);
    }
    Ok(roots)
}
