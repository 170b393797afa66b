//! Published `(root, epoch)` records.
//!
//! Readers always observe a root together with the epoch it was published
//! under. Writers replace both in one step.

use accredit_core::{Epoch, FieldElement};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::{TreeError, TreeResult};
use crate::tree::AccreditationTree;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedRoot {
    pub root: FieldElement,
    pub epoch: Epoch,
}

// ---------------------------------------------------------------------------
// RootSource: read side used by verifiers
// ---------------------------------------------------------------------------

pub trait RootSource: Send + Sync {
    /// The currently published root, or `None` if nothing has been published.
    fn current_root(&self) -> TreeResult<Option<PublishedRoot>>;
}

// ---------------------------------------------------------------------------
// RootRegistry: in-process publisher
// ---------------------------------------------------------------------------

pub struct RootRegistry {
    current: RwLock<Option<PublishedRoot>>,
}

impl RootRegistry {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
        }
    }

    pub fn with_published(published: PublishedRoot) -> Self {
        Self {
            current: RwLock::new(Some(published)),
        }
    }

    /// Publish `root`, bumping the epoch. Republishing the current root is a
    /// no-op and returns the existing record.
    pub fn publish(&self, root: FieldElement) -> TreeResult<PublishedRoot> {
        let mut guard = self
            .current
            .write()
            .map_err(|e| TreeError::LockPoisoned(e.to_string()))?;
        let next = match *guard {
            Some(existing) if existing.root == root => return Ok(existing),
            Some(existing) => PublishedRoot {
                root,
                epoch: existing.epoch.next(),
            },
            None => PublishedRoot {
                root,
                epoch: Epoch::initial(),
            },
        };
        *guard = Some(next);
        tracing::info!(root = %next.root, epoch = %next.epoch, "accreditation root published");
        Ok(next)
    }

    pub fn publish_tree(&self, tree: &AccreditationTree) -> TreeResult<PublishedRoot> {
        self.publish(tree.root())
    }

    pub fn current(&self) -> TreeResult<Option<PublishedRoot>> {
        let guard = self
            .current
            .read()
            .map_err(|e| TreeError::LockPoisoned(e.to_string()))?;
        Ok(*guard)
    }
}

impl Default for RootRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RootSource for RootRegistry {
    fn current_root(&self) -> TreeResult<Option<PublishedRoot>> {
        self.current()
    }
}

// ---------------------------------------------------------------------------
// FileRootSource: `merkle_root.json` under the data directory
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct RootRecord {
    root_hex: String,
    epoch: u64,
}

pub struct FileRootSource {
    path: PathBuf,
}

impl FileRootSource {
    pub const FILE_NAME: &'static str = "merkle_root.json";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(Self::FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the record. A missing file means nothing has been published.
    pub fn load(&self) -> TreeResult<Option<PublishedRoot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)?;
        let record: RootRecord = serde_json::from_str(&contents)?;
        let root = FieldElement::from_hex(&record.root_hex)?;
        Ok(Some(PublishedRoot {
            root,
            epoch: Epoch(record.epoch),
        }))
    }

    /// Write via a sibling temp file and rename, so readers never see a torn record.
    pub fn store(&self, published: &PublishedRoot) -> TreeResult<()> {
        let record = RootRecord {
            root_hex: published.root.to_hex(),
            epoch: published.epoch.0,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(&record)?)?;
        std::fs::rename(&tmp, &self.path)?;
        tracing::debug!(path = %self.path.display(), epoch = published.epoch.0, "root record written");
        Ok(())
    }
}

impl RootSource for FileRootSource {
    fn current_root(&self) -> TreeResult<Option<PublishedRoot>> {
        self.load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let nonce: u64 = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos() as u64;
        std::env::temp_dir().join(format!("accredit-tree-{}-{}-{}", tag, std::process::id(), nonce))
    }

    #[test]
    fn test_registry_starts_empty() {
        let registry = RootRegistry::new();
        assert!(registry.current().unwrap().is_none());
    }

    #[test]
    fn test_publish_bumps_epoch_on_change() {
        let registry = RootRegistry::new();
        let first = registry.publish(FieldElement::from_u64(1)).unwrap();
        assert_eq!(first.epoch, Epoch::initial());
        let second = registry.publish(FieldElement::from_u64(2)).unwrap();
        assert_eq!(second.epoch, Epoch(2));
        assert_eq!(registry.current_root().unwrap(), Some(second));
    }

    #[test]
    fn test_republish_same_root_keeps_epoch() {
        let registry = RootRegistry::new();
        let first = registry.publish(FieldElement::from_u64(7)).unwrap();
        let again = registry.publish(FieldElement::from_u64(7)).unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn test_publish_tree_uses_tree_root() {
        let tree = AccreditationTree::build(&[FieldElement::from_u64(3)], 2).unwrap();
        let registry = RootRegistry::default();
        let published = registry.publish_tree(&tree).unwrap();
        assert_eq!(published.root, tree.root());
    }

    #[test]
    fn test_file_source_missing_file_is_none() {
        let source = FileRootSource::in_dir(&temp_dir("missing"));
        assert!(source.current_root().unwrap().is_none());
    }

    #[test]
    fn test_file_source_store_then_load() {
        let dir = temp_dir("store");
        let source = FileRootSource::in_dir(&dir);
        let published = PublishedRoot {
            root: FieldElement::from_u64(99),
            epoch: Epoch(4),
        };
        source.store(&published).unwrap();
        assert_eq!(source.load().unwrap(), Some(published));

        let raw = std::fs::read_to_string(source.path()).unwrap();
        assert!(raw.contains("root_hex"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_file_source_rejects_bad_hex() {
        let dir = temp_dir("bad");
        std::fs::create_dir_all(&dir).unwrap();
        let source = FileRootSource::in_dir(&dir);
        std::fs::write(source.path(), r#"{"root_hex":"zz","epoch":1}"#).unwrap();
        assert!(matches!(source.load(), Err(TreeError::Hash(_))));
        std::fs::remove_dir_all(&dir).ok();
    }
}
