//! On-disk state under the data directory.
//!
//! - `issuer_key.json`: issuer key material, hex encoded
//! - `eligibility.key`: 32-byte HMAC key of the native eligibility backend, hex
//! - `tree.json`: accreditation tree snapshot (depth plus leaves)
//! - `merkle_root.json`: published `(root, epoch)`, owned by `FileRootSource`

use accredit_core::{IssuerKeyPair, IssuerPublicKey, SignatureSuite};
use accredit_tree::{AccreditationTree, FileRootSource, PublishedRoot, RootRegistry};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RootError, RootResult};

pub const ISSUER_KEY_FILE: &str = "issuer_key.json";
pub const ELIGIBILITY_KEY_FILE: &str = "eligibility.key";
pub const TREE_FILE: &str = "tree.json";

#[derive(Serialize, Deserialize)]
struct IssuerKeyRecord {
    suite: String,
    secret_hex: String,
    public_hex: String,
}

/// Load the issuer keys from `dir`, generating and saving them on first use.
/// A key file written for another signature suite is rejected.
pub fn load_or_create_issuer_keys(
    dir: &Path,
    suite: &dyn SignatureSuite,
) -> RootResult<IssuerKeyPair> {
    let path = dir.join(ISSUER_KEY_FILE);
    if path.exists() {
        let record: IssuerKeyRecord = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        if record.suite != suite.name() {
            return Err(RootError::KeyFile(format!(
                "{} holds keys for suite '{}', expected '{}'",
                path.display(),
                record.suite,
                suite.name()
            )));
        }
        let secret = decode_hex(&path, &record.secret_hex)?;
        let public = decode_hex(&path, &record.public_hex)?;
        return Ok(IssuerKeyPair::new(secret, IssuerPublicKey(public)));
    }

    let keys = suite.generate_issuer_keys()?;
    let record = IssuerKeyRecord {
        suite: suite.name().to_string(),
        secret_hex: hex::encode(keys.secret()),
        public_hex: hex::encode(&keys.public_key().0),
    };
    write_atomic(&path, serde_json::to_string_pretty(&record)?.as_bytes())?;
    tracing::info!(path = %path.display(), suite = suite.name(), "issuer keys generated");
    Ok(keys)
}

pub fn load_or_create_eligibility_key(dir: &Path) -> RootResult<[u8; 32]> {
    let path = dir.join(ELIGIBILITY_KEY_FILE);
    if path.exists() {
        let bytes = decode_hex(&path, std::fs::read_to_string(&path)?.trim())?;
        return bytes.try_into().map_err(|_| {
            RootError::KeyFile(format!("{} must hold 32 bytes", path.display()))
        });
    }

    let mut key = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut key);
    write_atomic(&path, hex::encode(key).as_bytes())?;
    tracing::info!(path = %path.display(), "eligibility key generated");
    Ok(key)
}

/// Load the tree snapshot, or an empty tree of `depth` when none exists.
/// A stored tree of a different depth is an error, not a silent reset.
pub fn load_tree(dir: &Path, depth: usize) -> RootResult<AccreditationTree> {
    let path = dir.join(TREE_FILE);
    if !path.exists() {
        return Ok(AccreditationTree::new(depth)?);
    }
    let tree: AccreditationTree = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    if tree.depth() != depth {
        return Err(RootError::Config(format!(
            "{} has depth {}, configured depth is {}",
            path.display(),
            tree.depth(),
            depth
        )));
    }
    Ok(tree)
}

pub fn save_tree(dir: &Path, tree: &AccreditationTree) -> RootResult<()> {
    let path = dir.join(TREE_FILE);
    write_atomic(&path, serde_json::to_string(tree)?.as_bytes())?;
    tracing::debug!(path = %path.display(), occupied = tree.occupied(), "tree snapshot written");
    Ok(())
}

/// Publish the tree's root to the root file. The epoch advances only when
/// the root differs from the published one.
pub fn publish_tree_root(roots: &FileRootSource, tree: &AccreditationTree) -> RootResult<PublishedRoot> {
    let registry = match roots.load()? {
        Some(published) => RootRegistry::with_published(published),
        None => RootRegistry::new(),
    };
    let published = registry.publish_tree(tree)?;
    roots.store(&published)?;
    Ok(published)
}

fn decode_hex(path: &Path, value: &str) -> RootResult<Vec<u8>> {
    hex::decode(value)
        .map_err(|e| RootError::KeyFile(format!("{}: invalid hex: {}", path.display(), e)))
}

fn write_atomic(path: &Path, contents: &[u8]) -> RootResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp: PathBuf = path.with_extension("tmp");
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
