use accredit_core::{AccountKey, ProofPublicKey, Pseudonym, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::{VerifyError, VerifyResult};

/// Per-holder record keyed by the SHA-256 of the binding key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub account_key: AccountKey,
    pub pseudonym: Pseudonym,
    pub issuer_proof_key: ProofPublicKey,
    pub accreditation_root_hex: String,
    pub created_at: Timestamp,
    pub last_seen: Timestamp,
}

pub trait AccountStore: Send + Sync {
    /// Insert `record`, or refresh an existing one. `created_at` of an
    /// existing record is kept; everything else is overwritten.
    fn upsert(&self, record: AccountRecord) -> VerifyResult<AccountRecord>;

    fn get(&self, key: &AccountKey) -> VerifyResult<Option<AccountRecord>>;
}

#[derive(Default)]
pub struct InMemoryAccountStore {
    records: Mutex<HashMap<String, AccountRecord>>,
}

fn lock_records(
    mutex: &Mutex<HashMap<String, AccountRecord>>,
) -> VerifyResult<MutexGuard<'_, HashMap<String, AccountRecord>>> {
    mutex
        .lock()
        .map_err(|e| VerifyError::Infrastructure(format!("account store lock poisoned: {e}")))
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> VerifyResult<usize> {
        Ok(lock_records(&self.records)?.len())
    }

    pub fn is_empty(&self) -> VerifyResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl AccountStore for InMemoryAccountStore {
    fn upsert(&self, mut record: AccountRecord) -> VerifyResult<AccountRecord> {
        let mut records = lock_records(&self.records)?;
        if let Some(existing) = records.get(record.account_key.as_str()) {
            record.created_at = existing.created_at;
        }
        records.insert(record.account_key.as_str().to_string(), record.clone());
        Ok(record)
    }

    fn get(&self, key: &AccountKey) -> VerifyResult<Option<AccountRecord>> {
        Ok(lock_records(&self.records)?.get(key.as_str()).cloned())
    }
}
