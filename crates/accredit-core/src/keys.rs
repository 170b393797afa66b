//! Key material shared across issuer, holder and verifier.

use base64::Engine;
use ed25519_dalek::{Signature, Signer as _, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

use crate::error::{CoreError, CoreResult};
use crate::types::{hex_bytes, hex_vec};

// ---------------------------------------------------------------------------
// BindingPublicKey: public half of the per-credential binding keypair
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BindingPublicKey(#[serde(with = "hex_bytes")] [u8; 32]);

impl BindingPublicKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> CoreResult<Self> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| {
            CoreError::InvalidKey(format!("binding key must be 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.0)
    }

    /// Strict Ed25519 verification. Malformed keys or signatures verify false.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(&self.0) else {
            return false;
        };
        let Ok(sig) = Signature::from_slice(signature) else {
            return false;
        };
        key.verify_strict(message, &sig).is_ok()
    }
}

impl fmt::Debug for BindingPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BindingPublicKey({})", hex::encode(&self.0[..8]))
    }
}

// ---------------------------------------------------------------------------
// BindingKeypair: generated fresh per credential, owned by the holder
// ---------------------------------------------------------------------------

pub struct BindingKeypair {
    signing_key: SigningKey,
}

impl BindingKeypair {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut rand::rngs::OsRng),
        }
    }

    pub fn from_secret_bytes(secret: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(secret),
        }
    }

    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.signing_key.to_bytes())
    }

    pub fn public_key(&self) -> BindingPublicKey {
        BindingPublicKey(self.signing_key.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl Clone for BindingKeypair {
    fn clone(&self) -> Self {
        Self::from_secret_bytes(&self.secret_bytes())
    }
}

impl fmt::Debug for BindingKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingKeypair")
            .field("public_key", &self.public_key())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Issuer key material: opaque to everything but the signature suite
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerPublicKey(#[serde(with = "hex_vec")] pub Vec<u8>);

impl fmt::Debug for IssuerPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = &self.0[..self.0.len().min(8)];
        write!(f, "IssuerPublicKey({})", hex::encode(shown))
    }
}

pub struct IssuerKeyPair {
    secret: Zeroizing<Vec<u8>>,
    public: IssuerPublicKey,
}

impl IssuerKeyPair {
    pub fn new(secret: Vec<u8>, public: IssuerPublicKey) -> Self {
        Self {
            secret: Zeroizing::new(secret),
            public,
        }
    }

    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    pub fn public_key(&self) -> &IssuerPublicKey {
        &self.public
    }
}

impl fmt::Debug for IssuerKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuerKeyPair")
            .field("public", &self.public)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Issuer public key bound to a message count, as consumed by proof verification.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofPublicKey(#[serde(with = "hex_vec")] pub Vec<u8>);

impl fmt::Debug for ProofPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProofPublicKey({} bytes)", self.0.len())
    }
}

/// Signature over the full ordered message list. Held privately by the holder.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSignature(#[serde(with = "hex_vec")] pub Vec<u8>);

impl fmt::Debug for CredentialSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CredentialSignature({} bytes)", self.0.len())
    }
}
