//! In-process signature suite built from salted message digests and Ed25519.
//!
//! Signing: every message `i` gets a fresh 32-byte salt and digest
//! `SHA-256(domain || i || salt || len || message)`; the issuer signs the hash
//! of the digest list. The signature carries the salts, so the holder can later
//! open any subset.
//!
//! A proof opens revealed messages with their salts at fixed positions,
//! replaces hidden messages by their digests, and appends a tag over the
//! signed payload and the holder-chosen nonce. Any change to a revealed or
//! hidden message, to which positions are revealed, or to the message count
//! makes verification fail.
//!
//! The tag is an unkeyed SHA-256 over public proof bytes. It detects a nonce
//! edited in transit but anyone holding a transcript can recompute it for
//! another nonce, so it gives no replay protection. Freshness comes from the
//! challenge exchange. The construction is also not unlinkable: hidden
//! digests and the issuer signature repeat across proofs from one credential.
//! A pairing-based BBS+ suite removes both limits.
//!
//! Layouts (all integers big-endian):
//! - signature: `count:u32 | salt[count] | ed25519_sig[64]`
//! - proof key: `issuer_pk[32] | count:u32`
//! - proof: `count:u32 | (kind:u8 | 32 bytes)[count] | ed25519_sig[64] | tag[32]`

use accredit_core::{
    CoreError, CoreResult, CredentialSignature, IssuerKeyPair, IssuerPublicKey, ProofMessage,
    ProofPublicKey, SignatureSuite,
};
use ed25519_dalek::{Signature, Signer as _, SigningKey, VerifyingKey};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

const MESSAGE_DOMAIN: &[u8] = b"accredit-digest-suite/v1/message";
const PAYLOAD_DOMAIN: &[u8] = b"accredit-digest-suite/v1/payload";
const TAG_DOMAIN: &[u8] = b"accredit-digest-suite/v1/proof-tag";

const SALT_LEN: usize = 32;
const DIGEST_LEN: usize = 32;
const SIG_LEN: usize = 64;
const KEY_LEN: usize = 32;

const KIND_HIDDEN: u8 = 0;
const KIND_REVEALED: u8 = 1;

type Digest32 = [u8; DIGEST_LEN];

#[derive(Debug, Clone, Copy, Default)]
pub struct DigestSuite;

impl DigestSuite {
    pub fn new() -> Self {
        Self
    }
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

fn message_digest(index: usize, salt: &[u8], message: &[u8]) -> Digest32 {
    let mut hasher = Sha256::new();
    hasher.update(MESSAGE_DOMAIN);
    hasher.update((index as u32).to_be_bytes());
    hasher.update(salt);
    hasher.update((message.len() as u64).to_be_bytes());
    hasher.update(message);
    hasher.finalize().into()
}

fn payload_hash(digests: &[Digest32]) -> Digest32 {
    let mut hasher = Sha256::new();
    hasher.update(PAYLOAD_DOMAIN);
    hasher.update((digests.len() as u32).to_be_bytes());
    for digest in digests {
        hasher.update(digest);
    }
    hasher.finalize().into()
}

fn proof_tag(payload: &Digest32, signature: &[u8], nonce: &[u8]) -> Digest32 {
    let mut hasher = Sha256::new();
    hasher.update(TAG_DOMAIN);
    hasher.update(payload);
    hasher.update(signature);
    hasher.update((nonce.len() as u64).to_be_bytes());
    hasher.update(nonce);
    hasher.finalize().into()
}

// ---------------------------------------------------------------------------
// Byte layouts
// ---------------------------------------------------------------------------

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(n)?;
        let slice = self.bytes.get(self.pos..end)?;
        self.pos = end;
        Some(slice)
    }

    fn read_u32(&mut self) -> Option<usize> {
        let raw: [u8; 4] = self.take(4)?.try_into().ok()?;
        Some(u32::from_be_bytes(raw) as usize)
    }

    fn finished(&self) -> bool {
        self.pos == self.bytes.len()
    }
}

struct ParsedSignature<'a> {
    salts: Vec<&'a [u8]>,
    sig: &'a [u8],
}

fn parse_signature(bytes: &[u8]) -> Option<ParsedSignature<'_>> {
    let mut reader = Reader::new(bytes);
    let count = reader.read_u32()?;
    let mut salts = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        salts.push(reader.take(SALT_LEN)?);
    }
    let sig = reader.take(SIG_LEN)?;
    reader.finished().then_some(ParsedSignature { salts, sig })
}

fn parse_proof_key(key: &ProofPublicKey) -> Option<(VerifyingKey, usize)> {
    let mut reader = Reader::new(&key.0);
    let pk: [u8; KEY_LEN] = reader.take(KEY_LEN)?.try_into().ok()?;
    let count = reader.read_u32()?;
    if !reader.finished() {
        return None;
    }
    Some((VerifyingKey::from_bytes(&pk).ok()?, count))
}

fn verifying_key(public_key: &IssuerPublicKey) -> Option<VerifyingKey> {
    let pk: [u8; KEY_LEN] = public_key.0.as_slice().try_into().ok()?;
    VerifyingKey::from_bytes(&pk).ok()
}

fn check_signature(key: &VerifyingKey, payload: &Digest32, sig: &[u8]) -> bool {
    match Signature::from_slice(sig) {
        Ok(signature) => key.verify_strict(payload, &signature).is_ok(),
        Err(_) => false,
    }
}

// ---------------------------------------------------------------------------
// SignatureSuite
// ---------------------------------------------------------------------------

impl SignatureSuite for DigestSuite {
    fn name(&self) -> &'static str {
        "digest-ed25519-v1"
    }

    fn generate_issuer_keys(&self) -> CoreResult<IssuerKeyPair> {
        let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
        let public = IssuerPublicKey(signing_key.verifying_key().to_bytes().to_vec());
        Ok(IssuerKeyPair::new(signing_key.to_bytes().to_vec(), public))
    }

    fn sign(
        &self,
        keys: &IssuerKeyPair,
        messages: &[Vec<u8>],
    ) -> CoreResult<CredentialSignature> {
        let secret: Zeroizing<[u8; KEY_LEN]> = Zeroizing::new(
            keys.secret()
                .try_into()
                .map_err(|_| CoreError::InvalidKey("issuer secret must be 32 bytes".into()))?,
        );
        let signing_key = SigningKey::from_bytes(&secret);

        let mut out = Vec::with_capacity(4 + messages.len() * SALT_LEN + SIG_LEN);
        out.extend_from_slice(&(messages.len() as u32).to_be_bytes());
        let mut digests = Vec::with_capacity(messages.len());
        for (index, message) in messages.iter().enumerate() {
            let mut salt = [0u8; SALT_LEN];
            rand::rngs::OsRng.fill_bytes(&mut salt);
            digests.push(message_digest(index, &salt, message));
            out.extend_from_slice(&salt);
        }
        let payload = payload_hash(&digests);
        out.extend_from_slice(&signing_key.sign(&payload).to_bytes());
        Ok(CredentialSignature(out))
    }

    fn verify(
        &self,
        public_key: &IssuerPublicKey,
        messages: &[Vec<u8>],
        signature: &CredentialSignature,
    ) -> bool {
        let (Some(key), Some(parsed)) = (verifying_key(public_key), parse_signature(&signature.0))
        else {
            return false;
        };
        if parsed.salts.len() != messages.len() {
            return false;
        }
        let digests: Vec<Digest32> = messages
            .iter()
            .zip(&parsed.salts)
            .enumerate()
            .map(|(index, (message, salt))| message_digest(index, salt, message))
            .collect();
        check_signature(&key, &payload_hash(&digests), parsed.sig)
    }

    fn proof_public_key(
        &self,
        public_key: &IssuerPublicKey,
        message_count: usize,
    ) -> CoreResult<ProofPublicKey> {
        if verifying_key(public_key).is_none() {
            return Err(CoreError::InvalidKey("issuer public key is not an Ed25519 point".into()));
        }
        let count = u32::try_from(message_count)
            .map_err(|_| CoreError::Suite("message count too large".into()))?;
        let mut bytes = public_key.0.clone();
        bytes.extend_from_slice(&count.to_be_bytes());
        Ok(ProofPublicKey(bytes))
    }

    fn create_proof(
        &self,
        signature: &CredentialSignature,
        proof_key: &ProofPublicKey,
        messages: &[ProofMessage],
        nonce: &[u8],
    ) -> CoreResult<Vec<u8>> {
        let parsed = parse_signature(&signature.0)
            .ok_or_else(|| CoreError::Suite("malformed signature".into()))?;
        let (_, key_count) = parse_proof_key(proof_key)
            .ok_or_else(|| CoreError::Suite("malformed proof key".into()))?;
        if parsed.salts.len() != messages.len() || key_count != messages.len() {
            return Err(CoreError::Suite("message count mismatch".into()));
        }

        let mut digests = Vec::with_capacity(messages.len());
        let mut proof = Vec::with_capacity(4 + messages.len() * 33 + SIG_LEN + DIGEST_LEN);
        proof.extend_from_slice(&(messages.len() as u32).to_be_bytes());
        for (index, (message, salt)) in messages.iter().zip(&parsed.salts).enumerate() {
            let digest = message_digest(index, salt, message.bytes());
            digests.push(digest);
            match message {
                ProofMessage::Revealed(_) => {
                    proof.push(KIND_REVEALED);
                    proof.extend_from_slice(salt);
                }
                ProofMessage::Hidden(_) => {
                    proof.push(KIND_HIDDEN);
                    proof.extend_from_slice(&digest);
                }
            }
        }
        let payload = payload_hash(&digests);
        proof.extend_from_slice(parsed.sig);
        proof.extend_from_slice(&proof_tag(&payload, parsed.sig, nonce));
        Ok(proof)
    }

    fn verify_proof(
        &self,
        proof: &[u8],
        proof_key: &ProofPublicKey,
        revealed: &[(usize, Vec<u8>)],
        nonce: &[u8],
        message_count: usize,
    ) -> bool {
        let Some((key, key_count)) = parse_proof_key(proof_key) else {
            return false;
        };
        if key_count != message_count {
            return false;
        }

        let mut reader = Reader::new(proof);
        let Some(count) = reader.read_u32() else {
            return false;
        };
        if count != message_count {
            return false;
        }

        let mut revealed_iter = revealed.iter();
        let mut digests = Vec::with_capacity(count);
        for index in 0..count {
            let (Some(kind), Some(body)) = (reader.take(1), reader.take(DIGEST_LEN)) else {
                return false;
            };
            let digest = match kind[0] {
                KIND_REVEALED => match revealed_iter.next() {
                    Some((position, message)) if *position == index => {
                        message_digest(index, body, message)
                    }
                    _ => return false,
                },
                KIND_HIDDEN => match <Digest32>::try_from(body) {
                    Ok(d) => d,
                    Err(_) => return false,
                },
                _ => return false,
            };
            digests.push(digest);
        }
        if revealed_iter.next().is_some() {
            return false;
        }

        let (Some(sig), Some(tag)) = (reader.take(SIG_LEN), reader.take(DIGEST_LEN)) else {
            return false;
        };
        if !reader.finished() {
            return false;
        }

        let payload = payload_hash(&digests);
        let expected_tag = proof_tag(&payload, sig, nonce);
        let tag_ok: bool = expected_tag[..].ct_eq(tag).into();
        tag_ok && check_signature(&key, &payload, sig)
    }
}
