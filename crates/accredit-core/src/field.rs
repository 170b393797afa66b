//! BN254 scalar field element.
//!
//! Serialized as 64 lowercase hex characters (big-endian). Circuit inputs use
//! the decimal form.

use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField, Zero};
use num_bigint::BigUint;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult};

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldElement(Fr);

impl FieldElement {
    /// Width of the canonical big-endian encoding.
    pub const BYTES: usize = 32;

    pub fn zero() -> Self {
        Self(Fr::zero())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn from_u64(value: u64) -> Self {
        Self(Fr::from(value))
    }

    /// Interpret arbitrary big-endian bytes, reducing modulo the field order.
    pub fn from_be_bytes_mod_order(bytes: &[u8]) -> Self {
        Self(Fr::from_be_bytes_mod_order(bytes))
    }

    /// Parse exactly 32 big-endian bytes, rejecting values at or above the modulus.
    pub fn from_canonical_bytes(bytes: &[u8]) -> CoreResult<Self> {
        if bytes.len() != Self::BYTES {
            return Err(CoreError::InvalidFieldElement(format!(
                "expected {} bytes, got {}",
                Self::BYTES,
                bytes.len()
            )));
        }
        let element = Self::from_be_bytes_mod_order(bytes);
        if element.to_be_bytes()[..] != bytes[..] {
            return Err(CoreError::InvalidFieldElement(
                "value is not reduced modulo the field order".into(),
            ));
        }
        Ok(element)
    }

    pub fn to_be_bytes(&self) -> [u8; 32] {
        let raw = self.0.into_bigint().to_bytes_be();
        let mut out = [0u8; 32];
        let take = raw.len().min(Self::BYTES);
        out[Self::BYTES - take..].copy_from_slice(&raw[raw.len() - take..]);
        out
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_be_bytes())
    }

    /// Accepts an optional `0x` prefix and short (unpadded) input.
    pub fn from_hex(s: &str) -> CoreResult<Self> {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(trimmed)
            .map_err(|e| CoreError::InvalidFieldElement(format!("hex decode: {}", e)))?;
        if bytes.len() > Self::BYTES {
            return Err(CoreError::InvalidFieldElement(format!(
                "hex value is {} bytes, max {}",
                bytes.len(),
                Self::BYTES
            )));
        }
        let mut padded = [0u8; 32];
        padded[Self::BYTES - bytes.len()..].copy_from_slice(&bytes);
        Self::from_canonical_bytes(&padded)
    }

    pub fn to_decimal(&self) -> String {
        self.0.into_bigint().to_string()
    }

    /// Parse a canonical decimal string, rejecting values at or above the modulus.
    pub fn from_decimal(s: &str) -> CoreResult<Self> {
        // BigUint also takes a leading '+' and '_' separators
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CoreError::InvalidFieldElement(format!(
                "not a decimal integer: {:?}",
                s
            )));
        }
        let value = BigUint::from_str(s)
            .map_err(|e| CoreError::InvalidFieldElement(format!("decimal parse: {}", e)))?;
        let bigint = <Fr as PrimeField>::BigInt::try_from(value).map_err(|_| {
            CoreError::InvalidFieldElement("decimal value exceeds 256 bits".into())
        })?;
        Fr::from_bigint(bigint).map(Self).ok_or_else(|| {
            CoreError::InvalidFieldElement("value is not reduced modulo the field order".into())
        })
    }

    /// Sample a field element from 64 random bytes (negligible modular bias).
    pub fn random<R: RngCore + ?Sized>(rng: &mut R) -> Self {
        let mut wide = [0u8; 64];
        rng.fill_bytes(&mut wide);
        Self::from_be_bytes_mod_order(&wide)
    }

    pub(crate) fn from_fr(inner: Fr) -> Self {
        Self(inner)
    }

    pub(crate) fn as_fr(&self) -> Fr {
        self.0
    }
}

impl Default for FieldElement {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<u64> for FieldElement {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl fmt::Debug for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldElement({})", self.to_hex())
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for FieldElement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for FieldElement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        FieldElement::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
