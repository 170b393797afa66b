//! Attribute sets with an explicit, persisted ordering.
//!
//! The ordering list is the only source of message order at issuance,
//! disclosure and verification. It is stored next to the credential and is
//! never re-derived from map iteration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{CoreError, CoreResult};

/// Message name of the binding public key in the signed list.
pub const BINDING_KEY_FIELD: &str = "pk_bind";
/// Message name of the commitment in the signed list.
pub const COMMITMENT_FIELD: &str = "commitment";

pub fn is_reserved_name(name: &str) -> bool {
    name == BINDING_KEY_FIELD || name == COMMITMENT_FIELD
}

// ---------------------------------------------------------------------------
// AttributeOrdering
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct AttributeOrdering(Vec<String>);

impl AttributeOrdering {
    pub fn new<I, S>(names: I) -> CoreResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ordering = Self(Vec::new());
        for name in names {
            ordering.push(name.into())?;
        }
        Ok(ordering)
    }

    fn push(&mut self, name: String) -> CoreResult<()> {
        if is_reserved_name(&name) {
            return Err(CoreError::ReservedAttribute(name));
        }
        if self.0.contains(&name) {
            return Err(CoreError::DuplicateAttribute(name));
        }
        self.0.push(name);
        Ok(())
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|n| n == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<String>> for AttributeOrdering {
    type Error = CoreError;

    fn try_from(names: Vec<String>) -> CoreResult<Self> {
        Self::new(names)
    }
}

impl From<AttributeOrdering> for Vec<String> {
    fn from(ordering: AttributeOrdering) -> Self {
        ordering.0
    }
}

// ---------------------------------------------------------------------------
// AttributeSet
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AttributeSetRepr")]
pub struct AttributeSet {
    ordering: AttributeOrdering,
    values: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct AttributeSetRepr {
    ordering: AttributeOrdering,
    values: BTreeMap<String, String>,
}

impl TryFrom<AttributeSetRepr> for AttributeSet {
    type Error = CoreError;

    fn try_from(repr: AttributeSetRepr) -> CoreResult<Self> {
        Self::from_parts(repr.ordering, repr.values)
    }
}

impl AttributeSet {
    pub fn new() -> Self {
        Self {
            ordering: AttributeOrdering(Vec::new()),
            values: BTreeMap::new(),
        }
    }

    /// Build from a persisted ordering and its values. Every ordered name must
    /// have a value and every value must appear in the ordering.
    pub fn from_parts(
        ordering: AttributeOrdering,
        values: BTreeMap<String, String>,
    ) -> CoreResult<Self> {
        for name in ordering.names() {
            if !values.contains_key(name) {
                return Err(CoreError::OrderingMismatch(format!(
                    "no value for ordered attribute '{}'",
                    name
                )));
            }
        }
        for name in values.keys() {
            if !ordering.contains(name) {
                return Err(CoreError::OrderingMismatch(format!(
                    "attribute '{}' missing from ordering",
                    name
                )));
            }
        }
        Ok(Self { ordering, values })
    }

    /// Append an attribute at the end of the ordering.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> CoreResult<()> {
        let name = name.into();
        self.ordering.push(name.clone())?;
        self.values.insert(name, value.into());
        Ok(())
    }

    /// Builder form of [`AttributeSet::insert`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> CoreResult<Self> {
        self.insert(name, value)?;
        Ok(self)
    }

    /// Replace the value of an existing attribute; the ordering is unchanged.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> CoreResult<()> {
        match self.values.get_mut(name) {
            Some(slot) => {
                *slot = value.into();
                Ok(())
            }
            None => Err(CoreError::UnknownAttribute(name.to_string())),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn ordering(&self) -> &AttributeOrdering {
        &self.ordering
    }

    /// `(name, value)` pairs in signing order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.ordering.names().iter().filter_map(move |name| {
            self.values
                .get(name)
                .map(|value| (name.as_str(), value.as_str()))
        })
    }

    pub fn len(&self) -> usize {
        self.ordering.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordering.is_empty()
    }
}

impl Default for AttributeSet {
    fn default() -> Self {
        Self::new()
    }
}
