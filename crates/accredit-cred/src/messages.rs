//! The signed message list.
//!
//! Order: attribute values in the persisted ordering, then the binding public
//! key, then the 32-byte big-endian commitment. Issuance, disclosure and
//! holder-side verification all go through these functions.

use accredit_core::{
    AttributeOrdering, AttributeSet, BindingPublicKey, FieldElement, BINDING_KEY_FIELD,
    COMMITMENT_FIELD,
};

pub fn credential_messages(
    attributes: &AttributeSet,
    binding_key: &BindingPublicKey,
    commitment: &FieldElement,
) -> Vec<Vec<u8>> {
    let mut messages: Vec<Vec<u8>> = attributes
        .iter()
        .map(|(_, value)| value.as_bytes().to_vec())
        .collect();
    messages.push(binding_key.as_bytes().to_vec());
    messages.push(commitment.to_be_bytes().to_vec());
    messages
}

/// Message names aligned with [`credential_messages`].
pub fn message_names(ordering: &AttributeOrdering) -> Vec<&str> {
    ordering
        .names()
        .iter()
        .map(String::as_str)
        .chain([BINDING_KEY_FIELD, COMMITMENT_FIELD])
        .collect()
}

pub fn message_count(ordering: &AttributeOrdering) -> usize {
    ordering.len() + 2
}
