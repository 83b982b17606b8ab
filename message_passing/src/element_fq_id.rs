// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Kind of service element an [`ElementFqId`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ElementType {
    Invalid = 0,
    Event = 1,
    Field = 2,
}

impl ElementType {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Event,
            2 => Self::Field,
            _ => Self::Invalid,
        }
    }
}

/// Fully-qualified identifier of a service element (event or field),
/// unique within one process's runtime.
///
/// Equality and ordering only ever consider `(service_id, instance_id,
/// element_id)` — `element_type` is not part of identity, since the other
/// three fields already uniquely identify a service element.
#[derive(Debug, Clone, Copy)]
pub struct ElementFqId {
    pub service_id: u16,
    pub element_id: u8,
    pub instance_id: u16,
    pub element_type: ElementType,
}

impl ElementFqId {
    pub fn new(service_id: u16, element_id: u8, instance_id: u16, element_type: ElementType) -> Self {
        Self {
            service_id,
            element_id,
            instance_id,
            element_type,
        }
    }

    pub fn is_event(&self) -> bool {
        self.element_type == ElementType::Event
    }

    pub fn is_field(&self) -> bool {
        self.element_type == ElementType::Field
    }
}

impl PartialEq for ElementFqId {
    fn eq(&self, other: &Self) -> bool {
        self.service_id == other.service_id
            && self.element_id == other.element_id
            && self.instance_id == other.instance_id
    }
}
impl Eq for ElementFqId {}

impl Hash for ElementFqId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.service_id.hash(state);
        self.element_id.hash(state);
        self.instance_id.hash(state);
    }
}

impl PartialOrd for ElementFqId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ElementFqId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.service_id
            .cmp(&other.service_id)
            .then_with(|| self.instance_id.cmp(&other.instance_id))
            .then_with(|| self.element_id.cmp(&other.element_id))
    }
}

impl fmt::Display for ElementFqId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ElementFqId{{S:{}, E:{}, I:{}, T:{}}}",
            self.service_id, self.element_id, self.instance_id, self.element_type as u8
        )
    }
}

const ELEMENT_TYPE_SIZE: u32 = 8;
const INSTANCE_ID_SIZE: u32 = 16;
const ELEMENT_ID_SIZE: u32 = 8;

/// Packs an [`ElementFqId`] into the 64-bit layout used as short-message
/// payload: `[service_id:16][element_id:8][instance_id:16][element_type:8]`.
/// Widened to `u64` (the payload's actual type) rather than `u32`: the three
/// shift amounts sum to 32 bits already, leaving no room for `service_id`
/// itself in a 32-bit word.
pub fn encode_element_fq_id(id: ElementFqId) -> u64 {
    (u64::from(id.service_id) << (ELEMENT_TYPE_SIZE + INSTANCE_ID_SIZE + ELEMENT_ID_SIZE))
        | (u64::from(id.element_id) << (ELEMENT_TYPE_SIZE + INSTANCE_ID_SIZE))
        | (u64::from(id.instance_id) << ELEMENT_TYPE_SIZE)
        | u64::from(id.element_type as u8)
}

/// Inverse of [`encode_element_fq_id`].
pub fn decode_element_fq_id(payload: u64) -> ElementFqId {
    let service_id = (payload >> (ELEMENT_TYPE_SIZE + INSTANCE_ID_SIZE + ELEMENT_ID_SIZE)) as u16;
    let element_id = ((payload >> (ELEMENT_TYPE_SIZE + INSTANCE_ID_SIZE)) & 0xFF) as u8;
    let instance_id = ((payload >> ELEMENT_TYPE_SIZE) & 0xFFFF) as u16;
    let element_type = ElementType::from_u8((payload & 0xFF) as u8);
    ElementFqId {
        service_id,
        element_id,
        instance_id,
        element_type,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_u32() {
        let cases = [
            ElementFqId::new(0, 0, 0, ElementType::Invalid),
            ElementFqId::new(u16::MAX, u8::MAX, u16::MAX, ElementType::Field),
            ElementFqId::new(1, 1, 1, ElementType::Event),
            ElementFqId::new(4444, 17, 900, ElementType::Field),
        ];
        for id in cases {
            let encoded = encode_element_fq_id(id);
            let decoded = decode_element_fq_id(encoded);
            assert_eq!(id, decoded);
            assert_eq!(decoded.element_type, id.element_type);
        }
    }

    #[test]
    fn identity_ignores_element_type() {
        let a = ElementFqId::new(1, 2, 3, ElementType::Event);
        let b = ElementFqId::new(1, 2, 3, ElementType::Field);
        assert_eq!(a, b);
    }
}
