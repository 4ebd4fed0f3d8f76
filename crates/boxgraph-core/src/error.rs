//! Error types for the box graph
//!
//! Programming faults (mutating outside a transaction, nesting transactions,
//! unknown field keys, rejected pointers) panic. Everything here is an error
//! callers are expected to handle:
//! - Decoding failures of binary or JSON input
//! - Integrity violations found by requirement sweeps
//! - Unknown box kinds handed to the factory

use crate::address::{Address, AddressError, FieldKey};
use uuid::Uuid;

/// Main box graph error type
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Factory does not know the kind
    #[error("unknown box kind: {0}")]
    UnknownBoxKind(String),

    /// A box with this UUID is already staged
    #[error("box already exists: {0}")]
    DuplicateBox(Uuid),

    /// Box not found
    #[error("box not found: {0}")]
    BoxNotFound(Uuid),

    /// Decoding failed
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    /// Integrity sweep failed
    #[error("integrity violation: {0}")]
    Integrity(#[from] IntegrityError),
}

impl GraphError {
    /// Check if error is an integrity violation
    #[inline]
    #[must_use]
    pub fn is_integrity_violation(&self) -> bool {
        matches!(self, Self::Integrity(_))
    }
}

/// Decoding errors (binary and JSON)
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Input ended early
    #[error("unexpected end of input: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof {
        /// Bytes the read required
        needed: usize,
        /// Bytes left in the input
        remaining: usize,
    },

    /// Negative or oversized length prefix
    #[error("invalid length prefix: {0}")]
    InvalidLength(i32),

    /// Box payload length does not match what the fields consumed
    #[error("box {uuid} declared {declared} bytes but fields consumed {consumed}")]
    LengthMismatch {
        /// Box whose record is malformed
        uuid: Uuid,
        /// Length prefix of the record
        declared: usize,
        /// Bytes read by the field decoder
        consumed: usize,
    },

    /// Input continues after the last record
    #[error("{0} trailing bytes after last box")]
    TrailingBytes(usize),

    /// String is not UTF-8
    #[error("invalid utf-8 string")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// Field key not present in the box schema
    #[error("unknown field key {key} in {parent}")]
    UnknownField {
        /// Box or container field being read
        parent: Address,
        /// Key missing from its schema
        key: FieldKey,
    },

    /// Element count does not match the schema
    #[error("field {address} expects {expected} entries, got {actual}")]
    CountMismatch {
        /// Array field
        address: Address,
        /// Length fixed by the schema
        expected: usize,
        /// Length found in the input
        actual: usize,
    },

    /// Value does not match the field type
    #[error("type mismatch at {address}: expected {expected}")]
    TypeMismatch {
        /// Field being read
        address: Address,
        /// Expected value kind
        expected: &'static str,
    },

    /// Invalid presence or boolean flag
    #[error("invalid flag byte: {0}")]
    InvalidFlag(u8),

    /// Malformed address
    #[error("invalid address: {0}")]
    Address(#[from] AddressError),

    /// Malformed JSON document
    #[error("malformed json: {0}")]
    Json(String),

    /// Hex encoding error
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}

/// Integrity violations found after a modification cycle
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityError {
    /// Mandatory pointer field is empty
    #[error("mandatory pointer {pointer} is empty")]
    MissingMandatoryPointer {
        /// The empty pointer field
        pointer: Address,
    },

    /// Vertex requires an incoming pointer but has none
    #[error("vertex {vertex} requires at least one incoming pointer")]
    MissingIncomingPointer {
        /// Vertex nothing points at
        vertex: Address,
    },

    /// Vertex accepts a single incoming pointer but has more
    #[error("vertex {vertex} is exclusive but has {count} incoming pointers")]
    ExclusiveViolated {
        /// Over-referenced vertex
        vertex: Address,
        /// Number of incoming pointers
        count: usize,
    },

    /// Pointer target does not resolve
    #[error("pointer {pointer} targets missing vertex {target}")]
    DanglingPointer {
        /// Pointer field
        pointer: Address,
        /// Address that no longer resolves
        target: Address,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrity_error_converts_into_graph_error() {
        let address = Address::of_box(Uuid::nil());
        let error: GraphError = IntegrityError::MissingIncomingPointer { vertex: address }.into();
        assert!(error.is_integrity_violation());
        assert!(error.to_string().contains("incoming pointer"));
    }

    #[test]
    fn decode_error_converts_into_graph_error() {
        let error: GraphError = DecodeError::InvalidFlag(7).into();
        assert!(!error.is_integrity_violation());
        assert!(matches!(error, GraphError::Decode(DecodeError::InvalidFlag(7))));
    }
}
