//! Error types for tree operations
//!
//! Lookups that can legitimately come up empty return `Option`.
//! Everything that can be misused returns `Result<T, TreeError>`.

use thiserror::Error;

use crate::dom::node::{NodeId, NodeKind};

/// Errors raised by the buffer, the tree engine and the content decoder
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// Allocation failed; the structure being grown is unchanged
    #[error("out of memory while {0}")]
    OutOfMemory(&'static str),

    /// Mutation attempted on an immutable buffer view
    #[error("buffer is an immutable view")]
    ImmutableBuffer,

    /// Length argument larger than the data it describes
    #[error("length {len} exceeds the {available} bytes available")]
    InvalidLength { len: usize, available: usize },

    #[error("node {0} does not exist")]
    NoSuchNode(NodeId),

    #[error("operation not valid on a {0:?} node")]
    WrongKind(NodeKind),

    /// Attribute replaced by a non-attribute or the reverse
    #[error("cannot mix attribute and non-attribute nodes ({0:?} vs {1:?})")]
    KindMismatch(NodeKind, NodeKind),

    /// The insertion would make a node its own ancestor
    #[error("node {0} cannot be placed inside itself")]
    HierarchyCycle(NodeId),

    #[error("node {0} has no parent")]
    NotLinked(NodeId),

    #[error("node {0} is still linked into a tree")]
    AlreadyLinked(NodeId),

    #[error("no attribute named {0:?}")]
    NoSuchAttribute(String),

    #[error("node {0} used as both operands")]
    SameNode(NodeId),

    #[error("the xml prefix is reserved")]
    ReservedPrefix,

    #[error("prefix {0:?} already declared on this element")]
    DuplicatePrefix(Option<String>),

    /// Prefix disambiguation ran out of probes
    #[error("no free namespace prefix after {0} attempts")]
    ReconcileOverflow(u32),

    #[error("node {0} does not belong to the given document")]
    DocumentMismatch(NodeId),

    #[error("document already has an internal subset")]
    InternalSubsetExists,

    #[error("document already has an external subset")]
    ExternalSubsetExists,

    #[error("document has no internal subset")]
    NoInternalSubset,

    #[error("{0} declared more than once")]
    DuplicateDeclaration(String),

    #[error("entity {0:?} is not declared")]
    UnresolvedEntity(String),

    /// `&` without a closing `;`
    #[error("unterminated entity reference {0:?}")]
    UnterminatedEntity(String),

    #[error("invalid hexadecimal character reference")]
    InvalidHexCharRef,

    #[error("invalid decimal character reference")]
    InvalidDecCharRef,

    #[error("invalid character value {0:#x}")]
    InvalidCharValue(u32),
}

pub type Result<T> = std::result::Result<T, TreeError>;

impl TreeError {
    /// Short reason used for `{:error, reason}` tuples
    pub fn reason(&self) -> &'static str {
        match self {
            TreeError::OutOfMemory(_) => "out_of_memory",
            TreeError::ImmutableBuffer => "immutable_buffer",
            TreeError::InvalidLength { .. } => "invalid_length",
            TreeError::NoSuchNode(_) => "no_such_node",
            TreeError::WrongKind(_) => "wrong_kind",
            TreeError::KindMismatch(..) => "kind_mismatch",
            TreeError::HierarchyCycle(_) => "hierarchy_cycle",
            TreeError::NotLinked(_) => "not_linked",
            TreeError::AlreadyLinked(_) => "already_linked",
            TreeError::NoSuchAttribute(_) => "no_such_attribute",
            TreeError::SameNode(_) => "same_node",
            TreeError::ReservedPrefix => "reserved_prefix",
            TreeError::DuplicatePrefix(_) => "duplicate_prefix",
            TreeError::ReconcileOverflow(_) => "reconcile_overflow",
            TreeError::DocumentMismatch(_) => "document_mismatch",
            TreeError::InternalSubsetExists => "internal_subset_exists",
            TreeError::ExternalSubsetExists => "external_subset_exists",
            TreeError::NoInternalSubset => "no_internal_subset",
            TreeError::DuplicateDeclaration(_) => "duplicate_declaration",
            TreeError::UnresolvedEntity(_) => "unresolved_entity",
            TreeError::UnterminatedEntity(_) => "unterminated_entity",
            TreeError::InvalidHexCharRef => "invalid_hex_char_ref",
            TreeError::InvalidDecCharRef => "invalid_dec_char_ref",
            TreeError::InvalidCharValue(_) => "invalid_char_value",
        }
    }

    /// True for errors produced while decoding `&...;` markers
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            TreeError::UnterminatedEntity(_)
                | TreeError::InvalidHexCharRef
                | TreeError::InvalidDecCharRef
                | TreeError::InvalidCharValue(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = TreeError::InvalidLength { len: 9, available: 4 };
        assert_eq!(err.to_string(), "length 9 exceeds the 4 bytes available");
        assert_eq!(TreeError::InvalidCharValue(0).to_string(), "invalid character value 0x0");
    }

    #[test]
    fn test_decode_classification() {
        assert!(TreeError::InvalidHexCharRef.is_decode_error());
        assert!(TreeError::UnterminatedEntity("a".into()).is_decode_error());
        assert!(!TreeError::ReservedPrefix.is_decode_error());
        assert_eq!(TreeError::ReconcileOverflow(1000).reason(), "reconcile_overflow");
    }
}
