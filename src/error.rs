//! Failures reported by tree and attribute mutation.
//!
//! Every precondition is checked before a structural edit starts, so a
//! failed call leaves the tree untouched. The exception is inserting a
//! document fragment: its children are moved one at a time and an error
//! part way through leaves the earlier children in their new place.

use thiserror::Error;

use super::raw::NodeKind;

/// The machine-checkable category of an [`Error`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Hierarchy,
    WrongOwner,
    NotFound,
    ReadOnly,
    InUse,
    Namespace,
    InvalidCharacter,
    NotSupported,
    IndexSize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("a {child:?} node may not be inserted into a {parent:?} node")]
    Hierarchy { parent: NodeKind, child: NodeKind },
    #[error("inserting this {child:?} node would make it an ancestor of itself")]
    Cycle { child: NodeKind },
    #[error("the {kind:?} node belongs to a different document; import it first")]
    WrongOwner { kind: NodeKind },
    #[error("the {kind:?} node is not where it was expected")]
    NotFound { kind: NodeKind },
    #[error("no attribute named {name:?} exists")]
    AttributeNotFound { name: String },
    #[error("the {kind:?} node is read-only")]
    ReadOnly { kind: NodeKind },
    #[error("attribute {name:?} is already owned by another element")]
    InUse { name: String },
    #[error("{name:?} violates the namespace rules: {reason}")]
    Namespace { name: String, reason: &'static str },
    #[error("{name:?} contains characters that are not allowed in an XML name")]
    InvalidCharacter { name: String },
    #[error("the operation is not supported for {kind:?} nodes")]
    NotSupported { kind: NodeKind },
    #[error("offset {offset} is past the end of {length} characters")]
    IndexSize { offset: usize, length: usize },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match *self {
            Error::Hierarchy { .. } |
            Error::Cycle { .. } => ErrorKind::Hierarchy,
            Error::WrongOwner { .. } => ErrorKind::WrongOwner,
            Error::NotFound { .. } |
            Error::AttributeNotFound { .. } => ErrorKind::NotFound,
            Error::ReadOnly { .. } => ErrorKind::ReadOnly,
            Error::InUse { .. } => ErrorKind::InUse,
            Error::Namespace { .. } => ErrorKind::Namespace,
            Error::InvalidCharacter { .. } => ErrorKind::InvalidCharacter,
            Error::NotSupported { .. } => ErrorKind::NotSupported,
            Error::IndexSize { .. } => ErrorKind::IndexSize,
        }
    }
}

pub type Result<T, E = Error> = ::std::result::Result<T, E>;

#[cfg(test)]
mod test {
    use super::{Error, ErrorKind};
    use crate::raw::NodeKind;

    #[test]
    fn cycles_are_hierarchy_errors() {
        let e = Error::Cycle { child: NodeKind::Element };
        assert_eq!(ErrorKind::Hierarchy, e.kind());
    }

    #[test]
    fn messages_name_the_offender() {
        let e = Error::InUse { name: "lang".into() };
        assert_eq!(r#"attribute "lang" is already owned by another element"#, e.to_string());
    }
}
