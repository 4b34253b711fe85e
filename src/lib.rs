//! A mutable XML document object model.
//!
//! ```
//! use sxd_dom_core::Package;
//! let package = Package::new();
//! let doc = package.as_document();
//!
//! let hello = doc.create_element("hello").unwrap();
//! hello.set_attribute("planet", "Earth").unwrap();
//! let comment = doc.create_comment("What about other planets?");
//! let text = doc.create_text("Greetings, Earthlings!");
//!
//! hello.append_child(comment).unwrap();
//! hello.append_child(text).unwrap();
//! doc.root().append_child(hello).unwrap();
//!
//! assert_eq!(Some("Earth".into()), hello.attribute_value("planet"));
//! ```
//!
//! ### Design decisions
//!
//! All nodes of a document live in one arena owned by the `Package`.
//! The node handles are small `Copy` values borrowing the package, so
//! they can be passed around freely and compared by identity.
//!
//! A document can also be loaded from a `DeferredStore`, a compact
//! record table written by a parser. Nodes are then created from their
//! records only when something looks at them.

use std::fmt;

mod attr_value;
mod attributes;
mod collections;
mod config;
mod copy;
mod deferred;
pub mod dom;
mod error;
mod events;
mod factory;
mod fixup;
mod identity;
mod mutate;
mod namespaces;
mod normalize;
mod pool;
mod qname;
mod raw;
mod siblings;
mod snapshot;
mod str;
mod string_pool;
pub mod traversal;
mod user_data;

pub use crate::collections::{NamedNodeMap, NamedNodeMapIter, NodeList, NodeListIter};
pub use crate::config::{Config, XmlVersion};
pub use crate::deferred::{DeferredStore, RecordIndex};
pub use crate::dom::{
    Attribute, CDataSection, Comment, Document, DocumentFragment, DocumentType, Element, Entity,
    EntityReference, Node, Notation, ProcessingInstruction, Root, Text, TypeInfo,
};
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::events::{Mutation, MutationObserver};
pub use crate::fixup::{Diagnostic, NormalizeOptions, Problem, Severity};
pub use crate::pool::{ObjectPool, Pooled};
pub use crate::qname::{XMLNS_NS_URI, XML_NS_URI};
pub use crate::raw::NodeKind;
pub use crate::traversal::{FilterResult, NodeFilter, NodeIterator, TreeWalker, WhatToShow};
pub use crate::user_data::{UserData, UserDataHandler, UserDataOperation};

#[doc(hidden)]
#[cfg(feature = "__internal_expose_string_pool")]
pub mod __internal {
    pub use crate::string_pool::StringPool;
}

/// Owns every node of one document.
pub struct Package {
    storage: raw::Storage,
}

impl Package {
    pub fn new() -> Package {
        Package::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Package {
        Package { storage: raw::Storage::new(config) }
    }

    /// A package whose nodes are created from `store` as they are
    /// visited.
    pub fn from_deferred(store: DeferredStore) -> Package {
        Package::from_deferred_with_config(store, Config::default())
    }

    pub fn from_deferred_with_config(store: DeferredStore, config: Config) -> Package {
        let tree = raw::Tree::from_deferred(config, store);
        Package { storage: raw::Storage::from_tree(tree) }
    }

    pub fn as_document(&self) -> Document<'_> {
        Document::new(&self.storage)
    }
}

impl Default for Package {
    fn default() -> Package {
        Package::new()
    }
}

impl PartialEq for Package {
    fn eq(&self, other: &Package) -> bool {
        std::ptr::eq(self, other)
    }
}

impl fmt::Debug for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Package")
    }
}
