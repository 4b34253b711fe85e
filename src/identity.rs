//! The per-document index from ID attribute value to element.
//!
//! Claims are made by ID attributes. Several attributes, of one
//! element or of several, may claim the same value. All claims are
//! kept in insertion order and lookups prefer the most recent one, so
//! a later `put` wins while it lasts and removing it uncovers the
//! earlier owner again.

use std::collections::HashMap;

use log::trace;

use super::raw::{NodeId, NodeKind, Tree};
use super::string_pool::InternedString;

/// One ID attribute contributing a value on behalf of its element.
#[derive(Debug, Copy, Clone, PartialEq)]
struct Claim {
    attribute: NodeId,
    element: NodeId,
}

#[derive(Debug, Default)]
pub struct IdentityIndex {
    claims: HashMap<InternedString, Vec<Claim>>,
}

impl IdentityIndex {
    pub fn put(&mut self, value: InternedString, attribute: NodeId, element: NodeId) {
        trace!(target: "dom.ids", "registering {:?} for {:?} via {:?}", value, element, attribute);
        let claims = self.claims.entry(value).or_default();
        claims.retain(|c| c.attribute != attribute);
        claims.push(Claim { attribute, element });
    }

    pub fn remove(&mut self, value: InternedString, attribute: NodeId) {
        trace!(target: "dom.ids", "unregistering {:?} via {:?}", value, attribute);
        if let Some(claims) = self.claims.get_mut(&value) {
            claims.retain(|c| c.attribute != attribute);
            if claims.is_empty() {
                self.claims.remove(&value);
            }
        }
    }

    /// Elements claiming a value, most recent first. An element with
    /// several attributes carrying the value appears once per attribute.
    pub fn candidates<'a>(&'a self, value: &str) -> impl Iterator<Item = NodeId> + 'a {
        self.claims.get(value).into_iter().flat_map(|claims| claims.iter().rev().map(|c| c.element))
    }

    pub fn contains(&self, value: &str, element: NodeId) -> bool {
        self.candidates(value).any(|e| e == element)
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }
}

impl Tree {
    /// Find the element registered under `value` that is still part of
    /// the document.
    pub(crate) fn element_by_id(&mut self, value: &str) -> Option<NodeId> {
        self.resolve_deferred_ids();

        self.ids.candidates(value)
            .find(|&e| self.is_connected(e))
    }

    /// The value an ID attribute contributes to the index, if it
    /// contributes one at all.
    pub(crate) fn indexed_id(&mut self, attr: NodeId) -> Option<(InternedString, NodeId)> {
        if self.kind(attr) != NodeKind::Attribute || !self[attr].flags.id_attribute {
            return None;
        }
        let element = self.owner_element(attr)?;
        Some((self.attr_value_interned(attr), element))
    }

    pub(crate) fn register_id(&mut self, attr: NodeId) {
        if let Some((value, element)) = self.indexed_id(attr) {
            self.ids.put(value, attr, element);
        }
    }

    pub(crate) fn unregister_id(&mut self, attr: NodeId) {
        if let Some((value, _)) = self.indexed_id(attr) {
            self.ids.remove(value, attr);
        }
    }
}

#[cfg(test)]
mod test {
    use super::IdentityIndex;
    use crate::config::Config;
    use crate::raw::{NodeData, Tree};
    use crate::Package;

    #[test]
    fn the_latest_claim_wins() {
        let mut tree = Tree::new(Config::default());
        let a = tree.create(NodeData::DocumentFragment);
        let b = tree.create(NodeData::DocumentFragment);
        let value = tree.intern("x");
        let mut index = IdentityIndex::default();

        index.put(value, a, a);
        index.put(value, b, b);

        assert_eq!(Some(b), index.candidates("x").next());
    }

    #[test]
    fn removing_a_claim_uncovers_the_previous_one() {
        let mut tree = Tree::new(Config::default());
        let a = tree.create(NodeData::DocumentFragment);
        let b = tree.create(NodeData::DocumentFragment);
        let value = tree.intern("x");
        let mut index = IdentityIndex::default();

        index.put(value, a, a);
        index.put(value, b, b);
        index.remove(value, b);

        assert_eq!(vec![a], index.candidates("x").collect::<Vec<_>>());
        index.remove(value, a);
        assert_eq!(0, index.len());
    }

    #[test]
    fn repeated_claims_are_not_duplicated() {
        let mut tree = Tree::new(Config::default());
        let a = tree.create(NodeData::DocumentFragment);
        let value = tree.intern("x");
        let mut index = IdentityIndex::default();

        index.put(value, a, a);
        index.put(value, a, a);
        index.remove(value, a);

        assert!(!index.contains("x", a));
    }

    #[test]
    fn an_element_keeps_its_id_while_any_attribute_supplies_it() {
        let package = Package::new();
        let doc = package.as_document();
        let e = doc.create_element("e").unwrap();
        doc.root().append_child(e).unwrap();
        e.set_attribute("a", "v").unwrap();
        e.set_attribute("b", "v").unwrap();
        e.set_id_attribute("a", true).unwrap();
        e.set_id_attribute("b", true).unwrap();

        e.remove_attribute("a").unwrap();
        assert_eq!(Some(e), doc.element_by_id("v"));

        e.set_attribute("b", "w").unwrap();
        assert_eq!(None, doc.element_by_id("v"));
        assert_eq!(Some(e), doc.element_by_id("w"));
    }
}
