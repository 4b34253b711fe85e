//! Name-sorted node maps: element attributes, doctype entities and
//! notations, and default-attribute templates.
//!
//! Entries are kept sorted by qualified name so that name lookups are
//! a binary search. Namespace lookups scan linearly; attribute lists
//! are short. A namespace-aware insert whose name matches no entry is
//! placed at its qualified-name position, so two attributes with the
//! same qualified name but different namespaces sit next to each
//! other.

use log::trace;

use super::deferred::Need;
use super::error::{Error, Result};
use super::raw::{NodeData, NodeId, NodeKind, Tree};
use super::string_pool::InternedString;

#[derive(Debug, Clone, Default)]
pub struct NamedNodes {
    pub(crate) nodes: Vec<NodeId>,
    /// The map was seeded from a default-attribute template.
    pub(crate) has_defaults: bool,
}

/// Which map of a node to address.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MapKind {
    Attributes,
    Entities,
    Notations,
    /// The default-attribute template of the named element, held by a
    /// document type.
    Defaults(InternedString),
}

impl MapKind {
    fn item_kind(self) -> NodeKind {
        match self {
            MapKind::Attributes | MapKind::Defaults(_) => NodeKind::Attribute,
            MapKind::Entities => NodeKind::Entity,
            MapKind::Notations => NodeKind::Notation,
        }
    }
}

/// How to find an entry.
#[derive(Debug, Copy, Clone)]
pub enum NamedKey<'a> {
    Name(&'a str),
    Namespaced(Option<&'a str>, &'a str),
}

impl Tree {
    pub(crate) fn map(&self, owner: NodeId, which: MapKind) -> Option<&NamedNodes> {
        match (&self[owner].data, which) {
            (NodeData::Element { attributes, .. }, MapKind::Attributes) => Some(attributes),
            (NodeData::DocumentType(d), MapKind::Entities) => Some(&d.entities),
            (NodeData::DocumentType(d), MapKind::Notations) => Some(&d.notations),
            (NodeData::DocumentType(d), MapKind::Defaults(element)) => d.element_defaults.get(&element),
            _ => None,
        }
    }

    fn map_mut(&mut self, owner: NodeId, which: MapKind) -> Option<&mut NamedNodes> {
        match (&mut self[owner].data, which) {
            (NodeData::Element { attributes, .. }, MapKind::Attributes) => Some(attributes),
            (NodeData::DocumentType(d), MapKind::Entities) => Some(&mut d.entities),
            (NodeData::DocumentType(d), MapKind::Notations) => Some(&mut d.notations),
            (NodeData::DocumentType(d), MapKind::Defaults(element)) => {
                Some(d.element_defaults.entry(element).or_default())
            }
            _ => None,
        }
    }

    /// A snapshot of the entries of a map, in order.
    pub(crate) fn map_entries(&mut self, owner: NodeId, which: MapKind) -> Vec<NodeId> {
        self.ensure(owner, Need::Children);
        self.map(owner, which).map(|m| m.nodes.clone()).unwrap_or_default()
    }

    pub(crate) fn map_len(&mut self, owner: NodeId, which: MapKind) -> usize {
        self.ensure(owner, Need::Children);
        self.map(owner, which).map_or(0, |m| m.nodes.len())
    }

    pub(crate) fn map_item(&mut self, owner: NodeId, which: MapKind, index: usize) -> Option<NodeId> {
        self.ensure(owner, Need::Children);
        self.map(owner, which).and_then(|m| m.nodes.get(index).cloned())
    }

    /// The name a map entry is sorted by.
    fn entry_name(&self, id: NodeId) -> &str {
        self[id].data.node_name()
    }

    fn entry_matches_ns(&self, id: NodeId, namespace_uri: Option<&str>, local_name: &str) -> bool {
        match self[id].data.name() {
            Some(name) => name.matches_ns(namespace_uri, local_name),
            None => namespace_uri.is_none() && self.entry_name(id) == local_name,
        }
    }

    fn search_name(&self, nodes: &[NodeId], name: &str) -> Result<usize, usize> {
        nodes.binary_search_by(|&n| self.entry_name(n).cmp(name))
    }

    fn position(&self, owner: NodeId, which: MapKind, key: NamedKey<'_>) -> Option<usize> {
        let nodes = &self.map(owner, which)?.nodes;
        match key {
            NamedKey::Name(name) => self.search_name(nodes, name).ok(),
            NamedKey::Namespaced(ns, local) => {
                let ns = ns.filter(|ns| !ns.is_empty());
                nodes.iter().position(|&n| self.entry_matches_ns(n, ns, local))
            }
        }
    }

    pub(crate) fn named_item(&mut self, owner: NodeId, which: MapKind, key: NamedKey<'_>) -> Option<NodeId> {
        self.ensure(owner, Need::Children);
        let idx = self.position(owner, which, key)?;
        self.map(owner, which).map(|m| m.nodes[idx])
    }

    /// Preconditions of `set_named_item`. `item` must belong to this
    /// document.
    pub(crate) fn check_set_named(&mut self, owner: NodeId, which: MapKind, item: NodeId) -> Result<()> {
        if !self.error_checking() {
            return Ok(());
        }
        let kind = self.kind(item);
        if self[owner].flags.read_only || matches!(which, MapKind::Defaults(_)) {
            return Err(Error::ReadOnly { kind: self.kind(owner) });
        }
        if kind != which.item_kind() {
            return Err(Error::Hierarchy { parent: self.kind(owner), child: kind });
        }
        if self[item].flags.owned && self[item].owner != Some(owner) {
            self.ensure(item, Need::Data);
            return Err(Error::InUse { name: self.entry_name(item).to_owned() });
        }
        Ok(())
    }

    /// Add or replace an entry without any checks. Returns the entry
    /// it displaced; an entry already in this map displaces itself.
    pub(crate) fn attach_named(
        &mut self,
        owner: NodeId,
        which: MapKind,
        item: NodeId,
        namespace_aware: bool,
    ) -> Option<NodeId> {
        self.ensure(owner, Need::Data);
        self.ensure(item, Need::Data);

        if self[item].owner == Some(owner) && self[item].flags.owned {
            return Some(item);
        }

        let existing = if namespace_aware {
            let (ns, local) = match self[item].data.name() {
                Some(name) => (name.namespace_uri, name.local_name.unwrap_or(name.qualified)),
                None => (None, self.intern(self.entry_name(item))),
            };
            let key = NamedKey::Namespaced(ns.map(|n| n.as_slice()), local.as_slice());
            self.position(owner, which, key).ok_or(())
        } else {
            Err(())
        };

        let insertion = match existing {
            Ok(idx) => Ok(idx),
            Err(()) => {
                let nodes = self.map(owner, which).map(|m| &m.nodes[..]).unwrap_or(&[]);
                match self.search_name(nodes, self.entry_name(item)) {
                    Ok(idx) if !namespace_aware => Ok(idx),
                    Ok(idx) | Err(idx) => Err(idx),
                }
            }
        };

        let previous = match insertion {
            Ok(idx) => {
                let previous = self.map(owner, which).map(|m| m.nodes[idx]);
                if let Some(previous) = previous {
                    self.unregister_id(previous);
                    self.detach_named(previous);
                }
                if let Some(map) = self.map_mut(owner, which) {
                    map.nodes[idx] = item;
                }
                previous
            }
            Err(idx) => {
                if let Some(map) = self.map_mut(owner, which) {
                    map.nodes.insert(idx, item);
                }
                None
            }
        };

        self[item].owner = Some(owner);
        self[item].flags.owned = true;
        self.register_id(item);

        if !self[item].flags.normalized {
            self.mark_unnormalized(owner);
        }
        self.changed();
        previous
    }

    fn detach_named(&mut self, id: NodeId) {
        let node = &mut self[id];
        node.owner = None;
        node.flags.owned = false;
        node.flags.specified = true;
    }

    /// Remove the entry at `idx`. A removed attribute with a declared
    /// default is replaced by a fresh copy of that default, unless
    /// another attribute still carries the same qualified name.
    pub(crate) fn remove_named_at(&mut self, owner: NodeId, which: MapKind, idx: usize) -> Option<NodeId> {
        let (removed, has_defaults) = match self.map(owner, which) {
            Some(map) if idx < map.nodes.len() => (map.nodes[idx], map.has_defaults),
            _ => return None,
        };
        self.unregister_id(removed);

        let replacement = if which == MapKind::Attributes && has_defaults {
            self.default_replacement(owner, removed, idx)
        } else {
            None
        };

        match replacement {
            Some(clone) => {
                if let Some(map) = self.map_mut(owner, which) {
                    map.nodes[idx] = clone;
                }
                self[clone].owner = Some(owner);
                self[clone].flags.owned = true;
                self.register_id(clone);
            }
            None => {
                if let Some(map) = self.map_mut(owner, which) {
                    map.nodes.remove(idx);
                }
            }
        }

        self.detach_named(removed);
        self.changed();
        Some(removed)
    }

    fn default_replacement(&mut self, element: NodeId, removed: NodeId, idx: usize) -> Option<NodeId> {
        let name = self.entry_name(removed).to_owned();

        let shared = self.map(element, MapKind::Attributes).map_or(false, |m| {
            let neighbours = [idx.checked_sub(1), Some(idx + 1)];
            neighbours.iter()
                .filter_map(|&i| i.and_then(|i| m.nodes.get(i)))
                .any(|&n| self.entry_name(n) == name)
        });
        if shared {
            return None;
        }

        let template = self.default_template(element)?;
        let declared = template.into_iter().find(|&d| self.entry_name(d) == name)?;

        trace!(target: "dom.defaults", "restoring default for {:?}", name);
        let clone = self.clone_default(declared);

        // Removed through the namespace-aware API, so keep its namespace.
        let removed_name = self[removed].data.name().cloned();
        if let (Some(removed_name), NodeData::Attribute { name, .. }) = (removed_name, &mut self[clone].data) {
            if removed_name.local_name.is_some() {
                *name = removed_name;
            }
        }
        Some(clone)
    }

    fn clone_default(&mut self, declared: NodeId) -> NodeId {
        let clone = self.clone_node(declared, true);
        self[clone].flags.specified = false;
        clone
    }

    /// The entries of the default template matching this element's
    /// name in the document type, if any.
    pub(crate) fn default_template(&mut self, element: NodeId) -> Option<Vec<NodeId>> {
        let doctype = self.doctype()?;
        self.ensure(element, Need::Data);
        self.ensure(doctype, Need::Children);
        let name = self[element].data.name()?.qualified;
        self.map(doctype, MapKind::Defaults(name)).map(|m| m.nodes.clone())
    }

    /// Drop all defaulted attributes and apply the template of the
    /// element's current name, keeping specified attributes as they
    /// are.
    pub(crate) fn reconcile_default_attributes(&mut self, element: NodeId) {
        self.ensure(element, Need::Data);

        let defaulted: Vec<usize> = self.map(element, MapKind::Attributes)
            .map(|m| (0..m.nodes.len()).filter(|&i| !self[m.nodes[i]].flags.specified).collect())
            .unwrap_or_default();
        for idx in defaulted.into_iter().rev() {
            let removed = self.map(element, MapKind::Attributes).map(|m| m.nodes[idx]);
            if let Some(removed) = removed {
                self.unregister_id(removed);
                if let Some(map) = self.map_mut(element, MapKind::Attributes) {
                    map.nodes.remove(idx);
                }
                self.detach_named(removed);
            }
        }

        let template = self.default_template(element);
        if let Some(map) = self.map_mut(element, MapKind::Attributes) {
            map.has_defaults = template.is_some();
        }
        let template = match template {
            Some(template) => template,
            None => return,
        };

        trace!(target: "dom.defaults", "applying {} default attributes to {:?}", template.len(), element);
        for declared in template {
            let name = self.entry_name(declared).to_owned();
            let nodes = self.map(element, MapKind::Attributes).map(|m| &m.nodes[..]).unwrap_or(&[]);
            if let Err(idx) = self.search_name(nodes, &name) {
                let clone = self.clone_default(declared);
                if let Some(map) = self.map_mut(element, MapKind::Attributes) {
                    map.nodes.insert(idx, clone);
                }
                self[clone].owner = Some(element);
                self[clone].flags.owned = true;
                self.register_id(clone);
            }
        }
        self.changed();
    }

    /// Add an attribute to the default template of an element name.
    /// Template attributes belong to the document type and are made
    /// read-only.
    pub(crate) fn declare_default(&mut self, doctype: NodeId, element: InternedString, attr: NodeId) {
        self.ensure(doctype, Need::Children);
        let which = MapKind::Defaults(element);
        self.attach_named(doctype, which, attr, false);
        self.set_read_only(attr, true, true);
        trace!(target: "dom.defaults", "declared default {:?} for {:?}", self.entry_name(attr), element);
    }

    /// The position of a specific entry node.
    pub(crate) fn index_of_entry(&mut self, owner: NodeId, which: MapKind, item: NodeId) -> Option<usize> {
        self.ensure(owner, Need::Children);
        self.map(owner, which)?.nodes.iter().position(|&n| n == item)
    }

    /// Remove an entry by key, or fail with `NotFound` unless `safe`.
    pub(crate) fn remove_named_item(
        &mut self,
        owner: NodeId,
        which: MapKind,
        key: NamedKey<'_>,
        safe: bool,
    ) -> Result<Option<NodeId>> {
        self.ensure(owner, Need::Children);
        if self.error_checking() && (self[owner].flags.read_only || matches!(which, MapKind::Defaults(_))) {
            return Err(Error::ReadOnly { kind: self.kind(owner) });
        }
        match self.position(owner, which, key) {
            Some(idx) => Ok(self.remove_named_at(owner, which, idx)),
            None if safe => Ok(None),
            None => {
                let name = match key {
                    NamedKey::Name(name) => name.to_owned(),
                    NamedKey::Namespaced(Some(ns), local) => format!("{{{}}}{}", ns, local),
                    NamedKey::Namespaced(None, local) => local.to_owned(),
                };
                Err(Error::AttributeNotFound { name })
            }
        }
    }
}

#[cfg(test)]
mod test {
    use crate::error::ErrorKind;
    use crate::Package;

    #[test]
    fn attributes_are_kept_sorted_by_name() {
        let package = Package::new();
        let doc = package.as_document();
        let e = doc.create_element("e").unwrap();

        e.set_attribute("zeta", "1").unwrap();
        e.set_attribute("alpha", "2").unwrap();
        e.set_attribute("mu", "3").unwrap();

        let names: Vec<_> = e.attributes().iter().map(|a| a.node_name()).collect();
        assert_eq!(vec!["alpha", "mu", "zeta"], names);
    }

    #[test]
    fn setting_an_attribute_with_the_same_name_replaces_it() {
        let package = Package::new();
        let doc = package.as_document();
        let e = doc.create_element("e").unwrap();
        let first = doc.create_attribute("a").unwrap();
        let second = doc.create_attribute("a").unwrap();

        e.set_attribute_node(first).unwrap();
        let replaced = e.set_attribute_node(second).unwrap();

        assert_eq!(Some(first), replaced);
        assert_eq!(None, first.owner_element());
        assert_eq!(1, e.attributes().length());
    }

    #[test]
    fn setting_an_attribute_on_its_own_element_returns_it() {
        let package = Package::new();
        let doc = package.as_document();
        let e = doc.create_element("e").unwrap();
        let a = doc.create_attribute("a").unwrap();
        assert_eq!(None, e.set_attribute_node(a).unwrap());

        assert_eq!(Some(a), e.set_attribute_node(a).unwrap());
        assert_eq!(Some(a.as_node()), e.attributes().set_named_item(a.as_node()).unwrap());
        assert_eq!(Some(e), a.owner_element());
        assert_eq!(1, e.attributes().length());
    }

    #[test]
    fn namespaced_attributes_with_one_qualified_name_coexist() {
        let package = Package::new();
        let doc = package.as_document();
        let e = doc.create_element("e").unwrap();

        e.set_attribute_ns(Some("urn:one"), "p:a", "1").unwrap();
        e.set_attribute_ns(Some("urn:two"), "p:a", "2").unwrap();

        assert_eq!(2, e.attributes().length());
        assert_eq!(Some("1".into()), e.attribute_value_ns(Some("urn:one"), "a"));
        assert_eq!(Some("2".into()), e.attribute_value_ns(Some("urn:two"), "a"));
    }

    #[test]
    fn removing_a_missing_attribute_is_an_error_unless_safe() {
        let package = Package::new();
        let doc = package.as_document();
        let e = doc.create_element("e").unwrap();

        let err = e.attributes().remove_named_item("nope").unwrap_err();
        assert_eq!(ErrorKind::NotFound, err.kind());
        assert_eq!(None, e.attributes().safe_remove_named_item("nope").unwrap());
        assert_eq!(None, e.remove_attribute("nope").unwrap());
    }

    #[test]
    fn attributes_of_read_only_elements_cannot_change() {
        let package = Package::new();
        let doc = package.as_document();
        let e = doc.create_element("e").unwrap();
        e.set_attribute("a", "1").unwrap();
        e.as_node().set_read_only(true, true);

        assert_eq!(ErrorKind::ReadOnly, e.set_attribute("b", "2").unwrap_err().kind());
        assert_eq!(ErrorKind::ReadOnly, e.remove_attribute("a").unwrap_err().kind());
    }

    #[test]
    fn only_attributes_can_be_set_as_attributes() {
        let package = Package::new();
        let doc = package.as_document();
        let e = doc.create_element("e").unwrap();
        let other = doc.create_element("other").unwrap();

        let err = e.attributes().set_named_item(other.into()).unwrap_err();
        assert_eq!(ErrorKind::Hierarchy, err.kind());
    }

    #[test]
    fn defaults_are_applied_and_restored() {
        let package = Package::new();
        let doc = package.as_document();
        let doctype = doc.create_document_type("root", None, None).unwrap();
        doc.root().append_child(doctype).unwrap();
        let x = doc.create_attribute("x").unwrap();
        x.set_value("1").unwrap();
        doctype.declare_default_attribute("e", x).unwrap();

        let e = doc.create_element("e").unwrap();
        let defaulted = e.attribute("x").unwrap();
        assert!(!defaulted.specified());
        assert_eq!(Some("1".into()), e.attribute_value("x"));

        e.set_attribute("x", "2").unwrap();
        assert!(e.attribute("x").unwrap().specified());

        e.remove_attribute("x").unwrap();
        let restored = e.attribute("x").unwrap();
        assert!(!restored.specified());
        assert_eq!("1", restored.value());
    }

    #[test]
    fn reconciling_defaults_keeps_specified_attributes() {
        let package = Package::new();
        let doc = package.as_document();
        let doctype = doc.create_document_type("root", None, None).unwrap();
        doc.root().append_child(doctype).unwrap();
        for &(name, value) in &[("x", "1"), ("y", "2")] {
            let a = doc.create_attribute(name).unwrap();
            a.set_value(value).unwrap();
            doctype.declare_default_attribute("e", a).unwrap();
        }
        let e = doc.create_element("e").unwrap();
        e.set_attribute("y", "mine").unwrap();

        e.reconcile_default_attributes();

        assert_eq!(Some("1".into()), e.attribute_value("x"));
        assert_eq!(Some("mine".into()), e.attribute_value("y"));
        assert_eq!(2, e.attributes().length());
    }
}
