//! Live views over child lists and named maps.
//!
//! Neither view holds any nodes itself; every call reads the current
//! state of the tree, so edits made after the view was taken show up
//! immediately.

use super::attributes::{MapKind, NamedKey};
use super::dom::{Element, Node};
use super::error::{Error, Result};
use super::events::Mutation;
use super::raw::NodeId;

/// The children of a node, in order.
///
/// Walking the list front to back with `item` takes constant time
/// per step thanks to the position cache kept by the parent.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct NodeList<'d> {
    parent: Node<'d>,
}

impl<'d> NodeList<'d> {
    pub(crate) fn new(parent: Node<'d>) -> NodeList<'d> {
        NodeList { parent }
    }

    pub fn length(&self) -> usize {
        let parent = self.parent.id();
        self.parent.document().with_tree(|t| {
            t.child_access(parent);
            t.child_count(parent)
        })
    }

    pub fn item(&self, index: usize) -> Option<Node<'d>> {
        let parent = self.parent.id();
        let document = self.parent.document();
        let child = document.with_tree(|t| {
            t.child_access(parent);
            t.child_at(parent, index)
        });
        child.map(|id| document.wrap(id))
    }

    pub fn is_empty(&self) -> bool {
        self.length() == 0
    }

    pub fn iter(&self) -> NodeListIter<'d> {
        NodeListIter { list: *self, index: 0 }
    }
}

pub struct NodeListIter<'d> {
    list: NodeList<'d>,
    index: usize,
}

impl<'d> Iterator for NodeListIter<'d> {
    type Item = Node<'d>;

    fn next(&mut self) -> Option<Node<'d>> {
        let node = self.list.item(self.index)?;
        self.index += 1;
        Some(node)
    }
}

impl<'d> IntoIterator for NodeList<'d> {
    type Item = Node<'d>;
    type IntoIter = NodeListIter<'d>;

    fn into_iter(self) -> NodeListIter<'d> { self.iter() }
}

/// Nodes addressed by name: the attributes of an element, or the
/// entities, notations or default attributes of a document type.
/// Entries are ordered by qualified name.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct NamedNodeMap<'d> {
    owner: Node<'d>,
    which: MapKind,
}

impl<'d> NamedNodeMap<'d> {
    pub(crate) fn new(owner: Node<'d>, which: MapKind) -> NamedNodeMap<'d> {
        NamedNodeMap { owner, which }
    }

    fn wrap(&self, id: Option<NodeId>) -> Option<Node<'d>> {
        id.map(|id| self.owner.document().wrap(id))
    }

    fn owner_element(&self) -> Option<Element<'d>> {
        match self.which {
            MapKind::Attributes => self.owner.element(),
            _ => None,
        }
    }

    pub fn length(&self) -> usize {
        let (owner, which) = (self.owner.id(), self.which);
        self.owner.document().with_tree(|t| t.map_len(owner, which))
    }

    pub fn is_empty(&self) -> bool {
        self.length() == 0
    }

    pub fn item(&self, index: usize) -> Option<Node<'d>> {
        let (owner, which) = (self.owner.id(), self.which);
        let id = self.owner.document().with_tree(|t| t.map_item(owner, which, index));
        self.wrap(id)
    }

    fn find(&self, key: NamedKey<'_>) -> Option<Node<'d>> {
        let (owner, which) = (self.owner.id(), self.which);
        let id = self.owner.document().with_tree(|t| t.named_item(owner, which, key));
        self.wrap(id)
    }

    pub fn get_named_item(&self, name: &str) -> Option<Node<'d>> {
        self.find(NamedKey::Name(name))
    }

    pub fn get_named_item_ns(&self, namespace_uri: Option<&str>, local_name: &str) -> Option<Node<'d>> {
        self.find(NamedKey::Namespaced(namespace_uri, local_name))
    }

    fn set(&self, node: Node<'d>, namespace_aware: bool) -> Result<Option<Node<'d>>> {
        let document = self.owner.document();
        if document != node.document() {
            return Err(Error::WrongOwner { kind: node.kind() });
        }
        let (owner, which, item) = (self.owner.id(), self.which, node.id());
        let previous = document.with_tree(|t| -> Result<_> {
            t.check_set_named(owner, which, item)?;
            Ok(t.attach_named(owner, which, item, namespace_aware))
        })?;
        let previous = self.wrap(previous);
        if previous == Some(node) {
            return Ok(previous);
        }

        if let (Some(element), Some(attribute)) = (self.owner_element(), node.attribute()) {
            let previous = previous.and_then(Node::attribute);
            document.notify(Mutation::AttributeNodeSet { element, attribute, previous });
        }
        Ok(previous)
    }

    /// Add a node under its qualified name, returning the node it
    /// replaced.
    pub fn set_named_item(&self, node: Node<'d>) -> Result<Option<Node<'d>>> {
        self.set(node, false)
    }

    /// Add a node under its namespace and local name, returning the
    /// node it replaced.
    pub fn set_named_item_ns(&self, node: Node<'d>) -> Result<Option<Node<'d>>> {
        self.set(node, true)
    }

    fn remove(&self, key: NamedKey<'_>, safe: bool) -> Result<Option<Node<'d>>> {
        let (owner, which) = (self.owner.id(), self.which);
        let removed = self.owner.document().with_tree(|t| t.remove_named_item(owner, which, key, safe))?;
        let removed = self.wrap(removed);

        if let (Some(element), Some(attribute)) = (self.owner_element(), removed.and_then(Node::attribute)) {
            self.owner.document().notify(Mutation::AttributeNodeRemoved { element, attribute });
        }
        Ok(removed)
    }

    /// Remove the node with this name. Fails with a not-found error
    /// when there is none. A removed attribute with a declared default
    /// is replaced by a copy of the default.
    pub fn remove_named_item(&self, name: &str) -> Result<Node<'d>> {
        self.remove(NamedKey::Name(name), false)?
            .ok_or_else(|| Error::AttributeNotFound { name: name.to_owned() })
    }

    pub fn remove_named_item_ns(&self, namespace_uri: Option<&str>, local_name: &str) -> Result<Node<'d>> {
        self.remove(NamedKey::Namespaced(namespace_uri, local_name), false)?
            .ok_or_else(|| Error::AttributeNotFound { name: local_name.to_owned() })
    }

    /// Like `remove_named_item`, but a missing name is not an error.
    pub fn safe_remove_named_item(&self, name: &str) -> Result<Option<Node<'d>>> {
        self.remove(NamedKey::Name(name), true)
    }

    pub fn safe_remove_named_item_ns(&self, namespace_uri: Option<&str>, local_name: &str) -> Result<Option<Node<'d>>> {
        self.remove(NamedKey::Namespaced(namespace_uri, local_name), true)
    }

    pub fn iter(&self) -> NamedNodeMapIter<'d> {
        NamedNodeMapIter { map: *self, index: 0 }
    }
}

pub struct NamedNodeMapIter<'d> {
    map: NamedNodeMap<'d>,
    index: usize,
}

impl<'d> Iterator for NamedNodeMapIter<'d> {
    type Item = Node<'d>;

    fn next(&mut self) -> Option<Node<'d>> {
        let node = self.map.item(self.index)?;
        self.index += 1;
        Some(node)
    }
}

#[cfg(test)]
mod test {
    use crate::Package;

    #[test]
    fn child_lists_are_live() {
        let package = Package::new();
        let doc = package.as_document();
        let e = doc.create_element("e").unwrap();
        let children = e.child_nodes();

        assert_eq!(0, children.length());
        e.append_child(doc.create_comment("a")).unwrap();
        e.append_child(doc.create_comment("b")).unwrap();

        assert_eq!(2, children.length());
        assert_eq!(Some("b".into()), children.item(1).and_then(|n| n.node_value()));
        assert_eq!(None, children.item(2));
    }

    #[test]
    fn sequential_access_sees_every_child_once() {
        let package = Package::new();
        let doc = package.as_document();
        let e = doc.create_element("e").unwrap();
        for i in 0..50 {
            e.append_child(doc.create_text(&i.to_string())).unwrap();
        }

        let values: Vec<_> = e.child_nodes().iter()
            .map(|n| n.node_value().unwrap().into_owned())
            .collect();
        let expected: Vec<_> = (0..50).map(|i| i.to_string()).collect();
        assert_eq!(expected, values);

        let list = e.child_nodes();
        assert_eq!(Some("49".into()), list.item(49).and_then(|n| n.node_value()));
        assert_eq!(Some("10".into()), list.item(10).and_then(|n| n.node_value()));
    }

    #[test]
    fn attribute_maps_are_live() {
        let package = Package::new();
        let doc = package.as_document();
        let e = doc.create_element("e").unwrap();
        let attributes = e.attributes();

        e.set_attribute("b", "2").unwrap();
        e.set_attribute("a", "1").unwrap();

        assert_eq!(2, attributes.length());
        assert_eq!(Some("a"), attributes.item(0).map(|n| n.node_name()));
        assert_eq!(Some("b"), attributes.get_named_item("b").map(|n| n.node_name()));

        let removed = attributes.remove_named_item("a").unwrap();
        assert_eq!("a", removed.node_name());
        assert_eq!(1, attributes.length());
    }
}
