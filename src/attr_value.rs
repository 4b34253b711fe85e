//! Attribute values: a flat string until something asks for child
//! nodes, then a list of text and entity reference children.

use super::deferred::Need;
use super::error::{Error, Result};
use super::raw::{AttrValue, Node, NodeData, NodeId, NodeKind, Tree};
use super::siblings;
use super::string_pool::InternedString;

/// A value that was either stored as one string or computed from
/// child nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueText {
    Interned(InternedString),
    Computed(String),
}

impl ValueText {
    pub fn as_str(&self) -> &str {
        match *self {
            ValueText::Interned(s) => s.as_slice(),
            ValueText::Computed(ref s) => s,
        }
    }
}

impl Tree {
    fn attr_value_state(&self, attr: NodeId) -> Option<AttrValue> {
        match self[attr].data {
            NodeData::Attribute { value, .. } => Some(value),
            _ => None,
        }
    }

    pub(crate) fn is_structured(&mut self, attr: NodeId) -> bool {
        self.ensure(attr, Need::Data);
        self.attr_value_state(attr) == Some(AttrValue::Structured)
    }

    /// The value of an attribute, concatenating its children when it
    /// has been turned into a node list.
    pub(crate) fn attr_value(&mut self, attr: NodeId) -> ValueText {
        self.ensure(attr, Need::Children);
        match self.attr_value_state(attr) {
            Some(AttrValue::Flat(s)) => ValueText::Interned(s),
            Some(AttrValue::Structured) => {
                let mut value = String::new();
                for child in self.child_ids(attr) {
                    let part = match self.kind(child) {
                        NodeKind::EntityReference => self.entity_reference_value(child),
                        _ => {
                            self.ensure(child, Need::Data);
                            self[child].data.character_data().map(|d| d.as_slice().to_owned())
                        }
                    };
                    match part {
                        Some(part) => value.push_str(&part),
                        None => return ValueText::Interned(InternedString::empty()),
                    }
                }
                ValueText::Computed(value)
            }
            None => ValueText::Interned(InternedString::empty()),
        }
    }

    pub(crate) fn attr_value_interned(&mut self, attr: NodeId) -> InternedString {
        match self.attr_value(attr) {
            ValueText::Interned(s) => s,
            ValueText::Computed(s) => self.intern(&s),
        }
    }

    /// The text an entity reference contributes to an attribute value.
    /// `None` when it contains anything but text and nested references.
    pub(crate) fn entity_reference_value(&mut self, reference: NodeId) -> Option<String> {
        self.ensure(reference, Need::Children);
        let mut value = String::new();
        for child in self.child_ids(reference) {
            match self.kind(child) {
                NodeKind::EntityReference => value.push_str(&self.entity_reference_value(child)?),
                NodeKind::Text => {
                    self.ensure(child, Need::Data);
                    if let Some(d) = self[child].data.character_data() {
                        value.push_str(d.as_slice());
                    }
                }
                _ => return None,
            }
        }
        Some(value)
    }

    /// Turn a flat value into a single text child. Has no effect on a
    /// value that already has children; there is no way back.
    pub(crate) fn promote(&mut self, attr: NodeId) {
        self.ensure(attr, Need::Children);
        let flat = match self.attr_value_state(attr) {
            Some(AttrValue::Flat(s)) => s,
            _ => return,
        };
        if let NodeData::Attribute { ref mut value, .. } = self[attr].data {
            *value = AttrValue::Structured;
        }
        if !flat.as_slice().is_empty() {
            let mut text = Node::new(NodeData::Text(flat));
            text.flags.read_only = self[attr].flags.read_only;
            let text = self.alloc(text);
            self.siblings(attr).insert_before(text, None);
        }
    }

    /// Child-level access to any node. Attributes are promoted first.
    pub(crate) fn child_access(&mut self, id: NodeId) {
        self.ensure(id, Need::Children);
        if self.kind(id) == NodeKind::Attribute {
            self.promote(id);
        }
    }

    /// Replace the value of an attribute with a flat string, returning
    /// the old value. Any value children are dropped.
    pub(crate) fn set_attr_value(&mut self, attr: NodeId, new: &str) -> Result<ValueText> {
        self.ensure(attr, Need::Children);
        if self.error_checking() && self[attr].flags.read_only {
            return Err(Error::ReadOnly { kind: NodeKind::Attribute });
        }

        let old = self.attr_value(attr);
        self.unregister_id(attr);

        while let Some(child) = siblings::head(self, attr) {
            self.siblings(attr).remove(child);
        }
        let new = self.intern(new);
        if let NodeData::Attribute { ref mut value, .. } = self[attr].data {
            *value = AttrValue::Flat(new);
        }

        self[attr].flags.specified = true;
        self[attr].flags.normalized = true;
        self.register_id(attr);
        self.changed();
        Ok(old)
    }
}

#[cfg(test)]
mod test {
    use crate::Package;

    #[test]
    fn flat_values_are_returned_directly() {
        let package = Package::new();
        let doc = package.as_document();
        let a = doc.create_attribute("a").unwrap();

        a.set_value("abc").unwrap();

        assert_eq!("abc", a.value());
        assert!(a.as_node().has_child_nodes());
        assert!(!doc.with_tree(|t| t.is_structured(a.as_node().id())));
    }

    #[test]
    fn child_access_promotes_the_value_without_changing_it() {
        let package = Package::new();
        let doc = package.as_document();
        let a = doc.create_attribute("a").unwrap();
        a.set_value("abc").unwrap();

        let text = a.as_node().first_child().unwrap();

        assert_eq!(Some("abc"), text.text().map(|t| t.data()));
        assert_eq!("abc", a.value());
    }

    #[test]
    fn structured_values_concatenate_children() {
        let package = Package::new();
        let doc = package.as_document();
        let a = doc.create_attribute("a").unwrap();
        a.set_value("one").unwrap();

        a.as_node().append_child(doc.create_text("two")).unwrap();

        assert_eq!("onetwo", a.value());
        assert!(!a.as_node().is_normalized());
    }

    #[test]
    fn unresolvable_entity_references_yield_an_empty_value() {
        let package = Package::new();
        let doc = package.as_document();
        let a = doc.create_attribute("a").unwrap();
        a.set_value("one").unwrap();
        let reference = doc.create_entity_reference("ent").unwrap();
        reference.as_node().set_read_only(false, false);
        reference.as_node().append_child(doc.create_comment("no")).unwrap();

        a.as_node().append_child(reference).unwrap();

        assert_eq!("", a.value());
    }

    #[test]
    fn setting_a_value_collapses_children() {
        let package = Package::new();
        let doc = package.as_document();
        let a = doc.create_attribute("a").unwrap();
        a.set_value("one").unwrap();
        let first = a.as_node().first_child().unwrap();

        a.set_value("two").unwrap();

        assert_eq!("two", a.value());
        assert_eq!(None, first.parent());
    }
}
