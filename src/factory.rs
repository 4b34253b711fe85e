//! Creating detached nodes, with name validation.

use super::attributes::{MapKind, NamedKey};
use super::deferred::Need;
use super::error::Result;
use super::qname::{self, PrefixedName};
use super::raw::{AttrValue, DocumentTypeData, Name, Node, NodeData, NodeId, NodeKind, Tree};
use super::siblings;
use super::string_pool::InternedString;

impl Tree {
    fn check_name(&self, name: &str) -> Result<()> {
        if self.error_checking() {
            qname::check_name(name, self.config.xml_version)?;
        }
        Ok(())
    }

    fn namespaced_name(&self, namespace_uri: Option<&str>, qualified_name: &str) -> Result<Name> {
        let PrefixedName { prefix, local_part } =
            qname::resolve(qualified_name, namespace_uri, self.config.xml_version, self.error_checking())?;
        Ok(Name {
            qualified: self.intern(qualified_name),
            namespace_uri: namespace_uri.filter(|ns| !ns.is_empty()).map(|ns| self.intern(ns)),
            prefix: prefix.map(|p| self.intern(p)),
            local_name: Some(self.intern(local_part)),
        })
    }

    /// Resolve an element or attribute name, namespace-aware or not.
    pub(crate) fn make_name(&self, namespace: Option<Option<&str>>, qualified_name: &str) -> Result<Name> {
        match namespace {
            Some(namespace_uri) => self.namespaced_name(namespace_uri, qualified_name),
            None => {
                self.check_name(qualified_name)?;
                Ok(Name::plain(self.intern(qualified_name)))
            }
        }
    }

    fn new_element_named(&mut self, name: Name) -> NodeId {
        let id = self.create(NodeData::Element { name, attributes: Default::default() });
        self.reconcile_default_attributes(id);
        id
    }

    pub(crate) fn new_element(&mut self, name: &str) -> Result<NodeId> {
        let name = self.make_name(None, name)?;
        Ok(self.new_element_named(name))
    }

    pub(crate) fn new_element_ns(&mut self, namespace_uri: Option<&str>, qualified_name: &str) -> Result<NodeId> {
        let name = self.make_name(Some(namespace_uri), qualified_name)?;
        Ok(self.new_element_named(name))
    }

    fn new_attribute_named(&mut self, name: Name) -> NodeId {
        self.create(NodeData::Attribute { name, value: AttrValue::Flat(InternedString::empty()), type_info: None })
    }

    pub(crate) fn new_attribute(&mut self, name: &str) -> Result<NodeId> {
        let name = self.make_name(None, name)?;
        Ok(self.new_attribute_named(name))
    }

    pub(crate) fn new_attribute_ns(&mut self, namespace_uri: Option<&str>, qualified_name: &str) -> Result<NodeId> {
        let name = self.make_name(Some(namespace_uri), qualified_name)?;
        Ok(self.new_attribute_named(name))
    }

    pub(crate) fn new_text(&mut self, data: &str) -> NodeId {
        let data = self.intern(data);
        self.create(NodeData::Text(data))
    }

    pub(crate) fn new_cdata_section(&mut self, data: &str) -> NodeId {
        let data = self.intern(data);
        self.create(NodeData::CDataSection(data))
    }

    pub(crate) fn new_comment(&mut self, data: &str) -> NodeId {
        let data = self.intern(data);
        self.create(NodeData::Comment(data))
    }

    pub(crate) fn new_processing_instruction(&mut self, target: &str, data: &str) -> Result<NodeId> {
        self.check_name(target)?;
        let (target, data) = (self.intern(target), self.intern(data));
        Ok(self.create(NodeData::ProcessingInstruction { target, data }))
    }

    pub(crate) fn new_fragment(&mut self) -> NodeId {
        self.create(NodeData::DocumentFragment)
    }

    /// An entity reference starts out with copies of the children of
    /// the entity it names, if the document type declares one, and is
    /// read-only from then on.
    pub(crate) fn new_entity_reference(&mut self, name: &str) -> Result<NodeId> {
        self.check_name(name)?;
        let interned = self.intern(name);
        let reference = self.create(NodeData::EntityReference(interned));

        let declared = self.doctype().and_then(|doctype| {
            self.ensure(doctype, Need::Children);
            self.named_item(doctype, MapKind::Entities, NamedKey::Name(name))
        });
        if let Some(entity) = declared {
            self.ensure(entity, Need::Children);
            for child in self.child_ids(entity) {
                let copy = self.clone_node(child, true);
                self.siblings(reference).insert_before(copy, None);
            }
        }

        self.set_read_only(reference, true, true);
        Ok(reference)
    }

    pub(crate) fn new_document_type(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
    ) -> Result<NodeId> {
        if self.error_checking() {
            qname::parse_qname(name, self.config.xml_version)?;
        }
        let mut data = DocumentTypeData::new(self.intern(name));
        data.public_id = public_id.map(|p| self.intern(p));
        data.system_id = system_id.map(|s| self.intern(s));
        Ok(self.create(NodeData::DocumentType(Box::new(data))))
    }

    pub(crate) fn new_entity(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
        notation_name: Option<&str>,
    ) -> Result<NodeId> {
        self.check_name(name)?;
        let data = NodeData::Entity {
            name: self.intern(name),
            public_id: public_id.map(|p| self.intern(p)),
            system_id: system_id.map(|s| self.intern(s)),
            notation_name: notation_name.map(|n| self.intern(n)),
        };
        Ok(self.create(data))
    }

    pub(crate) fn new_notation(&mut self, name: &str, public_id: Option<&str>, system_id: Option<&str>) -> Result<NodeId> {
        self.check_name(name)?;
        let data = NodeData::Notation {
            name: self.intern(name),
            public_id: public_id.map(|p| self.intern(p)),
            system_id: system_id.map(|s| self.intern(s)),
        };
        Ok(self.create(data))
    }

    /// Append without checks; used while building copies.
    pub(crate) fn append_unchecked(&mut self, parent: NodeId, child: NodeId) {
        self.siblings(parent).insert_before(child, None);
        if self.kind(child) == NodeKind::Text {
            let previous = siblings::previous_sibling(self, child);
            let empty = self[child].data.character_data().map_or(true, |d| d.as_slice().is_empty());
            if empty || previous.map_or(false, |p| self.kind(p) == NodeKind::Text) {
                self.mark_unnormalized(parent);
            }
        } else if !self[child].flags.normalized {
            self.mark_unnormalized(parent);
        }
    }

    /// Allocate a detached copy of a node record with fresh links.
    pub(crate) fn alloc_copy(&mut self, data: NodeData, source: NodeId) -> NodeId {
        let mut node = Node::new(data);
        node.flags.specified = self[source].flags.specified;
        node.flags.ignorable_whitespace = self[source].flags.ignorable_whitespace;
        node.flags.id_attribute = self[source].flags.id_attribute;
        self.alloc(node)
    }
}
