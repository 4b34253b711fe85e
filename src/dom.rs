//! A traditional DOM tree interface for navigating and manipulating
//! XML documents.
//!
//! Every handle is a `Copy` pair of a document and a node index. The
//! tree itself is only borrowed for the duration of a single call, so
//! handles can be freely held, compared and passed around.

use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::Rc;
use std::{fmt, hash, ptr};

use log::debug;

use super::attr_value::ValueText;
use super::attributes::{MapKind, NamedKey};
use super::collections::{NamedNodeMap, NodeList};
use super::config::XmlVersion;
use super::deferred::Need;
use super::error::{Error, Result};
use super::events::{Mutation, MutationObserver};
use super::fixup::{self, Diagnostic, NormalizeOptions};
use super::normalize;
use super::raw::{self, AttrValue, CopyLog, NodeData, NodeId, NodeKind, Tree};
use super::siblings;
use super::string_pool::InternedString;
use super::user_data::{self, UserData, UserDataHandler, UserDataOperation, UserDataTable};

/// An XML document
#[derive(Copy, Clone)]
pub struct Document<'d> {
    storage: &'d raw::Storage,
}

fn value_text<'d>(value: ValueText) -> Cow<'d, str> {
    match value {
        ValueText::Interned(s) => Cow::Borrowed(s.as_slice()),
        ValueText::Computed(s) => Cow::Owned(s),
    }
}

fn interned_value(tree: &Tree, value: ValueText) -> InternedString {
    match value {
        ValueText::Interned(s) => s,
        ValueText::Computed(s) => tree.intern(&s),
    }
}

fn opt_str<'d>(s: Option<InternedString>) -> Option<&'d str> {
    s.map(|s| s.as_slice())
}

/// Elements below `start` in document order, not including `start`.
fn elements_below<F>(tree: &mut Tree, start: NodeId, matches: F) -> Vec<NodeId>
    where F: Fn(&raw::Name) -> bool
{
    let mut found = Vec::new();
    let mut stack = vec![start];
    while let Some(id) = stack.pop() {
        tree.ensure(id, Need::Children);
        if id != start && tree.kind(id) == NodeKind::Element && tree[id].data.name().map_or(false, &matches) {
            found.push(id);
        }
        let mut children = tree.child_ids(id);
        children.reverse();
        stack.extend(children);
    }
    found
}

fn tag_matches(name: &raw::Name, tag: &str) -> bool {
    tag == "*" || name.qualified.as_slice() == tag
}

fn tag_matches_ns(name: &raw::Name, namespace_uri: Option<&str>, local_name: &str) -> bool {
    let ns_ok = namespace_uri == Some("*") || opt_str(name.namespace_uri) == namespace_uri;
    let local_ok = local_name == "*" || opt_str(name.local_name) == Some(local_name);
    ns_ok && local_ok
}

fn collect_text(tree: &mut Tree, id: NodeId, out: &mut String) {
    tree.ensure(id, Need::Children);
    for child in tree.child_ids(id) {
        match tree.kind(child) {
            NodeKind::Text | NodeKind::CDataSection => {
                tree.ensure(child, Need::Data);
                if let Some(d) = tree[child].data.character_data() {
                    out.push_str(d.as_slice());
                }
            }
            NodeKind::Element | NodeKind::EntityReference => collect_text(tree, child, out),
            _ => {}
        }
    }
}

impl<'d> Document<'d> {
    pub(crate) fn new(storage: &'d raw::Storage) -> Document<'d> {
        Document { storage }
    }

    /// Run `f` with the tree borrowed. Observers are never called from
    /// inside `f`.
    pub(crate) fn with_tree<F, R>(self, f: F) -> R
        where F: FnOnce(&mut Tree) -> R
    {
        f(&mut self.storage.tree.borrow_mut())
    }

    pub(crate) fn intern(self, s: &str) -> InternedString {
        self.storage.strings.intern_raw(s)
    }

    pub(crate) fn has_observer(self) -> bool {
        self.storage.observer.borrow().is_some()
    }

    pub(crate) fn notify(self, mutation: Mutation<'d>) {
        if let Some(observer) = self.storage.observer.borrow().as_ref() {
            observer.observe(&mutation);
        }
    }

    pub(crate) fn user_data_table(self) -> &'d RefCell<UserDataTable> {
        &self.storage.user_data
    }

    /// Run a clone or import of nodes of `source` into this document.
    /// When any node of `source` carries user data, every copy made is
    /// recorded for the handlers.
    fn record_copies<F, R>(self, source: Document<'_>, importing: bool, copy: F) -> (R, Vec<(NodeId, NodeId)>)
        where F: FnOnce(&mut Tree) -> R
    {
        if source.user_data_table().borrow().is_empty() {
            return (self.with_tree(copy), Vec::new());
        }
        self.with_tree(|t| {
            t.copy_log = Some(CopyLog { importing, pairs: Vec::new() });
            let result = copy(t);
            (result, t.copy_log.take().map(|log| log.pairs).unwrap_or_default())
        })
    }

    pub(crate) fn clone_id(self, id: NodeId, deep: bool) -> NodeId {
        let (copy, pairs) = self.record_copies(self, false, |t| t.clone_node(id, deep));
        user_data::run_handlers(self, self, UserDataOperation::Cloned, &pairs);
        copy
    }

    pub(crate) fn wrap(self, id: NodeId) -> Node<'d> {
        let kind = self.with_tree(|t| t.kind(id));
        Node::new(self, kind, id)
    }

    fn wrap_all(self, ids: Vec<NodeId>) -> Vec<Node<'d>> {
        ids.into_iter().map(|id| self.wrap(id)).collect()
    }

    fn check_owner(self, node: Node<'_>) -> Result<()> {
        if ptr::eq(self.storage, node.document().storage) {
            Ok(())
        } else {
            Err(Error::WrongOwner { kind: node.kind() })
        }
    }

    pub fn root(self) -> Root<'d> {
        let id = self.with_tree(|t| t.root);
        Root { document: self, id }
    }

    pub fn document_element(self) -> Option<Element<'d>> {
        self.with_tree(|t| t.document_element()).map(|id| Element { document: self, id })
    }

    pub fn doctype(self) -> Option<DocumentType<'d>> {
        self.with_tree(|t| t.doctype()).map(|id| DocumentType { document: self, id })
    }

    pub fn xml_version(self) -> XmlVersion {
        self.with_tree(|t| t.config.xml_version)
    }

    pub fn error_checking(self) -> bool {
        self.with_tree(|t| t.error_checking())
    }

    /// Turn the precondition checks of later mutations on or off.
    pub fn set_error_checking(self, enabled: bool) {
        self.with_tree(|t| t.config.error_checking = enabled)
    }

    /// Switch the XML version whose rules later edits follow. Names
    /// created under the old version are rechecked by
    /// [`normalize_document`](Document::normalize_document).
    pub fn set_xml_version(self, version: XmlVersion) {
        self.with_tree(|t| {
            if t.config.xml_version != version {
                t.config.xml_version = version;
                t.properties.version_changed = true;
            }
        })
    }

    /// The encoding the document was read with, as reported by the
    /// parser.
    pub fn input_encoding(self) -> Option<&'d str> {
        self.with_tree(|t| opt_str(t.properties.input_encoding))
    }

    pub fn set_input_encoding(self, encoding: Option<&str>) {
        let encoding = encoding.map(|e| self.intern(e));
        self.with_tree(|t| t.properties.input_encoding = encoding)
    }

    /// The encoding named by the XML declaration.
    pub fn xml_encoding(self) -> Option<&'d str> {
        self.with_tree(|t| opt_str(t.properties.xml_encoding))
    }

    pub fn set_xml_encoding(self, encoding: Option<&str>) {
        let encoding = encoding.map(|e| self.intern(e));
        self.with_tree(|t| t.properties.xml_encoding = encoding)
    }

    pub fn xml_standalone(self) -> bool {
        self.with_tree(|t| t.properties.xml_standalone)
    }

    pub fn set_xml_standalone(self, standalone: bool) {
        self.with_tree(|t| t.properties.xml_standalone = standalone)
    }

    pub fn document_uri(self) -> Option<&'d str> {
        self.with_tree(|t| opt_str(t.properties.document_uri))
    }

    pub fn set_document_uri(self, uri: Option<&str>) {
        let uri = uri.map(|u| self.intern(u));
        self.with_tree(|t| t.properties.document_uri = uri)
    }

    /// A counter bumped by every structural change.
    pub fn changes(self) -> u64 {
        self.with_tree(|t| t.changes)
    }

    /// Install the observer notified of every later edit, replacing
    /// any previous one. Calls made from inside an observer callback
    /// are ignored.
    pub fn set_mutation_observer<O>(self, observer: O)
        where O: MutationObserver + 'static
    {
        match self.storage.observer.try_borrow_mut() {
            Ok(mut slot) => *slot = Some(Box::new(observer)),
            Err(_) => debug!("ignoring an observer installed during a notification"),
        }
    }

    pub fn clear_mutation_observer(self) {
        match self.storage.observer.try_borrow_mut() {
            Ok(mut slot) => *slot = None,
            Err(_) => debug!("ignoring an observer removal during a notification"),
        }
    }

    pub fn create_element(self, name: &str) -> Result<Element<'d>> {
        let id = self.with_tree(|t| t.new_element(name))?;
        Ok(Element { document: self, id })
    }

    pub fn create_element_ns(self, namespace_uri: Option<&str>, qualified_name: &str) -> Result<Element<'d>> {
        let id = self.with_tree(|t| t.new_element_ns(namespace_uri, qualified_name))?;
        Ok(Element { document: self, id })
    }

    pub fn create_attribute(self, name: &str) -> Result<Attribute<'d>> {
        let id = self.with_tree(|t| t.new_attribute(name))?;
        Ok(Attribute { document: self, id })
    }

    pub fn create_attribute_ns(self, namespace_uri: Option<&str>, qualified_name: &str) -> Result<Attribute<'d>> {
        let id = self.with_tree(|t| t.new_attribute_ns(namespace_uri, qualified_name))?;
        Ok(Attribute { document: self, id })
    }

    pub fn create_text(self, data: &str) -> Text<'d> {
        let id = self.with_tree(|t| t.new_text(data));
        Text { document: self, id }
    }

    pub fn create_cdata_section(self, data: &str) -> CDataSection<'d> {
        let id = self.with_tree(|t| t.new_cdata_section(data));
        CDataSection { document: self, id }
    }

    pub fn create_comment(self, data: &str) -> Comment<'d> {
        let id = self.with_tree(|t| t.new_comment(data));
        Comment { document: self, id }
    }

    pub fn create_processing_instruction(self, target: &str, data: &str) -> Result<ProcessingInstruction<'d>> {
        let id = self.with_tree(|t| t.new_processing_instruction(target, data))?;
        Ok(ProcessingInstruction { document: self, id })
    }

    /// An entity reference holds read-only copies of the children of
    /// the entity it names, when the document type declares one.
    pub fn create_entity_reference(self, name: &str) -> Result<EntityReference<'d>> {
        let id = self.with_tree(|t| t.new_entity_reference(name))?;
        Ok(EntityReference { document: self, id })
    }

    pub fn create_document_fragment(self) -> DocumentFragment<'d> {
        let id = self.with_tree(|t| t.new_fragment());
        DocumentFragment { document: self, id }
    }

    pub fn create_document_type(
        self,
        name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
    ) -> Result<DocumentType<'d>> {
        let id = self.with_tree(|t| t.new_document_type(name, public_id, system_id))?;
        Ok(DocumentType { document: self, id })
    }

    pub fn create_entity(
        self,
        name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
        notation_name: Option<&str>,
    ) -> Result<Entity<'d>> {
        let id = self.with_tree(|t| t.new_entity(name, public_id, system_id, notation_name))?;
        Ok(Entity { document: self, id })
    }

    pub fn create_notation(self, name: &str, public_id: Option<&str>, system_id: Option<&str>) -> Result<Notation<'d>> {
        let id = self.with_tree(|t| t.new_notation(name, public_id, system_id))?;
        Ok(Notation { document: self, id })
    }

    /// The element carrying an ID attribute with this value, as long as
    /// it is part of the document.
    pub fn element_by_id(self, value: &str) -> Option<Element<'d>> {
        self.with_tree(|t| t.element_by_id(value)).map(|id| Element { document: self, id })
    }

    /// All elements of the document with this qualified name, in
    /// document order. `"*"` matches every element.
    pub fn elements_by_tag_name(self, name: &str) -> Vec<Element<'d>> {
        self.root().elements_by_tag_name(name)
    }

    pub fn elements_by_tag_name_ns(self, namespace_uri: Option<&str>, local_name: &str) -> Vec<Element<'d>> {
        self.root().elements_by_tag_name_ns(namespace_uri, local_name)
    }

    /// Copy a node from any document into this one. Only specified
    /// attributes are copied; this document's defaults apply to the
    /// copy. Documents and document types cannot be imported.
    pub fn import_node<'s, N>(self, node: N, deep: bool) -> Result<Node<'d>>
        where N: Into<Node<'s>>
    {
        let node = node.into();
        if let kind @ NodeKind::Document | kind @ NodeKind::DocumentType = node.kind() {
            return Err(Error::NotSupported { kind });
        }
        let snapshot = node.document().with_tree(|t| t.snapshot(node.id(), deep));
        let (id, pairs) = self.record_copies(node.document(), true, |t| t.import(&snapshot, deep));
        let id = id?;
        user_data::run_handlers(node.document(), self, UserDataOperation::Imported, &pairs);
        Ok(self.wrap(id))
    }

    /// Change the name of an element or attribute in place.
    pub fn rename_node<N>(self, node: N, namespace_uri: Option<&str>, qualified_name: &str) -> Result<Node<'d>>
        where N: Into<Node<'d>>
    {
        let node = node.into();
        self.check_owner(node)?;

        match node {
            Node::Element(element) => {
                let old_name = self.with_tree(|t| -> Result<&'d str> {
                    let name = t.make_name(Some(namespace_uri), qualified_name)?;
                    t.ensure(element.id, Need::Data);
                    let old_name = t[element.id].data.node_name();
                    t.rename(element.id, name)?;
                    Ok(old_name)
                })?;
                self.notify(Mutation::ElementRenamed { element, old_name });
            }
            Node::Attribute(attribute) => {
                let owner = attribute.owner_element();
                self.with_tree(|t| {
                    let name = t.make_name(Some(namespace_uri), qualified_name)?;
                    t.rename(attribute.id, name)
                })?;
                if let Some(element) = owner {
                    self.notify(Mutation::AttributeNodeRemoved { element, attribute });
                    self.notify(Mutation::AttributeNodeSet { element, attribute, previous: None });
                }
            }
            other => return Err(Error::NotSupported { kind: other.kind() }),
        }
        user_data::run_handlers(self, self, UserDataOperation::Renamed, &[(node.id(), node.id())]);
        Ok(node)
    }

    /// Merge text, repair namespace declarations and check the content
    /// against the document's XML version. Problems are reported, not
    /// raised.
    pub fn normalize_document(self) -> Vec<Diagnostic<'d>> {
        self.normalize_document_with(NormalizeOptions::default())
    }

    pub fn normalize_document_with(self, options: NormalizeOptions) -> Vec<Diagnostic<'d>> {
        fixup::normalize_document(self, options)
    }
}

impl<'d> PartialEq for Document<'d> {
    fn eq(&self, other: &Document<'d>) -> bool {
        ptr::eq(self.storage, other.storage)
    }
}

impl<'d> Eq for Document<'d> {}

impl<'d> fmt::Debug for Document<'d> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Document {{ {:?} }}", self.storage as *const raw::Storage)
    }
}

macro_rules! node(
    ($name:ident, $doc:expr) => (
        #[doc = $doc]
        #[derive(Copy, Clone)]
        pub struct $name<'d> {
            document: Document<'d>,
            id: NodeId,
        }

        impl<'d> $name<'d> {
            pub fn document(&self) -> Document<'d> { self.document }

            pub fn as_node(&self) -> Node<'d> { Node::$name(*self) }

            pub fn parent(&self) -> Option<Node<'d>> { self.as_node().parent() }

            fn with_tree<F, R>(&self, f: F) -> R
                where F: FnOnce(&mut Tree, NodeId) -> R
            {
                let id = self.id;
                self.document.with_tree(|t| f(t, id))
            }
        }

        impl<'d> PartialEq for $name<'d> {
            fn eq(&self, other: &$name<'d>) -> bool {
                self.document == other.document && self.id == other.id
            }
        }

        impl<'d> Eq for $name<'d> {}

        impl<'d> hash::Hash for $name<'d> {
            fn hash<H>(&self, state: &mut H)
                where H: hash::Hasher
            {
                (self.document.storage as *const raw::Storage).hash(state);
                self.id.hash(state)
            }
        }

        impl<'d> fmt::Debug for $name<'d> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self.document.storage.tree.try_borrow_mut() {
                    Ok(mut tree) => {
                        tree.ensure(self.id, Need::Data);
                        let name = tree[self.id].data.node_name();
                        write!(f, "{} {{ {}: {:?} }}", stringify!($name), self.id.index(), name)
                    }
                    Err(_) => write!(f, "{} {{ {} }}", stringify!($name), self.id.index()),
                }
            }
        }
    )
);

/// Child-list operations shared by the node kinds that hold children.
macro_rules! container(
    ($name:ident) => (
        impl<'d> $name<'d> {
            pub fn append_child<C>(&self, child: C) -> Result<Node<'d>>
                where C: Into<Node<'d>>
            {
                self.as_node().append_child(child)
            }

            pub fn insert_before<C>(&self, child: C, reference: Option<Node<'d>>) -> Result<Node<'d>>
                where C: Into<Node<'d>>
            {
                self.as_node().insert_before(child, reference)
            }

            pub fn remove_child<C>(&self, child: C) -> Result<Node<'d>>
                where C: Into<Node<'d>>
            {
                self.as_node().remove_child(child)
            }

            pub fn replace_child<N, O>(&self, new_child: N, old_child: O) -> Result<Node<'d>>
                where N: Into<Node<'d>>,
                      O: Into<Node<'d>>,
            {
                self.as_node().replace_child(new_child, old_child)
            }

            pub fn child_nodes(&self) -> NodeList<'d> {
                self.as_node().child_nodes()
            }

            /// Descendant elements with this qualified name, in
            /// document order. `"*"` matches every element.
            pub fn elements_by_tag_name(&self, name: &str) -> Vec<Element<'d>> {
                let document = self.document;
                self.with_tree(|t, id| elements_below(t, id, |n| tag_matches(n, name)))
                    .into_iter().map(|id| Element { document, id }).collect()
            }

            pub fn elements_by_tag_name_ns(&self, namespace_uri: Option<&str>, local_name: &str) -> Vec<Element<'d>> {
                let document = self.document;
                self.with_tree(|t, id| elements_below(t, id, |n| tag_matches_ns(n, namespace_uri, local_name)))
                    .into_iter().map(|id| Element { document, id }).collect()
            }
        }
    )
);

node!(
    Root,
    "The document node: the logical ancestor of every other node"
);

container!(Root);

node!(
    Element,
    "An element, holding attributes and child nodes"
);

container!(Element);

impl<'d> Element<'d> {
    pub fn name(&self) -> &'d str { self.as_node().node_name() }
    pub fn prefix(&self) -> Option<&'d str> { self.as_node().prefix() }
    pub fn local_name(&self) -> Option<&'d str> { self.as_node().local_name() }
    pub fn namespace_uri(&self) -> Option<&'d str> { self.as_node().namespace_uri() }

    fn wrap_attribute(&self, id: NodeId) -> Attribute<'d> {
        Attribute { document: self.document, id }
    }

    fn find(&self, key: NamedKey<'_>) -> Option<Attribute<'d>> {
        self.with_tree(|t, id| t.named_item(id, MapKind::Attributes, key))
            .map(|id| self.wrap_attribute(id))
    }

    pub fn attribute(&self, name: &str) -> Option<Attribute<'d>> {
        self.find(NamedKey::Name(name))
    }

    pub fn attribute_ns(&self, namespace_uri: Option<&str>, local_name: &str) -> Option<Attribute<'d>> {
        self.find(NamedKey::Namespaced(namespace_uri, local_name))
    }

    pub fn attribute_value(&self, name: &str) -> Option<Cow<'d, str>> {
        self.attribute(name).map(|a| a.value())
    }

    pub fn attribute_value_ns(&self, namespace_uri: Option<&str>, local_name: &str) -> Option<Cow<'d, str>> {
        self.attribute_ns(namespace_uri, local_name).map(|a| a.value())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    pub fn has_attribute_ns(&self, namespace_uri: Option<&str>, local_name: &str) -> bool {
        self.attribute_ns(namespace_uri, local_name).is_some()
    }

    /// All attributes, sorted by qualified name.
    pub fn attributes(&self) -> NamedNodeMap<'d> {
        NamedNodeMap::new(self.as_node(), MapKind::Attributes)
    }

    /// Set the value of the attribute with this qualified name,
    /// creating it if needed.
    pub fn set_attribute(&self, name: &str, value: &str) -> Result<Attribute<'d>> {
        if let Some(existing) = self.attribute(name) {
            existing.set_value(value)?;
            return Ok(existing);
        }
        let attr = self.document.create_attribute(name)?;
        attr.with_tree(|t, id| t.set_attr_value(id, value))?;
        self.set_attribute_node(attr)?;
        Ok(attr)
    }

    /// Set the value of the attribute with this namespace and local
    /// name. An existing attribute takes on the prefix of
    /// `qualified_name`.
    pub fn set_attribute_ns(&self, namespace_uri: Option<&str>, qualified_name: &str, value: &str) -> Result<Attribute<'d>> {
        let name = self.with_tree(|t, _| t.make_name(Some(namespace_uri), qualified_name))?;
        let local = opt_str(name.local_name).unwrap_or(qualified_name);

        if let Some(existing) = self.attribute_ns(namespace_uri, local) {
            if existing.name() != qualified_name {
                existing.with_tree(|t, id| t.rename(id, name))?;
            }
            existing.set_value(value)?;
            return Ok(existing);
        }
        let attr = self.document.create_attribute_ns(namespace_uri, qualified_name)?;
        attr.with_tree(|t, id| t.set_attr_value(id, value))?;
        self.set_attribute_node_ns(attr)?;
        Ok(attr)
    }

    fn attach(&self, attribute: Attribute<'d>, namespace_aware: bool) -> Result<Option<Attribute<'d>>> {
        self.document.check_owner(attribute.as_node())?;
        let previous = self.with_tree(|t, id| -> Result<_> {
            t.ensure(id, Need::Data);
            t.check_set_named(id, MapKind::Attributes, attribute.id)?;
            Ok(t.attach_named(id, MapKind::Attributes, attribute.id, namespace_aware))
        })?;
        let previous = previous.map(|id| self.wrap_attribute(id));
        if previous != Some(attribute) {
            self.document.notify(Mutation::AttributeNodeSet { element: *self, attribute, previous });
        }
        Ok(previous)
    }

    /// Attach an attribute, replacing one with the same qualified name.
    pub fn set_attribute_node(&self, attribute: Attribute<'d>) -> Result<Option<Attribute<'d>>> {
        self.attach(attribute, false)
    }

    /// Attach an attribute, replacing one with the same namespace and
    /// local name.
    pub fn set_attribute_node_ns(&self, attribute: Attribute<'d>) -> Result<Option<Attribute<'d>>> {
        self.attach(attribute, true)
    }

    fn remove(&self, key: NamedKey<'_>) -> Result<Option<Attribute<'d>>> {
        let removed = self.with_tree(|t, id| t.remove_named_item(id, MapKind::Attributes, key, true))?;
        let removed = removed.map(|id| self.wrap_attribute(id));
        if let Some(attribute) = removed {
            self.document.notify(Mutation::AttributeNodeRemoved { element: *self, attribute });
        }
        Ok(removed)
    }

    /// Remove the attribute with this qualified name. A declared
    /// default takes its place. Removing a missing attribute is not an
    /// error.
    pub fn remove_attribute(&self, name: &str) -> Result<Option<Attribute<'d>>> {
        self.remove(NamedKey::Name(name))
    }

    pub fn remove_attribute_ns(&self, namespace_uri: Option<&str>, local_name: &str) -> Result<Option<Attribute<'d>>> {
        self.remove(NamedKey::Namespaced(namespace_uri, local_name))
    }

    pub fn remove_attribute_node(&self, attribute: Attribute<'d>) -> Result<Attribute<'d>> {
        self.document.check_owner(attribute.as_node())?;
        self.with_tree(|t, id| -> Result<()> {
            t.ensure(id, Need::Data);
            if t.error_checking() && t[id].flags.read_only {
                return Err(Error::ReadOnly { kind: NodeKind::Element });
            }
            match t.index_of_entry(id, MapKind::Attributes, attribute.id) {
                Some(idx) => {
                    t.remove_named_at(id, MapKind::Attributes, idx);
                    Ok(())
                }
                None => Err(Error::NotFound { kind: NodeKind::Attribute }),
            }
        })?;
        self.document.notify(Mutation::AttributeNodeRemoved { element: *self, attribute });
        Ok(attribute)
    }

    /// Declare whether the named attribute is an ID attribute, adding
    /// or removing the element from the ID index.
    pub fn set_id_attribute(&self, name: &str, is_id: bool) -> Result<()> {
        let attribute = self.attribute(name).ok_or_else(|| Error::AttributeNotFound { name: name.to_owned() })?;
        self.set_id_attribute_node(attribute, is_id)
    }

    pub fn set_id_attribute_ns(&self, namespace_uri: Option<&str>, local_name: &str, is_id: bool) -> Result<()> {
        let attribute = self.attribute_ns(namespace_uri, local_name)
            .ok_or_else(|| Error::AttributeNotFound { name: local_name.to_owned() })?;
        self.set_id_attribute_node(attribute, is_id)
    }

    pub fn set_id_attribute_node(&self, attribute: Attribute<'d>, is_id: bool) -> Result<()> {
        self.document.check_owner(attribute.as_node())?;
        self.with_tree(|t, id| {
            t.ensure(id, Need::Data);
            if t.error_checking() && t[id].flags.read_only {
                return Err(Error::ReadOnly { kind: NodeKind::Element });
            }
            if t.owner_element(attribute.id) != Some(id) {
                return Err(Error::NotFound { kind: NodeKind::Attribute });
            }
            t.unregister_id(attribute.id);
            t[attribute.id].flags.id_attribute = is_id;
            t.register_id(attribute.id);
            Ok(())
        })
    }

    /// Replace the defaulted attributes by the defaults currently
    /// declared for this element's name.
    pub fn reconcile_default_attributes(&self) {
        self.with_tree(|t, id| t.reconcile_default_attributes(id))
    }

    /// Copy this element and its attributes, and with `deep` its
    /// descendants. The copy is detached.
    pub fn clone_node(&self, deep: bool) -> Element<'d> {
        let id = self.document.clone_id(self.id, deep);
        Element { document: self.document, id }
    }
}

/// A validator-supplied type annotation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TypeInfo<'d> {
    pub name: &'d str,
    pub namespace_uri: Option<&'d str>,
}

node!(
    Attribute,
    "Metadata about an element, stored as a flat value or as text and entity reference children"
);

impl<'d> Attribute<'d> {
    pub fn name(&self) -> &'d str { self.as_node().node_name() }
    pub fn prefix(&self) -> Option<&'d str> { self.as_node().prefix() }
    pub fn local_name(&self) -> Option<&'d str> { self.as_node().local_name() }
    pub fn namespace_uri(&self) -> Option<&'d str> { self.as_node().namespace_uri() }

    pub fn value(&self) -> Cow<'d, str> {
        value_text(self.with_tree(|t, id| t.attr_value(id)))
    }

    /// Replace the value. While an observer is installed the old value
    /// children are removed and a single text child is appended, each
    /// step reported as usual; otherwise the value collapses to a flat
    /// string.
    pub fn set_value(&self, value: &str) -> Result<()> {
        let old_value = if self.document.has_observer() {
            self.replace_value_children(value)?
        } else {
            self.with_tree(|t, id| -> Result<_> {
                let old = t.set_attr_value(id, value)?;
                Ok(interned_value(t, old))
            })?
        };
        self.document.notify(Mutation::AttributeValueModified { attribute: *self, old_value: old_value.as_slice() });
        Ok(())
    }

    fn replace_value_children(&self, value: &str) -> Result<InternedString> {
        let node = self.as_node();
        let old_value = self.with_tree(|t, id| -> Result<_> {
            t.ensure(id, Need::Data);
            if t.error_checking() && t[id].flags.read_only {
                return Err(Error::ReadOnly { kind: NodeKind::Attribute });
            }
            t.child_access(id);
            let old = t.attr_value(id);
            Ok(interned_value(t, old))
        })?;

        while let Some(child) = node.first_child() {
            node.remove_child(child)?;
        }
        if !value.is_empty() {
            node.append_child(self.document.create_text(value))?;
        }
        self.with_tree(|t, id| t[id].flags.specified = true);
        Ok(old_value)
    }

    /// False for attributes supplied from a declared default.
    pub fn specified(&self) -> bool {
        self.with_tree(|t, id| {
            t.ensure(id, Need::Data);
            t[id].flags.specified
        })
    }

    pub fn is_id(&self) -> bool {
        self.with_tree(|t, id| {
            t.ensure(id, Need::Data);
            t[id].flags.id_attribute
        })
    }

    pub fn owner_element(&self) -> Option<Element<'d>> {
        let document = self.document;
        self.with_tree(|t, id| t.owner_element(id)).map(|id| Element { document, id })
    }

    pub fn type_info(&self) -> Option<TypeInfo<'d>> {
        self.with_tree(|t, id| {
            t.ensure(id, Need::Data);
            match t[id].data {
                NodeData::Attribute { type_info: Some(info), .. } => Some(TypeInfo {
                    name: info.name.as_slice(),
                    namespace_uri: opt_str(info.namespace_uri),
                }),
                _ => None,
            }
        })
    }

    pub fn set_type_info(&self, info: Option<TypeInfo<'_>>) {
        let info = info.map(|i| raw::TypeInfo {
            name: self.document.intern(i.name),
            namespace_uri: i.namespace_uri.map(|ns| self.document.intern(ns)),
        });
        self.with_tree(|t, id| {
            t.ensure(id, Need::Data);
            if let NodeData::Attribute { ref mut type_info, .. } = t[id].data {
                *type_info = info;
            }
        })
    }

    /// A detached, specified copy with its value.
    pub fn clone_node(&self) -> Attribute<'d> {
        let id = self.document.clone_id(self.id, true);
        Attribute { document: self.document, id }
    }
}

macro_rules! character_data(
    ($name:ident) => (
        impl<'d> $name<'d> {
            pub fn data(&self) -> &'d str {
                self.with_tree(|t, id| {
                    t.ensure(id, Need::Data);
                    t[id].data.character_data().map_or("", |d| d.as_slice())
                })
            }

            pub fn set_data(&self, data: &str) -> Result<()> {
                let (old, new) = self.with_tree(|t, id| t.replace_data(id, data))?;
                self.document.notify(Mutation::CharacterDataModified {
                    node: self.as_node(),
                    old_value: old.as_slice(),
                    new_value: new.as_slice(),
                });
                Ok(())
            }

            /// The length of the data in characters.
            pub fn length(&self) -> usize {
                self.data().chars().count()
            }

            pub fn append_data(&self, data: &str) -> Result<()> {
                let mut joined = self.data().to_owned();
                joined.push_str(data);
                self.set_data(&joined)
            }

            pub fn clone_node(&self) -> $name<'d> {
                let id = self.document.clone_id(self.id, false);
                $name { document: self.document, id }
            }
        }
    )
);

node!(
    Text,
    "Character data content of an element or attribute"
);

character_data!(Text);

impl<'d> Text<'d> {
    /// Split at a character offset. This node keeps the data before
    /// the offset; a new sibling right after it receives the rest.
    pub fn split_text(&self, offset: usize) -> Result<Text<'d>> {
        let data = self.data();
        let length = data.chars().count();
        if offset > length {
            return Err(Error::IndexSize { offset, length });
        }
        let at = data.char_indices().nth(offset).map_or(data.len(), |(i, _)| i);
        let (head, tail) = data.split_at(at);

        let rest = self.document.create_text(tail);
        self.set_data(head)?;
        if let Some(parent) = self.parent() {
            parent.insert_before(rest, self.as_node().next_sibling())?;
        }
        Ok(rest)
    }

    /// Whitespace that a validator classified as ignorable.
    pub fn is_element_content_whitespace(&self) -> bool {
        self.with_tree(|t, id| {
            t.ensure(id, Need::Data);
            t[id].flags.ignorable_whitespace
        })
    }

    pub fn set_element_content_whitespace(&self, ignorable: bool) {
        self.with_tree(|t, id| {
            t.ensure(id, Need::Data);
            t[id].flags.ignorable_whitespace = ignorable;
        })
    }
}

node!(
    CDataSection,
    "Character data that is never merged with neighbouring text"
);

character_data!(CDataSection);

node!(
    Comment,
    "Human-readable information"
);

character_data!(Comment);

node!(
    ProcessingInstruction,
    "Metadata relevant to the application, but not the XML processor or other consumers"
);

impl<'d> ProcessingInstruction<'d> {
    pub fn target(&self) -> &'d str { self.as_node().node_name() }

    pub fn data(&self) -> &'d str {
        self.with_tree(|t, id| {
            t.ensure(id, Need::Data);
            t[id].data.character_data().map_or("", |d| d.as_slice())
        })
    }

    pub fn set_data(&self, data: &str) -> Result<()> {
        let (old, new) = self.with_tree(|t, id| t.replace_data(id, data))?;
        self.document.notify(Mutation::CharacterDataModified {
            node: self.as_node(),
            old_value: old.as_slice(),
            new_value: new.as_slice(),
        });
        Ok(())
    }
}

node!(
    EntityReference,
    "A read-only reference to a declared entity, holding copies of its children"
);

impl<'d> EntityReference<'d> {
    pub fn name(&self) -> &'d str { self.as_node().node_name() }
}

/// Setters for the string fields of declaration nodes.
fn edit_declaration<F>(document: Document<'_>, id: NodeId, edit: F) -> Result<()>
    where F: FnOnce(&mut NodeData)
{
    document.with_tree(|t| {
        t.ensure(id, Need::Data);
        if t.error_checking() && t[id].flags.read_only {
            return Err(Error::ReadOnly { kind: t.kind(id) });
        }
        edit(&mut t[id].data);
        Ok(())
    })
}

node!(
    Entity,
    "An entity declared by the document type"
);

container!(Entity);

impl<'d> Entity<'d> {
    pub fn name(&self) -> &'d str { self.as_node().node_name() }

    fn field(&self, pick: fn(&NodeData) -> Option<InternedString>) -> Option<&'d str> {
        self.with_tree(|t, id| {
            t.ensure(id, Need::Data);
            opt_str(pick(&t[id].data))
        })
    }

    pub fn public_id(&self) -> Option<&'d str> {
        self.field(|d| match *d { NodeData::Entity { public_id, .. } => public_id, _ => None })
    }

    pub fn system_id(&self) -> Option<&'d str> {
        self.field(|d| match *d { NodeData::Entity { system_id, .. } => system_id, _ => None })
    }

    pub fn notation_name(&self) -> Option<&'d str> {
        self.field(|d| match *d { NodeData::Entity { notation_name, .. } => notation_name, _ => None })
    }

    pub fn set_public_id(&self, value: Option<&str>) -> Result<()> {
        let value = value.map(|v| self.document.intern(v));
        edit_declaration(self.document, self.id, |d| {
            if let NodeData::Entity { ref mut public_id, .. } = *d { *public_id = value }
        })
    }

    pub fn set_system_id(&self, value: Option<&str>) -> Result<()> {
        let value = value.map(|v| self.document.intern(v));
        edit_declaration(self.document, self.id, |d| {
            if let NodeData::Entity { ref mut system_id, .. } = *d { *system_id = value }
        })
    }

    pub fn set_notation_name(&self, value: Option<&str>) -> Result<()> {
        let value = value.map(|v| self.document.intern(v));
        edit_declaration(self.document, self.id, |d| {
            if let NodeData::Entity { ref mut notation_name, .. } = *d { *notation_name = value }
        })
    }
}

node!(
    Notation,
    "A notation declared by the document type"
);

impl<'d> Notation<'d> {
    pub fn name(&self) -> &'d str { self.as_node().node_name() }

    pub fn public_id(&self) -> Option<&'d str> {
        self.with_tree(|t, id| {
            t.ensure(id, Need::Data);
            match t[id].data { NodeData::Notation { public_id, .. } => opt_str(public_id), _ => None }
        })
    }

    pub fn system_id(&self) -> Option<&'d str> {
        self.with_tree(|t, id| {
            t.ensure(id, Need::Data);
            match t[id].data { NodeData::Notation { system_id, .. } => opt_str(system_id), _ => None }
        })
    }

    pub fn set_public_id(&self, value: Option<&str>) -> Result<()> {
        let value = value.map(|v| self.document.intern(v));
        edit_declaration(self.document, self.id, |d| {
            if let NodeData::Notation { ref mut public_id, .. } = *d { *public_id = value }
        })
    }

    pub fn set_system_id(&self, value: Option<&str>) -> Result<()> {
        let value = value.map(|v| self.document.intern(v));
        edit_declaration(self.document, self.id, |d| {
            if let NodeData::Notation { ref mut system_id, .. } = *d { *system_id = value }
        })
    }
}

node!(
    DocumentType,
    "The document type declaration, holding entities, notations and default attributes"
);

impl<'d> DocumentType<'d> {
    fn fields<F, R>(&self, f: F) -> R
        where F: FnOnce(&raw::DocumentTypeData) -> R,
              R: Default,
    {
        self.with_tree(|t, id| {
            t.ensure(id, Need::Data);
            match t[id].data {
                NodeData::DocumentType(ref d) => f(d),
                _ => R::default(),
            }
        })
    }

    pub fn name(&self) -> &'d str { self.as_node().node_name() }
    pub fn public_id(&self) -> Option<&'d str> { self.fields(|d| opt_str(d.public_id)) }
    pub fn system_id(&self) -> Option<&'d str> { self.fields(|d| opt_str(d.system_id)) }
    pub fn internal_subset(&self) -> Option<&'d str> { self.fields(|d| opt_str(d.internal_subset)) }

    pub fn set_internal_subset(&self, subset: Option<&str>) -> Result<()> {
        let subset = subset.map(|s| self.document.intern(s));
        edit_declaration(self.document, self.id, |d| {
            if let NodeData::DocumentType(ref mut d) = *d { d.internal_subset = subset }
        })
    }

    /// Declared entities, sorted by name.
    pub fn entities(&self) -> NamedNodeMap<'d> {
        NamedNodeMap::new(self.as_node(), MapKind::Entities)
    }

    /// Declared notations, sorted by name.
    pub fn notations(&self) -> NamedNodeMap<'d> {
        NamedNodeMap::new(self.as_node(), MapKind::Notations)
    }

    /// Add a default attribute for elements named `element_name`. The
    /// attribute becomes part of this declaration and read-only.
    /// Elements created afterwards, or reconciled, receive a copy.
    pub fn declare_default_attribute(&self, element_name: &str, attribute: Attribute<'d>) -> Result<()> {
        self.document.check_owner(attribute.as_node())?;
        let element_name = self.document.intern(element_name);
        self.with_tree(|t, id| {
            t.ensure(attribute.id, Need::Data);
            if t[attribute.id].flags.owned {
                let name = t[attribute.id].data.node_name().to_owned();
                return Err(Error::InUse { name });
            }
            t.declare_default(id, element_name, attribute.id);
            Ok(())
        })
    }

    /// The read-only default attributes declared for an element name.
    pub fn default_attributes(&self, element_name: &str) -> NamedNodeMap<'d> {
        NamedNodeMap::new(self.as_node(), MapKind::Defaults(self.document.intern(element_name)))
    }
}

node!(
    DocumentFragment,
    "A lightweight container whose children move as a group when inserted"
);

container!(DocumentFragment);

macro_rules! unpack(
    ($enum_name:ident, $name:ident, $wrapper:ident, $inner:ident) => (
        pub fn $name(self) -> Option<$inner<'d>> {
            match self {
                $enum_name::$wrapper(n) => Some(n),
                _ => None,
            }
        }
    )
);

/// Any node of a document
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Node<'d> {
    Root(Root<'d>),
    Element(Element<'d>),
    Attribute(Attribute<'d>),
    Text(Text<'d>),
    CDataSection(CDataSection<'d>),
    Comment(Comment<'d>),
    ProcessingInstruction(ProcessingInstruction<'d>),
    EntityReference(EntityReference<'d>),
    Entity(Entity<'d>),
    Notation(Notation<'d>),
    DocumentType(DocumentType<'d>),
    DocumentFragment(DocumentFragment<'d>),
}

macro_rules! each_node(
    ($node:expr, $n:ident => $body:expr) => (
        match $node {
            Node::Root($n) => $body,
            Node::Element($n) => $body,
            Node::Attribute($n) => $body,
            Node::Text($n) => $body,
            Node::CDataSection($n) => $body,
            Node::Comment($n) => $body,
            Node::ProcessingInstruction($n) => $body,
            Node::EntityReference($n) => $body,
            Node::Entity($n) => $body,
            Node::Notation($n) => $body,
            Node::DocumentType($n) => $body,
            Node::DocumentFragment($n) => $body,
        }
    )
);

impl<'d> Node<'d> {
    unpack!(Node, root, Root, Root);
    unpack!(Node, element, Element, Element);
    unpack!(Node, attribute, Attribute, Attribute);
    unpack!(Node, text, Text, Text);
    unpack!(Node, cdata_section, CDataSection, CDataSection);
    unpack!(Node, comment, Comment, Comment);
    unpack!(Node, processing_instruction, ProcessingInstruction, ProcessingInstruction);
    unpack!(Node, entity_reference, EntityReference, EntityReference);
    unpack!(Node, entity, Entity, Entity);
    unpack!(Node, notation, Notation, Notation);
    unpack!(Node, document_type, DocumentType, DocumentType);
    unpack!(Node, document_fragment, DocumentFragment, DocumentFragment);

    pub(crate) fn new(document: Document<'d>, kind: NodeKind, id: NodeId) -> Node<'d> {
        match kind {
            NodeKind::Document => Node::Root(Root { document, id }),
            NodeKind::Element => Node::Element(Element { document, id }),
            NodeKind::Attribute => Node::Attribute(Attribute { document, id }),
            NodeKind::Text => Node::Text(Text { document, id }),
            NodeKind::CDataSection => Node::CDataSection(CDataSection { document, id }),
            NodeKind::Comment => Node::Comment(Comment { document, id }),
            NodeKind::ProcessingInstruction => Node::ProcessingInstruction(ProcessingInstruction { document, id }),
            NodeKind::EntityReference => Node::EntityReference(EntityReference { document, id }),
            NodeKind::Entity => Node::Entity(Entity { document, id }),
            NodeKind::Notation => Node::Notation(Notation { document, id }),
            NodeKind::DocumentType => Node::DocumentType(DocumentType { document, id }),
            NodeKind::DocumentFragment => Node::DocumentFragment(DocumentFragment { document, id }),
        }
    }

    pub(crate) fn id(self) -> NodeId {
        each_node!(self, n => n.id)
    }

    pub fn document(self) -> Document<'d> {
        each_node!(self, n => n.document)
    }

    fn with_tree<F, R>(self, f: F) -> R
        where F: FnOnce(&mut Tree, NodeId) -> R
    {
        let id = self.id();
        self.document().with_tree(|t| f(t, id))
    }

    fn wrap(self, id: Option<NodeId>) -> Option<Node<'d>> {
        id.map(|id| self.document().wrap(id))
    }

    pub fn kind(self) -> NodeKind {
        match self {
            Node::Root(..) => NodeKind::Document,
            Node::Element(..) => NodeKind::Element,
            Node::Attribute(..) => NodeKind::Attribute,
            Node::Text(..) => NodeKind::Text,
            Node::CDataSection(..) => NodeKind::CDataSection,
            Node::Comment(..) => NodeKind::Comment,
            Node::ProcessingInstruction(..) => NodeKind::ProcessingInstruction,
            Node::EntityReference(..) => NodeKind::EntityReference,
            Node::Entity(..) => NodeKind::Entity,
            Node::Notation(..) => NodeKind::Notation,
            Node::DocumentType(..) => NodeKind::DocumentType,
            Node::DocumentFragment(..) => NodeKind::DocumentFragment,
        }
    }

    pub fn node_name(self) -> &'d str {
        self.with_tree(|t, id| {
            t.ensure(id, Need::Data);
            t[id].data.node_name()
        })
    }

    /// The value of attributes, character data and processing
    /// instructions. Other kinds have none.
    pub fn node_value(self) -> Option<Cow<'d, str>> {
        match self {
            Node::Attribute(a) => Some(a.value()),
            _ => self.with_tree(|t, id| {
                t.ensure(id, Need::Data);
                t[id].data.character_data().map(|d| Cow::Borrowed(d.as_slice()))
            }),
        }
    }

    /// Set the value of a node that has one; other kinds ignore it.
    pub fn set_node_value(self, value: &str) -> Result<()> {
        match self {
            Node::Attribute(a) => a.set_value(value),
            Node::Text(n) => n.set_data(value),
            Node::CDataSection(n) => n.set_data(value),
            Node::Comment(n) => n.set_data(value),
            Node::ProcessingInstruction(n) => n.set_data(value),
            _ => Ok(()),
        }
    }

    fn name_part(self, pick: fn(&raw::Name) -> Option<InternedString>) -> Option<&'d str> {
        self.with_tree(|t, id| {
            t.ensure(id, Need::Data);
            opt_str(t[id].data.name().and_then(pick))
        })
    }

    pub fn namespace_uri(self) -> Option<&'d str> { self.name_part(|n| n.namespace_uri) }
    pub fn prefix(self) -> Option<&'d str> { self.name_part(|n| n.prefix) }
    pub fn local_name(self) -> Option<&'d str> { self.name_part(|n| n.local_name) }

    /// The parent of a node in a child list. Attributes, entities and
    /// notations have none.
    pub fn parent(self) -> Option<Node<'d>> {
        let parent = self.with_tree(|t, id| t.parent(id));
        self.wrap(parent)
    }

    pub fn first_child(self) -> Option<Node<'d>> {
        let child = self.with_tree(|t, id| {
            t.child_access(id);
            siblings::head(t, id)
        });
        self.wrap(child)
    }

    pub fn last_child(self) -> Option<Node<'d>> {
        let child = self.with_tree(|t, id| {
            t.child_access(id);
            siblings::tail(t, id)
        });
        self.wrap(child)
    }

    pub fn next_sibling(self) -> Option<Node<'d>> {
        let sibling = self.with_tree(|t, id| siblings::next_sibling(t, id));
        self.wrap(sibling)
    }

    pub fn previous_sibling(self) -> Option<Node<'d>> {
        let sibling = self.with_tree(|t, id| siblings::previous_sibling(t, id));
        self.wrap(sibling)
    }

    /// A live view of the children.
    pub fn child_nodes(self) -> NodeList<'d> {
        NodeList::new(self)
    }

    /// An attribute with a non-empty flat value reports a child without
    /// turning the value into nodes.
    pub fn has_child_nodes(self) -> bool {
        self.with_tree(|t, id| {
            t.ensure(id, Need::Children);
            match t[id].data {
                NodeData::Attribute { value: AttrValue::Flat(v), .. } => !v.as_slice().is_empty(),
                _ => siblings::head(t, id).is_some(),
            }
        })
    }

    /// Insert `new_child` before `reference`, or at the end. A
    /// fragment contributes its children instead of itself.
    pub fn insert_before<C>(self, new_child: C, reference: Option<Node<'d>>) -> Result<Node<'d>>
        where C: Into<Node<'d>>
    {
        let child = new_child.into();
        let document = self.document();
        document.check_owner(child)?;
        if let Some(reference) = reference {
            document.check_owner(reference)?;
        }
        let reference_id = reference.map(Node::id);

        if child.kind() == NodeKind::DocumentFragment {
            self.with_tree(|t, id| t.check_insert_fragment(id, child.id(), reference_id, None))?;
            self.move_fragment(child, reference_id, true)?;
            return Ok(child);
        }

        self.with_tree(|t, id| t.check_insert(id, child.id(), reference_id, None))?;
        let reference_id = self.with_tree(|t, _| match reference_id {
            Some(r) if r == child.id() => siblings::next_sibling(t, r),
            other => other,
        });
        child.detach_reported();
        document.notify(Mutation::Inserting { parent: self, child });
        self.with_tree(|t, id| t.insert_child(id, child.id(), reference_id));
        document.notify(Mutation::Inserted { parent: self, child });
        Ok(child)
    }

    /// Move the children of a fragment one at a time. Each child is
    /// checked again right before it moves, so an error part way
    /// leaves the earlier children moved.
    fn move_fragment(self, fragment: Node<'d>, reference: Option<NodeId>, report: bool) -> Result<()> {
        let document = self.document();
        let children = fragment.with_tree(|t, id| t.child_ids(id));
        for child_id in children {
            let child = document.wrap(child_id);
            self.with_tree(|t, id| t.check_insert(id, child_id, reference, None))?;
            if report {
                document.notify(Mutation::Inserting { parent: self, child });
            }
            self.with_tree(|t, id| t.insert_child(id, child_id, reference));
            if report {
                document.notify(Mutation::Inserted { parent: self, child });
            }
        }
        Ok(())
    }

    pub fn append_child<C>(self, new_child: C) -> Result<Node<'d>>
        where C: Into<Node<'d>>
    {
        self.insert_before(new_child, None)
    }

    /// Take a node out of its current parent, reporting the removal.
    fn detach_reported(self) {
        if let Some(parent) = self.parent() {
            let document = self.document();
            document.notify(Mutation::Removing { parent, child: self });
            parent.with_tree(|t, id| t.remove_child(id, self.id()));
            document.notify(Mutation::Removed { parent, child: self });
        }
    }

    pub fn remove_child<C>(self, old_child: C) -> Result<Node<'d>>
        where C: Into<Node<'d>>
    {
        let child = old_child.into();
        let document = self.document();
        document.check_owner(child)?;

        self.with_tree(|t, id| t.check_remove(id, child.id()))?;
        document.notify(Mutation::Removing { parent: self, child });
        self.with_tree(|t, id| t.remove_child(id, child.id()));
        document.notify(Mutation::Removed { parent: self, child });
        Ok(child)
    }

    /// Put `new_child` where `old_child` is and return `old_child`.
    /// Observers see one `Replacing`/`Replaced` pair.
    pub fn replace_child<N, O>(self, new_child: N, old_child: O) -> Result<Node<'d>>
        where N: Into<Node<'d>>,
              O: Into<Node<'d>>,
    {
        let (new, old) = (new_child.into(), old_child.into());
        let document = self.document();
        document.check_owner(new)?;
        document.check_owner(old)?;

        self.with_tree(|t, id| -> Result<()> {
            t.check_remove(id, old.id())?;
            if new.kind() == NodeKind::DocumentFragment {
                t.check_insert_fragment(id, new.id(), Some(old.id()), Some(old.id()))
            } else {
                t.check_insert(id, new.id(), Some(old.id()), Some(old.id()))
            }
        })?;

        document.notify(Mutation::Replacing { parent: self, new_child: new, old_child: old });
        if new != old {
            let reference = self.with_tree(|t, id| {
                let reference = siblings::next_sibling(t, old.id());
                t.remove_child(id, old.id());
                reference
            });
            if new.kind() == NodeKind::DocumentFragment {
                self.move_fragment(new, reference, false)?;
            } else {
                self.with_tree(|t, id| t.insert_child(id, new.id(), reference));
            }
        }
        document.notify(Mutation::Replaced { parent: self, new_child: new, old_child: old });
        Ok(old)
    }

    /// A detached copy; with `deep`, of the whole subtree. The
    /// document node cannot be cloned.
    pub fn clone_node(self, deep: bool) -> Result<Node<'d>> {
        if let Node::Root(..) = self {
            return Err(Error::NotSupported { kind: NodeKind::Document });
        }
        let id = self.document().clone_id(self.id(), deep);
        Ok(self.document().wrap(id))
    }

    /// Merge adjacent text nodes and drop empty ones throughout the
    /// subtree, including attribute values.
    pub fn normalize(self) {
        self.with_tree(|t, id| t.normalize(id))
    }

    /// False when the subtree may hold adjacent or empty text nodes.
    pub fn is_normalized(self) -> bool {
        self.with_tree(|t, id| {
            t.ensure(id, Need::Children);
            t[id].flags.normalized
        })
    }

    /// Deep structural equality, possibly across documents.
    pub fn is_equal_node<'o, N>(self, other: N) -> bool
        where N: Into<Node<'o>>
    {
        let other = other.into();
        let mine = self.with_tree(|t, id| t.snapshot(id, true));
        let theirs = other.with_tree(|t, id| t.snapshot(id, true));
        normalize::is_equal(&mine, &theirs)
    }

    pub fn is_same_node<N>(self, other: N) -> bool
        where N: Into<Node<'d>>
    {
        self == other.into()
    }

    /// Attach `data` under `key`, returning the value it replaces. The
    /// handler is told when this node is cloned, imported or renamed.
    pub fn set_user_data(
        self,
        key: &str,
        data: UserData,
        handler: Option<Rc<dyn UserDataHandler>>,
    ) -> Option<UserData> {
        self.document().user_data_table().borrow_mut().set(self.id(), key, data, handler)
    }

    pub fn user_data(self, key: &str) -> Option<UserData> {
        self.document().user_data_table().borrow().get(self.id(), key)
    }

    pub fn remove_user_data(self, key: &str) -> Option<UserData> {
        self.document().user_data_table().borrow_mut().remove(self.id(), key)
    }

    pub fn set_read_only(self, read_only: bool, deep: bool) {
        self.with_tree(|t, id| t.set_read_only(id, read_only, deep))
    }

    pub fn is_read_only(self) -> bool {
        self.with_tree(|t, id| {
            t.ensure(id, Need::Data);
            t[id].flags.read_only
        })
    }

    /// The concatenated text of the subtree, skipping comments and
    /// processing instructions. `None` for the document and for
    /// declarations.
    pub fn text_content(self) -> Option<String> {
        match self {
            Node::Root(..) | Node::DocumentType(..) | Node::Notation(..) => None,
            Node::Attribute(a) => Some(a.value().into_owned()),
            Node::Text(..) | Node::CDataSection(..) | Node::Comment(..) | Node::ProcessingInstruction(..) => {
                self.node_value().map(Cow::into_owned)
            }
            _ => Some(self.with_tree(|t, id| {
                let mut text = String::new();
                collect_text(t, id, &mut text);
                text
            })),
        }
    }

    /// Replace all children by a single text node, or set the value of
    /// a node that has one.
    pub fn set_text_content(self, text: &str) -> Result<()> {
        match self {
            Node::Root(..) | Node::DocumentType(..) | Node::Notation(..) => Ok(()),
            Node::Attribute(..) | Node::Text(..) | Node::CDataSection(..) |
            Node::Comment(..) | Node::ProcessingInstruction(..) => self.set_node_value(text),
            _ => {
                while let Some(child) = self.first_child() {
                    self.remove_child(child)?;
                }
                if !text.is_empty() {
                    let document = self.document();
                    self.append_child(document.create_text(text))?;
                }
                Ok(())
            }
        }
    }

    /// The namespace URI bound to `prefix` (the default namespace for
    /// `None`) in scope at this node.
    pub fn lookup_namespace_uri(self, prefix: Option<&str>) -> Option<&'d str> {
        opt_str(self.with_tree(|t, id| t.lookup_namespace_uri(id, prefix)))
    }

    /// A prefix bound to `namespace_uri` in scope at this node.
    pub fn lookup_prefix(self, namespace_uri: &str) -> Option<&'d str> {
        opt_str(self.with_tree(|t, id| t.lookup_prefix(id, namespace_uri)))
    }
}

macro_rules! conversion_trait(
    ($res_type:ident, {
        $($leaf_type:ident => $variant:expr),*
    }) => (
        $(impl<'d> From<$leaf_type<'d>> for $res_type<'d> {
            fn from(v: $leaf_type<'d>) -> $res_type<'d> {
                $variant(v)
            }
        })*

        $(impl<'a, 'd> From<&'a $leaf_type<'d>> for $res_type<'d> {
            fn from(v: &'a $leaf_type<'d>) -> $res_type<'d> {
                $variant(*v)
            }
        })*
    )
);

conversion_trait!(
    Node, {
        Root                  => Node::Root,
        Element               => Node::Element,
        Attribute             => Node::Attribute,
        Text                  => Node::Text,
        CDataSection          => Node::CDataSection,
        Comment               => Node::Comment,
        ProcessingInstruction => Node::ProcessingInstruction,
        EntityReference       => Node::EntityReference,
        Entity                => Node::Entity,
        Notation              => Node::Notation,
        DocumentType          => Node::DocumentType,
        DocumentFragment      => Node::DocumentFragment
    }
);

impl<'a, 'd> From<&'a Node<'d>> for Node<'d> {
    fn from(v: &'a Node<'d>) -> Node<'d> {
        *v
    }
}

#[cfg(test)]
mod test {
    use super::super::Package;
    use super::{Node, TypeInfo};
    use crate::config::XmlVersion;
    use crate::error::ErrorKind;
    use crate::raw::NodeKind;

    #[test]
    fn the_root_belongs_to_a_document() {
        let package = Package::new();
        let doc = package.as_document();

        let root = doc.root();

        assert_eq!(doc, root.document());
        assert_eq!(NodeKind::Document, root.as_node().kind());
        assert_eq!("#document", root.as_node().node_name());
    }

    #[test]
    fn root_can_have_element_children() {
        let package = Package::new();
        let doc = package.as_document();
        let element = doc.create_element("alpha").unwrap();

        doc.root().append_child(element).unwrap();

        let children = doc.root().child_nodes();
        assert_eq!(1, children.length());
        assert_eq!(Some(Node::Element(element)), children.item(0));
        assert_eq!(Some(element), doc.document_element());
    }

    #[test]
    fn nodes_know_their_siblings() {
        let package = Package::new();
        let doc = package.as_document();
        let parent = doc.create_element("p").unwrap();
        let a = doc.create_comment("a");
        let b = doc.create_text("b");
        parent.append_child(a).unwrap();
        parent.append_child(b).unwrap();

        assert_eq!(Some(b.as_node()), a.as_node().next_sibling());
        assert_eq!(Some(a.as_node()), b.as_node().previous_sibling());
        assert_eq!(None, a.as_node().previous_sibling());
        assert_eq!(None, b.as_node().next_sibling());
        assert_eq!(Some(b.as_node()), parent.as_node().last_child());
    }

    #[test]
    fn fragments_insert_their_children() {
        let package = Package::new();
        let doc = package.as_document();
        let parent = doc.create_element("p").unwrap();
        let fragment = doc.create_document_fragment();
        fragment.append_child(doc.create_element("a").unwrap()).unwrap();
        fragment.append_child(doc.create_element("b").unwrap()).unwrap();

        parent.append_child(fragment).unwrap();

        let names: Vec<_> = parent.child_nodes().iter().map(|n| n.node_name()).collect();
        assert_eq!(vec!["a", "b"], names);
        assert!(!fragment.as_node().has_child_nodes());
    }

    #[test]
    fn replacing_a_node_with_itself_changes_nothing() {
        let package = Package::new();
        let doc = package.as_document();
        let parent = doc.create_element("p").unwrap();
        let child = doc.create_element("c").unwrap();
        parent.append_child(child).unwrap();

        let old = parent.replace_child(child, child).unwrap();

        assert_eq!(child.as_node(), old);
        assert_eq!(Some(parent.as_node()), child.parent());
        assert_eq!(1, parent.child_nodes().length());
    }

    #[test]
    fn removing_a_node_that_is_not_a_child_fails() {
        let package = Package::new();
        let doc = package.as_document();
        let parent = doc.create_element("p").unwrap();
        let stranger = doc.create_element("s").unwrap();

        let err = parent.remove_child(stranger).unwrap_err();

        assert_eq!(ErrorKind::NotFound, err.kind());
    }

    #[test]
    fn text_content_skips_comments() {
        let package = Package::new();
        let doc = package.as_document();
        let e = doc.create_element("e").unwrap();
        let inner = doc.create_element("i").unwrap();
        e.append_child(doc.create_text("a")).unwrap();
        e.append_child(doc.create_comment("no")).unwrap();
        e.append_child(inner).unwrap();
        inner.append_child(doc.create_cdata_section("b")).unwrap();

        assert_eq!(Some("ab".to_owned()), e.as_node().text_content());
        assert_eq!(None, doc.root().as_node().text_content());
    }

    #[test]
    fn setting_text_content_replaces_children() {
        let package = Package::new();
        let doc = package.as_document();
        let e = doc.create_element("e").unwrap();
        e.append_child(doc.create_element("old").unwrap()).unwrap();

        e.as_node().set_text_content("new").unwrap();

        assert_eq!(1, e.child_nodes().length());
        assert_eq!(Some("new".to_owned()), e.as_node().text_content());
    }

    #[test]
    fn splitting_text_inserts_the_rest_after_it() {
        let package = Package::new();
        let doc = package.as_document();
        let e = doc.create_element("e").unwrap();
        let t = doc.create_text("héllo");
        e.append_child(t).unwrap();

        let rest = t.split_text(2).unwrap();

        assert_eq!("hé", t.data());
        assert_eq!("llo", rest.data());
        assert_eq!(Some(rest.as_node()), t.as_node().next_sibling());
        assert_eq!(ErrorKind::IndexSize, t.split_text(3).unwrap_err().kind());
    }

    #[test]
    fn character_data_can_be_extended() {
        let package = Package::new();
        let doc = package.as_document();
        let c = doc.create_comment("ab");

        c.append_data("cd").unwrap();

        assert_eq!("abcd", c.data());
        assert_eq!(4, c.length());
    }

    #[test]
    fn read_only_text_cannot_change() {
        let package = Package::new();
        let doc = package.as_document();
        let t = doc.create_text("a");
        t.as_node().set_read_only(true, false);

        assert_eq!(ErrorKind::ReadOnly, t.set_data("b").unwrap_err().kind());
    }

    #[test]
    fn elements_are_found_by_tag_name_in_document_order() {
        let package = Package::new();
        let doc = package.as_document();
        let root = doc.create_element("root").unwrap();
        let first = doc.create_element_ns(Some("urn:x"), "x:item").unwrap();
        let nested = doc.create_element("item").unwrap();
        let second = doc.create_element("item").unwrap();
        doc.root().append_child(root).unwrap();
        root.append_child(first).unwrap();
        first.append_child(nested).unwrap();
        root.append_child(second).unwrap();

        assert_eq!(vec![nested, second], doc.elements_by_tag_name("item"));
        assert_eq!(4, doc.elements_by_tag_name("*").len());
        assert_eq!(vec![first], doc.elements_by_tag_name_ns(Some("urn:x"), "item"));
        assert_eq!(vec![first], root.elements_by_tag_name_ns(Some("*"), "item"));
    }

    #[test]
    fn node_values_depend_on_the_kind() {
        let package = Package::new();
        let doc = package.as_document();
        let e = doc.create_element("e").unwrap();
        let pi = doc.create_processing_instruction("target", "data").unwrap();

        assert_eq!(None, e.as_node().node_value());
        assert_eq!(Some("data".into()), pi.as_node().node_value());

        pi.as_node().set_node_value("other").unwrap();
        assert_eq!("other", pi.data());
        assert_eq!("target", pi.target());
    }

    #[test]
    fn type_information_can_be_attached() {
        let package = Package::new();
        let doc = package.as_document();
        let a = doc.create_attribute("a").unwrap();

        a.set_type_info(Some(TypeInfo { name: "ID", namespace_uri: None }));

        assert_eq!(Some(TypeInfo { name: "ID", namespace_uri: None }), a.type_info());
    }

    #[test]
    fn the_document_node_cannot_be_cloned() {
        let package = Package::new();
        let doc = package.as_document();

        let err = doc.root().as_node().clone_node(true).unwrap_err();

        assert_eq!(ErrorKind::NotSupported, err.kind());
    }

    #[test]
    fn doctype_declarations_are_reachable() {
        let package = Package::new();
        let doc = package.as_document();
        let doctype = doc.create_document_type("root", Some("-//P"), Some("s.dtd")).unwrap();
        let notation = doc.create_notation("gif", None, Some("image/gif")).unwrap();
        doctype.notations().set_named_item(notation.into()).unwrap();
        doc.root().append_child(doctype).unwrap();

        let doctype = doc.doctype().unwrap();
        assert_eq!("root", doctype.name());
        assert_eq!(Some("-//P"), doctype.public_id());
        assert_eq!(Some("s.dtd"), doctype.system_id());
        let found = doctype.notations().get_named_item("gif").and_then(Node::notation);
        assert_eq!(Some("image/gif"), found.and_then(|n| n.system_id()));
    }

    #[test]
    fn document_properties_start_empty_and_can_be_set() {
        let package = Package::new();
        let doc = package.as_document();
        assert_eq!(None, doc.input_encoding());
        assert_eq!(None, doc.xml_encoding());
        assert_eq!(None, doc.document_uri());
        assert!(!doc.xml_standalone());

        doc.set_input_encoding(Some("UTF-16"));
        doc.set_xml_encoding(Some("utf-8"));
        doc.set_document_uri(Some("file:///tmp/a.xml"));
        doc.set_xml_standalone(true);
        doc.set_xml_version(XmlVersion::V1_1);

        assert_eq!(Some("UTF-16"), doc.input_encoding());
        assert_eq!(Some("utf-8"), doc.xml_encoding());
        assert_eq!(Some("file:///tmp/a.xml"), doc.document_uri());
        assert!(doc.xml_standalone());
        assert_eq!(XmlVersion::V1_1, doc.xml_version());

        doc.set_document_uri(None);
        assert_eq!(None, doc.document_uri());
    }
}
