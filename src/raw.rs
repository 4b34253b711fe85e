//! The node arena backing a document.
//!
//! Every node of a package lives in one `Vec<Node>` and is addressed by
//! a `NodeId`. Nodes are never freed; removing a node from the tree only
//! detaches it. Links between nodes (parent, siblings, children,
//! attribute owners) are plain indices, so the structure has no
//! ownership cycles.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::ops::{Index, IndexMut};
use std::rc::Rc;

use super::attributes::NamedNodes;
use super::config::Config;
use super::deferred::{DeferredRecords, SyncState};
use super::events::MutationObserver;
use super::identity::IdentityIndex;
use super::string_pool::{InternedString, StringPool};
use super::user_data::UserDataTable;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn index(self) -> usize { self.0 as usize }
}

/// The kind of a node, mirroring the DOM node types.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Element,
    Attribute,
    Text,
    CDataSection,
    Comment,
    ProcessingInstruction,
    EntityReference,
    Entity,
    Notation,
    DocumentType,
    DocumentFragment,
}

impl NodeKind {
    /// Whether a node of this kind may be placed directly inside a
    /// node of kind `self`.
    pub fn accepts_child(self, child: NodeKind) -> bool {
        use self::NodeKind::*;

        match self {
            Document => matches!(child, Element | ProcessingInstruction | Comment | DocumentType),
            DocumentFragment | Entity | EntityReference | Element => {
                matches!(child, Element | ProcessingInstruction | Comment | Text | CDataSection | EntityReference)
            }
            Attribute => matches!(child, Text | EntityReference),
            _ => false,
        }
    }

    pub fn is_character_data(self) -> bool {
        matches!(self, NodeKind::Text | NodeKind::CDataSection | NodeKind::Comment)
    }

    /// Nodes of these kinds have a parent pointer and sit in a sibling
    /// list. Attributes, entities and notations live in named maps
    /// instead.
    pub fn is_child(self) -> bool {
        !matches!(self, NodeKind::Document | NodeKind::Attribute | NodeKind::Entity | NodeKind::Notation)
    }
}

/// Per-node state bits.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Flags {
    pub read_only: bool,
    /// Advisory: may be false for a normalized subtree, never true for
    /// an unnormalized one.
    pub normalized: bool,
    /// Attributes: explicitly given rather than defaulted.
    pub specified: bool,
    /// Attached to a parent, owner element, or declaring doctype.
    pub owned: bool,
    /// Head of its sibling list; `previous` then points at the tail.
    pub first_child: bool,
    pub ignorable_whitespace: bool,
    pub id_attribute: bool,
}

impl Default for Flags {
    fn default() -> Flags {
        Flags {
            read_only: false,
            normalized: true,
            specified: true,
            owned: false,
            first_child: false,
            ignorable_whitespace: false,
            id_attribute: false,
        }
    }
}

/// The name of an element or attribute. `local_name` is `None` for
/// nodes created through the namespace-unaware factory methods.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Name {
    pub qualified: InternedString,
    pub namespace_uri: Option<InternedString>,
    pub prefix: Option<InternedString>,
    pub local_name: Option<InternedString>,
}

impl Name {
    pub fn plain(qualified: InternedString) -> Name {
        Name { qualified, namespace_uri: None, prefix: None, local_name: None }
    }

    pub fn empty() -> Name {
        Name::plain(InternedString::empty())
    }

    /// Namespace-aware comparison used by the `*_ns` lookups. Nodes
    /// without a local name are matched on their qualified name.
    pub fn matches_ns(&self, namespace_uri: Option<&str>, local_name: &str) -> bool {
        let ns = self.namespace_uri.map(|n| n.as_slice());
        let local = self.local_name.unwrap_or(self.qualified);
        ns == namespace_uri && local.as_slice() == local_name
    }
}

/// A type annotation attached by a validator.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    pub name: InternedString,
    pub namespace_uri: Option<InternedString>,
}

/// The value of an attribute: a flat string until child-level access
/// turns it into a list of child nodes. The transition is one-way.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Flat(InternedString),
    Structured,
}

#[derive(Debug, Clone)]
pub enum NodeData {
    Document,
    Element {
        name: Name,
        attributes: NamedNodes,
    },
    Attribute {
        name: Name,
        value: AttrValue,
        type_info: Option<TypeInfo>,
    },
    Text(InternedString),
    CDataSection(InternedString),
    Comment(InternedString),
    ProcessingInstruction {
        target: InternedString,
        data: InternedString,
    },
    EntityReference(InternedString),
    Entity {
        name: InternedString,
        public_id: Option<InternedString>,
        system_id: Option<InternedString>,
        notation_name: Option<InternedString>,
    },
    Notation {
        name: InternedString,
        public_id: Option<InternedString>,
        system_id: Option<InternedString>,
    },
    DocumentType(Box<DocumentTypeData>),
    DocumentFragment,
}

#[derive(Debug, Clone)]
pub struct DocumentTypeData {
    pub name: InternedString,
    pub public_id: Option<InternedString>,
    pub system_id: Option<InternedString>,
    pub internal_subset: Option<InternedString>,
    pub entities: NamedNodes,
    pub notations: NamedNodes,
    /// Default-attribute templates keyed by element qualified name.
    pub element_defaults: BTreeMap<InternedString, NamedNodes>,
}

impl DocumentTypeData {
    pub fn new(name: InternedString) -> DocumentTypeData {
        DocumentTypeData {
            name,
            public_id: None,
            system_id: None,
            internal_subset: None,
            entities: NamedNodes::default(),
            notations: NamedNodes::default(),
            element_defaults: BTreeMap::new(),
        }
    }
}

impl NodeData {
    /// Stand-in data for a node whose fields have not been read from
    /// the deferred records yet.
    pub fn placeholder(kind: NodeKind) -> NodeData {
        let empty = InternedString::empty();
        match kind {
            NodeKind::Document => NodeData::Document,
            NodeKind::Element => NodeData::Element { name: Name::empty(), attributes: NamedNodes::default() },
            NodeKind::Attribute => NodeData::Attribute { name: Name::empty(), value: AttrValue::Flat(empty), type_info: None },
            NodeKind::Text => NodeData::Text(empty),
            NodeKind::CDataSection => NodeData::CDataSection(empty),
            NodeKind::Comment => NodeData::Comment(empty),
            NodeKind::ProcessingInstruction => NodeData::ProcessingInstruction { target: empty, data: empty },
            NodeKind::EntityReference => NodeData::EntityReference(empty),
            NodeKind::Entity => NodeData::Entity { name: empty, public_id: None, system_id: None, notation_name: None },
            NodeKind::Notation => NodeData::Notation { name: empty, public_id: None, system_id: None },
            NodeKind::DocumentType => NodeData::DocumentType(Box::new(DocumentTypeData::new(empty))),
            NodeKind::DocumentFragment => NodeData::DocumentFragment,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match *self {
            NodeData::Document => NodeKind::Document,
            NodeData::Element { .. } => NodeKind::Element,
            NodeData::Attribute { .. } => NodeKind::Attribute,
            NodeData::Text(..) => NodeKind::Text,
            NodeData::CDataSection(..) => NodeKind::CDataSection,
            NodeData::Comment(..) => NodeKind::Comment,
            NodeData::ProcessingInstruction { .. } => NodeKind::ProcessingInstruction,
            NodeData::EntityReference(..) => NodeKind::EntityReference,
            NodeData::Entity { .. } => NodeKind::Entity,
            NodeData::Notation { .. } => NodeKind::Notation,
            NodeData::DocumentType(..) => NodeKind::DocumentType,
            NodeData::DocumentFragment => NodeKind::DocumentFragment,
        }
    }

    /// The element or attribute name, if this node has one.
    pub fn name(&self) -> Option<&Name> {
        match *self {
            NodeData::Element { ref name, .. } |
            NodeData::Attribute { ref name, .. } => Some(name),
            _ => None,
        }
    }

    /// The DOM `nodeName`.
    pub fn node_name<'s>(&self) -> &'s str {
        match *self {
            NodeData::Document => "#document",
            NodeData::Element { ref name, .. } |
            NodeData::Attribute { ref name, .. } => name.qualified.as_slice(),
            NodeData::Text(..) => "#text",
            NodeData::CDataSection(..) => "#cdata-section",
            NodeData::Comment(..) => "#comment",
            NodeData::ProcessingInstruction { target, .. } => target.as_slice(),
            NodeData::EntityReference(name) |
            NodeData::Entity { name, .. } |
            NodeData::Notation { name, .. } => name.as_slice(),
            NodeData::DocumentType(ref d) => d.name.as_slice(),
            NodeData::DocumentFragment => "#document-fragment",
        }
    }

    /// The character data of text, CDATA, comment and processing
    /// instruction nodes.
    pub fn character_data(&self) -> Option<InternedString> {
        match *self {
            NodeData::Text(d) |
            NodeData::CDataSection(d) |
            NodeData::Comment(d) |
            NodeData::ProcessingInstruction { data: d, .. } => Some(d),
            _ => None,
        }
    }

    pub fn set_character_data(&mut self, new: InternedString) {
        match *self {
            NodeData::Text(ref mut d) |
            NodeData::CDataSection(ref mut d) |
            NodeData::Comment(ref mut d) |
            NodeData::ProcessingInstruction { data: ref mut d, .. } => *d = new,
            _ => {}
        }
    }
}

/// Head of a node's child list plus the position cache used by live
/// child lists.
#[derive(Debug, Copy, Clone, Default)]
pub struct ChildList {
    pub head: Option<NodeId>,
    pub cache: ChildCache,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ChildCache {
    pub length: Option<usize>,
    pub position: Option<(usize, NodeId)>,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub data: NodeData,
    pub flags: Flags,
    /// The parent of a child node, the owner element of an attribute,
    /// or the document type declaring an entity, notation or default
    /// attribute. `None` means owned by the document itself.
    pub owner: Option<NodeId>,
    pub next: Option<NodeId>,
    /// The previous sibling, or the tail of the list when
    /// `flags.first_child` is set.
    pub previous: Option<NodeId>,
    pub children: ChildList,
    pub sync: SyncState,
}

impl Node {
    pub fn new(data: NodeData) -> Node {
        Node {
            data,
            flags: Flags::default(),
            owner: None,
            next: None,
            previous: None,
            children: ChildList::default(),
            sync: SyncState::Synced,
        }
    }

    pub fn kind(&self) -> NodeKind { self.data.kind() }
}

/// The source and the copy of every node duplicated by one clone or
/// one import. Nested copies made along the way, such as default
/// attributes, are not recorded.
#[derive(Debug, Default)]
pub struct CopyLog {
    pub importing: bool,
    pub pairs: Vec<(NodeId, NodeId)>,
}

/// Values describing the document as a whole rather than its tree.
#[derive(Debug, Clone, Default)]
pub struct DocumentProperties {
    pub input_encoding: Option<InternedString>,
    pub xml_encoding: Option<InternedString>,
    pub xml_standalone: bool,
    pub document_uri: Option<InternedString>,
    /// Set when the XML version changes after nodes may have been
    /// created under the previous version's name rules.
    pub version_changed: bool,
}

/// All mutable state of one document.
pub struct Tree {
    pub(crate) strings: Rc<StringPool>,
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: NodeId,
    pub(crate) ids: IdentityIndex,
    pub(crate) deferred: Option<DeferredRecords>,
    pub(crate) config: Config,
    pub(crate) changes: u64,
    pub(crate) properties: DocumentProperties,
    pub(crate) copy_log: Option<CopyLog>,
}

impl Index<NodeId> for Tree {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node { &self.nodes[id.index()] }
}

impl IndexMut<NodeId> for Tree {
    fn index_mut(&mut self, id: NodeId) -> &mut Node { &mut self.nodes[id.index()] }
}

impl Tree {
    pub fn new(config: Config) -> Tree {
        let mut tree = Tree {
            strings: Rc::new(StringPool::new()),
            nodes: Vec::new(),
            root: NodeId(0),
            ids: IdentityIndex::default(),
            deferred: None,
            config,
            changes: 0,
            properties: DocumentProperties::default(),
            copy_log: None,
        };
        tree.root = tree.alloc(Node::new(NodeData::Document));
        tree
    }

    pub fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn create(&mut self, data: NodeData) -> NodeId {
        self.alloc(Node::new(data))
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self[id].kind()
    }

    pub fn intern(&self, s: &str) -> InternedString {
        self.strings.intern_raw(s)
    }

    pub fn error_checking(&self) -> bool {
        self.config.error_checking
    }

    /// Record a structural change for live list invalidation.
    pub fn changed(&mut self) {
        self.changes = self.changes.wrapping_add(1);
    }

    /// The parent of a node that sits in a sibling list.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        if self.kind(id).is_child() { self[id].owner } else { None }
    }

    /// The element an attribute is attached to.
    pub fn owner_element(&self, attr: NodeId) -> Option<NodeId> {
        match self.kind(attr) {
            NodeKind::Attribute if self[attr].flags.owned => {
                self[attr].owner.filter(|&o| self.kind(o) == NodeKind::Element)
            }
            _ => None,
        }
    }

    /// Is `ancestor` the same as, or an ancestor of, `node`? Attribute
    /// children are considered descendants of the attribute, but an
    /// attribute is not a descendant of its element.
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor { return true; }
            current = self.parent(n);
        }
        false
    }

    /// Whether the node can be reached from the document root.
    pub fn is_connected(&self, node: NodeId) -> bool {
        self.is_inclusive_ancestor(self.root, node)
    }

    pub fn mark_unnormalized(&mut self, id: NodeId) {
        let mut current = Some(id);
        while let Some(n) = current {
            if !self[n].flags.normalized { break; }
            self[n].flags.normalized = false;
            current = self[n].owner;
        }
    }
}

/// Everything a `Package` owns. The string pool sits outside the
/// `RefCell` so that interned strings can be handed out while the
/// tree is borrowed.
pub struct Storage {
    pub(crate) strings: Rc<StringPool>,
    pub(crate) tree: RefCell<Tree>,
    pub(crate) observer: RefCell<Option<Box<dyn MutationObserver>>>,
    pub(crate) user_data: RefCell<UserDataTable>,
}

impl Storage {
    pub fn new(config: Config) -> Storage {
        Storage::from_tree(Tree::new(config))
    }

    pub fn from_tree(tree: Tree) -> Storage {
        Storage {
            strings: tree.strings.clone(),
            tree: RefCell::new(tree),
            observer: RefCell::new(None),
            user_data: RefCell::new(UserDataTable::default()),
        }
    }

    pub fn strings(&self) -> &StringPool {
        &self.strings
    }
}

#[cfg(test)]
mod test {
    use super::NodeKind::*;

    #[test]
    fn documents_accept_a_restricted_set_of_children() {
        assert!(Document.accepts_child(Element));
        assert!(Document.accepts_child(DocumentType));
        assert!(!Document.accepts_child(Text));
        assert!(!Document.accepts_child(Attribute));
    }

    #[test]
    fn attributes_only_accept_text_and_entity_references() {
        assert!(Attribute.accepts_child(Text));
        assert!(Attribute.accepts_child(EntityReference));
        assert!(!Attribute.accepts_child(Element));
        assert!(!Attribute.accepts_child(CDataSection));
    }

    #[test]
    fn leaf_kinds_accept_nothing() {
        for kind in &[Text, CDataSection, Comment, ProcessingInstruction, Notation, DocumentType] {
            assert!(!kind.accepts_child(Element));
        }
    }
}
