//! Nodes that are read from a compact record store on first use.
//!
//! A parser fills a `DeferredStore` with flat records: one per node,
//! addressed by index, with names and values kept in a string table.
//! `Package::from_deferred` turns the store into a document whose
//! root has not been read yet. Every node then moves through
//! `Deferred`, `DataSynced` and `Synced`, driven by `Tree::ensure`,
//! which every accessor calls before touching node data or children.

use std::collections::HashMap;

use log::{debug, trace};

use super::attributes::MapKind;
use super::qname;
use super::raw::{AttrValue, DocumentTypeData, Name, Node, NodeData, NodeId, NodeKind, Tree};
use super::string_pool::{InternedString, StringPool};

/// The address of a record in a `DeferredStore`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RecordIndex(u32);

impl RecordIndex {
    fn index(self) -> usize { self.0 as usize }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SyncState {
    Synced,
    /// Nothing has been read from the record yet.
    Deferred(RecordIndex),
    /// Data has been read but children have not.
    DataSynced(RecordIndex),
}

/// What an accessor is about to touch.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Need {
    Data,
    Children,
}

type StringIndex = u32;

#[derive(Debug, Copy, Clone)]
struct Record {
    kind: NodeKind,
    name: Option<StringIndex>,
    value: Option<StringIndex>,
    namespace_uri: Option<StringIndex>,
    public_id: Option<StringIndex>,
    system_id: Option<StringIndex>,
    notation_name: Option<StringIndex>,
    namespace_aware: bool,
    parent: Option<RecordIndex>,
    first_attribute: Option<RecordIndex>,
    last_attribute: Option<RecordIndex>,
    first_child: Option<RecordIndex>,
    last_child: Option<RecordIndex>,
    next_sibling: Option<RecordIndex>,
    specified: bool,
    is_id: bool,
}

impl Record {
    fn new(kind: NodeKind) -> Record {
        Record {
            kind,
            name: None,
            value: None,
            namespace_uri: None,
            public_id: None,
            system_id: None,
            notation_name: None,
            namespace_aware: false,
            parent: None,
            first_attribute: None,
            last_attribute: None,
            first_child: None,
            last_child: None,
            next_sibling: None,
            specified: true,
            is_id: false,
        }
    }
}

/// Flat node records written by a parser.
///
/// Names are trusted: the store does no validation, matching what a
/// well-formedness checking parser already guarantees.
///
/// ```
/// use sxd_dom_core::{DeferredStore, Package};
///
/// let mut store = DeferredStore::new();
/// let root = store.create_element("greeting");
/// store.add_attribute(root, "lang", "en", true);
/// let text = store.create_text("hello");
/// store.append_child(root, text);
/// store.append_root_child(root);
///
/// let package = Package::from_deferred(store);
/// let doc = package.as_document();
/// let element = doc.document_element().unwrap();
/// assert_eq!("greeting", element.name());
/// assert_eq!(Some("en".into()), element.attribute_value("lang"));
/// ```
#[derive(Debug)]
pub struct DeferredStore {
    strings: Vec<String>,
    string_index: HashMap<String, StringIndex>,
    records: Vec<Record>,
}

impl Default for DeferredStore {
    fn default() -> DeferredStore {
        DeferredStore::new()
    }
}

impl DeferredStore {
    pub fn new() -> DeferredStore {
        DeferredStore {
            strings: Vec::new(),
            string_index: HashMap::new(),
            records: vec![Record::new(NodeKind::Document)],
        }
    }

    /// The record standing for the document itself.
    pub fn root(&self) -> RecordIndex {
        RecordIndex(0)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.len() <= 1
    }

    fn string(&mut self, s: &str) -> StringIndex {
        if let Some(&idx) = self.string_index.get(s) {
            return idx;
        }
        let idx = self.strings.len() as StringIndex;
        self.strings.push(s.to_owned());
        self.string_index.insert(s.to_owned(), idx);
        idx
    }

    fn optional_string(&mut self, s: Option<&str>) -> Option<StringIndex> {
        s.map(|s| self.string(s))
    }

    fn push(&mut self, record: Record) -> RecordIndex {
        let idx = RecordIndex(self.records.len() as u32);
        self.records.push(record);
        idx
    }

    fn push_named(&mut self, kind: NodeKind, name: &str, value: Option<&str>) -> RecordIndex {
        let mut record = Record::new(kind);
        record.name = Some(self.string(name));
        record.value = self.optional_string(value);
        self.push(record)
    }

    pub fn create_element(&mut self, name: &str) -> RecordIndex {
        self.push_named(NodeKind::Element, name, None)
    }

    pub fn create_element_ns(&mut self, namespace_uri: Option<&str>, qualified_name: &str) -> RecordIndex {
        let idx = self.push_named(NodeKind::Element, qualified_name, None);
        let namespace_uri = self.optional_string(namespace_uri.filter(|ns| !ns.is_empty()));
        let record = &mut self.records[idx.index()];
        record.namespace_uri = namespace_uri;
        record.namespace_aware = true;
        idx
    }

    fn chain_attribute(&mut self, element: RecordIndex, attribute: RecordIndex) {
        self.records[attribute.index()].parent = Some(element);
        match self.records[element.index()].last_attribute {
            Some(last) => self.records[last.index()].next_sibling = Some(attribute),
            None => self.records[element.index()].first_attribute = Some(attribute),
        }
        self.records[element.index()].last_attribute = Some(attribute);
    }

    pub fn add_attribute(&mut self, element: RecordIndex, name: &str, value: &str, specified: bool) -> RecordIndex {
        let idx = self.push_named(NodeKind::Attribute, name, Some(value));
        self.records[idx.index()].specified = specified;
        self.chain_attribute(element, idx);
        idx
    }

    pub fn add_attribute_ns(
        &mut self,
        element: RecordIndex,
        namespace_uri: Option<&str>,
        qualified_name: &str,
        value: &str,
        specified: bool,
    ) -> RecordIndex {
        let idx = self.add_attribute(element, qualified_name, value, specified);
        let namespace_uri = self.optional_string(namespace_uri.filter(|ns| !ns.is_empty()));
        let record = &mut self.records[idx.index()];
        record.namespace_uri = namespace_uri;
        record.namespace_aware = true;
        idx
    }

    /// Mark an attribute as the ID of its element.
    pub fn set_id_attribute(&mut self, attribute: RecordIndex, is_id: bool) {
        self.records[attribute.index()].is_id = is_id;
    }

    pub fn create_text(&mut self, data: &str) -> RecordIndex {
        let mut record = Record::new(NodeKind::Text);
        record.value = Some(self.string(data));
        self.push(record)
    }

    pub fn create_cdata_section(&mut self, data: &str) -> RecordIndex {
        let mut record = Record::new(NodeKind::CDataSection);
        record.value = Some(self.string(data));
        self.push(record)
    }

    pub fn create_comment(&mut self, data: &str) -> RecordIndex {
        let mut record = Record::new(NodeKind::Comment);
        record.value = Some(self.string(data));
        self.push(record)
    }

    pub fn create_processing_instruction(&mut self, target: &str, data: &str) -> RecordIndex {
        self.push_named(NodeKind::ProcessingInstruction, target, Some(data))
    }

    pub fn create_entity_reference(&mut self, name: &str) -> RecordIndex {
        self.push_named(NodeKind::EntityReference, name, None)
    }

    pub fn create_doctype(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
        internal_subset: Option<&str>,
    ) -> RecordIndex {
        let idx = self.push_named(NodeKind::DocumentType, name, internal_subset);
        let public_id = self.optional_string(public_id);
        let system_id = self.optional_string(system_id);
        let record = &mut self.records[idx.index()];
        record.public_id = public_id;
        record.system_id = system_id;
        idx
    }

    /// An entity declaration. Append it to a doctype record to declare
    /// it, and append children to it to give its replacement text.
    pub fn create_entity(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
        notation_name: Option<&str>,
    ) -> RecordIndex {
        let idx = self.push_named(NodeKind::Entity, name, None);
        let public_id = self.optional_string(public_id);
        let system_id = self.optional_string(system_id);
        let notation_name = self.optional_string(notation_name);
        let record = &mut self.records[idx.index()];
        record.public_id = public_id;
        record.system_id = system_id;
        record.notation_name = notation_name;
        idx
    }

    pub fn create_notation(&mut self, name: &str, public_id: Option<&str>, system_id: Option<&str>) -> RecordIndex {
        let idx = self.push_named(NodeKind::Notation, name, None);
        let public_id = self.optional_string(public_id);
        let system_id = self.optional_string(system_id);
        let record = &mut self.records[idx.index()];
        record.public_id = public_id;
        record.system_id = system_id;
        idx
    }

    pub fn append_child(&mut self, parent: RecordIndex, child: RecordIndex) {
        self.records[child.index()].parent = Some(parent);
        match self.records[parent.index()].last_child {
            Some(last) => self.records[last.index()].next_sibling = Some(child),
            None => self.records[parent.index()].first_child = Some(child),
        }
        self.records[parent.index()].last_child = Some(child);
    }

    pub fn append_root_child(&mut self, child: RecordIndex) {
        let root = self.root();
        self.append_child(root, child);
    }
}

/// The store after its strings have been interned into a package.
pub struct DeferredRecords {
    strings: Vec<InternedString>,
    records: Vec<Record>,
    nodes: Vec<Option<NodeId>>,
    /// Elements whose ID attributes have not been indexed yet.
    pending_ids: Vec<RecordIndex>,
}

impl DeferredRecords {
    fn new(store: DeferredStore, pool: &StringPool) -> DeferredRecords {
        let strings = store.strings.iter().map(|s| pool.intern_raw(s)).collect();

        let mut pending_ids: Vec<_> = store.records.iter()
            .filter(|r| r.kind == NodeKind::Attribute && r.is_id)
            .filter_map(|r| r.parent)
            .collect();
        pending_ids.dedup();

        let nodes = vec![None; store.records.len()];

        DeferredRecords { strings, records: store.records, nodes, pending_ids }
    }

    fn string(&self, idx: Option<StringIndex>) -> Option<InternedString> {
        idx.map(|i| self.strings[i as usize])
    }
}

impl Tree {
    pub(crate) fn from_deferred(config: super::config::Config, store: DeferredStore) -> Tree {
        let mut tree = Tree::new(config);

        debug!(target: "dom.deferred", "loading {} deferred records", store.len());
        let mut records = DeferredRecords::new(store, &tree.strings);
        records.nodes[0] = Some(tree.root);
        tree.deferred = Some(records);

        let root = tree.root;
        tree[root].sync = SyncState::Deferred(RecordIndex(0));
        tree
    }

    fn record(&self, idx: RecordIndex) -> Option<Record> {
        self.deferred.as_ref().map(|d| d.records[idx.index()])
    }

    fn record_string(&self, idx: Option<StringIndex>) -> Option<InternedString> {
        self.deferred.as_ref().and_then(|d| d.string(idx))
    }

    fn record_string_or_empty(&self, idx: Option<StringIndex>) -> InternedString {
        self.record_string(idx).unwrap_or_else(InternedString::empty)
    }

    /// Bring a node up to date for the given kind of access.
    pub(crate) fn ensure(&mut self, id: NodeId, need: Need) {
        match (self[id].sync, need) {
            (SyncState::Synced, _) |
            (SyncState::DataSynced(_), Need::Data) => {}
            (SyncState::Deferred(r), Need::Data) => {
                self[id].sync = SyncState::DataSynced(r);
                self.sync_data(id, r);
            }
            (SyncState::Deferred(r), Need::Children) => {
                self[id].sync = SyncState::Synced;
                self.sync_data(id, r);
                self.sync_children(id, r);
            }
            (SyncState::DataSynced(r), Need::Children) => {
                self[id].sync = SyncState::Synced;
                self.sync_children(id, r);
            }
        }
    }

    fn alloc_deferred(&mut self, record: RecordIndex, kind: NodeKind) -> NodeId {
        let mut node = Node::new(NodeData::placeholder(kind));
        node.sync = SyncState::Deferred(record);
        let id = self.alloc(node);
        if let Some(d) = self.deferred.as_mut() {
            d.nodes[record.index()] = Some(id);
        }
        id
    }

    fn record_name(&self, record: &Record) -> Name {
        let qualified = self.record_string_or_empty(record.name);
        if !record.namespace_aware {
            return Name::plain(qualified);
        }

        let parts = qname::split_unchecked(qualified.as_slice());
        Name {
            qualified,
            namespace_uri: self.record_string(record.namespace_uri),
            prefix: parts.prefix.map(|p| self.intern(p)),
            local_name: Some(self.intern(parts.local_part)),
        }
    }

    fn sync_data(&mut self, id: NodeId, r: RecordIndex) {
        let record = match self.record(r) {
            Some(record) => record,
            None => return,
        };
        trace!(target: "dom.deferred", "reading data of {:?} from record {:?}", id, r);

        let value = self.record_string_or_empty(record.value);
        let name = self.record_string_or_empty(record.name);

        let data = match record.kind {
            NodeKind::Document => NodeData::Document,
            NodeKind::DocumentFragment => NodeData::DocumentFragment,
            NodeKind::Element => {
                let name = self.record_name(&record);
                NodeData::Element { name, attributes: Default::default() }
            }
            NodeKind::Attribute => {
                let name = self.record_name(&record);
                NodeData::Attribute { name, value: AttrValue::Flat(value), type_info: None }
            }
            NodeKind::Text => NodeData::Text(value),
            NodeKind::CDataSection => NodeData::CDataSection(value),
            NodeKind::Comment => NodeData::Comment(value),
            NodeKind::ProcessingInstruction => NodeData::ProcessingInstruction { target: name, data: value },
            NodeKind::EntityReference => NodeData::EntityReference(name),
            NodeKind::Entity => NodeData::Entity {
                name,
                public_id: self.record_string(record.public_id),
                system_id: self.record_string(record.system_id),
                notation_name: self.record_string(record.notation_name),
            },
            NodeKind::Notation => NodeData::Notation {
                name,
                public_id: self.record_string(record.public_id),
                system_id: self.record_string(record.system_id),
            },
            NodeKind::DocumentType => {
                let mut data = DocumentTypeData::new(name);
                data.public_id = self.record_string(record.public_id);
                data.system_id = self.record_string(record.system_id);
                data.internal_subset = self.record_string(record.value);
                NodeData::DocumentType(Box::new(data))
            }
        };
        self[id].data = data;

        if record.kind == NodeKind::Element {
            self.reconcile_default_attributes(id);

            let mut next = record.first_attribute;
            while let Some(a) = next {
                let attr_record = match self.record(a) {
                    Some(attr_record) => attr_record,
                    None => break,
                };
                let attr = self.materialize_attribute(a, &attr_record);
                self.attach_named(id, MapKind::Attributes, attr, attr_record.namespace_aware);
                next = attr_record.next_sibling;
            }
        }
    }

    fn materialize_attribute(&mut self, r: RecordIndex, record: &Record) -> NodeId {
        let name = self.record_name(record);
        let value = self.record_string_or_empty(record.value);
        let mut node = Node::new(NodeData::Attribute { name, value: AttrValue::Flat(value), type_info: None });
        node.flags.specified = record.specified;
        node.flags.id_attribute = record.is_id;

        let id = self.alloc(node);
        if let Some(d) = self.deferred.as_mut() {
            d.nodes[r.index()] = Some(id);
        }
        id
    }

    fn sync_children(&mut self, id: NodeId, r: RecordIndex) {
        let record = match self.record(r) {
            Some(record) => record,
            None => return,
        };
        trace!(target: "dom.deferred", "reading children of {:?} from record {:?}", id, r);

        let mut previous_was_text = false;
        let mut next = record.first_child;
        while let Some(c) = next {
            let child_record = match self.record(c) {
                Some(child_record) => child_record,
                None => break,
            };
            let child = self.alloc_deferred(c, child_record.kind);

            match (record.kind, child_record.kind) {
                (NodeKind::DocumentType, NodeKind::Entity) => {
                    self.ensure(child, Need::Data);
                    self.attach_named(id, MapKind::Entities, child, false);
                }
                (NodeKind::DocumentType, NodeKind::Notation) => {
                    self.ensure(child, Need::Data);
                    self.attach_named(id, MapKind::Notations, child, false);
                }
                _ => {
                    self.siblings(id).insert_before(child, None);

                    let is_text = child_record.kind == NodeKind::Text;
                    let is_empty = self.record_string(child_record.value).map_or(true, |v| v.as_slice().is_empty());
                    if is_text && (previous_was_text || is_empty) {
                        self.mark_unnormalized(id);
                    }
                    previous_was_text = is_text;
                }
            }

            next = child_record.next_sibling;
        }

        if matches!(record.kind, NodeKind::EntityReference | NodeKind::Entity) {
            self.set_read_only(id, true, true);
        }
    }

    /// Index the ID attributes of every element that has not been
    /// read yet, materializing the path to each.
    pub(crate) fn resolve_deferred_ids(&mut self) {
        let pending = match self.deferred.as_mut() {
            Some(d) if !d.pending_ids.is_empty() => std::mem::take(&mut d.pending_ids),
            _ => return,
        };
        debug!(target: "dom.deferred", "materializing {} elements carrying IDs", pending.len());

        for r in pending {
            if let Some(node) = self.materialize(r) {
                self.ensure(node, Need::Data);
            }
        }
    }

    fn materialize(&mut self, r: RecordIndex) -> Option<NodeId> {
        if let Some(node) = self.deferred.as_ref().and_then(|d| d.nodes[r.index()]) {
            return Some(node);
        }

        let parent = self.record(r)?.parent?;
        let parent = self.materialize(parent)?;
        self.ensure(parent, Need::Children);
        self.deferred.as_ref().and_then(|d| d.nodes[r.index()])
    }
}
