//! Owned copies of subtrees.
//!
//! Comparing or importing nodes may involve two documents, or one
//! document twice. Reading the source into a `Snapshot` first means
//! only one tree is ever borrowed at a time.

use super::attributes::MapKind;
use super::deferred::Need;
use super::raw::{NodeData, NodeId, NodeKind, Tree};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Names {
    pub namespace_uri: Option<String>,
    pub prefix: Option<String>,
    pub local_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// The node this was read from, in its own document.
    pub source: NodeId,
    pub kind: NodeKind,
    pub node_name: String,
    pub names: Names,
    /// The DOM `nodeValue`; for a document type, its internal subset.
    pub value: Option<String>,
    pub public_id: Option<String>,
    pub system_id: Option<String>,
    pub notation_name: Option<String>,
    pub specified: bool,
    pub is_id: bool,
    /// Element attributes, or document type entities.
    pub attributes: Vec<Snapshot>,
    pub notations: Vec<Snapshot>,
    pub children: Vec<Snapshot>,
}

fn owned(s: Option<super::string_pool::InternedString>) -> Option<String> {
    s.map(|s| s.as_slice().to_owned())
}

impl Tree {
    /// Copy a node, and with `deep` its descendants. Attributes always
    /// keep their value children.
    pub(crate) fn snapshot(&mut self, id: NodeId, deep: bool) -> Snapshot {
        let kind = self.kind(id);
        let deep_here = deep || kind == NodeKind::Attribute;
        self.ensure(id, if deep_here { Need::Children } else { Need::Data });

        let node_name = self[id].data.node_name().to_owned();
        let names = match self[id].data.name() {
            Some(name) => Names {
                namespace_uri: owned(name.namespace_uri),
                prefix: owned(name.prefix),
                local_name: owned(name.local_name),
            },
            None => Names::default(),
        };

        let mut snapshot = Snapshot {
            source: id,
            kind,
            node_name,
            names,
            value: None,
            public_id: None,
            system_id: None,
            notation_name: None,
            specified: self[id].flags.specified,
            is_id: self[id].flags.id_attribute,
            attributes: Vec::new(),
            notations: Vec::new(),
            children: Vec::new(),
        };

        match self[id].data.clone() {
            NodeData::Attribute { .. } => {
                snapshot.value = Some(self.attr_value(id).as_str().to_owned());
            }
            NodeData::Text(d) | NodeData::CDataSection(d) | NodeData::Comment(d) |
            NodeData::ProcessingInstruction { data: d, .. } => {
                snapshot.value = Some(d.as_slice().to_owned());
            }
            NodeData::Entity { public_id, system_id, notation_name, .. } => {
                snapshot.public_id = owned(public_id);
                snapshot.system_id = owned(system_id);
                snapshot.notation_name = owned(notation_name);
            }
            NodeData::Notation { public_id, system_id, .. } => {
                snapshot.public_id = owned(public_id);
                snapshot.system_id = owned(system_id);
            }
            NodeData::DocumentType(d) => {
                snapshot.public_id = owned(d.public_id);
                snapshot.system_id = owned(d.system_id);
                snapshot.value = owned(d.internal_subset);
                self.ensure(id, Need::Children);
                snapshot.attributes = self.map_entries(id, MapKind::Entities)
                    .into_iter().map(|e| self.snapshot(e, true)).collect();
                snapshot.notations = self.map_entries(id, MapKind::Notations)
                    .into_iter().map(|n| self.snapshot(n, true)).collect();
            }
            NodeData::Element { .. } => {
                snapshot.attributes = self.map_entries(id, MapKind::Attributes)
                    .into_iter().map(|a| self.snapshot(a, true)).collect();
            }
            _ => {}
        }

        let structured = kind != NodeKind::Attribute || self.is_structured(id);
        if deep_here && structured {
            snapshot.children = self.child_ids(id)
                .into_iter().map(|c| self.snapshot(c, true)).collect();
        }
        snapshot
    }
}
