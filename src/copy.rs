//! Cloning, importing, renaming and read-only propagation.

use log::trace;

use super::attributes::{MapKind, NamedNodes};
use super::deferred::Need;
use super::error::{Error, Result};
use super::raw::{AttrValue, DocumentTypeData, Name, NodeData, NodeId, NodeKind, Tree};
use super::snapshot::Snapshot;

impl Tree {
    /// Set or clear the read-only flag. With `deep` the change reaches
    /// all descendants; an element's attributes always follow it.
    pub(crate) fn set_read_only(&mut self, id: NodeId, read_only: bool, deep: bool) {
        self.ensure(id, if deep { Need::Children } else { Need::Data });
        self[id].flags.read_only = read_only;

        let mut dependents = match self.kind(id) {
            NodeKind::Element => self.map_entries(id, MapKind::Attributes),
            NodeKind::DocumentType if deep => {
                let mut all = self.map_entries(id, MapKind::Entities);
                all.extend(self.map_entries(id, MapKind::Notations));
                all
            }
            _ => Vec::new(),
        };
        if deep {
            dependents.extend(self.child_ids(id));
        }
        for d in dependents {
            let deep = deep || self.kind(d) == NodeKind::Attribute;
            self.set_read_only(d, read_only, deep);
        }
    }

    fn copy_map(&mut self, source: &NamedNodes, owner: NodeId) -> NamedNodes {
        let nodes = source.nodes.iter().map(|&n| {
            let copy = self.clone_node(n, true);
            self[copy].flags.specified = self[n].flags.specified;
            self[copy].owner = Some(owner);
            self[copy].flags.owned = true;
            if !self[copy].flags.normalized {
                self.mark_unnormalized(owner);
            }
            copy
        }).collect();
        NamedNodes { nodes, has_defaults: source.has_defaults }
    }

    /// Copy a node within its document. The copy is detached, writable
    /// unless it is an entity or entity reference, and a deep copy of
    /// an element carries copies of all its attributes. Cloning an
    /// attribute always copies its value children.
    pub(crate) fn clone_node(&mut self, id: NodeId, deep: bool) -> NodeId {
        let kind = self.kind(id);
        let deep_here = deep || kind == NodeKind::Attribute;
        self.ensure(id, if deep_here { Need::Children } else { Need::Data });

        let data = match self[id].data.clone() {
            NodeData::Element { name, .. } => NodeData::Element { name, attributes: NamedNodes::default() },
            NodeData::DocumentType(d) => {
                let mut copy = DocumentTypeData::new(d.name);
                copy.public_id = d.public_id;
                copy.system_id = d.system_id;
                copy.internal_subset = d.internal_subset;
                NodeData::DocumentType(Box::new(copy))
            }
            other => other,
        };

        let clone = self.alloc_copy(data, id);
        if let Some(log) = self.copy_log.as_mut().filter(|log| !log.importing) {
            log.pairs.push((id, clone));
        }
        if kind == NodeKind::Attribute {
            self[clone].flags.specified = true;
        }

        match self[id].data.clone() {
            NodeData::Element { attributes, .. } => {
                let copied = self.copy_map(&attributes, clone);
                let ids = copied.nodes.clone();
                if let NodeData::Element { ref mut attributes, .. } = self[clone].data {
                    *attributes = copied;
                }
                for attr in ids {
                    self.register_id(attr);
                }
            }
            NodeData::DocumentType(d) => {
                let entities = self.copy_map(&d.entities, clone);
                let notations = self.copy_map(&d.notations, clone);
                let defaults: Vec<_> = d.element_defaults.iter()
                    .map(|(&element, template)| (element, template.clone()))
                    .collect();
                let defaults = defaults.into_iter()
                    .map(|(element, template)| (element, self.copy_map(&template, clone)))
                    .collect();
                if let NodeData::DocumentType(ref mut copy) = self[clone].data {
                    copy.entities = entities;
                    copy.notations = notations;
                    copy.element_defaults = defaults;
                }
            }
            _ => {}
        }

        if deep_here {
            for child in self.child_ids(id) {
                let copy = self.clone_node(child, true);
                self.append_unchecked(clone, copy);
            }
        }

        if matches!(kind, NodeKind::EntityReference | NodeKind::Entity) {
            self.set_read_only(clone, true, deep);
        }
        clone
    }

    /// Change the name of an element or attribute in place.
    ///
    /// A renamed element has its defaulted attributes replaced by the
    /// defaults of its new name. A renamed attribute is taken off its
    /// element and put back under the new name.
    pub(crate) fn rename(&mut self, id: NodeId, name: Name) -> Result<()> {
        self.ensure(id, Need::Data);
        if self.error_checking() && self[id].flags.read_only {
            return Err(Error::ReadOnly { kind: self.kind(id) });
        }

        match self.kind(id) {
            NodeKind::Element => {
                if let NodeData::Element { name: ref mut current, .. } = self[id].data {
                    *current = name;
                }
                trace!(target: "dom.defaults", "renamed element {:?} to {:?}", id, name.qualified);
                self.reconcile_default_attributes(id);
                Ok(())
            }
            NodeKind::Attribute => {
                let owner = self.owner_element(id);
                if let Some(owner) = owner {
                    if let Some(idx) = self.index_of_entry(owner, MapKind::Attributes, id) {
                        self.remove_named_at(owner, MapKind::Attributes, idx);
                    }
                }
                if let NodeData::Attribute { name: ref mut current, .. } = self[id].data {
                    *current = name;
                }
                if let Some(owner) = owner {
                    self.attach_named(owner, MapKind::Attributes, id, name.local_name.is_some());
                }
                Ok(())
            }
            kind => Err(Error::NotSupported { kind }),
        }
    }

    /// Build a node of this document from a snapshot of a node of any
    /// document. Only specified attributes are carried over; the
    /// defaults of this document apply instead.
    pub(crate) fn import(&mut self, source: &Snapshot, deep: bool) -> Result<NodeId> {
        let id = self.import_one(source, deep)?;
        if let Some(log) = self.copy_log.as_mut().filter(|log| log.importing) {
            log.pairs.push((source.source, id));
        }
        Ok(id)
    }

    fn import_one(&mut self, source: &Snapshot, deep: bool) -> Result<NodeId> {
        let names = &source.names;
        let namespace = names.local_name.as_ref().map(|_| names.namespace_uri.as_deref());

        let id = match source.kind {
            NodeKind::Element => {
                let element = match namespace {
                    Some(ns) => self.new_element_ns(ns, &source.node_name)?,
                    None => self.new_element(&source.node_name)?,
                };
                for attr in source.attributes.iter().filter(|a| a.specified) {
                    let copy = self.import(attr, true)?;
                    let namespace_aware = attr.names.local_name.is_some();
                    self.attach_named(element, MapKind::Attributes, copy, namespace_aware);
                }
                element
            }
            NodeKind::Attribute => {
                let attr = match namespace {
                    Some(ns) => self.new_attribute_ns(ns, &source.node_name)?,
                    None => self.new_attribute(&source.node_name)?,
                };
                self[attr].flags.id_attribute = source.is_id;
                if source.children.is_empty() {
                    let value = self.intern(source.value.as_deref().unwrap_or(""));
                    if let NodeData::Attribute { value: ref mut v, .. } = self[attr].data {
                        *v = AttrValue::Flat(value);
                    }
                } else {
                    if let NodeData::Attribute { value: ref mut v, .. } = self[attr].data {
                        *v = AttrValue::Structured;
                    }
                    for child in &source.children {
                        let copy = self.import(child, true)?;
                        self.append_unchecked(attr, copy);
                    }
                }
                return Ok(attr);
            }
            NodeKind::Text => self.new_text(source.value.as_deref().unwrap_or("")),
            NodeKind::CDataSection => self.new_cdata_section(source.value.as_deref().unwrap_or("")),
            NodeKind::Comment => self.new_comment(source.value.as_deref().unwrap_or("")),
            NodeKind::ProcessingInstruction => {
                self.new_processing_instruction(&source.node_name, source.value.as_deref().unwrap_or(""))?
            }
            NodeKind::EntityReference => return self.new_entity_reference(&source.node_name),
            NodeKind::Entity => self.new_entity(
                &source.node_name,
                source.public_id.as_deref(),
                source.system_id.as_deref(),
                source.notation_name.as_deref(),
            )?,
            NodeKind::Notation => {
                self.new_notation(&source.node_name, source.public_id.as_deref(), source.system_id.as_deref())?
            }
            NodeKind::DocumentFragment => self.new_fragment(),
            kind @ NodeKind::Document | kind @ NodeKind::DocumentType => {
                return Err(Error::NotSupported { kind });
            }
        };

        if deep {
            for child in &source.children {
                let copy = self.import(child, true)?;
                self.append_unchecked(id, copy);
            }
        }
        if source.kind == NodeKind::Entity {
            self.set_read_only(id, true, true);
        }
        Ok(id)
    }
}
