//! Resolving prefixes and namespace URIs against the `xmlns`
//! declarations and element names in scope.

use super::attributes::MapKind;
use super::deferred::Need;
use super::qname::XMLNS_NS_URI;
use super::raw::{Name, NodeId, NodeKind, Tree};
use super::string_pool::InternedString;

fn as_str(s: Option<InternedString>) -> Option<&'static str> {
    s.map(|s| s.as_slice())
}

impl Tree {
    fn element_ancestor(&self, id: NodeId) -> Option<NodeId> {
        let mut current = self.parent(id);
        while let Some(p) = current {
            if self.kind(p) == NodeKind::Element {
                return Some(p);
            }
            current = self.parent(p);
        }
        None
    }

    fn element_name(&mut self, id: NodeId) -> Option<Name> {
        self.ensure(id, Need::Data);
        self[id].data.name().cloned()
    }

    /// The element a lookup on `id` starts from.
    fn lookup_start(&mut self, id: NodeId) -> Option<NodeId> {
        match self.kind(id) {
            NodeKind::Element => Some(id),
            NodeKind::Document => self.document_element(),
            NodeKind::Attribute => self.owner_element(id),
            NodeKind::Entity | NodeKind::Notation | NodeKind::DocumentType | NodeKind::DocumentFragment => None,
            _ => self.element_ancestor(id),
        }
    }

    /// Namespace declarations (`xmlns` and `xmlns:*` attributes) of an
    /// element, as (declared prefix, attribute) pairs.
    fn declarations(&mut self, element: NodeId) -> Vec<(Option<InternedString>, NodeId)> {
        self.map_entries(element, MapKind::Attributes).into_iter().filter_map(|attr| {
            let name = self[attr].data.name()?;
            if as_str(name.namespace_uri) != Some(XMLNS_NS_URI) {
                return None;
            }
            match as_str(name.prefix) {
                Some("xmlns") => Some((name.local_name, attr)),
                None if name.qualified.as_slice() == "xmlns" => Some((None, attr)),
                _ => None,
            }
        }).collect()
    }

    pub(crate) fn lookup_namespace_uri(&mut self, id: NodeId, prefix: Option<&str>) -> Option<InternedString> {
        let element = self.lookup_start(id)?;
        self.lookup_namespace_uri_from(element, prefix)
    }

    fn lookup_namespace_uri_from(&mut self, element: NodeId, prefix: Option<&str>) -> Option<InternedString> {
        if let Some(name) = self.element_name(element) {
            if name.namespace_uri.is_some() && as_str(name.prefix) == prefix {
                return name.namespace_uri;
            }
        }

        for (declared, attr) in self.declarations(element) {
            if as_str(declared) == prefix {
                let value = self.attr_value_interned(attr);
                return if value.as_slice().is_empty() { None } else { Some(value) };
            }
        }

        let ancestor = self.element_ancestor(element)?;
        self.lookup_namespace_uri_from(ancestor, prefix)
    }

    pub(crate) fn lookup_prefix(&mut self, id: NodeId, namespace_uri: &str) -> Option<InternedString> {
        let element = self.lookup_start(id)?;
        self.lookup_prefix_from(element, namespace_uri, element)
    }

    /// Find a prefix bound to `namespace_uri` that is not shadowed when
    /// seen from `origin`.
    fn lookup_prefix_from(&mut self, element: NodeId, namespace_uri: &str, origin: NodeId) -> Option<InternedString> {
        let mut candidates = Vec::new();
        if let Some(name) = self.element_name(element) {
            if as_str(name.namespace_uri) == Some(namespace_uri) {
                candidates.extend(name.prefix);
            }
        }
        for (declared, attr) in self.declarations(element) {
            if let Some(declared) = declared {
                if self.attr_value(attr).as_str() == namespace_uri {
                    candidates.push(declared);
                }
            }
        }

        for prefix in candidates {
            let bound = self.lookup_namespace_uri_from(origin, Some(prefix.as_slice()));
            if as_str(bound) == Some(namespace_uri) {
                return Some(prefix);
            }
        }

        let ancestor = self.element_ancestor(element)?;
        self.lookup_prefix_from(ancestor, namespace_uri, origin)
    }
}
