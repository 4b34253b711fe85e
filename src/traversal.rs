//! Filtered walks over a subtree.
//!
//! A `TreeWalker` moves a current node around the logical tree formed
//! by the accepted nodes; skipped nodes are transparent and rejected
//! nodes hide their whole subtree. A `NodeIterator` steps through the
//! subtree in document order, where rejecting and skipping are the
//! same.

use std::fmt;
use std::ops::BitOr;

use super::dom::{Document, Node};
use super::raw::NodeKind;

/// A set of node kinds to present.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct WhatToShow(u32);

impl WhatToShow {
    pub const ALL: WhatToShow = WhatToShow(0xFFFF_FFFF);
    pub const ELEMENT: WhatToShow = WhatToShow(0x1);
    pub const ATTRIBUTE: WhatToShow = WhatToShow(0x2);
    pub const TEXT: WhatToShow = WhatToShow(0x4);
    pub const CDATA_SECTION: WhatToShow = WhatToShow(0x8);
    pub const ENTITY_REFERENCE: WhatToShow = WhatToShow(0x10);
    pub const ENTITY: WhatToShow = WhatToShow(0x20);
    pub const PROCESSING_INSTRUCTION: WhatToShow = WhatToShow(0x40);
    pub const COMMENT: WhatToShow = WhatToShow(0x80);
    pub const DOCUMENT: WhatToShow = WhatToShow(0x100);
    pub const DOCUMENT_TYPE: WhatToShow = WhatToShow(0x200);
    pub const DOCUMENT_FRAGMENT: WhatToShow = WhatToShow(0x400);
    pub const NOTATION: WhatToShow = WhatToShow(0x800);

    pub fn of(kind: NodeKind) -> WhatToShow {
        match kind {
            NodeKind::Element => WhatToShow::ELEMENT,
            NodeKind::Attribute => WhatToShow::ATTRIBUTE,
            NodeKind::Text => WhatToShow::TEXT,
            NodeKind::CDataSection => WhatToShow::CDATA_SECTION,
            NodeKind::EntityReference => WhatToShow::ENTITY_REFERENCE,
            NodeKind::Entity => WhatToShow::ENTITY,
            NodeKind::ProcessingInstruction => WhatToShow::PROCESSING_INSTRUCTION,
            NodeKind::Comment => WhatToShow::COMMENT,
            NodeKind::Document => WhatToShow::DOCUMENT,
            NodeKind::DocumentType => WhatToShow::DOCUMENT_TYPE,
            NodeKind::DocumentFragment => WhatToShow::DOCUMENT_FRAGMENT,
            NodeKind::Notation => WhatToShow::NOTATION,
        }
    }

    pub fn shows(self, kind: NodeKind) -> bool {
        self.0 & WhatToShow::of(kind).0 != 0
    }
}

impl BitOr for WhatToShow {
    type Output = WhatToShow;

    fn bitor(self, other: WhatToShow) -> WhatToShow {
        WhatToShow(self.0 | other.0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FilterResult {
    Accept,
    /// Hide the node and, for a tree walker, its descendants.
    Reject,
    /// Hide the node but consider its children.
    Skip,
}

/// Decides which of the shown nodes are presented.
pub trait NodeFilter {
    fn accept_node(&self, node: Node<'_>) -> FilterResult;
}

impl<F> NodeFilter for F
    where F: Fn(Node<'_>) -> FilterResult
{
    fn accept_node(&self, node: Node<'_>) -> FilterResult {
        self(node)
    }
}

struct Selection<'f> {
    what_to_show: WhatToShow,
    filter: Option<Box<dyn NodeFilter + 'f>>,
    expand_entity_references: bool,
}

impl<'f> Selection<'f> {
    fn judge(&self, node: Node<'_>) -> FilterResult {
        if !self.what_to_show.shows(node.kind()) {
            return FilterResult::Skip;
        }
        match self.filter {
            Some(ref filter) => filter.accept_node(node),
            None => FilterResult::Accept,
        }
    }

    fn enters(&self, node: Node<'_>) -> bool {
        self.expand_entity_references || node.kind() != NodeKind::EntityReference
    }
}

impl<'f> fmt::Debug for Selection<'f> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selection")
            .field("what_to_show", &self.what_to_show)
            .field("filtered", &self.filter.is_some())
            .field("expand_entity_references", &self.expand_entity_references)
            .finish()
    }
}

/// Navigates the view of a subtree made of accepted nodes.
#[derive(Debug)]
pub struct TreeWalker<'d> {
    root: Node<'d>,
    current: Node<'d>,
    selection: Selection<'d>,
}

impl<'d> TreeWalker<'d> {
    pub fn root(&self) -> Node<'d> { self.root }
    pub fn what_to_show(&self) -> WhatToShow { self.selection.what_to_show }
    pub fn expand_entity_references(&self) -> bool { self.selection.expand_entity_references }

    pub fn current_node(&self) -> Node<'d> { self.current }

    /// Move to any node, even one outside the root or not accepted.
    pub fn set_current_node(&mut self, node: Node<'d>) {
        self.current = node;
    }

    fn moved(&mut self, node: Option<Node<'d>>) -> Option<Node<'d>> {
        if let Some(node) = node {
            self.current = node;
        }
        node
    }

    pub fn parent_node(&mut self) -> Option<Node<'d>> {
        let node = self.visible_parent(self.current);
        self.moved(node)
    }

    pub fn first_child(&mut self) -> Option<Node<'d>> {
        let node = self.visible_first_child(self.current);
        self.moved(node)
    }

    pub fn last_child(&mut self) -> Option<Node<'d>> {
        let node = self.visible_last_child(self.current);
        self.moved(node)
    }

    pub fn next_sibling(&mut self) -> Option<Node<'d>> {
        let node = self.visible_next_sibling(self.current, self.root);
        self.moved(node)
    }

    pub fn previous_sibling(&mut self) -> Option<Node<'d>> {
        let node = self.visible_previous_sibling(self.current, self.root);
        self.moved(node)
    }

    /// The next visible node in document order.
    pub fn next_node(&mut self) -> Option<Node<'d>> {
        if let Some(child) = self.visible_first_child(self.current) {
            return self.moved(Some(child));
        }
        if let Some(sibling) = self.visible_next_sibling(self.current, self.root) {
            return self.moved(Some(sibling));
        }

        let mut parent = self.visible_parent(self.current);
        while let Some(p) = parent {
            if let Some(sibling) = self.visible_next_sibling(p, self.root) {
                return self.moved(Some(sibling));
            }
            parent = self.visible_parent(p);
        }
        None
    }

    /// The previous visible node in document order.
    pub fn previous_node(&mut self) -> Option<Node<'d>> {
        let sibling = match self.visible_previous_sibling(self.current, self.root) {
            Some(sibling) => sibling,
            None => {
                let parent = self.visible_parent(self.current);
                return self.moved(parent);
            }
        };

        let mut deepest = sibling;
        while let Some(last) = self.visible_last_child(deepest) {
            deepest = last;
        }
        self.moved(Some(deepest))
    }

    fn visible_parent(&self, node: Node<'d>) -> Option<Node<'d>> {
        let mut node = node;
        loop {
            if node == self.root {
                return None;
            }
            let parent = node.parent()?;
            if self.selection.judge(parent) == FilterResult::Accept {
                return Some(parent);
            }
            node = parent;
        }
    }

    fn visible_first_child(&self, node: Node<'d>) -> Option<Node<'d>> {
        if !self.selection.enters(node) {
            return None;
        }
        let child = node.first_child()?;
        match self.selection.judge(child) {
            FilterResult::Accept => Some(child),
            FilterResult::Skip if child.has_child_nodes() => {
                self.visible_first_child(child).or_else(|| self.visible_next_sibling(child, node))
            }
            _ => self.visible_next_sibling(child, node),
        }
    }

    fn visible_last_child(&self, node: Node<'d>) -> Option<Node<'d>> {
        if !self.selection.enters(node) {
            return None;
        }
        let child = node.last_child()?;
        match self.selection.judge(child) {
            FilterResult::Accept => Some(child),
            FilterResult::Skip if child.has_child_nodes() => {
                self.visible_last_child(child).or_else(|| self.visible_previous_sibling(child, node))
            }
            _ => self.visible_previous_sibling(child, node),
        }
    }

    /// The next visible sibling within `root`, looking through skipped
    /// ancestors.
    fn visible_next_sibling(&self, node: Node<'d>, root: Node<'d>) -> Option<Node<'d>> {
        if node == root {
            return None;
        }
        let sibling = match node.next_sibling() {
            Some(sibling) => sibling,
            None => {
                let parent = node.parent().filter(|&p| p != root)?;
                if self.selection.judge(parent) == FilterResult::Skip {
                    return self.visible_next_sibling(parent, root);
                }
                return None;
            }
        };

        match self.selection.judge(sibling) {
            FilterResult::Accept => Some(sibling),
            FilterResult::Skip => {
                self.visible_first_child(sibling).or_else(|| self.visible_next_sibling(sibling, root))
            }
            FilterResult::Reject => self.visible_next_sibling(sibling, root),
        }
    }

    fn visible_previous_sibling(&self, node: Node<'d>, root: Node<'d>) -> Option<Node<'d>> {
        if node == root {
            return None;
        }
        let sibling = match node.previous_sibling() {
            Some(sibling) => sibling,
            None => {
                let parent = node.parent().filter(|&p| p != root)?;
                if self.selection.judge(parent) == FilterResult::Skip {
                    return self.visible_previous_sibling(parent, root);
                }
                return None;
            }
        };

        match self.selection.judge(sibling) {
            FilterResult::Accept => Some(sibling),
            FilterResult::Skip => {
                self.visible_last_child(sibling).or_else(|| self.visible_previous_sibling(sibling, root))
            }
            FilterResult::Reject => self.visible_previous_sibling(sibling, root),
        }
    }
}

/// Steps through the accepted nodes of a subtree in document order.
///
/// The iterator sits between two nodes: the reference node, and the
/// node before or after it depending on the last direction moved.
#[derive(Debug)]
pub struct NodeIterator<'d> {
    root: Node<'d>,
    reference: Option<Node<'d>>,
    forward: bool,
    selection: Selection<'d>,
}

impl<'d> NodeIterator<'d> {
    pub fn root(&self) -> Node<'d> { self.root }
    pub fn what_to_show(&self) -> WhatToShow { self.selection.what_to_show }
    pub fn expand_entity_references(&self) -> bool { self.selection.expand_entity_references }

    /// The node last returned, if any.
    pub fn reference_node(&self) -> Option<Node<'d>> { self.reference }

    /// Whether the iterator is positioned before its reference node.
    pub fn pointer_before_reference_node(&self) -> bool { !self.forward }

    fn accepts(&self, node: Node<'d>) -> bool {
        self.selection.judge(node) == FilterResult::Accept
    }

    pub fn next_node(&mut self) -> Option<Node<'d>> {
        let mut candidate = self.reference;
        loop {
            candidate = if !self.forward && candidate.is_some() {
                self.reference
            } else {
                let visit_children = candidate.map_or(true, |c| self.selection.enters(c));
                self.following(candidate, visit_children)
            };
            self.forward = true;

            let node = candidate?;
            if self.accepts(node) {
                self.reference = Some(node);
                return Some(node);
            }
        }
    }

    pub fn previous_node(&mut self) -> Option<Node<'d>> {
        let mut candidate = self.reference;
        loop {
            candidate = if self.forward && candidate.is_some() {
                self.reference
            } else {
                candidate.and_then(|c| self.preceding(c))
            };
            self.forward = false;

            let node = candidate?;
            if self.accepts(node) {
                self.reference = Some(node);
                return Some(node);
            }
        }
    }

    /// The node after `node` in document order, within the root.
    fn following(&self, node: Option<Node<'d>>, visit_children: bool) -> Option<Node<'d>> {
        let node = match node {
            Some(node) => node,
            None => return Some(self.root),
        };
        if visit_children {
            if let Some(child) = node.first_child() {
                return Some(child);
            }
        }
        if node == self.root {
            return None;
        }
        if let Some(sibling) = node.next_sibling() {
            return Some(sibling);
        }

        let mut parent = node.parent();
        while let Some(p) = parent.filter(|&p| p != self.root) {
            if let Some(sibling) = p.next_sibling() {
                return Some(sibling);
            }
            parent = p.parent();
        }
        None
    }

    /// The node before `node` in document order, within the root.
    fn preceding(&self, node: Node<'d>) -> Option<Node<'d>> {
        if node == self.root {
            return None;
        }
        let mut result = match node.previous_sibling() {
            Some(sibling) => sibling,
            None => return node.parent(),
        };
        while self.selection.enters(result) {
            match result.last_child() {
                Some(last) => result = last,
                None => break,
            }
        }
        Some(result)
    }
}

impl<'d> Iterator for NodeIterator<'d> {
    type Item = Node<'d>;

    fn next(&mut self) -> Option<Node<'d>> {
        self.next_node()
    }
}

impl<'d> Document<'d> {
    /// A walker over the subtree at `root`, starting at `root`.
    pub fn create_tree_walker<N>(
        self,
        root: N,
        what_to_show: WhatToShow,
        filter: Option<Box<dyn NodeFilter + 'd>>,
        expand_entity_references: bool,
    ) -> TreeWalker<'d>
        where N: Into<Node<'d>>
    {
        let root = root.into();
        TreeWalker {
            root,
            current: root,
            selection: Selection { what_to_show, filter, expand_entity_references },
        }
    }

    /// An iterator over the subtree at `root`, positioned before it.
    pub fn create_node_iterator<N>(
        self,
        root: N,
        what_to_show: WhatToShow,
        filter: Option<Box<dyn NodeFilter + 'd>>,
        expand_entity_references: bool,
    ) -> NodeIterator<'d>
        where N: Into<Node<'d>>
    {
        NodeIterator {
            root: root.into(),
            reference: None,
            forward: true,
            selection: Selection { what_to_show, filter, expand_entity_references },
        }
    }
}

#[cfg(test)]
mod test {
    use super::{FilterResult, Node, WhatToShow};
    use crate::{Document, Element, Package};

    // <r><a><b/>text</a><!--c--><d/></r>
    fn sample(doc: Document<'_>) -> Element<'_> {
        let r = doc.create_element("r").unwrap();
        let a = doc.create_element("a").unwrap();
        let d = doc.create_element("d").unwrap();
        doc.root().append_child(r).unwrap();
        r.append_child(a).unwrap();
        a.append_child(doc.create_element("b").unwrap()).unwrap();
        a.append_child(doc.create_text("text")).unwrap();
        r.append_child(doc.create_comment("c")).unwrap();
        r.append_child(d).unwrap();
        r
    }

    fn names<'d, I>(nodes: I) -> Vec<&'d str>
        where I: IntoIterator<Item = Node<'d>>
    {
        nodes.into_iter().map(|n| n.node_name()).collect()
    }

    #[test]
    fn iterators_visit_shown_nodes_in_document_order() {
        let package = Package::new();
        let doc = package.as_document();
        let r = sample(doc);

        let iter = doc.create_node_iterator(r, WhatToShow::ELEMENT, None, true);

        assert_eq!(vec!["r", "a", "b", "d"], names(iter));
    }

    #[test]
    fn iterators_can_turn_around() {
        let package = Package::new();
        let doc = package.as_document();
        let r = sample(doc);
        let mut iter = doc.create_node_iterator(r, WhatToShow::ELEMENT, None, true);

        assert_eq!(Some("r"), iter.next_node().map(|n| n.node_name()));
        assert_eq!(Some("a"), iter.next_node().map(|n| n.node_name()));
        assert_eq!(Some("a"), iter.previous_node().map(|n| n.node_name()));
        assert!(iter.pointer_before_reference_node());
        assert_eq!(Some("r"), iter.previous_node().map(|n| n.node_name()));
        assert_eq!(None, iter.previous_node());
    }

    #[test]
    fn walkers_look_through_skipped_nodes() {
        let package = Package::new();
        let doc = package.as_document();
        let r = sample(doc);
        let skip_a = |n: Node<'_>| {
            if n.node_name() == "a" { FilterResult::Skip } else { FilterResult::Accept }
        };

        let mut walker = doc.create_tree_walker(r, WhatToShow::ELEMENT, Some(Box::new(skip_a)), true);

        assert_eq!(Some("b"), walker.first_child().map(|n| n.node_name()));
        assert_eq!(Some("d"), walker.next_sibling().map(|n| n.node_name()));
        assert_eq!(Some("r"), walker.parent_node().map(|n| n.node_name()));
    }

    #[test]
    fn walkers_hide_rejected_subtrees() {
        let package = Package::new();
        let doc = package.as_document();
        let r = sample(doc);
        let reject_a = |n: Node<'_>| {
            if n.node_name() == "a" { FilterResult::Reject } else { FilterResult::Accept }
        };

        let mut walker = doc.create_tree_walker(r, WhatToShow::ELEMENT, Some(Box::new(reject_a)), true);

        let mut seen = Vec::new();
        while let Some(n) = walker.next_node() {
            seen.push(n.node_name());
        }
        assert_eq!(vec!["d"], seen);

        assert_eq!(Some("r"), walker.previous_node().map(|n| n.node_name()));
    }

    #[test]
    fn walkers_can_move_backwards_to_the_deepest_node() {
        let package = Package::new();
        let doc = package.as_document();
        let r = sample(doc);
        let shown = WhatToShow::ELEMENT | WhatToShow::TEXT;
        let mut walker = doc.create_tree_walker(r, shown, None, true);

        walker.last_child();
        assert_eq!("d", walker.current_node().node_name());
        assert_eq!(Some("#text"), walker.previous_node().map(|n| n.node_name()));
        assert_eq!(Some("b"), walker.previous_node().map(|n| n.node_name()));
    }

    #[test]
    fn entity_references_are_opaque_unless_expanded() {
        let package = Package::new();
        let doc = package.as_document();
        let e = doc.create_element("e").unwrap();
        let reference = doc.create_entity_reference("ent").unwrap();
        reference.as_node().set_read_only(false, false);
        reference.as_node().append_child(doc.create_text("inside")).unwrap();
        e.append_child(reference).unwrap();

        let closed = doc.create_node_iterator(e, WhatToShow::ALL, None, false);
        assert_eq!(vec!["e", "ent"], names(closed));

        let open = doc.create_node_iterator(e, WhatToShow::ALL, None, true);
        assert_eq!(vec!["e", "ent", "#text"], names(open));
    }
}
