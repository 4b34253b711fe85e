//! The insert and remove primitives every structural edit goes
//! through, and the checks that guard them.
//!
//! The checks run to completion before anything is linked, so a
//! rejected edit leaves the tree as it was.

use super::deferred::Need;
use super::error::{Error, Result};
use super::raw::{NodeId, NodeKind, Tree};
use super::siblings::{self, children};
use super::string_pool::InternedString;

impl Tree {
    fn root_child_of_kind(&mut self, kind: NodeKind) -> Option<NodeId> {
        let root = self.root;
        self.ensure(root, Need::Children);
        children(self, root).find(|&c| self.kind(c) == kind)
    }

    pub(crate) fn doctype(&mut self) -> Option<NodeId> {
        self.root_child_of_kind(NodeKind::DocumentType)
    }

    pub(crate) fn document_element(&mut self) -> Option<NodeId> {
        self.root_child_of_kind(NodeKind::Element)
    }

    fn check_parent_writable(&self, parent: NodeId) -> Result<()> {
        if self[parent].flags.read_only {
            return Err(Error::ReadOnly { kind: self.kind(parent) });
        }
        Ok(())
    }

    fn check_reference(&self, parent: NodeId, reference: Option<NodeId>) -> Result<()> {
        match reference {
            Some(r) if self.parent(r) != Some(parent) => Err(Error::NotFound { kind: self.kind(r) }),
            _ => Ok(()),
        }
    }

    /// A document has at most one element and one document type.
    fn check_document_slot(
        &mut self,
        parent: NodeId,
        kind: NodeKind,
        incoming: &[NodeId],
        replacing: Option<NodeId>,
    ) -> Result<()> {
        if self.kind(parent) != NodeKind::Document || !matches!(kind, NodeKind::Element | NodeKind::DocumentType) {
            return Ok(());
        }

        let arriving = incoming.iter().filter(|&&c| self.kind(c) == kind).count();
        let staying = match self.root_child_of_kind(kind) {
            Some(existing) if Some(existing) != replacing && !incoming.contains(&existing) => 1,
            _ => 0,
        };

        if arriving + staying > 1 {
            return Err(Error::Hierarchy { parent: NodeKind::Document, child: kind });
        }
        Ok(())
    }

    /// Preconditions for inserting `child` (not a fragment) into
    /// `parent` before `reference`. `replacing` names a child that is
    /// about to be removed, which may free a document slot.
    pub(crate) fn check_insert(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
        replacing: Option<NodeId>,
    ) -> Result<()> {
        self.ensure(parent, Need::Children);
        if !self.error_checking() {
            return self.check_reference(parent, reference);
        }

        let (parent_kind, child_kind) = (self.kind(parent), self.kind(child));
        self.check_parent_writable(parent)?;
        if !parent_kind.accepts_child(child_kind) {
            return Err(Error::Hierarchy { parent: parent_kind, child: child_kind });
        }
        if self.is_inclusive_ancestor(child, parent) {
            return Err(Error::Cycle { child: child_kind });
        }
        self.check_reference(parent, reference)?;
        self.check_document_slot(parent, child_kind, &[child], replacing)?;
        if let Some(old_parent) = self.parent(child) {
            self.check_parent_writable(old_parent)?;
        }
        Ok(())
    }

    /// Preconditions for moving all children of a fragment into
    /// `parent`.
    pub(crate) fn check_insert_fragment(
        &mut self,
        parent: NodeId,
        fragment: NodeId,
        reference: Option<NodeId>,
        replacing: Option<NodeId>,
    ) -> Result<()> {
        self.ensure(parent, Need::Children);
        self.ensure(fragment, Need::Children);
        if !self.error_checking() {
            return self.check_reference(parent, reference);
        }

        let parent_kind = self.kind(parent);
        self.check_parent_writable(parent)?;
        self.check_parent_writable(fragment)?;
        if self.is_inclusive_ancestor(fragment, parent) {
            return Err(Error::Cycle { child: NodeKind::DocumentFragment });
        }
        self.check_reference(parent, reference)?;

        let incoming = self.child_ids(fragment);
        for &c in &incoming {
            let kind = self.kind(c);
            if !parent_kind.accepts_child(kind) {
                return Err(Error::Hierarchy { parent: parent_kind, child: kind });
            }
        }
        self.check_document_slot(parent, NodeKind::Element, &incoming, replacing)?;
        self.check_document_slot(parent, NodeKind::DocumentType, &incoming, replacing)?;
        Ok(())
    }

    pub(crate) fn check_remove(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.ensure(parent, Need::Children);
        if self.error_checking() {
            self.check_parent_writable(parent)?;
        }
        if self.parent(child) != Some(parent) {
            return Err(Error::NotFound { kind: self.kind(child) });
        }
        Ok(())
    }

    /// Changing the children of an ID attribute changes the value it
    /// is indexed under.
    fn reindexes(&self, parent: NodeId) -> bool {
        self.kind(parent) == NodeKind::Attribute && self[parent].flags.id_attribute
    }

    /// Link `child` before `reference`, detaching it from its previous
    /// parent first. Inserting a node before itself moves it before
    /// its next sibling, which leaves it where it was.
    pub(crate) fn insert_child(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        self.child_access(parent);
        let reference = if reference == Some(child) { siblings::next_sibling(self, child) } else { reference };

        if let Some(old_parent) = self.parent(child) {
            self.remove_child(old_parent, child);
        }

        let reindex = self.reindexes(parent);
        if reindex {
            self.unregister_id(parent);
        }

        self.siblings(parent).insert_before(child, reference);
        self.check_normalized_after_insert(parent, child);

        if reindex {
            self.register_id(parent);
        }
        self.changed();
    }

    /// Unlink `child`, which must be a child of `parent`.
    pub(crate) fn remove_child(&mut self, parent: NodeId, child: NodeId) {
        self.child_access(parent);

        let reindex = self.reindexes(parent);
        if reindex {
            self.unregister_id(parent);
        }

        let previous = self.siblings(parent).remove(child);
        self.check_normalized_after_remove(parent, previous);

        if reindex {
            self.register_id(parent);
        }
        self.changed();
    }

    /// Replace the character data of a text, CDATA, comment or
    /// processing instruction node. Returns the old and new data.
    pub(crate) fn replace_data(&mut self, id: NodeId, data: &str) -> Result<(InternedString, InternedString)> {
        self.ensure(id, Need::Data);
        if self.error_checking() && self[id].flags.read_only {
            return Err(Error::ReadOnly { kind: self.kind(id) });
        }
        let old = match self[id].data.character_data() {
            Some(old) => old,
            None => return Err(Error::NotSupported { kind: self.kind(id) }),
        };

        let parent = self.parent(id);
        let reindex = parent.filter(|&p| self.reindexes(p));
        if let Some(attr) = reindex {
            self.unregister_id(attr);
        }

        let new = self.intern(data);
        self[id].data.set_character_data(new);
        if self.kind(id) == NodeKind::Text && data.is_empty() {
            if let Some(parent) = parent {
                self.mark_unnormalized(parent);
            }
        }

        if let Some(attr) = reindex {
            self.register_id(attr);
        }
        Ok((old, new))
    }

    fn is_text(&self, id: Option<NodeId>) -> bool {
        id.map_or(false, |id| self.kind(id) == NodeKind::Text)
    }

    fn check_normalized_after_insert(&mut self, parent: NodeId, child: NodeId) {
        if self.kind(child) == NodeKind::Text {
            self.ensure(child, Need::Data);
            let empty = self[child].data.character_data().map_or(true, |d| d.as_slice().is_empty());
            let previous = siblings::previous_sibling(self, child);
            let next = siblings::next_sibling(self, child);
            if empty || self.is_text(previous) || self.is_text(next) {
                self.mark_unnormalized(parent);
            }
        } else if !self[child].flags.normalized {
            self.mark_unnormalized(parent);
        }
    }

    fn check_normalized_after_remove(&mut self, parent: NodeId, previous: Option<NodeId>) {
        if let Some(previous) = previous.filter(|&p| self.kind(p) == NodeKind::Text) {
            if self.is_text(siblings::next_sibling(self, previous)) {
                self.mark_unnormalized(parent);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use crate::error::ErrorKind;
    use crate::Package;

    #[test]
    fn children_cannot_contain_their_ancestors() {
        let package = Package::new();
        let doc = package.as_document();
        let a = doc.create_element("a").unwrap();
        let b = doc.create_element("b").unwrap();
        a.as_node().append_child(b).unwrap();

        let err = b.as_node().append_child(a).unwrap_err();
        assert_eq!(ErrorKind::Hierarchy, err.kind());

        let err = a.as_node().append_child(a).unwrap_err();
        assert_eq!(ErrorKind::Hierarchy, err.kind());
    }

    #[test]
    fn documents_hold_one_element() {
        let package = Package::new();
        let doc = package.as_document();
        let a = doc.create_element("a").unwrap();
        let b = doc.create_element("b").unwrap();
        doc.root().append_child(a).unwrap();

        let err = doc.root().append_child(b).unwrap_err();
        assert_eq!(ErrorKind::Hierarchy, err.kind());

        doc.root().replace_child(b, a).unwrap();
        assert_eq!(Some(b), doc.document_element());
    }

    #[test]
    fn text_cannot_be_a_document_child() {
        let package = Package::new();
        let doc = package.as_document();

        let err = doc.root().append_child(doc.create_text("t")).unwrap_err();
        assert_eq!(ErrorKind::Hierarchy, err.kind());
    }

    #[test]
    fn the_reference_must_be_a_child() {
        let package = Package::new();
        let doc = package.as_document();
        let parent = doc.create_element("p").unwrap();
        let stranger = doc.create_element("s").unwrap();
        let child = doc.create_element("c").unwrap();

        let err = parent.as_node().insert_before(child, Some(stranger.into())).unwrap_err();
        assert_eq!(ErrorKind::NotFound, err.kind());
        assert_eq!(None, child.parent());
    }

    #[test]
    fn nodes_from_other_documents_are_rejected() {
        let package = Package::new();
        let doc = package.as_document();
        let other_package = Package::new();
        let other = other_package.as_document();
        let parent = doc.create_element("p").unwrap();
        let foreign = other.create_element("f").unwrap();

        let err = parent.as_node().append_child(foreign).unwrap_err();
        assert_eq!(ErrorKind::WrongOwner, err.kind());
    }

    #[test]
    fn inserting_moves_a_node_from_its_old_parent() {
        let package = Package::new();
        let doc = package.as_document();
        let one = doc.create_element("one").unwrap();
        let two = doc.create_element("two").unwrap();
        let child = doc.create_element("c").unwrap();
        one.as_node().append_child(child).unwrap();

        two.as_node().append_child(child).unwrap();

        assert!(!one.as_node().has_child_nodes());
        assert_eq!(Some(two.into()), child.parent());
    }

    #[test]
    fn inserting_a_node_before_itself_keeps_it_in_place() {
        let package = Package::new();
        let doc = package.as_document();
        let parent = doc.create_element("p").unwrap();
        let a = doc.create_element("a").unwrap();
        let b = doc.create_element("b").unwrap();
        let c = doc.create_element("c").unwrap();
        for &n in &[a, b, c] {
            parent.as_node().append_child(n).unwrap();
        }

        parent.as_node().insert_before(b, Some(b.into())).unwrap();

        let names: Vec<_> = parent.as_node().child_nodes().iter().map(|n| n.node_name()).collect();
        assert_eq!(vec!["a", "b", "c"], names);
    }

    #[test]
    fn read_only_parents_reject_changes() {
        let package = Package::new();
        let doc = package.as_document();
        let parent = doc.create_element("p").unwrap();
        let child = doc.create_element("c").unwrap();
        parent.as_node().append_child(child).unwrap();
        parent.as_node().set_read_only(true, false);

        let err = parent.as_node().remove_child(child).unwrap_err();
        assert_eq!(ErrorKind::ReadOnly, err.kind());
        let err = parent.as_node().append_child(doc.create_comment("c")).unwrap_err();
        assert_eq!(ErrorKind::ReadOnly, err.kind());
    }

    #[test]
    fn adjacent_text_marks_the_parent_unnormalized() {
        let package = Package::new();
        let doc = package.as_document();
        let parent = doc.create_element("p").unwrap();
        parent.as_node().append_child(doc.create_text("a")).unwrap();
        assert!(parent.as_node().is_normalized());

        parent.as_node().append_child(doc.create_text("b")).unwrap();

        assert!(!parent.as_node().is_normalized());
    }

    #[test]
    fn removing_a_separator_between_texts_marks_the_parent_unnormalized() {
        let package = Package::new();
        let doc = package.as_document();
        let parent = doc.create_element("p").unwrap();
        let comment = doc.create_comment("c");
        parent.as_node().append_child(doc.create_text("a")).unwrap();
        parent.as_node().append_child(comment).unwrap();
        parent.as_node().append_child(doc.create_text("b")).unwrap();
        assert!(parent.as_node().is_normalized());

        parent.as_node().remove_child(comment).unwrap();

        assert!(!parent.as_node().is_normalized());
    }

    #[test]
    fn unnormalized_state_reaches_the_ancestors() {
        let package = Package::new();
        let doc = package.as_document();
        let outer = doc.create_element("outer").unwrap();
        let inner = doc.create_element("inner").unwrap();
        outer.as_node().append_child(inner).unwrap();

        inner.as_node().append_child(doc.create_text("")).unwrap();

        assert!(!inner.as_node().is_normalized());
        assert!(!outer.as_node().is_normalized());
    }
}
