//! Linking children into a parent.
//!
//! Children of one parent form a chain through `next`. The head of the
//! chain is marked with `first_child` and its `previous` points at the
//! tail, which gives constant-time access to both ends without a
//! separate tail field. Every other `previous` is the true
//! predecessor. Only `SiblingList` touches these fields directly.

use super::raw::{ChildCache, NodeId, Tree};

/// A view of one parent's child chain.
pub struct SiblingList<'t> {
    tree: &'t mut Tree,
    parent: NodeId,
}

impl<'t> SiblingList<'t> {
    pub fn new(tree: &'t mut Tree, parent: NodeId) -> SiblingList<'t> {
        SiblingList { tree, parent }
    }

    pub fn head(&self) -> Option<NodeId> {
        head(self.tree, self.parent)
    }

    pub fn tail(&self) -> Option<NodeId> {
        tail(self.tree, self.parent)
    }

    /// Link `new` before `reference`, or at the end when there is no
    /// reference. `new` must be detached and `reference`, if given,
    /// must be a child of this list.
    pub fn insert_before(&mut self, new: NodeId, reference: Option<NodeId>) {
        let parent = self.parent;
        let tree = &mut *self.tree;

        match (tree[parent].children.head, reference) {
            (None, _) => {
                tree[new].previous = Some(new);
                tree[new].next = None;
                tree[new].flags.first_child = true;
                tree[parent].children.head = Some(new);
            }
            (Some(head), None) => {
                let tail = tree[head].previous;
                if let Some(tail) = tail {
                    tree[tail].next = Some(new);
                }
                tree[new].previous = tail;
                tree[new].next = None;
                tree[new].flags.first_child = false;
                tree[head].previous = Some(new);
            }
            (Some(head), Some(r)) if r == head => {
                tree[new].previous = tree[head].previous;
                tree[new].next = Some(head);
                tree[new].flags.first_child = true;
                tree[head].previous = Some(new);
                tree[head].flags.first_child = false;
                tree[parent].children.head = Some(new);
            }
            (Some(_), Some(r)) => {
                let prev = tree[r].previous;
                if let Some(prev) = prev {
                    tree[prev].next = Some(new);
                }
                tree[new].previous = prev;
                tree[new].next = Some(r);
                tree[new].flags.first_child = false;
                tree[r].previous = Some(new);
            }
        }

        tree[new].owner = Some(parent);
        tree[new].flags.owned = true;

        let cache = &mut tree[parent].children.cache;
        if let Some(len) = cache.length.as_mut() {
            *len += 1;
        }
        cache.position = match cache.position {
            // The new node takes over the cached slot.
            Some((index, node)) if Some(node) == reference => Some((index, new)),
            _ => None,
        };
    }

    /// Unlink a child. Returns the sibling that preceded it.
    pub fn remove(&mut self, old: NodeId) -> Option<NodeId> {
        let parent = self.parent;
        let previous = previous_sibling(self.tree, old);
        let tree = &mut *self.tree;
        let next = tree[old].next;

        if tree[old].flags.first_child {
            match next {
                Some(n) => {
                    tree[n].previous = tree[old].previous;
                    tree[n].flags.first_child = true;
                    tree[parent].children.head = Some(n);
                }
                None => tree[parent].children.head = None,
            }
        } else {
            if let Some(p) = previous {
                tree[p].next = next;
            }
            match next {
                Some(n) => tree[n].previous = previous,
                None => {
                    if let Some(head) = tree[parent].children.head {
                        tree[head].previous = previous;
                    }
                }
            }
        }

        let node = &mut tree[old];
        node.next = None;
        node.previous = None;
        node.owner = None;
        node.flags.first_child = false;
        node.flags.owned = false;

        let cache = &mut tree[parent].children.cache;
        if let Some(len) = cache.length.as_mut() {
            *len = len.saturating_sub(1);
        }
        cache.position = match (cache.position, previous) {
            // Slide back onto the predecessor of the removed node.
            (Some((index, node)), Some(p)) if node == old && index > 0 => Some((index - 1, p)),
            _ => None,
        };

        previous
    }
}

pub fn head(tree: &Tree, parent: NodeId) -> Option<NodeId> {
    tree[parent].children.head
}

pub fn tail(tree: &Tree, parent: NodeId) -> Option<NodeId> {
    head(tree, parent).and_then(|h| tree[h].previous)
}

pub fn next_sibling(tree: &Tree, child: NodeId) -> Option<NodeId> {
    tree[child].next
}

pub fn previous_sibling(tree: &Tree, child: NodeId) -> Option<NodeId> {
    let node = &tree[child];
    if node.flags.first_child { None } else { node.previous }
}

/// Walks the child chain without materializing anything.
pub struct Children<'t> {
    tree: &'t Tree,
    next: Option<NodeId>,
}

impl<'t> Iterator for Children<'t> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree[current].next;
        Some(current)
    }
}

pub fn children(tree: &Tree, parent: NodeId) -> Children<'_> {
    Children { tree, next: head(tree, parent) }
}

impl Tree {
    pub(crate) fn siblings(&mut self, parent: NodeId) -> SiblingList<'_> {
        SiblingList::new(self, parent)
    }

    /// Collect the ids of a node's children.
    pub(crate) fn child_ids(&self, parent: NodeId) -> Vec<NodeId> {
        children(self, parent).collect()
    }

    /// Number of children, answered from the position cache when it
    /// is enabled.
    pub(crate) fn child_count(&mut self, parent: NodeId) -> usize {
        if let Some(len) = self[parent].children.cache.length {
            return len;
        }
        let len = children(self, parent).count();
        if self.config.child_list_cache {
            self[parent].children.cache.length = Some(len);
        }
        len
    }

    /// The child at `index`. Walks from the cached position when there
    /// is one, which makes sequential access linear overall.
    pub(crate) fn child_at(&mut self, parent: NodeId, index: usize) -> Option<NodeId> {
        let ChildCache { position, .. } = self[parent].children.cache;

        let (mut at, mut node) = match position {
            Some((cached, node)) if index >= cached || cached - index <= index => (cached, node),
            _ => (0, head(self, parent)?),
        };

        while at < index {
            node = next_sibling(self, node)?;
            at += 1;
        }
        while at > index {
            node = previous_sibling(self, node)?;
            at -= 1;
        }

        if self.config.child_list_cache {
            self[parent].children.cache.position = Some((index, node));
        }
        Some(node)
    }
}

#[cfg(test)]
mod test {
    use super::{children, head, previous_sibling, tail};
    use crate::config::Config;
    use crate::raw::{NodeData, NodeId, Tree};
    use crate::string_pool::InternedString;

    fn setup() -> (Tree, NodeId) {
        let mut tree = Tree::new(Config::default());
        let parent = tree.create(NodeData::DocumentFragment);
        (tree, parent)
    }

    fn text(tree: &mut Tree) -> NodeId {
        tree.create(NodeData::Text(InternedString::empty()))
    }

    fn assert_chain(tree: &Tree, parent: NodeId, expected: &[NodeId]) {
        let forward: Vec<_> = children(tree, parent).collect();
        assert_eq!(expected, &forward[..]);
        assert_eq!(expected.last().cloned(), tail(tree, parent));
        for (i, &child) in expected.iter().enumerate() {
            let before = if i == 0 { None } else { Some(expected[i - 1]) };
            assert_eq!(before, previous_sibling(tree, child));
            assert_eq!(i == 0, tree[child].flags.first_child);
            assert_eq!(Some(parent), tree[child].owner);
        }
    }

    #[test]
    fn first_child_is_its_own_tail() {
        let (mut tree, parent) = setup();
        let a = text(&mut tree);

        tree.siblings(parent).insert_before(a, None);

        assert_eq!(Some(a), head(&tree, parent));
        assert_eq!(Some(a), tree[a].previous);
        assert_chain(&tree, parent, &[a]);
    }

    #[test]
    fn appending_moves_the_tail() {
        let (mut tree, parent) = setup();
        let a = text(&mut tree);
        let b = text(&mut tree);
        let c = text(&mut tree);

        for &n in &[a, b, c] {
            tree.siblings(parent).insert_before(n, None);
        }

        assert_eq!(Some(c), tree[a].previous);
        assert_chain(&tree, parent, &[a, b, c]);
    }

    #[test]
    fn inserting_before_the_head_replaces_it() {
        let (mut tree, parent) = setup();
        let a = text(&mut tree);
        let b = text(&mut tree);
        let c = text(&mut tree);
        tree.siblings(parent).insert_before(a, None);
        tree.siblings(parent).insert_before(b, None);

        tree.siblings(parent).insert_before(c, Some(a));

        assert_chain(&tree, parent, &[c, a, b]);
    }

    #[test]
    fn inserting_in_the_middle() {
        let (mut tree, parent) = setup();
        let a = text(&mut tree);
        let b = text(&mut tree);
        let c = text(&mut tree);
        tree.siblings(parent).insert_before(a, None);
        tree.siblings(parent).insert_before(b, None);

        tree.siblings(parent).insert_before(c, Some(b));

        assert_chain(&tree, parent, &[a, c, b]);
    }

    #[test]
    fn removing_the_head_the_middle_and_the_tail() {
        let (mut tree, parent) = setup();
        let nodes: Vec<_> = (0..5).map(|_| text(&mut tree)).collect();
        for &n in &nodes {
            tree.siblings(parent).insert_before(n, None);
        }

        tree.siblings(parent).remove(nodes[0]);
        assert_chain(&tree, parent, &nodes[1..]);

        tree.siblings(parent).remove(nodes[2]);
        assert_chain(&tree, parent, &[nodes[1], nodes[3], nodes[4]]);

        let prev = tree.siblings(parent).remove(nodes[4]);
        assert_eq!(Some(nodes[3]), prev);
        assert_chain(&tree, parent, &[nodes[1], nodes[3]]);

        assert_eq!(None, tree[nodes[4]].owner);
        assert_eq!(None, tree[nodes[4]].previous);
        assert!(!tree[nodes[4]].flags.owned);
    }

    #[test]
    fn removing_the_only_child_empties_the_list() {
        let (mut tree, parent) = setup();
        let a = text(&mut tree);
        tree.siblings(parent).insert_before(a, None);

        tree.siblings(parent).remove(a);

        assert_eq!(None, head(&tree, parent));
        assert_eq!(None, tail(&tree, parent));
    }

    #[test]
    fn indexed_access_follows_mutation() {
        let (mut tree, parent) = setup();
        let nodes: Vec<_> = (0..4).map(|_| text(&mut tree)).collect();
        for &n in &nodes {
            tree.siblings(parent).insert_before(n, None);
        }

        assert_eq!(4, tree.child_count(parent));
        assert_eq!(Some(nodes[2]), tree.child_at(parent, 2));
        assert_eq!(Some(nodes[3]), tree.child_at(parent, 3));
        assert_eq!(Some(nodes[0]), tree.child_at(parent, 0));

        tree.child_at(parent, 2);
        tree.siblings(parent).remove(nodes[2]);
        assert_eq!(3, tree.child_count(parent));
        assert_eq!(Some(nodes[3]), tree.child_at(parent, 2));
        assert_eq!(None, tree.child_at(parent, 3));

        let extra = text(&mut tree);
        tree.siblings(parent).insert_before(extra, Some(nodes[3]));
        assert_eq!(4, tree.child_count(parent));
        assert_eq!(Some(extra), tree.child_at(parent, 2));
        assert_eq!(Some(nodes[3]), tree.child_at(parent, 3));
    }
}
