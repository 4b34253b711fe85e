//! Merging adjacent text nodes, and deep structural equality.

use super::deferred::Need;
use super::pool::ObjectPool;
use super::raw::{NodeId, NodeKind, Tree};
use super::siblings;
use super::snapshot::Snapshot;

/// Buffers for collecting a run of adjacent text nodes.
pub struct TextScratch {
    buffer: String,
    run: Vec<NodeId>,
}

impl TextScratch {
    fn new() -> TextScratch {
        TextScratch { buffer: String::new(), run: Vec::new() }
    }

    fn clear(&mut self) {
        self.buffer.clear();
        self.run.clear();
    }
}

pub(crate) static TEXT_SCRATCH: ObjectPool<TextScratch> = ObjectPool::new(8, TextScratch::new);

impl Tree {
    /// Merge adjacent text children, drop empty ones, and recurse into
    /// child elements and attribute values. Subtrees already known to
    /// be normalized are skipped. CDATA sections are never merged.
    ///
    /// Read-only nodes are left as they are, and neither they nor their
    /// ancestors are flagged normalized while they still hold text runs.
    pub(crate) fn normalize(&mut self, id: NodeId) {
        self.ensure(id, Need::Children);
        if self[id].flags.normalized {
            return;
        }

        let mut clean = if self[id].flags.read_only {
            !self.has_text_runs(id)
        } else {
            self.merge_text_runs(id);
            true
        };

        for child in self.child_ids(id) {
            if self.kind(child) != NodeKind::Text {
                self.normalize(child);
                clean &= self[child].flags.normalized;
            }
        }
        if self.kind(id) == NodeKind::Element {
            for attr in self.map_entries(id, super::attributes::MapKind::Attributes) {
                self.normalize(attr);
                clean &= self[attr].flags.normalized;
            }
        }

        self[id].flags.normalized = clean;
    }

    /// Whether any text child is empty or follows another text node.
    fn has_text_runs(&mut self, parent: NodeId) -> bool {
        let mut previous_was_text = false;
        for child in self.child_ids(parent) {
            let is_text = self.kind(child) == NodeKind::Text;
            if is_text {
                self.ensure(child, Need::Data);
                let empty = self[child].data.character_data().map_or(true, |d| d.as_slice().is_empty());
                if empty || previous_was_text {
                    return true;
                }
            }
            previous_was_text = is_text;
        }
        false
    }

    fn merge_text_runs(&mut self, parent: NodeId) {
        let mut scratch = TEXT_SCRATCH.get();

        let mut next = siblings::head(self, parent);
        while let Some(child) = next {
            if self.kind(child) != NodeKind::Text {
                next = siblings::next_sibling(self, child);
                continue;
            }

            scratch.clear();
            let mut current = Some(child);
            while let Some(text) = current.filter(|&t| self.kind(t) == NodeKind::Text) {
                self.ensure(text, Need::Data);
                if let Some(data) = self[text].data.character_data() {
                    scratch.buffer.push_str(data.as_slice());
                }
                scratch.run.push(text);
                current = siblings::next_sibling(self, text);
            }
            next = current;

            let keep = if scratch.buffer.is_empty() { 0 } else { 1 };
            if keep == 1 && scratch.run.len() > 1 {
                let merged = self.intern(&scratch.buffer);
                self[child].data.set_character_data(merged);
            }
            for &text in &scratch.run[keep..] {
                self.remove_child(parent, text);
            }
        }
    }
}

fn same_set<F>(a: &[Snapshot], b: &[Snapshot], key: F) -> bool
    where F: Fn(&Snapshot) -> (Option<&str>, &str)
{
    a.len() == b.len() && a.iter().all(|x| {
        let k = key(x);
        b.iter().any(|y| key(y) == k && is_equal(x, y))
    })
}

fn attribute_key(s: &Snapshot) -> (Option<&str>, &str) {
    match s.names.local_name {
        Some(ref local) => (s.names.namespace_uri.as_deref(), local),
        None => (None, &s.node_name),
    }
}

fn name_key(s: &Snapshot) -> (Option<&str>, &str) {
    (None, &s.node_name)
}

/// Deep structural equality: kind, names, value, attributes in any
/// order, and children in order. Identity, read-only state and the
/// specified flag are not compared.
pub fn is_equal(a: &Snapshot, b: &Snapshot) -> bool {
    if a.kind != b.kind || a.node_name != b.node_name || a.names != b.names || a.value != b.value {
        return false;
    }
    if a.public_id != b.public_id || a.system_id != b.system_id || a.notation_name != b.notation_name {
        return false;
    }

    let attributes_equal = match a.kind {
        NodeKind::Element => same_set(&a.attributes, &b.attributes, attribute_key),
        NodeKind::DocumentType => {
            same_set(&a.attributes, &b.attributes, name_key) && same_set(&a.notations, &b.notations, name_key)
        }
        _ => true,
    };
    if !attributes_equal {
        return false;
    }

    a.kind == NodeKind::Attribute || (
        a.children.len() == b.children.len() &&
        a.children.iter().zip(&b.children).all(|(x, y)| is_equal(x, y))
    )
}
