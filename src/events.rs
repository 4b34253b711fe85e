//! Hooks for observing edits as they happen.
//!
//! Reading nodes from deferred records never produces notifications;
//! only edits made through the public API do. No part of the tree is
//! borrowed while an observer runs, so observers may read or even
//! modify the document. Installing a new observer from inside a
//! callback is not allowed.

use super::dom::{Attribute, Element, Node};

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Mutation<'d> {
    Inserting { parent: Node<'d>, child: Node<'d> },
    Inserted { parent: Node<'d>, child: Node<'d> },
    Removing { parent: Node<'d>, child: Node<'d> },
    Removed { parent: Node<'d>, child: Node<'d> },
    /// Wraps the insert and remove making up a replacement; neither
    /// of those is reported on its own.
    Replacing { parent: Node<'d>, new_child: Node<'d>, old_child: Node<'d> },
    Replaced { parent: Node<'d>, new_child: Node<'d>, old_child: Node<'d> },
    CharacterDataModified { node: Node<'d>, old_value: &'d str, new_value: &'d str },
    AttributeValueModified { attribute: Attribute<'d>, old_value: &'d str },
    AttributeNodeSet { element: Element<'d>, attribute: Attribute<'d>, previous: Option<Attribute<'d>> },
    AttributeNodeRemoved { element: Element<'d>, attribute: Attribute<'d> },
    ElementRenamed { element: Element<'d>, old_name: &'d str },
}

pub trait MutationObserver {
    fn observe(&self, mutation: &Mutation<'_>);
}

impl<F> MutationObserver for F
    where F: Fn(&Mutation<'_>)
{
    fn observe(&self, mutation: &Mutation<'_>) {
        self(mutation)
    }
}

#[cfg(test)]
mod test {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::Mutation;
    use crate::Package;

    fn recorder() -> (Rc<RefCell<Vec<String>>>, impl Fn(&Mutation<'_>)) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let observer = move |m: &Mutation<'_>| {
            let entry = match *m {
                Mutation::Inserting { child, .. } => format!("inserting {}", child.node_name()),
                Mutation::Inserted { child, .. } => format!("inserted {}", child.node_name()),
                Mutation::Removing { child, .. } => format!("removing {}", child.node_name()),
                Mutation::Removed { child, .. } => format!("removed {}", child.node_name()),
                Mutation::Replacing { .. } => "replacing".to_owned(),
                Mutation::Replaced { .. } => "replaced".to_owned(),
                Mutation::CharacterDataModified { old_value, new_value, .. } => {
                    format!("data {} -> {}", old_value, new_value)
                }
                Mutation::AttributeValueModified { attribute, old_value } => {
                    format!("value {} -> {}", old_value, attribute.value())
                }
                Mutation::AttributeNodeSet { attribute, .. } => format!("set {}", attribute.name()),
                Mutation::AttributeNodeRemoved { attribute, .. } => format!("unset {}", attribute.name()),
                Mutation::ElementRenamed { element, old_name } => format!("renamed {} -> {}", old_name, element.name()),
            };
            sink.borrow_mut().push(entry);
        };
        (log, observer)
    }

    #[test]
    fn insertions_and_removals_are_reported_in_pairs() {
        let package = Package::new();
        let doc = package.as_document();
        let (log, observer) = recorder();
        doc.set_mutation_observer(observer);
        let e = doc.create_element("e").unwrap();
        let c = doc.create_element("c").unwrap();

        e.as_node().append_child(c).unwrap();
        e.as_node().remove_child(c).unwrap();

        assert_eq!(vec!["inserting c", "inserted c", "removing c", "removed c"], *log.borrow());
    }

    #[test]
    fn replacement_is_reported_once() {
        let package = Package::new();
        let doc = package.as_document();
        let e = doc.create_element("e").unwrap();
        let old = doc.create_element("old").unwrap();
        e.as_node().append_child(old).unwrap();
        let (log, observer) = recorder();
        doc.set_mutation_observer(observer);

        e.as_node().replace_child(doc.create_element("new").unwrap(), old).unwrap();

        assert_eq!(vec!["replacing", "replaced"], *log.borrow());
    }

    #[test]
    fn observed_attribute_values_keep_their_children() {
        let package = Package::new();
        let doc = package.as_document();
        let e = doc.create_element("e").unwrap();
        let a = e.set_attribute("a", "one").unwrap();
        let (log, observer) = recorder();
        doc.set_mutation_observer(observer);

        e.set_attribute("a", "two").unwrap();

        assert_eq!(
            vec!["removing #text", "removed #text", "inserting #text", "inserted #text", "value one -> two"],
            *log.borrow()
        );
        let child = a.as_node().first_child().unwrap();
        assert_eq!(Some("two"), child.text().map(|t| t.data()));
    }

    #[test]
    fn observed_values_report_every_child_edit() {
        let package = Package::new();
        let doc = package.as_document();
        let a = doc.create_attribute("a").unwrap();
        a.set_value("x").unwrap();
        a.as_node().append_child(doc.create_text("y")).unwrap();
        let (log, observer) = recorder();
        doc.set_mutation_observer(observer);

        a.set_value("").unwrap();

        assert_eq!(
            vec!["removing #text", "removed #text", "removing #text", "removed #text", "value xy -> "],
            *log.borrow()
        );
        assert!(!a.as_node().has_child_nodes());
        assert!(a.specified());
    }

    #[test]
    fn character_data_and_renames_are_reported() {
        let package = Package::new();
        let doc = package.as_document();
        let e = doc.create_element("e").unwrap();
        let t = doc.create_text("a");
        let (log, observer) = recorder();
        doc.set_mutation_observer(observer);

        t.set_data("b").unwrap();
        doc.rename_node(e, None, "f").unwrap();

        assert_eq!(vec!["data a -> b", "renamed e -> f"], *log.borrow());
    }

    #[test]
    fn observers_may_read_the_tree() {
        let package = Package::new();
        let doc = package.as_document();
        let e = doc.create_element("e").unwrap();
        let seen = Rc::new(RefCell::new(0));
        let sink = seen.clone();
        doc.set_mutation_observer(move |m: &Mutation<'_>| {
            if let Mutation::Inserted { parent, .. } = *m {
                *sink.borrow_mut() = parent.child_nodes().length();
            }
        });

        e.as_node().append_child(doc.create_comment("c")).unwrap();

        assert_eq!(1, *seen.borrow());
    }
}
