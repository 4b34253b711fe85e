use sxd_dom_core::{Document, Element, ErrorKind, Node, Package};

fn children<'d>(parent: Node<'d>) -> Vec<Node<'d>> {
    parent.child_nodes().iter().collect()
}

fn build_list(doc: Document<'_>, count: usize) -> Element<'_> {
    let parent = doc.create_element("p").unwrap();
    for i in 0..count {
        let name = format!("c{}", i);
        parent.append_child(doc.create_element(&name).unwrap()).unwrap();
    }
    parent
}

#[test]
fn walking_siblings_visits_every_child_and_ends_at_the_last() {
    let package = Package::new();
    let doc = package.as_document();
    let parent = build_list(doc, 5);

    // Edit the list in all three positions to exercise head and tail upkeep.
    let first = parent.as_node().first_child().unwrap();
    parent.remove_child(first).unwrap();
    let last = parent.as_node().last_child().unwrap();
    parent.remove_child(last).unwrap();
    let middle = parent.child_nodes().item(1).unwrap();
    parent.insert_before(doc.create_comment("new head"), Some(parent.as_node().first_child().unwrap())).unwrap();
    parent.remove_child(middle).unwrap();
    parent.append_child(doc.create_text("new tail")).unwrap();

    let mut steps = 0;
    let mut reached = None;
    let mut current = parent.as_node().first_child();
    while let Some(node) = current {
        steps += 1;
        reached = Some(node);
        current = node.next_sibling();
    }

    assert_eq!(parent.child_nodes().length(), steps);
    assert_eq!(parent.as_node().last_child(), reached);
    assert_eq!(None, parent.as_node().first_child().unwrap().previous_sibling());
}

#[test]
fn appending_then_removing_restores_the_child_list() {
    let package = Package::new();
    let doc = package.as_document();
    let parent = build_list(doc, 3);
    let before = children(parent.as_node());

    let n = doc.create_element("n").unwrap();
    parent.insert_before(n, None).unwrap();
    parent.remove_child(n).unwrap();

    assert_eq!(before, children(parent.as_node()));
    assert_eq!(None, n.parent());
    assert_eq!(None, n.as_node().next_sibling());
    assert_eq!(None, n.as_node().previous_sibling());
}

#[test]
fn id_attributes_are_found_until_removed() {
    let package = Package::new();
    let doc = package.as_document();
    let e = doc.create_element("e").unwrap();
    doc.root().append_child(e).unwrap();
    let a = doc.create_attribute("key").unwrap();
    a.set_value("v1").unwrap();

    e.set_attribute_node(a).unwrap();
    e.set_id_attribute_node(a, true).unwrap();
    assert_eq!(Some(e), doc.element_by_id("v1"));

    e.remove_attribute_node(a).unwrap();
    assert_eq!(None, doc.element_by_id("v1"));
}

#[test]
fn changing_an_id_value_moves_the_index_entry() {
    let package = Package::new();
    let doc = package.as_document();
    let e = doc.create_element("e").unwrap();
    doc.root().append_child(e).unwrap();
    e.set_attribute("key", "old").unwrap();
    e.set_id_attribute("key", true).unwrap();

    e.set_attribute("key", "new").unwrap();

    assert_eq!(None, doc.element_by_id("old"));
    assert_eq!(Some(e), doc.element_by_id("new"));
}

#[test]
fn normalizing_twice_is_the_same_as_once() {
    let package = Package::new();
    let doc = package.as_document();
    let e = doc.create_element("e").unwrap();
    e.append_child(doc.create_text("a")).unwrap();
    e.append_child(doc.create_text("")).unwrap();
    e.append_child(doc.create_text("b")).unwrap();
    e.append_child(doc.create_cdata_section("c")).unwrap();
    e.append_child(doc.create_text("d")).unwrap();
    let inner = doc.create_element("inner").unwrap();
    inner.append_child(doc.create_text("x")).unwrap();
    inner.append_child(doc.create_text("y")).unwrap();
    e.append_child(inner).unwrap();

    e.as_node().normalize();
    let once = e.clone_node(true);
    e.as_node().normalize();

    assert!(e.as_node().is_equal_node(once));
    let kinds: Vec<_> = children(e.as_node()).iter().map(|n| n.node_name()).collect();
    assert_eq!(vec!["#text", "#cdata-section", "#text", "inner"], kinds);
    assert_eq!(Some("ab".into()), e.as_node().first_child().and_then(|n| n.node_value()));
    assert_eq!(1, inner.child_nodes().length());
    assert!(e.as_node().is_normalized());
}

#[test]
fn attribute_values_survive_promotion_to_children() {
    let package = Package::new();
    let doc = package.as_document();
    let a = doc.create_attribute("a").unwrap();
    a.set_value("abc").unwrap();
    assert_eq!("abc", a.value());

    let child = a.as_node().first_child().unwrap();

    assert_eq!(Some("abc".into()), child.node_value());
    assert_eq!("abc", a.value());
}

#[test]
fn defaulted_attributes_come_back_after_removal() {
    let package = Package::new();
    let doc = package.as_document();
    let doctype = doc.create_document_type("e", None, None).unwrap();
    doc.root().append_child(doctype).unwrap();
    let template = doc.create_attribute("x").unwrap();
    template.set_value("1").unwrap();
    doctype.declare_default_attribute("e", template).unwrap();

    let e = doc.create_element("e").unwrap();
    assert_eq!(Some("1".into()), e.attribute_value("x"));
    assert!(e.has_attribute("x"));
    assert!(!e.attribute("x").unwrap().specified());

    e.set_attribute("x", "2").unwrap();
    assert!(e.attribute("x").unwrap().specified());

    e.remove_attribute("x").unwrap();
    let restored = e.attribute("x").unwrap();
    assert_eq!("1", restored.value());
    assert!(!restored.specified());
}

#[test]
fn fragments_are_spliced_in_place() {
    let package = Package::new();
    let doc = package.as_document();
    let parent = doc.create_element("p").unwrap();
    let named = |name: &str| doc.create_element(name).unwrap().as_node();
    let (x, reference, y) = (named("x"), named("ref"), named("y"));
    let (a, b, c) = (named("a"), named("b"), named("c"));
    for &n in &[x, reference, y] {
        parent.append_child(n).unwrap();
    }
    let fragment = doc.create_document_fragment();
    for &n in &[a, b, c] {
        fragment.append_child(n).unwrap();
    }

    parent.insert_before(fragment, Some(reference)).unwrap();

    assert_eq!(vec![x, a, b, c, reference, y], children(parent.as_node()));
    assert!(!fragment.as_node().has_child_nodes());
    assert_eq!(None, fragment.parent());
}

#[test]
fn attributes_cannot_belong_to_two_elements() {
    let package = Package::new();
    let doc = package.as_document();
    let e1 = doc.create_element("e1").unwrap();
    let e2 = doc.create_element("e2").unwrap();
    let a = doc.create_attribute("a").unwrap();
    e1.set_attribute_node(a).unwrap();

    let err = e2.set_attribute_node(a).unwrap_err();

    assert_eq!(ErrorKind::InUse, err.kind());
    assert_eq!(Some(e1), a.owner_element());
    assert_eq!(1, e1.attributes().length());
    assert_eq!(Some(a.as_node()), e1.attributes().item(0));
    assert_eq!(0, e2.attributes().length());
}

#[test]
fn nodes_cannot_move_between_documents_without_import() {
    let here = Package::new();
    let there = Package::new();
    let doc = here.as_document();
    let foreign = there.as_document().create_element("f").unwrap();
    foreign.set_attribute("a", "1").unwrap();
    let parent = doc.create_element("p").unwrap();

    let err = parent.append_child(foreign.as_node()).unwrap_err();
    assert_eq!(ErrorKind::WrongOwner, err.kind());

    let imported = doc.import_node(foreign, true).unwrap();
    parent.append_child(imported).unwrap();
    assert!(imported.is_equal_node(foreign));
    assert_eq!(Some(parent.as_node()), imported.parent());
}
