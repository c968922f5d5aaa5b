use crate::*;
use serde_json::json;

#[test]
fn add_child_rejects_a_second_parent() {
    let (mut tree, root) = ElementTree::with_root(Node::new().with_id("root"));
    let a = tree.create_child(root, Node::new().with_id("a"));
    let b = tree.create_child(root, Node::new().with_id("b"));
    let c = tree.create_child(a, Node::new().with_id("c"));

    let err = tree.add_child(b, c, None).unwrap_err();
    assert!(matches!(err, Error::AlreadyParented { .. }), "{err}");
    // Re-adding under the same parent only records the key.
    tree.add_child(a, c, Some("see")).unwrap();
    assert_eq!(tree.get_child(a, "see").unwrap(), c);
    assert_eq!(tree.children(a), &[c]);
}

#[test]
fn port_cannot_belong_to_two_nodes() {
    let (mut tree, root) = ElementTree::with_root(Node::new());
    let n1 = tree.create_child(root, Node::new());
    let n2 = tree.create_child(root, Node::new());
    let p = tree.new_port(Port::new());

    tree.add_port(n1, p, Some("p")).unwrap();
    assert!(matches!(
        tree.add_port(n2, p, None),
        Err(Error::AlreadyParented { .. })
    ));
    assert_eq!(tree.port_parent(p), Some(n1));
}

#[test]
fn hierarchy_stays_acyclic() {
    let (mut tree, root) = ElementTree::with_root(Node::new());
    let a = tree.create_child(root, Node::new());
    tree.remove_child(root, a).unwrap();
    let b = tree.create_child(a, Node::new());

    assert!(matches!(
        tree.add_child(b, a, None),
        Err(Error::HierarchyCycle { .. })
    ));
    assert!(matches!(
        tree.add_child(a, a, None),
        Err(Error::HierarchyCycle { .. })
    ));
}

#[test]
fn keyed_lookups_report_missing_and_ambiguous_keys() {
    let (mut tree, root) = ElementTree::with_root(Node::new());
    let x1 = tree.new_node(Node::new());
    let x2 = tree.new_node(Node::new());
    tree.add_child(root, x1, Some("x")).unwrap();
    tree.add_child(root, x2, Some("x")).unwrap();

    assert!(matches!(
        tree.get_child(root, "x"),
        Err(Error::NotUnique { count: 2, .. })
    ));
    assert!(matches!(tree.get_child(root, "y"), Err(Error::NotFound { .. })));
    assert!(matches!(tree.get_port(root, "p"), Err(Error::NotFound { .. })));
}

#[test]
fn remove_child_detaches_or_fails() {
    let (mut tree, root) = ElementTree::with_root(Node::new());
    let a = tree.create_child(root, Node::new());
    tree.remove_child(root, a).unwrap();
    assert_eq!(tree.parent(a), None);
    assert!(tree.children(root).is_empty());
    assert!(matches!(
        tree.remove_child(root, a),
        Err(Error::NotFound { .. })
    ));
}

#[test]
fn elements_are_walked_children_ports_edges_then_labels() {
    let (mut tree, root) = ElementTree::with_root(Node::new());
    let child = tree.create_child(root, Node::new());
    let child_label = tree.add_label(child, Label::new("child"));
    let port = tree.create_port(root, Port::new());
    let port_label = tree.add_label(port, Label::new("port"));
    let edge = tree.add_edge(root, child, port, None);
    let edge_label = tree.add_label(edge, Label::new("edge"));
    let root_label = tree.add_label(root, Label::new("root"));

    let order: Vec<ElementKey> = tree.iter_elements(root).collect();
    assert_eq!(
        order,
        vec![
            root.into(),
            child.into(),
            child_label.into(),
            port.into(),
            port_label.into(),
            edge.into(),
            edge_label.into(),
            root_label.into(),
        ]
    );

    let pairs: Vec<(ElementKey, ElementKey)> = tree.iter_hierarchy(root).collect();
    assert_eq!(pairs.len(), 7);
    assert_eq!(pairs[0], (root.into(), child.into()));
}

#[test]
fn visible_walk_tracks_the_last_visible_container() {
    let (mut tree, root) = ElementTree::with_root(Node::new());
    let shown = tree.create_child(root, Node::new());
    let hidden = tree.create_child(shown, Node::new().hidden(true));
    let inner = tree.create_child(hidden, Node::new());

    let entries: Vec<VisibleEntryView> = tree
        .iter_visible(root)
        .map(|e| (e.key, e.hidden, e.last_visible))
        .collect();
    assert_eq!(
        entries,
        vec![
            (root.into(), false, Some(root.into())),
            (shown.into(), false, Some(shown.into())),
            (hidden.into(), true, Some(shown.into())),
            (inner.into(), true, Some(shown.into())),
        ]
    );
}

type VisibleEntryView = (ElementKey, bool, Option<ElementKey>);

#[test]
fn serialization_strips_nulls_and_inherits_shape_size() {
    let (mut tree, root) = ElementTree::with_root(Node::new().with_id("root"));
    let mut boxed = Node::new().with_id("box").with_class("fancy");
    boxed.properties.shape = Some(Shape {
        kind: Some("rect".to_string()),
        width: Some(40.0),
        height: Some(20.0),
        ..Shape::default()
    });
    let boxed = tree.create_child(root, boxed);
    tree.add_label(boxed, Label::new("hello").with_id("box.label"));
    tree.create_port(boxed, Port::new().with_id("box.in"));

    let value = tree.to_value(root, &SerializeOptions::full()).unwrap();
    assert_eq!(
        value,
        json!({
            "id": "root",
            "children": [{
                "id": "box",
                "ports": [{ "id": "box.in" }],
                "labels": [{ "id": "box.label", "text": "hello" }],
                "width": 40.0,
                "height": 20.0,
                "properties": {
                    "cssClasses": "fancy",
                    "shape": { "type": "rect", "width": 40.0, "height": 20.0 }
                }
            }]
        })
    );
}

#[test]
fn serialization_can_skip_hidden_elements_and_layout_fields() {
    let (mut tree, root) = ElementTree::with_root(Node::new().with_id("root"));
    tree.node_mut(root).x = Some(3.0);
    let a = tree.create_child(root, Node::new().with_id("a").with_position(1.0, 2.0));
    tree.create_child(root, Node::new().with_id("gone").hidden(true));
    let e = tree.add_edge(root, a, a, None);
    tree.set_id(e, Some("e".to_string()));
    tree.edge_mut(e).sections.push(json!({ "id": "s0" }));

    let value = tree
        .to_value(root, &SerializeOptions::visible_skeleton())
        .unwrap();
    assert_eq!(
        value,
        json!({
            "id": "root",
            "children": [{ "id": "a" }],
            "edges": [{ "id": "e", "sources": ["a"], "targets": ["a"] }]
        })
    );
}

#[test]
fn serialization_without_ids_needs_a_registry() {
    let (tree, root) = ElementTree::with_root(Node::new());
    assert!(matches!(
        tree.to_elk(root, &SerializeOptions::full()),
        Err(Error::Registry)
    ));
}
