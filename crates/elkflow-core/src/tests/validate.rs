use crate::validate::inspect;
use crate::*;

fn repair(tree: &mut ElementTree) -> ValidationReport {
    Registry::new()
        .scope(|| validate(tree, &RepairOptions::default()))
        .unwrap()
}

#[test]
fn sibling_edge_moves_to_the_common_parent() {
    let (mut tree, a) = ElementTree::with_root(Node::new());
    let b = tree.create_child(a, Node::new());
    let c = tree.create_child(a, Node::new());
    let edge = tree.add_edge(b, b, c, None);

    let report = repair(&mut tree);

    assert_eq!(tree.edge_owner(edge), Some(a));
    assert_eq!(tree.edges(a), &[edge]);
    assert!(tree.edges(b).is_empty());
    assert_eq!(report.fixed_edges, 1);
    assert_eq!(report.fixed_ids, 4);

    let value = tree.to_value(a, &SerializeOptions::full()).unwrap();
    assert!(schema::check(&value).is_empty());
    let b_id = tree.explicit_id(b).unwrap().to_string();
    assert_eq!(value["edges"][0]["sources"][0], b_id.as_str());
}

#[test]
fn cousin_edge_moves_to_the_shared_grandparent() {
    let (mut tree, r) = ElementTree::with_root(Node::new().with_id("R"));
    let a = tree.create_child(r, Node::new().with_id("A"));
    let b = tree.create_child(r, Node::new().with_id("B"));
    let a1 = tree.create_child(a, Node::new().with_id("A1"));
    let b1 = tree.create_child(b, Node::new().with_id("B1"));
    let edge = tree.add_edge(a1, a1, b1, None);
    tree.set_id(edge, Some("e".to_string()));

    let report = validate(&mut tree, &RepairOptions::default()).unwrap();

    assert_eq!(tree.edge_owner(edge), Some(r));
    assert_eq!(report.fixed_ids, 0);
    assert_eq!(report.edge_report.lca_mismatch[&edge], (Some(a1), Some(r)));
}

#[test]
fn self_edge_between_ports_belongs_to_the_node_parent() {
    let (mut tree, root) = ElementTree::with_root(Node::new());
    let n = tree.create_child(root, Node::new());
    let p1 = tree.create_port(n, Port::new());
    let p2 = tree.create_port(n, Port::new());
    let edge = tree.add_edge(n, p1, p2, None);

    repair(&mut tree);
    assert_eq!(tree.edge_owner(edge), Some(root));
}

#[test]
fn orphans_are_attached_to_the_root() {
    let (mut tree, root) = ElementTree::with_root(Node::new());
    let n1 = tree.create_child(root, Node::new());
    let x = tree.new_node(Node::new());
    let edge = tree.add_edge(root, n1, x, None);

    let report = repair(&mut tree);

    assert_eq!(tree.parent(x), Some(root));
    assert_eq!(tree.edge_owner(edge), Some(root));
    assert_eq!(report.fixed_orphans, 1);
    assert_eq!(report.fixed_ids, 4);
    assert_eq!(report.fixed_edges, 0);
}

#[test]
fn repair_is_idempotent() {
    let (mut tree, root) = ElementTree::with_root(Node::new());
    let a = tree.create_child(root, Node::new());
    let b = tree.create_child(a, Node::new());
    let c = tree.create_child(root, Node::new());
    let x = tree.new_node(Node::new());
    tree.add_edge(b, b, c, None);
    tree.add_edge(c, x, b, None);
    tree.add_label(a, Label::new("a"));

    let first = repair(&mut tree);
    assert!(first.repaired());
    let snapshot = tree.to_value(root, &SerializeOptions::full()).unwrap();

    let second = validate(&mut tree, &RepairOptions::default()).unwrap();
    assert!(!second.repaired());
    assert!(second.id_report.is_clean());
    assert!(second.edge_report.is_clean());
    assert_eq!(tree.to_value(root, &SerializeOptions::full()).unwrap(), snapshot);
}

#[test]
fn duplicate_ids_are_rejected() {
    let (mut tree, root) = ElementTree::with_root(Node::new().with_id("root"));
    tree.create_child(root, Node::new().with_id("twin"));
    tree.create_child(root, Node::new().with_id("twin"));

    let err = validate(&mut tree, &RepairOptions::default()).unwrap_err();
    assert!(matches!(err, Error::DuplicateId { ref id, count: 2 } if id == "twin"), "{err}");
}

#[test]
fn findings_are_rejected_when_repair_is_disabled() {
    let (mut tree, root) = ElementTree::with_root(Node::new().with_id("root"));
    let a = tree.create_child(root, Node::new().with_id("a"));
    let b = tree.create_child(root, Node::new().with_id("b"));
    let edge = tree.add_edge(a, a, b, None);
    tree.set_id(edge, Some("e".to_string()));

    let options = RepairOptions {
        fix_edge_owners: false,
        ..RepairOptions::default()
    };
    assert!(matches!(
        validate(&mut tree, &options),
        Err(Error::InvalidModel { .. })
    ));
    assert_eq!(tree.edge_owner(edge), Some(a));

    let (mut unnamed, _) = ElementTree::with_root(Node::new());
    assert!(matches!(
        Registry::new().scope(|| validate(&mut unnamed, &RepairOptions::none())),
        Err(Error::InvalidModel { .. })
    ));
}

#[test]
fn repair_options_follow_the_config() {
    let mut config = FlowConfig::defaults();
    config.set_value("validation.fixOrphans", serde_json::json!(false));
    let options = RepairOptions::from_config(&config);
    assert!(options.fix_null_id);
    assert!(!options.fix_orphans);
    assert!(options.fix_edge_owners);
}

#[test]
fn every_edge_ends_up_at_its_lowest_common_ancestor() {
    // A four level tree with edges hung off arbitrary nodes.
    let (mut tree, root) = ElementTree::with_root(Node::new());
    let mut nodes = vec![root];
    for i in 0..20 {
        let parent = nodes[i / 3];
        nodes.push(tree.create_child(parent, Node::new()));
    }
    let mut edges = Vec::new();
    for i in 0..nodes.len() {
        let source = nodes[(i * 7) % nodes.len()];
        let target = nodes[(i * 11 + 3) % nodes.len()];
        let owner = nodes[(i * 5 + 1) % nodes.len()];
        edges.push(tree.add_edge(owner, source, target, None));
    }

    repair(&mut tree);

    for edge in edges {
        let (s, t) = tree.edge_endpoints(edge);
        let expected = lowest_common_ancestor(
            &tree,
            tree.endpoint_node(s).unwrap(),
            tree.endpoint_node(t).unwrap(),
        );
        assert_eq!(tree.edge_owner(edge), expected);
    }
    let (ids, report) = inspect(&tree, root).unwrap();
    assert!(ids.is_clean());
    assert!(report.is_clean());
}

#[test]
fn index_resolves_ids_and_endpoints() {
    let (mut tree, root) = ElementTree::with_root(Node::new().with_id("root"));
    let n = tree.create_child(root, Node::new().with_id("n"));
    let p = tree.create_port(n, Port::new().with_id("n.p"));
    let l = tree.add_label(n, Label::new("text").with_id("n.label"));

    let index = HierarchicalIndex::build(&tree, root).unwrap();
    assert_eq!(index.len(), 4);
    assert_eq!(index.get_endpoint("n.p").unwrap(), Endpoint::Port(p));
    assert_eq!(index.get("n.label").unwrap(), ElementKey::Label(l));
    assert!(matches!(index.get_endpoint("n.label"), Err(Error::NotFound { .. })));
    assert!(matches!(index.get("missing"), Err(Error::NotFound { .. })));
    assert_eq!(index.root().unwrap(), root);
}
