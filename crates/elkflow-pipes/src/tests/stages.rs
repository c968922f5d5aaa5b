use super::sample_tree;
use crate::pipe::Pipe;
use crate::text_sizer::LABEL_SPACING_OPTION;
use crate::{TextSizer, ValidationPipe, VisibilityPipe};
use elkflow_core::visibility::SLACK_PORT_CLASS;
use elkflow_core::{ElementTree, FlowConfig, Label, Mark, Node, SerializeOptions, schema};
use futures::executor::block_on;
use serde_json::json;
use std::rc::Rc;

fn prime(pipe: &dyn Pipe, tree: ElementTree, flow: &[&str]) -> Mark {
    let inlet = Mark::with_value(tree, flow.iter().copied());
    pipe.set_inlet(inlet.clone());
    inlet
}

#[test]
fn validation_repairs_ids_and_edge_owners() {
    let (mut tree, root) = ElementTree::with_root(Node::new().with_id("root"));
    let a = tree.create_child(root, Node::new().with_id("a"));
    let b = tree.create_child(root, Node::new());
    // Owned by `a` although `root` is the common ancestor.
    tree.add_edge(a, a, b, None);

    let pipe = ValidationPipe::default();
    let inlet = prime(&pipe, tree, &["new"]);
    assert!(pipe.check_dirty());
    assert!(pipe.outlet().flow().contains("layout"));

    block_on(pipe.run()).unwrap();

    let report = pipe.report().unwrap();
    assert_eq!(report.fixed_edges, 1);
    assert_eq!(report.fixed_ids, 2);

    let out = pipe.outlet().value().unwrap();
    let root = out.root().unwrap();
    assert_eq!(out.edges(root).len(), 1);
    assert!(out.edges(a).is_empty());
    assert!(out.explicit_id(b).is_some());

    let value = out.to_value(root, &SerializeOptions::full()).unwrap();
    assert!(schema::check(&value).is_empty());
    // The inlet tree is left untouched.
    assert!(inlet.value().unwrap().explicit_id(b).is_none());
}

#[test]
fn validation_ignores_color_changes() {
    let pipe = ValidationPipe::default();
    prime(&pipe, sample_tree(), &["node.properties.cssClasses-colors"]);
    assert!(!pipe.check_dirty());
}

#[test]
fn validation_of_an_empty_mark_clears_the_outlet() {
    let pipe = ValidationPipe::default();
    pipe.outlet().set_value(Some(Rc::new(sample_tree())));
    pipe.set_inlet(Mark::new());

    block_on(pipe.run()).unwrap();
    assert!(pipe.outlet().value().is_none());
}

#[test]
fn validation_rejects_what_it_may_not_repair() {
    let mut config = FlowConfig::defaults();
    config.set_value("validation.fixNullId", json!(false));
    let pipe = ValidationPipe::from_config(&config);
    assert!(!pipe.options().fix_null_id);

    let (mut tree, root) = ElementTree::with_root(Node::new().with_id("root"));
    tree.create_child(root, Node::new());
    prime(&pipe, tree, &["new"]);

    assert!(block_on(pipe.run()).is_err());
    assert!(pipe.report().is_none());
}

#[test]
fn text_sizer_fills_missing_label_sizes() {
    let (mut tree, root) = ElementTree::with_root(Node::new().with_id("root"));
    let a = tree.create_child(root, Node::new().with_id("a"));
    let plain = tree.add_label(a, Label::new("alpha"));
    let mut half = Label::new("beta");
    half.width = Some(7.0);
    let half = tree.add_label(a, half);
    let blank = tree.add_label(a, Label::new("   "));

    let pipe = TextSizer::new();
    prime(&pipe, tree, &["label.text"]);
    assert!(pipe.check_dirty());
    assert!(pipe.outlet().flow().contains("label.size"));
    block_on(pipe.run()).unwrap();

    let out = pipe.outlet().value().unwrap();
    let size = |k| (out.label(k).width, out.label(k).height);
    assert_eq!(size(plain), (Some(50.0), Some(10.0)));
    assert_eq!(size(half), (Some(7.0), Some(10.0)));
    assert_eq!(size(blank), (None, None));
}

#[test]
fn text_sizer_lays_sub_labels_side_by_side() {
    let (mut tree, root) = ElementTree::with_root(Node::new().with_id("root"));
    let a = tree.create_child(root, Node::new().with_id("a"));
    let outer = tree.add_label(a, Label::new("ab"));
    tree.add_label(outer, Label::new("c").with_layout_option(LABEL_SPACING_OPTION, "5"));
    let tall = Label::new("de").with_size(20.0, 30.0);
    tree.add_label(outer, tall);

    let pipe = TextSizer::new();
    prime(&pipe, tree, &["layout"]);
    block_on(pipe.run()).unwrap();

    let out = pipe.outlet().value().unwrap();
    let label = out.label(outer);
    assert_eq!(label.width, Some(20.0 + (10.0 + 5.0) + 20.0));
    assert_eq!(label.height, Some(30.0));
}

#[test]
fn text_sizer_keeps_compound_label_sizes_across_runs() {
    let (mut tree, root) = ElementTree::with_root(Node::new().with_id("root"));
    let a = tree.create_child(root, Node::new().with_id("a"));
    let outer = tree.add_label(a, Label::new("ab"));
    let inner = tree.add_label(outer, Label::new("c"));
    tree.add_label(inner, Label::new("d").with_layout_option(LABEL_SPACING_OPTION, "2"));

    let pipe = TextSizer::new();
    prime(&pipe, tree, &["layout"]);
    let mut widths = Vec::new();
    for _ in 0..3 {
        block_on(pipe.run()).unwrap();
        let out = pipe.outlet().value().unwrap();
        widths.push((out.label(outer).width, out.label(inner).width));
        prime(&pipe, (*out).clone(), &["layout"]);
    }

    assert_eq!(widths[0], (Some(20.0 + 10.0 + 2.0 + 10.0), Some(10.0 + 2.0 + 10.0)));
    assert!(widths.iter().all(|w| *w == widths[0]));
}

#[test]
fn text_sizer_ignores_unrelated_flows() {
    let pipe = TextSizer::new();
    prime(&pipe, sample_tree(), &["node.properties.hidden"]);
    assert!(!pipe.check_dirty());
    assert!(pipe.status().is_done());
}

#[test]
fn visibility_projects_hidden_containers() {
    let (mut tree, root) = ElementTree::with_root(Node::new().with_id("R"));
    let p1 = tree.create_child(root, Node::new().with_id("P1").hidden(true));
    let n1 = tree.create_child(p1, Node::new().with_id("n1"));
    tree.set_child_key(n1, Some("n1".to_string()));
    let n2 = tree.create_child(root, Node::new().with_id("n2"));
    let edge = tree.add_edge(root, n1, n2, None);
    tree.set_id(edge, Some("e1".to_string()));

    let pipe = VisibilityPipe::default();
    prime(&pipe, tree, &["node.properties.hidden"]);
    assert!(pipe.check_dirty());
    block_on(pipe.run()).unwrap();

    let out = pipe.outlet().value().unwrap();
    let root = out.root().unwrap();
    assert_eq!(out.children(root).len(), 1);
    let slack = out.get_port(root, "n1").unwrap();
    assert!(out.port(slack).properties.has_class(SLACK_PORT_CLASS));
    assert_eq!(out.port(slack).width, Some(5.0));
    assert_eq!(out.edge(out.edges(root)[0]).id.as_deref(), Some("e1"));
}

#[test]
fn visibility_reads_the_slack_port_size() {
    let mut config = FlowConfig::defaults();
    config.set_value("visibility.slackPortSize", json!(8));
    let pipe = VisibilityPipe::from_config(&config);
    assert_eq!(pipe.options().slack_port_size, 8.0);
}
