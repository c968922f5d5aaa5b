use elkflow_core::{ElementTree, Label, Mark, Node, SerializeOptions, schema};
use elkflow_pipes::{
    ChannelTransport, ElkJs, Pipe, Pipeline, TextSizer, ValidationPipe, VisibilityPipe,
};
use serde_json::{Value, json};
use std::rc::Rc;

/// `R { P1 (hidden) { n1 }, P2 { n2 } }` with `e1: n1 -> n2`.
fn hidden_container() -> ElementTree {
    let (mut tree, root) = ElementTree::with_root(Node::new().with_id("R"));
    let p1 = tree.create_child(root, Node::new().with_id("P1").hidden(true));
    let n1 = tree.create_child(p1, Node::new().with_id("n1"));
    tree.set_child_key(n1, Some("n1".to_string()));
    let p2 = tree.create_child(root, Node::new().with_id("P2"));
    let n2 = tree.create_child(p2, Node::new().with_id("n2"));
    tree.add_label(n2, Label::new("second"));
    let edge = tree.add_edge(p2, n1, n2, None);
    tree.set_id(edge, Some("e1".to_string()));
    tree
}

fn place(node: &mut Value) {
    node["x"] = json!(0.0);
    node["y"] = json!(0.0);
    for field in ["children", "ports", "labels"] {
        if let Some(items) = node.get_mut(field).and_then(Value::as_array_mut) {
            items.iter_mut().for_each(place);
        }
    }
}

#[tokio::test]
async fn full_pipeline_lays_out_the_visible_projection() {
    let (transport, mut rx) = ChannelTransport::new();
    let validator = Rc::new(ValidationPipe::default());
    let sizer = Rc::new(TextSizer::new());
    let visibility = Rc::new(VisibilityPipe::default());
    let elk = Rc::new(ElkJs::new(Rc::new(transport)));
    let pipes: Vec<Rc<dyn Pipe>> = vec![
        validator.clone(),
        sizer.clone(),
        visibility.clone(),
        elk.clone(),
    ];
    let pipeline = Pipeline::new(pipes);
    pipeline.check().unwrap();
    pipeline.set_inlet(Mark::with_value(hidden_container(), ["new"]));

    let engine = {
        let elk = elk.clone();
        async move {
            let request = rx.recv().await.unwrap();
            let mut payload = request["payload"].clone();
            place(&mut payload);
            assert!(elk.handle_message(&json!({ "id": request["id"], "payload": payload })).unwrap());
        }
    };
    let (result, ()) = tokio::join!(pipeline.run(), engine);
    result.unwrap();

    assert!(pipeline.status().is_done());
    let total = pipeline.status().elapsed.unwrap();
    for pipe in pipeline.pipes() {
        assert!(pipe.status().is_done(), "{} is {}", pipe.name(), pipe.status());
        assert!(pipe.status().elapsed.unwrap() <= total);
    }

    let out = pipeline.outlet().value().unwrap();
    let root = out.root().unwrap();
    let value = out.to_value(root, &SerializeOptions::full()).unwrap();
    assert!(schema::check(&value).is_empty(), "{value:#}");

    let ids: Vec<&str> = value["children"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["P2"]);
    assert_eq!(value["children"][0]["x"], json!(0.0));
    assert_eq!(value["ports"][0]["id"], "R.n1");
    assert_eq!(value["edges"][0]["id"], "e1");
    assert_eq!(value["edges"][0]["sources"][0], "R.n1");

    let label = &value["children"][0]["children"][0]["labels"][0];
    assert_eq!(label["text"], "second");
    assert_eq!(label["width"], json!(60.0));

    let report = validator.report().unwrap();
    assert_eq!(report.fixed_edges, 1);
}
