use super::sample_tree;
use crate::pipe::Pipe;
use crate::{BrowserTextSizer, ChannelTransport, ElkJs, Error, Pipeline};
use elkflow_core::{ElementTree, FlowConfig, Label, Mark, Node};
use serde_json::{Value, json};
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

/// Plays a layout engine: places every node at the origin and answers by id.
fn lay_out(request: &Value) -> Value {
    fn place(node: &mut Value) {
        node["x"] = json!(0.0);
        node["y"] = json!(0.0);
        if node.get("width").is_none() {
            node["width"] = json!(10.0);
            node["height"] = json!(10.0);
        }
        if let Some(children) = node.get_mut("children").and_then(Value::as_array_mut) {
            children.iter_mut().for_each(place);
        }
    }
    let mut payload = request["payload"].clone();
    place(&mut payload);
    json!({ "id": request["id"], "payload": payload })
}

fn labelled_tree(texts: &[&str]) -> ElementTree {
    let (mut tree, root) = ElementTree::with_root(Node::new().with_id("root"));
    for (i, text) in texts.iter().enumerate() {
        let node = tree.create_child(root, Node::new().with_id(format!("n{i}")));
        tree.add_label(node, Label::new(*text));
    }
    tree
}

/// Answers measurement requests until `expected` texts were measured; returns the batch sizes.
async fn measure_service(
    sizer: Rc<BrowserTextSizer>,
    rx: &mut UnboundedReceiver<Value>,
    expected: usize,
) -> Vec<usize> {
    let mut batches = Vec::new();
    let mut seen = 0;
    while seen < expected {
        let Some(request) = rx.recv().await else {
            break;
        };
        let texts = request["texts"].as_array().cloned().unwrap_or_default();
        let measurements: Vec<Value> = texts
            .iter()
            .map(|t| {
                let chars = t["value"].as_str().unwrap().chars().count();
                json!({ "id": t["id"], "width": chars as f64 * 7.0, "height": 12.0 })
            })
            .collect();
        batches.push(texts.len());
        seen += texts.len();
        let message = json!({ "event": "measurement", "measurements": measurements });
        assert_eq!(sizer.handle_message(&message).unwrap(), texts.len());
    }
    batches
}

#[tokio::test]
async fn browser_sizer_measures_in_bounded_batches() {
    let (transport, mut rx) = ChannelTransport::new();
    let sizer = Rc::new(
        BrowserTextSizer::new(Rc::new(transport))
            .with_max_size(2)
            .with_timeout(Duration::from_millis(5)),
    );
    let texts = ["a", "bb", "ccc", "dddd", "eeeee"];
    sizer.set_inlet(Mark::with_value(labelled_tree(&texts), ["label.text"]));
    assert!(sizer.check_dirty());

    let (result, batches) = tokio::join!(sizer.run(), measure_service(sizer.clone(), &mut rx, 5));
    result.unwrap();

    assert!(batches.iter().all(|n| *n >= 1 && *n <= 2), "{batches:?}");
    assert_eq!(batches.iter().sum::<usize>(), 5);
    assert!(sizer.pending().is_empty());

    let out = sizer.outlet().value().unwrap();
    let mut widths: Vec<f64> = out.label_keys().map(|k| out.label(k).width.unwrap()).collect();
    widths.sort_by(f64::total_cmp);
    assert_eq!(widths, vec![7.0, 14.0, 21.0, 28.0, 35.0]);
    assert!(out.label_keys().all(|k| out.label(k).height == Some(12.0)));
}

#[tokio::test]
async fn browser_sizer_keeps_compound_label_sizes_across_runs() {
    let (transport, mut rx) = ChannelTransport::new();
    let sizer = Rc::new(
        BrowserTextSizer::new(Rc::new(transport)).with_timeout(Duration::from_millis(5)),
    );
    let mut tree = labelled_tree(&["ab"]);
    let outer = tree.label_keys().next().unwrap();
    tree.add_label(outer, Label::new("c").with_size(10.0, 20.0));
    sizer.set_inlet(Mark::with_value(tree, ["label.text"]));

    let mut sizes = Vec::new();
    for _ in 0..2 {
        let (result, batches) =
            tokio::join!(sizer.run(), measure_service(sizer.clone(), &mut rx, 1));
        result.unwrap();
        // Only the compound label's own text goes to the service, on every run.
        assert_eq!(batches, vec![1]);
        let out = sizer.outlet().value().unwrap();
        sizes.push((out.label(outer).width, out.label(outer).height));
        sizer.set_inlet(Mark::with_value((*out).clone(), ["label.text"]));
    }

    assert_eq!(sizes[0], (Some(14.0 + 10.0), Some(20.0)));
    assert_eq!(sizes[1], sizes[0]);
}

#[tokio::test]
async fn browser_sizer_skips_the_service_when_everything_is_sized() {
    let (transport, mut rx) = ChannelTransport::new();
    let sizer = BrowserTextSizer::new(Rc::new(transport));
    let mut tree = labelled_tree(&[]);
    let root = tree.root().unwrap();
    tree.add_label(root, Label::new("sized").with_size(3.0, 4.0));
    sizer.set_inlet(Mark::with_value(tree, ["layout"]));

    sizer.run().await.unwrap();
    assert!(rx.try_recv().is_err());
    assert!(sizer.outlet().value().is_some());
}

#[test]
fn browser_sizer_reads_its_config() {
    let mut config = FlowConfig::defaults();
    config.set_value("textSizer.maxSize", json!(8));
    let (transport, _rx) = ChannelTransport::new();
    let sizer = BrowserTextSizer::from_config(Rc::new(transport), &config);
    assert_eq!(sizer.max_size(), 8);
    assert_eq!(sizer.timeout(), Duration::from_millis(100));
}

#[test]
fn browser_sizer_ignores_other_events() {
    let (transport, _rx) = ChannelTransport::new();
    let sizer = BrowserTextSizer::new(Rc::new(transport));
    assert_eq!(sizer.handle_message(&json!({ "event": "hover" })).unwrap(), 0);
    assert!(sizer.handle_message(&json!({ "event": "measurement" })).is_err());
}

#[tokio::test]
async fn elkjs_applies_the_engine_layout() {
    let (transport, mut rx) = ChannelTransport::new();
    let elk = Rc::new(ElkJs::new(Rc::new(transport)));
    elk.set_inlet(Mark::with_value(sample_tree(), ["new"]));
    assert!(elk.check_dirty());

    let engine = {
        let elk = elk.clone();
        async move {
            let request = rx.recv().await.unwrap();
            assert!(request["payload"]["children"].is_array());
            assert!(elk.handle_message(&lay_out(&request)).unwrap());
        }
    };
    let (result, ()) = tokio::join!(elk.run(), engine);
    result.unwrap();

    let out = elk.outlet().value().unwrap();
    let root = out.root().unwrap();
    for child in out.children(root) {
        let node = out.node(*child);
        assert_eq!((node.x, node.y), (Some(0.0), Some(0.0)));
    }
    assert!(elk.pending().is_empty());
}

#[tokio::test]
async fn elkjs_rejects_malformed_layouts() {
    let (transport, mut rx) = ChannelTransport::new();
    let elk = Rc::new(ElkJs::new(Rc::new(transport)));
    elk.set_inlet(Mark::with_value(sample_tree(), ["new"]));

    let engine = {
        let elk = elk.clone();
        async move {
            let request = rx.recv().await.unwrap();
            let reply = json!({ "id": request["id"], "payload": { "children": "nope" } });
            elk.handle_message(&reply).unwrap();
        }
    };
    let (result, ()) = tokio::join!(elk.run(), engine);
    assert!(matches!(result, Err(Error::Core(_))));
}

#[test]
fn elkjs_replies_need_an_id() {
    let (transport, _rx) = ChannelTransport::new();
    let elk = ElkJs::new(Rc::new(transport));
    assert!(elk.handle_message(&json!({ "payload": {} })).is_err());
    assert!(!elk.handle_message(&json!({ "id": "late", "payload": {} })).unwrap());
}

#[tokio::test]
async fn rescheduling_cancels_the_run_in_flight() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let (transport, mut rx) = ChannelTransport::new();
            let elk = Rc::new(ElkJs::new(Rc::new(transport)));
            let pipeline = Rc::new(Pipeline::new(vec![elk.clone() as Rc<dyn Pipe>]));
            pipeline.set_inlet(Mark::with_value(sample_tree(), ["new"]));

            let first = pipeline.schedule_run();
            let stale = rx.recv().await.unwrap();
            let second = pipeline.schedule_run();
            assert!(matches!(first.await, Err(Error::Cancelled)));

            let current = rx.recv().await.unwrap();
            assert_ne!(stale["id"], current["id"]);
            assert_eq!(elk.pending().len(), 1);

            assert!(!elk.handle_message(&lay_out(&stale)).unwrap());
            assert!(elk.handle_message(&lay_out(&current)).unwrap());
            second.await.unwrap();

            assert!(pipeline.status().is_done());
            assert!(!pipeline.is_running());
        })
        .await;
}
