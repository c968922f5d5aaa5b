mod services;
mod stages;

use crate::pipe::{Pipe, PipeCore};
use crate::{Error, FlowPattern, Result};
use async_trait::async_trait;
use elkflow_core::{ElementTree, Label, Node};
use std::cell::Cell;

/// `root` holding `a -> b`, with a label on `a`.
fn sample_tree() -> ElementTree {
    let (mut tree, root) = ElementTree::with_root(Node::new().with_id("root"));
    let a = tree.create_child(root, Node::new().with_id("a").with_size(30.0, 20.0));
    let b = tree.create_child(root, Node::new().with_id("b").with_size(30.0, 20.0));
    let label = tree.add_label(a, Label::new("alpha"));
    tree.set_id(label, Some("a.label".to_string()));
    let edge = tree.add_edge(root, a, b, None);
    tree.set_id(edge, Some("e1".to_string()));
    tree
}

/// Counts its runs and copies inlet to outlet.
struct CountingPipe {
    core: PipeCore,
    runs: Cell<usize>,
    fail: bool,
}

impl CountingPipe {
    fn new(name: &str, observes: &[&str], reports: &[&str]) -> Self {
        Self {
            core: PipeCore::new(name)
                .with_observes(observes.iter().map(|p| FlowPattern::literal(p)))
                .with_reports(reports.iter().copied()),
            runs: Cell::new(0),
            fail: false,
        }
    }

    fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

#[async_trait(?Send)]
impl Pipe for CountingPipe {
    fn core(&self) -> &PipeCore {
        &self.core
    }

    async fn run(&self) -> Result<()> {
        self.runs.set(self.runs.get() + 1);
        if self.fail {
            return Err(Error::service("boom"));
        }
        self.core.pass_through();
        Ok(())
    }
}
