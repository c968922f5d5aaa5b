use super::Result;
use elkflow_core::flow::NEW;
use elkflow_core::{ElementTree, Loader, Mark, SerializeOptions};
use elkflow_pipes::{Pipe, Pipeline};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;

/// Owns a source mark and the pipeline that turns it into a laid-out view.
///
/// A new source is tagged `new` so every stage runs once. After a successful refresh the laid-out
/// tree becomes the source with an empty flow, so the next refresh only re-runs stages whose
/// inputs were explicitly tagged in between. Hidden subtrees do not survive that hand-over.
#[derive(Debug)]
pub struct Diagram {
    source: RefCell<Mark>,
    pipeline: Rc<Pipeline>,
}

impl Diagram {
    pub fn new(pipeline: Rc<Pipeline>) -> Self {
        let diagram = Self {
            source: RefCell::new(Mark::new()),
            pipeline,
        };
        diagram.set_source(Mark::new());
        diagram
    }

    pub fn source(&self) -> Mark {
        self.source.borrow().clone()
    }

    /// Installs `mark` as the pipeline inlet and tags it `new`.
    pub fn set_source(&self, mark: Mark) {
        mark.set_flow([NEW]);
        self.pipeline.set_inlet(mark.clone());
        *self.source.borrow_mut() = mark;
    }

    /// Loads `input` and installs the result as the source.
    pub fn load<I, L: Loader<I>>(&self, loader: &L, input: I) -> Result<()> {
        self.set_source(loader.load(input)?);
        Ok(())
    }

    pub fn pipeline(&self) -> &Rc<Pipeline> {
        &self.pipeline
    }

    /// Runs the pipeline on the current `tokio::task::LocalSet`, superseding a
    /// refresh still in flight, and returns the laid-out tree.
    ///
    /// The projected result replaces the source, so subtrees hidden at this point are gone from
    /// it and clearing their `hidden` flag later cannot bring them back. Keep the unprojected
    /// tree yourself and [`set_source`](Self::set_source) it again to re-expand.
    pub async fn refresh(&self) -> Result<Option<Rc<ElementTree>>> {
        tracing::debug!(pipeline = self.pipeline.name(), "refreshing diagram");
        self.pipeline.schedule_run().await?;

        let layout = self.pipeline.outlet().value();
        let source = self.source();
        source.set_value(layout.clone());
        source.set_flow(Vec::<String>::new());
        Ok(layout)
    }

    /// The last laid-out tree.
    pub fn view(&self) -> Option<Rc<ElementTree>> {
        self.pipeline.outlet().value()
    }

    /// The last laid-out tree as layout JSON.
    pub fn to_value(&self) -> Result<Option<Value>> {
        let outlet = self.pipeline.outlet();
        let Some(tree) = outlet.value() else {
            return Ok(None);
        };
        let value = outlet.in_context(|| {
            let root = tree.root()?;
            tree.to_value(root, &SerializeOptions::full())
        })?;
        Ok(Some(value))
    }

    pub fn progress(&self) -> f64 {
        self.pipeline.progress()
    }
}
