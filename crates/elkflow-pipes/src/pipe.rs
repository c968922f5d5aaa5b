//! The pipe contract and the state every pipe shares.

use crate::flows::FlowPattern;
use crate::status::PipeStatus;
use crate::{Error, Result};
use async_trait::async_trait;
use elkflow_core::{Flow, Mark};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};
use tokio::task::{AbortHandle, JoinHandle};

/// Called with the pipe name and its new status on every status change.
pub type StatusCallback = Rc<dyn Fn(&str, &PipeStatus)>;

/// Inlet/outlet marks, flow declarations and status of one pipe.
pub struct PipeCore {
    name: String,
    inlet: RefCell<Mark>,
    outlet: RefCell<Mark>,
    observes: RefCell<Vec<FlowPattern>>,
    reports: RefCell<Flow>,
    enabled: Cell<bool>,
    dirty: Cell<bool>,
    status: RefCell<PipeStatus>,
    on_status: RefCell<Option<StatusCallback>>,
}

impl fmt::Debug for PipeCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipeCore")
            .field("name", &self.name)
            .field("observes", &self.observes.borrow())
            .field("reports", &self.reports.borrow())
            .field("enabled", &self.enabled.get())
            .field("dirty", &self.dirty.get())
            .field("status", &self.status.borrow())
            .finish_non_exhaustive()
    }
}

impl PipeCore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inlet: RefCell::new(Mark::new()),
            outlet: RefCell::new(Mark::new()),
            observes: RefCell::new(Vec::new()),
            reports: RefCell::new(Flow::new()),
            enabled: Cell::new(true),
            dirty: Cell::new(true),
            status: RefCell::new(PipeStatus::default()),
            on_status: RefCell::new(None),
        }
    }

    pub fn with_observes(self, observes: impl IntoIterator<Item = FlowPattern>) -> Self {
        self.set_observes(observes);
        self
    }

    pub fn with_reports(self, reports: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.set_reports(reports);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inlet(&self) -> Mark {
        self.inlet.borrow().clone()
    }

    pub fn set_inlet(&self, mark: Mark) {
        *self.inlet.borrow_mut() = mark;
    }

    pub fn outlet(&self) -> Mark {
        self.outlet.borrow().clone()
    }

    pub fn set_outlet(&self, mark: Mark) {
        *self.outlet.borrow_mut() = mark;
    }

    pub fn observes(&self) -> Vec<FlowPattern> {
        self.observes.borrow().clone()
    }

    pub fn set_observes(&self, observes: impl IntoIterator<Item = FlowPattern>) {
        let mut out: Vec<FlowPattern> = Vec::new();
        for pattern in observes {
            if !out.contains(&pattern) {
                out.push(pattern);
            }
        }
        *self.observes.borrow_mut() = out;
    }

    pub fn reports(&self) -> Flow {
        self.reports.borrow().clone()
    }

    pub fn set_reports(&self, reports: impl IntoIterator<Item = impl Into<String>>) {
        *self.reports.borrow_mut() = reports.into_iter().map(Into::into).collect();
    }

    pub fn enabled(&self) -> bool {
        self.enabled.get()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    pub fn set_dirty(&self, dirty: bool) {
        self.dirty.set(dirty);
    }

    pub fn status(&self) -> PipeStatus {
        self.status.borrow().clone()
    }

    pub fn set_status(&self, status: PipeStatus) {
        *self.status.borrow_mut() = status.clone();
        let callback = self.on_status.borrow().clone();
        if let Some(callback) = callback {
            callback(&self.name, &status);
        }
    }

    pub fn on_status(&self, callback: impl Fn(&str, &PipeStatus) + 'static) {
        *self.on_status.borrow_mut() = Some(Rc::new(callback));
    }

    /// `true` when an observed pattern matches a tag on the inlet.
    ///
    /// A dirty pipe goes to `waiting` and its outlet flow becomes the inlet flow plus `reports`;
    /// a clean one is `done` and passes the inlet flow through.
    pub fn check_dirty(&self) -> bool {
        let flow = self.inlet().flow();
        let dirty = self.enabled()
            && flow
                .iter()
                .any(|tag| self.observes.borrow().iter().any(|p| p.matches(tag)));

        let mut out = flow;
        if dirty {
            out.extend(self.reports.borrow().iter().cloned());
            self.set_status(PipeStatus::waiting());
        } else {
            self.set_status(PipeStatus::done(None));
        }
        self.outlet().set_flow(out);
        self.dirty.set(dirty);
        dirty
    }

    /// Copies the inlet value to the outlet unchanged.
    pub fn pass_through(&self) {
        self.outlet().set_value(self.inlet().value());
    }
}

/// One processing stage: reads its inlet mark, writes its outlet mark.
#[async_trait(?Send)]
pub trait Pipe {
    fn core(&self) -> &PipeCore;

    async fn run(&self) -> Result<()>;

    fn name(&self) -> &str {
        self.core().name()
    }

    fn inlet(&self) -> Mark {
        self.core().inlet()
    }

    fn set_inlet(&self, mark: Mark) {
        self.core().set_inlet(mark);
    }

    fn outlet(&self) -> Mark {
        self.core().outlet()
    }

    fn check_dirty(&self) -> bool {
        self.core().check_dirty()
    }

    fn status(&self) -> PipeStatus {
        self.core().status()
    }

    fn progress(&self) -> f64 {
        self.status().step()
    }
}

/// Holds at most one scheduled run; scheduling again aborts the previous one.
#[derive(Debug, Default)]
pub struct RunSlot {
    task: RefCell<Option<AbortHandle>>,
}

impl RunSlot {
    /// Spawns `pipe.run()` on the current [`LocalSet`](tokio::task::LocalSet).
    pub fn schedule(&self, pipe: Rc<dyn Pipe>) -> RunHandle {
        self.cancel();
        let handle = tokio::task::spawn_local(async move { pipe.run().await });
        *self.task.borrow_mut() = Some(handle.abort_handle());
        RunHandle { handle }
    }

    pub fn cancel(&self) {
        if let Some(task) = self.task.borrow_mut().take() {
            if !task.is_finished() {
                tracing::debug!("cancelling scheduled run");
            }
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .borrow()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

/// Completion of a scheduled run. Resolves to [`Error::Cancelled`] when the run was superseded.
#[derive(Debug)]
pub struct RunHandle {
    handle: JoinHandle<Result<()>>,
}

impl RunHandle {
    pub fn abort(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Future for RunHandle {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.handle).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(err)) if err.is_cancelled() => Poll::Ready(Err(Error::Cancelled)),
            Poll::Ready(Err(err)) => Poll::Ready(Err(Error::service(format!("run panicked: {err}")))),
        }
    }
}
