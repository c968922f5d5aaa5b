use crate::flows::FlowPattern;
use crate::pipe::{Pipe, PipeCore, RunHandle, RunSlot};
use crate::status::PipeStatus;
use crate::{Error, Result};
use async_trait::async_trait;
use elkflow_core::{Flow, Mark};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

pub type ProgressCallback = Rc<dyn Fn(f64)>;

/// A pipe made of a linear chain of pipes.
///
/// `pipes[i].outlet` is `pipes[i + 1].inlet`; the pipeline's outlet is the last pipe's outlet
/// and every mark in the chain shares the inlet's registry.
pub struct Pipeline {
    core: PipeCore,
    pipes: RefCell<Vec<Rc<dyn Pipe>>>,
    slot: RunSlot,
    on_progress: RefCell<Option<ProgressCallback>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.pipes().iter().map(|p| p.name().to_string()).collect();
        f.debug_struct("Pipeline")
            .field("core", &self.core)
            .field("pipes", &names)
            .finish_non_exhaustive()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Pipeline {
    pub fn new(pipes: Vec<Rc<dyn Pipe>>) -> Self {
        Self::with_name("pipeline", pipes)
    }

    pub fn with_name(name: impl Into<String>, pipes: Vec<Rc<dyn Pipe>>) -> Self {
        let this = Self {
            core: PipeCore::new(name),
            pipes: RefCell::new(pipes),
            slot: RunSlot::default(),
            on_progress: RefCell::new(None),
        };
        this.rewire();
        this
    }

    pub fn pipes(&self) -> Vec<Rc<dyn Pipe>> {
        self.pipes.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.pipes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipes.borrow().is_empty()
    }

    /// Replaces the chain and re-wires it to the current inlet.
    pub fn set_pipes(&self, pipes: Vec<Rc<dyn Pipe>>) {
        *self.pipes.borrow_mut() = pipes;
        self.rewire();
    }

    pub fn push(&self, pipe: Rc<dyn Pipe>) {
        self.pipes.borrow_mut().push(pipe);
        self.rewire();
    }

    fn rewire(&self) {
        let mut prev = self.core.inlet();
        for pipe in self.pipes() {
            pipe.set_inlet(prev.clone());
            let outlet = pipe.outlet();
            if !outlet.ptr_eq(&prev) {
                outlet.set_registry(prev.registry());
            }
            prev = outlet;
        }
        self.core.set_outlet(prev);
    }

    /// Verifies the chain is connected inlet to outlet.
    pub fn check(&self) -> Result<()> {
        let mut broken = Vec::new();
        let mut prev = self.core.inlet();
        let pipes = self.pipes();
        for (i, pipe) in pipes.iter().enumerate() {
            if !prev.ptr_eq(&pipe.inlet()) {
                broken.push((i.saturating_sub(1), i));
            }
            prev = pipe.outlet();
        }
        if !prev.ptr_eq(&self.core.outlet()) {
            broken.push((pipes.len().saturating_sub(1), pipes.len()));
        }
        if broken.is_empty() {
            Ok(())
        } else {
            Err(Error::BrokenPipe { broken })
        }
    }

    /// Mean progress of the sub-pipes.
    pub fn progress(&self) -> f64 {
        let pipes = self.pipes();
        if pipes.is_empty() {
            return self.core.status().step();
        }
        pipes.iter().map(|p| p.progress()).sum::<f64>() / pipes.len() as f64
    }

    pub fn on_progress(&self, callback: impl Fn(f64) + 'static) {
        *self.on_progress.borrow_mut() = Some(Rc::new(callback));
    }

    fn notify_progress(&self) {
        let callback = self.on_progress.borrow().clone();
        if let Some(callback) = callback {
            callback(self.progress());
        }
    }

    /// Spawns a run on the current `LocalSet`, aborting any run still in flight.
    pub fn schedule_run(self: &Rc<Self>) -> RunHandle {
        self.slot.schedule(self.clone())
    }

    pub fn cancel(&self) {
        self.slot.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.slot.is_running()
    }

    pub fn set_status(&self, status: PipeStatus) {
        self.core.set_status(status);
        self.notify_progress();
    }
}

#[async_trait(?Send)]
impl Pipe for Pipeline {
    fn core(&self) -> &PipeCore {
        &self.core
    }

    fn set_inlet(&self, mark: Mark) {
        self.core.set_inlet(mark);
        self.rewire();
    }

    /// Dirty when any sub-pipe is; observes and reports become the union over dirty sub-pipes.
    fn check_dirty(&self) -> bool {
        let mut dirty = false;
        let mut observes: Vec<FlowPattern> = Vec::new();
        let mut reports = Flow::new();
        for pipe in self.pipes() {
            if pipe.check_dirty() {
                dirty = true;
                observes.extend(pipe.core().observes());
                reports.extend(pipe.core().reports());
            }
        }
        self.core.set_dirty(dirty);
        self.core.set_observes(observes);
        self.core.set_reports(reports);
        self.set_status(if dirty {
            PipeStatus::waiting()
        } else {
            PipeStatus::done(None)
        });
        dirty
    }

    fn progress(&self) -> f64 {
        Pipeline::progress(self)
    }

    async fn run(&self) -> Result<()> {
        let start = Instant::now();
        let pipes = self.pipes();
        for pipe in &pipes {
            pipe.core().set_status(PipeStatus::default());
        }
        self.core.set_status(PipeStatus::default());
        self.check_dirty();

        for (i, pipe) in pipes.iter().enumerate() {
            let started = Instant::now();
            if pipe.core().is_dirty() {
                pipe.core().set_status(PipeStatus::running());
                self.set_status(PipeStatus::running());
                tracing::debug!(pipe = pipe.name(), index = i, "running pipe");

                if let Err(err) = pipe.run().await {
                    let elapsed = started.elapsed();
                    tracing::error!(pipe = pipe.name(), index = i, error = %err, "pipe failed");
                    pipe.core()
                        .set_status(PipeStatus::error(err.to_string(), elapsed));
                    self.set_status(PipeStatus::error(err.to_string(), start.elapsed()));
                    return Err(Error::PipeFailure {
                        pipe: pipe.name().to_string(),
                        source: Box::new(err),
                    });
                }
                pipe.core().set_dirty(false);
            } else {
                pipe.core().pass_through();
            }
            let elapsed = started.elapsed();
            tracing::debug!(
                pipe = pipe.name(),
                elapsed_ms = elapsed.as_secs_f64() * 1_000.0,
                "pipe done"
            );
            pipe.core().set_status(PipeStatus::done(Some(elapsed)));
            self.notify_progress();
        }

        self.core.set_dirty(false);
        self.set_status(PipeStatus::done(Some(start.elapsed())));
        Ok(())
    }
}
