use crate::flows::{FlowPattern, LAYOUT};
use crate::pipe::{Pipe, PipeCore};
use crate::Result;
use async_trait::async_trait;
use elkflow_core::{FlowConfig, RepairOptions, ValidationReport, validate};
use std::cell::RefCell;
use std::rc::Rc;

/// Checks ids and edge ownership, repairing what its [`RepairOptions`] allow.
#[derive(Debug)]
pub struct ValidationPipe {
    core: PipeCore,
    options: RepairOptions,
    report: RefCell<Option<ValidationReport>>,
}

impl Default for ValidationPipe {
    fn default() -> Self {
        Self::new(RepairOptions::default())
    }
}

impl ValidationPipe {
    pub fn new(options: RepairOptions) -> Self {
        Self {
            core: PipeCore::new("validator")
                .with_observes([FlowPattern::anything_layout()])
                .with_reports([LAYOUT]),
            options,
            report: RefCell::new(None),
        }
    }

    /// Reads the `validation.*` switches.
    pub fn from_config(config: &FlowConfig) -> Self {
        Self::new(RepairOptions::from_config(config))
    }

    pub fn options(&self) -> &RepairOptions {
        &self.options
    }

    /// The report of the last successful run.
    pub fn report(&self) -> Option<ValidationReport> {
        self.report.borrow().clone()
    }
}

#[async_trait(?Send)]
impl Pipe for ValidationPipe {
    fn core(&self) -> &PipeCore {
        &self.core
    }

    async fn run(&self) -> Result<()> {
        let inlet = self.inlet();
        let Some(value) = inlet.value() else {
            self.outlet().set_value(None);
            return Ok(());
        };
        let mut tree = (*value).clone();
        let report = inlet.in_context(|| validate(&mut tree, &self.options))?;
        if report.repaired() {
            tracing::debug!(
                ids = report.fixed_ids,
                orphans = report.fixed_orphans,
                edges = report.fixed_edges,
                "repaired diagram"
            );
        }
        *self.report.borrow_mut() = Some(report);
        self.outlet().set_value(Some(Rc::new(tree)));
        Ok(())
    }
}
