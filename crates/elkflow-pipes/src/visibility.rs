use crate::flows::{FlowPattern, LAYOUT};
use crate::pipe::{Pipe, PipeCore};
use crate::Result;
use async_trait::async_trait;
use elkflow_core::{FlowConfig, ProjectionOptions, project};
use std::rc::Rc;

/// Replaces the tree by its visible projection.
#[derive(Debug)]
pub struct VisibilityPipe {
    core: PipeCore,
    options: ProjectionOptions,
}

impl Default for VisibilityPipe {
    fn default() -> Self {
        Self::new(ProjectionOptions::default())
    }
}

impl VisibilityPipe {
    pub fn new(options: ProjectionOptions) -> Self {
        Self {
            core: PipeCore::new("visibility")
                .with_observes([FlowPattern::any_hidden(), FlowPattern::literal(LAYOUT)])
                .with_reports([LAYOUT]),
            options,
        }
    }

    pub fn from_config(config: &FlowConfig) -> Self {
        Self::new(ProjectionOptions::from_config(config))
    }

    pub fn options(&self) -> &ProjectionOptions {
        &self.options
    }
}

#[async_trait(?Send)]
impl Pipe for VisibilityPipe {
    fn core(&self) -> &PipeCore {
        &self.core
    }

    async fn run(&self) -> Result<()> {
        let inlet = self.inlet();
        let Some(value) = inlet.value() else {
            self.core.pass_through();
            return Ok(());
        };
        let projected = inlet.in_context(|| project(&value, &self.options))?;
        self.outlet().set_value(Some(Rc::new(projected)));
        Ok(())
    }
}
