//! Processing pipeline and diagram coordination.

mod diagram;

pub use diagram::Diagram;
pub use elkflow_pipes::{
    BrowserTextSizer, ChannelTransport, ElkJs, FlowPattern, PendingReplies, Pipe, PipeCore,
    PipeDisposition, PipeStatus, Pipeline, RunHandle, TextMeasurer, TextMetrics, TextSizer,
    TextStyle, Transport, ValidationPipe, VisibilityPipe, flows, format_elapsed,
};

use elkflow_core::FlowConfig;
use serde_json::Value;
use std::rc::Rc;

#[derive(Debug, thiserror::Error)]
pub enum DiagramError {
    #[error(transparent)]
    Core(#[from] elkflow_core::Error),
    #[error(transparent)]
    Pipes(#[from] elkflow_pipes::Error),
}

pub type Result<T> = std::result::Result<T, DiagramError>;

/// The standard chain: validation, text sizing, visibility projection, external layout.
///
/// Keeps handles on the service-backed stages so replies can be routed back to them.
#[derive(Debug, Clone)]
pub struct DefaultPipeline {
    pub pipeline: Rc<Pipeline>,
    pub validator: Rc<ValidationPipe>,
    pub visibility: Rc<VisibilityPipe>,
    pub layout: Rc<ElkJs>,
    /// Present when labels are measured by an external service.
    pub browser_sizer: Option<Rc<BrowserTextSizer>>,
}

impl DefaultPipeline {
    /// Routes a service message: measurement events go to the text sizer, everything else is
    /// treated as a layout reply. Returns whether a waiting request consumed it.
    pub fn handle_message(&self, message: &Value) -> Result<bool> {
        let is_measurement = message.get("event").and_then(Value::as_str) == Some("measurement");
        match &self.browser_sizer {
            Some(sizer) if is_measurement => Ok(sizer.handle_message(message)? > 0),
            _ => Ok(self.layout.handle_message(message)?),
        }
    }
}

/// Builds the standard chain from `config`.
///
/// Without a `text` transport labels are sized locally with the rule-of-thumb measurer.
pub fn default_pipeline(
    config: &FlowConfig,
    layout: Rc<dyn Transport>,
    text: Option<Rc<dyn Transport>>,
) -> DefaultPipeline {
    let validator = Rc::new(ValidationPipe::from_config(config));
    let visibility = Rc::new(VisibilityPipe::from_config(config));
    let layout = Rc::new(ElkJs::new(layout));
    let browser_sizer = text.map(|t| Rc::new(BrowserTextSizer::from_config(t, config)));

    let sizer: Rc<dyn Pipe> = match &browser_sizer {
        Some(sizer) => sizer.clone(),
        None => Rc::new(TextSizer::new()),
    };
    let pipes: Vec<Rc<dyn Pipe>> = vec![
        validator.clone(),
        sizer,
        visibility.clone(),
        layout.clone(),
    ];
    let pipeline = Rc::new(Pipeline::with_name("default", pipes));
    DefaultPipeline {
        pipeline,
        validator,
        visibility,
        layout,
        browser_sizer,
    }
}
