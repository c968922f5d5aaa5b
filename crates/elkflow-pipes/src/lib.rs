#![forbid(unsafe_code)]

//! Async processing pipeline for elkflow diagrams.
//!
//! Pipes run on a single thread inside a [`tokio::task::LocalSet`]; marks are shared through
//! `Rc` and never cross threads. External services (layout engine, text measurement) are reached
//! through a [`Transport`] and answer out of band by request id.

pub mod elkjs;
pub mod error;
pub mod flows;
pub mod pipe;
pub mod pipeline;
pub mod rpc;
pub mod status;
pub mod text;
pub mod text_sizer;
pub mod valid;
pub mod visibility;

pub use elkjs::ElkJs;
pub use error::{Error, Result};
pub use flows::FlowPattern;
pub use pipe::{Pipe, PipeCore, RunHandle, RunSlot, StatusCallback};
pub use pipeline::{Pipeline, ProgressCallback};
pub use rpc::{ChannelTransport, PendingReplies, PendingReply, RpcClient, Transport};
pub use status::{PipeDisposition, PipeStatus, format_elapsed};
pub use text::{DeterministicTextMeasurer, RuleOfThumbMeasurer, TextMeasurer, TextMetrics, TextStyle};
pub use text_sizer::{BrowserTextSizer, TextRequest, TextSizer};
pub use valid::ValidationPipe;
pub use visibility::VisibilityPipe;

#[cfg(test)]
mod tests;
