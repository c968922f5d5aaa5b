//! Label measurement pipes.

use crate::flows::{FlowPattern, LAYOUT, label};
use crate::pipe::{Pipe, PipeCore};
use crate::rpc::{PendingReplies, PendingReply, RpcClient, Transport};
use crate::text::{RuleOfThumbMeasurer, TextMeasurer, TextMetrics, TextStyle};
use crate::{Error, Result};
use async_trait::async_trait;
use elkflow_core::{ElementKey, ElementTree, FlowConfig, LabelKey, NodeKey};
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::{Value, json};
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::mpsc;

pub const LABEL_SPACING_OPTION: &str = "org.eclipse.elk.spacing.labelLabel";

fn sizer_core(name: &str) -> PipeCore {
    PipeCore::new(name)
        .with_observes([
            FlowPattern::literal(label::TEXT),
            FlowPattern::literal(label::SIZE_CSS),
            FlowPattern::literal(LAYOUT),
        ])
        .with_reports([label::SIZE])
}

/// Own text size of every compound label (one carrying sub-labels), before its sub-labels
/// are laid out beside it.
type OwnSizes = FxHashMap<LabelKey, (f64, f64)>;

fn label_keys(tree: &ElementTree, root: NodeKey) -> impl Iterator<Item = LabelKey> + '_ {
    tree.iter_elements(root).filter_map(|key| match key {
        ElementKey::Label(k) => Some(k),
        _ => None,
    })
}

/// Labels whose text needs measuring: those with a missing width or height, and every
/// compound label, whose stored size already includes its sub-labels.
fn labels_to_measure(tree: &ElementTree, root: NodeKey) -> Vec<LabelKey> {
    label_keys(tree, root)
        .filter(|k| {
            let label = tree.label(*k);
            let (width, height) = label.effective_size();
            !label.text.trim().is_empty()
                && (!tree.labels(*k).is_empty() || width.is_none() || height.is_none())
        })
        .collect()
}

fn apply_metrics(tree: &mut ElementTree, key: LabelKey, metrics: TextMetrics, own: &mut OwnSizes) {
    if !tree.labels(key).is_empty() {
        let (width, height) = tree.label(key).properties.shape_size();
        own.insert(
            key,
            (width.unwrap_or(metrics.width), height.unwrap_or(metrics.height)),
        );
        return;
    }
    let (width, height) = tree.label(key).effective_size();
    let label = tree.label_mut(key);
    if width.is_none() {
        label.width = Some(metrics.width);
    }
    if height.is_none() {
        label.height = Some(metrics.height);
    }
}

/// Grows every top-level compound label to fit its sub-labels side by side.
fn size_nested_labels(tree: &mut ElementTree, root: NodeKey, own: &OwnSizes) {
    let outer: Vec<LabelKey> = label_keys(tree, root)
        .filter(|k| {
            !tree.labels(*k).is_empty()
                && !matches!(tree.label_owner(*k), Some(ElementKey::Label(_)))
        })
        .collect();
    for key in outer {
        size_nested_label(tree, key, own);
    }
}

/// Width: own width plus each sub-label's width and `labelLabel` spacing. Height: the tallest.
fn size_nested_label(tree: &mut ElementTree, key: LabelKey, own: &OwnSizes) -> (f64, f64) {
    let subs = tree.labels(key).to_vec();
    if subs.is_empty() {
        let (width, height) = tree.label(key).effective_size();
        return (width.unwrap_or(0.0), height.unwrap_or(0.0));
    }
    let (mut width, mut height) = own.get(&key).copied().unwrap_or_else(|| {
        let (width, height) = tree.label(key).properties.shape_size();
        (width.unwrap_or(0.0), height.unwrap_or(0.0))
    });
    for sub in subs {
        let (sub_width, sub_height) = size_nested_label(tree, sub, own);
        let spacing = tree
            .label(sub)
            .layout_options
            .get(LABEL_SPACING_OPTION)
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(0.0);
        width += sub_width + spacing;
        height = height.max(sub_height);
    }
    let label = tree.label_mut(key);
    label.width = Some(width);
    label.height = Some(height);
    (width, height)
}

/// Measures labels locally with a [`TextMeasurer`] (rule of thumb by default).
pub struct TextSizer {
    core: PipeCore,
    measurer: Rc<dyn TextMeasurer>,
}

impl std::fmt::Debug for TextSizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextSizer")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl Default for TextSizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextSizer {
    pub fn new() -> Self {
        Self::with_measurer(Rc::new(RuleOfThumbMeasurer::default()))
    }

    pub fn with_measurer(measurer: Rc<dyn TextMeasurer>) -> Self {
        Self {
            core: sizer_core("text-sizer"),
            measurer,
        }
    }
}

#[async_trait(?Send)]
impl Pipe for TextSizer {
    fn core(&self) -> &PipeCore {
        &self.core
    }

    async fn run(&self) -> Result<()> {
        let Some(value) = self.inlet().value() else {
            self.core.pass_through();
            return Ok(());
        };
        let mut tree = (*value).clone();
        let root = tree.root()?;
        let mut own = OwnSizes::default();
        for key in labels_to_measure(&tree, root) {
            let label = tree.label(key);
            let style = TextStyle::with_classes(label.properties.css_classes.clone());
            let metrics = self.measurer.measure(&label.text, &style);
            apply_metrics(&mut tree, key, metrics, &mut own);
        }
        size_nested_labels(&mut tree, root, &own);
        self.outlet().set_value(Some(Rc::new(tree)));
        Ok(())
    }
}

/// One entry of a `{ "texts": [...] }` measurement request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextRequest {
    pub id: String,
    pub value: String,
    #[serde(rename = "cssClasses")]
    pub css_classes: String,
}

/// Measures labels through an external renderer.
///
/// Requests are queued and sent in batches of at most `max_size`; a batch closes early when
/// no further request arrives within `timeout`. Replies come back through
/// [`handle_message`](Self::handle_message) as
/// `{ "event": "measurement", "measurements": [{ "id", "width", "height" }] }`.
#[derive(Debug)]
pub struct BrowserTextSizer {
    core: PipeCore,
    client: RpcClient,
    timeout: Duration,
    max_size: usize,
}

impl BrowserTextSizer {
    pub fn new(transport: Rc<dyn Transport>) -> Self {
        Self::from_config(transport, &FlowConfig::defaults())
    }

    /// Reads `textSizer.timeoutMs` and `textSizer.maxSize`.
    pub fn from_config(transport: Rc<dyn Transport>, config: &FlowConfig) -> Self {
        Self {
            core: sizer_core("browser-text-sizer"),
            client: RpcClient::new(transport),
            timeout: Duration::from_millis(config.get_u64("textSizer.timeoutMs").unwrap_or(100)),
            max_size: config.get_u64("textSizer.maxSize").unwrap_or(100) as usize,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn pending(&self) -> &PendingReplies {
        self.client.pending()
    }

    /// Routes a measurement event to the waiting requests. Returns how many were resolved;
    /// other events are ignored.
    pub fn handle_message(&self, message: &Value) -> Result<usize> {
        if message.get("event").and_then(Value::as_str) != Some("measurement") {
            return Ok(0);
        }
        let measurements = message
            .get("measurements")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::service("measurement event without `measurements`"))?;
        let mut resolved = 0;
        for measurement in measurements {
            let Some(id) = measurement.get("id").and_then(Value::as_str) else {
                continue;
            };
            if self.client.pending().resolve(id, measurement.clone()) {
                resolved += 1;
            }
        }
        Ok(resolved)
    }

    async fn measure(&self, requests: Vec<TextRequest>) -> Result<Vec<TextMetrics>> {
        let replies: Vec<PendingReply> = requests
            .iter()
            .map(|r| self.client.pending().register(r.id.clone()))
            .collect();

        let max_size = self.max_size.max(1);
        let timeout = self.timeout;
        let (tx, mut rx) = mpsc::channel::<TextRequest>(max_size);
        let producer = async move {
            for request in requests {
                if tx.send(request).await.is_err() {
                    break;
                }
            }
        };
        let client = &self.client;
        let batcher = async move {
            while let Some(first) = rx.recv().await {
                let mut batch = vec![first];
                while batch.len() < max_size {
                    match tokio::time::timeout(timeout, rx.recv()).await {
                        Ok(Some(next)) => batch.push(next),
                        Ok(None) | Err(_) => break,
                    }
                }
                tracing::trace!(size = batch.len(), "sending text measurement batch");
                client.send(json!({ "texts": batch }))?;
            }
            Ok::<(), Error>(())
        };
        let sending = async move {
            let ((), sent) = futures::join!(producer, batcher);
            sent
        };

        let ((), replies) =
            futures::future::try_join(sending, futures::future::try_join_all(replies)).await?;
        replies
            .into_iter()
            .map(|reply| Ok(serde_json::from_value::<TextMetrics>(reply)?))
            .collect()
    }
}

#[async_trait(?Send)]
impl Pipe for BrowserTextSizer {
    fn core(&self) -> &PipeCore {
        &self.core
    }

    async fn run(&self) -> Result<()> {
        let Some(value) = self.inlet().value() else {
            self.core.pass_through();
            return Ok(());
        };
        let mut tree = (*value).clone();
        let root = tree.root()?;
        let keys = labels_to_measure(&tree, root);
        let requests: Vec<TextRequest> = keys
            .iter()
            .map(|key| {
                let label = tree.label(*key);
                TextRequest {
                    id: uuid::Uuid::new_v4().to_string(),
                    value: label.text.clone(),
                    css_classes: label.properties.css_classes.clone(),
                }
            })
            .collect();

        let mut own = OwnSizes::default();
        if !requests.is_empty() {
            let metrics = self.measure(requests).await?;
            for (key, metrics) in keys.into_iter().zip(metrics) {
                apply_metrics(&mut tree, key, metrics, &mut own);
            }
        }
        size_nested_labels(&mut tree, root, &own);
        self.outlet().set_value(Some(Rc::new(tree)));
        Ok(())
    }
}
