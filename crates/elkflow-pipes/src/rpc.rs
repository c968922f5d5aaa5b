//! Request/reply plumbing for external services (layout engine, text measurement).
//!
//! A request registers a [`PendingReply`] under its id, then goes out through a [`Transport`].
//! Replies arrive out of band and are routed back by id with [`PendingReplies::resolve`].
//! Dropping a `PendingReply` (e.g. because its run was cancelled) unregisters it.

use crate::{Error, Result};
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};

/// Outbound side of a service connection.
pub trait Transport {
    fn send(&self, message: Value) -> Result<()>;
}

/// Forwards messages into an unbounded channel; the receiver plays the service.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<Value>,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Transport for ChannelTransport {
    fn send(&self, message: Value) -> Result<()> {
        self.tx
            .send(message)
            .map_err(|_| Error::service("transport closed"))
    }
}

/// Replies awaited by id. Clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct PendingReplies {
    waiting: Rc<RefCell<FxHashMap<String, oneshot::Sender<Value>>>>,
}

impl PendingReplies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `id`; a previous registration under the same id is rejected.
    pub fn register(&self, id: impl Into<String>) -> PendingReply {
        let id = id.into();
        let (tx, rx) = oneshot::channel();
        self.waiting.borrow_mut().insert(id.clone(), tx);
        tracing::trace!(id = %id, "awaiting reply");
        PendingReply {
            id,
            rx,
            pending: self.clone(),
        }
    }

    /// Delivers `payload` to the request registered under `id`. Returns `false` for unknown
    /// (late or cancelled) ids.
    pub fn resolve(&self, id: &str, payload: Value) -> bool {
        let Some(tx) = self.waiting.borrow_mut().remove(id) else {
            tracing::trace!(id = %id, "dropping reply without a pending request");
            return false;
        };
        tx.send(payload).is_ok()
    }

    /// Rejects every pending request.
    pub fn reject_all(&self) {
        self.waiting.borrow_mut().clear();
    }

    pub fn contains(&self, id: &str) -> bool {
        self.waiting.borrow().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.waiting.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn forget(&self, id: &str) {
        // Left for the next `resolve` when the table is borrowed.
        if let Ok(mut waiting) = self.waiting.try_borrow_mut() {
            if waiting.get(id).is_some_and(|tx| tx.is_closed()) {
                waiting.remove(id);
            }
        }
    }
}

/// A reply that has not arrived yet.
#[derive(Debug)]
pub struct PendingReply {
    id: String,
    rx: oneshot::Receiver<Value>,
    pending: PendingReplies,
}

impl PendingReply {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Future for PendingReply {
    type Output = Result<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(value)) => Poll::Ready(Ok(value)),
            Poll::Ready(Err(_)) => Poll::Ready(Err(Error::service(format!(
                "request `{}` was rejected",
                self.id
            )))),
        }
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        self.rx.close();
        self.pending.forget(&self.id);
    }
}

/// A transport plus the table its replies are routed through.
#[derive(Clone)]
pub struct RpcClient {
    pending: PendingReplies,
    transport: Rc<dyn Transport>,
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl RpcClient {
    pub fn new(transport: Rc<dyn Transport>) -> Self {
        Self {
            pending: PendingReplies::new(),
            transport,
        }
    }

    pub fn pending(&self) -> &PendingReplies {
        &self.pending
    }

    pub fn send(&self, message: Value) -> Result<()> {
        self.transport.send(message)
    }

    /// Registers `id`, sends `message` and waits for the reply routed back under `id`.
    pub async fn request(&self, id: impl Into<String>, message: Value) -> Result<Value> {
        let reply = self.pending.register(id);
        self.transport.send(message)?;
        reply.await
    }
}
