use crate::flows::{FlowPattern, LAYOUT};
use crate::pipe::{Pipe, PipeCore};
use crate::rpc::{PendingReplies, RpcClient, Transport};
use crate::{Error, Result};
use async_trait::async_trait;
use elkflow_core::{ElkNode, SerializeOptions, schema};
use serde_json::{Value, json};
use std::rc::Rc;

/// Sends the tree to an external layout engine and copies the laid-out geometry back.
///
/// Requests go out as `{ "id", "payload" }`; the engine answers with the same `id` and the
/// laid-out layout JSON as `payload`, delivered through [`handle_message`](Self::handle_message).
#[derive(Debug)]
pub struct ElkJs {
    core: PipeCore,
    client: RpcClient,
}

impl ElkJs {
    pub fn new(transport: Rc<dyn Transport>) -> Self {
        Self {
            core: PipeCore::new("elkjs")
                .with_observes([FlowPattern::anything_layout()])
                .with_reports([LAYOUT]),
            client: RpcClient::new(transport),
        }
    }

    pub fn pending(&self) -> &PendingReplies {
        self.client.pending()
    }

    /// Routes a reply to its request. Returns `false` when no request is waiting for it.
    pub fn handle_message(&self, message: &Value) -> Result<bool> {
        let id = message
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::service("layout reply without an `id`"))?;
        let payload = message.get("payload").cloned().unwrap_or(Value::Null);
        Ok(self.client.pending().resolve(id, payload))
    }
}

#[async_trait(?Send)]
impl Pipe for ElkJs {
    fn core(&self) -> &PipeCore {
        &self.core
    }

    async fn run(&self) -> Result<()> {
        let inlet = self.inlet();
        let Some(value) = inlet.value() else {
            self.core.pass_through();
            return Ok(());
        };
        let payload = inlet.in_context(|| {
            let root = value.root()?;
            value.to_value(root, &SerializeOptions::full())
        })?;

        let id = uuid::Uuid::new_v4().to_string();
        let reply = self
            .client
            .request(id.clone(), json!({ "id": id, "payload": payload }))
            .await?;
        schema::validate(&reply)?;
        let laid_out: ElkNode = serde_json::from_value(reply)?;

        let mut tree = (*value).clone();
        let updated = inlet.in_context(|| {
            let root = tree.root()?;
            tree.apply_layout(root, &laid_out)
        })?;
        tracing::debug!(updated, "applied layout");
        self.outlet().set_value(Some(Rc::new(tree)));
        Ok(())
    }
}
