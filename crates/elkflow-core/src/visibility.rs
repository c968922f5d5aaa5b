//! Visibility projection.
//!
//! Hidden subtrees are removed and every edge that crosses into one is rewritten to end at a
//! slack port on the nearest visible ancestor, so the projected diagram keeps the connectivity
//! of the full one.

use crate::index::lowest_common_ancestor;
use crate::json::{ElkReader, SerializeOptions};
use crate::model::{ElementKey, ElementTree, Endpoint, Label, LabelKey, NodeKey, Port};
use crate::registry::Registry;
use crate::validate::{RepairOptions, validate};
use crate::{Error, FlowConfig, Result};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;

pub const SLACK_EDGE_CLASS: &str = "slack-edge";
pub const SLACK_PORT_CLASS: &str = "slack-port";

/// Hidden elements of a tree: `hidden id -> (element, id of its deepest visible container)`.
#[derive(Debug, Clone, Default)]
pub struct VisIndex {
    hidden: IndexMap<String, (ElementKey, Option<String>)>,
}

impl VisIndex {
    /// Walks `root`; ids come from the current registry for elements without one.
    pub fn build(tree: &ElementTree, root: NodeKey) -> Result<Self> {
        let mut hidden = IndexMap::new();
        for entry in tree.iter_visible(root) {
            if !entry.hidden {
                continue;
            }
            let last_visible = match entry.last_visible {
                Some(key) => Some(tree.id_of(key)?),
                None => None,
            };
            hidden.insert(tree.id_of(entry.key)?, (entry.key, last_visible));
        }
        Ok(Self { hidden })
    }

    pub fn get(&self, id: &str) -> Option<(ElementKey, Option<&str>)> {
        self.hidden
            .get(id)
            .map(|(key, last)| (*key, last.as_deref()))
    }

    pub fn is_hidden(&self, id: &str) -> bool {
        self.hidden.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.hidden.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hidden.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionOptions {
    pub slack_port_size: f64,
}

impl Default for ProjectionOptions {
    fn default() -> Self {
        Self {
            slack_port_size: 5.0,
        }
    }
}

impl ProjectionOptions {
    pub fn from_config(config: &FlowConfig) -> Self {
        Self {
            slack_port_size: config
                .get_f64("visibility.slackPortSize")
                .unwrap_or(Self::default().slack_port_size),
        }
    }
}

/// Projects `tree` onto its visible elements.
///
/// Ids of the input come from the current registry. When nothing is hidden the input is
/// returned unchanged; otherwise the result is a new tree whose elements all carry explicit ids,
/// with one slack port per `(visible ancestor, hidden endpoint)` pair. Rewritten edges keep the
/// id of the edge they stand for.
pub fn project(tree: &ElementTree, options: &ProjectionOptions) -> Result<ElementTree> {
    let root = tree.root()?;
    let vis = VisIndex::build(tree, root)?;
    if vis.is_empty() {
        return Ok(tree.clone());
    }

    let mut skeleton = tree.to_elk(root, &SerializeOptions::visible_skeleton())?;
    skeleton.strip_edges();

    let mut projected = ElementTree::new();
    let mut reader = ElkReader::default();
    let new_root = reader.read_node(&mut projected, &skeleton, None);
    projected.set_root(new_root);

    let mut slack_ports: FxHashMap<(NodeKey, String), Endpoint> = FxHashMap::default();
    let mut rewritten = 0usize;

    for edge in tree.edge_keys() {
        let Some(owner) = tree.edge_owner(edge) else {
            continue;
        };
        if !tree.is_ancestor(root, owner) || tree.edge(edge).properties.is_hidden() {
            continue;
        }
        let (source, target) = tree.edge_endpoints(edge);
        let source = resolve(tree, &vis, &reader, &projected, source)?;
        let target = resolve(tree, &vis, &reader, &projected, target)?;
        let crosses_hidden = source.hidden_id.is_some() || target.hidden_id.is_some();
        if crosses_hidden && source.node == target.node {
            continue;
        }

        let source = source.endpoint(&mut projected, &mut slack_ports, options);
        let target = target.endpoint(&mut projected, &mut slack_ports, options);

        let mut data = tree.edge(edge).clone();
        data.id = Some(tree.id_of(edge)?);
        data.sections.clear();
        if crosses_hidden {
            data.properties.add_class(SLACK_EDGE_CLASS);
            rewritten += 1;
        }
        let (sn, tn) = (
            projected.endpoint_node(source).unwrap_or(new_root),
            projected.endpoint_node(target).unwrap_or(new_root),
        );
        let owner = lowest_common_ancestor(&projected, sn, tn).unwrap_or(new_root);
        let new_edge = projected.insert_edge(owner, data, source, target);
        copy_labels(tree, edge.into(), &mut projected, new_edge.into())?;
    }

    tracing::debug!(
        hidden = vis.len(),
        slack_ports = slack_ports.len(),
        slack_edges = rewritten,
        "projected visible subgraph"
    );

    Registry::new().scope(|| validate(&mut projected, &RepairOptions::default()))?;
    Ok(projected)
}

struct Resolved {
    node: NodeKey,
    endpoint: Option<Endpoint>,
    hidden_id: Option<String>,
}

impl Resolved {
    fn endpoint(
        self,
        tree: &mut ElementTree,
        slack_ports: &mut FxHashMap<(NodeKey, String), Endpoint>,
        options: &ProjectionOptions,
    ) -> Endpoint {
        let Some(hidden_id) = self.hidden_id else {
            return self.endpoint.unwrap_or(Endpoint::Node(self.node));
        };
        let node = self.node;
        *slack_ports
            .entry((node, hidden_id.clone()))
            .or_insert_with(|| {
                let node_id = tree.node(node).id.clone().unwrap_or_default();
                let port = Port::new()
                    .with_id(format!("{node_id}.{hidden_id}"))
                    .with_size(options.slack_port_size, options.slack_port_size)
                    .with_class(SLACK_PORT_CLASS);
                let key = tree.create_port(node, port);
                tree.set_port_key(key, Some(hidden_id));
                Endpoint::Port(key)
            })
    }
}

fn resolve(
    tree: &ElementTree,
    vis: &VisIndex,
    reader: &ElkReader<'_>,
    projected: &ElementTree,
    endpoint: Endpoint,
) -> Result<Resolved> {
    let id = tree.id_of(endpoint)?;
    if let Some(found) = reader.resolve(&id) {
        let node = projected
            .endpoint_node(found)
            .ok_or_else(|| Error::not_found(format!("node of `{id}`")))?;
        return Ok(Resolved {
            node,
            endpoint: Some(found),
            hidden_id: None,
        });
    }
    let (_, last_visible) = vis
        .get(&id)
        .ok_or_else(|| Error::not_found(format!("edge endpoint `{id}` in the visible tree")))?;
    let last_visible = last_visible
        .ok_or_else(|| Error::not_found(format!("visible ancestor of `{id}`")))?;
    let node = match reader.resolve(last_visible) {
        Some(Endpoint::Node(node)) => node,
        Some(Endpoint::Port(port)) => projected
            .port_parent(port)
            .ok_or_else(|| Error::not_found(format!("node of `{last_visible}`")))?,
        None => return Err(Error::not_found(format!("visible node `{last_visible}`"))),
    };
    Ok(Resolved {
        node,
        endpoint: None,
        hidden_id: Some(id),
    })
}

fn copy_labels(
    from: &ElementTree,
    owner: ElementKey,
    to: &mut ElementTree,
    new_owner: ElementKey,
) -> Result<()> {
    let labels: Vec<LabelKey> = from.labels(owner).to_vec();
    for label in labels {
        if from.label(label).properties.is_hidden() {
            continue;
        }
        let mut data: Label = from.label(label).clone();
        data.id = Some(from.id_of(label)?);
        data.x = None;
        data.y = None;
        let key = to.add_label(new_owner, data);
        copy_labels(from, label.into(), to, key.into())?;
    }
    Ok(())
}
