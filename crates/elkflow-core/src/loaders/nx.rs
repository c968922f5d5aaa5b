use super::{LayoutDefaults, Loader};
use crate::flow::LAYOUT;
use crate::index::lowest_common_ancestor;
use crate::json::{ElkEdge, ElkNode, ElkReader, edge_from_elk, read_labels};
use crate::model::{ElementTree, Endpoint, Label, Node, NodeKey, Port, PortKey};
use crate::{FlowConfig, Mark, Result};
use indexmap::IndexMap;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use rustc_hash::FxHashSet;
use serde_json::{Map, Value};

pub type AttrMap = Map<String, Value>;

/// A named graph vertex with layout-JSON style attributes (`width`, `labels`, `properties`, ...).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NxNode {
    pub name: String,
    pub attrs: AttrMap,
}

impl NxNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: AttrMap::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }
}

/// Connectivity: edge weights may carry `sourcePort`, `targetPort` or `port`.
pub type NxGraph = DiGraph<NxNode, AttrMap>;
/// Nesting: an edge `parent -> child`.
pub type NxHierarchy = DiGraph<NxNode, ()>;

/// Builds a tree from a connectivity graph plus a nesting graph.
#[derive(Debug, Clone, PartialEq)]
pub struct NxLoader {
    pub defaults: LayoutDefaults,
    pub port_size: f64,
}

impl Default for NxLoader {
    fn default() -> Self {
        Self::from_config(&FlowConfig::defaults())
    }
}

impl NxLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &FlowConfig) -> Self {
        Self {
            defaults: LayoutDefaults::from_config(config),
            port_size: config.get_f64("visibility.slackPortSize").unwrap_or(5.0),
        }
    }

    pub fn with_defaults(mut self, defaults: LayoutDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    fn port_for(&self, tree: &mut ElementTree, node: NodeKey, name: &str) -> PortKey {
        if let Ok(port) = tree.get_port(node, name) {
            return port;
        }
        if let Some(port) = tree
            .ports(node)
            .iter()
            .copied()
            .find(|p| tree.port(*p).id.as_deref() == Some(name))
        {
            return port;
        }
        let port = tree.create_port(node, Port::new().with_size(self.port_size, self.port_size));
        tree.set_port_key(port, Some(name.to_string()));
        port
    }
}

impl Loader<(&NxGraph, &NxHierarchy)> for NxLoader {
    fn load(&self, (graph, hierarchy): (&NxGraph, &NxHierarchy)) -> Result<Mark> {
        let mut tree = ElementTree::new();

        let mut attrs: IndexMap<String, AttrMap> = IndexMap::new();
        for node in hierarchy.node_weights().chain(graph.node_weights()) {
            attrs
                .entry(node.name.clone())
                .or_default()
                .extend(node.attrs.clone());
        }

        let mut keys: IndexMap<String, NodeKey> = IndexMap::new();
        for (name, attrs) in &attrs {
            let key = node_from_attrs(&mut tree, name, attrs)?;
            keys.insert(name.clone(), key);
        }

        let parents = sanitize_hierarchy(hierarchy);
        for (child, parent) in &parents {
            tree.add_child(keys[parent], keys[child], Some(child.as_str()))?;
        }

        let top: Vec<NodeKey> = keys
            .values()
            .copied()
            .filter(|k| tree.parent(*k).is_none())
            .collect();
        let root = match top.as_slice() {
            [single] => *single,
            _ => {
                let root = tree.new_node(Node::new());
                for (name, key) in &keys {
                    if tree.parent(*key).is_none() {
                        tree.add_child(root, *key, Some(name.as_str()))?;
                    }
                }
                root
            }
        };
        tree.set_root(root);

        for edge in graph.edge_references() {
            let source_node = keys[&graph[edge.source()].name];
            let target_node = keys[&graph[edge.target()].name];
            let data = edge.weight();
            let port_attr = |field: &str| {
                data.get(field)
                    .or_else(|| data.get("port"))
                    .and_then(Value::as_str)
            };
            let source = match port_attr("sourcePort") {
                Some(name) => Endpoint::Port(self.port_for(&mut tree, source_node, name)),
                None => Endpoint::Node(source_node),
            };
            let target = match port_attr("targetPort") {
                Some(name) => Endpoint::Port(self.port_for(&mut tree, target_node, name)),
                None => Endpoint::Node(target_node),
            };

            let elk: ElkEdge = serde_json::from_value(Value::Object(data.clone()))?;
            let owner = lowest_common_ancestor(&tree, source_node, target_node).unwrap_or(root);
            let key = tree.insert_edge(owner, edge_from_elk(&elk), source, target);
            read_labels(&mut tree, key.into(), &elk.labels);
        }

        self.defaults.apply(&mut tree, root);
        Ok(Mark::with_value(tree, [LAYOUT]))
    }
}

fn node_from_attrs(tree: &mut ElementTree, name: &str, attrs: &AttrMap) -> Result<NodeKey> {
    let mut value = attrs.clone();
    value.insert("id".to_string(), Value::String(name.to_string()));
    let mut data: ElkNode = serde_json::from_value(Value::Object(value))?;
    data.children.clear();
    data.edges.clear();

    let key = ElkReader::default().read_node(tree, &data, None);
    if tree.labels(key).is_empty() {
        tree.add_label(key, Label::new(name));
    }
    Ok(key)
}

/// Reduces the nesting graph to a forest as `child -> parent`.
///
/// Nodes on a cycle (self-loops included) and nodes claimed by more than one parent lose all
/// their incoming nesting edges and become top-level.
fn sanitize_hierarchy(hierarchy: &NxHierarchy) -> IndexMap<String, String> {
    let cyclic: FxHashSet<NodeIndex> = tarjan_scc(hierarchy)
        .into_iter()
        .filter(|scc| scc.len() > 1 || hierarchy.contains_edge(scc[0], scc[0]))
        .flatten()
        .collect();

    let mut claims: IndexMap<String, Vec<String>> = IndexMap::new();
    for edge in hierarchy.edge_references() {
        if cyclic.contains(&edge.target()) {
            continue;
        }
        let parent = &hierarchy[edge.source()].name;
        let entry = claims
            .entry(hierarchy[edge.target()].name.clone())
            .or_default();
        if !entry.contains(parent) {
            entry.push(parent.clone());
        }
    }
    if !cyclic.is_empty() {
        tracing::warn!(count = cyclic.len(), "hierarchy nodes on a cycle were made top-level");
    }

    claims
        .into_iter()
        .filter_map(|(child, mut parents)| match parents.len() {
            1 => parents.pop().map(|p| (child, p)),
            n => {
                tracing::warn!(node = %child, parents = n, "node has several parents, made top-level");
                None
            }
        })
        .collect()
}
