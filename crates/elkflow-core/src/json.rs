//! Layout JSON codec.
//!
//! The serialized form is the stable contract with layout engines and viewers: nodes nest
//! `children`, `ports`, `edges` and `labels`; edges address their endpoints by id in
//! `sources`/`targets`, where port ids follow the `"nodeId.portId"` convention.

use crate::model::{
    Edge, EdgeKey, ElementKey, ElementTree, Endpoint, Label, LayoutOptions, Node, NodeKey, Port,
    PortKey, Properties,
};
use crate::{Error, Result};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElkNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ElkNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ElkPort>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edges: Vec<ElkEdge>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<ElkLabel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "LayoutOptions::is_empty")]
    pub layout_options: LayoutOptions,
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub properties: Properties,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElkPort {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<ElkLabel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "LayoutOptions::is_empty")]
    pub layout_options: LayoutOptions,
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub properties: Properties,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElkLabel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<ElkLabel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "LayoutOptions::is_empty")]
    pub layout_options: LayoutOptions,
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub properties: Properties,
}

/// An edge in either the extended (`sources`/`targets`) or primitive
/// (`source`/`target` plus optional `sourcePort`/`targetPort`) form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElkEdge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_port: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_port: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<ElkLabel>,
    #[serde(default, skip_serializing_if = "LayoutOptions::is_empty")]
    pub layout_options: LayoutOptions,
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sections: Vec<Value>,
}

impl ElkEdge {
    /// Endpoint ids, preferring port ids over node ids.
    pub fn endpoint_ids(&self) -> Result<(String, String)> {
        let source = self
            .source_port
            .as_ref()
            .or(self.source.as_ref())
            .or(self.sources.first());
        let target = self
            .target_port
            .as_ref()
            .or(self.target.as_ref())
            .or(self.targets.first());
        let name = self.id.as_deref().unwrap_or("<anonymous>");
        match (source, target) {
            (Some(s), Some(t)) => Ok((s.clone(), t.clone())),
            (None, _) => Err(Error::invalid(format!("edge `{name}` has no source"))),
            (_, None) => Err(Error::invalid(format!("edge `{name}` has no target"))),
        }
    }
}

impl ElkNode {
    /// Removes every edge list in the subtree.
    pub fn strip_edges(&mut self) {
        self.edges.clear();
        for child in &mut self.children {
            child.strip_edges();
        }
    }
}

/// Categories left out when serializing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerializeOptions {
    /// Skip elements whose `properties.hidden` is set (and everything they contain).
    pub exclude_hidden: bool,
    /// Skip layout-computed fields: `x`/`y` and edge `sections`.
    pub exclude_layout: bool,
}

impl SerializeOptions {
    pub fn full() -> Self {
        Self::default()
    }

    pub fn visible_skeleton() -> Self {
        Self {
            exclude_hidden: true,
            exclude_layout: true,
        }
    }

    fn skips(&self, tree: &ElementTree, key: ElementKey) -> bool {
        self.exclude_hidden && tree.data(key).is_hidden()
    }

    fn position(&self, x: Option<f64>, y: Option<f64>) -> (Option<f64>, Option<f64>) {
        if self.exclude_layout { (None, None) } else { (x, y) }
    }
}

impl ElementTree {
    /// Serializes the subtree at `node`. Ids missing on elements are taken from the current
    /// [`Registry`](crate::Registry), so a context must be active unless every id is explicit.
    pub fn to_elk(&self, node: NodeKey, options: &SerializeOptions) -> Result<ElkNode> {
        let data = self.node(node);
        let (x, y) = options.position(data.x, data.y);
        let (width, height) = data.effective_size();

        let mut children = Vec::new();
        for child in self.children(node) {
            if !options.skips(self, (*child).into()) {
                children.push(self.to_elk(*child, options)?);
            }
        }
        let mut ports = Vec::new();
        for port in self.ports(node) {
            if !options.skips(self, (*port).into()) {
                ports.push(self.port_to_elk(*port, options)?);
            }
        }
        let mut edges = Vec::new();
        for edge in self.edges(node) {
            if !options.skips(self, (*edge).into()) {
                edges.push(self.edge_to_elk(*edge, options)?);
            }
        }

        Ok(ElkNode {
            id: Some(self.id_of(node)?),
            children,
            ports,
            edges,
            labels: self.labels_to_elk(node.into(), options)?,
            x,
            y,
            width,
            height,
            layout_options: data.layout_options.clone(),
            properties: data.properties.clone(),
        })
    }

    /// Serializes the subtree at `node` into a JSON value.
    pub fn to_value(&self, node: NodeKey, options: &SerializeOptions) -> Result<Value> {
        Ok(serde_json::to_value(self.to_elk(node, options)?)?)
    }

    fn port_to_elk(&self, port: PortKey, options: &SerializeOptions) -> Result<ElkPort> {
        let data = self.port(port);
        let (x, y) = options.position(data.x, data.y);
        let (width, height) = data.effective_size();
        Ok(ElkPort {
            id: Some(self.id_of(port)?),
            labels: self.labels_to_elk(port.into(), options)?,
            x,
            y,
            width,
            height,
            layout_options: data.layout_options.clone(),
            properties: data.properties.clone(),
        })
    }

    pub(crate) fn edge_to_elk(&self, edge: EdgeKey, options: &SerializeOptions) -> Result<ElkEdge> {
        let data = self.edge(edge);
        let (source, target) = self.edge_endpoints(edge);
        Ok(ElkEdge {
            id: Some(self.id_of(edge)?),
            sources: vec![self.id_of(source)?],
            targets: vec![self.id_of(target)?],
            labels: self.labels_to_elk(edge.into(), options)?,
            layout_options: data.layout_options.clone(),
            properties: data.properties.clone(),
            sections: if options.exclude_layout {
                Vec::new()
            } else {
                data.sections.clone()
            },
            ..ElkEdge::default()
        })
    }

    fn labels_to_elk(&self, owner: ElementKey, options: &SerializeOptions) -> Result<Vec<ElkLabel>> {
        let mut out = Vec::new();
        for label in self.labels(owner) {
            if options.skips(self, (*label).into()) {
                continue;
            }
            let data = self.label(*label);
            let (x, y) = options.position(data.x, data.y);
            let (width, height) = data.effective_size();
            out.push(ElkLabel {
                id: Some(self.id_of(*label)?),
                text: Some(data.text.clone()),
                labels: self.labels_to_elk((*label).into(), options)?,
                x,
                y,
                width,
                height,
                layout_options: data.layout_options.clone(),
                properties: data.properties.clone(),
            });
        }
        Ok(out)
    }

    /// Copies layout results (`x`/`y`/`width`/`height`, edge `sections`) from `laid_out` onto the
    /// elements of this tree with matching ids. Returns how many elements were updated.
    pub fn apply_layout(&mut self, root: NodeKey, laid_out: &ElkNode) -> Result<usize> {
        let mut by_id: FxHashMap<String, ElementKey> = FxHashMap::default();
        for key in self.iter_elements(root) {
            by_id.insert(self.id_of(key)?, key);
        }
        let mut updated = 0;
        apply_node_layout(self, &by_id, laid_out, &mut updated);
        Ok(updated)
    }
}

fn apply_node_layout(
    tree: &mut ElementTree,
    by_id: &FxHashMap<String, ElementKey>,
    data: &ElkNode,
    updated: &mut usize,
) {
    if let Some(ElementKey::Node(key)) = data.id.as_ref().and_then(|id| by_id.get(id)) {
        let node = tree.node_mut(*key);
        merge_geometry(
            (&mut node.x, &mut node.y, &mut node.width, &mut node.height),
            (data.x, data.y, data.width, data.height),
        );
        *updated += 1;
    }
    for port in &data.ports {
        if let Some(ElementKey::Port(key)) = port.id.as_ref().and_then(|id| by_id.get(id)) {
            let p = tree.port_mut(*key);
            merge_geometry(
                (&mut p.x, &mut p.y, &mut p.width, &mut p.height),
                (port.x, port.y, port.width, port.height),
            );
            *updated += 1;
        }
        apply_label_layout(tree, by_id, &port.labels, updated);
    }
    for edge in &data.edges {
        if let Some(ElementKey::Edge(key)) = edge.id.as_ref().and_then(|id| by_id.get(id)) {
            tree.edge_mut(*key).sections = edge.sections.clone();
            *updated += 1;
        }
        apply_label_layout(tree, by_id, &edge.labels, updated);
    }
    apply_label_layout(tree, by_id, &data.labels, updated);
    for child in &data.children {
        apply_node_layout(tree, by_id, child, updated);
    }
}

fn apply_label_layout(
    tree: &mut ElementTree,
    by_id: &FxHashMap<String, ElementKey>,
    labels: &[ElkLabel],
    updated: &mut usize,
) {
    for label in labels {
        if let Some(ElementKey::Label(key)) = label.id.as_ref().and_then(|id| by_id.get(id)) {
            let l = tree.label_mut(*key);
            merge_geometry(
                (&mut l.x, &mut l.y, &mut l.width, &mut l.height),
                (label.x, label.y, label.width, label.height),
            );
            *updated += 1;
        }
        apply_label_layout(tree, by_id, &label.labels, updated);
    }
}

type GeometryMut<'a> = (
    &'a mut Option<f64>,
    &'a mut Option<f64>,
    &'a mut Option<f64>,
    &'a mut Option<f64>,
);

fn merge_geometry(
    target: GeometryMut<'_>,
    source: (Option<f64>, Option<f64>, Option<f64>, Option<f64>),
) {
    let (x, y, w, h) = target;
    if source.0.is_some() {
        *x = source.0;
    }
    if source.1.is_some() {
        *y = source.1;
    }
    if source.2.is_some() {
        *w = source.2;
    }
    if source.3.is_some() {
        *h = source.3;
    }
}

/// Parses a full layout document into a new tree rooted at the document's top node.
pub fn from_elk(data: &ElkNode) -> Result<ElementTree> {
    let mut tree = ElementTree::new();
    let mut reader = ElkReader::default();
    let root = reader.read_node(&mut tree, data, None);
    tree.set_root(root);
    reader.link_edges(&mut tree)?;
    Ok(tree)
}

pub fn from_value(value: &Value) -> Result<ElementTree> {
    let data: ElkNode = serde_json::from_value(value.clone())?;
    from_elk(&data)
}

/// Two-pass reader: the node skeleton first, then edges once every endpoint id is known.
#[derive(Debug, Default)]
pub(crate) struct ElkReader<'a> {
    endpoints: FxHashMap<String, Endpoint>,
    pending: Vec<(NodeKey, &'a ElkEdge)>,
}

impl<'a> ElkReader<'a> {
    pub(crate) fn read_node(
        &mut self,
        tree: &mut ElementTree,
        data: &'a ElkNode,
        parent: Option<NodeKey>,
    ) -> NodeKey {
        let node = Node {
            id: data.id.clone(),
            x: data.x,
            y: data.y,
            width: data.width,
            height: data.height,
            layout_options: data.layout_options.clone(),
            properties: data.properties.clone(),
        };
        let key = match parent {
            Some(parent) => tree.create_child(parent, node),
            None => tree.new_node(node),
        };
        if let Some(id) = &data.id {
            self.endpoints.entry(id.clone()).or_insert(Endpoint::Node(key));
        }
        read_labels(tree, key.into(), &data.labels);

        for port in &data.ports {
            let port_key = tree.create_port(
                key,
                Port {
                    id: port.id.clone(),
                    x: port.x,
                    y: port.y,
                    width: port.width,
                    height: port.height,
                    layout_options: port.layout_options.clone(),
                    properties: port.properties.clone(),
                },
            );
            if let Some(id) = &port.id {
                self.endpoints
                    .entry(id.clone())
                    .or_insert(Endpoint::Port(port_key));
                let lookup = data
                    .id
                    .as_deref()
                    .and_then(|node_id| id.strip_prefix(node_id)?.strip_prefix('.'))
                    .unwrap_or(id.as_str());
                tree.set_port_key(port_key, Some(lookup.to_string()));
            }
            read_labels(tree, port_key.into(), &port.labels);
        }

        for child in &data.children {
            self.read_node(tree, child, Some(key));
        }
        for edge in &data.edges {
            self.pending.push((key, edge));
        }
        key
    }

    pub(crate) fn resolve(&self, id: &str) -> Option<Endpoint> {
        self.endpoints.get(id).copied()
    }

    /// A primitive `sourcePort`/`targetPort` may be written relative to its node, so an unknown
    /// bare port id is retried as `<node>.<port>`.
    fn resolve_end(&self, id: &str, node: Option<&str>, port: Option<&str>) -> Option<Endpoint> {
        self.resolve(id).or_else(|| {
            let (node, port) = (node?, port?);
            self.resolve(&format!("{node}.{port}"))
        })
    }

    pub(crate) fn link_edges(&mut self, tree: &mut ElementTree) -> Result<()> {
        for (owner, edge) in std::mem::take(&mut self.pending) {
            let (source_id, target_id) = edge.endpoint_ids()?;
            let source = self
                .resolve_end(&source_id, edge.source.as_deref(), edge.source_port.as_deref())
                .ok_or_else(|| Error::not_found(format!("edge source `{source_id}`")))?;
            let target = self
                .resolve_end(&target_id, edge.target.as_deref(), edge.target_port.as_deref())
                .ok_or_else(|| Error::not_found(format!("edge target `{target_id}`")))?;
            let key = tree.insert_edge(owner, edge_from_elk(edge), source, target);
            read_labels(tree, key.into(), &edge.labels);
        }
        Ok(())
    }
}

pub(crate) fn edge_from_elk(edge: &ElkEdge) -> Edge {
    Edge {
        id: edge.id.clone(),
        layout_options: edge.layout_options.clone(),
        properties: edge.properties.clone(),
        sections: edge.sections.clone(),
    }
}

pub(crate) fn read_labels(tree: &mut ElementTree, owner: ElementKey, labels: &[ElkLabel]) {
    for label in labels {
        let mut data = Label::new(label.text.clone().unwrap_or_else(|| " ".to_string()));
        data.id = label.id.clone();
        data.x = label.x;
        data.y = label.y;
        data.width = label.width;
        data.height = label.height;
        data.layout_options = label.layout_options.clone();
        data.properties = label.properties.clone();
        let key = tree.add_label(owner, data);
        read_labels(tree, key.into(), &label.labels);
    }
}
