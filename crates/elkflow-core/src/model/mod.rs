//! Arena-backed element tree.
//!
//! Nodes own their children, ports, edges and labels through key lists; back-references
//! (`parent`, edge `owner`, label `owner`) are plain keys into the same arena. Elements are
//! never freed: detaching an element only clears its links, mirroring how user code may keep a
//! handle to an element after removing it from its parent.

mod element;
mod iter;

pub use element::{Edge, ElementData, Label, LayoutOptions, Node, Port, Properties, Shape};
pub use iter::VisibleEntry;

use crate::registry::Registry;
use crate::{Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TREE_UID: AtomicU64 = AtomicU64::new(1);

macro_rules! arena_key {
    ($name:ident, $label:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            fn new(index: usize) -> Self {
                Self(index as u32)
            }

            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{} #{}", $label, self.0)
            }
        }
    };
}

arena_key!(NodeKey, "node");
arena_key!(PortKey, "port");
arena_key!(EdgeKey, "edge");
arena_key!(LabelKey, "label");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementKey {
    Node(NodeKey),
    Port(PortKey),
    Edge(EdgeKey),
    Label(LabelKey),
}

impl From<NodeKey> for ElementKey {
    fn from(k: NodeKey) -> Self {
        Self::Node(k)
    }
}

impl From<PortKey> for ElementKey {
    fn from(k: PortKey) -> Self {
        Self::Port(k)
    }
}

impl From<EdgeKey> for ElementKey {
    fn from(k: EdgeKey) -> Self {
        Self::Edge(k)
    }
}

impl From<LabelKey> for ElementKey {
    fn from(k: LabelKey) -> Self {
        Self::Label(k)
    }
}

impl From<Endpoint> for ElementKey {
    fn from(e: Endpoint) -> Self {
        match e {
            Endpoint::Node(k) => Self::Node(k),
            Endpoint::Port(k) => Self::Port(k),
        }
    }
}

impl std::fmt::Display for ElementKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Node(k) => k.fmt(f),
            Self::Port(k) => k.fmt(f),
            Self::Edge(k) => k.fmt(f),
            Self::Label(k) => k.fmt(f),
        }
    }
}

impl ElementKey {
    pub fn as_endpoint(self) -> Option<Endpoint> {
        match self {
            Self::Node(k) => Some(Endpoint::Node(k)),
            Self::Port(k) => Some(Endpoint::Port(k)),
            _ => None,
        }
    }
}

/// A hierarchical element: the kinds that may terminate an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Endpoint {
    Node(NodeKey),
    Port(PortKey),
}

impl From<NodeKey> for Endpoint {
    fn from(k: NodeKey) -> Self {
        Self::Node(k)
    }
}

impl From<PortKey> for Endpoint {
    fn from(k: PortKey) -> Self {
        Self::Port(k)
    }
}

#[derive(Debug, Clone)]
struct NodeSlot {
    data: Node,
    parent: Option<NodeKey>,
    key: Option<String>,
    children: Vec<NodeKey>,
    ports: Vec<PortKey>,
    edges: Vec<EdgeKey>,
    labels: Vec<LabelKey>,
}

#[derive(Debug, Clone)]
struct PortSlot {
    data: Port,
    parent: Option<NodeKey>,
    key: Option<String>,
    labels: Vec<LabelKey>,
}

#[derive(Debug, Clone)]
struct EdgeSlot {
    data: Edge,
    source: Endpoint,
    target: Endpoint,
    owner: Option<NodeKey>,
    labels: Vec<LabelKey>,
}

#[derive(Debug, Clone)]
struct LabelSlot {
    data: Label,
    owner: Option<ElementKey>,
    labels: Vec<LabelKey>,
}

/// A hierarchical diagram: one arena per element kind plus an optional explicit root.
///
/// Cloning keeps the tree's identity (`uid`), so ids assigned by a [`Registry`] stay stable for
/// copy-on-write snapshots of the same tree.
#[derive(Debug, Clone)]
pub struct ElementTree {
    uid: u64,
    root: Option<NodeKey>,
    nodes: Vec<NodeSlot>,
    ports: Vec<PortSlot>,
    edges: Vec<EdgeSlot>,
    labels: Vec<LabelSlot>,
}

impl Default for ElementTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementTree {
    pub fn new() -> Self {
        Self {
            uid: NEXT_TREE_UID.fetch_add(1, Ordering::Relaxed),
            root: None,
            nodes: Vec::new(),
            ports: Vec::new(),
            edges: Vec::new(),
            labels: Vec::new(),
        }
    }

    /// Creates a tree whose root is `root`.
    pub fn with_root(root: Node) -> (Self, NodeKey) {
        let mut tree = Self::new();
        let key = tree.new_node(root);
        tree.root = Some(key);
        (tree, key)
    }

    pub fn uid(&self) -> u64 {
        self.uid
    }

    pub fn set_root(&mut self, root: NodeKey) {
        self.root = Some(root);
    }

    /// The explicit root, or else the single node without a parent.
    pub fn root(&self) -> Result<NodeKey> {
        if let Some(root) = self.root {
            return Ok(root);
        }
        let top: Vec<NodeKey> = self.node_keys().filter(|k| self.parent(*k).is_none()).collect();
        match top.len() {
            1 => Ok(top[0]),
            0 => Err(Error::not_found("root node")),
            count => Err(Error::NotUnique {
                what: "root node".to_string(),
                count,
            }),
        }
    }

    // Construction

    /// Adds a detached node to the arena.
    pub fn new_node(&mut self, node: Node) -> NodeKey {
        let key = NodeKey::new(self.nodes.len());
        self.nodes.push(NodeSlot {
            data: node,
            parent: None,
            key: None,
            children: Vec::new(),
            ports: Vec::new(),
            edges: Vec::new(),
            labels: Vec::new(),
        });
        key
    }

    /// Adds a detached port to the arena.
    pub fn new_port(&mut self, port: Port) -> PortKey {
        let key = PortKey::new(self.ports.len());
        self.ports.push(PortSlot {
            data: port,
            parent: None,
            key: None,
            labels: Vec::new(),
        });
        key
    }

    /// Creates `node` and appends it to `parent`'s children.
    pub fn create_child(&mut self, parent: NodeKey, node: Node) -> NodeKey {
        let child = self.new_node(node);
        self.nodes[child.index()].parent = Some(parent);
        self.nodes[parent.index()].children.push(child);
        child
    }

    /// Creates `port` and attaches it to `parent`.
    pub fn create_port(&mut self, parent: NodeKey, port: Port) -> PortKey {
        let key = self.new_port(port);
        self.ports[key.index()].parent = Some(parent);
        self.nodes[parent.index()].ports.push(key);
        key
    }

    /// Re-parents `child` under `parent`, optionally recording a lookup key.
    ///
    /// Adding a child to the parent it already has only updates the key.
    pub fn add_child(
        &mut self,
        parent: NodeKey,
        child: NodeKey,
        key: Option<&str>,
    ) -> Result<NodeKey> {
        match self.nodes[child.index()].parent {
            Some(p) if p == parent => {}
            Some(_) => {
                return Err(Error::AlreadyParented {
                    element: self.describe(child),
                });
            }
            None => {
                if self.is_ancestor(child, parent) {
                    return Err(Error::HierarchyCycle {
                        parent: self.describe(parent),
                        child: self.describe(child),
                    });
                }
                self.nodes[child.index()].parent = Some(parent);
                self.nodes[parent.index()].children.push(child);
                if self.root == Some(child) {
                    self.root = None;
                }
            }
        }
        if let Some(key) = key {
            self.nodes[child.index()].key = Some(key.to_string());
        }
        Ok(child)
    }

    pub fn add_port(&mut self, parent: NodeKey, port: PortKey, key: Option<&str>) -> Result<PortKey> {
        match self.ports[port.index()].parent {
            Some(p) if p == parent => {}
            Some(_) => {
                return Err(Error::AlreadyParented {
                    element: self.describe(port),
                });
            }
            None => {
                self.ports[port.index()].parent = Some(parent);
                self.nodes[parent.index()].ports.push(port);
            }
        }
        if let Some(key) = key {
            self.ports[port.index()].key = Some(key.to_string());
        }
        Ok(port)
    }

    pub fn set_child_key(&mut self, child: NodeKey, key: Option<String>) {
        self.nodes[child.index()].key = key;
    }

    pub fn set_port_key(&mut self, port: PortKey, key: Option<String>) {
        self.ports[port.index()].key = key;
    }

    pub fn get_child(&self, parent: NodeKey, key: &str) -> Result<NodeKey> {
        let matches: Vec<NodeKey> = self.nodes[parent.index()]
            .children
            .iter()
            .copied()
            .filter(|c| self.nodes[c.index()].key.as_deref() == Some(key))
            .collect();
        single(matches, || format!("child `{key}` of {}", self.describe(parent)))
    }

    pub fn get_port(&self, parent: NodeKey, key: &str) -> Result<PortKey> {
        let matches: Vec<PortKey> = self.nodes[parent.index()]
            .ports
            .iter()
            .copied()
            .filter(|p| self.ports[p.index()].key.as_deref() == Some(key))
            .collect();
        single(matches, || format!("port `{key}` of {}", self.describe(parent)))
    }

    /// Detaches `child` from `parent` and clears its parent link.
    pub fn remove_child(&mut self, parent: NodeKey, child: NodeKey) -> Result<()> {
        let children = &mut self.nodes[parent.index()].children;
        let Some(pos) = children.iter().position(|c| *c == child) else {
            return Err(Error::not_found(format!(
                "{child} among the children of {parent}"
            )));
        };
        children.remove(pos);
        self.nodes[child.index()].parent = None;
        Ok(())
    }

    pub fn remove_port(&mut self, parent: NodeKey, port: PortKey) -> Result<()> {
        let ports = &mut self.nodes[parent.index()].ports;
        let Some(pos) = ports.iter().position(|p| *p == port) else {
            return Err(Error::not_found(format!("{port} among the ports of {parent}")));
        };
        ports.remove(pos);
        self.ports[port.index()].parent = None;
        Ok(())
    }

    /// Creates an edge between two endpoints and stores it on `owner`.
    ///
    /// The owner is provisional; validation relocates the edge to the lowest common ancestor.
    pub fn add_edge(
        &mut self,
        owner: NodeKey,
        source: impl Into<Endpoint>,
        target: impl Into<Endpoint>,
        classes: Option<&str>,
    ) -> EdgeKey {
        let mut edge = Edge::new();
        if let Some(classes) = classes {
            edge.properties.add_class(classes);
        }
        self.insert_edge(owner, edge, source, target)
    }

    pub fn insert_edge(
        &mut self,
        owner: NodeKey,
        edge: Edge,
        source: impl Into<Endpoint>,
        target: impl Into<Endpoint>,
    ) -> EdgeKey {
        let key = EdgeKey::new(self.edges.len());
        self.edges.push(EdgeSlot {
            data: edge,
            source: source.into(),
            target: target.into(),
            owner: Some(owner),
            labels: Vec::new(),
        });
        self.nodes[owner.index()].edges.push(key);
        key
    }

    /// Moves `edge` into `owner`'s edge list.
    pub fn move_edge(&mut self, edge: EdgeKey, owner: NodeKey) {
        if let Some(old) = self.edges[edge.index()].owner {
            self.nodes[old.index()].edges.retain(|e| *e != edge);
        }
        self.edges[edge.index()].owner = Some(owner);
        self.nodes[owner.index()].edges.push(edge);
    }

    pub fn remove_edge(&mut self, edge: EdgeKey) -> Result<()> {
        let Some(owner) = self.edges[edge.index()].owner.take() else {
            return Err(Error::not_found(format!("owner of {edge}")));
        };
        self.nodes[owner.index()].edges.retain(|e| *e != edge);
        Ok(())
    }

    pub fn set_edge_endpoints(
        &mut self,
        edge: EdgeKey,
        source: impl Into<Endpoint>,
        target: impl Into<Endpoint>,
    ) {
        let slot = &mut self.edges[edge.index()];
        slot.source = source.into();
        slot.target = target.into();
    }

    /// Attaches a label to any element (including another label).
    pub fn add_label(&mut self, owner: impl Into<ElementKey>, label: Label) -> LabelKey {
        let owner = owner.into();
        let key = LabelKey::new(self.labels.len());
        self.labels.push(LabelSlot {
            data: label,
            owner: Some(owner),
            labels: Vec::new(),
        });
        self.labels_mut_of(owner).push(key);
        key
    }

    fn labels_mut_of(&mut self, owner: ElementKey) -> &mut Vec<LabelKey> {
        match owner {
            ElementKey::Node(k) => &mut self.nodes[k.index()].labels,
            ElementKey::Port(k) => &mut self.ports[k.index()].labels,
            ElementKey::Edge(k) => &mut self.edges[k.index()].labels,
            ElementKey::Label(k) => &mut self.labels[k.index()].labels,
        }
    }

    // Access

    pub fn node(&self, key: NodeKey) -> &Node {
        &self.nodes[key.index()].data
    }

    pub fn node_mut(&mut self, key: NodeKey) -> &mut Node {
        &mut self.nodes[key.index()].data
    }

    pub fn port(&self, key: PortKey) -> &Port {
        &self.ports[key.index()].data
    }

    pub fn port_mut(&mut self, key: PortKey) -> &mut Port {
        &mut self.ports[key.index()].data
    }

    pub fn edge(&self, key: EdgeKey) -> &Edge {
        &self.edges[key.index()].data
    }

    pub fn edge_mut(&mut self, key: EdgeKey) -> &mut Edge {
        &mut self.edges[key.index()].data
    }

    pub fn label(&self, key: LabelKey) -> &Label {
        &self.labels[key.index()].data
    }

    pub fn label_mut(&mut self, key: LabelKey) -> &mut Label {
        &mut self.labels[key.index()].data
    }

    pub fn data(&self, key: ElementKey) -> &dyn ElementData {
        match key {
            ElementKey::Node(k) => self.node(k),
            ElementKey::Port(k) => self.port(k),
            ElementKey::Edge(k) => self.edge(k),
            ElementKey::Label(k) => self.label(k),
        }
    }

    pub fn data_mut(&mut self, key: ElementKey) -> &mut dyn ElementData {
        match key {
            ElementKey::Node(k) => self.node_mut(k),
            ElementKey::Port(k) => self.port_mut(k),
            ElementKey::Edge(k) => self.edge_mut(k),
            ElementKey::Label(k) => self.label_mut(k),
        }
    }

    pub fn parent(&self, node: NodeKey) -> Option<NodeKey> {
        self.nodes[node.index()].parent
    }

    pub fn port_parent(&self, port: PortKey) -> Option<NodeKey> {
        self.ports[port.index()].parent
    }

    pub fn child_key(&self, node: NodeKey) -> Option<&str> {
        self.nodes[node.index()].key.as_deref()
    }

    pub fn port_key(&self, port: PortKey) -> Option<&str> {
        self.ports[port.index()].key.as_deref()
    }

    pub fn children(&self, node: NodeKey) -> &[NodeKey] {
        &self.nodes[node.index()].children
    }

    pub fn ports(&self, node: NodeKey) -> &[PortKey] {
        &self.nodes[node.index()].ports
    }

    pub fn edges(&self, node: NodeKey) -> &[EdgeKey] {
        &self.nodes[node.index()].edges
    }

    pub fn labels(&self, owner: impl Into<ElementKey>) -> &[LabelKey] {
        match owner.into() {
            ElementKey::Node(k) => &self.nodes[k.index()].labels,
            ElementKey::Port(k) => &self.ports[k.index()].labels,
            ElementKey::Edge(k) => &self.edges[k.index()].labels,
            ElementKey::Label(k) => &self.labels[k.index()].labels,
        }
    }

    pub fn edge_endpoints(&self, edge: EdgeKey) -> (Endpoint, Endpoint) {
        let slot = &self.edges[edge.index()];
        (slot.source, slot.target)
    }

    pub fn edge_owner(&self, edge: EdgeKey) -> Option<NodeKey> {
        self.edges[edge.index()].owner
    }

    pub fn label_owner(&self, label: LabelKey) -> Option<ElementKey> {
        self.labels[label.index()].owner
    }

    /// The node an endpoint lives on: the node itself, or a port's parent.
    pub fn endpoint_node(&self, endpoint: Endpoint) -> Option<NodeKey> {
        match endpoint {
            Endpoint::Node(k) => Some(k),
            Endpoint::Port(k) => self.port_parent(k),
        }
    }

    /// Strict ancestors of `node`, nearest first.
    pub fn ancestors(&self, node: NodeKey) -> impl Iterator<Item = NodeKey> + '_ {
        std::iter::successors(self.parent(node), move |n| self.parent(*n))
    }

    /// `true` when `ancestor` is `node` or one of its ancestors.
    pub fn is_ancestor(&self, ancestor: NodeKey, node: NodeKey) -> bool {
        node == ancestor || self.ancestors(node).any(|a| a == ancestor)
    }

    /// The topmost ancestor of `node` (or `node` itself when detached).
    pub fn top_ancestor(&self, node: NodeKey) -> NodeKey {
        self.ancestors(node).last().unwrap_or(node)
    }

    pub fn node_keys(&self) -> impl Iterator<Item = NodeKey> + '_ {
        (0..self.nodes.len()).map(NodeKey::new)
    }

    pub fn port_keys(&self) -> impl Iterator<Item = PortKey> + '_ {
        (0..self.ports.len()).map(PortKey::new)
    }

    pub fn edge_keys(&self) -> impl Iterator<Item = EdgeKey> + '_ {
        (0..self.edges.len()).map(EdgeKey::new)
    }

    pub fn label_keys(&self) -> impl Iterator<Item = LabelKey> + '_ {
        (0..self.labels.len()).map(LabelKey::new)
    }

    // Identity

    pub fn explicit_id(&self, key: impl Into<ElementKey>) -> Option<&str> {
        self.data(key.into()).id()
    }

    pub fn set_id(&mut self, key: impl Into<ElementKey>, id: Option<String>) {
        self.data_mut(key.into()).set_id(id);
    }

    /// Resolves the id of `key`: its explicit id, or one assigned by the active [`Registry`].
    ///
    /// Ports without an explicit id render as `"{parent_id}.{port_id}"`.
    pub fn id_of(&self, key: impl Into<ElementKey>) -> Result<String> {
        let key = key.into();
        if let Some(id) = self.explicit_id(key) {
            return Ok(id.to_string());
        }
        let registry = Registry::current()?;
        Ok(self.assigned_id(&registry, key))
    }

    /// Like [`id_of`](Self::id_of), returning `None` when no registry context is active.
    pub fn try_id_of(&self, key: impl Into<ElementKey>) -> Option<String> {
        let key = key.into();
        if let Some(id) = self.explicit_id(key) {
            return Some(id.to_string());
        }
        let registry = Registry::try_current()?;
        Some(self.assigned_id(&registry, key))
    }

    fn assigned_id(&self, registry: &Registry, key: ElementKey) -> String {
        let own = registry.get_id(self, key);
        if let ElementKey::Port(port) = key {
            if let Some(parent) = self.port_parent(port) {
                let parent_id = match self.explicit_id(parent) {
                    Some(id) => id.to_string(),
                    None => self.assigned_id(registry, parent.into()),
                };
                return format!("{parent_id}.{own}");
            }
        }
        own
    }

    /// A human readable reference used in error messages.
    pub fn describe(&self, key: impl Into<ElementKey>) -> String {
        let key = key.into();
        match self.explicit_id(key) {
            Some(id) => format!("{key} `{id}`"),
            None => key.to_string(),
        }
    }
}

fn single<K: Copy>(matches: Vec<K>, what: impl FnOnce() -> String) -> Result<K> {
    match matches.as_slice() {
        [one] => Ok(*one),
        [] => Err(Error::NotFound { what: what() }),
        many => Err(Error::NotUnique {
            what: what(),
            count: many.len(),
        }),
    }
}
