use crate::model::{EdgeKey, ElementKey, ElementTree, Endpoint, LabelKey, NodeKey, PortKey};
use crate::{Error, Result};
use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHashSet;

/// Id lookup over one or more subtrees, built by a depth-first walk
/// (children, ports, edges, labels).
///
/// Elements without an explicit id are indexed under the id the current
/// [`Registry`](crate::Registry) assigns them, so building requires an active context unless
/// every id is explicit.
#[derive(Debug, Clone, Default)]
pub struct HierarchicalIndex {
    elements: IndexMap<String, Vec<ElementKey>>,
    null_ids: Vec<ElementKey>,
    roots: Vec<NodeKey>,
    nodes: Vec<NodeKey>,
    ports: Vec<PortKey>,
    edges: Vec<EdgeKey>,
    labels: Vec<LabelKey>,
}

/// Elements sharing an id, and elements with no explicit id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdReport {
    pub duplicated: IndexMap<String, Vec<ElementKey>>,
    pub null_ids: Vec<ElementKey>,
}

impl IdReport {
    pub fn is_clean(&self) -> bool {
        self.duplicated.is_empty() && self.null_ids.is_empty()
    }
}

/// Edge ownership findings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeReport {
    /// Topmost detached ancestors of edge endpoints that are not part of the indexed tree.
    pub orphans: IndexSet<NodeKey>,
    /// `edge -> (current owner, expected owner)`; `None` as expected means the endpoints share
    /// no ancestor yet, and the root becomes the owner once orphans are attached.
    pub lca_mismatch: IndexMap<EdgeKey, (Option<NodeKey>, Option<NodeKey>)>,
    /// Edges with an endpoint port that is not attached to any node.
    pub dangling: Vec<EdgeKey>,
}

impl EdgeReport {
    pub fn is_clean(&self) -> bool {
        self.orphans.is_empty() && self.lca_mismatch.is_empty() && self.dangling.is_empty()
    }
}

impl HierarchicalIndex {
    pub fn build(tree: &ElementTree, root: NodeKey) -> Result<Self> {
        Self::from_roots(tree, &[root])
    }

    pub fn from_roots(tree: &ElementTree, roots: &[NodeKey]) -> Result<Self> {
        let mut index = Self {
            roots: roots.to_vec(),
            ..Self::default()
        };
        for root in roots {
            for key in tree.iter_elements(*root) {
                if tree.explicit_id(key).is_none() {
                    index.null_ids.push(key);
                }
                index.elements.entry(tree.id_of(key)?).or_default().push(key);
                match key {
                    ElementKey::Node(k) => index.nodes.push(k),
                    ElementKey::Port(k) => index.ports.push(k),
                    ElementKey::Edge(k) => index.edges.push(k),
                    ElementKey::Label(k) => index.labels.push(k),
                }
            }
        }
        Ok(index)
    }

    pub fn get(&self, id: &str) -> Result<ElementKey> {
        match self.elements.get(id).map(Vec::as_slice) {
            Some([one]) => Ok(*one),
            Some(many) if !many.is_empty() => Err(Error::NotUnique {
                what: format!("element `{id}`"),
                count: many.len(),
            }),
            _ => Err(Error::not_found(format!("element `{id}`"))),
        }
    }

    /// Looks up a node or port by id.
    pub fn get_endpoint(&self, id: &str) -> Result<Endpoint> {
        self.get(id)?
            .as_endpoint()
            .ok_or_else(|| Error::not_found(format!("node or port `{id}`")))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.elements.contains_key(id)
    }

    /// The single root the index was built from.
    pub fn root(&self) -> Result<NodeKey> {
        match self.roots.as_slice() {
            [root] => Ok(*root),
            [] => Err(Error::not_found("root node")),
            many => Err(Error::NotUnique {
                what: "root node".to_string(),
                count: many.len(),
            }),
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.elements.keys().map(String::as_str)
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeKey> + '_ {
        self.nodes.iter().copied()
    }

    pub fn ports(&self) -> impl Iterator<Item = PortKey> + '_ {
        self.ports.iter().copied()
    }

    pub fn edges(&self) -> impl Iterator<Item = EdgeKey> + '_ {
        self.edges.iter().copied()
    }

    pub fn labels(&self) -> impl Iterator<Item = LabelKey> + '_ {
        self.labels.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len() + self.ports.len() + self.edges.len() + self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn check_ids(&self) -> IdReport {
        IdReport {
            duplicated: self
                .elements
                .iter()
                .filter(|(_, keys)| keys.len() > 1)
                .map(|(id, keys)| (id.clone(), keys.clone()))
                .collect(),
            null_ids: self.null_ids.clone(),
        }
    }

    /// Checks every indexed edge against the lowest-common-ancestor ownership rule.
    pub fn check_edges(&self, tree: &ElementTree) -> Result<EdgeReport> {
        let root = self.root()?;
        let mut report = EdgeReport::default();
        for edge in self.edges() {
            let (source, target) = tree.edge_endpoints(edge);
            let (Some(sn), Some(tn)) = (tree.endpoint_node(source), tree.endpoint_node(target))
            else {
                report.dangling.push(edge);
                continue;
            };
            for node in [sn, tn] {
                let top = tree.top_ancestor(node);
                if top != root {
                    report.orphans.insert(top);
                }
            }
            let expected = lowest_common_ancestor(tree, sn, tn);
            let current = tree.edge_owner(edge);
            if current != expected {
                report.lca_mismatch.insert(edge, (current, expected));
            }
        }
        Ok(report)
    }
}

/// The node that should own an edge between nodes `a` and `b`.
///
/// For `a == b` this is the node's parent (or the node itself when it has none); otherwise the
/// deepest node that is an ancestor-or-self of both. `None` when they share no ancestor.
pub fn lowest_common_ancestor(tree: &ElementTree, a: NodeKey, b: NodeKey) -> Option<NodeKey> {
    if a == b {
        return Some(tree.parent(a).unwrap_or(a));
    }
    let lineage: FxHashSet<NodeKey> = std::iter::once(a).chain(tree.ancestors(a)).collect();
    std::iter::once(b)
        .chain(tree.ancestors(b))
        .find(|n| lineage.contains(n))
}

/// [`lowest_common_ancestor`] of the nodes two endpoints live on.
pub fn edge_owner_for(tree: &ElementTree, source: Endpoint, target: Endpoint) -> Option<NodeKey> {
    let sn = tree.endpoint_node(source)?;
    let tn = tree.endpoint_node(target)?;
    lowest_common_ancestor(tree, sn, tn)
}
