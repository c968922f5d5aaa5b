//! Loaders turn external representations into a [`Mark`] holding a canonical tree.

mod element;
mod json;
#[cfg(feature = "nx")]
mod nx;

pub use element::ElementLoader;
pub use json::ElkJsonLoader;
#[cfg(feature = "nx")]
pub use nx::{NxGraph, NxHierarchy, NxLoader, NxNode};

use crate::model::{ElementKey, ElementTree, LayoutOptions, NodeKey};
use crate::{FlowConfig, Mark, Result};

pub trait Loader<Input> {
    fn load(&self, input: Input) -> Result<Mark>;
}

/// Layout options applied to elements whose own `layoutOptions` are empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutDefaults {
    pub root: LayoutOptions,
    pub node: LayoutOptions,
    pub port: LayoutOptions,
    pub label: LayoutOptions,
    pub edge: LayoutOptions,
}

impl LayoutDefaults {
    /// Reads `loader.layoutOptions.{root,node,port,label,edge}`.
    pub fn from_config(config: &FlowConfig) -> Self {
        let read = |kind: &str| -> LayoutOptions {
            config
                .get_object(&format!("loader.layoutOptions.{kind}"))
                .map(|map| {
                    map.iter()
                        .filter_map(|(k, v)| Some((k.clone(), v.as_str()?.to_string())))
                        .collect()
                })
                .unwrap_or_default()
        };
        Self {
            root: read("root"),
            node: read("node"),
            port: read("port"),
            label: read("label"),
            edge: read("edge"),
        }
    }

    /// No defaults at all.
    pub fn cleared() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
            && self.node.is_empty()
            && self.port.is_empty()
            && self.label.is_empty()
            && self.edge.is_empty()
    }

    /// Fills empty `layoutOptions` in the subtree at `root`. Returns how many elements changed.
    pub fn apply(&self, tree: &mut ElementTree, root: NodeKey) -> usize {
        let mut changed = 0;
        for key in tree.iter_elements(root) {
            let defaults = match key {
                ElementKey::Node(k) if k == root => &self.root,
                ElementKey::Node(_) => &self.node,
                ElementKey::Port(_) => &self.port,
                ElementKey::Edge(_) => &self.edge,
                ElementKey::Label(_) => &self.label,
            };
            let options = tree.data_mut(key).layout_options_mut();
            if options.is_empty() && !defaults.is_empty() {
                *options = defaults.clone();
                changed += 1;
            }
        }
        changed
    }
}

impl From<&FlowConfig> for LayoutDefaults {
    fn from(config: &FlowConfig) -> Self {
        Self::from_config(config)
    }
}
