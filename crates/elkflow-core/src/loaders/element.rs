use super::{LayoutDefaults, Loader};
use crate::flow::NEW;
use crate::model::ElementTree;
use crate::{FlowConfig, Mark, Result};

/// Accepts a programmatically built tree as-is, only filling in layout-option defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementLoader {
    pub defaults: LayoutDefaults,
}

impl Default for ElementLoader {
    fn default() -> Self {
        Self::from_config(&FlowConfig::defaults())
    }
}

impl ElementLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &FlowConfig) -> Self {
        Self {
            defaults: LayoutDefaults::from_config(config),
        }
    }

    pub fn with_defaults(mut self, defaults: LayoutDefaults) -> Self {
        self.defaults = defaults;
        self
    }
}

impl Loader<ElementTree> for ElementLoader {
    fn load(&self, mut tree: ElementTree) -> Result<Mark> {
        let root = tree.root()?;
        tree.set_root(root);
        self.defaults.apply(&mut tree, root);
        Ok(Mark::with_value(tree, [NEW]))
    }
}
