use super::{LayoutDefaults, Loader};
use crate::flow::NEW;
use crate::json::{ElkNode, from_elk};
use crate::{FlowConfig, Mark, Result, schema};
use serde_json::Value;

/// Loads layout JSON, rejecting documents that fail the structural schema check.
#[derive(Debug, Clone, PartialEq)]
pub struct ElkJsonLoader {
    pub defaults: LayoutDefaults,
}

impl Default for ElkJsonLoader {
    fn default() -> Self {
        Self::from_config(&FlowConfig::defaults())
    }
}

impl ElkJsonLoader {
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

impl Loader<&Value> for ElkJsonLoader {
    fn load(&self, input: &Value) -> Result<Mark> {
        schema::validate(input)?;
        let data: ElkNode = serde_json::from_value(input.clone())?;
        let mut tree = from_elk(&data)?;
        let root = tree.root()?;
        self.defaults.apply(&mut tree, root);
        Ok(Mark::with_value(tree, [NEW]))
    }
}

impl Loader<&str> for ElkJsonLoader {
    fn load(&self, input: &str) -> Result<Mark> {
        let value: Value = serde_json::from_str(input)?;
        <Self as Loader<&Value>>::load(self, &value)
    }
}
