#![forbid(unsafe_code)]

//! Element model and processing primitives for hierarchical ELK-style diagrams (headless).
//!
//! Design goals:
//! - one arena per tree, with typed keys instead of shared pointers
//! - explicit identity contexts ([`Registry`]) for elements created without ids
//! - synchronous, deterministic model operations; async orchestration lives in `elkflow-pipes`

pub mod config;
pub mod error;
pub mod flow;
pub mod index;
pub mod json;
pub mod loaders;
pub mod mark;
pub mod model;
pub mod registry;
pub mod schema;
pub mod validate;
pub mod visibility;

pub use config::FlowConfig;
pub use error::{Error, Result};
pub use index::{EdgeReport, HierarchicalIndex, IdReport, lowest_common_ancestor};
pub use json::{ElkEdge, ElkLabel, ElkNode, ElkPort, SerializeOptions};
pub use loaders::{ElementLoader, ElkJsonLoader, LayoutDefaults, Loader};
#[cfg(feature = "nx")]
pub use loaders::{NxGraph, NxHierarchy, NxLoader, NxNode};
pub use mark::{Flow, Mark};
pub use model::{
    Edge, EdgeKey, ElementData, ElementKey, ElementTree, Endpoint, Label, LabelKey,
    LayoutOptions, Node, NodeKey, Port, PortKey, Properties, Shape,
};
pub use registry::{Registry, RegistryGuard};
pub use schema::SchemaError;
pub use validate::{RepairOptions, ValidationReport, validate};
pub use visibility::{ProjectionOptions, VisIndex, project};

#[cfg(test)]
mod tests;
