#![forbid(unsafe_code)]

//! `elkflow` builds, checks and lays out hierarchical diagrams in the ELK layout JSON format.
//!
//! The element model, loaders, validation and visibility projection come from `elkflow-core` and
//! are re-exported at the crate root.
//!
//! # Features
//!
//! - `pipes` (default): the async processing pipeline and the [`pipes::Diagram`] coordinator

pub use elkflow_core::*;

#[cfg(feature = "pipes")]
pub mod pipes;
