//! Id and edge-ownership checks with in-place repair.

use crate::FlowConfig;
use crate::index::{EdgeReport, HierarchicalIndex, IdReport};
use crate::model::{ElementTree, NodeKey};
use crate::{Error, Result};

/// Which findings [`validate`] repairs instead of rejecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepairOptions {
    pub fix_null_id: bool,
    pub fix_orphans: bool,
    pub fix_edge_owners: bool,
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self {
            fix_null_id: true,
            fix_orphans: true,
            fix_edge_owners: true,
        }
    }
}

impl RepairOptions {
    pub fn none() -> Self {
        Self {
            fix_null_id: false,
            fix_orphans: false,
            fix_edge_owners: false,
        }
    }

    pub fn from_config(config: &FlowConfig) -> Self {
        let defaults = Self::default();
        Self {
            fix_null_id: config
                .get_bool("validation.fixNullId")
                .unwrap_or(defaults.fix_null_id),
            fix_orphans: config
                .get_bool("validation.fixOrphans")
                .unwrap_or(defaults.fix_orphans),
            fix_edge_owners: config
                .get_bool("validation.fixEdgeOwners")
                .unwrap_or(defaults.fix_edge_owners),
        }
    }
}

/// Findings of one validation pass and what was repaired.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub id_report: IdReport,
    pub edge_report: EdgeReport,
    pub fixed_ids: usize,
    pub fixed_orphans: usize,
    pub fixed_edges: usize,
}

impl ValidationReport {
    pub fn repaired(&self) -> bool {
        self.fixed_ids + self.fixed_orphans + self.fixed_edges > 0
    }
}

/// Builds the edge report over `root` and the id report over `root` plus any orphans.
pub fn inspect(tree: &ElementTree, root: NodeKey) -> Result<(IdReport, EdgeReport)> {
    let edge_report = HierarchicalIndex::build(tree, root)?.check_edges(tree)?;
    let mut roots = vec![root];
    roots.extend(edge_report.orphans.iter().copied());
    let id_report = HierarchicalIndex::from_roots(tree, &roots)?.check_ids();
    Ok((id_report, edge_report))
}

/// Validates the tree under its root and repairs what `options` allows.
///
/// Ids are written back onto elements, orphans become children of the root and misplaced edges
/// move to their lowest common ancestor. Duplicate ids and dangling ports are never repaired.
/// Must run inside a [`Registry`](crate::Registry) context when any element lacks an id.
pub fn validate(tree: &mut ElementTree, options: &RepairOptions) -> Result<ValidationReport> {
    let root = tree.root()?;
    let (id_report, edge_report) = inspect(tree, root)?;
    reject_uncorrectable(tree, &id_report, &edge_report, options)?;

    let mut report = ValidationReport {
        id_report,
        edge_report,
        ..ValidationReport::default()
    };

    if options.fix_null_id && !report.id_report.null_ids.is_empty() {
        for key in &report.id_report.null_ids {
            let id = tree.id_of(*key)?;
            tree.set_id(*key, Some(id));
        }
        report.fixed_ids = report.id_report.null_ids.len();
        tracing::warn!(count = report.fixed_ids, "assigned ids to elements without one");
    }

    if options.fix_orphans && !report.edge_report.orphans.is_empty() {
        for orphan in &report.edge_report.orphans {
            tree.add_child(root, *orphan, None)?;
        }
        report.fixed_orphans = report.edge_report.orphans.len();
        tracing::warn!(count = report.fixed_orphans, "attached orphan nodes to the root");
    }

    if options.fix_edge_owners
        && (report.fixed_orphans > 0 || !report.edge_report.lca_mismatch.is_empty())
    {
        // Orphan attachment changes ancestry, so owners are recomputed first.
        let (_, edges) = inspect(tree, root)?;
        for (edge, (_, expected)) in &edges.lca_mismatch {
            tree.move_edge(*edge, expected.unwrap_or(root));
        }
        report.fixed_edges = edges.lca_mismatch.len();
        if report.fixed_edges > 0 {
            tracing::warn!(count = report.fixed_edges, "moved edges to their lowest common ancestor");
        }
    }

    Ok(report)
}

fn reject_uncorrectable(
    tree: &ElementTree,
    ids: &IdReport,
    edges: &EdgeReport,
    options: &RepairOptions,
) -> Result<()> {
    if let Some((id, keys)) = ids.duplicated.first() {
        return Err(Error::DuplicateId {
            id: id.clone(),
            count: keys.len(),
        });
    }
    if let Some(edge) = edges.dangling.first() {
        return Err(Error::invalid(format!(
            "{} ends at a port that is not attached to a node",
            tree.describe(*edge)
        )));
    }
    if !options.fix_null_id && !ids.null_ids.is_empty() {
        return Err(Error::invalid(format!(
            "{} elements have no id",
            ids.null_ids.len()
        )));
    }
    if !options.fix_orphans && !edges.orphans.is_empty() {
        return Err(Error::invalid(format!(
            "{} orphan nodes are referenced by edges",
            edges.orphans.len()
        )));
    }
    if !options.fix_edge_owners && !edges.lca_mismatch.is_empty() {
        return Err(Error::invalid(format!(
            "{} edges are not owned by their lowest common ancestor",
            edges.lca_mismatch.len()
        )));
    }
    Ok(())
}
