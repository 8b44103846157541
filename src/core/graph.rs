//! File-level dependency graph document.
//!
//! `variables` is the node list (a node's index is its position) and `cells`
//! are directed edges carrying named weighted attributes. Fields this tool
//! does not understand are carried through unchanged.

use std::collections::HashMap;

use anyhow::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::cli::{AppContext, PruneArgs};
use crate::infra::config::load_config_or_default;
use crate::infra::io::{load_json, save_json};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DepGraph {
    /// Node paths; position is the node index
    #[serde(default)]
    pub variables: Vec<String>,
    #[serde(default)]
    pub cells: Vec<Cell>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub src: usize,
    pub dest: usize,
    #[serde(default)]
    pub values: IndexMap<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Cell {
    /// Edge with a single weighted attribute
    pub fn weighted(src: usize, dest: usize, attribute: &str, weight: f64) -> Self {
        let mut values = IndexMap::new();
        values.insert(attribute.to_string(), Value::from(weight));
        Self {
            src,
            dest,
            values,
            extra: Map::new(),
        }
    }

    pub fn weight(&self, attribute: &str) -> Option<f64> {
        self.values.get(attribute).and_then(Value::as_f64)
    }
}

/// Outcome of [`DepGraph::prune_attribute`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneStats {
    pub attributes_removed: usize,
    pub cells_dropped: usize,
}

impl DepGraph {
    pub fn new(variables: Vec<String>) -> Self {
        Self {
            variables,
            ..Self::default()
        }
    }

    /// Node path → index. Duplicate paths resolve to their last position.
    pub fn node_index(&self) -> HashMap<String, usize> {
        self.variables
            .iter()
            .enumerate()
            .map(|(idx, path)| (path.clone(), idx))
            .collect()
    }

    /// Append an edge between existing nodes. Out-of-range indices and
    /// non-finite weights (which JSON would store as `null`) are refused.
    pub fn push_weighted(&mut self, src: usize, dest: usize, attribute: &str, weight: f64) -> bool {
        let nodes = self.variables.len();
        if src >= nodes || dest >= nodes || !weight.is_finite() {
            return false;
        }
        self.cells.push(Cell::weighted(src, dest, attribute, weight));
        true
    }

    /// Remove `attribute` from every cell where its value is `<= threshold`;
    /// cells left without any attribute are dropped.
    pub fn prune_attribute(&mut self, attribute: &str, threshold: f64) -> PruneStats {
        let mut stats = PruneStats::default();

        self.cells.retain_mut(|cell| {
            if cell.weight(attribute).is_some_and(|w| w <= threshold) {
                cell.values.shift_remove(attribute);
                stats.attributes_removed += 1;
            }
            if cell.values.is_empty() {
                stats.cells_dropped += 1;
                false
            } else {
                true
            }
        });

        stats
    }
}

/// CLI entry for `declmap prune`
pub fn prune_run(args: PruneArgs, ctx: &AppContext) -> Result<()> {
    let config = load_config_or_default();
    let threshold = args.threshold.unwrap_or(config.cochange.threshold);
    let attribute = config.cochange.attribute;

    let mut graph: DepGraph = load_json(&args.input)?;
    let before = graph.cells.len();
    let stats = graph.prune_attribute(&attribute, threshold);

    info!(
        %attribute,
        threshold,
        removed = stats.attributes_removed,
        dropped = stats.cells_dropped,
        "pruned attribute"
    );

    if !ctx.dry_run {
        save_json(&graph, &args.output)?;
    }

    if !ctx.quiet {
        println!(
            "{attribute} <= {threshold}: removed from {} cells, dropped {} of {before} cells",
            stats.attributes_removed, stats.cells_dropped
        );
        if !ctx.dry_run {
            println!("✓ Wrote graph to {}", args.output.display());
        }
    }

    Ok(())
}
