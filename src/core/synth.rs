//! Edge synthesis: turn per-function caller observations into file edges.
//!
//! Tier rules:
//! - `Resolved`: every caller gets an edge to the implementation file and a
//!   second edge to the declaring header, both with the caller's weight.
//! - `StaticLocal`: every caller gets a single edge to the implementation file.
//! - anything else has no edge rule and is reported.
//!
//! Nothing here aborts on bad data. Each violation becomes a [`Diagnostic`]
//! and skips exactly the edges it affects.

use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use owo_colors::OwoColorize;
use tracing::{debug, info, instrument};

use crate::cli::{AppContext, MergeArgs};
use crate::core::graph::DepGraph;
use crate::core::resolve::{DeclMap, Resolution, ResolutionReport};
use crate::core::taint::{TaintFunction, TaintResults};
use crate::infra::config::load_config_or_default;
use crate::infra::io::{load_json, save_json};

/// A skipped function or edge, with the reason
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Diagnostic {
    #[error("[no impl file] function '{function}' has no implementation file")]
    NoImplFile { function: String },

    #[error("[missing impl variable] function '{function}': impl file '{impl_file}' not in variables list")]
    MissingImplNode { function: String, impl_file: String },

    #[error("[unmapped function] function '{function}' (impl file '{impl_file}') not found in 'resolved' or 'static_c'")]
    UnmappedFunction { function: String, impl_file: String },

    #[error("[missing src variable] function '{function}': src file '{caller_file}' not in variables list")]
    MissingCallerNode { function: String, caller_file: String },

    #[error("[missing decl variable] function '{function}': decl file '{decl_file}' not in variables list")]
    MissingDeclNode { function: String, decl_file: String },
}

impl Diagnostic {
    /// Short category name, used for summaries
    pub fn kind(&self) -> &'static str {
        match self {
            Diagnostic::NoImplFile { .. } => "no impl file",
            Diagnostic::MissingImplNode { .. } => "missing impl variable",
            Diagnostic::UnmappedFunction { .. } => "unmapped function",
            Diagnostic::MissingCallerNode { .. } => "missing src variable",
            Diagnostic::MissingDeclNode { .. } => "missing decl variable",
        }
    }
}

/// What a synthesis pass appended and what it skipped
#[derive(Debug, Clone, Default)]
pub struct SynthesisOutcome {
    pub edges_added: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl SynthesisOutcome {
    /// Diagnostic counts per kind, in stable order
    pub fn counts_by_kind(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for d in &self.diagnostics {
            *counts.entry(d.kind()).or_insert(0) += 1;
        }
        counts
    }
}

pub struct EdgeSynthesizer<'a> {
    report: &'a ResolutionReport,
    attribute: String,
}

impl<'a> EdgeSynthesizer<'a> {
    pub fn new(report: &'a ResolutionReport, attribute: impl Into<String>) -> Self {
        Self {
            report,
            attribute: attribute.into(),
        }
    }

    /// Append edges for every function in `functions` to `graph`.
    #[instrument(skip_all, fields(functions = functions.len(), attribute = %self.attribute))]
    pub fn synthesize(&self, graph: &mut DepGraph, functions: &[TaintFunction]) -> SynthesisOutcome {
        let index = graph.node_index();
        let mut outcome = SynthesisOutcome::default();

        for function in functions {
            self.synthesize_one(graph, &index, function, &mut outcome);
        }

        info!(
            edges = outcome.edges_added,
            diagnostics = outcome.diagnostics.len(),
            "edge synthesis complete"
        );
        outcome
    }

    fn synthesize_one(
        &self,
        graph: &mut DepGraph,
        index: &HashMap<String, usize>,
        function: &TaintFunction,
        outcome: &mut SynthesisOutcome,
    ) {
        let name = function.name.as_str();

        let Some(impl_file) = function.impl_file.as_deref() else {
            outcome.diagnostics.push(Diagnostic::NoImplFile {
                function: name.to_string(),
            });
            return;
        };

        let Some(&impl_idx) = index.get(impl_file) else {
            outcome.diagnostics.push(Diagnostic::MissingImplNode {
                function: name.to_string(),
                impl_file: impl_file.to_string(),
            });
            return;
        };

        let decl_file = match self.report.get(name, impl_file) {
            Some(Resolution::Resolved { decl_file }) => Some(decl_file.as_str()),
            Some(Resolution::StaticLocal) => None,
            other => {
                debug!(
                    function = name,
                    impl_file,
                    tier = other.map(Resolution::label).unwrap_or("absent"),
                    "no edge rule"
                );
                outcome.diagnostics.push(Diagnostic::UnmappedFunction {
                    function: name.to_string(),
                    impl_file: impl_file.to_string(),
                });
                return;
            }
        };

        for observation in &function.observations {
            let Some(&src_idx) = index.get(&observation.caller_file) else {
                outcome.diagnostics.push(Diagnostic::MissingCallerNode {
                    function: name.to_string(),
                    caller_file: observation.caller_file.clone(),
                });
                continue;
            };

            if graph.push_weighted(src_idx, impl_idx, &self.attribute, observation.weight) {
                outcome.edges_added += 1;
            }

            let Some(decl_file) = decl_file else {
                continue;
            };
            match index.get(decl_file) {
                Some(&decl_idx) => {
                    if graph.push_weighted(src_idx, decl_idx, &self.attribute, observation.weight) {
                        outcome.edges_added += 1;
                    }
                }
                None => outcome.diagnostics.push(Diagnostic::MissingDeclNode {
                    function: name.to_string(),
                    decl_file: decl_file.to_string(),
                }),
            }
        }
    }
}

/// CLI entry for `declmap merge`
pub fn run(args: MergeArgs, ctx: &AppContext) -> Result<()> {
    let config = load_config_or_default();
    let attribute = args.attribute.unwrap_or(config.dataflow_attribute);

    let taint = TaintResults::load(&args.taint)?;
    let mut graph: DepGraph = load_json(&args.graph)?;
    let report = ResolutionReport::from_declmap(load_json::<DeclMap>(&args.declmap)?);

    let nodes_before = graph.variables.len();
    let outcome = EdgeSynthesizer::new(&report, attribute).synthesize(&mut graph, taint.functions());
    debug_assert_eq!(nodes_before, graph.variables.len());

    for diagnostic in &outcome.diagnostics {
        debug!("{diagnostic}");
    }

    if !ctx.dry_run {
        save_json(&graph, &args.output)?;
        if let Some(errors) = &args.errors {
            let messages: Vec<String> = outcome.diagnostics.iter().map(ToString::to_string).collect();
            save_json(&messages, errors)?;
        }
    }

    if !ctx.quiet {
        println!("Functions observed : {}", taint.len());
        println!("Edges added        : {}", outcome.edges_added);
        println!("Diagnostics        : {}", outcome.diagnostics.len());
        for (kind, count) in outcome.counts_by_kind() {
            if ctx.no_color {
                println!("  {kind:<20} {count}");
            } else {
                println!("  {:<20} {}", kind.yellow(), count);
            }
        }
        if !ctx.dry_run {
            println!("✓ Wrote merged graph to {}", args.output.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resolve::ResolvedEntry;
    use crate::core::taint::Observation;
    use indexmap::IndexMap;

    fn graph(nodes: &[&str]) -> DepGraph {
        DepGraph::new(nodes.iter().map(|s| s.to_string()).collect())
    }

    fn function(name: &str, impl_file: Option<&str>, regions: &[(&str, f64)]) -> TaintFunction {
        TaintFunction {
            symbol: name.to_string(),
            name: name.to_string(),
            impl_file: impl_file.map(str::to_string),
            observations: regions
                .iter()
                .map(|(r, w)| Observation::parse(r, *w))
                .collect(),
        }
    }

    fn report(resolved: &[(&str, &str, &str)], statics: &[(&str, &str)], locals: &[(&str, &str)]) -> ResolutionReport {
        let mut doc = DeclMap::default();
        for (f, i, d) in resolved {
            doc.resolved.entry(i.to_string()).or_default().push(ResolvedEntry {
                function: f.to_string(),
                decl_file: d.to_string(),
            });
        }
        for (f, i) in statics {
            doc.static_c.entry(i.to_string()).or_default().push(f.to_string());
        }
        for (f, i) in locals {
            doc.local_c.entry(i.to_string()).or_default().push(f.to_string());
        }
        ResolutionReport::from_declmap(doc)
    }

    fn edges(graph: &DepGraph) -> Vec<(&str, &str, f64)> {
        graph
            .cells
            .iter()
            .map(|c| {
                (
                    graph.variables[c.src].as_str(),
                    graph.variables[c.dest].as_str(),
                    c.weight("Dataflow").unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn resolved_function_links_impl_and_header() {
        let mut g = graph(&["a.c", "a.h", "b.c"]);
        let report = report(&[("foo", "a.c", "a.h")], &[], &[]);
        let functions = vec![function("foo", Some("a.c"), &[("b.c: 10", 3.0)])];

        let outcome = EdgeSynthesizer::new(&report, "Dataflow").synthesize(&mut g, &functions);

        assert!(outcome.diagnostics.is_empty());
        assert_eq!(outcome.edges_added, 2);
        assert_eq!(edges(&g), vec![("b.c", "a.c", 3.0), ("b.c", "a.h", 3.0)]);
    }

    #[test]
    fn static_function_links_impl_only() {
        let mut g = graph(&["x.c", "y.c"]);
        let report = report(&[], &[("helper", "x.c")], &[]);
        let functions = vec![function("helper", Some("x.c"), &[("y.c: 5", 1.0)])];

        let outcome = EdgeSynthesizer::new(&report, "Dataflow").synthesize(&mut g, &functions);

        assert!(outcome.diagnostics.is_empty());
        assert_eq!(edges(&g), vec![("y.c", "x.c", 1.0)]);
    }

    #[test]
    fn missing_impl_node_skips_whole_function() {
        let mut g = graph(&["a.c", "b.c"]);
        let report = report(&[("ghost", "z.c", "z.h")], &[], &[]);
        let functions = vec![function("ghost", Some("z.c"), &[("b.c: 1", 2.0), ("a.c: 3", 1.0)])];

        let outcome = EdgeSynthesizer::new(&report, "Dataflow").synthesize(&mut g, &functions);

        assert!(g.cells.is_empty());
        assert_eq!(
            outcome.diagnostics,
            vec![Diagnostic::MissingImplNode {
                function: "ghost".into(),
                impl_file: "z.c".into()
            }]
        );
    }

    #[test]
    fn missing_caller_skips_only_that_caller() {
        let mut g = graph(&["a.c", "a.h", "b.c"]);
        let report = report(&[("foo", "a.c", "a.h")], &[], &[]);
        let functions = vec![function("foo", Some("a.c"), &[("gen/out.c: 4", 9.0), ("b.c: 10", 3.0)])];

        let outcome = EdgeSynthesizer::new(&report, "Dataflow").synthesize(&mut g, &functions);

        assert_eq!(edges(&g), vec![("b.c", "a.c", 3.0), ("b.c", "a.h", 3.0)]);
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(
            outcome.diagnostics[0].to_string(),
            "[missing src variable] function 'foo': src file 'gen/out.c' not in variables list"
        );
    }

    #[test]
    fn missing_decl_node_keeps_impl_edge() {
        let mut g = graph(&["a.c", "b.c"]);
        let report = report(&[("foo", "a.c", "include/a.h")], &[], &[]);
        let functions = vec![function("foo", Some("a.c"), &[("b.c: 10", 3.0), ("b.c: 12", 4.0)])];

        let outcome = EdgeSynthesizer::new(&report, "Dataflow").synthesize(&mut g, &functions);

        assert_eq!(edges(&g), vec![("b.c", "a.c", 3.0), ("b.c", "a.c", 4.0)]);
        assert_eq!(outcome.edges_added, 2);
        assert_eq!(outcome.counts_by_kind().get("missing decl variable"), Some(&2));
    }

    #[test]
    fn local_and_unknown_functions_are_unmapped() {
        let mut g = graph(&["a.c", "b.c"]);
        let report = report(&[], &[], &[("loose", "a.c")]);
        let functions = vec![
            function("loose", Some("a.c"), &[("b.c: 1", 1.0)]),
            function("never_seen", Some("a.c"), &[("b.c: 2", 1.0)]),
            function("orphan", None, &[("b.c: 3", 1.0)]),
        ];

        let outcome = EdgeSynthesizer::new(&report, "Dataflow").synthesize(&mut g, &functions);

        assert!(g.cells.is_empty());
        let kinds: Vec<_> = outcome.diagnostics.iter().map(Diagnostic::kind).collect();
        assert_eq!(kinds, vec!["unmapped function", "unmapped function", "no impl file"]);
    }

    #[test]
    fn existing_edges_are_untouched() {
        let mut g = graph(&["x.c", "y.c"]);
        let mut values = IndexMap::new();
        values.insert("Cochange".to_string(), serde_json::json!(12));
        g.cells.push(crate::core::graph::Cell {
            src: 0,
            dest: 1,
            values,
            extra: Default::default(),
        });
        let report = report(&[], &[("helper", "x.c")], &[]);
        let functions = vec![function("helper", Some("x.c"), &[("y.c: 5", 1.0)])];

        EdgeSynthesizer::new(&report, "Dataflow").synthesize(&mut g, &functions);

        assert_eq!(g.cells.len(), 2);
        assert_eq!(g.cells[0].weight("Cochange"), Some(12.0));
        assert_eq!(g.variables.len(), 2);
    }
}
