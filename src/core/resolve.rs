//! Function resolution engine.
//!
//! Every (function, implementation file) pair from the inventory lands in
//! exactly one tier, first match wins:
//! 1. Structural Implement relation → `Resolved` (carries the header)
//! 2. File-static definition in the implementation text → `StaticLocal`
//! 3. Any function-shaped definition in the text → `LocalNoHeader`
//! 4. Otherwise → `Unresolved`

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use indexmap::IndexMap;
use owo_colors::OwoColorize;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::cli::{AppContext, ResolveArgs};
use crate::core::lexical::{LexicalClassifier, LexicalEvidence, SourceScanner};
use crate::core::lookup::{ImplementLookup, ImplementMap};
use crate::core::taint::{FunctionInventory, InventoryDoc};
use crate::infra::config::load_config_or_default;
use crate::infra::io::{load_json, save_json};

/// A function is identified by its name together with the file defining it
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId {
    pub name: String,
    pub impl_file: String,
}

impl FunctionId {
    pub fn new(name: impl Into<String>, impl_file: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            impl_file: impl_file.into(),
        }
    }
}

/// Resolution tier of one function
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Structural relation to a declaring header
    Resolved { decl_file: String },
    /// `static` in its translation unit
    StaticLocal,
    /// Defined non-static, but no known header declares it
    LocalNoHeader,
    /// No evidence in the implementation text
    Unresolved,
}

impl Resolution {
    /// Whether the edge synthesizer has a rule for this tier
    pub fn is_mappable(&self) -> bool {
        matches!(self, Resolution::Resolved { .. } | Resolution::StaticLocal)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Resolution::Resolved { .. } => "resolved",
            Resolution::StaticLocal => "static_c",
            Resolution::LocalNoHeader => "local_c",
            Resolution::Unresolved => "unresolved",
        }
    }
}

/// Aggregate counters, serialized under `stats`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionStats {
    pub num_functions: usize,
    pub num_resolved: usize,
    pub num_static_c: usize,
    pub num_local_c: usize,
    pub num_unresolved: usize,
    pub num_impl_files: usize,
    pub num_impl_files_with_unresolved: usize,
}

impl ResolutionStats {
    fn tally<'a>(
        entries: impl IntoIterator<Item = (&'a FunctionId, &'a Resolution)>,
        num_impl_files: usize,
    ) -> Self {
        let mut stats = Self {
            num_impl_files,
            ..Self::default()
        };
        let mut files_with_unresolved: HashSet<&str> = HashSet::new();

        for (id, resolution) in entries {
            stats.num_functions += 1;
            match resolution {
                Resolution::Resolved { .. } => stats.num_resolved += 1,
                Resolution::StaticLocal => stats.num_static_c += 1,
                Resolution::LocalNoHeader => stats.num_local_c += 1,
                Resolution::Unresolved => {
                    stats.num_unresolved += 1;
                    files_with_unresolved.insert(&id.impl_file);
                }
            }
        }

        stats.num_impl_files_with_unresolved = files_with_unresolved.len();
        stats
    }

    /// Human-readable summary, one counter per line
    pub fn print(&self, no_color: bool) {
        let rows = [
            ("Total Impl files", self.num_impl_files),
            ("Impl files w/ unresolved", self.num_impl_files_with_unresolved),
            ("Total functions", self.num_functions),
            ("Resolved (Implement)", self.num_resolved),
            ("Static in .c", self.num_static_c),
            ("Local or .h not found", self.num_local_c),
            ("Unresolved", self.num_unresolved),
        ];
        for (label, value) in rows {
            if no_color {
                println!("{label:<28}: {value}");
            } else {
                println!("{:<28}: {}", label, value.bold());
            }
        }
    }
}

/// Complete tier partition of the inventory
#[derive(Debug, Clone, Default)]
pub struct ResolutionReport {
    entries: IndexMap<FunctionId, Resolution>,
    stats: ResolutionStats,
}

impl ResolutionReport {
    pub fn get(&self, name: &str, impl_file: &str) -> Option<&Resolution> {
        self.entries.get(&FunctionId::new(name, impl_file))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FunctionId, &Resolution)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> &ResolutionStats {
        &self.stats
    }

    /// Bucketed document written by `declmap resolve`
    pub fn to_declmap(&self) -> DeclMap {
        let mut doc = DeclMap {
            stats: Some(self.stats.clone()),
            ..DeclMap::default()
        };

        for (id, resolution) in &self.entries {
            let name = id.name.clone();
            let file = id.impl_file.clone();
            match resolution {
                Resolution::Resolved { decl_file } => {
                    doc.resolved.entry(file).or_default().push(ResolvedEntry {
                        function: name,
                        decl_file: decl_file.clone(),
                    })
                }
                Resolution::StaticLocal => doc.static_c.entry(file).or_default().push(name),
                Resolution::LocalNoHeader => doc.local_c.entry(file).or_default().push(name),
                Resolution::Unresolved => doc.unresolved.entry(file).or_default().push(name),
            }
        }

        doc
    }

    /// Rebuild the partition from a declmap document. If a hand-edited
    /// document lists one function in several buckets, the first bucket in
    /// tier order wins.
    pub fn from_declmap(doc: DeclMap) -> Self {
        let mut entries: IndexMap<FunctionId, Resolution> = IndexMap::new();
        let mut files: HashSet<String> = HashSet::new();

        for (file, list) in doc.resolved {
            for entry in list {
                entries
                    .entry(FunctionId::new(entry.function, file.clone()))
                    .or_insert(Resolution::Resolved {
                        decl_file: entry.decl_file,
                    });
            }
            files.insert(file);
        }

        let buckets = [
            (doc.static_c, Resolution::StaticLocal),
            (doc.local_c, Resolution::LocalNoHeader),
            (doc.unresolved, Resolution::Unresolved),
        ];
        for (bucket, resolution) in buckets {
            for (file, names) in bucket {
                for name in names {
                    entries
                        .entry(FunctionId::new(name, file.clone()))
                        .or_insert_with(|| resolution.clone());
                }
                files.insert(file);
            }
        }

        let num_impl_files = doc
            .stats
            .map(|s| s.num_impl_files)
            .unwrap_or(files.len());
        let stats = ResolutionStats::tally(&entries, num_impl_files);

        Self { entries, stats }
    }
}

/// On-disk bucketed form of a [`ResolutionReport`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeclMap {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<ResolutionStats>,
    #[serde(default)]
    pub resolved: IndexMap<String, Vec<ResolvedEntry>>,
    #[serde(default)]
    pub static_c: IndexMap<String, Vec<String>>,
    #[serde(default)]
    pub local_c: IndexMap<String, Vec<String>>,
    #[serde(default)]
    pub unresolved: IndexMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedEntry {
    pub function: String,
    pub decl_file: String,
}

/// Applies the tier cascade using a structural lookup and lexical evidence
pub struct Resolver<'a, C: LexicalClassifier> {
    lookup: &'a ImplementLookup,
    scanner: &'a SourceScanner<C>,
}

impl<'a, C: LexicalClassifier> Resolver<'a, C> {
    pub fn new(lookup: &'a ImplementLookup, scanner: &'a SourceScanner<C>) -> Self {
        Self { lookup, scanner }
    }

    /// Classify a single function. `evidence` is consulted only when the
    /// structural lookup misses.
    pub fn classify(
        &self,
        name: &str,
        impl_file: &str,
        evidence: impl FnOnce() -> Arc<LexicalEvidence>,
    ) -> Resolution {
        if let Some(decl_file) = self.lookup.decl_file(name, impl_file) {
            return Resolution::Resolved {
                decl_file: decl_file.to_string(),
            };
        }

        let evidence = evidence();
        if evidence.is_static(name) {
            Resolution::StaticLocal
        } else if evidence.is_defined(name) {
            Resolution::LocalNoHeader
        } else {
            Resolution::Unresolved
        }
    }

    #[instrument(skip_all, fields(files = inventory.len()))]
    pub fn resolve(&self, inventory: &FunctionInventory) -> ResolutionReport {
        let mut entries: IndexMap<FunctionId, Resolution> = IndexMap::new();

        for (impl_file, functions) in inventory.iter() {
            // Scan lazily: files whose functions all resolve structurally are never read
            let mut evidence: Option<Arc<LexicalEvidence>> = None;

            for name in functions {
                let resolution = self.classify(name, impl_file, || {
                    evidence
                        .get_or_insert_with(|| self.scanner.evidence(impl_file))
                        .clone()
                });
                entries.insert(FunctionId::new(name.as_str(), impl_file.as_str()), resolution);
            }
        }

        let stats = ResolutionStats::tally(&entries, inventory.len());
        info!(
            functions = stats.num_functions,
            resolved = stats.num_resolved,
            static_c = stats.num_static_c,
            local_c = stats.num_local_c,
            unresolved = stats.num_unresolved,
            "resolution complete"
        );

        ResolutionReport { entries, stats }
    }
}

/// CLI entry for `declmap resolve`
pub fn run(args: ResolveArgs, ctx: &AppContext) -> Result<()> {
    let config = load_config_or_default();
    let policy = args
        .conflict_policy
        .unwrap_or(config.lookup.conflict_policy);

    let inventory = FunctionInventory::from(load_json::<InventoryDoc>(&args.inventory)?);
    let implement_map: ImplementMap = load_json(&args.implement_map)?;

    let lookup = ImplementLookup::build(&implement_map.fun_impl_to_decl, policy);
    if !lookup.conflicts().is_empty() {
        info!(
            conflicts = lookup.conflicts().len(),
            ?policy,
            "implement map has conflicting declaration files"
        );
    }

    let scanner = SourceScanner::new(&args.src_root)?;
    let report = Resolver::new(&lookup, &scanner).resolve(&inventory);

    if !ctx.dry_run {
        save_json(&report.to_declmap(), &args.output)?;
    }

    if !ctx.quiet {
        report.stats().print(ctx.no_color);
        if !ctx.dry_run {
            println!("✓ Wrote declaration map to {}", args.output.display());
        }
    }

    Ok(())
}
