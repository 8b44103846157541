//! **declmap** - Resolve which file owns each C function and merge dataflow
//! observations into a file-level dependency graph.
//!
//! Functions are classified against a structural Implement relation first and
//! lexical evidence from their translation unit second; the resulting tiers
//! decide which file edges each caller observation produces.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// Core pipeline - relation lookup, lexical evidence, tiering, edge synthesis
pub mod core {
    /// Structural Implement relation extraction and (function, file) lookup
    pub mod lookup;
    pub use lookup::{ConflictPolicy, ImplementLookup, ImplementRecord, run as implement_run};

    /// Regex-based static/definition detection with per-file caching
    pub mod lexical;
    pub use lexical::{LexicalClassifier, LexicalEvidence, RegexClassifier, SourceScanner};

    /// Four-tier function resolution engine
    pub mod resolve;
    pub use resolve::{FunctionId, Resolution, ResolutionReport, Resolver, run as resolve_run};

    /// Taint YAML ingest: function inventory and caller observations
    pub mod taint;
    pub use taint::{FunctionInventory, TaintResults, inventory_run};

    /// Dependency graph document and co-change pruning
    pub mod graph;
    pub use graph::{DepGraph, prune_run};

    /// Tier-aware edge synthesis with accumulated diagnostics
    pub mod synth;
    pub use synth::{Diagnostic, EdgeSynthesizer, run as merge_run};
}

/// Infrastructure - configuration and file I/O
pub mod infra {
    /// Layered configuration (declmap.toml + DECLMAP_* env)
    pub mod config;
    pub use config::{Config, init as config_init, load_config, load_config_or_default};

    /// Memory-mapped source reads and JSON document helpers
    pub mod io;
    pub use io::{load_json, read_source_lossy, save_json};
}

// Strategic re-exports for clean CLI interface
pub use cli::{AppContext, Cli, Commands};
pub use self::core::{implement_run, inventory_run, merge_run, prune_run, resolve_run};
pub use infra::{Config, load_config};

// Core types for external consumers
pub use self::core::{
    DepGraph, Diagnostic, EdgeSynthesizer, FunctionId, FunctionInventory, ImplementLookup,
    Resolution, ResolutionReport, Resolver, SourceScanner, TaintResults,
};
