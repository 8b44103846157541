//! Taint/dataflow result maps.
//!
//! The analysis emits a (possibly multi-document) YAML stream; one document
//! carries a `result-map` keyed by symbol. Each entry names the function's
//! defining file and the regions that flow into it:
//!
//! ```yaml
//! result-map:
//!   foo:
//!     DemangledName: foo
//!     file: src/a.c
//!     IncomingRegions:
//!       "src/b.c: 10": 3
//! ```
//!
//! From this stream we derive the per-file function inventory and the
//! caller-observation table consumed by edge synthesis.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, Result};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cli::{AppContext, InventoryArgs};
use crate::infra::io::save_json;

const RESULT_MAP_KEY: &str = "result-map";

/// Fatal problems with the taint input as a whole
#[derive(Debug, thiserror::Error)]
pub enum TaintError
{
    #[error("no 'result-map' section found in taint input")]
    MissingResultMap,
    #[error("'result-map' is not a mapping")]
    NotAMapping,
}

/// One dataflow region feeding a function
#[derive(Debug, Clone, PartialEq)]
pub struct Observation
{
    /// Raw `"file: line"` location as written by the analysis
    pub region: String,
    /// Text before the first `:`, trimmed
    pub caller_file: String,
    pub weight: f64,
}

impl Observation
{
    pub fn parse(
        region: &str,
        weight: f64,
    ) -> Self
    {
        let caller_file = region
            .split(':')
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        Self { region: region.to_string(), caller_file, weight }
    }
}

/// A result-map entry reduced to what resolution and synthesis need
#[derive(Debug, Clone, PartialEq)]
pub struct TaintFunction
{
    /// Result-map key
    pub symbol: String,
    /// `DemangledName`, falling back to the key
    pub name: String,
    /// Defining file, if the analysis knew it
    pub impl_file: Option<String>,
    pub observations: Vec<Observation>,
}

/// Raw shape of a result-map entry; unknown fields are ignored
#[derive(Debug, Default, Deserialize)]
struct RawEntry
{
    #[serde(rename = "DemangledName", default)]
    demangled_name: Option<String>,
    #[serde(default)]
    file: Option<String>,
    #[serde(rename = "IncomingRegions", default)]
    incoming_regions: Option<IndexMap<String, serde_yaml::Value>>,
}

/// Parsed result map, in document order
#[derive(Debug, Clone, Default)]
pub struct TaintResults
{
    functions: Vec<TaintFunction>,
}

impl TaintResults
{
    pub fn load(path: &Path) -> Result<Self>
    {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read taint input {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid taint input {}", path.display()))
    }

    /// Parse a YAML stream and use the first document holding a result map.
    pub fn parse(text: &str) -> Result<Self>
    {
        for document in serde_yaml::Deserializer::from_str(text)
        {
            let value = serde_yaml::Value::deserialize(document)?;
            if let Some(result_map) = value.get(RESULT_MAP_KEY)
            {
                return Self::from_result_map(result_map);
            }
        }
        Err(TaintError::MissingResultMap.into())
    }

    fn from_result_map(result_map: &serde_yaml::Value) -> Result<Self>
    {
        let mapping = result_map
            .as_mapping()
            .ok_or(TaintError::NotAMapping)?;
        let mut functions = Vec::with_capacity(mapping.len());

        for (key, entry) in mapping
        {
            let Some(symbol) = key.as_str()
            else
            {
                debug!(?key, "skipping non-string result-map key");
                continue;
            };
            if !entry.is_mapping()
            {
                debug!(symbol, "skipping non-mapping result-map entry");
                continue;
            }

            let raw: RawEntry = match serde_yaml::from_value(entry.clone())
            {
                Ok(raw) => raw,
                Err(err) =>
                {
                    debug!(symbol, error = %err, "skipping malformed result-map entry");
                    continue;
                }
            };

            let observations = raw
                .incoming_regions
                .unwrap_or_default()
                .into_iter()
                .filter_map(|(region, weight)| match weight_of(&weight)
                {
                    Some(w) => Some(Observation::parse(&region, w)),
                    None =>
                    {
                        debug!(symbol, region = %region, ?weight, "skipping non-numeric or non-finite region weight");
                        None
                    }
                })
                .collect();

            functions.push(TaintFunction {
                symbol: symbol.to_string(),
                name: raw
                    .demangled_name
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| symbol.to_string()),
                impl_file: raw.file.filter(|f| !f.is_empty()),
                observations,
            });
        }

        Ok(Self { functions })
    }

    pub fn functions(&self) -> &[TaintFunction]
    {
        &self.functions
    }

    pub fn len(&self) -> usize
    {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.functions.is_empty()
    }

    /// Files defining at least one function, with their function names
    pub fn inventory_doc(&self) -> InventoryDoc
    {
        let mut by_file: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        let mut names: BTreeSet<&str> = BTreeSet::new();
        let mut incoming: BTreeSet<&str> = BTreeSet::new();

        for function in &self.functions
        {
            names.insert(&function.name);
            if let Some(file) = &function.impl_file
            {
                by_file
                    .entry(file)
                    .or_default()
                    .insert(&function.name);
            }
            incoming.extend(
                function
                    .observations
                    .iter()
                    .map(|o| o.caller_file.as_str()),
            );
        }

        InventoryDoc {
            stats: Some(InventoryStats { num_functions: names.len(), num_files: by_file.len() }),
            incoming_files: incoming
                .into_iter()
                .map(str::to_string)
                .collect(),
            file_to_defined_functions: by_file
                .into_iter()
                .map(|(file, names)| {
                    (file.to_string(), names.into_iter().map(str::to_string).collect())
                })
                .collect(),
        }
    }
}

/// Parse a YAML weight; integers, floats and numeric strings are accepted.
/// NaN and infinities are rejected since JSON cannot carry them.
fn weight_of(value: &serde_yaml::Value) -> Option<f64>
{
    let weight = match value
    {
        serde_yaml::Value::Number(n) => n.as_f64(),
        serde_yaml::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    weight.filter(|w| w.is_finite())
}

/// On-disk inventory written by `declmap inventory`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryDoc
{
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<InventoryStats>,
    #[serde(default)]
    pub incoming_files: Vec<String>,
    #[serde(default)]
    pub file_to_defined_functions: IndexMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryStats
{
    pub num_functions: usize,
    pub num_files: usize,
}

/// Implementation file → set of function names defined there
#[derive(Debug, Clone, Default)]
pub struct FunctionInventory
{
    files: IndexMap<String, IndexSet<String>>,
}

impl FunctionInventory
{
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self
    {
        let mut files: IndexMap<String, IndexSet<String>> = IndexMap::new();
        for (file, name) in pairs
        {
            files
                .entry(file)
                .or_default()
                .insert(name);
        }
        Self { files }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &IndexSet<String>)>
    {
        self.files.iter()
    }

    /// Number of implementation files
    pub fn len(&self) -> usize
    {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.files.is_empty()
    }

    pub fn function_count(&self) -> usize
    {
        self.files.values().map(IndexSet::len).sum()
    }
}

impl From<InventoryDoc> for FunctionInventory
{
    fn from(doc: InventoryDoc) -> Self
    {
        let files = doc
            .file_to_defined_functions
            .into_iter()
            .map(|(file, names)| (file, names.into_iter().collect()))
            .collect();
        Self { files }
    }
}

/// CLI entry for `declmap inventory`
pub fn inventory_run(
    args: InventoryArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let results = TaintResults::load(&args.input)?;
    let doc = results.inventory_doc();
    let stats = doc.stats.clone().unwrap_or_default();

    info!(functions = stats.num_functions, files = stats.num_files, "built function inventory");

    if !ctx.dry_run
    {
        save_json(&doc, &args.output)?;
    }

    if !ctx.quiet
    {
        println!("Functions      : {}", stats.num_functions);
        println!("Files          : {}", stats.num_files);
        println!("Incoming files : {}", doc.incoming_files.len());
        if !ctx.dry_run
        {
            println!("✓ Wrote inventory to {}", args.output.display());
        }
    }

    Ok(())
}
