//! Structural "Implement" relation: extraction from a structural dependency
//! dump and the `(function, impl_file) -> decl_file` lookup built from it.

use std::collections::{BTreeMap, BTreeSet, HashMap, hash_map::Entry};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cli::{AppContext, ImplementArgs};
use crate::infra::io::{load_json, save_json};

/// Precedence when the same (function, impl file) pair maps to several headers
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy
{
    /// Later records overwrite earlier ones
    #[default]
    LastWins,
    /// The first record is kept; later ones are only reported
    FirstWins,
}

/// One `{function, impl_file, decl_file}` row. Fields are optional on the wire
/// because upstream dumps mix in partial records from other relation kinds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImplementRecord
{
    #[serde(default)]
    pub function: Option<String>,
    #[serde(default)]
    pub impl_file: Option<String>,
    #[serde(default)]
    pub decl_file: Option<String>,
}

impl ImplementRecord
{
    pub fn new(
        function: &str,
        impl_file: &str,
        decl_file: &str,
    ) -> Self
    {
        Self {
            function: Some(function.to_string()),
            impl_file: Some(impl_file.to_string()),
            decl_file: Some(decl_file.to_string()),
        }
    }

    /// All three fields, if present and non-empty.
    fn parts(&self) -> Option<(&str, &str, &str)>
    {
        Some((non_empty(&self.function)?, non_empty(&self.impl_file)?, non_empty(&self.decl_file)?))
    }
}

fn non_empty(field: &Option<String>) -> Option<&str>
{
    field
        .as_deref()
        .filter(|s| !s.is_empty())
}

/// On-disk implement map
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImplementMap
{
    #[serde(default)]
    pub stats: Option<ImplementStats>,
    #[serde(default)]
    pub fun_impl_to_decl: Vec<ImplementRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplementStats
{
    pub num_relations: usize,
    pub num_functions: usize,
    pub num_impl_files: usize,
    pub num_decl_files: usize,
}

/// A key that was seen with more than one declaration file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupConflict
{
    pub function: String,
    pub impl_file: String,
    pub kept: String,
    pub discarded: String,
}

/// Read-only map from `(function, impl_file)` to the declaring file
#[derive(Debug, Clone, Default)]
pub struct ImplementLookup
{
    map: HashMap<(String, String), String>,
    conflicts: Vec<LookupConflict>,
}

impl ImplementLookup
{
    /// Build the lookup, skipping malformed records and resolving duplicate
    /// keys according to `policy`.
    pub fn build<'a, I>(
        records: I,
        policy: ConflictPolicy,
    ) -> Self
    where
        I: IntoIterator<Item = &'a ImplementRecord>,
    {
        let mut lookup = Self::default();

        for record in records
        {
            let Some((function, impl_file, decl_file)) = record.parts()
            else
            {
                continue;
            };

            let key = (function.to_string(), impl_file.to_string());
            let mut slot = match lookup.map.entry(key)
            {
                Entry::Vacant(vacant) =>
                {
                    vacant.insert(decl_file.to_string());
                    continue;
                }
                Entry::Occupied(occupied) => occupied,
            };

            if slot.get() == decl_file
            {
                continue;
            }

            let (kept, discarded) = match policy
            {
                ConflictPolicy::LastWins =>
                {
                    let previous = slot.insert(decl_file.to_string());
                    (decl_file.to_string(), previous)
                }
                ConflictPolicy::FirstWins => (slot.get().clone(), decl_file.to_string()),
            };
            debug!(function, impl_file, %kept, %discarded, "conflicting declaration files");
            lookup.conflicts.push(LookupConflict {
                function: function.to_string(),
                impl_file: impl_file.to_string(),
                kept,
                discarded,
            });
        }

        lookup
    }

    pub fn decl_file(
        &self,
        function: &str,
        impl_file: &str,
    ) -> Option<&str>
    {
        // Owned key because the map stores (String, String)
        self.map
            .get(&(function.to_string(), impl_file.to_string()))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize
    {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.map.is_empty()
    }

    pub fn conflicts(&self) -> &[LookupConflict]
    {
        &self.conflicts
    }
}

/// Structural dependency dump: only `cells[].details[]` matter here
#[derive(Debug, Default, Deserialize)]
pub struct StructuralDump
{
    #[serde(default)]
    pub cells: Vec<StructuralCell>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StructuralCell
{
    #[serde(default)]
    pub details: Option<Vec<Detail>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Detail
{
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub src: Endpoint,
    #[serde(default)]
    pub dest: Endpoint,
}

#[derive(Debug, Default, Deserialize)]
pub struct Endpoint
{
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub object: Option<String>,
}

/// Collect every `Implement` detail into a sorted implement map. The function
/// name comes from `src.object`, falling back to `dest.object`; duplicate
/// keys keep the last record seen.
pub fn extract_implement_map(dump: &StructuralDump) -> ImplementMap
{
    let mut relations: BTreeMap<(String, String), String> = BTreeMap::new();
    let mut impl_files: BTreeSet<&str> = BTreeSet::new();
    let mut decl_files: BTreeSet<&str> = BTreeSet::new();

    let details = dump
        .cells
        .iter()
        .filter_map(|c| c.details.as_deref())
        .flatten()
        .filter(|d| d.kind.as_deref() == Some("Implement"));

    for detail in details
    {
        let function = detail
            .src
            .object
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(detail.dest.object.as_deref());
        let impl_file = detail.src.file.as_deref();
        let decl_file = detail.dest.file.as_deref();

        let (Some(function), Some(impl_file), Some(decl_file)) = (function, impl_file, decl_file)
        else
        {
            continue;
        };
        if function.is_empty() || impl_file.is_empty() || decl_file.is_empty()
        {
            continue;
        }

        relations.insert((function.to_string(), impl_file.to_string()), decl_file.to_string());
        impl_files.insert(impl_file);
        decl_files.insert(decl_file);
    }

    let num_functions = relations
        .keys()
        .map(|(f, _)| f.as_str())
        .collect::<BTreeSet<_>>()
        .len();

    let fun_impl_to_decl: Vec<ImplementRecord> = relations
        .iter()
        .map(|((f, i), d)| ImplementRecord::new(f, i, d))
        .collect();

    ImplementMap {
        stats: Some(ImplementStats {
            num_relations: fun_impl_to_decl.len(),
            num_functions,
            num_impl_files: impl_files.len(),
            num_decl_files: decl_files.len(),
        }),
        fun_impl_to_decl,
    }
}

/// CLI entry for `declmap implement`
pub fn run(
    args: ImplementArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let dump: StructuralDump = load_json(&args.input)?;
    let map = extract_implement_map(&dump);
    let stats = map.stats.clone().unwrap_or_default();

    info!(relations = stats.num_relations, "extracted implement relations");

    if !ctx.dry_run
    {
        save_json(&map, &args.output)?;
    }

    if !ctx.quiet
    {
        println!("Relations      : {}", stats.num_relations);
        println!("Functions      : {}", stats.num_functions);
        println!("Impl files     : {}", stats.num_impl_files);
        println!("Decl files     : {}", stats.num_decl_files);
        if !ctx.dry_run
        {
            println!("✓ Wrote implement map to {}", args.output.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn skips_incomplete_records()
    {
        let records = vec![
            ImplementRecord::new("foo", "a.c", "a.h"),
            ImplementRecord { function: Some("bar".into()), impl_file: Some("a.c".into()), decl_file: None },
            ImplementRecord::new("", "a.c", "a.h"),
            ImplementRecord::new("baz", "a.c", ""),
        ];

        let lookup = ImplementLookup::build(&records, ConflictPolicy::LastWins);
        assert_eq!(lookup.len(), 1);
        assert_eq!(lookup.decl_file("foo", "a.c"), Some("a.h"));
        assert_eq!(lookup.decl_file("bar", "a.c"), None);
        assert!(lookup.conflicts().is_empty());
    }

    #[test]
    fn key_includes_impl_file()
    {
        let records = vec![
            ImplementRecord::new("init", "a.c", "a.h"),
            ImplementRecord::new("init", "b.c", "b.h"),
        ];
        let lookup = ImplementLookup::build(&records, ConflictPolicy::LastWins);
        assert_eq!(lookup.decl_file("init", "a.c"), Some("a.h"));
        assert_eq!(lookup.decl_file("init", "b.c"), Some("b.h"));
        assert_eq!(lookup.decl_file("init", "c.c"), None);
    }

    #[test]
    fn last_wins_overwrites_and_records_conflict()
    {
        let records = vec![
            ImplementRecord::new("foo", "a.c", "a.h"),
            ImplementRecord::new("foo", "a.c", "compat.h"),
        ];
        let lookup = ImplementLookup::build(&records, ConflictPolicy::LastWins);
        assert_eq!(lookup.decl_file("foo", "a.c"), Some("compat.h"));
        assert_eq!(
            lookup.conflicts(),
            &[LookupConflict {
                function: "foo".into(),
                impl_file: "a.c".into(),
                kept: "compat.h".into(),
                discarded: "a.h".into(),
            }]
        );
    }

    #[test]
    fn first_wins_keeps_original()
    {
        let records = vec![
            ImplementRecord::new("foo", "a.c", "a.h"),
            ImplementRecord::new("foo", "a.c", "compat.h"),
            ImplementRecord::new("foo", "a.c", "a.h"),
        ];
        let lookup = ImplementLookup::build(&records, ConflictPolicy::FirstWins);
        assert_eq!(lookup.decl_file("foo", "a.c"), Some("a.h"));
        // Repeating the kept value is not a conflict
        assert_eq!(lookup.conflicts().len(), 1);
        assert_eq!(lookup.conflicts()[0].discarded, "compat.h");
    }

    #[test]
    fn extracts_only_implement_details()
    {
        let dump: StructuralDump = serde_json::from_value(serde_json::json!({
            "cells": [
                {
                    "src": 0, "dest": 1,
                    "details": [
                        {"type": "Implement",
                         "src": {"file": "a.c", "object": "foo"},
                         "dest": {"file": "a.h", "object": "foo"}},
                        {"type": "Call",
                         "src": {"file": "a.c", "object": "foo"},
                         "dest": {"file": "b.h", "object": "bar"}}
                    ]
                },
                {
                    "details": [
                        {"type": "Implement",
                         "src": {"file": "b.c"},
                         "dest": {"file": "b.h", "object": "bar"}},
                        {"type": "Implement",
                         "src": {"object": "orphan"},
                         "dest": {"file": "x.h"}}
                    ]
                },
                {"values": {"Cochange": 3}}
            ]
        }))
        .unwrap();

        let map = extract_implement_map(&dump);
        assert_eq!(
            map.fun_impl_to_decl,
            vec![ImplementRecord::new("bar", "b.c", "b.h"), ImplementRecord::new("foo", "a.c", "a.h")]
        );
        assert_eq!(
            map.stats,
            Some(ImplementStats { num_relations: 2, num_functions: 2, num_impl_files: 2, num_decl_files: 2 })
        );
    }
}
