//! Shared test utilities for integration tests
//!
//! Builds a small C project plus the analysis artifacts the pipeline
//! consumes: a structural dump, a taint result map and a dependency graph.

#![allow(dead_code)]

use assert_fs::prelude::*;

/// Structural dump: `foo` in a.c is declared by a.h
pub const STRUCTURAL: &str = r#"{
  "variables": ["a.c", "a.h", "b.c", "x.c", "y.c"],
  "cells": [
    {
      "src": 0, "dest": 1,
      "values": {"Implement": 1},
      "details": [
        {"type": "Implement",
         "src": {"file": "a.c", "object": "foo", "type": "Function"},
         "dest": {"file": "a.h", "object": "foo", "type": "Function"}}
      ]
    }
  ]
}"#;

/// Taint result map covering every tier plus a function outside the graph
pub const TAINT: &str = r#"---
result-map:
  foo:
    DemangledName: foo
    file: a.c
    IncomingRegions:
      "b.c: 10": 3
  helper:
    DemangledName: helper
    file: x.c
    IncomingRegions:
      "y.c: 5": 1
  loose:
    DemangledName: loose
    file: x.c
    IncomingRegions:
      "y.c: 7": 2
  ghost:
    DemangledName: ghost
    file: z.c
    IncomingRegions:
      "b.c: 2": 4
...
"#;

/// Dependency graph with one pre-existing co-change edge
pub const GRAPH: &str = r#"{
  "@schemaVersion": "1.0",
  "name": "fixture",
  "variables": ["a.c", "a.h", "b.c", "x.c", "y.c"],
  "cells": [
    {"src": 2, "dest": 0, "values": {"Cochange": 12}},
    {"src": 4, "dest": 3, "values": {"Cochange": 2}}
  ]
}"#;

/// Create the fixture project with sources and analysis artifacts.
pub fn make_fixture() -> assert_fs::TempDir
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");

    tmp.child("src/a.c")
        .write_str("#include \"a.h\"\nint foo(int x)\n{\n    return x + 1;\n}\n")
        .expect("write a.c");
    tmp.child("src/a.h")
        .write_str("int foo(int x);\n")
        .expect("write a.h");
    tmp.child("src/x.c")
        .write_str(
            "static void helper(void) {\n}\n\
             int loose(int y)\n{\n    helper();\n    return y;\n}\n",
        )
        .expect("write x.c");

    tmp.child("structural.json")
        .write_str(STRUCTURAL)
        .expect("write structural");
    tmp.child("taint.yml")
        .write_str(TAINT)
        .expect("write taint");
    tmp.child("deps.json")
        .write_str(GRAPH)
        .expect("write graph");

    tmp
}

/// Parse a JSON file inside the fixture.
pub fn read_json(
    tmp: &assert_fs::TempDir,
    name: &str,
) -> serde_json::Value
{
    let text = std::fs::read_to_string(tmp.path().join(name)).expect("read output");
    serde_json::from_str(&text).expect("json")
}
