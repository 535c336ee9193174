//! Fixtures shared by the finder and filter tests

use crate::usages::position::{IdentifierReference, Position};
use crate::usages::test_helpers::ScriptedSemantic;
use std::path::{Path, PathBuf};

pub const ROOT: &str = "/proj";

pub fn root() -> &'static Path {
    Path::new(ROOT)
}

pub fn project_file(relative: &str) -> PathBuf {
    root().join(relative)
}

pub fn at(relative: &str, line: u32, column: u32) -> Position {
    Position::new(project_file(relative), line, column)
}

/// `lib/a.ml`: `count` is defined on line 10, column 6
pub fn a_ml() -> String {
    let mut text = String::new();
    for i in 1..10 {
        text.push_str(&format!("(* line {i} *)\n"));
    }
    text.push_str("  let count = ref 0\n");
    text.push_str("  let counter = ref 1\n");
    text
}

/// Search output for `count`: a hit on the definition, a shadowed local in
/// `lib/b.ml`, and a qualified use in `lib/c.ml`
pub const COUNT_SEARCH_OUTPUT: &str = "\
lib/a.ml:10:7:  let count = ref 0
lib/b.ml:4:3:  count + 1
lib/c.ml:7:10:  incr A.count
";

pub fn count_definition() -> Position {
    at("lib/a.ml", 10, 6)
}

/// Semantic service that knows `lib/a.ml` and resolves the three search hits
pub fn count_semantic() -> ScriptedSemantic {
    ScriptedSemantic::new()
        .with_document(project_file("lib/a.ml"), &a_ml())
        .with_identifiers(project_file("lib/a.ml"), &["count", "counter"])
        .with_definition(at("lib/a.ml", 10, 6), count_definition())
        .with_definition(at("lib/b.ml", 4, 2), at("lib/b.ml", 3, 6))
        .with_definition(at("lib/c.ml", 7, 9), count_definition())
}

pub fn count_reference() -> IdentifierReference {
    IdentifierReference {
        identifier: "count".to_string(),
        definition: count_definition(),
        origin: count_definition(),
    }
}

/// Byte offset of `count` on line 10 of `lib/a.ml`
pub fn count_offset() -> usize {
    a_ml().find("let count").map(|idx| idx + 4).unwrap_or_default()
}
