//! Tests for UsageFinder::find_usages
//!
//! Covers the full resolve → search → filter → restore pipeline against the
//! scripted semantic service and canned search output.

use crate::usages::document::Document;
use crate::usages::error::{FinderError, SearchError};
use crate::usages::semantic::SemanticService;
use crate::usages::test_helpers::{CannedSearch, ScriptedSemantic};
use crate::usages::tests::test_helpers::{
    COUNT_SEARCH_OUTPUT, ROOT, a_ml, at, count_definition, count_offset, count_semantic, project_file,
    root,
};
use crate::usages::{Cursor, UsageFinder};

fn cursor_on_count() -> Cursor {
    Cursor::new(project_file("lib/a.ml"), count_offset())
}

// ============================================================================
// Successful invocations
// ============================================================================

#[tokio::test]
async fn test_find_usages_end_to_end() {
    let search = CannedSearch::new(COUNT_SEARCH_OUTPUT);
    let mut finder = UsageFinder::new(count_semantic(), search.clone(), ROOT, "*.ml");

    let usages = finder.find_usages(&cursor_on_count()).await.unwrap();

    assert_eq!(usages.reference.identifier, "count");
    assert_eq!(usages.reference.definition, count_definition());
    assert_eq!(
        usages.listing.to_string(),
        "lib/a.ml:10:7:  let count = ref 0\nlib/c.ml:7:10:  incr A.count\n"
    );
    assert_eq!(usages.rejected, 1);
    assert_eq!(usages.unparseable, 0);

    assert_eq!(finder.semantic().current_view(), Some(&at("lib/a.ml", 10, 6)));
    assert_eq!(finder.semantic().views().depth(), 1);
}

#[tokio::test]
async fn test_search_request_is_word_bounded_and_scoped() {
    let search = CannedSearch::new("");
    let mut finder = UsageFinder::new(count_semantic(), search.clone(), ROOT, "*.ml");

    finder.find_usages(&cursor_on_count()).await.unwrap();

    let requests = search.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].pattern, r"\bcount\b");
    assert_eq!(requests[0].file_glob, "*.ml");
    assert_eq!(requests[0].root, root());
}

#[tokio::test]
async fn test_no_matches_gives_empty_listing() {
    let mut finder = UsageFinder::new(count_semantic(), CannedSearch::new(""), ROOT, "*.ml");

    let usages = finder.find_usages(&cursor_on_count()).await.unwrap();

    assert!(usages.listing.is_empty());
    assert_eq!(usages.rejected, 0);
}

#[tokio::test]
async fn test_repeated_invocations_are_independent() {
    let mut finder = UsageFinder::new(
        count_semantic(),
        CannedSearch::new(COUNT_SEARCH_OUTPUT),
        ROOT,
        "*.ml",
    );

    let first = finder.find_usages(&cursor_on_count()).await.unwrap();
    let second = finder.find_usages(&cursor_on_count()).await.unwrap();

    assert_eq!(first.listing.entries(), second.listing.entries());
    assert_eq!(finder.semantic().views().depth(), 1);
}

#[tokio::test]
async fn test_unresolvable_definition_site_is_listed() {
    // nothing scripted for a.ml:10:6, so the cursor occurrence is its own definition
    let semantic = ScriptedSemantic::new()
        .with_document(project_file("lib/a.ml"), &a_ml())
        .with_identifiers(project_file("lib/a.ml"), &["count"])
        .with_definition(at("lib/c.ml", 7, 9), count_definition());
    let output = "\
lib/a.ml:10:7:  let count = ref 0
lib/c.ml:7:10:  incr A.count
";
    let mut finder = UsageFinder::new(semantic, CannedSearch::new(output), ROOT, "*.ml");

    let usages = finder.find_usages(&cursor_on_count()).await.unwrap();

    assert_eq!(usages.reference.definition, count_definition());
    assert_eq!(
        usages.listing.to_string(),
        "lib/a.ml:10:7:  let count = ref 0\nlib/c.ml:7:10:  incr A.count\n"
    );
    assert_eq!(usages.rejected, 0);
}

// ============================================================================
// Failures still restore the view
// ============================================================================

#[tokio::test]
async fn test_no_identifier_aborts_before_search() {
    let search = CannedSearch::new(COUNT_SEARCH_OUTPUT);
    let mut finder = UsageFinder::new(count_semantic(), search.clone(), ROOT, "*.ml");
    // first line is a comment: no occurrence there
    let cursor = Cursor::new(project_file("lib/a.ml"), 3);

    let result = finder.find_usages(&cursor).await;

    assert!(matches!(result, Err(FinderError::NoIdentifierAtCursor { .. })));
    assert!(search.requests().is_empty());
    assert_eq!(finder.semantic().current_view(), Some(&at("lib/a.ml", 1, 3)));
    assert_eq!(finder.semantic().views().depth(), 1);
}

#[tokio::test]
async fn test_search_failure_is_fatal_but_restores_view() {
    let mut finder = UsageFinder::new(
        count_semantic(),
        CannedSearch::failing("rg: unrecognized flag"),
        ROOT,
        "*.ml",
    );

    let result = finder.find_usages(&cursor_on_count()).await;

    assert!(matches!(
        result,
        Err(FinderError::Search(SearchError::ToolFailed { .. }))
    ));
    assert_eq!(finder.semantic().current_view(), Some(&at("lib/a.ml", 10, 6)));
    assert_eq!(finder.semantic().views().depth(), 1);
}

#[tokio::test]
async fn test_unknown_document_leaves_view_untouched() {
    let mut finder = UsageFinder::new(count_semantic(), CannedSearch::new(""), ROOT, "*.ml");

    let result = finder
        .find_usages(&Cursor::new(project_file("lib/nope.ml"), 0))
        .await;

    assert!(matches!(result, Err(FinderError::Document { .. })));
    assert_eq!(finder.semantic().current_view(), None);
}

// ============================================================================
// Line/column cursors
// ============================================================================

#[test]
fn test_cursor_from_line_column() {
    let document = Document::new(project_file("lib/a.ml"), a_ml());

    let cursor = Cursor::from_line_column(&document, 10, 7).unwrap();

    assert_eq!(cursor, cursor_on_count());
}

#[test]
fn test_cursor_outside_document_is_invalid() {
    let document = Document::new(project_file("lib/a.ml"), a_ml());

    for (line, column) in [(0, 1), (10, 0), (10, 40), (99, 1)] {
        let result = Cursor::from_line_column(&document, line, column);
        assert!(
            matches!(result, Err(FinderError::InvalidCursor { .. })),
            "line {line}, column {column}"
        );
    }
}
