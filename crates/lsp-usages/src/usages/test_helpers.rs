//! Test helpers for the usage finder
//!
//! In-memory stand-ins for the two external collaborators, so the resolver,
//! filter and finder can be tested without a language server or ripgrep.
//!
//! This module is public so integration tests can use these helpers.

#![allow(dead_code)]

use crate::usages::document::Document;
use crate::usages::error::{ResolveError, SearchError};
use crate::usages::position::{Occurrence, Position};
use crate::usages::search::{SearchHandle, SearchOutput, SearchRequest, TextSearch};
use crate::usages::semantic::{SemanticService, ViewStack};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Semantic service answering from tables set up by the test.
#[derive(Debug, Default)]
pub struct ScriptedSemantic {
    documents: HashMap<PathBuf, Arc<Document>>,
    occurrences: HashMap<PathBuf, Vec<Occurrence>>,
    definitions: HashMap<Position, Position>,
    views: ViewStack,
    pushes: usize,
    pops: usize,
    resolved: Vec<Position>,
}

impl ScriptedSemantic {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document's text
    pub fn with_document(mut self, path: impl Into<PathBuf>, text: &str) -> Self {
        let path = path.into();
        self.documents
            .insert(path.clone(), Arc::new(Document::new(path, text)));
        self
    }

    /// Report every whole-word occurrence of each of `identifiers` in a registered document
    pub fn with_identifiers(mut self, path: impl AsRef<Path>, identifiers: &[&str]) -> Self {
        let path = path.as_ref();
        let Some(document) = self.documents.get(path).cloned() else {
            return self;
        };
        let mut spans = Vec::new();
        for identifier in identifiers {
            let pattern = regex::Regex::new(&crate::usages::search::word_pattern(identifier))
                .expect("identifier pattern is valid");
            for found in pattern.find_iter(document.text()) {
                spans.push(Occurrence::new(
                    document.position_at(found.start()),
                    document.position_at(found.end()),
                ));
            }
        }
        spans.sort_by(|a, b| a.start.cmp(&b.start));
        self.occurrences
            .entry(path.to_path_buf())
            .or_default()
            .extend(spans);
        self
    }

    /// Report exactly these occurrences for a document
    pub fn with_occurrences(mut self, path: impl Into<PathBuf>, occurrences: Vec<Occurrence>) -> Self {
        self.occurrences.insert(path.into(), occurrences);
        self
    }

    /// Make the identifier at `at` resolve to `definition`
    pub fn with_definition(mut self, at: Position, definition: Position) -> Self {
        self.definitions.insert(at, definition);
        self
    }

    pub fn push_count(&self) -> usize {
        self.pushes
    }

    pub fn pop_count(&self) -> usize {
        self.pops
    }

    /// Every position a definition was asked for, in order
    pub fn resolved_positions(&self) -> &[Position] {
        &self.resolved
    }
}

#[async_trait]
impl SemanticService for ScriptedSemantic {
    fn views(&self) -> &ViewStack {
        &self.views
    }

    fn views_mut(&mut self) -> &mut ViewStack {
        &mut self.views
    }

    async fn document(&mut self, path: &Path) -> std::io::Result<Arc<Document>> {
        self.documents.get(path).cloned().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no scripted document {}", path.display()),
            )
        })
    }

    async fn occurrences(&mut self) -> Vec<Occurrence> {
        self.views
            .current()
            .and_then(|view| self.occurrences.get(&view.file))
            .cloned()
            .unwrap_or_default()
    }

    async fn definition_at_cursor(&mut self) -> Result<Position, ResolveError> {
        let view = self.views.current().cloned().ok_or(ResolveError::NoView)?;
        self.resolved.push(view.clone());
        self.definitions
            .get(&view)
            .cloned()
            .ok_or(ResolveError::NoResolution(view))
    }

    fn push_view(&mut self, position: Position) {
        self.pushes += 1;
        self.views.push(position);
    }

    fn pop_view(&mut self) -> Option<Position> {
        self.pops += 1;
        self.views.pop()
    }
}

/// Search tool replaying fixed output, or failing.
#[derive(Debug, Clone)]
pub struct CannedSearch {
    result: Result<String, String>,
    requests: Arc<Mutex<Vec<SearchRequest>>>,
}

impl CannedSearch {
    /// Succeed with `output` as the tool's stdout
    pub fn new(output: &str) -> Self {
        Self {
            result: Ok(output.to_string()),
            requests: Arc::default(),
        }
    }

    /// Fail as if the tool exited with status 2 and printed `stderr`
    pub fn failing(stderr: &str) -> Self {
        Self {
            result: Err(stderr.to_string()),
            requests: Arc::default(),
        }
    }

    /// Requests launched so far
    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

impl TextSearch for CannedSearch {
    fn launch(&self, request: SearchRequest) -> SearchHandle {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        let result = self.result.clone();
        SearchHandle::spawn(async move {
            result
                .map(SearchOutput::new)
                .map_err(|stderr| SearchError::ToolFailed {
                    status: "exit code 2".to_string(),
                    stderr,
                })
        })
    }
}
