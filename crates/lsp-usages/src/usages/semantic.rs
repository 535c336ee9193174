//! Query interface over the semantic analysis service.
//!
//! The service only looks at one document at a time: whichever document the
//! current view is on. Navigation is a LIFO stack of views so every lookup can
//! be undone.

use super::document::Document;
use super::error::ResolveError;
use super::position::{Occurrence, Position};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// LIFO stack of view positions; the top is the current view.
#[derive(Debug, Default, Clone)]
pub struct ViewStack {
    views: Vec<Position>,
}

impl ViewStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, position: Position) {
        self.views.push(position);
    }

    /// Undo the most recent push; popping an empty stack is a no-op
    pub fn pop(&mut self) -> Option<Position> {
        let popped = self.views.pop();
        if popped.is_none() {
            debug!("pop_view on empty view stack");
        }
        popped
    }

    pub fn current(&self) -> Option<&Position> {
        self.views.last()
    }

    pub fn depth(&self) -> usize {
        self.views.len()
    }

    /// Drop every view above `depth` and make `position` the current view.
    ///
    /// Calling it again with the same arguments leaves the stack unchanged.
    pub fn restore(&mut self, depth: usize, position: &Position) {
        self.views.truncate(depth);
        self.views.push(position.clone());
    }
}

/// The three primitives the usage finder needs from a semantic service.
#[async_trait]
pub trait SemanticService: Send {
    fn views(&self) -> &ViewStack;

    fn views_mut(&mut self) -> &mut ViewStack;

    /// Load (or fetch the already loaded) text of a project file
    async fn document(&mut self, path: &Path) -> std::io::Result<Arc<Document>>;

    /// Identifier spans the service knows about in the current view's document.
    ///
    /// Empty when there is no view or the service has no data.
    async fn occurrences(&mut self) -> Vec<Occurrence>;

    /// Definition site of the identifier under the current view's cursor
    async fn definition_at_cursor(&mut self) -> Result<Position, ResolveError>;

    fn push_view(&mut self, position: Position) {
        self.views_mut().push(position);
    }

    fn pop_view(&mut self) -> Option<Position> {
        self.views_mut().pop()
    }

    fn current_view(&self) -> Option<&Position> {
        self.views().current()
    }
}

/// Resolve what the identifier at `position` points to.
///
/// Navigates there, asks for the definition and navigates back; the pop
/// happens whether or not resolution succeeded.
pub async fn definition_of<S>(service: &mut S, position: Position) -> Result<Position, ResolveError>
where
    S: SemanticService + ?Sized,
{
    service.push_view(position);
    let resolved = service.definition_at_cursor().await;
    service.pop_view();
    resolved
}
