//! Confirmation of lexical matches.
//!
//! Each search result line is resolved through the semantic service and kept
//! only if it points at the same definition as the identifier under the
//! cursor. Lines are processed strictly in the order the search reported them.

use super::error::ResolveError;
use super::position::{IdentifierReference, Position};
use super::search::ResultLine;
use super::semantic::{SemanticService, definition_of};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, warn};

/// A lexical match, not yet confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    /// The line as the search tool printed it
    pub raw: String,
    pub position: Position,
    /// Matched line text
    pub text: String,
}

impl Candidate {
    pub fn parse(raw: &str, root: &Path) -> Option<Self> {
        let line = ResultLine::parse(raw)?;
        Some(Self {
            raw: raw.to_string(),
            position: line.position(root),
            text: line.text,
        })
    }
}

/// Why a candidate was dropped.
#[derive(Debug)]
pub enum Rejection {
    /// Resolved to some other definition
    ResolvesElsewhere(Position),
    Unresolved(ResolveError),
}

#[derive(Debug)]
pub struct RejectedCandidate {
    pub candidate: Candidate,
    pub reason: Rejection,
}

/// Result of filtering one search output.
#[derive(Debug, Default)]
pub struct FilterOutcome {
    /// Confirmed usages, in search output order
    pub confirmed: Vec<Candidate>,
    pub rejected: Vec<RejectedCandidate>,
    /// Non-blank lines after the first result that did not parse
    pub unparseable: Vec<String>,
    /// Lines skipped before the first result
    pub header_lines: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterState {
    SkippingHeader,
    Filtering,
    Done,
}

/// Line-driven filter over one search output.
pub struct ResultFilter<'a> {
    reference: &'a IdentifierReference,
    root: &'a Path,
    state: FilterState,
    outcome: FilterOutcome,
}

impl<'a> ResultFilter<'a> {
    pub fn new(reference: &'a IdentifierReference, root: &'a Path) -> Self {
        Self {
            reference,
            root,
            state: FilterState::SkippingHeader,
            outcome: FilterOutcome::default(),
        }
    }

    pub fn state(&self) -> FilterState {
        self.state
    }

    /// Feed the next line of search output
    pub async fn feed<S>(&mut self, service: &mut S, raw: &str)
    where
        S: SemanticService + ?Sized,
    {
        let candidate = Candidate::parse(raw, self.root);
        match (self.state, candidate) {
            (FilterState::Done, _) => {
                debug!("line after end of results ignored: {raw:?}");
            }
            (FilterState::SkippingHeader, None) => {
                self.outcome.header_lines += 1;
            }
            (FilterState::Filtering, None) => {
                if !raw.trim().is_empty() {
                    warn!("unparseable search result line: {raw:?}");
                    self.outcome.unparseable.push(raw.to_string());
                }
            }
            (FilterState::SkippingHeader | FilterState::Filtering, Some(candidate)) => {
                self.state = FilterState::Filtering;
                self.judge(service, candidate).await;
            }
        }
    }

    async fn judge<S>(&mut self, service: &mut S, candidate: Candidate)
    where
        S: SemanticService + ?Sized,
    {
        match definition_of(service, candidate.position.clone()).await {
            Ok(definition) if definition == self.reference.definition => {
                debug!(candidate = %candidate.position, "confirmed usage");
                self.outcome.confirmed.push(candidate);
            }
            Ok(definition) => {
                debug!(
                    candidate = %candidate.position,
                    resolved = %definition,
                    "rejected: resolves elsewhere"
                );
                self.outcome.rejected.push(RejectedCandidate {
                    candidate,
                    reason: Rejection::ResolvesElsewhere(definition),
                });
            }
            // the definition site itself often resolves to nothing
            Err(err) if candidate.position == self.reference.definition => {
                debug!(candidate = %candidate.position, "confirmed definition site ({err})");
                self.outcome.confirmed.push(candidate);
            }
            Err(err) => {
                debug!(candidate = %candidate.position, "rejected: {err}");
                self.outcome.rejected.push(RejectedCandidate {
                    candidate,
                    reason: Rejection::Unresolved(err),
                });
            }
        }
    }

    /// End of output reached; later lines are ignored
    pub fn finish(&mut self) -> FilterOutcome {
        self.state = FilterState::Done;
        std::mem::take(&mut self.outcome)
    }
}

/// Filter a complete search output against `reference`
pub async fn filter_results<S>(
    service: &mut S,
    reference: &IdentifierReference,
    root: &Path,
    output: &str,
) -> FilterOutcome
where
    S: SemanticService + ?Sized,
{
    let mut filter = ResultFilter::new(reference, root);
    for line in output.lines() {
        filter.feed(service, line).await;
    }
    filter.finish()
}
