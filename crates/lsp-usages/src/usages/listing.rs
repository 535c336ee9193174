use super::filter::Candidate;
use super::position::Position;
use super::search::ResultLine;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Confirmed usages rendered as a navigable `file:line:column:text` listing.
///
/// Paths are relative to the project root and columns are 1-based, the same
/// shape ripgrep prints, so editors that jump to grep output can follow it.
#[derive(Debug, Clone)]
pub struct Listing {
    root: PathBuf,
    entries: Vec<Candidate>,
}

#[derive(Debug, Serialize)]
struct UsageRecord<'a> {
    file: String,
    line: u32,
    column: u32,
    text: &'a str,
}

impl Listing {
    pub fn new(root: impl Into<PathBuf>, entries: Vec<Candidate>) -> Self {
        Self {
            root: root.into(),
            entries,
        }
    }

    pub fn entries(&self) -> &[Candidate] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render one entry as a listing line
    pub fn render_entry(&self, entry: &Candidate) -> String {
        format!(
            "{}:{}:{}:{}",
            entry.position.relative_to(&self.root).display(),
            entry.position.line,
            entry.position.column + 1,
            entry.text
        )
    }

    /// JSON array of `{file, line, column, text}` with the same coordinates as the text listing
    pub fn to_json(&self) -> serde_json::Result<String> {
        let records: Vec<UsageRecord<'_>> = self
            .entries
            .iter()
            .map(|entry| UsageRecord {
                file: entry.position.relative_to(&self.root).display().to_string(),
                line: entry.position.line,
                column: entry.position.column + 1,
                text: &entry.text,
            })
            .collect();
        serde_json::to_string_pretty(&records)
    }
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{}", self.render_entry(entry))?;
        }
        Ok(())
    }
}

/// Jump target of one listing line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub target: Position,
    pub text: String,
}

impl ListingEntry {
    /// Read a listing line back; relative paths resolve against `root`
    pub fn parse(line: &str, root: &Path) -> Option<Self> {
        let parsed = ResultLine::parse(line)?;
        Some(Self {
            target: parsed.position(root),
            text: parsed.text,
        })
    }
}
