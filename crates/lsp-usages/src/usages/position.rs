use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// A location in a project file.
///
/// `line` is 1-based, `column` is a 0-based byte column within the line.
/// Two positions are equal iff file, line and column are all equal; paths are
/// compared as given, so callers must build them from one consistent root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Position {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(file: impl Into<PathBuf>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    /// Same position with the file path expressed relative to `root`, when it lies under it
    pub fn relative_to(&self, root: &Path) -> PathBuf {
        self.file
            .strip_prefix(root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| self.file.clone())
    }

    /// Convert to an LSP position (0-based line, UTF-16 character)
    ///
    /// `line_text` is the text of this position's line; without it the byte
    /// column is passed through unchanged.
    pub fn to_lsp(&self, line_text: Option<&str>) -> async_lsp::lsp_types::Position {
        let character = match line_text {
            Some(text) => super::helpers::byte_col_to_utf16(text, self.column as usize),
            None => self.column,
        };
        async_lsp::lsp_types::Position {
            line: self.line.saturating_sub(1),
            character,
        }
    }

    /// Build a position from an LSP position in `file`
    pub fn from_lsp(
        file: impl Into<PathBuf>,
        position: async_lsp::lsp_types::Position,
        line_text: Option<&str>,
    ) -> Self {
        let column = match line_text {
            Some(text) => super::helpers::utf16_to_byte_col(text, position.character) as u32,
            None => position.character,
        };
        Self::new(file, position.line + 1, column)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}

/// A span of the open document where an identifier token appears.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub start: Position,
    pub end: Position,
}

impl Occurrence {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }
}

/// The identifier under the cursor and what it resolved to when the invocation started.
///
/// Every candidate is judged against this one value; it is never re-derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierReference {
    pub identifier: String,
    pub definition: Position,
    /// Where the cursor was; the view returns here when the invocation ends
    pub origin: Position,
}
