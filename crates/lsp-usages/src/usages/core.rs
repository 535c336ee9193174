use super::document::Document;
use super::error::FinderError;
use super::filter::{FilterOutcome, filter_results};
use super::listing::Listing;
use super::position::{IdentifierReference, Position};
use super::resolver::reference_at_cursor;
use super::search::{SearchRequest, TextSearch};
use super::semantic::SemanticService;
use std::path::{Path, PathBuf};
use tracing::info;

/// Where the user asked for usages: a document and a byte offset into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub file: PathBuf,
    pub offset: usize,
}

impl Cursor {
    pub fn new(file: impl Into<PathBuf>, offset: usize) -> Self {
        Self {
            file: file.into(),
            offset,
        }
    }

    /// Cursor at a 1-based line and 1-based byte column of `document`
    pub fn from_line_column(document: &Document, line: u32, column: u32) -> Result<Self, FinderError> {
        let invalid = || FinderError::InvalidCursor {
            file: document.path().to_path_buf(),
            line,
            column,
        };
        let position = Position::new(document.path(), line, column.checked_sub(1).ok_or_else(invalid)?);
        let offset = document.offset_of(&position).ok_or_else(invalid)?;
        Ok(Self::new(document.path(), offset))
    }
}

/// Result of one invocation.
#[derive(Debug)]
pub struct Usages {
    pub reference: IdentifierReference,
    pub listing: Listing,
    /// Candidates the semantic service did not confirm
    pub rejected: usize,
    /// Search output lines that were neither header nor results
    pub unparseable: usize,
}

/// UsageFinder locates every usage of the identifier under a cursor.
///
/// It resolves the identifier, searches the project for its spelling, and
/// keeps only the matches the semantic service resolves to the same
/// definition.
pub struct UsageFinder<S, T> {
    semantic: S,
    search: T,
    root: PathBuf,
    file_glob: String,
}

impl<S, T> UsageFinder<S, T>
where
    S: SemanticService,
    T: TextSearch,
{
    pub fn new(semantic: S, search: T, root: impl Into<PathBuf>, file_glob: impl Into<String>) -> Self {
        Self {
            semantic,
            search,
            root: root.into(),
            file_glob: file_glob.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn semantic(&self) -> &S {
        &self.semantic
    }

    pub fn into_parts(self) -> (S, T) {
        (self.semantic, self.search)
    }

    /// Locate usages of the identifier at `cursor`.
    ///
    /// The view ends on the cursor position on every path out of here,
    /// including failures before the search starts.
    pub async fn find_usages(&mut self, cursor: &Cursor) -> Result<Usages, FinderError> {
        let document = self
            .semantic
            .document(&cursor.file)
            .await
            .map_err(|source| FinderError::Document {
                path: cursor.file.clone(),
                source,
            })?;
        let origin = document.position_at(cursor.offset);

        let base_depth = self.semantic.views().depth();
        self.semantic.push_view(origin.clone());

        let result = self.locate_and_filter(cursor.offset).await;

        self.semantic.views_mut().restore(base_depth, &origin);
        result
    }

    async fn locate_and_filter(&mut self, offset: usize) -> Result<Usages, FinderError> {
        let reference = reference_at_cursor(&mut self.semantic, offset).await?;
        info!(
            identifier = %reference.identifier,
            definition = %reference.definition,
            "searching for usages"
        );

        let request = SearchRequest::for_identifier(&reference.identifier, &self.file_glob, &self.root);
        let output = self.search.launch(request).wait().await?;
        info!(exit = %output.exit_message, "search complete");

        let FilterOutcome {
            confirmed,
            rejected,
            unparseable,
            ..
        } = filter_results(&mut self.semantic, &reference, &self.root, &output.text).await;

        info!(
            identifier = %reference.identifier,
            confirmed = confirmed.len(),
            rejected = rejected.len(),
            "filtered candidates"
        );

        Ok(Usages {
            listing: Listing::new(self.root.clone(), confirmed),
            rejected: rejected.len(),
            unparseable: unparseable.len(),
            reference,
        })
    }
}
