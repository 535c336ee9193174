use super::document::Document;
use super::error::FinderError;
use super::position::{IdentifierReference, Occurrence};
use super::semantic::{SemanticService, definition_of};
use std::path::PathBuf;
use tracing::debug;

/// The identifier token containing the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierAtCursor {
    pub identifier: String,
    pub occurrence: Occurrence,
}

/// Pick the occurrence whose half-open span `[start, end)` contains `offset`.
///
/// First match wins if the service ever reports overlapping spans. Spans that
/// do not map onto the document text are ignored.
pub fn select_occurrence(
    document: &Document,
    occurrences: &[Occurrence],
    offset: usize,
) -> Option<IdentifierAtCursor> {
    occurrences.iter().find_map(|occurrence| {
        let start = document.offset_of(&occurrence.start)?;
        let end = document.offset_of(&occurrence.end)?;
        if !(start..end).contains(&offset) {
            return None;
        }
        let identifier = document.slice(start, end)?;
        Some(IdentifierAtCursor {
            identifier: identifier.to_string(),
            occurrence: occurrence.clone(),
        })
    })
}

/// Identifier at byte `offset` of the document in the current view
pub async fn identifier_at_cursor<S>(
    service: &mut S,
    offset: usize,
) -> Result<IdentifierAtCursor, FinderError>
where
    S: SemanticService + ?Sized,
{
    let Some(view) = service.current_view().cloned() else {
        return Err(FinderError::NoIdentifierAtCursor {
            file: PathBuf::new(),
            offset,
        });
    };
    let document = service
        .document(&view.file)
        .await
        .map_err(|source| FinderError::Document {
            path: view.file.clone(),
            source,
        })?;
    let occurrences = service.occurrences().await;
    debug!(
        file = %view.file.display(),
        occurrences = occurrences.len(),
        offset,
        "looking up identifier at cursor"
    );

    select_occurrence(&document, &occurrences, offset).ok_or(FinderError::NoIdentifierAtCursor {
        file: view.file,
        offset,
    })
}

/// Identifier at the cursor together with its definition site.
///
/// The definition is what the service resolves the occurrence to. When it
/// cannot (usually because the cursor already sits on the definition), the
/// occurrence itself is taken as the definition site.
pub async fn reference_at_cursor<S>(
    service: &mut S,
    offset: usize,
) -> Result<IdentifierReference, FinderError>
where
    S: SemanticService + ?Sized,
{
    let found = identifier_at_cursor(service, offset).await?;
    let origin = service
        .current_view()
        .cloned()
        .unwrap_or_else(|| found.occurrence.start.clone());

    let definition = match definition_of(service, found.occurrence.start.clone()).await {
        Ok(definition) => definition,
        Err(err) => {
            debug!(
                identifier = %found.identifier,
                "definition of cursor identifier unresolved ({err}), using the occurrence itself"
            );
            found.occurrence.start.clone()
        }
    };

    Ok(IdentifierReference {
        identifier: found.identifier,
        definition,
        origin,
    })
}
