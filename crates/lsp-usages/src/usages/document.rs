use super::position::Position;
use std::path::{Path, PathBuf};

/// Text of a project file, indexed by line for offset/position conversion.
#[derive(Debug, Clone)]
pub struct Document {
    path: PathBuf,
    text: String,
    /// Byte offset of the start of each line
    line_starts: Vec<usize>,
}

impl Document {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        let text = text.into();
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(idx, _)| idx + 1))
            .collect();
        Self {
            path: path.into(),
            text,
            line_starts,
        }
    }

    /// Read a document from disk
    pub async fn load(path: &Path) -> std::io::Result<Self> {
        let text = tokio::fs::read_to_string(path).await?;
        Ok(Self::new(path, text))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Text of a 1-based line without its terminator (`\n` or `\r\n`)
    pub fn line(&self, line: u32) -> Option<&str> {
        let idx = (line as usize).checked_sub(1)?;
        let start = *self.line_starts.get(idx)?;
        let end = self
            .line_starts
            .get(idx + 1)
            .map(|next| next - 1)
            .unwrap_or(self.text.len());
        let raw = &self.text[start..end];
        Some(raw.strip_suffix('\r').unwrap_or(raw))
    }

    /// Position of a byte offset; offsets past the end clamp to the end
    pub fn position_at(&self, offset: usize) -> Position {
        let offset = offset.min(self.text.len());
        let idx = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        Position::new(
            self.path.clone(),
            idx as u32 + 1,
            (offset - self.line_starts[idx]) as u32,
        )
    }

    /// Byte offset of a position in this document
    ///
    /// Returns None when the line does not exist or the column lies past the
    /// end of the line.
    pub fn offset_of(&self, position: &Position) -> Option<usize> {
        let idx = (position.line as usize).checked_sub(1)?;
        let start = *self.line_starts.get(idx)?;
        let len = self.line(position.line)?.len();
        let column = position.column as usize;
        (column <= len).then_some(start + column)
    }

    /// Text between two byte offsets, if both fall on character boundaries
    pub fn slice(&self, start: usize, end: usize) -> Option<&str> {
        self.text.get(start..end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Document {
        Document::new("/p/a.ml", text)
    }

    #[test]
    fn test_lines_strip_terminators() {
        let d = doc("let a = 1\r\nlet b = 2\n\nend");
        assert_eq!(d.line(1), Some("let a = 1"));
        assert_eq!(d.line(2), Some("let b = 2"));
        assert_eq!(d.line(3), Some(""));
        assert_eq!(d.line(4), Some("end"));
        assert_eq!(d.line(5), None);
        assert_eq!(d.line(0), None);
    }

    #[test]
    fn test_position_at_and_back() {
        let d = doc("let a = 1\nlet count = a\n");
        let offset = d.text().find("count").unwrap();
        let pos = d.position_at(offset);
        assert_eq!(pos, Position::new("/p/a.ml", 2, 4));
        assert_eq!(d.offset_of(&pos), Some(offset));
    }

    #[test]
    fn test_position_at_line_start_and_end() {
        let d = doc("ab\ncd");
        assert_eq!(d.position_at(0), Position::new("/p/a.ml", 1, 0));
        assert_eq!(d.position_at(3), Position::new("/p/a.ml", 2, 0));
        assert_eq!(d.position_at(99), Position::new("/p/a.ml", 2, 2));
    }

    #[test]
    fn test_offset_of_rejects_out_of_range() {
        let d = doc("ab\ncd");
        assert_eq!(d.offset_of(&Position::new("/p/a.ml", 3, 0)), None);
        assert_eq!(d.offset_of(&Position::new("/p/a.ml", 1, 3)), None);
        assert_eq!(d.offset_of(&Position::new("/p/a.ml", 1, 2)), Some(2));
    }

    #[test]
    fn test_empty_document() {
        let d = doc("");
        assert_eq!(d.line(1), Some(""));
        assert_eq!(d.position_at(0), Position::new("/p/a.ml", 1, 0));
    }
}
