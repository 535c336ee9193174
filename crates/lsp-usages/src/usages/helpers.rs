use async_lsp::lsp_types::Url;
use percent_encoding::percent_decode_str;
use std::path::{Path, PathBuf};

/// Convert a URI to a PathBuf
///
/// `file:` URIs go through the platform conversion. Other schemes fall back to
/// the percent-decoded URI path so a definition inside e.g. a virtual document
/// still yields a comparable (if never equal) position.
pub fn uri_to_path(uri: &Url) -> Option<PathBuf> {
    if uri.scheme() == "file" {
        return uri.to_file_path().ok();
    }
    let path = decode_uri_component(uri.path());
    if path.is_empty() {
        None
    } else {
        Some(PathBuf::from(path))
    }
}

/// Convert an absolute path to a `file:` URI
pub fn path_to_uri(path: &Path) -> Option<Url> {
    Url::from_file_path(path).ok()
}

/// Decode percent-encoded strings (e.g., "my%20file.ml" -> "my file.ml")
///
/// Handles invalid encoding gracefully by returning the original string.
pub fn decode_uri_component(s: &str) -> String {
    percent_decode_str(s)
        .decode_utf8()
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| s.to_string())
}

/// Convert a byte column in a line to UTF-16 code units
///
/// Columns past the end of the line, or inside a multi-byte character, count
/// only the characters that start before them.
pub fn byte_col_to_utf16(line: &str, byte_col: usize) -> u32 {
    line.char_indices()
        .take_while(|(idx, _)| *idx < byte_col)
        .map(|(_, c)| c.len_utf16())
        .sum::<usize>() as u32
}

/// Convert a UTF-16 character offset in a line to a byte column
pub fn utf16_to_byte_col(line: &str, utf16: u32) -> usize {
    let mut units = 0u32;
    for (idx, c) in line.char_indices() {
        if units >= utf16 {
            return idx;
        }
        units += c.len_utf16() as u32;
    }
    line.len()
}
