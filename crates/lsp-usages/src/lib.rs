//! Identifier usage finder
//!
//! Finds every real usage of the identifier under a cursor by searching the
//! whole project with ripgrep and confirming each match with a language
//! server. Usable from the `lsp-usages` binary or as a library.

pub mod usages;

pub use usages::config;
pub use usages::error::FinderError;
pub use usages::lsp_client::LspSemantic;
pub use usages::search::Ripgrep;
pub use usages::test_helpers;
pub use usages::{Cursor, UsageFinder, Usages};
