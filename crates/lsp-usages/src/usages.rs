mod core;
pub mod config;
pub mod document;
pub mod error;
pub mod filter;
pub mod helpers;
pub mod listing;
pub mod lsp_client;
pub mod position;
pub mod resolver;
pub mod search;
pub mod semantic;

pub use self::core::{Cursor, UsageFinder, Usages};

#[cfg(test)]
mod tests;

// Test helpers available for integration tests
pub mod test_helpers;
