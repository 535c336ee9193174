use super::position::Position;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of one invocation of the usage finder.
#[derive(Debug, Error)]
pub enum FinderError {
    #[error("No identifier at cursor ({file}, byte offset {offset})")]
    NoIdentifierAtCursor { file: PathBuf, offset: usize },

    #[error("Line {line}, column {column} is outside {file}")]
    InvalidCursor {
        file: PathBuf,
        line: u32,
        column: u32,
    },

    #[error("No project root found above {0}")]
    NoProjectRoot(PathBuf),

    #[error("Cannot read document {path}: {source}")]
    Document {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Semantic(#[from] SemanticError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Failure of the external text search.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Failed to launch search tool `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Search tool exited with {status}: {stderr}")]
    ToolFailed { status: String, stderr: String },

    #[error("Search task ended before reporting a result")]
    Interrupted,
}

/// Why a position could not be resolved to a definition.
///
/// Inside the filter every variant means "not a usage".
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Nothing to resolve at {0}")]
    NoResolution(Position),

    #[error("Cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Semantic request failed: {0}")]
    Request(String),

    #[error("No active view")]
    NoView,
}

/// Failure to start or talk to the semantic service.
#[derive(Debug, Error)]
pub enum SemanticError {
    #[error("Failed to launch language server `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Language server handshake failed: {0}")]
    Handshake(String),

    #[error("Language server main loop failed: {0}")]
    MainLoop(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("No language server configured for `.{0}` files")]
    NoServer(String),
}
