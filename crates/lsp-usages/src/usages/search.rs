//! Project-wide lexical search through ripgrep.
//!
//! Launching a search returns a [`SearchHandle`]; the caller awaits it to get
//! the raw output once the process has exited.

use super::error::SearchError;
use super::position::Position;
use regex::Regex;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// `file:line:column:text`, as printed by `rg --vimgrep`
static RESULT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<file>.+?):(?P<line>\d+):(?P<column>\d+):(?P<text>.*)$")
        .expect("result line pattern is valid")
});

/// Build a pattern matching `identifier` only as a whole word.
///
/// A `\b` is added on each side whose outer character is a word character, so
/// `foo` matches in `x.foo(1)` but not in `foobar` or `myfoo`.
pub fn word_pattern(identifier: &str) -> String {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let leading = identifier.chars().next().is_some_and(is_word);
    let trailing = identifier.chars().last().is_some_and(is_word);
    format!(
        "{}{}{}",
        if leading { r"\b" } else { "" },
        regex::escape(identifier),
        if trailing { r"\b" } else { "" }
    )
}

/// What to search for and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub pattern: String,
    pub file_glob: String,
    pub root: PathBuf,
}

impl SearchRequest {
    pub fn for_identifier(identifier: &str, file_glob: &str, root: &Path) -> Self {
        Self {
            pattern: word_pattern(identifier),
            file_glob: file_glob.to_string(),
            root: root.to_path_buf(),
        }
    }
}

/// Raw output of a finished search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOutput {
    pub text: String,
    pub exit_message: String,
}

impl SearchOutput {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            exit_message: "finished".to_string(),
        }
    }
}

/// A search in flight. Await [`SearchHandle::wait`] for its output.
#[derive(Debug)]
pub struct SearchHandle {
    task: JoinHandle<Result<SearchOutput, SearchError>>,
}

impl SearchHandle {
    /// Run `search` on the tokio runtime and hand back its handle
    pub fn spawn<F>(search: F) -> Self
    where
        F: Future<Output = Result<SearchOutput, SearchError>> + Send + 'static,
    {
        Self {
            task: tokio::spawn(search),
        }
    }

    pub async fn wait(self) -> Result<SearchOutput, SearchError> {
        match self.task.await {
            Ok(result) => result,
            Err(err) => {
                warn!("search task failed: {err}");
                Err(SearchError::Interrupted)
            }
        }
    }
}

/// An external text search tool.
pub trait TextSearch: Send + Sync {
    fn launch(&self, request: SearchRequest) -> SearchHandle;
}

/// ripgrep, spawned once per search.
#[derive(Debug, Clone)]
pub struct Ripgrep {
    program: String,
}

impl Default for Ripgrep {
    fn default() -> Self {
        Self::new("rg")
    }
}

impl Ripgrep {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Command-line arguments for a request; the process runs inside `request.root`
    ///
    /// `--vimgrep` prints one line per match, so a line with the identifier
    /// twice yields two candidates.
    pub fn args(request: &SearchRequest) -> Vec<String> {
        [
            "--vimgrep",
            "--with-filename",
            "--color",
            "never",
            "--glob",
            request.file_glob.as_str(),
            "--regexp",
            request.pattern.as_str(),
            ".",
        ]
        .into_iter()
        .map(str::to_string)
        .collect()
    }

    async fn run(program: String, request: SearchRequest) -> Result<SearchOutput, SearchError> {
        let args = Self::args(&request);
        debug!(program = %program, root = %request.root.display(), ?args, "launching search");

        let output = Command::new(&program)
            .args(&args)
            .current_dir(&request.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| SearchError::Launch {
                program: program.clone(),
                source,
            })?;

        interpret_exit(output.status.code(), &output.stdout, &output.stderr)
    }
}

impl TextSearch for Ripgrep {
    fn launch(&self, request: SearchRequest) -> SearchHandle {
        SearchHandle::spawn(Self::run(self.program.clone(), request))
    }
}

/// ripgrep exits 0 with matches, 1 without; anything else is a failure
pub(crate) fn interpret_exit(
    code: Option<i32>,
    stdout: &[u8],
    stderr: &[u8],
) -> Result<SearchOutput, SearchError> {
    let text = String::from_utf8_lossy(stdout).into_owned();
    match code {
        Some(0) => Ok(SearchOutput {
            text,
            exit_message: "finished".to_string(),
        }),
        Some(1) => Ok(SearchOutput {
            text,
            exit_message: "finished with no matches".to_string(),
        }),
        other => Err(SearchError::ToolFailed {
            status: other
                .map(|c| format!("exit code {c}"))
                .unwrap_or_else(|| "a signal".to_string()),
            stderr: String::from_utf8_lossy(stderr).trim().to_string(),
        }),
    }
}

/// One match line of search output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultLine {
    /// Path as printed, relative to the search root
    pub file: PathBuf,
    pub line: u32,
    /// 1-based byte column, as printed
    pub column: u32,
    pub text: String,
}

impl ResultLine {
    /// Parse a `file:line:column:text` line; None for anything else
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        let caps = RESULT_LINE.captures(raw)?;
        let line: u32 = caps["line"].parse().ok()?;
        let column: u32 = caps["column"].parse().ok()?;
        if line == 0 {
            return None;
        }
        let file = &caps["file"];
        let file = file.strip_prefix("./").unwrap_or(file);
        Some(Self {
            file: PathBuf::from(file),
            line,
            column,
            text: caps["text"].to_string(),
        })
    }

    /// Position of the match, with the file resolved against `root`
    pub fn position(&self, root: &Path) -> Position {
        Position::new(root.join(&self.file), self.line, self.column.saturating_sub(1))
    }
}
