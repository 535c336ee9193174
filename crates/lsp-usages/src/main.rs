//! lsp-usages: list every real usage of the identifier under a cursor
//!
//! Matches come from ripgrep; each one is kept only if the language server
//! resolves it to the same definition as the identifier under the cursor.

use clap::{ArgGroup, Parser, ValueEnum};
use lsp_usages::config::{DEFAULT_ROOT_MARKERS, FinderConfig, SearchSection, ServerSection, find_project_root};
use lsp_usages::usages::document::Document;
use lsp_usages::{Cursor, FinderError, LspSemantic, Ripgrep, UsageFinder, Usages};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "lsp-usages")]
#[command(about = "Find every usage of the identifier at a cursor, confirmed by a language server", long_about = None)]
#[command(version)]
#[command(group(ArgGroup::new("cursor").required(true).args(["offset", "line"])))]
struct Cli {
    /// Document containing the cursor
    file: PathBuf,

    /// Byte offset of the cursor in the document
    #[arg(short, long)]
    offset: Option<usize>,

    /// 1-based line of the cursor
    #[arg(short, long, requires = "column")]
    line: Option<u32>,

    /// 1-based byte column of the cursor
    #[arg(short, long, requires = "line")]
    column: Option<u32>,

    /// Project root; found from root markers when omitted
    #[arg(long)]
    root: Option<PathBuf>,

    /// File or directory marking a project root (repeatable)
    #[arg(long = "root-marker")]
    root_markers: Vec<String>,

    /// Language server command
    #[arg(long)]
    server: Option<String>,

    /// Argument passed to the language server (repeatable)
    #[arg(long = "server-arg", allow_hyphen_values = true)]
    server_args: Vec<String>,

    /// Language id sent with opened documents
    #[arg(long)]
    language_id: Option<String>,

    /// Glob restricting which files are searched
    #[arg(long)]
    glob: Option<String>,

    /// ripgrep binary
    #[arg(long)]
    rg: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "grep")]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// `file:line:column:text`, one usage per line
    Grep,
    /// JSON array of `{file, line, column, text}`
    Json,
}

impl Cli {
    /// Command-line settings, layered over the config file
    fn overrides(&self) -> FinderConfig {
        FinderConfig {
            server: ServerSection {
                command: self.server.clone(),
                args: (!self.server_args.is_empty()).then(|| self.server_args.clone()),
                language_id: self.language_id.clone(),
                ..Default::default()
            },
            search: SearchSection {
                ripgrep: self.rg.clone(),
                file_glob: self.glob.clone(),
            },
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lsp_usages=info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("lsp-usages: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<(), FinderError> {
    let file = canonical(&cli.file)?;
    let root = project_root(cli, &file)?;
    info!(root = %root.display(), file = %file.display(), "project root");

    let config = FinderConfig::load(&root)?.merge(cli.overrides());
    let resolved = config.resolve(&file)?;
    debug!(?resolved, "configuration");

    let cursor = match (cli.offset, cli.line, cli.column) {
        (Some(offset), _, _) => Cursor::new(&file, offset),
        (None, Some(line), Some(column)) => {
            let document = Document::load(&file)
                .await
                .map_err(|source| FinderError::Document {
                    path: file.clone(),
                    source,
                })?;
            Cursor::from_line_column(&document, line, column)?
        }
        // clap requires one of the two forms
        _ => Cursor::new(&file, 0),
    };

    let semantic = LspSemantic::start(&resolved.server, &root).await?;
    let mut finder = UsageFinder::new(
        semantic,
        Ripgrep::new(resolved.ripgrep.clone()),
        root,
        resolved.file_glob.clone(),
    );
    let result = finder.find_usages(&cursor).await;

    let (semantic, _) = finder.into_parts();
    if let Err(err) = semantic.shutdown().await {
        warn!("language server did not shut down cleanly: {err}");
    }

    let usages = result?;
    print_usages(&usages, cli.format);
    Ok(())
}

fn canonical(path: &Path) -> Result<PathBuf, FinderError> {
    path.canonicalize().map_err(|source| FinderError::Document {
        path: path.to_path_buf(),
        source,
    })
}

fn project_root(cli: &Cli, file: &Path) -> Result<PathBuf, FinderError> {
    if let Some(root) = &cli.root {
        return canonical(root);
    }
    let found = if cli.root_markers.is_empty() {
        find_project_root(file, DEFAULT_ROOT_MARKERS)
    } else {
        find_project_root(file, cli.root_markers.as_slice())
    };
    found.ok_or_else(|| FinderError::NoProjectRoot(file.to_path_buf()))
}

fn print_usages(usages: &Usages, format: OutputFormat) {
    match format {
        OutputFormat::Grep => print!("{}", usages.listing),
        OutputFormat::Json => match usages.listing.to_json() {
            Ok(json) => println!("{json}"),
            Err(err) => error!("failed to serialize usages: {err}"),
        },
    }
    eprintln!(
        "{} usage(s) of `{}` ({} rejected, {} unparseable search line(s))",
        usages.listing.len(),
        usages.reference.identifier,
        usages.rejected,
        usages.unparseable
    );
}
