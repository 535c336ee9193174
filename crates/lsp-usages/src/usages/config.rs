//! Configuration: `.lsp-usages.toml` in the project root, overridden by the command line.

use super::error::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const CONFIG_FILE_NAME: &str = ".lsp-usages.toml";
pub const DEFAULT_RIPGREP: &str = "rg";
pub const DEFAULT_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 250;

/// Files or directories whose presence marks a project root
pub const DEFAULT_ROOT_MARKERS: &[&str] = &[
    ".git",
    "dune-project",
    "Cargo.toml",
    "go.mod",
    "package.json",
    "pyproject.toml",
];

struct KnownServer {
    extensions: &'static [&'static str],
    command: &'static str,
    args: &'static [&'static str],
    language_id: &'static str,
}

const KNOWN_SERVERS: &[KnownServer] = &[
    KnownServer {
        extensions: &["ml", "mli"],
        command: "ocamllsp",
        args: &[],
        language_id: "ocaml",
    },
    KnownServer {
        extensions: &["rs"],
        command: "rust-analyzer",
        args: &[],
        language_id: "rust",
    },
    KnownServer {
        extensions: &["go"],
        command: "gopls",
        args: &[],
        language_id: "go",
    },
    KnownServer {
        extensions: &["py"],
        command: "pylsp",
        args: &[],
        language_id: "python",
    },
    KnownServer {
        extensions: &["ts", "tsx"],
        command: "typescript-language-server",
        args: &["--stdio"],
        language_id: "typescript",
    },
    KnownServer {
        extensions: &["js", "jsx"],
        command: "typescript-language-server",
        args: &["--stdio"],
        language_id: "javascript",
    },
    KnownServer {
        extensions: &["c", "h"],
        command: "clangd",
        args: &[],
        language_id: "c",
    },
    KnownServer {
        extensions: &["cc", "cpp", "hpp"],
        command: "clangd",
        args: &[],
        language_id: "cpp",
    },
];

fn known_server(extension: &str) -> Option<&'static KnownServer> {
    KNOWN_SERVERS
        .iter()
        .find(|server| server.extensions.contains(&extension))
}

/// `[server]` table
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub command: Option<String>,
    pub args: Option<Vec<String>>,
    pub language_id: Option<String>,
    pub initialization_options: Option<serde_json::Value>,
    pub retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
}

/// `[search]` table
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchSection {
    pub ripgrep: Option<String>,
    pub file_glob: Option<String>,
}

/// Configuration as written by the user; every field optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FinderConfig {
    pub server: ServerSection,
    pub search: SearchSection,
}

/// How to start and talk to the language server
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub command: String,
    pub args: Vec<String>,
    pub language_id: String,
    pub initialization_options: Option<serde_json::Value>,
    /// Extra attempts for a failing request while the server warms up
    pub retries: u32,
    pub retry_delay: Duration,
}

/// Configuration with defaults filled in for one document
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub server: ServerConfig,
    pub ripgrep: String,
    pub file_glob: String,
}

impl FinderConfig {
    /// Load `.lsp-usages.toml` from `root`; a missing file means all defaults
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(CONFIG_FILE_NAME);
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                debug!(path = %path.display(), "loading config");
                Self::parse(&text, &path)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read { path, source }),
        }
    }

    pub fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Fields set in `overrides` replace ours
    pub fn merge(self, overrides: FinderConfig) -> Self {
        Self {
            server: ServerSection {
                command: overrides.server.command.or(self.server.command),
                args: overrides.server.args.or(self.server.args),
                language_id: overrides.server.language_id.or(self.server.language_id),
                initialization_options: overrides
                    .server
                    .initialization_options
                    .or(self.server.initialization_options),
                retries: overrides.server.retries.or(self.server.retries),
                retry_delay_ms: overrides.server.retry_delay_ms.or(self.server.retry_delay_ms),
            },
            search: SearchSection {
                ripgrep: overrides.search.ripgrep.or(self.search.ripgrep),
                file_glob: overrides.search.file_glob.or(self.search.file_glob),
            },
        }
    }

    /// Fill defaults from the extension of `document`
    pub fn resolve(&self, document: &Path) -> Result<ResolvedConfig, ConfigError> {
        let extension = document
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        let known = known_server(extension);

        let command = match (&self.server.command, known) {
            (Some(command), _) => command.clone(),
            (None, Some(known)) => known.command.to_string(),
            (None, None) => return Err(ConfigError::NoServer(extension.to_string())),
        };
        // Built-in args only belong to the built-in command
        let args = match (&self.server.args, &self.server.command, known) {
            (Some(args), _, _) => args.clone(),
            (None, None, Some(known)) => known.args.iter().map(|a| a.to_string()).collect(),
            _ => Vec::new(),
        };
        let language_id = self
            .server
            .language_id
            .clone()
            .or_else(|| known.map(|k| k.language_id.to_string()))
            .unwrap_or_else(|| extension.to_string());
        let file_glob = self
            .search
            .file_glob
            .clone()
            .unwrap_or_else(|| format!("*.{extension}"));

        Ok(ResolvedConfig {
            server: ServerConfig {
                command,
                args,
                language_id,
                initialization_options: self.server.initialization_options.clone(),
                retries: self.server.retries.unwrap_or(DEFAULT_RETRIES),
                retry_delay: Duration::from_millis(
                    self.server.retry_delay_ms.unwrap_or(DEFAULT_RETRY_DELAY_MS),
                ),
            },
            ripgrep: self
                .search
                .ripgrep
                .clone()
                .unwrap_or_else(|| DEFAULT_RIPGREP.to_string()),
            file_glob,
        })
    }
}

/// Nearest ancestor directory of `start` (itself included) holding one of `markers`
pub fn find_project_root<S: AsRef<str>>(start: &Path, markers: &[S]) -> Option<PathBuf> {
    let first = if start.is_dir() { Some(start) } else { start.parent() };
    first?
        .ancestors()
        .find(|dir| markers.iter().any(|marker| dir.join(marker.as_ref()).exists()))
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_from_extension() {
        let resolved = FinderConfig::default()
            .resolve(Path::new("/p/lib/a.ml"))
            .unwrap();
        assert_eq!(resolved.server.command, "ocamllsp");
        assert!(resolved.server.args.is_empty());
        assert_eq!(resolved.server.language_id, "ocaml");
        assert_eq!(resolved.file_glob, "*.ml");
        assert_eq!(resolved.ripgrep, "rg");
        assert_eq!(resolved.server.retries, DEFAULT_RETRIES);
    }

    #[test]
    fn test_builtin_args_for_builtin_command() {
        let resolved = FinderConfig::default()
            .resolve(Path::new("/p/src/index.ts"))
            .unwrap();
        assert_eq!(resolved.server.command, "typescript-language-server");
        assert_eq!(resolved.server.args, vec!["--stdio".to_string()]);
    }

    #[test]
    fn test_custom_command_drops_builtin_args() {
        let config = FinderConfig {
            server: ServerSection {
                command: Some("my-ts-server".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let resolved = config.resolve(Path::new("/p/src/index.ts")).unwrap();
        assert_eq!(resolved.server.command, "my-ts-server");
        assert!(resolved.server.args.is_empty());
        assert_eq!(resolved.server.language_id, "typescript");
    }

    #[test]
    fn test_unknown_extension_needs_a_server() {
        let err = FinderConfig::default()
            .resolve(Path::new("/p/model.sysml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::NoServer(ext) if ext == "sysml"));
    }

    #[test]
    fn test_parse_toml() {
        let text = r#"
[server]
command = "ocamllsp"
args = ["--fallback-read-dot-merlin"]
retries = 0

[server.initialization_options]
codelens = { enable = false }

[search]
file_glob = "*.{ml,mli}"
ripgrep = "/usr/local/bin/rg"
"#;
        let config = FinderConfig::parse(text, Path::new(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(config.server.retries, Some(0));
        assert_eq!(
            config.server.initialization_options,
            Some(serde_json::json!({ "codelens": { "enable": false } }))
        );

        let resolved = config.resolve(Path::new("/p/a.ml")).unwrap();
        assert_eq!(resolved.file_glob, "*.{ml,mli}");
        assert_eq!(resolved.ripgrep, "/usr/local/bin/rg");
        assert_eq!(resolved.server.args, vec!["--fallback-read-dot-merlin".to_string()]);
    }

    #[test]
    fn test_parse_rejects_unknown_keys() {
        let err = FinderConfig::parse("[search]\nglob = \"*.ml\"\n", Path::new(CONFIG_FILE_NAME));
        assert!(matches!(err, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_merge_prefers_overrides() {
        let file = FinderConfig {
            search: SearchSection {
                ripgrep: Some("rg-from-file".to_string()),
                file_glob: Some("*.ml".to_string()),
            },
            ..Default::default()
        };
        let cli = FinderConfig {
            search: SearchSection {
                file_glob: Some("*.mli".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let merged = file.merge(cli);
        assert_eq!(merged.search.ripgrep.as_deref(), Some("rg-from-file"));
        assert_eq!(merged.search.file_glob.as_deref(), Some("*.mli"));
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        assert_eq!(FinderConfig::load(dir.path()).unwrap(), FinderConfig::default());
    }

    #[test]
    fn test_load_from_root() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[server]\ncommand = \"ocamllsp\"\n",
        )
        .unwrap();
        let config = FinderConfig::load(dir.path()).unwrap();
        assert_eq!(config.server.command.as_deref(), Some("ocamllsp"));
    }

    #[test]
    fn test_find_project_root_walks_up() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("lib").join("sub");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("dune-project"), "(lang dune 3.0)\n").unwrap();
        let file = nested.join("a.ml");
        std::fs::write(&file, "let x = 1\n").unwrap();

        assert_eq!(
            find_project_root(&file, DEFAULT_ROOT_MARKERS),
            Some(dir.path().to_path_buf())
        );
    }

    #[test]
    fn test_find_project_root_prefers_nearest_marker() {
        let dir = TempDir::new().unwrap();
        let inner = dir.path().join("inner");
        std::fs::create_dir_all(&inner).unwrap();
        std::fs::write(dir.path().join("dune-project"), "").unwrap();
        std::fs::write(inner.join("dune-project"), "").unwrap();

        assert_eq!(find_project_root(&inner.join("a.ml"), &["dune-project"]), Some(inner));
    }

    #[test]
    fn test_find_project_root_none_without_marker() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.ml");
        assert_eq!(find_project_root(&file, &["no-such-marker-file"]), None);
    }
}
