//! Configuration defaults and loading.
//!
//! A project may carry `.sluice.toml` or `.sluice.json` at its root. Every
//! field is optional; missing fields take the defaults below.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::loader::DEFAULT_MAX_FILE_SIZE;
use crate::tokens::Encoding;

/// Project config file names, in lookup order.
pub const CONFIG_FILES: [&str; 2] = [".sluice.toml", ".sluice.json"];

/// Artifact name used when no output path is configured.
pub const DEFAULT_OUTPUT: &str = "sluice-snapshot.txt";

/// Substrings that exclude a path (and prune a directory) in discovery mode.
pub const DEFAULT_DENY: &[&str] = &[
    "node_modules",
    ".git",
    "__pycache__",
    ".vscode",
    "dist",
    "build",
    "coverage",
    ".next",
    ".nuxt",
    "target",
    "package-lock.json",
    "yarn.lock",
    ".env",
    ".ds_store",
    ".min.js",
    ".min.css",
    ".map",
];

/// Extensions kept in discovery mode. Markdown and plain text are opt-in.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "js", "jsx", "ts", "tsx", "py", "json", "html", "css", "scss", "sass", "less", "vue", "php",
    "java", "cpp", "c", "h", "hpp", "cs", "go", "rs", "rb", "swift", "kt", "scala", "r", "m",
    "mm", "toml", "yaml", "yml", "sh", "sql",
];

/// Configuration loading error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML config {path}: {source}")]
    ParseToml {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to parse JSON config {path}: {source}")]
    ParseJson {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to render config: {0}")]
    Render(String),

    #[error("unsupported config format for {0}: .{1}")]
    UnsupportedFormat(String, String),
}

/// Selection and output settings for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Deny-list substrings (discovery mode).
    pub deny: Vec<String>,
    /// Extension allow-list (discovery mode).
    pub extensions: Vec<String>,
    /// Files larger than this many bytes are skipped unread.
    pub max_file_size: u64,
    /// Fixed manifest; when present (even empty) the run uses pinned mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pinned: Option<Vec<String>>,
    /// Top-level directories that must exist under the root.
    pub require: Vec<String>,
    /// Artifact path; relative paths resolve against the root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    pub include_hidden: bool,
    pub respect_gitignore: bool,
    /// Add a project-structure tree to the header.
    pub tree: bool,
    pub count_tokens: bool,
    pub encoding: Encoding,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            deny: DEFAULT_DENY.iter().map(|s| s.to_string()).collect(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            pinned: None,
            require: Vec::new(),
            output: None,
            include_hidden: true,
            respect_gitignore: false,
            tree: false,
            count_tokens: true,
            encoding: Encoding::default(),
        }
    }
}

impl Config {
    /// Load configuration from a `.toml` or `.json` file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.display().to_string(),
            source: e,
        })?;

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "toml" => toml::from_str(&content).map_err(|e| ConfigError::ParseToml {
                path: path.display().to_string(),
                source: e,
            }),
            "json" => serde_json::from_str(&content).map_err(|e| ConfigError::ParseJson {
                path: path.display().to_string(),
                source: e,
            }),
            _ => Err(ConfigError::UnsupportedFormat(
                path.display().to_string(),
                ext,
            )),
        }
    }

    /// Load the project config under `root`, or defaults if there is none.
    ///
    /// A config file that exists but does not parse is an error.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        for name in CONFIG_FILES {
            let path = root.join(name);
            if path.is_file() {
                return Self::from_file(&path);
            }
        }
        Ok(Self::default())
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned.is_some()
    }

    /// Artifact path for a run rooted at `root`.
    pub fn output_path(&self, root: &Path) -> PathBuf {
        match &self.output {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => root.join(path),
            None => root.join(DEFAULT_OUTPUT),
        }
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Render(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Render(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.max_file_size, 1_048_576);
        assert!(config.deny.iter().any(|d| d == "node_modules"));
        assert!(config.extensions.iter().any(|e| e == "js"));
        assert!(!config.extensions.iter().any(|e| e == "md"));
        assert!(!config.is_pinned());
    }

    #[test]
    fn test_load_toml_partial() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(".sluice.toml"),
            "extensions = [\"md\", \"rs\"]\nmax_file_size = 2048\nrequire = [\"server\"]\n",
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.extensions, vec!["md", "rs"]);
        assert_eq!(config.max_file_size, 2048);
        assert_eq!(config.require, vec!["server"]);
        // Untouched fields keep defaults.
        assert_eq!(config.deny, Config::default().deny);
    }

    #[test]
    fn test_load_json_pinned() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(".sluice.json"),
            r#"{"pinned": ["server/index.js", "README.md"], "encoding": "o200k"}"#,
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert!(config.is_pinned());
        assert_eq!(config.encoding, Encoding::O200kBase);
    }

    #[test]
    fn test_empty_pinned_list_still_selects_pinned_mode() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".sluice.toml"), "pinned = []\n").unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert!(config.is_pinned());
        assert_eq!(config.pinned, Some(Vec::new()));
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        assert_eq!(Config::load(dir.path()).unwrap(), Config::default());
    }

    #[test]
    fn test_malformed_config_is_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".sluice.toml"), "max_file_size = \"big\"").unwrap();
        assert!(matches!(
            Config::load(dir.path()),
            Err(ConfigError::ParseToml { .. })
        ));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("c.json");
        fs::write(&path, r#"{"extentions": ["js"]}"#).unwrap();
        assert!(matches!(
            Config::from_file(&path),
            Err(ConfigError::ParseJson { .. })
        ));
    }

    #[test]
    fn test_unsupported_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        fs::write(&path, "").unwrap();
        assert!(matches!(
            Config::from_file(&path),
            Err(ConfigError::UnsupportedFormat(..))
        ));
    }

    #[test]
    fn test_output_path_resolution() {
        let root = Path::new("/project");
        let mut config = Config::default();
        assert_eq!(config.output_path(root), root.join(DEFAULT_OUTPUT));

        config.output = Some("out/snap.txt".into());
        assert_eq!(config.output_path(root), root.join("out/snap.txt"));
    }

    #[test]
    fn test_toml_rendering_parses_back() {
        let config = Config::default();
        let text = config.to_toml().unwrap();
        assert!(text.contains("max_file_size = 1048576"));
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
