//! XDG-compliant path resolution for knowtree.
//!
//! Only two locations matter: the config directory holding `config.toml` and
//! the cache directory where exported HTML pages land by default.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Errors from path resolution.
#[derive(Debug, Error, Diagnostic)]
pub enum PathError {
    #[error("cannot determine home directory")]
    #[diagnostic(
        code(knowtree::paths::no_home),
        help("Set the HOME environment variable, or pass --config explicitly.")
    )]
    NoHome,

    #[error("failed to create directory: {path}")]
    #[diagnostic(
        code(knowtree::paths::create_dir),
        help("Check that the parent directory exists and you have write permissions.")
    )]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type PathResult<T> = std::result::Result<T, PathError>;

const APP_DIR: &str = "knowtree";

/// Global directories for knowtree.
#[derive(Debug, Clone)]
pub struct KnowtreePaths {
    /// `$XDG_CONFIG_HOME/knowtree/`
    pub config_dir: PathBuf,
    /// `$XDG_CACHE_HOME/knowtree/`
    pub cache_dir: PathBuf,
}

impl KnowtreePaths {
    /// Resolve XDG directories from environment variables with standard fallbacks.
    pub fn resolve() -> PathResult<Self> {
        let home = std::env::var("HOME")
            .map(PathBuf::from)
            .map_err(|_| PathError::NoHome)?;

        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".config"))
            .join(APP_DIR);

        let cache_dir = std::env::var("XDG_CACHE_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".cache"))
            .join(APP_DIR);

        Ok(Self {
            config_dir,
            cache_dir,
        })
    }

    /// Path to the config file.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Directory for exported mind-map pages.
    pub fn exports_dir(&self) -> PathBuf {
        self.cache_dir.join("exports")
    }

    /// Default export path for a topic: a filesystem-safe slug under `exports_dir`.
    pub fn export_file(&self, topic: &str) -> PathBuf {
        self.exports_dir().join(format!("{}.html", slug(topic)))
    }

    /// Create the export directory. Idempotent.
    pub fn ensure_exports_dir(&self) -> PathResult<PathBuf> {
        let dir = self.exports_dir();
        std::fs::create_dir_all(&dir).map_err(|e| PathError::CreateDir {
            path: dir.display().to_string(),
            source: e,
        })?;
        Ok(dir)
    }
}

/// Lowercase alphanumerics (Unicode letters kept) joined by single dashes.
pub fn slug(topic: &str) -> String {
    let mut out = String::with_capacity(topic.len());
    for c in topic.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            out.push(c);
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    if out.is_empty() {
        out.push_str("mindmap");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_paths_use_app_dir() {
        // Reads the real environment without mutating it (unsafe in edition 2024).
        let paths = KnowtreePaths::resolve().unwrap();
        assert!(paths.config_dir.ends_with(APP_DIR));
        assert!(paths.cache_dir.ends_with(APP_DIR));
    }

    #[test]
    fn files_derive_from_dirs() {
        let paths = KnowtreePaths {
            config_dir: PathBuf::from("/cfg/knowtree"),
            cache_dir: PathBuf::from("/cache/knowtree"),
        };
        assert_eq!(paths.config_file(), PathBuf::from("/cfg/knowtree/config.toml"));
        assert_eq!(
            paths.export_file("Revolução Francesa"),
            PathBuf::from("/cache/knowtree/exports/revolução-francesa.html")
        );
    }

    #[test]
    fn slug_collapses_separators() {
        assert_eq!(slug("  Física  Quântica!! "), "física-quântica");
        assert_eq!(slug("???"), "mindmap");
        assert_eq!(slug("C++ & Rust"), "c-rust");
    }
}
