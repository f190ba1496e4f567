//! Project configuration (`kiln.toml`) and build mode.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

/// Environment variable consulted for the build mode.
pub const MODE_ENV_VAR: &str = "NODE_ENV";

/// Environment variable holding the TinyPNG API key.
pub const TINYPNG_KEY_ENV_VAR: &str = "TINYPNG_APIKEY";

/// Whether output is optimized for iteration or for shipping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
    /// Unminified output, raw image copies
    #[default]
    Development,

    /// Minified stylesheets and scripts, compressed images
    Production,
}

impl BuildMode {
    /// Interpret an `env`/`NODE_ENV` value.
    ///
    /// Only `production` selects production; anything else is development.
    pub fn from_env_value(value: &str) -> Self {
        if value.trim() == "production" {
            BuildMode::Production
        } else {
            BuildMode::Development
        }
    }

    /// Resolve the mode from an explicit value, falling back to `NODE_ENV`.
    pub fn resolve(explicit: Option<&str>) -> Self {
        match explicit {
            Some(value) => Self::from_env_value(value),
            None => std::env::var(MODE_ENV_VAR)
                .map(|v| Self::from_env_value(&v))
                .unwrap_or_default(),
        }
    }

    pub fn is_production(self) -> bool {
        self == BuildMode::Production
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BuildMode::Development => "development",
            BuildMode::Production => "production",
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildMode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_env_value(s))
    }
}

/// Configuration file structure (kiln.toml).
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct SiteConfig {
    #[serde(default)]
    pub site: SiteSection,
    #[serde(default)]
    pub styles: StylesSection,
    #[serde(default)]
    pub images: ImagesSection,
    #[serde(default)]
    pub tinypng: TinyPngSettings,
    #[serde(default)]
    pub server: ServerSection,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SiteSection {
    /// Source root
    #[serde(default = "default_src")]
    pub src: PathBuf,

    /// Output directory name (the theme name)
    #[serde(default = "default_output")]
    pub output: PathBuf,

    /// Sub-path under the output directory where documents are written
    #[serde(default)]
    pub document_path: String,
}

impl Default for SiteSection {
    fn default() -> Self {
        Self {
            src: default_src(),
            output: default_output(),
            document_path: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StylesSection {
    /// Browserslist queries used for vendor prefixing
    #[serde(default = "default_browsers")]
    pub browsers: Vec<String>,

    /// Extra directories searched by `@use` and `@import`
    #[serde(default)]
    pub load_paths: Vec<PathBuf>,
}

impl Default for StylesSection {
    fn default() -> Self {
        Self {
            browsers: default_browsers(),
            load_paths: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ImagesSection {
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

impl Default for ImagesSection {
    fn default() -> Self {
        Self {
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

/// Third-party PNG compression. The key is never read from the file.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct TinyPngSettings {
    #[serde(default)]
    pub enabled: bool,
}

impl TinyPngSettings {
    /// API key from the environment, if set and non-empty.
    pub fn key(&self) -> Option<String> {
        std::env::var(TINYPNG_KEY_ENV_VAR)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }

    /// Key to use when the integration is both enabled and configured.
    pub fn active_key(&self) -> Option<String> {
        if self.enabled {
            self.key()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_true")]
    pub open: bool,
    /// Path opened in the browser on start
    #[serde(default)]
    pub start_path: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            open: true,
            start_path: String::new(),
        }
    }
}

fn default_src() -> PathBuf {
    PathBuf::from("src")
}
fn default_output() -> PathBuf {
    PathBuf::from("dist")
}
fn default_browsers() -> Vec<String> {
    vec![
        "last 2 versions".to_string(),
        "edge >= 14".to_string(),
        "ie >= 11".to_string(),
    ]
}
fn default_jpeg_quality() -> u8 {
    80
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_true() -> bool {
    true
}

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {message}")]
    ReadError { path: String, message: String },

    #[error("Failed to parse {path}: {message}")]
    ParseError { path: String, message: String },
}

impl SiteConfig {
    /// Load configuration from `path` if it exists.
    /// Returns an error if the file exists but is malformed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No {} found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let config = Self::parse(&content).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::testing::env_lock;
    use tempfile::tempdir;

    #[test]
    fn only_production_selects_production() {
        assert_eq!(BuildMode::from_env_value("production"), BuildMode::Production);
        assert_eq!(BuildMode::from_env_value("development"), BuildMode::Development);
        assert_eq!(BuildMode::from_env_value("staging"), BuildMode::Development);
        assert_eq!(BuildMode::from_env_value(""), BuildMode::Development);
        assert!(BuildMode::Production.is_production());
        assert!(!BuildMode::Development.is_production());
    }

    #[test]
    fn explicit_mode_wins() {
        assert_eq!(BuildMode::resolve(Some("production")), BuildMode::Production);
        assert_eq!(BuildMode::resolve(Some("dev")), BuildMode::Development);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let temp = tempdir().unwrap();
        let config = SiteConfig::load(&temp.path().join("kiln.toml")).unwrap();

        assert_eq!(config, SiteConfig::default());
        assert_eq!(config.site.output, PathBuf::from("dist"));
        assert_eq!(config.images.jpeg_quality, 80);
        assert_eq!(config.styles.browsers.len(), 3);
        assert!(!config.tinypng.enabled);
    }

    #[test]
    fn parses_partial_config() {
        let config = SiteConfig::parse(
            r#"
[site]
output = "theme"
document_path = "docs"

[server]
port = 8080
"#,
        )
        .unwrap();

        assert_eq!(config.site.output, PathBuf::from("theme"));
        assert_eq!(config.site.document_path, "docs");
        assert_eq!(config.site.src, PathBuf::from("src"));
        assert_eq!(config.server.port, 8080);
        assert!(config.server.open);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("kiln.toml");
        fs::write(&path, "[site\noutput = ").unwrap();

        let result = SiteConfig::load(&path);

        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn disabled_tinypng_has_no_active_key() {
        let _env = env_lock();
        std::env::set_var(TINYPNG_KEY_ENV_VAR, "secret");

        let settings = TinyPngSettings { enabled: false };
        let active = settings.active_key();

        std::env::remove_var(TINYPNG_KEY_ENV_VAR);
        assert!(active.is_none());
    }

    #[test]
    fn enabled_tinypng_needs_a_non_blank_key() {
        let _env = env_lock();
        let settings = TinyPngSettings { enabled: true };

        std::env::remove_var(TINYPNG_KEY_ENV_VAR);
        assert!(settings.active_key().is_none());

        std::env::set_var(TINYPNG_KEY_ENV_VAR, "   ");
        assert!(settings.active_key().is_none());

        std::env::set_var(TINYPNG_KEY_ENV_VAR, "secret");
        let active = settings.active_key();

        std::env::remove_var(TINYPNG_KEY_ENV_VAR);
        assert_eq!(active.as_deref(), Some("secret"));
    }

    #[test]
    fn resolve_falls_back_to_node_env() {
        let _env = env_lock();
        let previous = std::env::var(MODE_ENV_VAR).ok();

        std::env::set_var(MODE_ENV_VAR, "production");
        let from_env = BuildMode::resolve(None);
        let overridden = BuildMode::resolve(Some("development"));

        std::env::set_var(MODE_ENV_VAR, "staging");
        let unknown = BuildMode::resolve(None);

        std::env::remove_var(MODE_ENV_VAR);
        let unset = BuildMode::resolve(None);

        if let Some(value) = previous {
            std::env::set_var(MODE_ENV_VAR, value);
        }
        assert_eq!(from_env, BuildMode::Production);
        assert_eq!(overridden, BuildMode::Development);
        assert_eq!(unknown, BuildMode::Development);
        assert_eq!(unset, BuildMode::Development);
    }
}
