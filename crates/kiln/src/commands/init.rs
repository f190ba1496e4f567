//! Scaffold a kiln project.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Files written by `kiln init`, relative to the working directory.
const SCAFFOLD: &[(&str, &str)] = &[
    ("kiln.toml", DEFAULT_CONFIG),
    ("src/templates/_layout.html", DEFAULT_LAYOUT),
    ("src/templates/index.html", DEFAULT_INDEX),
    ("src/scss/_variables.scss", DEFAULT_VARIABLES),
    ("src/scss/style.scss", DEFAULT_STYLE),
    ("src/js/main.js", DEFAULT_SCRIPT),
];

/// Directories created even when empty.
const DIRS: &[&str] = &["src/img", "src/fonts"];

/// Run the init command.
pub async fn run(yes: bool) -> Result<()> {
    tracing::info!("Initializing kiln...");
    scaffold(Path::new("."), yes)?;
    tracing::info!("Initialization complete!");
    tracing::info!("Run 'kiln dev' to start the development server.");
    Ok(())
}

/// Write the starter project under `root`, keeping existing files unless `overwrite`.
fn scaffold(root: &Path, overwrite: bool) -> Result<usize> {
    let mut written = 0;

    for (rel, contents) in SCAFFOLD {
        let path = root.join(rel);
        if path.exists() && !overwrite {
            tracing::warn!("{} already exists. Use --yes to overwrite.", rel);
            continue;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("Failed to write {}", rel))?;
        tracing::info!("Created {}", rel);
        written += 1;
    }

    for dir in DIRS {
        fs::create_dir_all(root.join(dir)).with_context(|| format!("Failed to create {}", dir))?;
    }

    Ok(written)
}

const DEFAULT_CONFIG: &str = r#"# Kiln Configuration

[site]
# Source directory
src = "src"

# Output directory
output = "dist"

# Sub-path for pages and their assets inside the output directory
document_path = ""

[styles]
# Browsers to add vendor prefixes for
browsers = ["last 2 versions", "edge >= 14", "ie >= 11"]

[images]
# JPEG quality used in production builds
jpeg_quality = 80

[tinypng]
# Compress src/imgraw/*.png with TinyPNG in production builds.
# The API key is read from TINYPNG_APIKEY.
enabled = false

[server]
port = 3000
open = true
"#;

const DEFAULT_LAYOUT: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{% block title %}Kiln{% endblock %}</title>
  <link rel="stylesheet" href="{{ assets }}css/style.css">
</head>
<body>
  {% block body %}{% endblock %}
  <script src="{{ assets }}js/main.js"></script>
</body>
</html>
"#;

const DEFAULT_INDEX: &str = r#"{% extends "_layout.html" %}
{% block title %}Home{% endblock %}
{% block body %}
  <main class="page">
    <h1>Hello from kiln</h1>
    <p>Built in {{ mode }} mode.</p>
  </main>
{% endblock %}
"#;

const DEFAULT_VARIABLES: &str = r#"$text: #222;
$accent: #d9480f;
"#;

const DEFAULT_STYLE: &str = r#"@import 'variables';

.page {
  color: $text;

  h1 {
    color: $accent;
  }
}
"#;

const DEFAULT_SCRIPT: &str = r#"document.addEventListener('DOMContentLoaded', function () {
  document.documentElement.classList.add('js');
});
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn writes_starter_project() {
        let temp = tempdir().unwrap();

        let written = scaffold(temp.path(), false).unwrap();

        assert_eq!(written, SCAFFOLD.len());
        assert!(temp.path().join("kiln.toml").exists());
        assert!(temp.path().join("src/templates/index.html").exists());
        assert!(temp.path().join("src/img").is_dir());
    }

    #[test]
    fn keeps_existing_files_without_overwrite() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("kiln.toml"), "# mine").unwrap();

        let written = scaffold(temp.path(), false).unwrap();

        assert_eq!(written, SCAFFOLD.len() - 1);
        assert_eq!(
            fs::read_to_string(temp.path().join("kiln.toml")).unwrap(),
            "# mine"
        );
    }

    #[test]
    fn starter_project_builds() {
        use kiln_pipeline::{BuildMode, Pipeline, SiteConfig};

        let temp = tempdir().unwrap();
        scaffold(temp.path(), false).unwrap();

        let config = SiteConfig::load(&temp.path().join("kiln.toml")).unwrap();
        let result = Pipeline::new(temp.path(), config, BuildMode::Production).build();

        assert!(result.is_success(), "{:?}", result.reports);
        let index = fs::read_to_string(temp.path().join("dist/index.html")).unwrap();
        assert!(index.contains("href=\"/assets/css/style.css\""));
        assert!(index.contains("Built in production mode."));
        assert!(temp.path().join("dist/assets/css/style.css").exists());
        assert!(temp.path().join("dist/assets/js/main.js").exists());
    }

    #[test]
    fn default_config_parses() {
        let config = kiln_pipeline::SiteConfig::parse(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.server.port, 3000);
    }
}
