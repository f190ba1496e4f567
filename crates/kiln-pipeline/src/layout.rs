//! Source and destination layout.
//!
//! Maps the fixed source tree onto the output tree:
//!
//! ```text
//! src/templates/**/*.html  ->  <dest>/<document_path>/**/*.html
//! src/scss/**/*.scss       ->  <dest>/<document_path>/assets/css/**/*.css
//! src/js/**/*.{js,mjs}     ->  <dest>/<document_path>/assets/js/**/*.{js,mjs} (+ .map)
//! src/img/**/*             ->  <dest>/<document_path>/assets/img/**/*
//! src/imgraw/**/*.png      ->  <dest>/<document_path>/assets/img/**/*.png
//! src/** (everything else) ->  <dest>/assets/**
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::SiteConfig;

/// One kind of source asset, each with its own glob, transform and destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetClass {
    Templates,
    Styles,
    Scripts,
    Images,
    Static,
}

impl AssetClass {
    pub const ALL: [AssetClass; 5] = [
        AssetClass::Templates,
        AssetClass::Styles,
        AssetClass::Scripts,
        AssetClass::Images,
        AssetClass::Static,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AssetClass::Templates => "templates",
            AssetClass::Styles => "styles",
            AssetClass::Scripts => "scripts",
            AssetClass::Images => "images",
            AssetClass::Static => "static",
        }
    }

    /// Source extensions this class compiles. `None` accepts any file.
    fn extensions(self) -> Option<&'static [&'static str]> {
        match self {
            AssetClass::Templates => Some(&["html"]),
            AssetClass::Styles => Some(&["scss", "sass", "css"]),
            AssetClass::Scripts => Some(&["js", "mjs"]),
            AssetClass::Images | AssetClass::Static => None,
        }
    }

    /// Whether underscore-prefixed partials are skipped as direct sources.
    ///
    /// Scripts keep theirs: imports are not inlined, so every module ships.
    fn skips_partials(self) -> bool {
        matches!(self, AssetClass::Templates | AssetClass::Styles)
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A path removed by the clean task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanTarget {
    /// Every `*.html` file below this directory, and nothing else
    HtmlUnder(PathBuf),

    /// This whole directory
    Dir(PathBuf),
}

/// Resolved paths for one project.
#[derive(Debug, Clone)]
pub struct Layout {
    /// Project root that relative config paths resolve against
    pub root: PathBuf,
    pub src: PathBuf,
    pub dest: PathBuf,
    pub document_root: PathBuf,
    pub assets_dest: PathBuf,

    pub templates_src: PathBuf,
    pub styles_src: PathBuf,
    pub scripts_src: PathBuf,
    pub images_src: PathBuf,
    pub images_raw: PathBuf,

    pub css_dest: PathBuf,
    pub js_dest: PathBuf,
    pub img_dest: PathBuf,
}

/// True for include-only files such as `_header.html` or `_vars.scss`.
pub fn is_partial(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('_'))
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
}

impl Layout {
    /// Build the layout for a project rooted at `root`.
    pub fn new(root: &Path, config: &SiteConfig) -> Self {
        let src = root.join(&config.site.src);
        let dest = root.join(&config.site.output);

        let document_path = config.site.document_path.trim_matches('/');
        let document_root = if document_path.is_empty() {
            dest.clone()
        } else {
            dest.join(document_path)
        };
        let doc_assets = document_root.join("assets");

        Self {
            templates_src: src.join("templates"),
            styles_src: src.join("scss"),
            scripts_src: src.join("js"),
            images_src: src.join("img"),
            images_raw: src.join("imgraw"),
            css_dest: doc_assets.join("css"),
            js_dest: doc_assets.join("js"),
            img_dest: doc_assets.join("img"),
            assets_dest: dest.join("assets"),
            root: root.to_path_buf(),
            src,
            dest,
            document_root,
        }
    }

    /// Source directory for a class. `Static` owns the whole source root.
    pub fn source_dir(&self, class: AssetClass) -> &Path {
        match class {
            AssetClass::Templates => &self.templates_src,
            AssetClass::Styles => &self.styles_src,
            AssetClass::Scripts => &self.scripts_src,
            AssetClass::Images => &self.images_src,
            AssetClass::Static => &self.src,
        }
    }

    /// Directories owned by a dedicated class, excluded from the static copy.
    fn class_dirs(&self) -> [&Path; 5] {
        [
            &self.templates_src,
            &self.styles_src,
            &self.scripts_src,
            &self.images_src,
            &self.images_raw,
        ]
    }

    /// Map a changed source path to the class whose transform must rerun.
    ///
    /// Partials map to their class too, since other sources include them.
    pub fn classify(&self, path: &Path) -> Option<AssetClass> {
        if path.starts_with(&self.templates_src) {
            return has_extension(path, &["html"]).then_some(AssetClass::Templates);
        }
        if path.starts_with(&self.styles_src) {
            return has_extension(path, &["scss", "sass", "css"]).then_some(AssetClass::Styles);
        }
        if path.starts_with(&self.scripts_src) {
            return has_extension(path, &["js", "mjs"]).then_some(AssetClass::Scripts);
        }
        if path.starts_with(&self.images_src) || path.starts_with(&self.images_raw) {
            return Some(AssetClass::Images);
        }
        if path.starts_with(&self.src) {
            return Some(AssetClass::Static);
        }
        None
    }

    /// Direct sources for a class, sorted for stable output.
    pub fn sources(&self, class: AssetClass) -> Vec<PathBuf> {
        self.files(class)
            .into_iter()
            .filter(|p| !(class.skips_partials() && is_partial(p)))
            .collect()
    }

    /// Every file of a class, partials included.
    pub fn files(&self, class: AssetClass) -> Vec<PathBuf> {
        let root = self.source_dir(class);
        if !root.exists() {
            return Vec::new();
        }

        let class_dirs = self.class_dirs();
        let mut files: Vec<PathBuf> = WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| {
                class != AssetClass::Static || !class_dirs.iter().any(|d| e.path() == *d)
            })
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| class.extensions().is_none_or(|exts| has_extension(p, exts)))
            .collect();

        files.sort();
        files
    }

    /// PNG sources waiting for third-party compression.
    pub fn raw_images(&self) -> Vec<PathBuf> {
        if !self.images_raw.exists() {
            return Vec::new();
        }

        let mut files: Vec<PathBuf> = WalkDir::new(&self.images_raw)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| has_extension(p, &["png"]))
            .collect();

        files.sort();
        files
    }

    /// Output path for a source file of the given class.
    pub fn destination(&self, class: AssetClass, source: &Path) -> Option<PathBuf> {
        match class {
            AssetClass::Templates => {
                let rel = source.strip_prefix(&self.templates_src).ok()?;
                Some(self.document_root.join(rel).with_extension("html"))
            }
            AssetClass::Styles => {
                let rel = source.strip_prefix(&self.styles_src).ok()?;
                Some(self.css_dest.join(rel).with_extension("css"))
            }
            AssetClass::Scripts => {
                let rel = source.strip_prefix(&self.scripts_src).ok()?;
                Some(self.js_dest.join(rel))
            }
            AssetClass::Images => {
                let rel = source
                    .strip_prefix(&self.images_src)
                    .or_else(|_| source.strip_prefix(&self.images_raw))
                    .ok()?;
                Some(self.img_dest.join(rel))
            }
            AssetClass::Static => {
                let rel = source.strip_prefix(&self.src).ok()?;
                Some(self.assets_dest.join(rel))
            }
        }
    }

    /// URL prefix of the assets directory, relative to the site root.
    pub fn assets_url(&self) -> String {
        let rel = self
            .document_root
            .strip_prefix(&self.dest)
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();

        if rel.is_empty() {
            "/assets/".to_string()
        } else {
            format!("/{}/assets/", rel)
        }
    }

    /// Paths removed before every build.
    pub fn clean_targets(&self) -> Vec<CleanTarget> {
        vec![
            CleanTarget::HtmlUnder(self.document_root.clone()),
            CleanTarget::Dir(self.css_dest.clone()),
            CleanTarget::Dir(self.js_dest.clone()),
            CleanTarget::Dir(self.assets_dest.join("fonts")),
            CleanTarget::Dir(self.assets_dest.join("json")),
        ]
    }
}
