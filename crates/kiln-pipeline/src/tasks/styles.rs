//! Stylesheet lint-fix and compilation.

use std::fs;
use std::path::Path;

use lightningcss::rules::media::MediaRule;
use lightningcss::rules::CssRule;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};

use super::{run_files, write_output, Outcome, TaskContext, TaskError, TaskReport};
use crate::layout::AssetClass;

pub(crate) const LINT_CACHE: &str = "stylelint";

/// Normalize whitespace the way a `--fix` lint pass would.
///
/// Trailing whitespace is stripped, blank-line runs collapse to one, leading
/// blank lines go, and the text ends in exactly one newline.
pub fn lint_fix(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut blank_run = 0;

    for line in source.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 || out.is_empty() {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }

    while out.ends_with("\n\n") {
        out.pop();
    }
    out
}

/// 1-based line numbers that use `!important`.
pub fn important_lines(source: &str) -> Vec<usize> {
    source
        .lines()
        .enumerate()
        .filter(|(_, l)| l.contains("!important"))
        .map(|(i, _)| i + 1)
        .collect()
}

/// Lint and fix every stylesheet in place, partials included.
///
/// A file is only revisited when its content changed since the last lint.
pub fn lint(ctx: &TaskContext<'_>) -> TaskReport {
    let files = ctx.layout.files(AssetClass::Styles);

    run_files("stylelint", &files, ctx.notifier, |path| {
        let source = fs::read_to_string(path)?;
        if !ctx.cache.changed(LINT_CACHE, path, source.as_bytes()) {
            return Ok(Outcome::Skipped);
        }

        for line in important_lines(&source) {
            ctx.notifier
                .warn("stylelint", path, format!("line {}: avoid !important", line));
        }

        let fixed = lint_fix(&source);
        if fixed == source {
            return Ok(Outcome::Skipped);
        }

        // Recorded before the write so the watcher can tell this rewrite from an edit
        ctx.cache.changed(LINT_CACHE, path, fixed.as_bytes());
        if let Err(e) = fs::write(path, &fixed) {
            ctx.cache.forget(LINT_CACHE, path);
            return Err(e.into());
        }
        tracing::debug!("Fixed {}", path.display());
        Ok(Outcome::Written)
    })
}

/// Resolve browserslist queries into lightningcss targets.
pub fn resolve_browsers(queries: &[String]) -> Option<Browsers> {
    if queries.is_empty() {
        return None;
    }

    match Browsers::from_browserslist(queries) {
        Ok(browsers) => browsers,
        Err(e) => {
            tracing::warn!("Ignoring invalid browser targets: {}", e);
            None
        }
    }
}

/// Move top-level `@media` blocks after the plain rules, merging blocks that
/// share a query. Blocks keep the order their query first appeared in.
pub fn pack_media_queries<'i, R>(rules: &mut Vec<CssRule<'i, R>>) {
    let mut packed: Vec<MediaRule<'i, R>> = Vec::new();

    for rule in std::mem::take(rules) {
        match rule {
            CssRule::Media(media) => match packed.iter_mut().find(|m| m.query == media.query) {
                Some(existing) => existing.rules.0.extend(media.rules.0),
                None => packed.push(media),
            },
            other => rules.push(other),
        }
    }

    rules.extend(packed.into_iter().map(CssRule::Media));
}

/// Pack media queries, prefix for the given browsers and print, minified or
/// expanded.
pub fn postprocess_css(
    css: &str,
    filename: &str,
    browsers: Option<Browsers>,
    minify: bool,
) -> Result<String, String> {
    let mut stylesheet = StyleSheet::parse(
        css,
        ParserOptions {
            filename: filename.to_string(),
            ..ParserOptions::default()
        },
    )
    .map_err(|e| format!("CSS parse error: {}", e))?;

    pack_media_queries(&mut stylesheet.rules.0);

    stylesheet
        .minify(MinifyOptions {
            targets: Targets {
                browsers,
                ..Targets::default()
            },
            ..MinifyOptions::default()
        })
        .map_err(|e| format!("CSS transform error: {}", e))?;

    let printed = stylesheet
        .to_css(PrinterOptions {
            minify,
            targets: Targets {
                browsers,
                ..Targets::default()
            },
            ..PrinterOptions::default()
        })
        .map_err(|e| format!("CSS print error: {}", e))?;

    Ok(printed.code)
}

/// Compile one stylesheet source to CSS text.
fn compile_file(
    ctx: &TaskContext<'_>,
    source: &Path,
    browsers: Option<Browsers>,
) -> Result<String, TaskError> {
    let layout = ctx.layout;

    let mut options = grass::Options::default()
        .style(grass::OutputStyle::Expanded)
        .load_path(&layout.styles_src);
    for extra in &ctx.config.styles.load_paths {
        options = options.load_path(layout.root.join(extra));
    }
    options = options.load_path(layout.root.join("node_modules"));

    let css = grass::from_path(source, &options).map_err(|e| TaskError::Style(e.to_string()))?;

    let filename = source
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or("style.css");

    postprocess_css(&css, filename, browsers, ctx.mode.is_production()).map_err(TaskError::Style)
}

/// Compile every non-partial stylesheet.
pub fn compile(ctx: &TaskContext<'_>) -> TaskReport {
    let sources = ctx.layout.sources(AssetClass::Styles);
    let browsers = resolve_browsers(&ctx.config.styles.browsers);

    run_files("sass", &sources, ctx.notifier, |source| {
        let dest = ctx
            .layout
            .destination(AssetClass::Styles, source)
            .ok_or_else(|| TaskError::NoDestination(source.to_path_buf()))?;

        let css = compile_file(ctx, source, browsers)?;
        write_output(&dest, css)?;
        Ok(Outcome::Written)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::testing::{write, Fixture};
    use crate::BuildMode;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn fixes_whitespace() {
        let source = "\n\na {  \n  color: red;\t\n\n\n\n}\n\n";

        assert_eq!(lint_fix(source), "a {\n  color: red;\n\n}\n");
    }

    #[test]
    fn clean_source_is_unchanged() {
        let source = "a {\n  color: red;\n}\n";
        assert_eq!(lint_fix(source), source);
    }

    #[test]
    fn finds_important() {
        let source = "a {\n  color: red !important;\n}\n";
        assert_eq!(important_lines(source), vec![2]);
    }

    #[test]
    fn lint_rewrites_only_changed_files() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        let path = root.join("src/scss/_vars.scss");
        write(&path, "$c: red;   \n\n\n");

        let fixture = Fixture::new(root);
        let ctx = fixture.context(BuildMode::Development);

        let first = lint(&ctx);
        assert_eq!(first.written, 1);
        assert_eq!(fs::read_to_string(&path).unwrap(), "$c: red;\n");

        let second = lint(&ctx);
        assert_eq!(second.written, 0);
        assert_eq!(second.skipped, 1);
    }

    #[test]
    fn minifies_css() {
        let css = "a {\n  color: red;\n}\n";
        let minified = postprocess_css(css, "a.css", None, true).unwrap();

        assert_eq!(minified, "a{color:red}");
    }

    #[test]
    fn merges_media_queries_after_plain_rules() {
        let css = "\
.a { top: 1px; }
@media (min-width: 600px) { .a { top: 2px; } }
.b { top: 3px; }
@media (min-width: 600px) { .b { top: 4px; } }
@media print { .a { top: 5px; } }
";

        let out = postprocess_css(css, "a.css", None, false).unwrap();

        assert_eq!(out.matches("@media").count(), 2);
        assert_eq!(out.matches("600px").count(), 1);
        let media = out.find("600px").unwrap();
        let print = out.find("print").unwrap();
        assert!(out.find("top: 1px").unwrap() < media);
        assert!(out.find("top: 3px").unwrap() < media);
        assert!(out.find("top: 2px").unwrap() > media);
        assert!(out.find("top: 4px").unwrap() > media);
        assert!(print > out.find("top: 4px").unwrap());
        assert!(out.find("top: 5px").unwrap() > print);
    }

    #[test]
    fn lint_rewrite_is_recorded_as_linted() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        let path = root.join("src/scss/style.scss");
        write(&path, "a {  \n  color: red;\n}\n\n\n");

        let fixture = Fixture::new(root);
        lint(&fixture.context(BuildMode::Development));

        let fixed = fs::read(&path).unwrap();
        assert!(fixture.cache.matches(LINT_CACHE, &path, &fixed));

        fs::write(&path, "a { color: blue; }\n").unwrap();
        let edited = fs::read(&path).unwrap();
        assert!(!fixture.cache.matches(LINT_CACHE, &path, &edited));
    }

    #[test]
    fn adds_vendor_prefixes_for_old_browsers() {
        let browsers = resolve_browsers(&["safari 8".to_string()]);
        let css = ".a { user-select: none; }";

        let out = postprocess_css(css, "a.css", browsers, false).unwrap();

        assert!(out.contains("-webkit-user-select: none"));
    }

    #[test]
    fn compiles_scss_with_partials() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        write(&root.join("src/scss/_vars.scss"), "$main: #ff0000;\n");
        write(
            &root.join("src/scss/style.scss"),
            "@import 'vars';\n.btn { .icon { color: $main; } }\n",
        );

        let fixture = Fixture::new(root);
        let report = compile(&fixture.context(BuildMode::Development));

        assert_eq!(report.written, 1);
        let css = fs::read_to_string(root.join("dist/assets/css/style.css")).unwrap();
        assert!(css.contains(".btn .icon"));
        assert!(css.contains('\n'));
        assert!(!root.join("dist/assets/css/_vars.css").exists());
    }

    #[test]
    fn production_output_is_minified() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        write(&root.join("src/scss/style.scss"), ".a {\n  color: blue;\n}\n");

        let fixture = Fixture::new(root);
        compile(&fixture.context(BuildMode::Production));

        let css = fs::read_to_string(root.join("dist/assets/css/style.css")).unwrap();
        assert!(!css.contains('\n'));
        assert!(css.contains(".a{color:#00f}"));
    }

    #[test]
    fn syntax_errors_are_reported() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        write(&root.join("src/scss/broken.scss"), ".a { color: $missing; }");

        let fixture = Fixture::new(root);
        let report = compile(&fixture.context(BuildMode::Development));

        assert_eq!(report.failed, 1);
        assert_eq!(fixture.notifier.failures(), 1);
    }
}
