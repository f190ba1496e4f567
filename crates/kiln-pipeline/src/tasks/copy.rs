//! Copy of every source file no other task owns (fonts, json, ...).

use std::fs;

use super::{run_files, Outcome, TaskContext, TaskError, TaskReport};
use crate::layout::AssetClass;

pub fn copy_static(ctx: &TaskContext<'_>) -> TaskReport {
    let sources = ctx.layout.sources(AssetClass::Static);

    run_files("copy", &sources, ctx.notifier, |source| {
        let dest = ctx
            .layout
            .destination(AssetClass::Static, source)
            .ok_or_else(|| TaskError::NoDestination(source.to_path_buf()))?;

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(source, &dest)?;
        Ok(Outcome::Written)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::testing::{write, Fixture};
    use crate::BuildMode;
    use tempfile::tempdir;

    #[test]
    fn copies_unowned_files_under_assets() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        write(&root.join("src/fonts/a.woff2"), b"font");
        write(&root.join("src/json/data.json"), "{}");
        write(&root.join("src/templates/index.html"), "<p></p>");
        write(&root.join("src/scss/style.scss"), "a{}");

        let fixture = Fixture::new(root);
        let report = copy_static(&fixture.context(BuildMode::Development));

        assert_eq!(report.written, 2);
        assert_eq!(fs::read(root.join("dist/assets/fonts/a.woff2")).unwrap(), b"font");
        assert!(root.join("dist/assets/json/data.json").exists());
        assert!(!root.join("dist/assets/templates").exists());
        assert!(!root.join("dist/assets/scss").exists());
    }
}
