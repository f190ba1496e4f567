//! Script processing.
//!
//! Every file under the scripts dir is parsed so syntax errors surface at
//! build time, then re-printed with a source map next to it. Imports are not
//! inlined, so underscore-prefixed modules are emitted too and relative
//! specifiers keep resolving in the output tree.

use std::fs;
use std::path::{Path, PathBuf};

use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_parser::Parser;
use oxc_span::SourceType;

use super::{run_files, write_output, Outcome, TaskContext, TaskError, TaskReport};
use crate::layout::AssetClass;

/// Printed script and its source map JSON.
#[derive(Debug)]
pub struct ScriptOutput {
    pub code: String,
    pub map: Option<String>,
}

/// Parse `source` and print it back, minified when `minify` is set.
///
/// `path` names the source inside the map and picks the source type.
pub fn process_script(path: &Path, source: &str, minify: bool) -> Result<ScriptOutput, TaskError> {
    let allocator = Allocator::default();
    let source_type = SourceType::from_path(path).unwrap_or_else(|_| SourceType::mjs());

    let parsed = Parser::new(&allocator, source, source_type).parse();
    if parsed.panicked || !parsed.errors.is_empty() {
        let messages: Vec<String> = parsed.errors.iter().map(|e| e.to_string()).collect();
        return Err(TaskError::Script(if messages.is_empty() {
            "parser gave up".to_string()
        } else {
            messages.join("; ")
        }));
    }

    let base = if minify {
        CodegenOptions::minify()
    } else {
        CodegenOptions::default()
    };
    let printed = Codegen::new()
        .with_options(CodegenOptions {
            source_map_path: Some(path.to_path_buf()),
            ..base
        })
        .build(&parsed.program);

    Ok(ScriptOutput {
        code: printed.code,
        map: printed.map.map(|map| map.to_json_string()),
    })
}

/// `main.js` -> `main.js.map`, next to the script.
fn map_path(dest: &Path) -> Option<PathBuf> {
    let mut name = dest.file_name()?.to_os_string();
    name.push(".map");
    Some(dest.with_file_name(name))
}

/// Process every script.
pub fn bundle(ctx: &TaskContext<'_>) -> TaskReport {
    let layout = ctx.layout;
    let sources = layout.sources(AssetClass::Scripts);
    let minify = ctx.mode.is_production();

    run_files("scripts", &sources, ctx.notifier, |source| {
        let dest = layout
            .destination(AssetClass::Scripts, source)
            .ok_or_else(|| TaskError::NoDestination(source.to_path_buf()))?;

        let text = fs::read_to_string(source)?;
        let name = source.strip_prefix(&layout.root).unwrap_or(source);
        let ScriptOutput { mut code, map } = process_script(name, &text, minify)?;

        if let (Some(map), Some(map_dest)) = (map, map_path(&dest)) {
            if !code.ends_with('\n') {
                code.push('\n');
            }
            if let Some(file) = map_dest.file_name() {
                code.push_str(&format!("//# sourceMappingURL={}\n", file.to_string_lossy()));
            }
            write_output(&map_dest, map)?;
        }

        write_output(&dest, code)?;
        Ok(Outcome::Written)
    })
}
