//! `tether check`: validate a definition and summarize what it declares.

use std::path::Path;

use anyhow::{Context, Result};
use tether_native::{LibraryDefinition, NativeIndex};

pub fn run(definition: &Path) -> Result<()> {
    let (def, index) = load(definition)?;
    print!("{}", summary(&def, &index));
    Ok(())
}

/// Load a definition file and build its index.
pub fn load(definition: &Path) -> Result<(LibraryDefinition, NativeIndex)> {
    let def = LibraryDefinition::load(definition)
        .with_context(|| format!("loading {}", definition.display()))?;
    let index = def
        .build_index()
        .with_context(|| format!("indexing {}", definition.display()))?;
    Ok((def, index))
}

fn summary(def: &LibraryDefinition, index: &NativeIndex) -> String {
    let opaque = index.structs().filter(|(_, d)| d.is_opaque()).count();
    let records = index.structs().count();
    let mut out = format!("Library '{}' ({})\n", def.library.name, def.library.language);
    out.push_str(&format!("  indexer:   {}\n", def.library.indexer_args().join(" ")));
    let unit = def.library.translation_unit();
    if !unit.is_empty() {
        out.push_str("  translation unit:\n");
        for line in unit.lines() {
            out.push_str(&format!("    {line}\n"));
        }
    }
    out.push_str(&format!("  records:   {records} ({opaque} opaque)\n"));
    out.push_str(&format!("  enums:     {}\n", index.enums().count()));
    out.push_str(&format!("  typedefs:  {}\n", index.typedefs().count()));
    out.push_str(&format!("  constants: {}\n", index.constants().len()));
    out.push_str(&format!("  functions: {}\n", index.functions().len()));
    for f in index.functions() {
        let variadic = if f.is_vararg { " (variadic)" } else { "" };
        out.push_str(&format!("    {}{variadic}\n", f.name));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_declarations() {
        let def = LibraryDefinition::parse(
            r#"
[library]
name = "demo"

[[structs]]
name = "Handle"

[[functions]]
prototype = "struct Handle* open_handle(const char *path)"

[[functions]]
prototype = "int log_line(const char *fmt, ...)"
"#,
        )
        .unwrap();
        let index = def.build_index().unwrap();
        let text = summary(&def, &index);
        assert!(text.starts_with("Library 'demo' (C)\n  indexer:   -x c\n  records:"), "{text}");
        assert!(text.contains("records:   1 (1 opaque)"));
        assert!(text.contains("    open_handle\n"));
        assert!(text.contains("    log_line (variadic)\n"));
    }

    #[test]
    fn summary_shows_indexer_input() {
        let def = LibraryDefinition::parse(
            r##"
[library]
name = "shapes"
language = "Objective-C"
includes = ["shapes.h"]
preamble = ["#define SHAPES_API"]
compiler-args = ["-I/opt/shapes"]
"##,
        )
        .unwrap();
        let index = def.build_index().unwrap();
        let text = summary(&def, &index);
        assert!(text.starts_with(
            "Library 'shapes' (Objective-C)
  indexer:   -x objective-c -I/opt/shapes
  translation unit:
    #define SHAPES_API
    #include <shapes.h>
"
        ));
    }

    #[test]
    fn load_reports_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.def.toml");
        std::fs::write(&path, "[library]\nname = \"\"\n").unwrap();
        let err = load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("broken.def.toml"));
    }
}
