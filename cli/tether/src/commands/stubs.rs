//! `tether stubs` and `tether trampoline`.

use std::path::Path;

use anyhow::{bail, Context, Result};
use tether_bridge::{
    DeclarationMapper, MappingBridgeGenerator, SimpleBridgeGenerator, StubGenerator, StubReport,
};
use tether_native::{FunctionType, Prototype};

use crate::Format;

/// Generate stubs for every function in `definition`.
pub fn run(definition: &Path, format: Format, output: Option<&Path>) -> Result<()> {
    let (def, index) = super::check::load(definition)?;
    tracing::debug!(
        definition = %definition.display(),
        functions = index.functions().len(),
        "definition indexed"
    );
    let mapper = DeclarationMapper::new(&index);
    let simple = SimpleBridgeGenerator;
    let stubs = StubGenerator::new(MappingBridgeGenerator::new(&index, &mapper, &simple));

    let report = stubs.library(&def.library);
    let rendered = match format {
        Format::Text => render_text(&report),
        Format::Json => report.to_json()?,
    };

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &rendered)
                .with_context(|| format!("writing {}", path.display()))?;
            eprintln!(
                "Generated {} stubs for '{}' ({} skipped) → {}",
                report.stubs.len(),
                report.library,
                report.skipped.len(),
                path.display()
            );
        }
        None => print!("{rendered}"),
    }
    Ok(())
}

/// Generate a native trampoline with the signature of `prototype` that
/// forwards to the managed function `target`.
pub fn trampoline(definition: &Path, prototype: &str, target: &str) -> Result<()> {
    let (_, index) = super::check::load(definition)?;
    let proto = Prototype::parse(prototype, &index)
        .with_context(|| format!("parsing prototype '{prototype}'"))?;
    if proto.is_vararg {
        bail!("variadic callbacks cannot be bridged: {prototype}");
    }

    let mapper = DeclarationMapper::new(&index);
    let simple = SimpleBridgeGenerator;
    let stubs = StubGenerator::new(MappingBridgeGenerator::new(&index, &mapper, &simple));
    let fn_type = FunctionType {
        param_types: proto.parameters.iter().map(|p| p.ty.clone()).collect(),
        return_type: Box::new(proto.return_type.clone()),
    };
    let stub = stubs.callback_trampoline(&proto.name, &fn_type, target)?;
    print!("{}", stub.render());
    Ok(())
}

fn render_text(report: &StubReport) -> String {
    let mut out = format!("// Stubs for {}\n", report.library);
    for stub in &report.stubs {
        out.push('\n');
        out.push_str(&stub.render());
    }
    if !report.skipped.is_empty() {
        out.push('\n');
        for skipped in &report.skipped {
            out.push_str(&format!("// skipped {}: {}\n", skipped.name, skipped.reason));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEMO: &str = r#"
[library]
name = "demo"

[[functions]]
prototype = "int32_t add(int32_t a, int32_t b)"

[[functions]]
prototype = "int log_line(const char *fmt, ...)"
"#;

    #[test]
    fn writes_text_report() {
        let dir = tempfile::tempdir().unwrap();
        let definition = dir.path().join("demo.def.toml");
        std::fs::write(&definition, DEMO).unwrap();
        let output = dir.path().join("out").join("demo.kt");

        run(&definition, Format::Text, Some(&output)).unwrap();

        let text = std::fs::read_to_string(&output).unwrap();
        assert!(text.starts_with("// Stubs for demo\n\nfun add(a: Int, b: Int): Int {\n"));
        assert!(text.contains("@SymbolName("));
        assert!(text.contains("// skipped log_line: unsupported shape: 'log_line' is variadic\n"));
    }

    #[test]
    fn writes_json_report() {
        let dir = tempfile::tempdir().unwrap();
        let definition = dir.path().join("demo.def.toml");
        std::fs::write(&definition, DEMO).unwrap();
        let output = dir.path().join("demo.json");

        run(&definition, Format::Json, Some(&output)).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(json["stubs"][0]["name"], "add");
        assert_eq!(json["skipped"][0]["name"], "log_line");
    }

    #[test]
    fn missing_definition_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(&dir.path().join("absent.def.toml"), Format::Text, None).unwrap_err();
        assert!(format!("{err:#}").contains("absent.def.toml"));
    }
}
