//! Function stubs and callback trampolines.
//!
//! Builds complete wrappers on top of [`MappingBridgeGenerator`]: a managed
//! function per native function, and a native trampoline per callback type.
//! [`StubGenerator::library`] isolates failures per declaration, so one
//! unsupported function does not stop the rest of a library.

use std::collections::HashSet;

use serde::Serialize;
use tether_native::{FunctionDecl, FunctionType, LibraryConfig, Type};

use crate::builder::CodeBuilder;
use crate::error::{BridgeError, Result};
use crate::expr::Expr;
use crate::mapping::{MappingBridgeGenerator, TypedValue};
use crate::session::BridgeSession;

/// What a stub wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StubKind {
    /// A managed wrapper around a native function.
    Function,
    /// A native trampoline calling into managed code.
    Callback,
}

/// A generated wrapper and the bridge declarations it relies on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stub {
    pub name: String,
    pub kind: StubKind,
    /// The wrapper itself: managed source for functions, C for callbacks.
    pub wrapper: String,
    pub managed_declarations: Vec<String>,
    pub native_declarations: Vec<String>,
}

impl Stub {
    /// Wrapper followed by every bridge declaration, one blank line apart.
    pub fn render(&self) -> String {
        let mut parts = vec![self.wrapper.trim_end().to_string()];
        parts.extend(self.managed_declarations.iter().cloned());
        parts.extend(self.native_declarations.iter().cloned());
        let mut out = parts.join("\n\n");
        out.push('\n');
        out
    }
}

/// A declaration that could not be bridged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedDeclaration {
    pub name: String,
    pub reason: String,
}

/// The outcome of generating stubs for a whole library.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StubReport {
    pub library: String,
    pub stubs: Vec<Stub>,
    pub skipped: Vec<SkippedDeclaration>,
}

impl StubReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Generates stubs using a mapping generator.
#[derive(Debug, Clone, Copy)]
pub struct StubGenerator<'a> {
    mapping: MappingBridgeGenerator<'a>,
}

impl<'a> StubGenerator<'a> {
    pub fn new(mapping: MappingBridgeGenerator<'a>) -> Self {
        Self { mapping }
    }

    /// A managed function with the native function's signature.
    pub fn function_stub(&self, decl: &FunctionDecl) -> Result<Stub> {
        if decl.is_vararg {
            return Err(BridgeError::unsupported(format!(
                "'{}' is variadic",
                decl.name
            )));
        }

        let mut session = BridgeSession::new(&decl.name);
        let mut params = Vec::with_capacity(decl.parameters.len());
        let mut values = Vec::with_capacity(decl.parameters.len());
        let names = parameter_names(decl.parameters.iter().map(|p| p.name.as_str()));
        for (param, name) in decl.parameters.iter().zip(names) {
            let ty = self.managed_type_name(&param.ty)?;
            params.push(format!("{name}: {ty}"));
            values.push(TypedValue::new(param.ty.clone(), name));
        }
        let return_name = self.managed_return_name(&decl.return_type)?;

        let binary_name = decl.binary_name.as_str();
        let result = self.mapping.managed_to_native(
            &mut session,
            &decl.return_type,
            &values,
            |_native: &mut CodeBuilder, args: &[Expr]| Ok(Expr::call(binary_name, args)),
        )?;
        self.finish_body(session.managed_mut(), &decl.return_type, result)?;

        let fragments = session.into_fragments();
        let wrapper = format!(
            "fun {}({}): {return_name} {{\n{}}}\n",
            decl.name,
            params.join(", "),
            fragments.managed.render_indented(1)
        );
        Ok(Stub {
            name: decl.name.clone(),
            kind: StubKind::Function,
            wrapper,
            managed_declarations: fragments.managed_declarations,
            native_declarations: fragments.native_declarations,
        })
    }

    /// A native function of type `fn_type`, named `name`, that forwards its
    /// arguments to the managed function `target`.
    pub fn callback_trampoline(
        &self,
        name: &str,
        fn_type: &FunctionType,
        target: &str,
    ) -> Result<Stub> {
        let index = self.mapping.index();
        let mut session = BridgeSession::new(name);

        let mut params = Vec::with_capacity(fn_type.param_types.len());
        let mut values = Vec::with_capacity(fn_type.param_types.len());
        for (i, ty) in fn_type.param_types.iter().enumerate() {
            let arg = format!("arg{i}");
            params.push(format!("{} {arg}", index.c_spelling(ty)));
            values.push(TypedValue::new(ty.clone(), arg));
        }
        let params = if params.is_empty() {
            "void".to_string()
        } else {
            params.join(", ")
        };

        let result = self.mapping.native_to_managed(
            &mut session,
            &fn_type.return_type,
            &values,
            |_managed: &mut CodeBuilder, args: &[Expr]| Ok(Expr::call(target, args)),
        )?;
        self.finish_body(session.native_mut(), &fn_type.return_type, result)?;

        let fragments = session.into_fragments();
        let wrapper = format!(
            "{} {name}({params}) {{\n{}}}\n",
            index.c_spelling(&fn_type.return_type),
            fragments.native.render_indented(1)
        );
        Ok(Stub {
            name: name.to_string(),
            kind: StubKind::Callback,
            wrapper,
            managed_declarations: fragments.managed_declarations,
            native_declarations: fragments.native_declarations,
        })
    }

    /// Stubs for every function in the index that `config` does not exclude.
    #[tracing::instrument(level = "debug", skip_all, fields(library = %config.name))]
    pub fn library(&self, config: &LibraryConfig) -> StubReport {
        let mut stubs = Vec::new();
        let mut skipped = Vec::new();

        for decl in self.mapping.index().functions() {
            if config.is_function_excluded(&decl.name) {
                tracing::debug!(function = %decl.name, "excluded by configuration");
                continue;
            }
            match self.function_stub(decl) {
                Ok(stub) => stubs.push(stub),
                Err(e) => {
                    tracing::warn!(function = %decl.name, error = %e, "skipping declaration");
                    skipped.push(SkippedDeclaration {
                        name: decl.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::debug!(generated = stubs.len(), skipped = skipped.len(), "library done");
        StubReport {
            library: config.name.clone(),
            stubs,
            skipped,
        }
    }

    fn is_void(&self, ty: &Type) -> Result<bool> {
        Ok(self.mapping.index().unwrap_typedefs(ty)?.is_void())
    }

    fn managed_type_name(&self, ty: &Type) -> Result<String> {
        Ok(self.mapping.mirrors().mirror(ty)?.managed_type_name())
    }

    fn managed_return_name(&self, ty: &Type) -> Result<String> {
        if self.is_void(ty)? {
            Ok("Unit".to_string())
        } else {
            self.managed_type_name(ty)
        }
    }

    /// Emit the call's result as a statement or a `return`.
    fn finish_body(&self, builder: &mut CodeBuilder, return_type: &Type, result: Expr) -> Result<()> {
        if self.is_void(return_type)? {
            if !result.is_empty() {
                builder.out(result)?;
            }
        } else {
            builder.out(result.map(|r| format!("return {r}")))?;
        }
        Ok(())
    }
}

/// Declared parameter names, with `argN` filled in for unnamed ones. A
/// filled-in name never repeats a declared one.
fn parameter_names<'n>(declared: impl Iterator<Item = &'n str> + Clone) -> Vec<String> {
    let taken: HashSet<&str> = declared.clone().filter(|n| !n.is_empty()).collect();
    let mut next = 0;
    declared
        .map(|name| {
            if !name.is_empty() {
                return name.to_string();
            }
            loop {
                let candidate = format!("arg{next}");
                next += 1;
                if !taken.contains(candidate.as_str()) {
                    return candidate;
                }
            }
        })
        .collect()
}
