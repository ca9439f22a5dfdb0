//! Low-level bridge generation: matching boundary signatures and the call
//! that crosses them.

use crate::builder::{CodeBuilder, Side};
use crate::error::{BridgeError, Result};
use crate::expr::Expr;
use crate::mirror::BridgedType;
use crate::session::BridgeSession;

/// Which way a call crosses the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    ManagedToNative,
    NativeToManaged,
}

impl Direction {
    /// The side the call originates from.
    pub fn caller(&self) -> Side {
        match self {
            Direction::ManagedToNative => Side::Managed,
            Direction::NativeToManaged => Side::Native,
        }
    }

    /// The side the callback body runs on.
    pub fn callee(&self) -> Side {
        match self {
            Direction::ManagedToNative => Side::Native,
            Direction::NativeToManaged => Side::Managed,
        }
    }
}

/// A bridged argument as seen by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeValue {
    pub ty: BridgedType,
    pub value: Expr,
}

impl BridgeValue {
    pub fn new(ty: BridgedType, value: Expr) -> Self {
        Self { ty, value }
    }
}

/// Produces the callee-side body of a bridge. Receives the callee builder and
/// the bridged parameters as they appear there; returns the bridged result.
pub type BridgeCallback<'c> = Box<dyn FnOnce(&mut CodeBuilder, &[Expr]) -> Result<Expr> + 'c>;

/// Declares matching boundary signatures and emits the crossing call.
pub trait BridgeGenerator: Send + Sync {
    /// Returns the call expression, valid on the caller's side.
    fn generate(
        &self,
        session: &mut BridgeSession,
        direction: Direction,
        return_type: BridgedType,
        args: &[BridgeValue],
        callback: BridgeCallback<'_>,
    ) -> Result<Expr>;
}

/// Emits one `external`/exported function pair per bridge.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleBridgeGenerator;

impl SimpleBridgeGenerator {
    fn run_callback(
        side: Side,
        return_type: BridgedType,
        params: &[Expr],
        callback: BridgeCallback<'_>,
    ) -> Result<String> {
        let mut body = CodeBuilder::new(side);
        for param in params {
            body.reserve_identifiers(param);
        }
        let result = callback(&mut body, params)?;
        if return_type == BridgedType::Void {
            if !result.is_empty() {
                body.out(result)?;
            }
        } else if result.is_empty() {
            return Err(BridgeError::unsupported(format!(
                "callback produced no value for a {} bridge result",
                return_type.c_name()
            )));
        } else {
            body.out(result.map(|t| format!("return {t}")))?;
        }
        Ok(body.finish().render_indented(1))
    }
}

impl BridgeGenerator for SimpleBridgeGenerator {
    fn generate(
        &self,
        session: &mut BridgeSession,
        direction: Direction,
        return_type: BridgedType,
        args: &[BridgeValue],
        callback: BridgeCallback<'_>,
    ) -> Result<Expr> {
        let symbol = session.next_symbol();
        let params: Vec<Expr> = (0..args.len()).map(|i| Expr::new(format!("p{i}"))).collect();
        let values: Vec<Expr> = args.iter().map(|a| a.value.clone()).collect();
        let call = Expr::call(&symbol, &values);

        let managed_params: Vec<String> = args
            .iter()
            .zip(&params)
            .map(|(a, p)| format!("{p}: {}", a.ty.managed_name()))
            .collect();
        let c_params: Vec<String> = args
            .iter()
            .zip(&params)
            .map(|(a, p)| format!("{} {p}", a.ty.c_name()))
            .collect();
        let c_params = if c_params.is_empty() {
            "void".to_string()
        } else {
            c_params.join(", ")
        };
        let managed_signature = format!(
            "fun {symbol}({}): {}",
            managed_params.join(", "),
            return_type.managed_name()
        );
        let c_signature = format!("{} {symbol}({c_params})", return_type.c_name());

        let body = Self::run_callback(direction.callee(), return_type, &params, callback)?;
        match direction {
            Direction::ManagedToNative => {
                session.declare_managed(format!(
                    "@SymbolName(\"{symbol}\")\nexternal {managed_signature}"
                ));
                session.declare_native(format!("{c_signature} {{\n{body}}}"));
            }
            Direction::NativeToManaged => {
                session.declare_native(format!("{c_signature};"));
                session.declare_managed(format!(
                    "@CName(\"{symbol}\")\n{managed_signature} {{\n{body}}}"
                ));
            }
        }

        tracing::debug!(%symbol, ?direction, args = args.len(), "bridge declared");
        Ok(call)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::ScalarKind;
    use pretty_assertions::assert_eq;

    fn int_arg(text: &str) -> BridgeValue {
        BridgeValue::new(BridgedType::Scalar(ScalarKind::I32), Expr::new(text))
    }

    #[test]
    fn managed_to_native_declarations() {
        let mut session = BridgeSession::new("add");
        let call = SimpleBridgeGenerator
            .generate(
                &mut session,
                Direction::ManagedToNative,
                BridgedType::Scalar(ScalarKind::I32),
                &[int_arg("a"), int_arg("b")],
                Box::new(|_native: &mut CodeBuilder, params: &[Expr]| {
                    Ok(Expr::new(format!("add({}, {})", params[0], params[1])))
                }),
            )
            .unwrap();
        let symbol = call.text().split('(').next().unwrap().to_string();
        assert_eq!(call.text(), format!("{symbol}(a, b)"));
        assert_eq!(
            session.managed_declarations(),
            [format!(
                "@SymbolName(\"{symbol}\")\nexternal fun {symbol}(p0: Int, p1: Int): Int"
            )]
        );
        assert_eq!(
            session.native_declarations(),
            [format!(
                "int32_t {symbol}(int32_t p0, int32_t p1) {{\n    return add(p0, p1);\n}}"
            )]
        );
    }

    #[test]
    fn native_to_managed_declarations() {
        let mut session = BridgeSession::new("on_event");
        let call = SimpleBridgeGenerator
            .generate(
                &mut session,
                Direction::NativeToManaged,
                BridgedType::Void,
                &[BridgeValue::new(BridgedType::NativePointer, Expr::new("ctx"))],
                Box::new(|_managed: &mut CodeBuilder, params: &[Expr]| {
                    Ok(Expr::new(format!("handle({})", params[0])))
                }),
            )
            .unwrap();
        let symbol = call.text().split('(').next().unwrap().to_string();
        assert_eq!(session.native_declarations(), [format!("void {symbol}(void* p0);")]);
        assert_eq!(
            session.managed_declarations(),
            [format!(
                "@CName(\"{symbol}\")\nfun {symbol}(p0: NativePtr): Unit {{\n    handle(p0)\n}}"
            )]
        );
    }

    #[test]
    fn void_result_without_value_emits_nothing() {
        let mut session = BridgeSession::new("noop");
        SimpleBridgeGenerator
            .generate(
                &mut session,
                Direction::ManagedToNative,
                BridgedType::Void,
                &[],
                Box::new(|_: &mut CodeBuilder, _: &[Expr]| Ok(Expr::empty())),
            )
            .unwrap();
        let native = &session.native_declarations()[0];
        assert!(native.contains("(void) {\n}"), "{native}");
    }

    #[test]
    fn missing_result_is_an_error() {
        let mut session = BridgeSession::new("broken");
        let err = SimpleBridgeGenerator
            .generate(
                &mut session,
                Direction::ManagedToNative,
                BridgedType::Scalar(ScalarKind::F64),
                &[],
                Box::new(|_: &mut CodeBuilder, _: &[Expr]| Ok(Expr::empty())),
            )
            .unwrap_err();
        assert!(matches!(err, BridgeError::UnsupportedShape { .. }));
    }

    #[test]
    fn callee_sides() {
        assert_eq!(Direction::ManagedToNative.callee(), Side::Native);
        assert_eq!(Direction::NativeToManaged.caller(), Side::Native);
    }
}
