//! Type-directed marshalling of whole calls across the bridge.
//!
//! [`MappingBridgeGenerator`] decides, per argument and per return value,
//! whether a value crosses as a scalar (through its [`Mirror`]), as a pointer
//! to a scoped native-heap temporary, or as the address of memory that is
//! already addressable. The actual crossing is delegated to a
//! [`BridgeGenerator`].
//!
//! Every decision branches on one classification of the typedef-unwrapped
//! type: `Void`, `Record` or anything else.

use tether_native::{NativeIndex, Type};

use crate::builder::CodeBuilder;
use crate::error::{BridgeError, Result};
use crate::expr::Expr;
use crate::mirror::{BridgedType, Mirror, MirrorSource};
use crate::session::BridgeSession;
use crate::simple::{BridgeCallback, BridgeGenerator, BridgeValue, Direction};

/// A value together with its native type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedValue {
    pub ty: Type,
    pub value: Expr,
}

impl TypedValue {
    pub fn new(ty: Type, value: impl Into<Expr>) -> Self {
        Self {
            ty,
            value: value.into(),
        }
    }
}

enum Category {
    Void,
    Record { spelling: String, pointed: String },
    Other,
}

/// How one argument is marshalled.
#[derive(Debug, Clone)]
enum ValuePlan {
    Record { spelling: String, pointed: String },
    Scalar(Mirror),
}

/// How the return value is marshalled.
#[derive(Debug, Clone)]
enum ReturnPlan {
    Void,
    Record { spelling: String, pointed: String },
    Scalar(Mirror),
}

impl ReturnPlan {
    fn has_out_pointer(&self) -> bool {
        matches!(self, ReturnPlan::Record { .. })
    }
}

/// What the caller's side makes of the crossing call.
enum CallResult {
    /// The call itself.
    Call,
    /// Emit the call, then use this expression.
    AfterCall(Expr),
    /// Convert the call's bridged result.
    Converted(Mirror),
}

/// Marshals calls in both directions on top of a low-level generator.
#[derive(Clone, Copy)]
pub struct MappingBridgeGenerator<'a> {
    index: &'a NativeIndex,
    mirrors: &'a dyn MirrorSource,
    bridge: &'a dyn BridgeGenerator,
}

impl std::fmt::Debug for MappingBridgeGenerator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingBridgeGenerator").finish_non_exhaustive()
    }
}

impl<'a> MappingBridgeGenerator<'a> {
    pub fn new(
        index: &'a NativeIndex,
        mirrors: &'a dyn MirrorSource,
        bridge: &'a dyn BridgeGenerator,
    ) -> Self {
        Self {
            index,
            mirrors,
            bridge,
        }
    }

    pub fn index(&self) -> &'a NativeIndex {
        self.index
    }

    pub fn mirrors(&self) -> &'a dyn MirrorSource {
        self.mirrors
    }

    /// Generate a call from managed code into native code.
    ///
    /// `block` runs in native context with the reconstructed native argument
    /// values and returns the native result expression. The returned
    /// expression is the managed value of the call; it may be bound to a
    /// scope this call opened on the managed builder, which stays open until
    /// the caller finishes the session.
    ///
    /// On error the session is left exactly as it was.
    #[tracing::instrument(level = "debug", skip_all, fields(args = values.len()))]
    pub fn managed_to_native<F>(
        &self,
        session: &mut BridgeSession,
        return_type: &Type,
        values: &[TypedValue],
        block: F,
    ) -> Result<Expr>
    where
        F: FnOnce(&mut CodeBuilder, &[Expr]) -> Result<Expr>,
    {
        session.atomically(|session| {
            self.managed_to_native_unchecked(session, return_type, values, block)
        })
    }

    fn managed_to_native_unchecked<F>(
        &self,
        session: &mut BridgeSession,
        return_type: &Type,
        values: &[TypedValue],
        block: F,
    ) -> Result<Expr>
    where
        F: FnOnce(&mut CodeBuilder, &[Expr]) -> Result<Expr>,
    {
        let mut plans = Vec::with_capacity(values.len());
        let mut bridge_args = Vec::with_capacity(values.len() + 1);

        for value in values {
            session.managed().check(&value.value)?;
            session.managed_mut().reserve_identifiers(&value.value);
        }

        for value in values {
            let plan = self.value_plan(&value.ty)?;
            let arg = match &plan {
                ValuePlan::Record { .. } => {
                    // The pointer stays valid for everything generated from here on.
                    let managed = session.managed_mut();
                    let ptr = managed.fresh_name("ptr");
                    let header = format!("{}.usePointer {{ {ptr} ->", value.value.atomic());
                    let scope = managed.push_scope(Some(&header), None)?;
                    BridgeValue::new(
                        BridgedType::NativePointer,
                        Expr::scoped(format!("{ptr}.rawValue"), scope),
                    )
                }
                ValuePlan::Scalar(mirror) => {
                    BridgeValue::new(mirror.bridged_type(), mirror.arg_to_bridged(&value.value))
                }
            };
            plans.push(plan);
            bridge_args.push(arg);
        }

        let ret = self.return_plan(return_type)?;
        let (bridged_return, result) = match &ret {
            ReturnPlan::Void => (BridgedType::Void, CallResult::Call),
            ReturnPlan::Record { pointed, .. } => {
                let managed = session.managed_mut();
                let tmp = managed.fresh_name("tmp");
                managed.out(format!("val {tmp} = nativeHeap.alloc<{pointed}>()"))?;
                let scope = managed.push_scope(None, Some(&format!("nativeHeap.free({tmp})")))?;
                bridge_args.push(BridgeValue::new(
                    BridgedType::NativePointer,
                    Expr::scoped(format!("{tmp}.rawPtr"), scope),
                ));
                (
                    BridgedType::Void,
                    CallResult::AfterCall(Expr::scoped(format!("{tmp}.readValue()"), scope)),
                )
            }
            ReturnPlan::Scalar(mirror) => {
                (mirror.bridged_type(), CallResult::Converted(mirror.clone()))
            }
        };

        let callback: BridgeCallback<'_> =
            Box::new(move |native: &mut CodeBuilder, params: &[Expr]| {
                let (declared, out_ptr) = split_params(params, plans.len(), &ret)?;
                let native_values: Vec<Expr> = plans
                    .iter()
                    .zip(declared)
                    .map(|(plan, param)| match plan {
                        ValuePlan::Record { spelling, .. } => {
                            param.atomic().map(|p| format!("*({spelling}*){p}"))
                        }
                        ValuePlan::Scalar(mirror) => mirror.c_from_bridged(param),
                    })
                    .collect();

                let value = block(native, &native_values)?;
                match (&ret, out_ptr) {
                    (ReturnPlan::Void, _) => {
                        if !value.is_empty() {
                            native.out(value)?;
                        }
                        Ok(Expr::empty())
                    }
                    (ReturnPlan::Record { spelling, .. }, Some(out_ptr)) => {
                        let store = format!("*({spelling}*){} = {value}", out_ptr.atomic());
                        native.out(Expr::derive(store, [&value]))?;
                        Ok(Expr::empty())
                    }
                    (ReturnPlan::Record { .. }, None) => Err(missing_out_pointer()),
                    (ReturnPlan::Scalar(_), _) => Ok(value),
                }
            });

        let call = self.bridge.generate(
            session,
            Direction::ManagedToNative,
            bridged_return,
            &bridge_args,
            callback,
        )?;

        match result {
            CallResult::Call => Ok(call),
            CallResult::AfterCall(read_back) => {
                session.managed_mut().out(call)?;
                Ok(read_back)
            }
            CallResult::Converted(mirror) => Ok(mirror.arg_from_bridged(&call)),
        }
    }

    /// Generate a call from native code into managed code, as used by
    /// callback trampolines.
    ///
    /// `block` runs in managed context with the reconstructed managed
    /// argument values and returns the managed result expression. The
    /// returned expression is the native value of the call.
    ///
    /// On error the session is left exactly as it was.
    #[tracing::instrument(level = "debug", skip_all, fields(args = values.len()))]
    pub fn native_to_managed<F>(
        &self,
        session: &mut BridgeSession,
        return_type: &Type,
        values: &[TypedValue],
        block: F,
    ) -> Result<Expr>
    where
        F: FnOnce(&mut CodeBuilder, &[Expr]) -> Result<Expr>,
    {
        session.atomically(|session| {
            self.native_to_managed_unchecked(session, return_type, values, block)
        })
    }

    fn native_to_managed_unchecked<F>(
        &self,
        session: &mut BridgeSession,
        return_type: &Type,
        values: &[TypedValue],
        block: F,
    ) -> Result<Expr>
    where
        F: FnOnce(&mut CodeBuilder, &[Expr]) -> Result<Expr>,
    {
        let mut plans = Vec::with_capacity(values.len());
        let mut bridge_args = Vec::with_capacity(values.len() + 1);

        for value in values {
            session.native().check(&value.value)?;
            session.native_mut().reserve_identifiers(&value.value);
        }

        for value in values {
            let plan = self.value_plan(&value.ty)?;
            let arg = match &plan {
                // Native values are already addressable.
                ValuePlan::Record { .. } => BridgeValue::new(
                    BridgedType::NativePointer,
                    value.value.atomic().map(|v| format!("&{v}")),
                ),
                ValuePlan::Scalar(mirror) => {
                    BridgeValue::new(mirror.bridged_type(), value.value.clone())
                }
            };
            plans.push(plan);
            bridge_args.push(arg);
        }

        let ret = self.return_plan(return_type)?;
        let (bridged_return, result) = match &ret {
            ReturnPlan::Void => (BridgedType::Void, CallResult::Call),
            ReturnPlan::Record { spelling, .. } => {
                let native = session.native_mut();
                let local = native.fresh_name("ret");
                native.out(format!("{spelling} {local}"))?;
                bridge_args.push(BridgeValue::new(
                    BridgedType::NativePointer,
                    Expr::new(format!("&{local}")),
                ));
                (BridgedType::Void, CallResult::AfterCall(Expr::new(local)))
            }
            ReturnPlan::Scalar(mirror) => {
                (mirror.bridged_type(), CallResult::Converted(mirror.clone()))
            }
        };

        let callback: BridgeCallback<'_> =
            Box::new(move |managed: &mut CodeBuilder, params: &[Expr]| {
                let (declared, out_ptr) = split_params(params, plans.len(), &ret)?;
                let managed_values: Vec<Expr> = plans
                    .iter()
                    .zip(declared)
                    .map(|(plan, param)| match plan {
                        ValuePlan::Record { pointed, .. } => {
                            param.map(|p| format!("interpretPointed<{pointed}>({p}).readValue()"))
                        }
                        ValuePlan::Scalar(mirror) => mirror.arg_from_bridged(param),
                    })
                    .collect();

                let value = block(managed, &managed_values)?;
                match (&ret, out_ptr) {
                    (ReturnPlan::Void, _) => Ok(value),
                    (ReturnPlan::Record { .. }, Some(out_ptr)) => {
                        let store = format!("{}.write({out_ptr})", value.atomic());
                        managed.out(Expr::derive(store, [&value]))?;
                        Ok(Expr::empty())
                    }
                    (ReturnPlan::Record { .. }, None) => Err(missing_out_pointer()),
                    (ReturnPlan::Scalar(mirror), _) => Ok(mirror.arg_to_bridged(&value)),
                }
            });

        let call = self.bridge.generate(
            session,
            Direction::NativeToManaged,
            bridged_return,
            &bridge_args,
            callback,
        )?;

        match result {
            CallResult::Call => Ok(call),
            CallResult::AfterCall(local) => {
                session.native_mut().out(call)?;
                Ok(local)
            }
            CallResult::Converted(mirror) => Ok(mirror.c_from_bridged(&call)),
        }
    }

    /// Classify `ty` after unwrapping typedefs.
    fn classify(&self, ty: &Type) -> Result<Category> {
        let resolved = self.index.unwrap_typedefs(ty)?;
        match resolved {
            Type::Void => Ok(Category::Void),
            Type::Record(_) => {
                let mirror = self.mirrors.mirror(resolved)?;
                let pointed = mirror.pointed_type_name().ok_or_else(|| {
                    BridgeError::unmapped(mirror.c_type_name(), "record mirror has no pointed type")
                })?;
                Ok(Category::Record {
                    spelling: mirror.c_type_name().to_string(),
                    pointed: pointed.to_string(),
                })
            }
            Type::Primitive(_)
            | Type::Enum(_)
            | Type::Pointer { .. }
            | Type::Function(_)
            | Type::Array { .. }
            | Type::ObjCObjectPointer { .. }
            | Type::ObjCClassPointer { .. }
            | Type::ObjCIdType { .. }
            | Type::ObjCInstanceType { .. }
            | Type::Unsupported => Ok(Category::Other),
            Type::Typedef(_) => Err(BridgeError::unmapped(
                self.index.c_spelling(ty),
                "typedef did not resolve",
            )),
        }
    }

    fn value_plan(&self, ty: &Type) -> Result<ValuePlan> {
        match self.classify(ty)? {
            Category::Record { spelling, pointed } => Ok(ValuePlan::Record { spelling, pointed }),
            Category::Void | Category::Other => Ok(ValuePlan::Scalar(self.mirrors.mirror(ty)?)),
        }
    }

    fn return_plan(&self, ty: &Type) -> Result<ReturnPlan> {
        match self.classify(ty)? {
            Category::Void => Ok(ReturnPlan::Void),
            Category::Record { spelling, pointed } => Ok(ReturnPlan::Record { spelling, pointed }),
            Category::Other => Ok(ReturnPlan::Scalar(self.mirrors.mirror(ty)?)),
        }
    }
}

/// Split the callee's parameters into the declared ones and the trailing
/// out-pointer, if the return plan has one.
fn split_params<'p>(
    params: &'p [Expr],
    declared: usize,
    ret: &ReturnPlan,
) -> Result<(&'p [Expr], Option<&'p Expr>)> {
    let expected = declared + usize::from(ret.has_out_pointer());
    if params.len() != expected {
        return Err(BridgeError::unsupported(format!(
            "bridge delivered {} parameters, expected {expected}",
            params.len()
        )));
    }
    Ok((&params[..declared], params.get(declared)))
}

fn missing_out_pointer() -> BridgeError {
    BridgeError::unsupported("record return without an out-pointer")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Side;
    use crate::mirror::DeclarationMapper;
    use crate::simple::SimpleBridgeGenerator;
    use pretty_assertions::assert_eq;
    use tether_native::{Field, RecordKind, StructDef, TypedefDef};

    fn index() -> NativeIndex {
        let mut index = NativeIndex::new();
        index.add_struct(
            "struct Point",
            Some(StructDef {
                size: 8,
                align: 4,
                has_natural_layout: true,
                kind: RecordKind::Struct,
                fields: vec![
                    Field {
                        name: "x".to_string(),
                        ty: Type::i32(),
                        offset: 0,
                        type_align: 4,
                    },
                    Field {
                        name: "y".to_string(),
                        ty: Type::i32(),
                        offset: 32,
                        type_align: 4,
                    },
                ],
                bit_fields: Vec::new(),
            }),
        );
        index.declare_struct("struct Handle");
        index
    }

    fn point(index: &NativeIndex) -> Type {
        Type::Record(index.struct_by_spelling("struct Point").unwrap())
    }

    fn native_call(name: &'static str) -> impl FnOnce(&mut CodeBuilder, &[Expr]) -> Result<Expr> {
        move |_native: &mut CodeBuilder, args: &[Expr]| Ok(Expr::call(name, args))
    }

    #[test]
    fn scalar_call() {
        let index = index();
        let mapper = DeclarationMapper::new(&index);
        let simple = SimpleBridgeGenerator;
        let gen = MappingBridgeGenerator::new(&index, &mapper, &simple);
        let mut session = BridgeSession::new("add");

        let result = gen
            .managed_to_native(
                &mut session,
                &Type::i32(),
                &[
                    TypedValue::new(Type::i32(), "a"),
                    TypedValue::new(Type::i32(), "b"),
                ],
                native_call("add"),
            )
            .unwrap();

        let symbol = result.text().split('(').next().unwrap().to_string();
        assert!(symbol.ends_with("_bridge0"));
        assert_eq!(result.text(), format!("{symbol}(a, b)"));
        assert_eq!(result.scope(), None);
        assert_eq!(
            session.native_declarations(),
            [format!(
                "int32_t {symbol}(int32_t p0, int32_t p1) {{\n    return add((int32_t)p0, (int32_t)p1);\n}}"
            )]
        );
        let fragments = session.into_fragments();
        assert_eq!(fragments.managed.scope_count(), 0);
        assert!(fragments.managed.is_empty());
    }

    #[test]
    fn record_argument_is_addressed() {
        let index = index();
        let mapper = DeclarationMapper::new(&index);
        let simple = SimpleBridgeGenerator;
        let gen = MappingBridgeGenerator::new(&index, &mapper, &simple);
        let mut session = BridgeSession::new("norm");

        let result = gen
            .managed_to_native(
                &mut session,
                &Type::f64(),
                &[TypedValue::new(point(&index), "p")],
                native_call("norm"),
            )
            .unwrap();

        let managed_decl = session.managed_declarations()[0].clone();
        assert!(managed_decl.ends_with("(p0: NativePtr): Double"), "{managed_decl}");
        let native_decl = &session.native_declarations()[0];
        assert!(
            native_decl.contains("return norm(*(struct Point*)p0);"),
            "{native_decl}"
        );
        assert!(result.scope().is_some());

        session.managed_mut().out(result.map(|r| format!("return {r}"))).unwrap();
        let fragments = session.into_fragments();
        assert_eq!(fragments.managed.scope_count(), 1);
        let symbol = managed_decl
            .split("external fun ")
            .nth(1)
            .and_then(|s| s.split('(').next())
            .unwrap();
        assert_eq!(
            fragments.managed.render(),
            format!("p.usePointer {{ ptr0 ->\n    return {symbol}(ptr0.rawValue)\n}}\n")
        );
    }

    #[test]
    fn record_return_uses_out_pointer() {
        let index = index();
        let mapper = DeclarationMapper::new(&index);
        let simple = SimpleBridgeGenerator;
        let gen = MappingBridgeGenerator::new(&index, &mapper, &simple);
        let mut session = BridgeSession::new("make_point");

        let result = gen
            .managed_to_native(
                &mut session,
                &point(&index),
                &[
                    TypedValue::new(Type::i32(), "x"),
                    TypedValue::new(Type::i32(), "y"),
                ],
                native_call("make_point"),
            )
            .unwrap();
        assert_eq!(result.text(), "tmp0.readValue()");

        let managed_decl = session.managed_declarations()[0].clone();
        assert!(
            managed_decl.ends_with("(p0: Int, p1: Int, p2: NativePtr): Unit"),
            "{managed_decl}"
        );
        let native_decl = session.native_declarations()[0].clone();
        assert!(
            native_decl.contains(
                "*(struct Point*)p2 = make_point((int32_t)p0, (int32_t)p1);"
            ),
            "{native_decl}"
        );
        assert!(native_decl.starts_with("void "));

        session.managed_mut().out(result.map(|r| format!("return {r}"))).unwrap();
        let managed = session.into_fragments().managed.render();
        assert_eq!(managed.matches("nativeHeap.alloc<Point>()").count(), 1);
        assert_eq!(managed.matches("nativeHeap.free(tmp0)").count(), 1);
        assert!(managed.contains("} finally {\n    nativeHeap.free(tmp0)\n}"));
        assert!(managed.contains("(x, y, tmp0.rawPtr)"));
    }

    #[test]
    fn typedef_layers_do_not_change_decisions() {
        let mut index = index();
        let point_ty = point(&index);
        let inner = index.add_typedef(TypedefDef {
            aliased: point_ty.clone(),
            name: "point_t".to_string(),
        });
        let outer = index.add_typedef(TypedefDef {
            aliased: Type::Typedef(inner),
            name: "pos_t".to_string(),
        });
        let mapper = DeclarationMapper::new(&index);
        let simple = SimpleBridgeGenerator;
        let gen = MappingBridgeGenerator::new(&index, &mapper, &simple);

        let render = |ty: Type| {
            let mut session = BridgeSession::new("f");
            let result = gen
                .managed_to_native(
                    &mut session,
                    &ty,
                    &[TypedValue::new(ty.clone(), "v")],
                    native_call("f"),
                )
                .unwrap();
            session.managed_mut().out(result).unwrap();
            let managed_decls = session.managed_declarations().to_vec();
            let native_decls = session.native_declarations().to_vec();
            let fragments = session.into_fragments();
            (fragments.managed.render(), managed_decls, native_decls)
        };

        assert_eq!(render(Type::Typedef(outer)), render(point_ty));
    }

    #[test]
    fn failing_block_leaves_session_unchanged() {
        let index = index();
        let mapper = DeclarationMapper::new(&index);
        let simple = SimpleBridgeGenerator;
        let gen = MappingBridgeGenerator::new(&index, &mapper, &simple);
        let mut session = BridgeSession::new("f");
        session.managed_mut().out("prelude()").unwrap();

        let err = gen
            .managed_to_native(
                &mut session,
                &point(&index),
                &[TypedValue::new(point(&index), "p")],
                |_: &mut CodeBuilder, _: &[Expr]| Err(BridgeError::unsupported("block failed")),
            )
            .unwrap_err();
        assert!(matches!(err, BridgeError::UnsupportedShape { .. }));
        assert_eq!(session.managed().depth(), 0);
        assert!(session.managed_declarations().is_empty());
        assert!(session.native_declarations().is_empty());
        assert_eq!(session.into_fragments().managed.render(), "prelude()\n");
    }

    #[test]
    fn opaque_record_by_value_is_unmapped() {
        let index = index();
        let mapper = DeclarationMapper::new(&index);
        let simple = SimpleBridgeGenerator;
        let gen = MappingBridgeGenerator::new(&index, &mapper, &simple);
        let handle = Type::Record(index.struct_by_spelling("struct Handle").unwrap());
        let mut session = BridgeSession::new("f");

        let err = gen
            .managed_to_native(
                &mut session,
                &Type::Void,
                &[TypedValue::new(handle, "h")],
                native_call("f"),
            )
            .unwrap_err();
        assert!(matches!(err, BridgeError::UnmappedType { .. }));
    }

    #[test]
    fn read_back_after_scope_closes_is_a_violation() {
        let index = index();
        let mapper = DeclarationMapper::new(&index);
        let simple = SimpleBridgeGenerator;
        let gen = MappingBridgeGenerator::new(&index, &mapper, &simple);
        let mut session = BridgeSession::new("make_point");

        let result = gen
            .managed_to_native(&mut session, &point(&index), &[], native_call("make_point"))
            .unwrap();
        session.managed_mut().pop_scope().unwrap();
        let err = session.managed_mut().out(result).unwrap_err();
        assert!(matches!(err, BridgeError::ScopeViolation { .. }));
    }

    #[test]
    fn closed_scope_value_is_rejected_as_argument() {
        let index = index();
        let mapper = DeclarationMapper::new(&index);
        let simple = SimpleBridgeGenerator;
        let gen = MappingBridgeGenerator::new(&index, &mapper, &simple);
        let mut session = BridgeSession::new("f");
        let scope = session.managed_mut().push_scope(None, Some("done()")).unwrap();
        session.managed_mut().pop_scope().unwrap();

        let stale = TypedValue::new(Type::i32(), Expr::scoped("stale", scope));
        let err = gen
            .managed_to_native(&mut session, &Type::Void, &[stale], native_call("f"))
            .unwrap_err();
        assert!(matches!(err, BridgeError::ScopeViolation { .. }));
    }

    #[test]
    fn void_native_result_becomes_a_statement() {
        let index = index();
        let mapper = DeclarationMapper::new(&index);
        let simple = SimpleBridgeGenerator;
        let gen = MappingBridgeGenerator::new(&index, &mapper, &simple);
        let mut session = BridgeSession::new("reset");

        let result = gen
            .managed_to_native(&mut session, &Type::Void, &[], native_call("reset"))
            .unwrap();
        assert!(result.text().ends_with("_bridge0()"));
        let native_decl = &session.native_declarations()[0];
        assert!(native_decl.contains("{\n    reset();\n}"), "{native_decl}");
    }

    #[test]
    fn native_to_managed_record_argument_and_return() {
        let index = index();
        let mapper = DeclarationMapper::new(&index);
        let simple = SimpleBridgeGenerator;
        let gen = MappingBridgeGenerator::new(&index, &mapper, &simple);
        let mut session = BridgeSession::new("on_move");

        let result = gen
            .native_to_managed(
                &mut session,
                &point(&index),
                &[
                    TypedValue::new(point(&index), "from"),
                    TypedValue::new(Type::bool(), "animated"),
                ],
                |_managed: &mut CodeBuilder, args: &[Expr]| Ok(Expr::call("onMove", args)),
            )
            .unwrap();
        assert_eq!(result.text(), "ret0");

        let native_decl = &session.native_declarations()[0];
        assert!(native_decl.starts_with("void "));
        assert!(native_decl.ends_with("(void* p0, int8_t p1, void* p2);"), "{native_decl}");

        let managed_decl = &session.managed_declarations()[0];
        assert!(
            managed_decl.contains(
                "onMove(interpretPointed<Point>(p0).readValue(), p1.toBoolean()).write(p2)"
            ),
            "{managed_decl}"
        );

        let native = session.into_fragments().native;
        assert_eq!(native.side(), Side::Native);
        let rendered = native.render();
        assert!(rendered.starts_with("struct Point ret0;\n"), "{rendered}");
        assert!(rendered.contains("(&from, animated, &ret0);"), "{rendered}");
    }

    #[test]
    fn temporaries_avoid_argument_names() {
        let index = index();
        let mapper = DeclarationMapper::new(&index);
        let simple = SimpleBridgeGenerator;
        let gen = MappingBridgeGenerator::new(&index, &mapper, &simple);

        let mut session = BridgeSession::new("shift");
        let result = gen
            .managed_to_native(
                &mut session,
                &point(&index),
                &[TypedValue::new(Type::i32(), "tmp0")],
                native_call("shift"),
            )
            .unwrap();
        assert_eq!(result.text(), "tmp1.readValue()");
        let managed = session.into_fragments().managed.render();
        assert!(managed.starts_with("val tmp1 = nativeHeap.alloc<Point>()\n"), "{managed}");
        assert!(managed.contains("(tmp0, tmp1.rawPtr)"), "{managed}");

        let mut session = BridgeSession::new("dist");
        let result = gen
            .managed_to_native(
                &mut session,
                &Type::f64(),
                &[
                    TypedValue::new(point(&index), "a"),
                    TypedValue::new(point(&index), "ptr0"),
                ],
                native_call("dist"),
            )
            .unwrap();
        session.managed_mut().out(result).unwrap();
        let managed = session.into_fragments().managed.render();
        assert!(
            managed.starts_with("a.usePointer { ptr1 ->\n    ptr0.usePointer { ptr2 ->\n"),
            "{managed}"
        );
        assert!(managed.contains("(ptr1.rawValue, ptr2.rawValue)"), "{managed}");
    }

    #[test]
    fn native_record_store_is_terminated() {
        let index = index();
        let mapper = DeclarationMapper::new(&index);
        let simple = SimpleBridgeGenerator;
        let gen = MappingBridgeGenerator::new(&index, &mapper, &simple);
        let mut session = BridgeSession::new("origin");

        gen.managed_to_native(
            &mut session,
            &point(&index),
            &[],
            |_native: &mut CodeBuilder, _args: &[Expr]| Ok(Expr::new("(struct Point){ 0, 0 }")),
        )
        .unwrap();
        let native_decl = &session.native_declarations()[0];
        assert!(
            native_decl.ends_with("    *(struct Point*)p0 = (struct Point){ 0, 0 };\n}"),
            "{native_decl}"
        );
    }

    #[test]
    fn native_to_managed_scalar_return_is_converted() {
        let index = index();
        let mapper = DeclarationMapper::new(&index);
        let simple = SimpleBridgeGenerator;
        let gen = MappingBridgeGenerator::new(&index, &mapper, &simple);
        let mut session = BridgeSession::new("is_ready");

        let result = gen
            .native_to_managed(
                &mut session,
                &Type::bool(),
                &[TypedValue::new(Type::i32(), "id")],
                |_managed: &mut CodeBuilder, args: &[Expr]| Ok(Expr::call("isReady", args)),
            )
            .unwrap();
        assert!(result.text().starts_with("(_Bool)"), "{}", result.text());

        let managed_decl = &session.managed_declarations()[0];
        assert!(managed_decl.contains("return isReady(p0).toByte()"), "{managed_decl}");
    }
}
