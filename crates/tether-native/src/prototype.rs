//! Hand-written C prototype and type-spelling parser.
//!
//! Resolves spellings against a [`NativeIndex`]: builtin keyword types (LP64
//! sizes), `<stdint.h>` names, `struct`/`union`/`enum` tags, typedef names and
//! Objective-C class names. Handles `const`, pointer declarators, trailing
//! array declarators and variadic prototypes. Does NOT handle function-pointer
//! declarators or attributes.

use crate::decl::{FunctionDecl, Parameter};
use crate::error::{NativeError, Result};
use crate::index::NativeIndex;
use crate::types::{ArrayKind, Nullability, PrimitiveType, Type};

/// A parsed C function prototype.
#[derive(Debug, Clone, PartialEq)]
pub struct Prototype {
    pub return_type: Type,
    pub name: String,
    /// Parameters (excluding variadic `...`).
    pub parameters: Vec<Parameter>,
    pub is_vararg: bool,
}

impl Prototype {
    /// Parse a C prototype string.
    ///
    /// Examples:
    /// - `"double sin(double x)"`
    /// - `"struct Point make_point(coord_t x, coord_t y)"`
    /// - `"int printf(const char* fmt, ...)"`
    pub fn parse(input: &str, index: &NativeIndex) -> Result<Self> {
        let input = input.trim().trim_end_matches(';').trim_end();
        if input.is_empty() {
            return Err(invalid("empty prototype"));
        }

        let paren_pos = input.find('(').ok_or_else(|| invalid("missing '('"))?;
        if !input.ends_with(')') {
            return Err(invalid("missing ')'"));
        }

        let before_paren = input[..paren_pos].trim();
        let params_str = &input[paren_pos + 1..input.len() - 1];

        let (return_type, name) = parse_declaration(before_paren, index)?;
        if name.is_empty() {
            return Err(invalid("missing function name"));
        }
        if matches!(return_type, Type::Array { .. }) {
            return Err(invalid(&format!("'{name}' cannot return an array")));
        }
        let (parameters, is_vararg) = parse_params(params_str, index)?;

        Ok(Prototype {
            return_type,
            name,
            parameters,
            is_vararg,
        })
    }

    /// Convert into a function declaration with `binary_name` equal to the name.
    pub fn into_function_decl(self) -> FunctionDecl {
        FunctionDecl {
            binary_name: self.name.clone(),
            name: self.name,
            parameters: self.parameters,
            return_type: self.return_type,
            is_defined: false,
            is_vararg: self.is_vararg,
        }
    }
}

/// Parse a standalone type spelling such as `const struct Point *` or `uint8_t[16]`.
pub fn parse_type(spelling: &str, index: &NativeIndex) -> Result<Type> {
    let (ty, name) = parse_declaration(spelling, index)?;
    if !name.is_empty() {
        return Err(invalid(&format!(
            "unexpected declarator name '{name}' in type '{spelling}'"
        )));
    }
    Ok(ty)
}

fn invalid(detail: &str) -> NativeError {
    NativeError::InvalidPrototype {
        detail: detail.to_string(),
    }
}

/// Tokenize a declaration fragment, keeping `*`, `[` and `]` as separate tokens.
fn tokenize(s: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    for part in s.split_whitespace() {
        let mut start = 0;
        for (i, c) in part.char_indices() {
            if matches!(c, '*' | '[' | ']') {
                if i > start {
                    tokens.push(&part[start..i]);
                }
                tokens.push(&part[i..i + 1]);
                start = i + 1;
            }
        }
        if start < part.len() {
            tokens.push(&part[start..]);
        }
    }
    tokens
}

/// Builtin keyword spellings that can combine (`unsigned long long int`).
const KEYWORDS: &[&str] = &[
    "signed", "unsigned", "short", "long", "int", "char", "float", "double", "void", "_Bool",
];

/// The base type of a declaration and how many tokens it consumed, plus
/// whether a leading or trailing `const` applied to it.
fn parse_base_type(tokens: &[&str], index: &NativeIndex) -> Result<(Type, usize, bool)> {
    let mut pos = 0;
    let mut is_const = false;

    while pos < tokens.len() && matches!(tokens[pos], "const" | "volatile") {
        is_const |= tokens[pos] == "const";
        pos += 1;
    }
    if pos >= tokens.len() {
        return Err(invalid("expected type"));
    }

    let ty = match tokens[pos] {
        tag @ ("struct" | "union" | "enum") => {
            pos += 1;
            let name = tokens
                .get(pos)
                .ok_or_else(|| invalid(&format!("expected {tag} name")))?;
            pos += 1;
            let spelling = format!("{tag} {name}");
            if tag == "enum" {
                index
                    .enum_by_spelling(&spelling)
                    .map(Type::Enum)
                    .ok_or(NativeError::UnknownType { name: spelling })?
            } else {
                index
                    .struct_by_spelling(&spelling)
                    .map(Type::Record)
                    .ok_or(NativeError::UnknownType { name: spelling })?
            }
        }
        kw if KEYWORDS.contains(&kw) => {
            let start = pos;
            while pos < tokens.len() && KEYWORDS.contains(&tokens[pos]) {
                pos += 1;
            }
            keyword_type(&tokens[start..pos])?
        }
        name => {
            pos += 1;
            named_type(name, index)?
        }
    };

    while pos < tokens.len() && matches!(tokens[pos], "const" | "volatile") {
        is_const |= tokens[pos] == "const";
        pos += 1;
    }

    Ok((ty, pos, is_const))
}

/// Resolve a combination of builtin keywords.
fn keyword_type(words: &[&str]) -> Result<Type> {
    let count = |w: &str| words.iter().filter(|x| **x == w).count();
    let unsigned = count("unsigned") > 0;
    let signed = count("signed") > 0;
    let longs = count("long");
    let spelling = words.join(" ");

    if count("void") > 0 {
        return Ok(Type::Void);
    }
    if count("_Bool") > 0 {
        return Ok(Type::bool());
    }
    if count("float") > 0 {
        return Ok(Type::f32());
    }
    if count("double") > 0 {
        return Ok(if longs > 0 {
            // No portable bridged representation.
            Type::Unsupported
        } else {
            Type::f64()
        });
    }
    if count("char") > 0 {
        return Ok(if unsigned || signed {
            Type::Primitive(PrimitiveType::integer(1, signed, &spelling))
        } else {
            Type::char()
        });
    }

    let size = if count("short") > 0 {
        2
    } else if longs > 0 {
        8
    } else {
        4
    };
    Ok(Type::Primitive(PrimitiveType::integer(size, !unsigned, &spelling)))
}

/// Resolve a non-keyword type name.
fn named_type(name: &str, index: &NativeIndex) -> Result<Type> {
    let ty = match name {
        "bool" => Type::bool(),
        "int8_t" => Type::i8(),
        "int16_t" => Type::i16(),
        "int32_t" => Type::i32(),
        "int64_t" => Type::i64(),
        "uint8_t" => Type::u8(),
        "uint16_t" => Type::u16(),
        "uint32_t" => Type::u32(),
        "uint64_t" => Type::u64(),
        "size_t" | "uintptr_t" => Type::Primitive(PrimitiveType::integer(8, false, name)),
        "ssize_t" | "intptr_t" | "ptrdiff_t" => {
            Type::Primitive(PrimitiveType::integer(8, true, name))
        }
        "BOOL" => Type::bool(),
        "id" => Type::ObjCIdType {
            nullability: Nullability::Unspecified,
            protocols: Vec::new(),
        },
        "Class" => Type::ObjCClassPointer {
            nullability: Nullability::Unspecified,
            protocols: Vec::new(),
        },
        "instancetype" => Type::ObjCInstanceType {
            nullability: Nullability::Unspecified,
        },
        other => {
            if let Some(id) = index.typedef_by_name(other) {
                Type::Typedef(id)
            } else if let Some(id) = index.objc_container_by_name(other) {
                // Interface names only appear behind a pointer; the declarator
                // folds the first `*` into the object pointer.
                Type::ObjCObjectPointer {
                    class: id,
                    nullability: Nullability::Unspecified,
                    protocols: Vec::new(),
                }
            } else {
                return Err(NativeError::UnknownType {
                    name: other.to_string(),
                });
            }
        }
    };
    Ok(ty)
}

/// Parse `base-type declarator`, returning the type and the (possibly empty) name.
fn parse_declaration(s: &str, index: &NativeIndex) -> Result<(Type, String)> {
    let tokens = tokenize(s);
    if tokens.is_empty() {
        return Err(invalid("empty declaration"));
    }

    let (base, consumed, base_const) = parse_base_type(&tokens, index)?;
    let is_objc_object = matches!(base, Type::ObjCObjectPointer { .. });
    let mut ty = base;
    let mut pointee_const = base_const;
    let mut folded_objc_star = false;
    let mut name = String::new();
    let mut pos = consumed;
    // Consecutive `[n]` suffixes, outermost first.
    let mut dims: Vec<ArrayKind> = Vec::new();

    while pos < tokens.len() {
        if tokens[pos] != "[" {
            ty = wrap_arrays(ty, &mut dims);
        }
        match tokens[pos] {
            "*" => {
                if is_objc_object && !folded_objc_star {
                    folded_objc_star = true;
                } else {
                    ty = Type::Pointer {
                        pointee: Box::new(ty),
                        pointee_is_const: pointee_const,
                    };
                }
                pointee_const = false;
            }
            // `char* const p`: the pointer itself is const, which does not
            // change how it is passed.
            "const" | "volatile" | "restrict" | "__restrict" => {}
            "[" => {
                let close = tokens[pos..]
                    .iter()
                    .position(|t| *t == "]")
                    .map(|p| p + pos)
                    .ok_or_else(|| invalid("unterminated '['"))?;
                let kind = match &tokens[pos + 1..close] {
                    [] => ArrayKind::Incomplete,
                    [len] => ArrayKind::Const {
                        length: len
                            .parse()
                            .map_err(|_| invalid(&format!("invalid array length '{len}'")))?,
                    },
                    _ => return Err(invalid("invalid array declarator")),
                };
                dims.push(kind);
                pos = close;
            }
            "_Nullable" | "_Nonnull" | "_Null_unspecified" => {
                ty = with_nullability(ty, tokens[pos]);
            }
            ident => {
                if !name.is_empty() {
                    return Err(invalid(&format!("unexpected token '{ident}' after '{name}'")));
                }
                name = ident.to_string();
            }
        }
        pos += 1;
    }
    ty = wrap_arrays(ty, &mut dims);

    if is_objc_object && !folded_objc_star {
        return Err(invalid("Objective-C interface types must be used through a pointer"));
    }

    Ok((ty, name))
}

/// `int a[2][3]` is two arrays of three ints: the last suffix binds tightest.
fn wrap_arrays(ty: Type, dims: &mut Vec<ArrayKind>) -> Type {
    dims.drain(..).rev().fold(ty, |elem, kind| Type::Array {
        elem: Box::new(elem),
        kind,
    })
}

fn with_nullability(ty: Type, keyword: &str) -> Type {
    let nullability = match keyword {
        "_Nullable" => Nullability::Nullable,
        "_Nonnull" => Nullability::NonNull,
        _ => Nullability::Unspecified,
    };
    match ty {
        Type::ObjCObjectPointer { class, protocols, .. } => Type::ObjCObjectPointer {
            class,
            nullability,
            protocols,
        },
        Type::ObjCIdType { protocols, .. } => Type::ObjCIdType {
            nullability,
            protocols,
        },
        Type::ObjCClassPointer { protocols, .. } => Type::ObjCClassPointer {
            nullability,
            protocols,
        },
        Type::ObjCInstanceType { .. } => Type::ObjCInstanceType { nullability },
        other => other,
    }
}

/// Parse the parameter list between `(` and `)`.
fn parse_params(s: &str, index: &NativeIndex) -> Result<(Vec<Parameter>, bool)> {
    let s = s.trim();
    if s.is_empty() || s == "void" {
        return Ok((Vec::new(), false));
    }

    let parts: Vec<&str> = s.split(',').collect();
    let mut params = Vec::new();
    let mut is_vararg = false;

    for (i, part) in parts.iter().enumerate() {
        let part = part.trim();
        if part == "..." {
            if i != parts.len() - 1 {
                return Err(invalid("'...' must be the last parameter"));
            }
            is_vararg = true;
            continue;
        }

        let (ty, name) = parse_declaration(part, index)?;
        if ty.is_void() {
            return Err(invalid("'void' must be the only parameter"));
        }
        params.push(Parameter::new(&name, ty));
    }

    Ok((params, is_vararg))
}
