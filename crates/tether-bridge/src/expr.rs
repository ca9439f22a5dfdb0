//! Expression handles passed between generation stages.
//!
//! An [`Expr`] is source text that is safe to embed verbatim on one side of
//! the bridge. It may be bound to a builder scope, in which case it is only
//! valid while that scope is open (see [`CodeBuilder::out`](crate::builder::CodeBuilder::out)).

use std::fmt;

use crate::builder::ScopeId;

/// A source-text expression, optionally bound to the scope that keeps it valid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Expr {
    text: String,
    scope: Option<ScopeId>,
}

impl Expr {
    /// An unscoped expression.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            scope: None,
        }
    }

    /// An expression only valid while `scope` is open.
    pub fn scoped(text: impl Into<String>, scope: ScopeId) -> Self {
        Self {
            text: text.into(),
            scope: Some(scope),
        }
    }

    /// The empty expression, used when a stage contributes no value.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn scope(&self) -> Option<ScopeId> {
        self.scope
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Rewrite the text, keeping the scope binding.
    pub fn map(&self, f: impl FnOnce(&str) -> String) -> Expr {
        Expr {
            text: f(&self.text),
            scope: self.scope,
        }
    }

    /// Build an expression out of `parts`.
    ///
    /// The result is bound to the innermost scope any part is bound to.
    /// Scopes nest strictly and ids grow monotonically, so that is the
    /// largest id.
    pub fn derive<'e>(text: impl Into<String>, parts: impl IntoIterator<Item = &'e Expr>) -> Expr {
        Expr {
            text: text.into(),
            scope: parts.into_iter().filter_map(|p| p.scope).max(),
        }
    }

    /// `callee(arg, ...)`.
    pub fn call(callee: &str, args: &[Expr]) -> Expr {
        let joined: Vec<&str> = args.iter().map(Expr::text).collect();
        Expr::derive(format!("{callee}({})", joined.join(", ")), args)
    }

    /// Every identifier-shaped token in the text, in order of appearance.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.text
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|t| t.starts_with(|c: char| c.is_alphabetic() || c == '_'))
    }

    /// This expression, parenthesized unless it already binds tighter than
    /// any postfix or prefix operator.
    pub fn atomic(&self) -> Expr {
        if is_atomic(&self.text) {
            self.clone()
        } else {
            self.map(|t| format!("({t})"))
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<String> for Expr {
    fn from(text: String) -> Self {
        Expr::new(text)
    }
}

impl From<&str> for Expr {
    fn from(text: &str) -> Self {
        Expr::new(text)
    }
}

fn is_path_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.')
}

/// Identifiers, member paths, numeric literals and calls on those.
fn is_atomic(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    if text.chars().all(is_path_char) {
        return true;
    }
    if !text.ends_with(')') {
        return false;
    }

    // Find the `(` matching the final `)`; everything before it must be a
    // plain callee (generic arguments allowed) and the parens balanced.
    let mut depth = 0i32;
    let mut open = None;
    for (i, c) in text.char_indices().rev() {
        match c {
            ')' => depth += 1,
            '(' => {
                depth -= 1;
                if depth == 0 {
                    open = Some(i);
                    break;
                }
            }
            _ => {}
        }
    }
    match open {
        Some(0) | None => false,
        Some(i) => text[..i]
            .chars()
            .all(|c| is_path_char(c) || matches!(c, '<' | '>' | ',')),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_detection() {
        assert!(is_atomic("x"));
        assert!(is_atomic("p0.rawValue"));
        assert!(is_atomic("42"));
        assert!(is_atomic("foo(a, b)"));
        assert!(is_atomic("interpretPointed<Point>(p0).readValue()"));
        assert!(!is_atomic("a + b"));
        assert!(!is_atomic("(int32_t)p0"));
        assert!(!is_atomic("*(struct Point*)p0"));
        assert!(!is_atomic("&ret0"));
        assert!(!is_atomic("f(a) + g(b)"));
        assert!(!is_atomic(""));
    }

    #[test]
    fn atomic_parenthesizes() {
        assert_eq!(Expr::new("a + b").atomic().text(), "(a + b)");
        assert_eq!(Expr::new("a").atomic().text(), "a");
    }

    #[test]
    fn call_joins_arguments() {
        let call = Expr::call("add", &[Expr::new("a"), Expr::new("b")]);
        assert_eq!(call.text(), "add(a, b)");
        assert_eq!(call.scope(), None);
    }

    #[test]
    fn identifiers_skip_literals_and_punctuation() {
        let e = Expr::new("interpretPointed<Point>(p0).readValue() + 42 * _x1");
        let ids: Vec<&str> = e.identifiers().collect();
        assert_eq!(ids, ["interpretPointed", "Point", "p0", "readValue", "_x1"]);
    }
}
