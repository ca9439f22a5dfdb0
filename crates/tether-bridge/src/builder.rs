//! Statement emitters with nested, cleanup-carrying scopes.
//!
//! A [`CodeBuilder`] collects statements for one side of the bridge. Scopes
//! are kept on an explicit stack (like region construction in a graph
//! builder): statements always land in the innermost open scope, and
//! [`CodeBuilder::finish`] closes whatever is still open innermost-first.
//!
//! On the managed side a scope with a cleanup clause renders as
//! `try { ... } finally { cleanup }`, so the cleanup runs exactly once on
//! every exit path, including exceptions raised by the body.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::{BridgeError, Result};
use crate::expr::Expr;

const INDENT: &str = "    ";

/// Which side of the bridge a builder emits code for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Side {
    Managed,
    Native,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Managed => write!(f, "managed"),
            Side::Native => write!(f, "native"),
        }
    }
}

/// Identifies one scope opened by one builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId {
    side: Side,
    index: u32,
}

impl ScopeId {
    pub fn side(&self) -> Side {
        self.side
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
enum Node {
    Statement { text: String, terminated: bool },
    Scope(ScopeNode),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct ScopeNode {
    header: Option<String>,
    cleanup: Option<String>,
    body: Vec<Node>,
}

#[derive(Debug, Clone)]
struct OpenScope {
    id: ScopeId,
    node: ScopeNode,
}

/// Emits statements for one side of the bridge.
#[derive(Debug, Clone)]
pub struct CodeBuilder {
    side: Side,
    root: Vec<Node>,
    open: Vec<OpenScope>,
    next_scope: u32,
    next_name: u32,
    /// Identifiers `fresh_name` must not return.
    reserved: BTreeSet<String>,
}

impl CodeBuilder {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            root: Vec::new(),
            open: Vec::new(),
            next_scope: 0,
            next_name: 0,
            reserved: BTreeSet::new(),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Append a statement to the innermost open scope. Native statements
    /// are terminated with `;` when rendered.
    ///
    /// Fails with `ScopeViolation` when `stmt` is bound to a scope of this
    /// builder that has already been closed, or to a scope of another builder.
    pub fn out(&mut self, stmt: impl Into<Expr>) -> Result<()> {
        let stmt = stmt.into();
        self.check(&stmt)?;
        let terminated = self.side == Side::Native;
        self.body_mut().push(Node::Statement {
            text: stmt.text().to_string(),
            terminated,
        });
        Ok(())
    }

    /// Verify that `expr` may be used at the current position.
    pub fn check(&self, expr: &Expr) -> Result<()> {
        match expr.scope() {
            Some(scope) if !self.is_open(scope) => Err(BridgeError::scope_violation(format!(
                "'{}' is bound to a {} scope that is not open in this {} builder",
                expr.text(),
                scope.side,
                self.side
            ))),
            _ => Ok(()),
        }
    }

    /// Open a nested scope. Everything emitted until the matching
    /// [`pop_scope`](Self::pop_scope) lands inside it.
    ///
    /// `header` is the line opening the block (e.g. `value.usePointer { p ->`);
    /// without one the scope renders as a bare block. `cleanup` runs once on
    /// every exit from the scope and is only available on the managed side.
    pub fn push_scope(&mut self, header: Option<&str>, cleanup: Option<&str>) -> Result<ScopeId> {
        if cleanup.is_some() && self.side == Side::Native {
            return Err(BridgeError::unsupported(
                "native-side scopes cannot carry cleanup",
            ));
        }
        let id = ScopeId {
            side: self.side,
            index: self.next_scope,
        };
        self.next_scope += 1;
        self.open.push(OpenScope {
            id,
            node: ScopeNode {
                header: header.map(str::to_string),
                cleanup: cleanup.map(str::to_string),
                body: Vec::new(),
            },
        });
        Ok(id)
    }

    /// Close the innermost open scope.
    pub fn pop_scope(&mut self) -> Result<ScopeId> {
        let scope = self
            .open
            .pop()
            .ok_or_else(|| BridgeError::scope_violation("no open scope to close"))?;
        self.body_mut().push(Node::Scope(scope.node));
        Ok(scope.id)
    }

    pub fn is_open(&self, scope: ScopeId) -> bool {
        scope.side == self.side && self.open.iter().any(|s| s.id == scope)
    }

    /// Number of currently open scopes.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Keep `name` out of every later [`fresh_name`](Self::fresh_name).
    pub fn reserve(&mut self, name: &str) {
        self.reserved.insert(name.to_string());
    }

    /// Reserve every identifier mentioned by `expr`.
    pub fn reserve_identifiers(&mut self, expr: &Expr) {
        for name in expr.identifiers() {
            self.reserve(name);
        }
    }

    /// A name that is neither reserved nor returned by an earlier call.
    pub fn fresh_name(&mut self, base: &str) -> String {
        loop {
            let name = format!("{base}{}", self.next_name);
            self.next_name += 1;
            if self.reserved.insert(name.clone()) {
                return name;
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty() && self.open.is_empty()
    }

    /// Close all open scopes, innermost first, and return the result.
    pub fn finish(mut self) -> Fragment {
        while self.pop_scope().is_ok() {}
        Fragment {
            side: self.side,
            nodes: self.root,
        }
    }

    fn body_mut(&mut self) -> &mut Vec<Node> {
        match self.open.last_mut() {
            Some(scope) => &mut scope.node.body,
            None => &mut self.root,
        }
    }
}

/// The finished statements of one builder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fragment {
    side: Side,
    nodes: Vec<Node>,
}

impl Fragment {
    pub fn side(&self) -> Side {
        self.side
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Render with no indentation.
    pub fn render(&self) -> String {
        self.render_indented(0)
    }

    /// Render with every line indented `level` steps.
    pub fn render_indented(&self, level: usize) -> String {
        let mut out = String::new();
        render_nodes(&self.nodes, self.side, level, &mut out);
        out
    }

    /// Number of scopes, at any depth.
    pub fn scope_count(&self) -> usize {
        fn count(nodes: &[Node]) -> usize {
            nodes
                .iter()
                .map(|n| match n {
                    Node::Statement { .. } => 0,
                    Node::Scope(s) => 1 + count(&s.body),
                })
                .sum()
        }
        count(&self.nodes)
    }
}

fn line(out: &mut String, level: usize, text: &str) {
    for _ in 0..level {
        out.push_str(INDENT);
    }
    out.push_str(text);
    out.push('\n');
}

fn render_nodes(nodes: &[Node], side: Side, level: usize, out: &mut String) {
    for node in nodes {
        match node {
            Node::Statement { text, terminated: true } => line(out, level, &format!("{text};")),
            Node::Statement { text, terminated: false } => line(out, level, text),
            Node::Scope(scope) => render_scope(scope, side, level, out),
        }
    }
}

fn render_scope(scope: &ScopeNode, side: Side, level: usize, out: &mut String) {
    let inner = match &scope.header {
        Some(header) => {
            line(out, level, header);
            level + 1
        }
        None if scope.cleanup.is_none() => {
            line(out, level, "{");
            level + 1
        }
        None => level,
    };

    match &scope.cleanup {
        Some(cleanup) => {
            line(out, inner, "try {");
            render_nodes(&scope.body, side, inner + 1, out);
            line(out, inner, "} finally {");
            line(out, inner + 1, cleanup);
            line(out, inner, "}");
        }
        None => render_nodes(&scope.body, side, inner, out),
    }

    if inner > level {
        line(out, level, "}");
    }
}
