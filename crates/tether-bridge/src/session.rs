//! Per-generation state: the two builders, declaration sinks and symbol names.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::builder::{CodeBuilder, Fragment, Side};
use crate::error::Result;

/// The caller-owned state of one bridge generation pass.
///
/// Generators never keep per-call state themselves; everything they emit
/// goes through a session, which makes concurrent passes independent as
/// long as each owns its session.
#[derive(Debug, Clone)]
pub struct BridgeSession {
    prefix: String,
    next_bridge: u32,
    managed: CodeBuilder,
    native: CodeBuilder,
    managed_declarations: Vec<String>,
    native_declarations: Vec<String>,
}

impl BridgeSession {
    /// A session whose bridge symbols are derived from `owner`.
    pub fn new(owner: &str) -> Self {
        Self {
            prefix: symbol_prefix(owner),
            next_bridge: 0,
            managed: CodeBuilder::new(Side::Managed),
            native: CodeBuilder::new(Side::Native),
            managed_declarations: Vec::new(),
            native_declarations: Vec::new(),
        }
    }

    pub fn managed(&self) -> &CodeBuilder {
        &self.managed
    }

    pub fn managed_mut(&mut self) -> &mut CodeBuilder {
        &mut self.managed
    }

    pub fn native(&self) -> &CodeBuilder {
        &self.native
    }

    pub fn native_mut(&mut self) -> &mut CodeBuilder {
        &mut self.native
    }

    /// The call-site builder for `side`.
    pub fn builder_mut(&mut self, side: Side) -> &mut CodeBuilder {
        match side {
            Side::Managed => &mut self.managed,
            Side::Native => &mut self.native,
        }
    }

    /// A bridge symbol not yet handed out by this session.
    pub fn next_symbol(&mut self) -> String {
        let symbol = format!("{}_bridge{}", self.prefix, self.next_bridge);
        self.next_bridge += 1;
        symbol
    }

    /// Record a top-level declaration on the managed side.
    pub fn declare_managed(&mut self, declaration: String) {
        self.managed_declarations.push(declaration);
    }

    /// Record a top-level declaration on the native side.
    pub fn declare_native(&mut self, declaration: String) {
        self.native_declarations.push(declaration);
    }

    pub fn managed_declarations(&self) -> &[String] {
        &self.managed_declarations
    }

    pub fn native_declarations(&self) -> &[String] {
        &self.native_declarations
    }

    /// Run `f`; if it fails, restore the session to its prior state.
    pub fn atomically<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let snapshot = self.clone();
        let result = f(self);
        if result.is_err() {
            *self = snapshot;
        }
        result
    }

    /// Close all open scopes and hand out the generated code.
    pub fn into_fragments(self) -> BridgeFragments {
        BridgeFragments {
            managed: self.managed.finish(),
            native: self.native.finish(),
            managed_declarations: self.managed_declarations,
            native_declarations: self.native_declarations,
        }
    }
}

/// The output of a session: call-site code and top-level declarations for
/// each side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BridgeFragments {
    pub managed: Fragment,
    pub native: Fragment,
    pub managed_declarations: Vec<String>,
    pub native_declarations: Vec<String>,
}

/// `<owner>_<first 8 hex digits of sha256(owner)>`, restricted to identifier
/// characters.
fn symbol_prefix(owner: &str) -> String {
    let digest = Sha256::digest(owner.as_bytes());
    let hash: String = digest.iter().take(4).map(|b| format!("{b:02x}")).collect();
    let sanitized: String = owner
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    format!("{sanitized}_{hash}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;

    #[test]
    fn symbols_are_deterministic_and_unique() {
        let mut a = BridgeSession::new("make_point");
        let mut b = BridgeSession::new("make_point");
        let first = a.next_symbol();
        assert_eq!(first, b.next_symbol());
        assert_ne!(first, a.next_symbol());
        assert!(first.starts_with("make_point_"));
        assert!(first.ends_with("_bridge0"));
        // owner + '_' + 8 hex digits + "_bridge0"
        assert_eq!(first.len(), "make_point".len() + 1 + 8 + "_bridge0".len());
    }

    #[test]
    fn builders_by_side() {
        let mut s = BridgeSession::new("f");
        s.builder_mut(Side::Native).out("x = 1").unwrap();
        assert_eq!(s.builder_mut(Side::Managed).side(), Side::Managed);
        assert!(s.managed().is_empty());
        assert_eq!(s.into_fragments().native.render(), "x = 1;\n");
    }

    #[test]
    fn owners_are_sanitized() {
        let mut s = BridgeSession::new("NSString.length");
        assert!(s.next_symbol().starts_with("NSString_length_"));
    }

    #[test]
    fn failure_restores_state() {
        let mut s = BridgeSession::new("f");
        s.managed_mut().out("before()").unwrap();
        let result: Result<()> = s.atomically(|s| {
            s.managed_mut().out("during()")?;
            s.managed_mut().push_scope(None, Some("cleanup()"))?;
            s.declare_native("void f(void);".to_string());
            s.next_symbol();
            Err(BridgeError::unsupported("boom"))
        });
        assert!(result.is_err());
        assert_eq!(s.managed().depth(), 0);
        assert!(s.native_declarations().is_empty());
        assert!(s.next_symbol().ends_with("_bridge0"));
        let fragments = s.into_fragments();
        assert_eq!(fragments.managed.render(), "before()\n");
    }

    #[test]
    fn success_keeps_state() {
        let mut s = BridgeSession::new("f");
        s.atomically(|s| s.managed_mut().out("kept()")).unwrap();
        assert_eq!(s.into_fragments().managed.render(), "kept()\n");
    }
}
