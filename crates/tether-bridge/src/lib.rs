//! Type-directed bridge generation between managed code and native code.
//!
//! Given a [`NativeIndex`](tether_native::NativeIndex), generates the two
//! halves of a call that crosses the managed/native boundary: managed-side
//! code at the call site and the matching native definitions. Only scalars
//! and pointer-width values cross the boundary itself; records travel by
//! address, with native heap temporaries for record returns.
//!
//! ## Modules
//!
//! - [`expr`] - Generated expressions bound to the scope that keeps them valid
//! - [`builder`] - Scoped code builders and rendered fragments
//! - [`session`] - Per-generation state shared by both sides
//! - [`mirror`] - Per-type managed/bridged/native conversions
//! - [`simple`] - Boundary signatures for scalar bridges
//! - [`mapping`] - Full marshalling for declared native types
//! - [`stub`] - Function stubs, callback trampolines and library reports

pub mod builder;
pub mod error;
pub mod expr;
pub mod mapping;
pub mod mirror;
pub mod session;
pub mod simple;
pub mod stub;

pub use builder::{CodeBuilder, Fragment, ScopeId, Side};
pub use error::{BridgeError, Result};
pub use expr::Expr;
pub use mapping::{MappingBridgeGenerator, TypedValue};
pub use mirror::{
    BridgedType, BridgedValue, DeclarationMapper, ManagedValue, Mirror, MirrorKind, MirrorSource,
    ScalarKind,
};
pub use session::{BridgeFragments, BridgeSession};
pub use simple::{BridgeCallback, BridgeGenerator, BridgeValue, Direction, SimpleBridgeGenerator};
pub use stub::{SkippedDeclaration, Stub, StubGenerator, StubKind, StubReport};
