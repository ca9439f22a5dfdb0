//! Native model error types.

/// Errors that can occur while building or querying the native declaration model.
#[derive(Debug, thiserror::Error)]
pub enum NativeError {
    /// Failed to parse a C prototype or type spelling.
    #[error("invalid C prototype: {detail}")]
    InvalidPrototype { detail: String },

    /// A type name could not be resolved against the index.
    #[error("unknown type '{name}'")]
    UnknownType { name: String },

    /// A library definition file is structurally invalid.
    #[error("invalid library definition: {detail}")]
    InvalidDefinition { detail: String },

    /// A typedef chain never reaches a concrete type.
    #[error("typedef '{name}' is part of a cycle")]
    TypedefCycle { name: String },

    /// A header filter pattern is not a valid glob.
    #[error("invalid header filter '{pattern}': {source}")]
    InvalidHeaderFilter {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for native model operations.
pub type Result<T> = std::result::Result<T, NativeError>;
