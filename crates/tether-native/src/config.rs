//! Library configuration: what to index and how.
//!
//! Mirrors the knobs handed to the header indexer. The bridge generator never
//! reads this directly; it is consumed when a definition is turned into a
//! [`NativeIndex`](crate::index::NativeIndex) and when deciding which
//! declarations get stubs.

use serde::{Deserialize, Serialize};

use crate::error::{NativeError, Result};

/// Source language of the indexed headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "C", alias = "c")]
    C,
    #[serde(rename = "Objective-C", alias = "objective-c", alias = "ObjectiveC")]
    ObjectiveC,
}

impl Language {
    /// Clang `-x` argument for this language.
    pub fn clang_language(&self) -> &'static str {
        match self {
            Self::C => "c",
            Self::ObjectiveC => "objective-c",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::C => write!(f, "C"),
            Self::ObjectiveC => write!(f, "Objective-C"),
        }
    }
}

/// Indexing configuration for one library.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LibraryConfig {
    /// Library name.
    pub name: String,
    /// Headers to include.
    #[serde(default)]
    pub includes: Vec<String>,
    /// Extra source lines placed before the includes.
    #[serde(default)]
    pub preamble: Vec<String>,
    #[serde(default)]
    pub compiler_args: Vec<String>,
    #[serde(default)]
    pub linker_args: Vec<String>,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub exclude_system_libs: bool,
    #[serde(default)]
    pub exclude_dependent_modules: bool,
    /// Glob patterns over header paths; empty accepts every header.
    #[serde(default)]
    pub header_filter: Vec<String>,
    /// Functions that never get stubs.
    #[serde(default)]
    pub excluded_functions: Vec<String>,
}

impl LibraryConfig {
    /// Compile the header filter patterns.
    pub fn header_filter(&self) -> Result<HeaderFilter> {
        HeaderFilter::new(&self.header_filter)
    }

    /// Whether stubs should be generated for `function`.
    pub fn is_function_excluded(&self, function: &str) -> bool {
        self.excluded_functions.iter().any(|f| f == function)
    }

    /// Full compiler argument list for the indexer.
    pub fn indexer_args(&self) -> Vec<String> {
        let mut args = vec!["-x".to_string(), self.language.clang_language().to_string()];
        args.extend(self.compiler_args.iter().cloned());
        args
    }

    /// The synthetic translation unit handed to the indexer.
    pub fn translation_unit(&self) -> String {
        let mut src = String::new();
        for line in &self.preamble {
            src.push_str(line);
            src.push('\n');
        }
        for include in &self.includes {
            src.push_str(&format!("#include <{include}>\n"));
        }
        src
    }
}

/// A compiled header filter.
#[derive(Debug, Clone, Default)]
pub struct HeaderFilter {
    patterns: Vec<glob::Pattern>,
}

impl HeaderFilter {
    /// Compile glob patterns; fails on the first invalid pattern.
    pub fn new(patterns: &[String]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                glob::Pattern::new(p).map_err(|source| NativeError::InvalidHeaderFilter {
                    pattern: p.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Whether declarations from `header` belong to the library.
    pub fn accepts(&self, header: &str) -> bool {
        self.patterns.is_empty() || self.patterns.iter().any(|p| p.matches(header))
    }
}
