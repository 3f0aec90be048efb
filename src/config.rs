//! Compile-time configuration (§4.7 "Config & diagnostics surface").
//!
//! Loaded the same way the rest of this corpus loads configuration:
//! `compiler.toml` (base), `compiler.local.toml` (git-ignored local
//! overrides), then `PL_COMPILE__*` environment variables, merged in that
//! order via `figment`.
//!
//! ```toml
//! # compiler.toml
//! strict_mode = false
//! non_pure_builtins = ["trace", "rand.intn", "time.now_ns"]
//!
//! [diagnostics]
//! unused_imports = "warn"
//! unused_vars = "warn"
//! ```
//!
//! ```bash
//! PL_COMPILE__STRICT_MODE=true
//! PL_COMPILE__DIAGNOSTICS__UNUSED_IMPORTS=error
//! ```

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How a non-fatal diagnostic should be surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Off,
    Warn,
    Error,
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Warn
    }
}

/// Toggles for diagnostics that are informational by default but can be
/// escalated (§4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    #[serde(default)]
    pub unused_imports: Severity,
    #[serde(default)]
    pub unused_vars: Severity,
    /// When the rule-dependency graph has a cycle that topological sort
    /// can't order: `Error` aborts compilation (default), `Warn` degrades to
    /// declaration order with a diagnostic (§4.7).
    #[serde(default = "default_recursion_severity")]
    pub unresolvable_recursion: Severity,
}

fn default_recursion_severity() -> Severity {
    Severity::Error
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        DiagnosticsConfig {
            unused_imports: Severity::Warn,
            unused_vars: Severity::Warn,
            unresolvable_recursion: default_recursion_severity(),
        }
    }
}

/// Compiler-wide configuration (§4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerOptions {
    /// Unsafe-var and unused-import/var diagnostics become hard errors.
    #[serde(default)]
    pub strict_mode: bool,

    /// Builtins the indexer must never try to extract a conjunct from,
    /// because calling them has side effects or non-deterministic results
    /// (`trace`, RNG, wall-clock reads). Matched rules that call one of
    /// these are still evaluated — they're just not trie-optimized (§4.4
    /// "Non-pure calls").
    #[serde(default = "default_non_pure_builtins")]
    pub non_pure_builtins: Vec<String>,

    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

fn default_non_pure_builtins() -> Vec<String> {
    vec![
        "trace".to_string(),
        "rand.intn".to_string(),
        "time.now_ns".to_string(),
        "uuid.rfc4122".to_string(),
    ]
}

impl CompilerOptions {
    /// Loads configuration from the default file locations, then env
    /// overrides, in that merge order (§4.7).
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("compiler.toml"))
            .merge(Toml::file("compiler.local.toml"))
            .merge(Env::prefixed("PL_COMPILE__").split("__"))
            .extract()
    }

    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("PL_COMPILE__").split("__"))
            .extract()
    }

    /// The non-pure builtin blocklist as a lookup set, for the indexer
    /// (§4.4 "Non-pure calls").
    pub fn non_pure_blocklist(&self) -> HashSet<String> {
        self.non_pure_builtins.iter().cloned().collect()
    }
}

impl Default for CompilerOptions {
    fn default() -> Self {
        CompilerOptions {
            strict_mode: false,
            non_pure_builtins: default_non_pure_builtins(),
            diagnostics: DiagnosticsConfig::default(),
        }
    }
}
