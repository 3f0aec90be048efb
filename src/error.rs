//! Compiler error taxonomy and the wire shape callers see (§6, §7).
//!
//! Mirrors the layering the rest of this crate uses elsewhere: small
//! `thiserror` enums per subsystem, aggregated here into the error the
//! `Compiler` surfaces.

use crate::location::SourceLoc;
use crate::types::Type;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error codes in the `{code, location, message, details}` JSON shape (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    ParseErr,
    CompileErr,
    TypeErr,
    UnsafeVarErr,
    RecursionErr,
    MissingInputErr,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::ParseErr => "parse_error",
            ErrorCode::CompileErr => "compile_error",
            ErrorCode::TypeErr => "type_error",
            ErrorCode::UnsafeVarErr => "unsafe_var_error",
            ErrorCode::RecursionErr => "recursion_error",
            ErrorCode::MissingInputErr => "missing_input_error",
        };
        write!(f, "{s}")
    }
}

/// Sub-detail for a `TypeErr`, matching §4.2's error taxonomy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeErrorDetail {
    /// A call/builtin argument didn't unify with the expected type.
    ArgErr { have: String, want: String },
    /// Two sides of `=`/`==` could not unify.
    UnificationErr { left: String, right: String },
    /// A ref operand isn't legal at this position at all (e.g. indexing a scalar).
    RefErrUnsupported { pos: usize, have: String },
    /// A ref operand's type doesn't match any of the node's known keys.
    RefErrInvalid {
        pos: usize,
        have: String,
        want: String,
        one_of: Vec<String>,
    },
    /// A ref walks off the end of the type tree with nothing left to check.
    RefErrMissing,
}

impl fmt::Display for TypeErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeErrorDetail::ArgErr { have, want } => {
                write!(f, "expected {want} but got {have}")
            }
            TypeErrorDetail::UnificationErr { left, right } => {
                write!(f, "types {left} and {right} do not unify")
            }
            TypeErrorDetail::RefErrUnsupported { pos, have } => {
                write!(f, "operand {pos} ({have}) does not support ref indexing")
            }
            TypeErrorDetail::RefErrInvalid {
                pos,
                have,
                want,
                one_of,
            } => {
                write!(
                    f,
                    "operand {pos} ({have}) is not one of {want}; have one of [{}]",
                    one_of.join(", ")
                )
            }
            TypeErrorDetail::RefErrMissing => write!(f, "missing ref operand"),
        }
    }
}

/// A single compile-time diagnostic, in source order (§5 ordering guarantees).
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{code} at {location}: {message}")]
pub struct CompileError {
    pub code: ErrorCode,
    pub location: SourceLoc,
    pub message: String,
    #[serde(default)]
    pub details: Option<TypeErrorDetail>,
}

impl CompileError {
    pub fn new(code: ErrorCode, location: SourceLoc, message: impl Into<String>) -> Self {
        CompileError {
            code,
            location,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_detail(mut self, detail: TypeErrorDetail) -> Self {
        self.details = Some(detail);
        self
    }

    pub fn type_err(location: SourceLoc, detail: TypeErrorDetail) -> Self {
        let message = detail.to_string();
        CompileError::new(ErrorCode::TypeErr, location, message).with_detail(detail)
    }

    pub fn recursion(location: SourceLoc, cycle: &[String]) -> Self {
        CompileError::new(
            ErrorCode::RecursionErr,
            location,
            format!("recursive reference: {}", cycle.join(" -> ")),
        )
    }

    pub fn unsafe_var(location: SourceLoc, var: &str) -> Self {
        CompileError::new(
            ErrorCode::UnsafeVarErr,
            location,
            format!("var {var} is unsafe"),
        )
    }

    /// True if this error was ultimately rooted in a type already reported as
    /// unknown/`nil`. Used to suppress cascading diagnostics (§4.2, §7).
    pub fn is_cascade_of(&self, nil_type: &Type) -> bool {
        nil_type.is_nil()
            && matches!(
                self.details,
                Some(TypeErrorDetail::UnificationErr { .. }) | Some(TypeErrorDetail::ArgErr { .. })
            )
    }
}

/// Errors the orchestration layer (`Compiler::compile`) can raise that are
/// not per-diagnostic (those go in `Vec<CompileError>`), but abort the whole
/// compile outright.
#[derive(Debug, Error)]
pub enum CompilerError {
    #[error("compilation produced {0} error(s)")]
    Diagnostics(Vec<CompileError>),

    #[error("compilation cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type CompileResult<T> = Result<T, CompilerError>;
