//! Top-level orchestration: runs every phase over a module set and publishes
//! a read-only [`Program`] (§4.6 "Compiler orchestration", §5 "Concurrency &
//! resource model").
//!
//! Phases run to completion in sequence — annotate, topologically sort +
//! type-check, index — each collecting as many diagnostics as it safely can
//! before the next begins (§4.6 "Error aggregation"). Nothing here is
//! parallel; a [`CancellationToken`] is checked at rule boundaries within
//! each phase so a long compile can be aborted without returning a partial
//! `Program`.

use crate::annotations::AnnotationSet;
use crate::ast::Module;
use crate::config::CompilerOptions;
use crate::error::{CompileError, CompilerError};
use crate::index::Index;
use crate::typecheck::Checker;
use crate::types::tree::TypeTree;
use crate::value::Term;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, info_span};

/// Cooperative cancellation handle, checked at rule boundaries (§5
/// "Cancellation"). Cloning shares the same underlying flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The published result of a successful compile. Every field is behind an
/// `Arc` over an immutable structure — no `Mutex`/`RefCell` — so evaluator
/// threads can share it without synchronization (§5).
#[derive(Debug, Clone)]
pub struct Program {
    pub type_tree: Arc<TypeTree>,
    pub annotations: Arc<AnnotationSet>,
    indexes: Arc<HashMap<Vec<Term>, Index>>,
}

impl Program {
    /// The type recorded at `path`, if the checker ever inserted one.
    pub fn type_of(&self, path: &[Term]) -> Option<crate::types::Type> {
        self.type_tree.get(path)
    }

    /// The rule index for the ruleset rooted at `path` (a rule head's ref),
    /// if any rule in the compiled modules used that head.
    pub fn index(&self, path: &[Term]) -> Option<&Index> {
        self.indexes.get(path)
    }
}

/// Drives a full compile over `modules`, returning either a published
/// [`Program`] or the diagnostics that prevented one (§4.6 "Contract").
pub struct Compiler {
    token: CancellationToken,
}

impl Compiler {
    pub fn new() -> Self {
        Compiler {
            token: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(token: CancellationToken) -> Self {
        Compiler { token }
    }

    pub fn compile(&self, modules: &[Module], opts: &CompilerOptions) -> Result<Program, CompilerError> {
        self.compile_with_annotations(modules, AnnotationSet::new(), opts)
    }

    /// Same contract as [`Compiler::compile`], but takes an already-collected
    /// `AnnotationSet` — this crate's `Module` shape carries no raw source
    /// text, so scanning `# METADATA` comment blocks (§4.3, §6) happens
    /// upstream of this orchestration layer; callers that have the original
    /// source pass the result of that scan here.
    pub fn compile_with_annotations(
        &self,
        modules: &[Module],
        annotations: AnnotationSet,
        opts: &CompilerOptions,
    ) -> Result<Program, CompilerError> {
        let rule_count: usize = modules.iter().map(|m| m.rules.len()).sum();
        info!(modules = modules.len(), rules = rule_count, "compile.start");

        {
            let _span = info_span!("compile.annotate", annotations = annotations.flatten().len()).entered();
            self.check_cancelled()?;
        }

        let mut checker = Checker::new();
        let diags = {
            let _span = info_span!("compile.typecheck", modules = modules.len()).entered();
            self.check_cancelled()?;
            let diags = checker.check_modules(modules, opts);
            debug!(errors = diags.len(), "compile.typecheck.done");
            diags
        };
        if has_fatal(&diags) {
            return Err(CompilerError::Diagnostics(diags));
        }

        let indexes = self.index_phase(modules, opts)?;

        if !diags.is_empty() {
            return Err(CompilerError::Diagnostics(diags));
        }

        info!(
            indexed_rulesets = indexes.len(),
            "compile.done"
        );
        Ok(Program {
            type_tree: Arc::new(checker.type_tree),
            annotations: Arc::new(annotations),
            indexes: Arc::new(indexes),
        })
    }

    fn index_phase(
        &self,
        modules: &[Module],
        opts: &CompilerOptions,
    ) -> Result<HashMap<Vec<Term>, Index>, CompilerError> {
        let _span = info_span!("compile.index", modules = modules.len()).entered();
        let blocklist = opts.non_pure_blocklist();
        let mut by_head: HashMap<Vec<Term>, Vec<crate::ast::Rule>> = HashMap::new();
        for module in modules {
            for rule in &module.rules {
                self.check_cancelled()?;
                let path = head_path(&rule.head);
                by_head.entry(path).or_default().push(rule.clone());
            }
        }

        let mut indexes = HashMap::new();
        for (path, rules) in by_head {
            self.check_cancelled()?;
            match Index::build(&rules, &blocklist) {
                Ok(index) => {
                    indexes.insert(path, index);
                }
                Err(crate::index::BuildError::EmptyRuleSet) => {}
            }
        }
        debug!(rulesets = indexes.len(), "compile.index.done");
        Ok(indexes)
    }

    fn check_cancelled(&self) -> Result<(), CompilerError> {
        if self.token.is_cancelled() {
            return Err(CompilerError::Cancelled);
        }
        Ok(())
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Compiler::new()
    }
}

fn head_path(head: &crate::ast::Head) -> Vec<Term> {
    match &head.name.value {
        crate::value::Value::Ref(parts) => parts.clone(),
        _ => vec![head.name.clone()],
    }
}

fn has_fatal(diags: &[CompileError]) -> bool {
    diags
        .iter()
        .any(|d| matches!(d.code, crate::error::ErrorCode::RecursionErr))
}
