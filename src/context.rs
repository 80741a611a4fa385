//! Translation-unit facts shared by every per-function pass.

use std::collections::HashMap;

use log::debug;

use crate::config::Config;
use crate::parser::items::{DeclKind, Expr, ExprKind, Stmt, StmtKind, Storage, TranslationUnit, VarDecl};

/// Read-only view of the translation unit, built once before any function is traversed.
#[derive(Debug)]
pub struct TranslationContext<'a> {
    pub config: &'a Config,
    globals: Vec<&'a VarDecl>,
    /// Function name to "has internal linkage".
    functions: HashMap<&'a str, bool>,
}

impl<'a> TranslationContext<'a> {
    pub fn new(unit: &'a TranslationUnit, config: &'a Config) -> Self {
        let mut globals = vec![];
        let mut functions: HashMap<&str, bool> = HashMap::new();

        for decl in unit.declarations() {
            match (decl.kind, decl.storage) {
                (_, Some(Storage::Typedef)) => {}
                (DeclKind::Function, storage) => {
                    *functions.entry(&decl.name).or_default() |= storage == Some(Storage::Static);
                }
                _ => globals.push(decl),
            }
        }
        for function in unit.functions() {
            *functions.entry(&function.name).or_default() |= function.is_static;
        }

        debug!(
            "translation unit: {} globals, {} functions",
            globals.len(),
            functions.len()
        );
        Self {
            config,
            globals,
            functions,
        }
    }

    pub fn globals(&self) -> &[&'a VarDecl] {
        &self.globals
    }

    pub fn is_internal_function(&self, name: &str) -> bool {
        self.functions.get(name).copied().unwrap_or(false)
    }

    /// Decodes `stmt` if it is a sentinel call: `(directive name, clause text)`.
    ///
    /// A call to the sentinel symbol without the expected string arguments is reported as
    /// a structural error rather than ignored.
    pub fn sentinel<'s>(&self, stmt: &'s Stmt) -> Result<Option<(&'s str, &'s str)>, crate::Error> {
        let StmtKind::Expr(expr) = &stmt.kind else {
            return Ok(None);
        };
        let ExprKind::Call { callee, args } = &expr.kind else {
            return Ok(None);
        };
        if callee.as_ident() != Some(self.config.sentinel.as_str()) {
            return Ok(None);
        }

        let string = |e: &'s Expr| match &e.peel().kind {
            ExprKind::Str(s) => Some(s.as_str()),
            _ => None,
        };
        match args.as_slice() {
            [name, clauses, label] if string(label).is_some() => {
                match (string(name), string(clauses)) {
                    (Some(name), Some(clauses)) => Ok(Some((name, clauses))),
                    _ => Err(crate::Error::structural(
                        stmt.span.line,
                        "malformed directive sentinel",
                    )),
                }
            }
            _ => Err(crate::Error::structural(
                stmt.span.line,
                "malformed directive sentinel",
            )),
        }
    }
}
