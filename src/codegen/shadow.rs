//! Which captured names a region body redeclares, and whether the captured variable is
//! still used around the redeclaration.
//!
//! Substitution is textual, so a name can only be rewritten everywhere or nowhere. The
//! walk below tells the two cases apart and reports the mix neither can express.

use std::collections::{BTreeMap, HashSet};

use crate::Error;
use crate::context::TranslationContext;
use crate::directive::Directive;
use crate::parser::items::{Expr, ExprKind, ForInit, Stmt, StmtKind, VarDecl};
use crate::region::scope::ScopeTracker;

#[derive(Debug, Default)]
pub struct NameUses<'n> {
    /// First line each name is redeclared on.
    redeclared: BTreeMap<&'n str, usize>,
    /// Names used at least once where the captured variable is the one in scope.
    outer: HashSet<&'n str>,
}

impl<'n> NameUses<'n> {
    /// Names the body redeclares, with the line of the first redeclaration.
    pub fn redeclared(&self) -> impl Iterator<Item = (&'n str, usize)> + '_ {
        self.redeclared.iter().map(|(&name, &line)| (name, line))
    }

    pub fn used_outside(&self, name: &str) -> bool {
        self.outer.contains(name)
    }
}

/// Walks `body`, resolving every use of `names` against the declarations the body makes.
pub fn resolve<'a, 'n>(
    body: &'a Stmt,
    names: &[&'n str],
    ctx: &TranslationContext<'_>,
) -> Result<NameUses<'n>, Error> {
    let mut resolver = Resolver {
        ctx,
        names,
        scopes: ScopeTracker::new(),
        uses: NameUses::default(),
    };
    resolver.stmt(body)?;
    Ok(resolver.uses)
}

struct Resolver<'c, 'a, 'n> {
    ctx: &'c TranslationContext<'c>,
    names: &'c [&'n str],
    /// Declarations made inside the body only.
    scopes: ScopeTracker<'a>,
    uses: NameUses<'n>,
}

impl<'a, 'n> Resolver<'_, 'a, 'n> {
    fn tracked(&self, name: &str) -> Option<&'n str> {
        self.names.iter().find(|&&n| n == name).copied()
    }

    fn use_name(&mut self, name: &str) {
        if let Some(name) = self.tracked(name)
            && self.scopes.lookup(name).is_none()
        {
            self.uses.outer.insert(name);
        }
    }

    fn expr(&mut self, expr: &Expr) {
        let mut idents = vec![];
        expr.walk(&mut |e| {
            if let ExprKind::Ident(name) = &e.kind {
                idents.push(name.as_str());
            }
        });
        for name in idents {
            self.use_name(name);
        }
    }

    /// A declarator is in scope from its own initializer on.
    fn declare(&mut self, decls: &'a [VarDecl]) {
        for decl in decls {
            if let Some(name) = self.tracked(&decl.name) {
                self.uses.redeclared.entry(name).or_insert(decl.span.line);
            }
            self.scopes.declare(decl);
            if let Some(init) = &decl.init {
                let mut idents = vec![];
                init.walk(&mut |e| {
                    if let ExprKind::Ident(name) = &e.kind {
                        idents.push(name.as_str());
                    }
                });
                for name in idents {
                    self.use_name(name);
                }
            }
        }
    }

    fn block(&mut self, stmts: &'a [Stmt]) -> Result<(), Error> {
        let mut skip_body = false;
        for stmt in stmts {
            match self.ctx.sentinel(stmt)? {
                Some((name, clauses)) => {
                    let directive = Directive::parse(name, clauses, stmt.span.line)?;
                    if directive.is_closure() {
                        // The call site left here stores every visible shared name.
                        for &name in self.names {
                            self.use_name(name);
                        }
                        skip_body = true;
                    }
                }
                // A closure body has moved into its own kernel.
                None if skip_body => skip_body = false,
                None => self.stmt(stmt)?,
            }
        }
        Ok(())
    }

    fn stmt(&mut self, stmt: &'a Stmt) -> Result<(), Error> {
        match &stmt.kind {
            StmtKind::Compound(stmts) => {
                let depth = self.scopes.enter();
                self.block(stmts)?;
                self.scopes.exit(depth, stmt.span.end_line)?;
            }
            StmtKind::Decl(decls) => self.declare(decls),
            StmtKind::Expr(expr) | StmtKind::Return(Some(expr)) => self.expr(expr),
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                self.expr(cond);
                self.stmt(then)?;
                if let Some(otherwise) = otherwise {
                    self.stmt(otherwise)?;
                }
            }
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => {
                let depth = self.scopes.enter();
                match init {
                    Some(ForInit::Decl(decls)) => self.declare(decls),
                    Some(ForInit::Expr(expr)) => self.expr(expr),
                    None => {}
                }
                for expr in cond.iter().chain(step) {
                    self.expr(expr);
                }
                self.stmt(body)?;
                self.scopes.exit(depth, stmt.span.end_line)?;
            }
            StmtKind::While { cond, body }
            | StmtKind::DoWhile { body, cond }
            | StmtKind::Switch { cond, body } => {
                self.expr(cond);
                self.stmt(body)?;
            }
            StmtKind::Return(None)
            | StmtKind::Break
            | StmtKind::Continue
            | StmtKind::Goto(_)
            | StmtKind::Label
            | StmtKind::Empty => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::parser::grammar::parse;
    use crate::parser::preprocess::encode;

    fn uses(src: &str, names: &[&'static str]) -> Vec<(&'static str, Option<usize>, bool)> {
        let unit = parse(&encode(src, "__taskify_pragma").source).unwrap();
        let config = Config::default();
        let ctx = TranslationContext::new(&unit, &config);
        let function = unit.functions().next().unwrap();
        let resolved = resolve(&function.body, names, &ctx).unwrap();
        names
            .iter()
            .map(|&n| {
                let line = resolved.redeclared().find(|&(r, _)| r == n).map(|(_, l)| l);
                (n, line, resolved.used_outside(n))
            })
            .collect()
    }

    #[test]
    fn test_inner_block_shadows_after_outer_use() {
        let src = "void f(void) {\n  x += 1;\n  {\n    int x = 1;\n    x++;\n  }\n  y = 2;\n}\n";
        assert_eq!(
            uses(src, &["x", "y"]),
            vec![("x", Some(4), true), ("y", None, true)]
        );
    }

    #[test]
    fn test_uses_after_the_block_resolve_outside() {
        let src = "void f(void) {\n  {\n    int x = 1;\n    x++;\n  }\n  g(x);\n}\n";
        assert_eq!(uses(src, &["x"]), vec![("x", Some(3), true)]);
    }

    #[test]
    fn test_redeclaration_covering_every_use() {
        let src = "void f(void) {\n  int x = 0;\n  for (int y = x; y < 3; y++) x += y;\n}\n";
        assert_eq!(
            uses(src, &["x", "y"]),
            vec![("x", Some(2), false), ("y", Some(3), false)]
        );
    }

    #[test]
    fn test_initializer_sees_its_own_declarator() {
        let src = "void f(void) {\n  int x = x + 1, y = x;\n}\n";
        assert_eq!(
            uses(src, &["x", "y"]),
            vec![("x", Some(2), false), ("y", Some(2), false)]
        );
    }

    #[test]
    fn test_closure_body_is_skipped_and_its_call_site_counts() {
        let src = "void f(void) {\n  x = 1;\n#pragma omp task\n  {\n    int x = 2;\n    x++;\n  }\n}\n";
        assert_eq!(uses(src, &["x"]), vec![("x", None, true)]);

        let src = "void f(void) {\n  int x = 1;\n#pragma omp task\n  g(x);\n}\n";
        assert_eq!(uses(src, &["x"]), vec![("x", Some(2), false)]);
    }
}
