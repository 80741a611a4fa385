//! Single forward traversal of a function body that discovers directive regions.

use log::{debug, trace};
use petgraph::stable_graph::NodeIndex;

use super::scope::ScopeTracker;
use super::{RegionNode, RegionTree};
use crate::Error;
use crate::context::TranslationContext;
use crate::directive::{Directive, DirectiveKind};
use crate::parser::items::{ForInit, Function, Stmt, StmtKind, Storage, VarDecl};
use crate::validate::SafetyChecks;

/// Regions of one function plus the `(line, directive name)` of every sentinel seen.
#[derive(Debug)]
pub struct FunctionRegions<'a> {
    pub tree: RegionTree<RegionNode<'a>>,
    pub discovered: Vec<(usize, &'a str)>,
}

pub fn build<'a>(
    function: &'a Function,
    ctx: &TranslationContext<'a>,
) -> Result<FunctionRegions<'a>, Error> {
    let mut builder = Builder {
        ctx,
        checks: SafetyChecks::new(ctx),
        scopes: ScopeTracker::new(),
        regions: FunctionRegions {
            tree: RegionTree::new(),
            discovered: vec![],
        },
    };

    for param in &function.params {
        builder.scopes.declare(param);
    }
    builder.visit_stmt(&function.body)?;

    debug!(
        "{}: {} directive region(s)",
        function.name,
        builder.regions.tree.len()
    );
    Ok(builder.regions)
}

struct Builder<'c, 'a> {
    ctx: &'c TranslationContext<'a>,
    checks: SafetyChecks<'c, 'a>,
    scopes: ScopeTracker<'a>,
    regions: FunctionRegions<'a>,
}

impl<'a> Builder<'_, 'a> {
    fn declare(&mut self, decls: &'a [VarDecl]) -> Result<(), Error> {
        for decl in decls {
            if let Some(init) = &decl.init {
                self.checks.check_initializer(init, &self.scopes)?;
            }
            if decl.storage != Some(Storage::Typedef) {
                self.scopes.declare(decl);
            }
        }
        Ok(())
    }

    fn visit_block(&mut self, stmts: &'a [Stmt]) -> Result<(), Error> {
        for (i, stmt) in stmts.iter().enumerate() {
            match self.ctx.sentinel(stmt)? {
                Some((name, clauses)) => self.discover(stmts, i, name, clauses)?,
                None => self.visit_stmt(stmt)?,
            }
        }
        Ok(())
    }

    /// A statement that is not a direct element of a block.
    fn visit_nested(&mut self, stmt: &'a Stmt) -> Result<(), Error> {
        if self.ctx.sentinel(stmt)?.is_some() {
            return Err(Error::structural(
                stmt.span.line,
                "directive must appear directly inside a block",
            ));
        }
        self.visit_stmt(stmt)
    }

    fn visit_scoped(&mut self, stmt: &'a Stmt) -> Result<(), Error> {
        let depth = self.scopes.enter();
        self.visit_nested(stmt)?;
        self.scopes.exit(depth, stmt.span.end_line)
    }

    fn visit_stmt(&mut self, stmt: &'a Stmt) -> Result<(), Error> {
        match &stmt.kind {
            StmtKind::Compound(stmts) => {
                let depth = self.scopes.enter();
                self.visit_block(stmts)?;
                self.scopes.exit(depth, stmt.span.end_line)?;
            }
            StmtKind::Decl(decls) => self.declare(decls)?,
            StmtKind::Expr(expr) => self.checks.check_expr(expr, &self.scopes)?,
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                self.checks.check_expr(cond, &self.scopes)?;
                self.visit_nested(then)?;
                if let Some(otherwise) = otherwise {
                    self.visit_nested(otherwise)?;
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
                    Some(ForInit::Decl(decls)) => self.declare(decls)?,
                    Some(ForInit::Expr(expr)) => self.checks.check_expr(expr, &self.scopes)?,
                    None => {}
                }
                for expr in cond.iter().chain(step) {
                    self.checks.check_expr(expr, &self.scopes)?;
                }
                self.visit_scoped(body)?;
                self.scopes.exit(depth, stmt.span.end_line)?;
            }
            StmtKind::While { cond, body }
            | StmtKind::DoWhile { body, cond }
            | StmtKind::Switch { cond, body } => {
                self.checks.check_expr(cond, &self.scopes)?;
                self.visit_scoped(body)?;
            }
            StmtKind::Return(Some(expr)) => self.checks.check_expr(expr, &self.scopes)?,
            StmtKind::Return(None)
            | StmtKind::Break
            | StmtKind::Continue
            | StmtKind::Goto(_)
            | StmtKind::Label
            | StmtKind::Empty => {}
        }
        Ok(())
    }

    fn discover(
        &mut self,
        block: &'a [Stmt],
        index: usize,
        name: &'a str,
        clauses: &str,
    ) -> Result<(), Error> {
        let sentinel = &block[index];
        let line = sentinel.span.line;
        let mut directive = Directive::parse(name, clauses, line)?;

        let body = if directive.kind.has_body() {
            Some(self.resolve_body(block, index)?)
        } else {
            None
        };
        let span = body.map_or(sentinel.span, |b| sentinel.span.to(b.span));
        directive.last_line = span.end_line;

        trace!(
            "{} at lines {}..={} with {} clause(s)",
            directive.label(),
            line,
            directive.last_line,
            directive.clauses.len()
        );

        self.regions.discovered.push((line, name));
        let idx = self.regions.tree.insert(RegionNode {
            directive,
            sentinel,
            body,
            snapshot: self.scopes.visible_decls(),
            span,
        })?;
        self.inherit_sharing(idx);
        Ok(())
    }

    /// A work-sharing `for` directly inside a plain `parallel` runs with that region's
    /// data-sharing clauses.
    fn inherit_sharing(&mut self, idx: NodeIndex) {
        let tree = &self.regions.tree;
        let Some(outer) = tree
            .parent(idx)
            .and_then(|parent| tree.get(parent))
            .map(|parent| &parent.directive)
            .filter(|d| d.kind == DirectiveKind::Parallel && !d.is_loop())
            .cloned()
        else {
            return;
        };
        if let Some(node) = self.regions.tree.get_mut(idx)
            && node.directive.kind == DirectiveKind::For
        {
            trace!("{} takes the sharing clauses of {}", node.label(), outer.label());
            node.directive.inherit_sharing(&outer);
        }
    }

    /// The statement after the sentinel, or after the chain of body-carrying sentinels
    /// that follows it.
    fn resolve_body(&self, block: &'a [Stmt], index: usize) -> Result<&'a Stmt, Error> {
        let line = block[index].span.line;
        for stmt in &block[index + 1..] {
            let Some((name, _)) = self.ctx.sentinel(stmt)? else {
                return Ok(stmt);
            };
            let carries_body = DirectiveKind::from_name(name)
                .is_none_or(|kind| kind.has_body());
            if !carries_body {
                return Err(Error::structural(
                    line,
                    format!("directive is followed by bodyless `{name}` instead of a statement"),
                ));
            }
        }
        Err(Error::structural(
            line,
            "no statement follows the directive in its block",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::parser::grammar::parse;
    use crate::parser::items::TranslationUnit;
    use crate::parser::preprocess::encode;

    fn unit(src: &str) -> TranslationUnit {
        parse(&encode(src, "__taskify_pragma").source).unwrap()
    }

    fn with_regions<T>(
        src: &str,
        f: impl FnOnce(Result<FunctionRegions<'_>, Error>) -> T,
    ) -> T {
        let unit = unit(src);
        let config = Config::default();
        let ctx = TranslationContext::new(&unit, &config);
        let function = unit.functions().last().unwrap();
        f(build(function, &ctx))
    }

    const NESTED: &str = r#"int g;
void work(int n, int *a) {
  int sum = 0;
  #pragma omp parallel
  {
    #pragma omp single
    {
      int local = 1;
      #pragma omp task firstprivate(local)
      a[0] = local;
      #pragma omp task
      {
        a[1] = 2;
      }
      #pragma omp taskwait
    }
  }
  #pragma omp parallel for reduction(+:sum)
  for (int i = 0; i < n; i++)
    sum += a[i];
}
"#;

    #[test]
    fn test_builds_nested_tree() {
        with_regions(NESTED, |regions| {
            let regions = regions.unwrap();
            let tree = &regions.tree;
            assert_eq!(tree.len(), 6);

            let leaves: Vec<_> = tree
                .leaves()
                .into_iter()
                .filter_map(|l| tree.get(l))
                .map(|r| (r.directive.kind, r.directive.line, r.directive.last_line))
                .collect();
            assert_eq!(
                leaves,
                vec![
                    (DirectiveKind::Task, 9, 10),
                    (DirectiveKind::Task, 11, 14),
                    (DirectiveKind::Taskwait, 15, 15),
                    (DirectiveKind::Parallel, 18, 20),
                ]
            );
            assert_eq!(regions.discovered.len(), 6);
        });
    }

    #[test]
    fn test_snapshot_holds_visible_declarations() {
        with_regions(NESTED, |regions| {
            let regions = regions.unwrap();
            let tree = &regions.tree;
            let first_task = tree.leaves()[0];
            let names: Vec<_> = tree
                .get(first_task)
                .unwrap()
                .snapshot
                .iter()
                .map(|d| d.name.as_str())
                .collect();
            assert_eq!(names, ["n", "a", "sum", "local"]);
        });
    }

    #[test]
    fn test_directive_chain_extends_body() {
        let src = "void f(int n, int *a) {\n  #pragma omp parallel\n  #pragma omp for\n  for (int i = 0; i < n; i++)\n    a[i] = i;\n}\n";
        with_regions(src, |regions| {
            let regions = regions.unwrap();
            let tree = &regions.tree;
            let outer = tree.children(tree.root())[0];
            let outer_node = tree.get(outer).unwrap();
            assert_eq!((outer_node.directive.line, outer_node.directive.last_line), (2, 5));
            assert!(matches!(
                outer_node.body.map(|b| &b.kind),
                Some(StmtKind::For { .. })
            ));
            assert_eq!(tree.children(outer).len(), 1);
        });
    }

    #[test]
    fn test_loop_takes_sharing_of_enclosing_parallel() {
        let src = "void f(int n, double *v) {\n  double s = 0;\n  #pragma omp parallel reduction(+:s) num_threads(2)\n  {\n    #pragma omp for\n    for (int i = 0; i < n; i++)\n      s += v[i];\n    #pragma omp single\n    {\n      #pragma omp for\n      for (int i = 0; i < n; i++)\n        v[i] = 0;\n    }\n  }\n}\n";
        with_regions(src, |regions| {
            let regions = regions.unwrap();
            let tree = &regions.tree;
            let loops: Vec<_> = tree
                .iter()
                .filter(|r| r.directive.kind == DirectiveKind::For)
                .map(|r| (r.directive.line, r.directive.names("reduction", "s")))
                .collect();
            assert_eq!(loops.len(), 2);
            assert!(loops.contains(&(5, true)));
            assert!(loops.contains(&(10, false)));
        });
    }

    #[test]
    fn test_missing_body_is_structural() {
        let src = "void f(void) {\n  int x;\n  #pragma omp task\n}\n";
        with_regions(src, |regions| {
            let err = regions.unwrap_err();
            assert_eq!(err.kind(), Some(crate::TranslationErrorKind::Structural));
        });
    }

    #[test]
    fn test_directive_outside_block_is_structural() {
        let src = "void f(int c) {\n  if (c)\n    #pragma omp taskwait\n}\n";
        with_regions(src, |regions| assert!(regions.is_err()));
    }

    #[test]
    fn test_bodyless_directive_cannot_be_a_body() {
        let src = "void f(void) {\n  #pragma omp task\n  #pragma omp taskwait\n  f();\n}\n";
        with_regions(src, |regions| assert!(regions.is_err()));
    }

    #[test]
    fn test_safety_checks_run_during_traversal() {
        let src = "static void cb(void) {}\nvoid f(void) {\n  void (*p)(void);\n  {\n    p = cb;\n  }\n}\n";
        with_regions(src, |regions| {
            let err = regions.unwrap_err();
            assert_eq!(err.kind(), Some(crate::TranslationErrorKind::Safety));
        });
    }
}
