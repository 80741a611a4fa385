//! Safety checks run while the builder walks a function body.

use crate::Error;
use crate::context::TranslationContext;
use crate::parser::items::{Expr, ExprKind, Initializer};
use crate::region::scope::ScopeTracker;

pub type SafetyResult = Result<(), Error>;

/// Rejects leftover foreign runtime calls and internal-linkage function pointers that
/// would escape through an assignment, an initializer or a call argument.
pub struct SafetyChecks<'c, 'a> {
    ctx: &'c TranslationContext<'a>,
}

impl<'c, 'a> SafetyChecks<'c, 'a> {
    pub fn new(ctx: &'c TranslationContext<'a>) -> Self {
        Self { ctx }
    }

    pub fn check_expr(&self, expr: &Expr, scopes: &ScopeTracker<'_>) -> SafetyResult {
        let mut result = Ok(());
        expr.walk(&mut |e| {
            if result.is_err() {
                return;
            }
            result = self.check_node(e, scopes);
        });
        result
    }

    pub fn check_initializer(&self, init: &Initializer, scopes: &ScopeTracker<'_>) -> SafetyResult {
        match init {
            Initializer::Expr(expr) => {
                self.check_function_ref(expr, scopes)?;
                self.check_expr(expr, scopes)
            }
            Initializer::List(items) => items
                .iter()
                .try_for_each(|item| self.check_initializer(item, scopes)),
        }
    }

    /// Global initializers, checked once with no local scope in effect.
    pub fn check_globals(&self) -> SafetyResult {
        let scopes = ScopeTracker::new();
        self.ctx
            .globals()
            .iter()
            .filter_map(|g| g.init.as_ref())
            .try_for_each(|init| self.check_initializer(init, &scopes))
    }

    fn check_node(&self, expr: &Expr, scopes: &ScopeTracker<'_>) -> SafetyResult {
        match &expr.kind {
            ExprKind::Call { callee, args } => {
                if let Some(name) = callee.as_ident()
                    && self.ctx.config.is_forbidden_call(name)
                    && scopes.lookup(name).is_none()
                {
                    return Err(Error::safety(
                        expr.span.line,
                        format!("call to `{name}` has no task-runtime translation"),
                    ));
                }
                args.iter()
                    .try_for_each(|arg| self.check_function_ref(arg, scopes))
            }
            ExprKind::Assign { rhs, .. } => self.check_function_ref(rhs, scopes),
            _ => Ok(()),
        }
    }

    /// `f`, `&f` or a cast of either, where `f` is a static function.
    fn check_function_ref(&self, expr: &Expr, scopes: &ScopeTracker<'_>) -> SafetyResult {
        let mut target = expr.peel();
        loop {
            match &target.kind {
                ExprKind::Cast { expr, .. } => target = expr.peel(),
                ExprKind::Unary { op, operand } if op == "&" => target = operand.peel(),
                _ => break,
            }
        }

        if let ExprKind::Ident(name) = &target.kind
            && self.ctx.is_internal_function(name)
            && scopes.lookup(name).is_none()
        {
            return Err(Error::safety(
                expr.span.line,
                format!("pointer to internal-linkage function `{name}` cannot be captured"),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::parser::grammar::parse;
    use crate::parser::items::StmtKind;

    fn check_body(src: &str) -> SafetyResult {
        let unit = parse(src)?;
        let config = Config::default();
        let ctx = TranslationContext::new(&unit, &config);
        let checks = SafetyChecks::new(&ctx);
        checks.check_globals()?;

        let mut scopes = ScopeTracker::new();
        for function in unit.functions().filter(|f| f.name == "f") {
            for stmt in function.body_statements() {
                match &stmt.kind {
                    StmtKind::Expr(e) => checks.check_expr(e, &scopes)?,
                    StmtKind::Decl(decls) => {
                        for decl in decls {
                            if let Some(init) = &decl.init {
                                checks.check_initializer(init, &scopes)?;
                            }
                            scopes.declare(decl);
                        }
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    #[test]
    fn test_static_function_pointer_is_rejected() {
        let prelude = "static int helper(int x) { return x; }\nint api(int x);\n";
        for body in [
            "void f(void) { int (*p)(int); p = helper; }",
            "void f(void) { int (*p)(int) = &helper; }",
            "void f(void) { run(1, (void *)helper); }",
        ] {
            let err = check_body(&format!("{prelude}{body}")).unwrap_err();
            assert_eq!(err.kind(), Some(crate::TranslationErrorKind::Safety));
        }

        assert!(check_body(&format!("{prelude}void f(void) {{ int x = helper(2); }}")).is_ok());
        assert!(check_body(&format!("{prelude}void f(void) {{ run(api); }}")).is_ok());
    }

    #[test]
    fn test_shadowing_variable_is_not_a_function() {
        let src = "static int helper(int x) { return x; }\nvoid f(void) { int helper = 3; int y = helper; }";
        assert!(check_body(src).is_ok());
    }

    #[test]
    fn test_foreign_runtime_call_is_rejected() {
        let err = check_body("void f(void) {\n  int t;\n  t = omp_get_thread_num();\n}").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("omp_get_thread_num"));
        assert!(message.contains("line 3"));
    }

    #[test]
    fn test_global_initializer_is_checked() {
        let src = "static void cb(void) {}\nvoid (*handler)(void) = cb;\nvoid f(void) {}";
        assert!(check_body(src).is_err());
    }
}
