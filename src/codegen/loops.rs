//! Canonical loop recognition for work-shared loops.

use crate::Error;
use crate::parser::items::{Expr, ExprKind, ForInit, Stmt, StmtKind, VarDecl};

/// `for (var = low; var < high; var++)`, the only shape that is distributed.
#[derive(Debug)]
pub struct LoopShape<'a> {
    pub var: String,
    /// Declaration made by the loop's own init clause.
    pub decl: Option<&'a VarDecl>,
    pub low: &'a Expr,
    pub high: &'a Expr,
    pub stride: i64,
    pub body: &'a Stmt,
}

fn unsupported(line: usize, what: &str) -> Error {
    Error::semantic(line, format!("unsupported loop shape: {what}"))
}

pub fn extract(stmt: &Stmt) -> Result<LoopShape<'_>, Error> {
    let line = stmt.span.line;
    let StmtKind::For {
        init,
        cond,
        step,
        body,
    } = &stmt.kind
    else {
        return Err(unsupported(line, "work-sharing directive must precede a `for` loop"));
    };

    let (var, decl, low) = match init {
        Some(ForInit::Expr(Expr {
            kind: ExprKind::Assign { op, lhs, rhs },
            ..
        })) if op == "=" => {
            let var = lhs
                .as_ident()
                .ok_or_else(|| unsupported(line, "init must assign a plain variable"))?;
            (var.to_string(), None, rhs.as_ref())
        }
        Some(ForInit::Decl(decls)) if decls.len() == 1 => {
            let decl = &decls[0];
            let low = decl
                .init
                .as_ref()
                .and_then(|i| i.as_expr())
                .ok_or_else(|| unsupported(line, "induction variable needs an initial value"))?;
            (decl.name.clone(), Some(decl), low)
        }
        _ => return Err(unsupported(line, "init must be `var = expr`")),
    };

    let high = match cond.as_ref().map(|c| &c.peel().kind) {
        Some(ExprKind::Binary { op, lhs, rhs })
            if op == "<" && lhs.as_ident() == Some(var.as_str()) =>
        {
            rhs.as_ref()
        }
        _ => return Err(unsupported(line, &format!("condition must be `{var} < expr`"))),
    };

    let stride = match step.as_ref().map(|s| &s.peel().kind) {
        Some(ExprKind::Postfix { op, operand } | ExprKind::Unary { op, operand })
            if operand.as_ident() == Some(var.as_str()) && (op == "++" || op == "--") =>
        {
            if op == "--" {
                return Err(unsupported(
                    line,
                    &format!("`{var}--` contradicts the ascending bound `{var} < ...`"),
                ));
            }
            1
        }
        _ => return Err(unsupported(line, &format!("step must be `{var}++`"))),
    };

    Ok(LoopShape {
        var,
        decl,
        low,
        high,
        stride,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::grammar::parse;
    use crate::parser::items::TranslationUnit;

    fn with_loop<T>(header: &str, f: impl FnOnce(&str, Result<LoopShape<'_>, Error>) -> T) -> T {
        let src = format!("void f(int n, int m) {{ int i; for ({header}) {{ }} }}");
        let unit: TranslationUnit = parse(&src).unwrap();
        let function = unit.functions().next().unwrap();
        f(&src, extract(&function.body_statements()[1]))
    }

    fn text<'s>(src: &'s str, e: &Expr) -> &'s str {
        &src[e.span.range()]
    }

    #[test]
    fn test_canonical_loop() {
        with_loop("i = 0; i < n; i++", |src, shape| {
            let shape = shape.unwrap();
            assert_eq!(
                (shape.var.as_str(), text(src, shape.low), text(src, shape.high), shape.stride),
                ("i", "0", "n", 1)
            );
            assert!(shape.decl.is_none());
        });
    }

    #[test]
    fn test_lower_bound_expression() {
        with_loop("i = m; i < n; ++i", |src, shape| {
            assert_eq!(text(src, shape.unwrap().low), "m");
        });
        with_loop("int j = m + 1; j < n * 2; j++", |src, shape| {
            let shape = shape.unwrap();
            assert_eq!(shape.var, "j");
            assert_eq!(text(src, shape.low), "m + 1");
            assert_eq!(text(src, shape.high), "n * 2");
            assert!(shape.decl.is_some());
        });
    }

    #[test]
    fn test_decrement_is_rejected() {
        with_loop("i = 0; i < n; i--", |_, shape| {
            let err = shape.unwrap_err();
            assert_eq!(err.kind(), Some(crate::TranslationErrorKind::Semantic));
        });
    }

    #[test]
    fn test_irregular_loops_are_rejected() {
        for header in [
            "i = 0; i <= n; i++",
            "i = 0; n > i; i++",
            "i = 0; i < n; i += 2",
            "; i < n; i++",
            "i = 0, m = 1; i < n; i++",
        ] {
            with_loop(header, |_, shape| assert!(shape.is_err(), "{header}"));
        }
    }
}
