use std::sync::LazyLock;

use pest::Parser;
use pest::iterators::{Pair, Pairs};
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest_derive::Parser;

use super::items::{
    DeclKind, Expr, ExprKind, ForInit, Function, Initializer, Item, Span, Stmt, StmtKind, Storage,
    TranslationUnit, VarDecl,
};
use crate::Error;

#[derive(Parser)]
#[grammar = "../grammar/c.pest"]
struct CParser;

static PRATT: LazyLock<PrattParser<Rule>> = LazyLock::new(|| {
    PrattParser::new()
        .op(Op::infix(Rule::op_lor, Assoc::Left))
        .op(Op::infix(Rule::op_land, Assoc::Left))
        .op(Op::infix(Rule::op_bor, Assoc::Left))
        .op(Op::infix(Rule::op_bxor, Assoc::Left))
        .op(Op::infix(Rule::op_band, Assoc::Left))
        .op(Op::infix(Rule::op_eq, Assoc::Left) | Op::infix(Rule::op_ne, Assoc::Left))
        .op(Op::infix(Rule::op_lt, Assoc::Left)
            | Op::infix(Rule::op_gt, Assoc::Left)
            | Op::infix(Rule::op_le, Assoc::Left)
            | Op::infix(Rule::op_ge, Assoc::Left))
        .op(Op::infix(Rule::op_shl, Assoc::Left) | Op::infix(Rule::op_shr, Assoc::Left))
        .op(Op::infix(Rule::op_add, Assoc::Left) | Op::infix(Rule::op_sub, Assoc::Left))
        .op(Op::infix(Rule::op_mul, Assoc::Left)
            | Op::infix(Rule::op_div, Assoc::Left)
            | Op::infix(Rule::op_mod, Assoc::Left))
});

/// Parses a whole translation unit.
pub fn parse(input: &str) -> Result<TranslationUnit, Error> {
    let unit = CParser::parse(Rule::translation_unit, input)
        .map_err(|e| Error::ParseError(e.to_string()))?
        .next()
        .ok_or_else(|| Error::ParseError("empty translation unit".to_string()))?;

    Builder::new(input).translation_unit(unit)
}

/// Maps byte offsets to 1-based line numbers.
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(input: &str) -> Self {
        let starts = std::iter::once(0)
            .chain(input.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { starts }
    }

    fn line(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(i) => i + 1,
            Err(i) => i,
        }
    }
}

struct Specs {
    text: String,
    storage: Option<Storage>,
}

struct Declarator {
    name: String,
    text: String,
    name_offset: usize,
    pointers: usize,
    kind: DeclKind,
    params: Option<Vec<VarDecl>>,
    /// Text after the first array suffix, used to decay array parameters.
    after_first_array: Option<String>,
}

struct Builder {
    lines: LineIndex,
}

fn malformed(what: &str) -> Error {
    Error::ParseError(format!("malformed {what}"))
}

fn take<'i>(pairs: &mut Pairs<'i, Rule>, what: &str) -> Result<Pair<'i, Rule>, Error> {
    pairs.next().ok_or_else(|| malformed(what))
}

fn is_keyword(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::kw_else
            | Rule::kw_do
            | Rule::kw_return
            | Rule::kw_break
            | Rule::kw_continue
            | Rule::kw_goto
            | Rule::kw_case
            | Rule::kw_default
            | Rule::kw_sizeof
    )
}

/// Children of `pair` with keyword tokens dropped.
fn significant(pair: Pair<'_, Rule>) -> Pairs<'_, Rule> {
    let mut inner = pair.into_inner();
    while inner.peek().is_some_and(|p| is_keyword(p.as_rule())) {
        inner.next();
    }
    inner
}

fn unescape(literal: &str) -> String {
    let body = literal
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(literal);

    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

impl Builder {
    fn new(input: &str) -> Self {
        Self {
            lines: LineIndex::new(input),
        }
    }

    fn span(&self, pair: &Pair<'_, Rule>) -> Span {
        let s = pair.as_span();
        let last = if s.end() > s.start() { s.end() - 1 } else { s.start() };
        Span {
            start: s.start(),
            end: s.end(),
            line: self.lines.line(s.start()),
            end_line: self.lines.line(last),
        }
    }

    fn translation_unit(&self, pair: Pair<'_, Rule>) -> Result<TranslationUnit, Error> {
        let mut items = vec![];
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::function_def => items.push(Item::Function(self.function(inner)?)),
                Rule::declaration => items.push(Item::Declaration(self.declaration(inner)?)),
                Rule::stray_semicolon | Rule::EOI => {}
                _ => return Err(malformed("translation unit")),
            }
        }
        Ok(TranslationUnit { items })
    }

    fn function(&self, pair: Pair<'_, Rule>) -> Result<Function, Error> {
        let span = self.span(&pair);
        let mut inner = pair.into_inner();
        let specs = self.decl_specs(take(&mut inner, "function specifiers")?);
        let declarator = self.declarator(take(&mut inner, "function declarator")?, false)?;
        let body = self.statement(take(&mut inner, "function body")?)?;

        let params = declarator.params.ok_or_else(|| {
            Error::ParseError(format!(
                "line {}: function definition `{}` has no parameter list",
                span.line, declarator.name
            ))
        })?;

        Ok(Function {
            name: declarator.name,
            return_type: specs.text,
            returns_pointer: declarator.pointers > 0,
            is_static: specs.storage == Some(Storage::Static),
            params,
            body,
            span,
        })
    }

    fn decl_specs(&self, pair: Pair<'_, Rule>) -> Specs {
        let mut words = vec![];
        let mut storage = None;
        for inner in pair.into_inner() {
            if inner.as_rule() == Rule::storage_class {
                storage = match inner.as_str() {
                    "static" => Some(Storage::Static),
                    "extern" => Some(Storage::Extern),
                    "typedef" => Some(Storage::Typedef),
                    "register" => Some(Storage::Register),
                    _ => Some(Storage::Auto),
                };
            } else {
                words.push(inner.as_str().split_whitespace().collect::<Vec<_>>().join(" "));
            }
        }
        Specs {
            text: words.join(" "),
            storage,
        }
    }

    fn declarator(&self, pair: Pair<'_, Rule>, decay_arrays: bool) -> Result<Declarator, Error> {
        let start = pair.as_span().start();
        // The span runs over the whitespace skipped before an absent suffix.
        let text = pair.as_str().trim_end().to_string();

        let mut pointers = 0;
        let mut direct = None;
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::pointer => pointers += 1,
                Rule::direct_declarator => direct = Some(inner),
                _ => return Err(malformed("declarator")),
            }
        }
        let direct = direct.ok_or_else(|| malformed("declarator"))?;

        let mut inner = direct.into_inner();
        let head = take(&mut inner, "declarator name")?;
        let (name_pair, through_pointer) = match head.as_rule() {
            Rule::ident => (head, false),
            Rule::fn_ptr_name => (take(&mut head.into_inner(), "function pointer name")?, true),
            _ => return Err(malformed("declarator name")),
        };
        let name = name_pair.as_str().to_string();
        let name_offset = name_pair.as_span().start() - start;

        let mut kind = DeclKind::Variable;
        let mut params = None;
        let mut after_first_array = None;
        for (i, suffix) in inner.enumerate() {
            match suffix.as_rule() {
                Rule::param_suffix if i == 0 => {
                    kind = if through_pointer {
                        DeclKind::FunctionPointer
                    } else {
                        DeclKind::Function
                    };
                    params = Some(self.params(suffix)?);
                }
                Rule::array_suffix if i == 0 && !through_pointer => {
                    kind = DeclKind::Array;
                    after_first_array = Some(text[suffix.as_span().end() - start..].to_string());
                }
                _ => {}
            }
        }

        let mut declarator = Declarator {
            name,
            text,
            name_offset,
            pointers,
            kind,
            params,
            after_first_array,
        };

        if decay_arrays
            && declarator.kind == DeclKind::Array
            && let Some(rest) = declarator.after_first_array.take()
        {
            let prefix = &declarator.text[..declarator.name_offset];
            let decayed = format!("{prefix}(*{}){rest}", declarator.name);
            declarator.name_offset = prefix.len() + 2;
            declarator.text = decayed;
            declarator.kind = DeclKind::Variable;
        }

        Ok(declarator)
    }

    fn params(&self, pair: Pair<'_, Rule>) -> Result<Vec<VarDecl>, Error> {
        let mut params = vec![];
        let Some(list) = pair.into_inner().next() else {
            return Ok(params);
        };

        for param in list.into_inner() {
            if param.as_rule() != Rule::param {
                continue;
            }
            let span = self.span(&param);
            let mut inner = param.into_inner();
            let specs = self.decl_specs(take(&mut inner, "parameter specifiers")?);
            let Some(declarator) = inner.next() else {
                continue;
            };
            if declarator.as_rule() != Rule::declarator {
                continue;
            }
            let declarator = self.declarator(declarator, true)?;
            params.push(self.var_decl(&specs, declarator, None, span));
        }
        Ok(params)
    }

    fn var_decl(
        &self,
        specs: &Specs,
        declarator: Declarator,
        init: Option<Initializer>,
        span: Span,
    ) -> VarDecl {
        VarDecl {
            name: declarator.name,
            specifiers: specs.text.clone(),
            declarator: declarator.text,
            name_offset: declarator.name_offset,
            kind: declarator.kind,
            storage: specs.storage,
            init,
            span,
        }
    }

    fn declaration(&self, pair: Pair<'_, Rule>) -> Result<Vec<VarDecl>, Error> {
        let mut inner = pair.into_inner();
        let specs = self.decl_specs(take(&mut inner, "declaration specifiers")?);

        let mut decls = vec![];
        for init_declarator in inner {
            let span = self.span(&init_declarator);
            let mut parts = init_declarator.into_inner();
            let declarator = self.declarator(take(&mut parts, "declarator")?, false)?;
            let init = parts.next().map(|p| self.initializer(p)).transpose()?;
            decls.push(self.var_decl(&specs, declarator, init, span));
        }
        Ok(decls)
    }

    fn initializer(&self, pair: Pair<'_, Rule>) -> Result<Initializer, Error> {
        let inner = take(&mut pair.into_inner(), "initializer")?;
        match inner.as_rule() {
            Rule::init_list => {
                let mut items = vec![];
                for item in inner.into_inner() {
                    let value = item
                        .into_inner()
                        .find(|p| p.as_rule() == Rule::initializer)
                        .ok_or_else(|| malformed("initializer list"))?;
                    items.push(self.initializer(value)?);
                }
                Ok(Initializer::List(items))
            }
            Rule::assignment => Ok(Initializer::Expr(self.assignment(inner)?)),
            _ => Err(malformed("initializer")),
        }
    }

    fn statement(&self, pair: Pair<'_, Rule>) -> Result<Stmt, Error> {
        let span = self.span(&pair);
        let kind = match pair.as_rule() {
            Rule::compound => StmtKind::Compound(
                pair.into_inner()
                    .map(|s| self.statement(s))
                    .collect::<Result<_, _>>()?,
            ),
            Rule::declaration => StmtKind::Decl(self.declaration(pair)?),
            Rule::if_stmt => {
                let mut inner = significant(pair);
                let cond = self.expr(take(&mut inner, "if condition")?)?;
                let then = Box::new(self.statement(take(&mut inner, "if body")?)?);
                let otherwise = inner
                    .find(|p| !is_keyword(p.as_rule()))
                    .map(|p| self.statement(p).map(Box::new))
                    .transpose()?;
                StmtKind::If {
                    cond,
                    then,
                    otherwise,
                }
            }
            Rule::for_stmt => {
                let mut inner = pair.into_inner();
                let init = take(&mut inner, "for initializer")?;
                let init = match init.into_inner().next() {
                    Some(p) if p.as_rule() == Rule::declaration => {
                        Some(ForInit::Decl(self.declaration(p)?))
                    }
                    Some(p) => Some(ForInit::Expr(self.expr(p)?)),
                    None => None,
                };
                let cond = self.optional_expr(take(&mut inner, "for condition")?)?;
                let step = self.optional_expr(take(&mut inner, "for step")?)?;
                let body = Box::new(self.statement(take(&mut inner, "for body")?)?);
                StmtKind::For {
                    init,
                    cond,
                    step,
                    body,
                }
            }
            Rule::while_stmt => {
                let mut inner = pair.into_inner();
                let cond = self.expr(take(&mut inner, "while condition")?)?;
                let body = Box::new(self.statement(take(&mut inner, "while body")?)?);
                StmtKind::While { cond, body }
            }
            Rule::do_stmt => {
                let mut inner = significant(pair);
                let body = Box::new(self.statement(take(&mut inner, "do body")?)?);
                let cond = self.expr(take(&mut inner, "do condition")?)?;
                StmtKind::DoWhile { body, cond }
            }
            Rule::switch_stmt => {
                let mut inner = pair.into_inner();
                let cond = self.expr(take(&mut inner, "switch condition")?)?;
                let body = Box::new(self.statement(take(&mut inner, "switch body")?)?);
                StmtKind::Switch { cond, body }
            }
            Rule::return_stmt => {
                StmtKind::Return(significant(pair).next().map(|p| self.expr(p)).transpose()?)
            }
            Rule::break_stmt => StmtKind::Break,
            Rule::continue_stmt => StmtKind::Continue,
            Rule::goto_stmt => {
                StmtKind::Goto(take(&mut significant(pair), "goto label")?.as_str().to_string())
            }
            Rule::case_label | Rule::label_stmt => StmtKind::Label,
            Rule::expr_stmt => StmtKind::Expr(self.expr(take(&mut pair.into_inner(), "expression")?)?),
            Rule::empty_stmt => StmtKind::Empty,
            _ => return Err(malformed("statement")),
        };
        Ok(Stmt { kind, span })
    }

    fn optional_expr(&self, pair: Pair<'_, Rule>) -> Result<Option<Expr>, Error> {
        pair.into_inner().next().map(|p| self.expr(p)).transpose()
    }

    fn expr(&self, pair: Pair<'_, Rule>) -> Result<Expr, Error> {
        let span = self.span(&pair);
        let mut parts = pair
            .into_inner()
            .map(|p| self.assignment(p))
            .collect::<Result<Vec<_>, _>>()?;

        if parts.len() == 1 {
            return parts.pop().ok_or_else(|| malformed("expression"));
        }
        Ok(Expr {
            kind: ExprKind::Comma(parts),
            span,
        })
    }

    fn assignment(&self, pair: Pair<'_, Rule>) -> Result<Expr, Error> {
        let span = self.span(&pair);
        let mut inner = pair.into_inner();
        let first = take(&mut inner, "assignment")?;
        if first.as_rule() == Rule::conditional {
            return self.conditional(first);
        }

        let lhs = self.unary(first)?;
        let op = take(&mut inner, "assignment operator")?.as_str().to_string();
        let rhs = self.assignment(take(&mut inner, "assigned value")?)?;
        Ok(Expr {
            kind: ExprKind::Assign {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            span,
        })
    }

    fn conditional(&self, pair: Pair<'_, Rule>) -> Result<Expr, Error> {
        let span = self.span(&pair);
        let mut inner = pair.into_inner();
        let cond = self.binary(take(&mut inner, "conditional")?)?;
        let Some(then) = inner.next() else {
            return Ok(cond);
        };
        let then = self.expr(then)?;
        let otherwise = self.conditional(take(&mut inner, "conditional else")?)?;
        Ok(Expr {
            kind: ExprKind::Conditional {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
            span,
        })
    }

    fn binary(&self, pair: Pair<'_, Rule>) -> Result<Expr, Error> {
        PRATT
            .map_primary(|p| self.unary(p))
            .map_infix(|lhs, op, rhs| {
                let (lhs, rhs) = (lhs?, rhs?);
                Ok(Expr {
                    span: lhs.span.to(rhs.span),
                    kind: ExprKind::Binary {
                        op: op.as_str().to_string(),
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                })
            })
            .parse(pair.into_inner())
    }

    fn unary(&self, pair: Pair<'_, Rule>) -> Result<Expr, Error> {
        let span = self.span(&pair);
        let mut inner = pair.into_inner();
        let first = take(&mut inner, "unary expression")?;
        let kind = match first.as_rule() {
            Rule::prefix_op => ExprKind::Unary {
                op: first.as_str().trim().to_string(),
                operand: Box::new(self.unary(take(&mut inner, "operand")?)?),
            },
            Rule::sizeof_type => {
                let ty = take(&mut significant(first), "sizeof type")?;
                ExprKind::SizeofType(ty.as_str().to_string())
            }
            Rule::cast => {
                let mut parts = first.into_inner();
                let ty = take(&mut parts, "cast type")?.as_str().to_string();
                let expr = self.unary(take(&mut parts, "cast operand")?)?;
                ExprKind::Cast {
                    ty,
                    expr: Box::new(expr),
                }
            }
            Rule::postfix_expr => return self.postfix(first),
            _ => return Err(malformed("unary expression")),
        };
        Ok(Expr { kind, span })
    }

    fn postfix(&self, pair: Pair<'_, Rule>) -> Result<Expr, Error> {
        let mut inner = pair.into_inner();
        let mut acc = self.primary(take(&mut inner, "primary expression")?)?;

        for op in inner {
            let span = acc.span.to(self.span(&op));
            let kind = match op.as_rule() {
                Rule::call_args => ExprKind::Call {
                    callee: Box::new(acc),
                    args: op
                        .into_inner()
                        .map(|a| self.assignment(a))
                        .collect::<Result<_, _>>()?,
                },
                Rule::index => ExprKind::Index {
                    base: Box::new(acc),
                    index: Box::new(self.expr(take(&mut op.into_inner(), "index")?)?),
                },
                Rule::member => {
                    let mut parts = op.into_inner();
                    let arrow = take(&mut parts, "member operator")?.as_str() == "->";
                    let field = take(&mut parts, "member name")?.as_str().to_string();
                    ExprKind::Member {
                        base: Box::new(acc),
                        field,
                        arrow,
                    }
                }
                Rule::post_inc | Rule::post_dec => ExprKind::Postfix {
                    op: op.as_str().to_string(),
                    operand: Box::new(acc),
                },
                _ => return Err(malformed("postfix expression")),
            };
            acc = Expr { kind, span };
        }
        Ok(acc)
    }

    fn primary(&self, pair: Pair<'_, Rule>) -> Result<Expr, Error> {
        let span = self.span(&pair);
        let inner = take(&mut pair.into_inner(), "primary expression")?;
        let kind = match inner.as_rule() {
            Rule::ident => ExprKind::Ident(inner.as_str().to_string()),
            Rule::number => ExprKind::Number(inner.as_str().to_string()),
            Rule::char_lit => ExprKind::Char(inner.as_str().to_string()),
            Rule::strings => ExprKind::Str(inner.into_inner().map(|s| unescape(s.as_str())).collect()),
            Rule::paren => {
                ExprKind::Paren(Box::new(self.expr(take(&mut inner.into_inner(), "parenthesized")?)?))
            }
            _ => return Err(malformed("primary expression")),
        };
        Ok(Expr { kind, span })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn only_function(src: &str) -> Function {
        let unit = parse(src).unwrap();
        unit.items
            .into_iter()
            .find_map(|item| match item {
                Item::Function(f) => Some(f),
                Item::Declaration(_) => None,
            })
            .unwrap()
    }

    #[test]
    fn test_parses_function_with_params() {
        let f = only_function("int main(int argc, char *argv[]) { return 0; }");
        assert_eq!(f.name, "main");
        assert_eq!(f.params.len(), 2);
        assert_eq!(f.params[1].name, "argv");
        assert_eq!(f.params[1].declare_as("field"), "char *(*field)");
        assert!(!f.returns_void());
    }

    #[test]
    fn test_declarations_keep_type_text() {
        let f = only_function("void f(void) { const unsigned long x = 3, *p; double a[10]; }");
        let StmtKind::Compound(stmts) = &f.body.kind else {
            panic!("expected block");
        };
        let StmtKind::Decl(decls) = &stmts[0].kind else {
            panic!("expected declaration");
        };
        assert_eq!(decls[0].specifiers, "const unsigned long");
        assert_eq!(decls[0].declare_pointer_to("x_ptr"), "const unsigned long (*x_ptr)");
        assert_eq!(decls[1].declare_pointer_to("p_ptr"), "const unsigned long *(*p_ptr)");

        let StmtKind::Decl(arrays) = &stmts[1].kind else {
            panic!("expected declaration");
        };
        assert!(arrays[0].is_array());
        assert_eq!(arrays[0].declare_pointer_to("a_ptr"), "double (*a_ptr)[10]");
        assert!(f.returns_void());
    }

    #[test]
    fn test_lines_are_tracked() {
        let src = "int g;\n\nvoid f(int n) {\n  int i;\n  for (i = 0; i < n; i++) {\n    g += i;\n  }\n}\n";
        let f = only_function(src);
        assert_eq!(f.span.line, 3);
        let loop_stmt = &f.body_statements()[1];
        assert_eq!(loop_stmt.span.line, 5);
        assert_eq!(loop_stmt.span.end_line, 7);
    }

    #[test]
    fn test_sentinel_call_strings_are_unescaped() {
        let f = only_function(
            "void f(void) { __taskify_pragma(\"task\", \"depend(in: \\\"x\\\")\", \"pragma1\"); }",
        );
        let StmtKind::Expr(call) = &f.body_statements()[0].kind else {
            panic!("expected expression statement");
        };
        let ExprKind::Call { args, .. } = &call.kind else {
            panic!("expected call");
        };
        assert!(matches!(&args[1].kind, ExprKind::Str(s) if s == "depend(in: \"x\")"));
    }

    #[test]
    fn test_binary_precedence() {
        let f = only_function("void f(int n) { int i; i < n - 1; }");
        let StmtKind::Expr(e) = &f.body_statements()[1].kind else {
            panic!("expected expression statement");
        };
        let ExprKind::Binary { op, rhs, .. } = &e.kind else {
            panic!("expected binary");
        };
        assert_eq!(op, "<");
        assert!(matches!(&rhs.kind, ExprKind::Binary { op, .. } if op == "-"));
    }

    #[test]
    fn test_typedef_cast_does_not_swallow_subtraction() {
        let f = only_function("void f(size_t a, int b) { size_t c = (size_t)b; int d = (a) - b; }");
        let StmtKind::Decl(c) = &f.body_statements()[0].kind else {
            panic!("expected declaration");
        };
        let init = c[0].init.as_ref().and_then(Initializer::as_expr).unwrap();
        assert!(matches!(init.kind, ExprKind::Cast { .. }));

        let StmtKind::Decl(d) = &f.body_statements()[1].kind else {
            panic!("expected declaration");
        };
        let init = d[0].init.as_ref().and_then(Initializer::as_expr).unwrap();
        assert!(matches!(&init.kind, ExprKind::Binary { op, .. } if op == "-"));
    }

    #[test]
    fn test_preprocessor_lines_and_prototypes() {
        let unit = parse(
            "#include <stdio.h>\nstatic int helper(int);\ntypedef struct { int x; } point;\nint main(void) { return helper(1); }\n",
        )
        .unwrap();
        let decls: Vec<_> = unit.declarations().collect();
        assert_eq!(decls[0].name, "helper");
        assert_eq!(decls[0].kind, DeclKind::Function);
        assert_eq!(decls[0].storage, Some(Storage::Static));
        assert_eq!(decls[1].storage, Some(Storage::Typedef));
        assert_eq!(unit.functions().count(), 1);
    }

    #[test]
    fn test_control_flow_statements() {
        let f = only_function(
            "int f(int x) { switch (x) { case 1: x++; break; default: break; } do { x--; } while (x > 0); if (x) return 1; else return 2; }",
        );
        let kinds: Vec<_> = f.body_statements().iter().map(|s| &s.kind).collect();
        assert!(matches!(kinds[0], StmtKind::Switch { .. }));
        assert!(matches!(kinds[1], StmtKind::DoWhile { .. }));
        assert!(matches!(kinds[2], StmtKind::If { otherwise: Some(_), .. }));
    }
}
