//! Entry-point wrapping: the designated function's body runs inside the runtime's launch
//! primitive.

use std::fmt::Write;
use std::ops::Range;

use log::debug;

use crate::Error;
use crate::context::TranslationContext;
use crate::parser::items::{Function, StmtKind};
use crate::parser::rewriter::Rewriter;

const ENTRY_CTX: &str = "____entry_ctx";
const EXIT_LABEL: &str = "____entry_exit";
const RET: &str = "____ret";

/// Turns every `return` outside `closures` into a store followed by a jump to the exit
/// label. Returns the number of statements rewritten.
pub fn rewrite_returns(
    function: &Function,
    closures: &[Range<usize>],
    rw: &mut Rewriter<'_>,
) -> Result<usize, Error> {
    let mut returns = vec![];
    function.body.walk(&mut |stmt| {
        if let StmtKind::Return(value) = &stmt.kind
            && !closures.iter().any(|r| r.contains(&stmt.span.start))
        {
            returns.push((stmt.span, value.as_ref()));
        }
    });

    for (span, value) in &returns {
        let text = match value {
            Some(expr) => format!(
                "{{ {ENTRY_CTX}->{RET} = ({}); goto {EXIT_LABEL}; }}",
                rw.text(expr.span.range())
            ),
            None => format!("goto {EXIT_LABEL};"),
        };
        rw.replace(span.range(), text)?;
    }
    Ok(returns.len())
}

/// Moves the body of `function` into `{name}_entrypoint` and launches it, passing the
/// parameters by value and handing back the stored return value.
pub fn wrap(
    function: &Function,
    ctx: &TranslationContext<'_>,
    rw: &mut Rewriter<'_>,
    has_exit: bool,
) -> Result<(), Error> {
    let api = &ctx.config.runtime;
    let name = &function.name;
    let ty = format!("{name}_entrypoint_ctx");
    let kernel = format!("{name}_entrypoint");

    let ret = (!function.returns_void()).then(|| {
        let specifiers: Vec<_> = function
            .return_type
            .split_whitespace()
            .filter(|w| *w != "inline")
            .collect();
        let pointer = if function.returns_pointer { "*" } else { "" };
        format!("{} {pointer}{RET}", specifiers.join(" "))
    });

    let mut typedef = format!("typedef struct _{ty} {{\n");
    for param in &function.params {
        let _ = writeln!(typedef, "    {};", param.declare_as(&param.name));
    }
    if let Some(ret) = &ret {
        let _ = writeln!(typedef, "    {ret};");
    }
    if function.params.is_empty() && ret.is_none() {
        typedef.push_str("    char ____unused;\n");
    }
    let _ = writeln!(typedef, "}} {ty};\n");

    let body = rw.text(function.body.span.range());
    let mut def = format!("static void {kernel}(void *____arg) {{\n");
    let _ = writeln!(def, "    {ty} *{ENTRY_CTX} = ({ty} *)____arg;");
    for param in &function.params {
        let pname = &param.name;
        let _ = writeln!(
            def,
            "    {} = {ENTRY_CTX}->{pname};",
            param.declare_as(pname)
        );
    }
    let _ = writeln!(def, "    {}();", api.start_finish);
    let _ = writeln!(def, "    {body}");
    if has_exit {
        let _ = writeln!(def, "{EXIT_LABEL}: ;");
    }
    let _ = writeln!(def, "    {}();", api.end_finish);
    def.push_str("}\n\n");

    let mut launch = format!("{{\n    {ty} *{ENTRY_CTX} = ({ty} *)calloc(1, sizeof({ty}));\n");
    for param in &function.params {
        let pname = &param.name;
        let _ = writeln!(launch, "    {ENTRY_CTX}->{pname} = {pname};");
    }
    let _ = writeln!(launch, "    {}({kernel}, {ENTRY_CTX}, NULL, 0);", api.launch);
    if let Some(ret) = &ret {
        let _ = writeln!(launch, "    {ret} = {ENTRY_CTX}->{RET};");
    }
    let _ = writeln!(launch, "    free({ENTRY_CTX});");
    if ret.is_some() {
        let _ = writeln!(launch, "    return {RET};");
    }
    launch.push('}');

    debug!("{name}: body handed to {}", api.launch);
    rw.insert(function.span.start, typedef);
    rw.insert(function.span.start, def);
    rw.replace(function.body.span.range(), launch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::parser::grammar::parse;
    use pretty_assertions::assert_eq;

    fn wrapped(src: &str) -> String {
        let unit = parse(src).unwrap();
        let config = Config::default();
        let ctx = TranslationContext::new(&unit, &config);
        let function = unit.functions().next().unwrap();
        let mut rw = Rewriter::new(src);
        let exits = rewrite_returns(function, &[], &mut rw).unwrap();
        wrap(function, &ctx, &mut rw, exits > 0).unwrap();
        rw.render()
    }

    #[test]
    fn test_main_is_launched() {
        let out = wrapped("int main(int argc, char **argv) { work(argc); return 0; }");
        assert_eq!(
            out,
            "typedef struct _main_entrypoint_ctx {\n    int argc;\n    char **argv;\n    int ____ret;\n} main_entrypoint_ctx;\n\n\
             static void main_entrypoint(void *____arg) {\n    main_entrypoint_ctx *____entry_ctx = (main_entrypoint_ctx *)____arg;\n    int argc = ____entry_ctx->argc;\n    char **argv = ____entry_ctx->argv;\n    hclib_start_finish();\n    { work(argc); { ____entry_ctx->____ret = (0); goto ____entry_exit; } }\n____entry_exit: ;\n    hclib_end_finish();\n}\n\n\
             int main(int argc, char **argv) {\n    main_entrypoint_ctx *____entry_ctx = (main_entrypoint_ctx *)calloc(1, sizeof(main_entrypoint_ctx));\n    ____entry_ctx->argc = argc;\n    ____entry_ctx->argv = argv;\n    hclib_launch(main_entrypoint, ____entry_ctx, NULL, 0);\n    int ____ret = ____entry_ctx->____ret;\n    free(____entry_ctx);\n    return ____ret;\n}"
        );
    }

    #[test]
    fn test_void_entry_without_params() {
        let out = wrapped("static inline void run(void) { if (x) return; go(); }");
        assert!(out.contains("    char ____unused;\n} run_entrypoint_ctx;"));
        assert!(out.contains("{ if (x) goto ____entry_exit; go(); }"));
        assert!(out.contains("hclib_launch(run_entrypoint, ____entry_ctx, NULL, 0);\n    free(____entry_ctx);\n}"));
        assert!(!out.contains("return"));
    }

    #[test]
    fn test_returns_inside_closures_are_kept() {
        let src = "int main(void) { if (a) return 1; return 2; }";
        let unit = parse(src).unwrap();
        let function = unit.functions().next().unwrap();
        let mut rw = Rewriter::new(src);
        let closure = src.find("return 1").unwrap()..src.find(" return 2").unwrap();
        assert_eq!(rewrite_returns(function, &[closure], &mut rw).unwrap(), 1);
        assert!(rw.render().contains("if (a) return 1;"));
    }
}
