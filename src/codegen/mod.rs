//! Bottom-up rewrite of directive regions into runtime calls.
//!
//! Regions are taken from the tree leaves first, so when a region is rewritten the text
//! of its body already carries the rewrites of every nested region.

pub mod context;
pub mod entry;
pub mod loops;
pub mod shadow;
pub mod substitute;

use std::collections::{BTreeSet, HashMap};
use std::fmt::Write;

use log::{debug, trace};

use self::context::{ContextLayout, LAST_ITER, NEW_CTX};
use crate::Error;
use crate::config::RuntimeApi;
use crate::context::TranslationContext;
use crate::directive::capture::{self, ReductionVar, SharingClass};
use crate::directive::depend::{self, Direction};
use crate::directive::DirectiveKind;
use crate::parser::items::{Function, Stmt, VarDecl};
use crate::parser::rewriter::Rewriter;
use crate::region::{RegionNode, RegionTree};

const CRITICAL_LOCK: &str = "____critical_lock";
const ATOMIC_LOCK: &str = "____atomic_lock";
const REDUCTION_LOCK: &str = "____reduction_lock";

/// Translation-unit-wide state the prologue is generated from.
#[derive(Debug, Default)]
pub struct RuntimeUses {
    critical_locks: BTreeSet<String>,
    atomic_lock: bool,
    reduction_lock: bool,
}

impl RuntimeUses {
    fn critical(&mut self, name: Option<&str>) -> String {
        let lock = match name {
            Some(name) => format!("{CRITICAL_LOCK}_{name}"),
            None => CRITICAL_LOCK.to_string(),
        };
        self.critical_locks.insert(lock.clone());
        lock
    }

    fn locks(&self) -> impl Iterator<Item = &str> {
        self.critical_locks
            .iter()
            .map(String::as_str)
            .chain(self.atomic_lock.then_some(ATOMIC_LOCK))
            .chain(self.reduction_lock.then_some(REDUCTION_LOCK))
    }

    /// Includes and mutex definitions placed at the top of a translated file.
    pub fn prologue(&self, api: &RuntimeApi) -> String {
        let mut out = format!("#include \"{}\"\n", api.header);
        out.push_str("#include <pthread.h>\n#include <stdlib.h>\n#include <string.h>\n");
        for lock in self.locks() {
            let _ = writeln!(
                out,
                "static {} {lock} = {};",
                api.mutex_type, api.mutex_initializer
            );
        }
        out
    }
}

/// Rewrites every region of `function`, innermost first.
pub fn generate<'a>(
    function: &'a Function,
    mut tree: RegionTree<RegionNode<'a>>,
    ctx: &TranslationContext<'a>,
    rw: &mut Rewriter<'_>,
    uses: &mut RuntimeUses,
) -> Result<(), Error> {
    if tree.is_empty() {
        return Ok(());
    }

    let mut generator = Generator {
        ctx,
        api: &ctx.config.runtime,
        rw,
        uses,
        declarations: String::new(),
        kernels: String::new(),
    };

    loop {
        let leaves = tree.leaves();
        if leaves.is_empty() {
            break;
        }
        for idx in leaves {
            if let Some(region) = tree.remove(idx) {
                generator.rewrite(&region)?;
            }
        }
    }

    let Generator {
        declarations,
        kernels,
        rw,
        ..
    } = generator;
    debug!("{}: emitting generated declarations and kernels", function.name);
    rw.insert(function.span.start, declarations);
    if !kernels.is_empty() {
        rw.insert(function.span.end, format!("\n{kernels}"));
    }
    Ok(())
}

struct Generator<'g, 'a, 's> {
    ctx: &'g TranslationContext<'a>,
    api: &'g RuntimeApi,
    rw: &'g mut Rewriter<'s>,
    uses: &'g mut RuntimeUses,
    /// Context typedefs and kernel prototypes, emitted before the function.
    declarations: String,
    /// Kernel definitions, emitted after the function.
    kernels: String,
}

impl<'a> Generator<'_, 'a, '_> {
    fn rewrite(&mut self, region: &RegionNode<'a>) -> Result<(), Error> {
        let directive = &region.directive;
        trace!("rewriting {}", region.label());

        match directive.kind {
            DirectiveKind::Parallel if !directive.is_loop() => self.scaffold(region),
            DirectiveKind::Parallel | DirectiveKind::For => self.parallel_for(region),
            DirectiveKind::Task => self.task(region),
            DirectiveKind::Taskwait => {
                let text = format!("{}(); {}();", self.api.end_finish, self.api.start_finish);
                self.rw.replace(region.sentinel.span.range(), text)
            }
            DirectiveKind::Single | DirectiveKind::Master | DirectiveKind::Simd => {
                self.rw.replace(region.sentinel.span.range(), "")
            }
            DirectiveKind::Critical => {
                let lock = self.uses.critical(directive.critical_name.as_deref());
                self.guarded(region, &lock)
            }
            DirectiveKind::Atomic => {
                self.uses.atomic_lock = true;
                self.guarded(region, ATOMIC_LOCK)
            }
        }
    }

    /// Runs a `parallel` body once inside a finish scope. Its private and firstprivate
    /// variables become renamed copies declared at the top of the scope.
    fn scaffold(&mut self, region: &RegionNode<'a>) -> Result<(), Error> {
        // Reductions reach the nested loops through their inherited clauses.
        self.reductions(region)?;
        let captures = capture::collect_captures(
            &region.snapshot,
            self.ctx.globals(),
            &region.directive,
            &[],
        )?;

        let label = region.label();
        let mut copies = String::new();
        let mut renamed = HashMap::new();
        for capture in &captures {
            let decl = capture.decl;
            let name = &decl.name;
            let copy = format!("____{label}_{name}");
            let declaration = decl.declare_as(&copy);
            match capture.class {
                SharingClass::Private => {
                    let _ = write!(copies, " {declaration};");
                }
                SharingClass::FirstPrivate if decl.is_array() => {
                    let _ = write!(
                        copies,
                        " {declaration}; memcpy({copy}, {name}, sizeof({copy}));"
                    );
                }
                SharingClass::FirstPrivate => {
                    let _ = write!(copies, " {declaration} = {name};");
                }
                SharingClass::Shared | SharingClass::LastPrivate => continue,
            }
            renamed.insert(name.as_str(), copy);
        }
        if !renamed.is_empty() {
            debug!("{label}: {} private copies", renamed.len());
        }

        let body = self.rw.text(region.after_sentinel());
        let body = self.substitute_in(&body, renamed, region.body)?;
        let text = format!(
            "{{ {}();{copies}{body}\n{}(); }}",
            self.api.start_finish, self.api.end_finish
        );
        self.rw.replace(region.range(), text)
    }

    /// Wraps the region body in a lock/unlock pair on `lock`.
    fn guarded(&mut self, region: &RegionNode<'a>, lock: &str) -> Result<(), Error> {
        let body = self.rw.text(region.after_sentinel());
        let text = format!(
            "{{ {}(&{lock});{body}\n{}(&{lock}); }}",
            self.api.mutex_lock, self.api.mutex_unlock
        );
        self.rw.replace(region.range(), text)
    }

    fn reductions(&self, region: &RegionNode<'a>) -> Result<Vec<ReductionVar>, Error> {
        capture::reductions(&region.directive, &self.api.atomic_add)
    }

    fn layout(
        &self,
        region: &RegionNode<'a>,
        reductions: &[ReductionVar],
        skip: Option<&str>,
    ) -> Result<ContextLayout<'a>, Error> {
        let captures = capture::collect_captures(
            &region.snapshot,
            self.ctx.globals(),
            &region.directive,
            reductions,
        )?;
        ContextLayout::build(
            region.label(),
            &captures,
            reductions,
            skip,
            region.directive.line,
        )
    }

    /// Body text with shared locals reached through the context.
    fn kernel_body(
        &self,
        text: &str,
        layout: &ContextLayout<'a>,
        body: Option<&Stmt>,
    ) -> Result<String, Error> {
        let map = layout.by_reference();
        self.substitute_in(text, map, body)
    }

    /// Applies `map` to `text`. A name that `body` redeclares is left alone when every use
    /// is the redeclared one, and rejected when the mapped variable is used as well.
    fn substitute_in(
        &self,
        text: &str,
        mut map: HashMap<&str, String>,
        body: Option<&Stmt>,
    ) -> Result<String, Error> {
        if let Some(body) = body {
            let names: Vec<&str> = map.keys().copied().collect();
            let uses = shadow::resolve(body, &names, self.ctx)?;
            for (name, line) in uses.redeclared() {
                if uses.used_outside(name) {
                    return Err(Error::semantic(
                        line,
                        format!(
                            "`{name}` is redeclared inside a region that also uses the enclosing `{name}`"
                        ),
                    ));
                }
                map.remove(name);
            }
        }
        Ok(substitute::substitute(text, &map))
    }

    fn epilogue(&mut self, layout: &ContextLayout<'a>, reductions: &[ReductionVar]) -> String {
        let (code, uses_lock) =
            layout.reduction_epilogue(reductions, self.api, REDUCTION_LOCK, "    ");
        self.uses.reduction_lock |= uses_lock;
        code
    }

    fn induction_decl(
        &self,
        region: &RegionNode<'a>,
        shape: &loops::LoopShape<'a>,
    ) -> Option<&'a VarDecl> {
        let var = shape.var.as_str();
        shape
            .decl
            .or_else(|| region.snapshot.iter().rev().find(|d| d.name == var).copied())
            .or_else(|| self.ctx.globals().iter().find(|d| d.name == var).copied())
    }

    fn parallel_for(&mut self, region: &RegionNode<'a>) -> Result<(), Error> {
        let line = region.directive.line;
        let body = region.body.ok_or_else(|| {
            Error::structural(line, "work-sharing directive has no loop to distribute")
        })?;
        let shape = loops::extract(body)?;
        let var_decl = self.induction_decl(region, &shape).ok_or_else(|| {
            Error::semantic(
                line,
                format!("induction variable `{}` is not declared", shape.var),
            )
        })?;

        let reductions = self.reductions(region)?;
        let layout = self.layout(region, &reductions, Some(shape.var.as_str()))?;
        let label = region.label();
        let kernel = format!("{label}_hclib_async");
        let api = self.api;

        let body_text = self.rw.text(shape.body.span.range());
        let body_text = self.kernel_body(&body_text, &layout, Some(shape.body))?;
        let epilogue = self.epilogue(&layout, &reductions);

        let mut def = format!("static void {kernel}(void *____arg, const int ___iter0) {{\n");
        def.push_str(&layout.unpack("____arg", "    "));
        let _ = writeln!(def, "    {};", var_decl.declare_as(&shape.var));
        let _ = writeln!(def, "    {} = ___iter0;", shape.var);
        let _ = writeln!(def, "    {}();", api.start_finish);
        let _ = writeln!(def, "    do {body_text} while (0);");
        let _ = writeln!(def, "    {}();", api.end_finish);
        def.push_str(&layout.lastprivate_writeback("___iter0", "    "));
        def.push_str(&epilogue);
        def.push_str("}\n\n");

        let low = self.rw.text(shape.low.span.range());
        let high = self.rw.text(shape.high.span.range());
        let mut call = format!("{{\n{}", layout.allocate("    "));
        if layout.has_last_iter {
            let _ = writeln!(call, "    {NEW_CTX}->{LAST_ITER} = ({high}) - 1;");
        }
        let _ = writeln!(call, "    {} ____domain[1];", api.loop_domain_type);
        let _ = writeln!(call, "    ____domain[0].low = ({low});");
        let _ = writeln!(call, "    ____domain[0].high = ({high});");
        let _ = writeln!(call, "    ____domain[0].stride = {};", shape.stride);
        let _ = writeln!(call, "    ____domain[0].tile = {};", self.ctx.config.loop_tile);
        let _ = writeln!(
            call,
            "    {} *____fut = {}((void *){kernel}, {NEW_CTX}, 1, ____domain, {});",
            api.future_type, api.forasync_future, api.forasync_mode
        );
        let _ = writeln!(call, "    {}(____fut);", api.future_wait);
        let _ = writeln!(call, "    free({NEW_CTX});");
        call.push('}');

        self.declarations.push_str(&layout.typedef());
        let _ = writeln!(
            self.declarations,
            "static void {kernel}(void *____arg, const int ___iter0);\n"
        );
        self.kernels.push_str(&def);
        debug!("{label}: loop over `{}` distributed", shape.var);
        self.rw.replace(region.range(), call)
    }

    fn task(&mut self, region: &RegionNode<'a>) -> Result<(), Error> {
        let reductions = self.reductions(region)?;
        let layout = self.layout(region, &reductions, None)?;
        let deps = depend::dependencies(&region.directive)?;
        let label = region.label();
        let kernel = format!("{label}_hclib_async");
        let api = self.api;

        let body_text = self.rw.text(region.after_sentinel());
        let body_text = self.kernel_body(body_text.trim_start(), &layout, region.body)?;
        let epilogue = self.epilogue(&layout, &reductions);

        let mut def = format!("static void {kernel}(void *____arg) {{\n");
        def.push_str(&layout.unpack("____arg", "    "));
        let _ = writeln!(def, "    {}();", api.start_finish);
        let _ = writeln!(def, "    {body_text}");
        let _ = writeln!(def, "    {}();", api.end_finish);
        def.push_str(&epilogue);
        def.push_str("    free(____arg);\n}\n\n");

        let mut call = format!("{{\n{}", layout.allocate("    "));
        if deps.is_empty() {
            let _ = writeln!(call, "    {}({kernel}, {NEW_CTX}, NULL, 0, NULL);", api.spawn);
        } else {
            let count = |dir| deps.iter().filter(|d| d.direction == dir).count();
            let mut args = vec![
                kernel.clone(),
                NEW_CTX.to_string(),
                "NULL".to_string(),
                count(Direction::In).to_string(),
                count(Direction::Out).to_string(),
            ];
            for dir in [Direction::In, Direction::Out] {
                for dep in deps.iter().filter(|d| d.direction == dir) {
                    args.push(dep.address.clone());
                    args.push(dep.length.clone());
                }
            }
            let _ = writeln!(call, "    {}({});", api.spawn_with_deps, args.join(", "));
        }
        call.push('}');

        self.declarations.push_str(&layout.typedef());
        let _ = writeln!(self.declarations, "static void {kernel}(void *____arg);\n");
        self.kernels.push_str(&def);
        debug!("{label}: task with {} dependencies", deps.len());
        self.rw.replace(region.range(), call)
    }
}
