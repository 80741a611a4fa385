//! Capture contexts: the struct a kernel receives and the code that fills and unpacks it.

use std::collections::HashMap;
use std::fmt::Write;

use crate::Error;
use crate::config::RuntimeApi;
use crate::directive::capture::{self, ReductionVar, SharingClass, VariableCapture};
use crate::parser::items::VarDecl;

/// Variable through which a kernel reaches its context.
pub const CTX: &str = "____ctx";
/// Variable holding the freshly allocated context at a call site.
pub const NEW_CTX: &str = "____new_ctx";
pub const LAST_ITER: &str = "____last_iter";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Pointer to a shared local.
    SharedRef,
    /// Copy of a firstprivate value.
    Value,
    /// Pointer the final iteration writes a lastprivate value back through.
    LastPrivateRef,
    /// Pointer to a reduction accumulator.
    ReductionRef,
}

#[derive(Debug, Clone)]
pub struct Field<'a> {
    pub decl: &'a VarDecl,
    pub kind: FieldKind,
}

impl Field<'_> {
    pub fn name(&self) -> String {
        let var = &self.decl.name;
        match self.kind {
            FieldKind::SharedRef => format!("{var}_ptr"),
            FieldKind::Value => var.clone(),
            FieldKind::LastPrivateRef => format!("{var}_lastprivate_ptr"),
            FieldKind::ReductionRef => format!("{var}_reduce_ptr"),
        }
    }

    fn declaration(&self) -> String {
        match self.kind {
            FieldKind::Value => self.decl.declare_as(&self.name()),
            _ => self.decl.declare_pointer_to(&self.name()),
        }
    }

    /// Statement copying the caller's variable into `target`'s field.
    fn store(&self, target: &str) -> String {
        let (var, field) = (&self.decl.name, self.name());
        match self.kind {
            FieldKind::Value if self.decl.is_array() => {
                format!("memcpy({target}->{field}, {var}, sizeof({target}->{field}));")
            }
            FieldKind::Value => format!("{target}->{field} = {var};"),
            _ => format!("{target}->{field} = &({var});"),
        }
    }
}

/// Layout of one region's context and the private state its kernel sets up.
#[derive(Debug)]
pub struct ContextLayout<'a> {
    pub type_name: String,
    pub fields: Vec<Field<'a>>,
    /// Shared locals the kernel reaches through a pointer field.
    shared: Vec<&'a VarDecl>,
    privates: Vec<&'a VarDecl>,
    firstprivates: Vec<&'a VarDecl>,
    lastprivates: Vec<&'a VarDecl>,
    reductions: Vec<&'a VarDecl>,
    /// Holds the index of the final iteration when a lastprivate write-back is needed.
    pub has_last_iter: bool,
}

impl<'a> ContextLayout<'a> {
    /// Builds the layout for `captures`. `skip` names the induction variable, which is
    /// bound by the kernel itself.
    pub fn build(
        type_name: String,
        captures: &[VariableCapture<'a>],
        reductions: &[ReductionVar],
        skip: Option<&str>,
        line: usize,
    ) -> Result<Self, Error> {
        let mut layout = ContextLayout {
            type_name,
            fields: vec![],
            shared: vec![],
            privates: vec![],
            firstprivates: vec![],
            lastprivates: vec![],
            reductions: vec![],
            has_last_iter: false,
        };

        for reduction in reductions {
            let capture = captures
                .iter()
                .find(|c| c.decl.name == reduction.name)
                .ok_or_else(|| {
                    Error::semantic(
                        line,
                        format!("reduction variable `{}` is not in scope", reduction.name),
                    )
                })?;
            if capture.decl.is_array() {
                return Err(Error::semantic(
                    line,
                    format!("array reduction on `{}` is not supported", reduction.name),
                ));
            }
        }

        for capture in capture::filter_shared(captures) {
            if capture.pass_by_reference() && skip != Some(capture.decl.name.as_str()) {
                layout.push(capture.decl, FieldKind::SharedRef);
                layout.shared.push(capture.decl);
            }
        }

        for capture in captures {
            let decl = capture.decl;
            if skip == Some(decl.name.as_str()) {
                continue;
            }
            if reductions.iter().any(|r| r.name == decl.name) {
                layout.push(decl, FieldKind::ReductionRef);
                layout.reductions.push(decl);
                continue;
            }

            match capture.class {
                SharingClass::Shared => {}
                SharingClass::Private => layout.privates.push(decl),
                SharingClass::FirstPrivate => {
                    layout.push(decl, FieldKind::Value);
                    layout.firstprivates.push(decl);
                }
                SharingClass::LastPrivate => {
                    layout.push(decl, FieldKind::LastPrivateRef);
                    layout.lastprivates.push(decl);
                    layout.has_last_iter = true;
                }
            }
        }
        Ok(layout)
    }

    fn push(&mut self, decl: &'a VarDecl, kind: FieldKind) {
        self.fields.push(Field { decl, kind });
    }

    pub fn typedef(&self) -> String {
        let mut out = format!("typedef struct _{} {{\n", self.type_name);
        for field in &self.fields {
            let _ = writeln!(out, "    {};", field.declaration());
        }
        if self.has_last_iter {
            let _ = writeln!(out, "    int {LAST_ITER};");
        }
        if self.fields.is_empty() && !self.has_last_iter {
            out.push_str("    char ____unused;\n");
        }
        let _ = writeln!(out, "}} {};", self.type_name);
        out
    }

    /// Call-site code allocating and filling a context in `NEW_CTX`.
    pub fn allocate(&self, indent: &str) -> String {
        let ty = &self.type_name;
        let mut out = format!("{indent}{ty} *{NEW_CTX} = ({ty} *)malloc(sizeof({ty}));\n");
        for field in &self.fields {
            let _ = writeln!(out, "{indent}{}", field.store(NEW_CTX));
        }
        out
    }

    /// Kernel-side code that binds the context and declares the private copies.
    pub fn unpack(&self, arg: &str, indent: &str) -> String {
        let ty = &self.type_name;
        let mut out = format!("{indent}{ty} *{CTX} = ({ty} *){arg};\n");
        for decl in &self.privates {
            let _ = writeln!(out, "{indent}{};", decl.declare_as(&decl.name));
        }
        for decl in &self.lastprivates {
            let _ = writeln!(out, "{indent}{};", decl.declare_as(&decl.name));
        }
        for decl in &self.firstprivates {
            let name = &decl.name;
            if decl.is_array() {
                let _ = writeln!(out, "{indent}{};", decl.declare_as(name));
                let _ = writeln!(out, "{indent}memcpy({name}, {CTX}->{name}, sizeof({name}));");
            } else {
                let _ = writeln!(out, "{indent}{} = {CTX}->{name};", decl.declare_as(name));
            }
        }
        for decl in &self.reductions {
            let _ = writeln!(out, "{indent}{} = 0;", decl.declare_as(&decl.name));
        }
        out
    }

    /// Writes lastprivate values back when `iter` is the final iteration.
    pub fn lastprivate_writeback(&self, iter: &str, indent: &str) -> String {
        if self.lastprivates.is_empty() {
            return String::new();
        }
        let mut out = format!("{indent}if ({iter} == {CTX}->{LAST_ITER}) {{\n");
        for decl in &self.lastprivates {
            let name = &decl.name;
            let field = format!("{CTX}->{name}_lastprivate_ptr");
            if decl.is_array() {
                let _ = writeln!(out, "{indent}    memcpy(*({field}), {name}, sizeof({name}));");
            } else {
                let _ = writeln!(out, "{indent}    *({field}) = {name};");
            }
        }
        let _ = writeln!(out, "{indent}}}");
        out
    }

    /// Folds every partial reduction result into its accumulator. Returns the code and
    /// whether the shared reduction mutex is used.
    pub fn reduction_epilogue(
        &self,
        reductions: &[ReductionVar],
        api: &RuntimeApi,
        lock: &str,
        indent: &str,
    ) -> (String, bool) {
        let mut out = String::new();
        let mut uses_lock = false;
        for decl in &self.reductions {
            let name = &decl.name;
            let target = format!("{CTX}->{name}_reduce_ptr");
            if decl.is_integral() {
                let combine = reductions
                    .iter()
                    .find(|r| &r.name == name)
                    .map_or(api.atomic_add.as_str(), |r| r.combine.as_str());
                let _ = writeln!(out, "{indent}{combine}({target}, {name});");
            } else {
                uses_lock = true;
                let _ = writeln!(out, "{indent}{}(&{lock});", api.mutex_lock);
                let _ = writeln!(out, "{indent}*({target}) += {name};");
                let _ = writeln!(out, "{indent}{}(&{lock});", api.mutex_unlock);
            }
        }
        (out, uses_lock)
    }

    /// Replacement text for every shared local the kernel reaches through a pointer.
    pub fn by_reference(&self) -> HashMap<&'a str, String> {
        self.shared
            .iter()
            .map(|decl| (decl.name.as_str(), format!("(*({CTX}->{}_ptr))", decl.name)))
            .collect()
    }
}
