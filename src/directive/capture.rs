//! Sharing classification of the variables a region can see.

use std::collections::HashSet;

use super::Directive;
use crate::Error;
use crate::parser::items::VarDecl;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharingClass {
    Shared,
    Private,
    FirstPrivate,
    LastPrivate,
}

#[derive(Debug, Clone, Copy)]
pub struct VariableCapture<'a> {
    pub decl: &'a VarDecl,
    pub class: SharingClass,
    pub is_global: bool,
}

impl VariableCapture<'_> {
    pub fn name(&self) -> &str {
        &self.decl.name
    }

    /// Globals are reachable from any kernel, so only shared locals travel as pointers.
    pub fn pass_by_reference(&self) -> bool {
        self.class == SharingClass::Shared && !self.is_global
    }
}

/// Treatment of variables no clause names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultPolicy {
    Shared,
    None,
    Private,
    FirstPrivate,
}

impl DefaultPolicy {
    pub fn of(directive: &Directive) -> Result<Self, Error> {
        let Some(value) = directive.clause_args("default").last() else {
            return Ok(DefaultPolicy::Shared);
        };
        match value {
            "shared" => Ok(DefaultPolicy::Shared),
            "none" => Ok(DefaultPolicy::None),
            "private" => Ok(DefaultPolicy::Private),
            "firstprivate" => Ok(DefaultPolicy::FirstPrivate),
            other => Err(Error::semantic(
                directive.line,
                format!("unsupported default policy `{other}`"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReductionVar {
    pub op: String,
    pub name: String,
    /// Primitive used to fold integral partial results into the accumulator.
    pub combine: String,
}

impl ReductionVar {
    pub fn identity(&self) -> &'static str {
        "0"
    }
}

/// Reduction variables of a directive. Only `+` is supported.
pub fn reductions(directive: &Directive, combine: &str) -> Result<Vec<ReductionVar>, Error> {
    let mut vars = vec![];
    for clause in directive.clause("reduction") {
        let raw = clause.raw.as_deref().unwrap_or_default();
        let colon = last_top_level_colon(raw).ok_or_else(|| {
            Error::semantic(
                directive.line,
                format!("reduction `{raw}` needs the form `op:variables`"),
            )
        })?;

        let op = raw[..colon].trim();
        if op != "+" {
            return Err(Error::semantic(
                directive.line,
                format!("unsupported reduction operator `{op}`"),
            ));
        }

        for name in super::clause::tokenize_args(&raw[colon + 1..]) {
            vars.push(ReductionVar {
                op: op.to_string(),
                name,
                combine: combine.to_string(),
            });
        }
    }
    Ok(vars)
}

fn last_top_level_colon(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut found = None;
    for (i, c) in text.char_indices() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            ':' if depth == 0 => found = Some(i),
            _ => {}
        }
    }
    found
}

/// Sharing class of one variable, or `None` when `default(none)` leaves it out.
pub fn classify(
    decl: &VarDecl,
    directive: &Directive,
    policy: DefaultPolicy,
    reductions: &[ReductionVar],
) -> Option<SharingClass> {
    let name = decl.name.as_str();
    if reductions.iter().any(|r| r.name == name) {
        return Some(SharingClass::Private);
    }

    let explicit = [
        ("shared", SharingClass::Shared),
        ("private", SharingClass::Private),
        ("firstprivate", SharingClass::FirstPrivate),
        ("lastprivate", SharingClass::LastPrivate),
    ];
    if let Some((_, class)) = explicit.iter().find(|(c, _)| directive.names(c, name)) {
        return Some(*class);
    }

    match policy {
        DefaultPolicy::Shared => Some(SharingClass::Shared),
        DefaultPolicy::None => None,
        DefaultPolicy::Private => Some(SharingClass::Private),
        DefaultPolicy::FirstPrivate => Some(SharingClass::FirstPrivate),
    }
}

/// Classifies the visible locals, then the globals they do not shadow.
pub fn collect_captures<'a>(
    locals: &[&'a VarDecl],
    globals: &[&'a VarDecl],
    directive: &Directive,
    reductions: &[ReductionVar],
) -> Result<Vec<VariableCapture<'a>>, Error> {
    let policy = DefaultPolicy::of(directive)?;
    let mut seen = HashSet::new();
    let mut captures = vec![];

    let candidates = locals
        .iter()
        .map(|d| (*d, false))
        .chain(globals.iter().map(|d| (*d, true)));
    for (decl, is_global) in candidates {
        if !seen.insert(decl.name.as_str()) {
            continue;
        }
        if let Some(class) = classify(decl, directive, policy, reductions) {
            captures.push(VariableCapture {
                decl,
                class,
                is_global,
            });
        }
    }
    Ok(captures)
}

pub fn filter_shared<'a>(captures: &[VariableCapture<'a>]) -> Vec<VariableCapture<'a>> {
    captures
        .iter()
        .filter(|c| c.class == SharingClass::Shared)
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directive(clauses: &str) -> Directive {
        Directive::parse("parallel", clauses, 1).unwrap()
    }

    #[test]
    fn test_shared_beats_private() {
        let x = VarDecl::synthetic("int", "x");
        let d = directive("shared(x) private(x)");
        assert_eq!(
            classify(&x, &d, DefaultPolicy::Shared, &[]),
            Some(SharingClass::Shared)
        );
    }

    #[test]
    fn test_reduction_makes_private() {
        let sum = VarDecl::synthetic("int", "sum");
        let d = directive("shared(sum) reduction(+:sum)");
        let reds = reductions(&d, "__sync_fetch_and_add").unwrap();
        assert_eq!(reds[0].name, "sum");
        assert_eq!(reds[0].identity(), "0");
        assert_eq!(
            classify(&sum, &d, DefaultPolicy::Shared, &reds),
            Some(SharingClass::Private)
        );
    }

    #[test]
    fn test_default_none_excludes_unnamed() {
        let a = VarDecl::synthetic("int", "a");
        let b = VarDecl::synthetic("double", "b");
        let locals = [&a, &b];

        let d = directive("default(none) firstprivate(a)");
        let captures = collect_captures(&locals, &[], &d, &[]).unwrap();
        assert_eq!(captures.len(), 1);
        assert_eq!(captures[0].name(), "a");
        assert_eq!(captures[0].class, SharingClass::FirstPrivate);

        for clauses in ["", "default(shared)"] {
            let captures = collect_captures(&locals, &[], &directive(clauses), &[]).unwrap();
            assert_eq!(captures.len(), 2);
            assert!(captures.iter().all(|c| c.class == SharingClass::Shared));
        }
    }

    #[test]
    fn test_unknown_default_is_rejected() {
        assert!(DefaultPolicy::of(&directive("default(auto)")).is_err());
        assert_eq!(
            DefaultPolicy::of(&directive("default(firstprivate)")).unwrap(),
            DefaultPolicy::FirstPrivate
        );
    }

    #[test]
    fn test_unsupported_reduction_operator() {
        let err = reductions(&directive("reduction(*:p)"), "add").unwrap_err();
        assert_eq!(err.kind(), Some(crate::TranslationErrorKind::Semantic));
        assert!(err.to_string().contains("`*`"));
        assert_eq!(reductions(&directive("reduction(+: a, b)"), "add").unwrap().len(), 2);
    }

    #[test]
    fn test_locals_shadow_globals() {
        let local = VarDecl::synthetic("int", "n");
        let global_n = VarDecl::synthetic("long", "n");
        let global_m = VarDecl::synthetic("long", "m");

        let captures =
            collect_captures(&[&local], &[&global_n, &global_m], &directive(""), &[]).unwrap();
        assert_eq!(captures.len(), 2);
        assert!(!captures[0].is_global);
        assert_eq!(captures[0].decl.specifiers, "int");
        assert!(captures[1].is_global);
        assert!(captures[0].pass_by_reference());
        assert!(!captures[1].pass_by_reference());
        assert_eq!(filter_shared(&captures).len(), 2);
    }
}
