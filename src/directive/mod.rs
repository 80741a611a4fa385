//! Directive model.
//!
//! A directive is what a sentinel call encodes: a family name plus its clauses. Parsing
//! validates every clause against the family's allow-list, so code generation can rely on
//! only seeing clauses it knows how to translate.

pub mod capture;
pub mod clause;
pub mod depend;

use std::fmt;

use clause::{ClauseArgs, Clauses, parse_clauses};

use crate::Error;

/// Clauses that decide how variables are shared with a region.
const SHARING_CLAUSES: [&str; 6] = [
    "shared",
    "private",
    "firstprivate",
    "lastprivate",
    "reduction",
    "default",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    Parallel,
    For,
    Task,
    Taskwait,
    Single,
    Master,
    Critical,
    Atomic,
    Simd,
}

impl DirectiveKind {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "parallel" => DirectiveKind::Parallel,
            "for" => DirectiveKind::For,
            "task" => DirectiveKind::Task,
            "taskwait" => DirectiveKind::Taskwait,
            "single" => DirectiveKind::Single,
            "master" => DirectiveKind::Master,
            "critical" => DirectiveKind::Critical,
            "atomic" => DirectiveKind::Atomic,
            "simd" => DirectiveKind::Simd,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            DirectiveKind::Parallel => "parallel",
            DirectiveKind::For => "for",
            DirectiveKind::Task => "task",
            DirectiveKind::Taskwait => "taskwait",
            DirectiveKind::Single => "single",
            DirectiveKind::Master => "master",
            DirectiveKind::Critical => "critical",
            DirectiveKind::Atomic => "atomic",
            DirectiveKind::Simd => "simd",
        }
    }

    /// Whether the directive governs the statement that follows it.
    pub fn has_body(&self) -> bool {
        !matches!(self, DirectiveKind::Taskwait)
    }

    pub fn allowed_clauses(&self) -> &'static [&'static str] {
        match self {
            DirectiveKind::Parallel => &[
                "for",
                "shared",
                "private",
                "firstprivate",
                "lastprivate",
                "reduction",
                "default",
                "num_threads",
                "schedule",
                "proc_bind",
            ],
            DirectiveKind::For => &[
                "private",
                "firstprivate",
                "lastprivate",
                "reduction",
                "schedule",
                "nowait",
            ],
            DirectiveKind::Task => &[
                "shared",
                "private",
                "firstprivate",
                "default",
                "depend",
                "untied",
            ],
            DirectiveKind::Taskwait | DirectiveKind::Master => &[],
            DirectiveKind::Single => &["private", "firstprivate", "nowait"],
            DirectiveKind::Critical => &["hint"],
            DirectiveKind::Atomic => &["read", "write", "update", "capture", "seq_cst"],
            DirectiveKind::Simd => &[
                "safelen",
                "simdlen",
                "linear",
                "aligned",
                "private",
                "lastprivate",
                "reduction",
                "collapse",
            ],
        }
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone)]
pub struct Directive {
    pub kind: DirectiveKind,
    pub clauses: Clauses,
    /// Line of the sentinel call.
    pub line: usize,
    /// Last line covered by the directive and its body.
    pub last_line: usize,
    /// Lock name of `critical(name)`.
    pub critical_name: Option<String>,
}

impl Directive {
    pub fn parse(name: &str, clause_text: &str, line: usize) -> Result<Self, Error> {
        let kind = DirectiveKind::from_name(name)
            .ok_or_else(|| Error::semantic(line, format!("unhandled directive `{name}`")))?;

        let mut text = clause_text.trim();
        let mut critical_name = None;
        if kind == DirectiveKind::Critical
            && let Some(rest) = text.strip_prefix('(')
        {
            let (lock, rest) = rest.split_once(')').ok_or_else(|| {
                Error::semantic(line, format!("unterminated critical name in `{clause_text}`"))
            })?;
            critical_name = Some(lock.trim().to_string());
            text = rest;
        }

        let clauses = parse_clauses(text, line)?;
        let allowed = kind.allowed_clauses();
        if let Some(bad) = clauses.keys().find(|c| !allowed.contains(&c.as_str())) {
            return Err(Error::semantic(
                line,
                format!("clause `{bad}` is not supported on `{kind}`"),
            ));
        }

        Ok(Self {
            kind,
            clauses,
            line,
            last_line: line,
            critical_name,
        })
    }

    /// Name used for every symbol generated for this directive.
    pub fn label(&self) -> String {
        format!("pragma{}_omp_{}", self.line, self.kind)
    }

    pub fn has_clause(&self, name: &str) -> bool {
        self.clauses.contains_key(name)
    }

    pub fn clause(&self, name: &str) -> &[ClauseArgs] {
        self.clauses.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every argument of every occurrence of clause `name`.
    pub fn clause_args(&self, name: &str) -> impl Iterator<Item = &str> {
        self.clause(name)
            .iter()
            .flat_map(|c| c.args.iter().map(String::as_str))
    }

    pub fn names(&self, clause: &str, variable: &str) -> bool {
        self.clause_args(clause).any(|a| a == variable)
    }

    /// `parallel for` and orphaned `for` both distribute a loop.
    pub fn is_loop(&self) -> bool {
        self.kind == DirectiveKind::For
            || (self.kind == DirectiveKind::Parallel && self.has_clause("for"))
    }

    /// Takes over the data-sharing clauses of an enclosing `parallel`. Variables this
    /// directive already names keep their own clause.
    pub fn inherit_sharing(&mut self, outer: &Directive) {
        let own = self.clone();
        let named = |args: &ClauseArgs| {
            args.args
                .iter()
                .any(|a| SHARING_CLAUSES.iter().any(|c| own.names(c, a)))
        };
        for clause in SHARING_CLAUSES {
            if clause == "default" && own.has_clause(clause) {
                continue;
            }
            for args in outer.clause(clause) {
                if clause == "default" || !named(args) {
                    self.clauses
                        .entry(clause.to_string())
                        .or_default()
                        .push(args.clone());
                }
            }
        }
    }

    /// Directives translated into a separately compiled kernel.
    pub fn is_closure(&self) -> bool {
        self.is_loop() || self.kind == DirectiveKind::Task
    }
}
