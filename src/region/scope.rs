use std::collections::HashSet;

use crate::Error;
use crate::parser::items::VarDecl;

/// Lexical scopes open at the current point of a traversal.
#[derive(Debug)]
pub struct ScopeTracker<'a> {
    scopes: Vec<Vec<&'a VarDecl>>,
}

impl Default for ScopeTracker<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> ScopeTracker<'a> {
    /// A tracker holding one (function-level) scope.
    pub fn new() -> Self {
        Self {
            scopes: vec![vec![]],
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Opens a scope and returns the depth to hand back to [`exit`](Self::exit).
    pub fn enter(&mut self) -> usize {
        let depth = self.depth();
        self.scopes.push(vec![]);
        depth
    }

    /// Closes the innermost scope; the depth afterwards must equal `expected`.
    pub fn exit(&mut self, expected: usize, line: usize) -> Result<(), Error> {
        self.scopes.pop();
        if self.depth() != expected {
            return Err(Error::structural(
                line,
                format!(
                    "scope depth {} after traversal, expected {expected}",
                    self.depth()
                ),
            ));
        }
        Ok(())
    }

    pub fn declare(&mut self, decl: &'a VarDecl) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(decl);
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&'a VarDecl> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|s| s.iter().rev())
            .find(|d| d.name == name)
            .copied()
    }

    /// Every visible declaration, outermost first; an inner declaration hides outer ones
    /// with the same name.
    pub fn visible_decls(&self) -> Vec<&'a VarDecl> {
        let mut seen = HashSet::new();
        let mut visible = vec![];
        for &decl in self.scopes.iter().rev().flat_map(|s| s.iter().rev()) {
            if seen.insert(decl.name.as_str()) {
                visible.push(decl);
            }
        }
        visible.reverse();
        visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inner_declaration_shadows_outer() {
        let outer_x = VarDecl::synthetic("int", "x");
        let y = VarDecl::synthetic("int", "y");
        let inner_x = VarDecl::synthetic("double", "x");

        let mut scopes = ScopeTracker::new();
        scopes.declare(&outer_x);
        scopes.declare(&y);
        let depth = scopes.enter();
        scopes.declare(&inner_x);

        let visible = scopes.visible_decls();
        let names: Vec<_> = visible.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["y", "x"]);
        assert_eq!(visible[1].specifiers, "double");
        assert_eq!(scopes.lookup("x").unwrap().specifiers, "double");

        scopes.exit(depth, 1).unwrap();
        assert_eq!(scopes.lookup("x").unwrap().specifiers, "int");
        assert_eq!(scopes.visible_decls().len(), 2);
    }

    #[test]
    fn test_unbalanced_exit_is_reported() {
        let mut scopes = ScopeTracker::new();
        let outer = scopes.enter();
        scopes.enter();
        assert!(scopes.exit(outer, 3).is_err());
    }
}
