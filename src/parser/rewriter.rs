//! Offset-based edits over the original source.
//!
//! Offsets always refer to the unmodified input, so replacing a nested region first and
//! its parent afterwards composes: the parent reads its body through [`Rewriter::text`],
//! which already carries the child's replacement, and the parent's own replacement
//! then supersedes the child edit.

use std::ops::Range;

use crate::Error;

#[derive(Debug, Clone)]
struct Edit {
    range: Range<usize>,
    text: String,
    /// Tie-break between inserts at the same offset.
    order: isize,
}

impl Edit {
    fn is_insert(&self) -> bool {
        self.range.is_empty()
    }
}

#[derive(Debug)]
pub struct Rewriter<'s> {
    source: &'s str,
    edits: Vec<Edit>,
    next: isize,
    front: isize,
}

impl<'s> Rewriter<'s> {
    pub fn new(source: &'s str) -> Self {
        Self {
            source,
            edits: vec![],
            next: 0,
            front: -1,
        }
    }

    pub fn is_modified(&self) -> bool {
        !self.edits.is_empty()
    }

    /// 1-based line of a byte offset in the original source, used in diagnostics.
    pub fn line_of(&self, offset: usize) -> usize {
        self.source[..offset.min(self.source.len())].matches('\n').count() + 1
    }

    fn push(&mut self, range: Range<usize>, text: String) {
        self.edits.push(Edit {
            range,
            text,
            order: self.next,
        });
        self.next += 1;
    }

    /// Inserts `text` at `offset`. Inserts at the same offset keep their call order.
    pub fn insert(&mut self, offset: usize, text: impl Into<String>) {
        self.push(offset..offset, text.into());
    }

    /// Inserts `text` at `offset`, ahead of every insert made so far at that offset.
    pub fn prepend(&mut self, offset: usize, text: impl Into<String>) {
        self.edits.push(Edit {
            range: offset..offset,
            text: text.into(),
            order: self.front,
        });
        self.front -= 1;
    }

    /// Replaces `range` with `text`, superseding every edit strictly inside it.
    pub fn replace(&mut self, range: Range<usize>, text: impl Into<String>) -> Result<(), Error> {
        for edit in self.edits.iter().filter(|e| !e.is_insert()) {
            let inside = range.start <= edit.range.start && edit.range.end <= range.end;
            let disjoint = edit.range.end <= range.start || range.end <= edit.range.start;
            if edit.range == range {
                return Err(Error::structural(
                    self.line_of(range.start),
                    "the same source range was rewritten twice",
                ));
            }
            if !inside && !disjoint {
                return Err(Error::structural(
                    self.line_of(range.start),
                    format!(
                        "rewrite overlaps an earlier rewrite starting at line {}",
                        self.line_of(edit.range.start)
                    ),
                ));
            }
        }

        self.edits.retain(|e| {
            if e.is_insert() {
                !(range.start < e.range.start && e.range.start < range.end)
            } else {
                !(range.start <= e.range.start && e.range.end <= range.end)
            }
        });
        self.push(range, text.into());
        Ok(())
    }

    fn ordered<'e>(edits: impl Iterator<Item = &'e Edit>) -> Vec<&'e Edit> {
        let mut edits: Vec<_> = edits.collect();
        edits.sort_by_key(|e| (e.range.start, !e.is_insert(), e.order));
        edits
    }

    fn apply(&self, range: Range<usize>, edits: Vec<&Edit>) -> String {
        let mut out = String::with_capacity(range.len());
        let mut cursor = range.start;
        for edit in edits {
            out.push_str(&self.source[cursor..edit.range.start]);
            out.push_str(&edit.text);
            cursor = edit.range.end;
        }
        out.push_str(&self.source[cursor..range.end]);
        out
    }

    /// Current text of `range`, with the edits that lie strictly inside it applied.
    pub fn text(&self, range: Range<usize>) -> String {
        let edits = Self::ordered(self.edits.iter().filter(|e| {
            if e.is_insert() {
                range.start < e.range.start && e.range.start < range.end
            } else {
                range.start <= e.range.start && e.range.end <= range.end
            }
        }));
        self.apply(range, edits)
    }

    pub fn render(&self) -> String {
        self.apply(0..self.source.len(), Self::ordered(self.edits.iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_nested_replacement_composes() {
        let src = "a { b { c } d } e";
        let mut rw = Rewriter::new(src);
        rw.replace(6..11, "[C]").unwrap();
        let outer = rw.text(2..15);
        assert_eq!(outer, "{ b [C] d }");
        rw.replace(2..15, format!("<{outer}>")).unwrap();
        assert_eq!(rw.render(), "a <{ b [C] d }> e");
    }

    #[test]
    fn test_inserts_at_boundaries_survive_replacement() {
        let src = "fn body end";
        let mut rw = Rewriter::new(src);
        rw.insert(3, "/*pre*/");
        rw.insert(7, "/*post*/");
        rw.replace(3..7, " BODY").unwrap();
        assert_eq!(rw.render(), "fn /*pre*/ BODY/*post*/ end");
    }

    #[test]
    fn test_inserts_keep_call_order() {
        let mut rw = Rewriter::new("x");
        rw.insert(0, "a");
        rw.insert(0, "b");
        rw.prepend(0, "<");
        assert_eq!(rw.render(), "<abx");
    }

    #[test]
    fn test_partial_overlap_is_rejected() {
        let mut rw = Rewriter::new("0123456789");
        rw.replace(2..6, "x").unwrap();
        assert!(rw.replace(4..8, "y").is_err());
        assert!(rw.replace(2..6, "z").is_err());
        assert!(rw.replace(3..5, "w").is_err());
    }

    #[test]
    fn test_untouched_source_renders_verbatim() {
        let rw = Rewriter::new("int main(void) { return 0; }\n");
        assert!(!rw.is_modified());
        assert_eq!(rw.render(), "int main(void) { return 0; }\n");
    }
}
