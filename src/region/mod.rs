//! Region tree.
//!
//! Regions are kept in a [`StableGraph`] arena under a synthetic root, with an edge from
//! every parent to each of its children. Indices stay valid while leaves are removed, which
//! is what the bottom-up rewrite relies on.

pub mod builder;
pub mod scope;

use std::ops::Range;

use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableGraph};

use crate::Error;
use crate::directive::Directive;
use crate::parser::items::{Span, Stmt, VarDecl};

/// Inclusive line range of a tree entry.
pub trait LineRange {
    fn start_line(&self) -> usize;
    fn end_line(&self) -> usize;
}

impl LineRange for (usize, usize) {
    fn start_line(&self) -> usize {
        self.0
    }

    fn end_line(&self) -> usize {
        self.1
    }
}

/// One discovered directive with everything code generation needs.
#[derive(Debug)]
pub struct RegionNode<'a> {
    pub directive: Directive,
    /// The sentinel call statement.
    pub sentinel: &'a Stmt,
    /// Governed statement; for a chain of directives, the statement that ends the chain.
    pub body: Option<&'a Stmt>,
    /// Declarations visible at the sentinel.
    pub snapshot: Vec<&'a VarDecl>,
    /// Sentinel through end of body.
    pub span: Span,
}

impl RegionNode<'_> {
    pub fn label(&self) -> String {
        self.directive.label()
    }

    pub fn range(&self) -> Range<usize> {
        self.span.range()
    }

    /// Source text range following the sentinel call up to the end of the region.
    pub fn after_sentinel(&self) -> Range<usize> {
        self.sentinel.span.end..self.span.end
    }
}

impl LineRange for RegionNode<'_> {
    fn start_line(&self) -> usize {
        self.directive.line
    }

    fn end_line(&self) -> usize {
        self.directive.last_line
    }
}

#[derive(Debug)]
enum TreeNode<T> {
    Root,
    Region(T),
}

#[derive(Debug)]
pub struct RegionTree<T> {
    graph: StableGraph<TreeNode<T>, ()>,
    root: NodeIndex,
}

impl<T: LineRange> Default for RegionTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: LineRange> RegionTree<T> {
    pub fn new() -> Self {
        let mut graph = StableGraph::new();
        let root = graph.add_node(TreeNode::Root);
        Self { graph, root }
    }

    pub fn root(&self) -> NodeIndex {
        self.root
    }

    /// Number of regions, excluding the root.
    pub fn len(&self) -> usize {
        self.graph.node_count() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, idx: NodeIndex) -> Option<&T> {
        match self.graph.node_weight(idx)? {
            TreeNode::Region(value) => Some(value),
            TreeNode::Root => None,
        }
    }

    pub fn get_mut(&mut self, idx: NodeIndex) -> Option<&mut T> {
        match self.graph.node_weight_mut(idx)? {
            TreeNode::Region(value) => Some(value),
            TreeNode::Root => None,
        }
    }

    /// Every region, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.graph.node_indices().filter_map(|idx| self.get(idx))
    }

    fn lines(&self, idx: NodeIndex) -> (usize, usize) {
        self.get(idx)
            .map_or((0, usize::MAX), |v| (v.start_line(), v.end_line()))
    }

    /// Children of `idx` ordered by start line.
    pub fn children(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut children: Vec<_> = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .collect();
        children.sort_by_key(|&c| self.lines(c).0);
        children
    }

    pub fn parent(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.graph.neighbors_directed(idx, Direction::Incoming).next()
    }

    /// Inserts a region below the deepest region that strictly contains it, adopting the
    /// existing regions it strictly contains.
    pub fn insert(&mut self, value: T) -> Result<NodeIndex, Error> {
        let (start, end) = (value.start_line(), value.end_line());
        let mut current = self.root;

        'descend: loop {
            let children = self.children(current);
            for &child in &children {
                let (cs, ce) = self.lines(child);
                if cs == start {
                    return Err(Error::structural(
                        start,
                        "more than one directive starts on this line",
                    ));
                }
                if cs < start && end <= ce {
                    current = child;
                    continue 'descend;
                }
            }

            let mut adopted = vec![];
            for &child in &children {
                let (cs, ce) = self.lines(child);
                if start < cs && ce <= end {
                    adopted.push(child);
                } else if cs <= end && start <= ce {
                    return Err(Error::structural(
                        start,
                        format!(
                            "region [{start}, {end}] partially overlaps region [{cs}, {ce}]"
                        ),
                    ));
                }
            }

            let idx = self.graph.add_node(TreeNode::Region(value));
            self.graph.add_edge(current, idx, ());
            for child in adopted {
                if let Some(edge) = self.graph.find_edge(current, child) {
                    self.graph.remove_edge(edge);
                }
                self.graph.add_edge(idx, child, ());
            }
            return Ok(idx);
        }
    }

    /// Childless regions in source order.
    pub fn leaves(&self) -> Vec<NodeIndex> {
        let mut leaves = vec![];
        let mut stack = vec![self.root];
        while let Some(idx) = stack.pop() {
            let children = self.children(idx);
            if children.is_empty() && idx != self.root {
                leaves.push(idx);
            }
            stack.extend(children.into_iter().rev());
        }
        leaves
    }

    /// Detaches a childless region and hands it back.
    pub fn remove(&mut self, idx: NodeIndex) -> Option<T> {
        if idx == self.root || !self.children(idx).is_empty() {
            return None;
        }
        match self.graph.remove_node(idx)? {
            TreeNode::Region(value) => Some(value),
            TreeNode::Root => None,
        }
    }
}
