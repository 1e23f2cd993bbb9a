//! Basic blocks of a definition's control-flow graph.

use crate::symbol::SymbolId;
use crate::syntax::Expr;
use flintc_utils::idx::Idx;
use std::ops::Range;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct BlockId(usize);

impl Idx for BlockId {
    fn new(idx: usize) -> Self {
        BlockId(idx)
    }

    fn idx(&self) -> usize {
        self.0
    }
}

/// Mark used by depth-first traversals: white is unvisited, gray is on the
/// traversal stack (a back edge hits gray), black is finished. Every
/// traversal resets all marks to white before it starts.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Color {
    #[default]
    White,
    Gray,
    Black,
}

/// A node of the control-flow graph.
///
/// The block's statements are the half-open window `[head, head + count)`
/// into the owning definition's statement arena. The terminator is encoded
/// in `jump`: both `None` means return (with `expr` as the value when
/// `has_return_value` is set), only `jump[0]` is an unconditional goto, and
/// both edges form a conditional branch on `expr` whose taken edge is
/// `jump[1]`.
#[derive(Clone, Debug)]
pub struct Block {
    pub label: SymbolId,
    pub head: usize,
    pub count: usize,
    /// Branch condition or return value, depending on the terminator.
    pub expr: Option<Expr>,
    pub jump: [Option<BlockId>; 2],
    pub has_return_value: bool,
    pub color: Color,
}

impl Block {
    pub fn new(label: SymbolId) -> Block {
        Block {
            label,
            head: 0,
            count: 0,
            expr: None,
            jump: [None, None],
            has_return_value: false,
            color: Color::White,
        }
    }

    pub fn statements(&self) -> Range<usize> {
        self.head..self.head + self.count
    }

    pub fn successors(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.jump.iter().flatten().copied()
    }

    pub fn is_return(&self) -> bool {
        self.jump[0].is_none() && self.jump[1].is_none()
    }

    pub fn is_branch(&self) -> bool {
        self.jump[1].is_some()
    }
}
