//! Definitions: function bodies and global initializers.
//!
//! A definition owns one contiguous statement arena and the set of blocks
//! that window into it. The parser builds a definition front to back with
//! [`Definition::new_block`] and [`Definition::emit`]; the optimizer
//! rewrites it in place; the backend consumes it in topological order and
//! the whole thing is dropped at the function boundary.

use crate::basic_blocks::{Block, BlockId, Color};
use crate::symbol::{SymbolArena, SymbolId};
use crate::syntax::{Expr, Statement};
use flintc_utils::idx::Idx;
use flintc_utils::index_vec::IdxVec;
use tracing::trace;

pub struct Definition {
    /// The defining symbol: a function, or the object a global initializer
    /// belongs to.
    pub symbol: SymbolId,
    /// Statement arena. Blocks address it by `[head, head + count)`.
    pub statements: Vec<Statement>,
    pub nodes: IdxVec<BlockId, Block>,
    pub entry: BlockId,
}

impl Definition {
    /// Creates a definition with a fresh, empty entry block.
    pub fn new(symbol: SymbolId, symbols: &mut SymbolArena) -> Definition {
        let mut def = Definition {
            symbol,
            statements: Vec::new(),
            nodes: IdxVec::new(),
            entry: BlockId::new(0),
        };
        def.entry = def.new_block(symbols);
        def
    }

    /// Allocates a fresh block with its own label symbol.
    pub fn new_block(&mut self, symbols: &mut SymbolArena) -> BlockId {
        let label = symbols.create_label();
        self.nodes.push(Block::new(label))
    }

    /// Appends a statement to the arena and extends `block`'s window over
    /// it. Only the block whose window ends at the arena end may emit; the
    /// first emission into an empty block pins its window there.
    pub fn emit(&mut self, block: BlockId, stmt: Statement) {
        let len = self.statements.len();
        let b = &mut self.nodes[block];
        if b.count == 0 {
            b.head = len;
        }
        debug_assert_eq!(
            b.head + b.count,
            len,
            "emission into a block that is not at the arena end"
        );
        b.count += 1;
        self.statements.push(stmt);
    }

    /// Terminates `block` with an unconditional jump.
    pub fn set_jump(&mut self, block: BlockId, to: BlockId) {
        let b = &mut self.nodes[block];
        b.expr = None;
        b.has_return_value = false;
        b.jump = [Some(to), None];
    }

    /// Terminates `block` with a conditional branch on `cond`; the taken
    /// edge is `taken`, the fallthrough edge is `otherwise`.
    pub fn set_branch(&mut self, block: BlockId, cond: Expr, taken: BlockId, otherwise: BlockId) {
        let b = &mut self.nodes[block];
        b.expr = Some(cond);
        b.has_return_value = false;
        b.jump = [Some(otherwise), Some(taken)];
    }

    /// Terminates `block` with a return, optionally carrying a value.
    pub fn set_return(&mut self, block: BlockId, expr: Option<Expr>) {
        let b = &mut self.nodes[block];
        b.has_return_value = expr.is_some();
        b.expr = expr;
        b.jump = [None, None];
    }

    /// Removes the statement at `index` from the arena and adjusts the
    /// window of every block that overlaps or follows it, so that each
    /// remaining statement stays covered by exactly one block.
    pub fn erase_statement(&mut self, index: usize) {
        assert!(index < self.statements.len());
        trace!(index, "statement erased");
        self.statements.remove(index);
        for block in self.nodes.iter_mut() {
            if index > block.head + block.count {
                continue;
            }
            if index >= block.head && index < block.head + block.count {
                block.count -= 1;
            } else if index < block.head {
                block.head -= 1;
            }
        }
    }

    pub fn reset_colors(&mut self) {
        for block in self.nodes.iter_mut() {
            block.color = Color::White;
        }
    }

    /// Blocks in reverse postorder from the entry, the topological order the
    /// backend consumes. Unreachable blocks are not included.
    pub fn reverse_postorder(&mut self) -> Vec<BlockId> {
        self.reset_colors();
        let mut postorder = Vec::with_capacity(self.nodes.len());
        // Explicit stack; the second visit of a frame emits the block.
        let mut stack = vec![(self.entry, false)];
        while let Some((b, finished)) = stack.pop() {
            if finished {
                self.nodes[b].color = Color::Black;
                postorder.push(b);
                continue;
            }
            if self.nodes[b].color != Color::White {
                continue;
            }
            self.nodes[b].color = Color::Gray;
            stack.push((b, true));
            for succ in [self.nodes[b].jump[1], self.nodes[b].jump[0]]
                .into_iter()
                .flatten()
            {
                if self.nodes[succ].color == Color::White {
                    stack.push((succ, false));
                }
            }
        }
        postorder.reverse();
        postorder
    }

    /// The block whose window covers the statement at `index`.
    pub fn block_containing(&self, index: usize) -> Option<BlockId> {
        self.nodes
            .iter_enumerated()
            .find(|(_, b)| index >= b.head && index < b.head + b.count)
            .map(|(id, _)| id)
    }
}
