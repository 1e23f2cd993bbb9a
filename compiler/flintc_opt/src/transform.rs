//! Statement rewrites over one basic block.

use crate::liveness::Liveness;
use flintc_ir::basic_blocks::BlockId;
use flintc_ir::context::Context;
use flintc_ir::def::Definition;
use flintc_ir::symbol::Linkage;
use flintc_ir::syntax::{Statement, VarKind};
use tracing::trace;

/// Whether the block's window lies inside the statement arena. A pass
/// finding it broken leaves the block alone.
fn window_intact(def: &Definition, block: BlockId) -> bool {
    let b = &def.nodes[block];
    b.head + b.count <= def.statements.len()
}

/// Decides whether the adjacent pair
///
/// ```text
/// s1: t1 = a op b
/// s2: t2 = t1
/// ```
///
/// can be fused into `t2 = a op b`. `s2` must be an identity rename of
/// `t1`, the targets must have equal type, and `t1` must be a plain
/// (non-bit-field) local with no linkage that is not live after `s2`.
fn can_merge(
    ctx: &Context,
    live: &Liveness,
    def: &Definition,
    block: BlockId,
    index: usize,
    s1: &Statement,
    s2: &Statement,
) -> bool {
    let (Statement::Assign(t1, _), Statement::Assign(t2, e2)) = (*s1, *s2) else {
        return false;
    };
    if !e2.is_identity(&ctx.types) {
        return false;
    }
    if !t1.same_location(&e2.l, &ctx.types) {
        return false;
    }
    if !ctx.types.equal(t1.ty, t2.ty) {
        return false;
    }
    let VarKind::Direct(sym) = t1.kind else {
        return false;
    };
    ctx.symbols[sym].linkage == Linkage::None
        && !t1.is_field()
        && !live.is_live_after(ctx, def, block, index, sym)
}

/// Fuses chains of assignments through dead temporaries. Returns the number
/// of merges performed. After a merge the fused statement is examined again
/// against its new successor; the scan only advances on failure.
pub fn merge_chained_assignment(
    ctx: &Context,
    live: &Liveness,
    def: &mut Definition,
    block: BlockId,
) -> usize {
    if !window_intact(def, block) || def.nodes[block].count <= 1 {
        return 0;
    }

    let mut merged = 0;
    let mut i = 1;
    let mut s1 = def.statements[def.nodes[block].head];
    while i < def.nodes[block].count {
        let head = def.nodes[block].head;
        let s2 = def.statements[head + i];
        if can_merge(ctx, live, def, block, i, &s1, &s2) {
            let (Statement::Assign(_, e1), Statement::Assign(t2, _)) = (s1, s2) else {
                unreachable!();
            };
            merged += 1;
            s1 = Statement::Assign(t2, e1);
            def.statements[head + i - 1] = s1;
            def.erase_statement(head + i);
            trace!(block = ?block, index = i, "assignments merged");
        } else {
            s1 = def.statements[head + i];
            i += 1;
        }
    }

    merged
}

/// Removes assignments to linkage-free locals that are not live after the
/// store. A store whose expression has side effects survives as a bare
/// expression statement with the target discarded. Returns the number of
/// statements rewritten or erased.
pub fn dead_store_elimination(
    ctx: &Context,
    live: &Liveness,
    def: &mut Definition,
    block: BlockId,
) -> usize {
    if !window_intact(def, block) {
        return 0;
    }

    let mut removed = 0;
    let mut i = 0;
    while i < def.nodes[block].count {
        let head = def.nodes[block].head;
        let stmt = def.statements[head + i];
        let dead_target = match &stmt {
            Statement::Assign(t, _) => match t.kind {
                VarKind::Direct(sym) => {
                    ctx.symbols[sym].linkage == Linkage::None
                        && !live.is_live_after(ctx, def, block, i, sym)
                }
                _ => false,
            },
            _ => false,
        };
        if dead_target {
            removed += 1;
            let Statement::Assign(_, e) = stmt else {
                unreachable!();
            };
            if e.has_side_effects(&ctx.types) {
                def.statements[head + i] = Statement::Expr(e);
                trace!(block = ?block, index = i, "dead store demoted to expression");
                i += 1;
            } else {
                def.erase_statement(head + i);
                trace!(block = ?block, index = i, "dead store erased");
            }
        } else {
            i += 1;
        }
    }

    removed
}
