//! Liveness of local symbols.
//!
//! Per-block solution of the backward dataflow equations
//! `live_in(b) = use(b) ∪ (live_out(b) \ def(b))` and
//! `live_out(b) = ⋃ live_in(s)` over the successors `s` of `b`.
//!
//! Only symbols with no linkage are tracked; globals and statics are
//! conservatively always live, as are locals whose address is taken or
//! whose type is volatile. Partial stores (a nonzero offset or a bit-field
//! slice) read the rest of the object and therefore count as uses, not
//! definitions.
//!
//! The result is valid until statements are erased or rewritten in a way
//! that changes use/def sets across blocks; passes recompute it between
//! sweeps. Within one block, [`Liveness::is_live_after`] walks the current
//! statements backward from the cached `live_out`, so in-block rewrites by
//! the running pass are observed.

use flintc_ir::basic_blocks::BlockId;
use flintc_ir::context::Context;
use flintc_ir::def::Definition;
use flintc_ir::symbol::{Linkage, SymbolId, SymbolKind};
use flintc_ir::syntax::{Expr, Immediate, Statement, Var, VarKind};
use flintc_utils::bit_set::BitSet;
use flintc_utils::idx::Idx;
use flintc_utils::index_vec::IdxVec;
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// Dense per-definition numbering of tracked symbols.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
struct LiveVar(usize);

impl Idx for LiveVar {
    fn new(idx: usize) -> Self {
        LiveVar(idx)
    }

    fn idx(&self) -> usize {
        self.0
    }
}

pub struct Liveness {
    index: HashMap<SymbolId, LiveVar>,
    live_in: IdxVec<BlockId, BitSet<LiveVar>>,
    live_out: IdxVec<BlockId, BitSet<LiveVar>>,
}

/// Calls `f` for every symbol whose value the expression reads: `DIRECT`
/// operands and the pointer consumed by a `DEREF`.
fn expr_uses(expr: &Expr, f: &mut impl FnMut(SymbolId)) {
    for v in expr.operands() {
        if let VarKind::Direct(s) | VarKind::Deref(s) = v.kind {
            f(s);
        }
    }
}

/// Whether an assignment to `target` overwrites the named object entirely.
fn is_full_store(ctx: &Context, target: &Var, sym: SymbolId) -> bool {
    target.offset == 0
        && target.field.is_none()
        && ctx.types.size_of(target.ty) >= ctx.types.size_of(ctx.symbols[sym].ty)
}

/// Calls `f` for every symbol the statement reads.
fn statement_uses(ctx: &Context, stmt: &Statement, f: &mut impl FnMut(SymbolId)) {
    expr_uses(stmt.expr(), f);
    if let Statement::Assign(t, _) = stmt {
        match t.kind {
            // A store through a pointer reads the pointer value.
            VarKind::Deref(s) => f(s),
            // A partial store leaves the rest of the object meaningful.
            VarKind::Direct(s) if !is_full_store(ctx, t, s) => f(s),
            _ => {}
        }
    }
}

/// The symbol the statement fully overwrites, if any.
fn statement_def(ctx: &Context, stmt: &Statement) -> Option<SymbolId> {
    if let Statement::Assign(t, _) = stmt {
        if let VarKind::Direct(s) = t.kind {
            if is_full_store(ctx, t, s) {
                return Some(s);
            }
        }
    }
    None
}

impl Liveness {
    pub fn compute(ctx: &Context, def: &Definition) -> Liveness {
        let index = Self::collect_tracked(ctx, def);
        let n = index.len();
        let nb = def.nodes.len();
        trace!(tracked = n, blocks = nb, "liveness");

        let mut uses = IdxVec::<BlockId, _>::from_fn_n(|_| BitSet::new_empty(n), nb);
        let mut defs = IdxVec::<BlockId, _>::from_fn_n(|_| BitSet::new_empty(n), nb);
        for (b, block) in def.nodes.iter_enumerated() {
            for i in block.statements() {
                let Some(stmt) = def.statements.get(i) else {
                    break;
                };
                statement_uses(ctx, stmt, &mut |s| {
                    if let Some(&v) = index.get(&s) {
                        if !defs[b].contains(v) {
                            uses[b].insert(v);
                        }
                    }
                });
                if let Some(d) = statement_def(ctx, stmt) {
                    if let Some(&v) = index.get(&d) {
                        defs[b].insert(v);
                    }
                }
            }
            // The terminator reads its expression at the end of the block.
            if let Some(expr) = &block.expr {
                expr_uses(expr, &mut |s| {
                    if let Some(&v) = index.get(&s) {
                        if !defs[b].contains(v) {
                            uses[b].insert(v);
                        }
                    }
                });
            }
        }

        let mut live_in = IdxVec::<BlockId, _>::from_fn_n(|_| BitSet::new_empty(n), nb);
        let mut live_out = IdxVec::<BlockId, _>::from_fn_n(|_| BitSet::new_empty(n), nb);
        loop {
            let mut changed = false;
            for b in def.nodes.indices().rev() {
                let mut out = BitSet::new_empty(n);
                for s in def.nodes[b].successors() {
                    out.union_with(&live_in[s]);
                }
                let mut inn = out.clone();
                inn.subtract(&defs[b]);
                inn.union_with(&uses[b]);
                if out != live_out[b] {
                    live_out[b] = out;
                    changed = true;
                }
                if inn != live_in[b] {
                    live_in[b] = inn;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        Liveness {
            index,
            live_in,
            live_out,
        }
    }

    /// Numbers the symbols whose liveness is worth tracking: linkage-free
    /// variables that are never volatile and never have their address
    /// taken anywhere in the definition.
    fn collect_tracked(ctx: &Context, def: &Definition) -> HashMap<SymbolId, LiveVar> {
        let mut seen: Vec<SymbolId> = Vec::new();
        let mut excluded: HashSet<SymbolId> = HashSet::new();

        let mut visit = |v: &Var| match v.kind {
            VarKind::Direct(s) | VarKind::Deref(s) => {
                let sym = &ctx.symbols[s];
                if sym.linkage == Linkage::None
                    && sym.kind == SymbolKind::Variable
                    && !sym.ty.is_volatile()
                    && !seen.contains(&s)
                {
                    seen.push(s);
                }
            }
            VarKind::Address(s) => {
                excluded.insert(s);
            }
            VarKind::Immediate(Immediate::SymbolAddress(s))
            | VarKind::Immediate(Immediate::StringLiteral(s)) => {
                excluded.insert(s);
            }
            VarKind::Immediate(_) => {}
        };

        for stmt in &def.statements {
            if let Some(t) = stmt.target() {
                visit(t);
            }
            for v in stmt.expr().operands() {
                visit(v);
            }
        }
        for block in def.nodes.iter() {
            if let Some(expr) = &block.expr {
                for v in expr.operands() {
                    visit(v);
                }
            }
        }

        seen.retain(|s| !excluded.contains(s));
        seen.into_iter()
            .enumerate()
            .map(|(i, s)| (s, LiveVar(i)))
            .collect()
    }

    pub fn is_tracked(&self, sym: SymbolId) -> bool {
        self.index.contains_key(&sym)
    }

    /// The number of tracked symbols live out of `block`.
    pub fn live_out_count(&self, block: BlockId) -> usize {
        self.live_out[block].count()
    }

    /// Whether `sym` is live out of `block`.
    pub fn is_live_out(&self, block: BlockId, sym: SymbolId) -> bool {
        match self.index.get(&sym) {
            Some(&v) => self.live_out[block].contains(v),
            None => true,
        }
    }

    /// Whether `sym` is live into `block`.
    pub fn is_live_in(&self, block: BlockId, sym: SymbolId) -> bool {
        match self.index.get(&sym) {
            Some(&v) => self.live_in[block].contains(v),
            None => true,
        }
    }

    /// Whether the value `sym` holds right after the statement at position
    /// `index` within `block` can still be read on some path to the
    /// function exit. Untracked symbols are always live.
    pub fn is_live_after(
        &self,
        ctx: &Context,
        def: &Definition,
        block: BlockId,
        index: usize,
        sym: SymbolId,
    ) -> bool {
        let Some(&v) = self.index.get(&sym) else {
            return true;
        };
        let b = &def.nodes[block];
        debug_assert!(index < b.count);

        let mut live = self.live_out[block].clone();
        if let Some(expr) = &b.expr {
            expr_uses(expr, &mut |s| {
                if let Some(&lv) = self.index.get(&s) {
                    live.insert(lv);
                }
            });
        }
        for j in (index + 1..b.count).rev() {
            let Some(stmt) = def.statements.get(b.head + j) else {
                continue;
            };
            if let Some(d) = statement_def(ctx, stmt) {
                if let Some(&dv) = self.index.get(&d) {
                    live.remove(dv);
                }
            }
            statement_uses(ctx, stmt, &mut |s| {
                if let Some(&lv) = self.index.get(&s) {
                    live.insert(lv);
                }
            });
        }
        live.contains(v)
    }
}
