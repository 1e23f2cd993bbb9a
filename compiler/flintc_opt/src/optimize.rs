//! The pass driver.

use crate::liveness::Liveness;
use crate::transform::{dead_store_elimination, merge_chained_assignment};
use flintc_ir::basic_blocks::BlockId;
use flintc_ir::context::Context;
use flintc_ir::def::Definition;
use tracing::{debug, instrument};

/// Runs the local passes over each definition, honoring the `-O` level.
pub struct Optimizer {
    level: u8,
}

impl Optimizer {
    /// `level` 0 disables the optimizer entirely; 1-3 enable it.
    pub fn new(level: u8) -> Optimizer {
        Optimizer { level }
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    /// Rewrites `def` in place until a fixed point. Liveness is recomputed
    /// after every pass that erased or rewrote statements. Returns the
    /// total number of rewrites.
    #[instrument(level = "debug", skip_all, fields(level = self.level))]
    pub fn optimize(&self, ctx: &Context, def: &mut Definition) -> usize {
        if self.level == 0 {
            return 0;
        }

        let blocks: Vec<BlockId> = def.nodes.indices().collect();
        let mut total = 0;
        loop {
            let mut rewrites = 0;

            let live = Liveness::compute(ctx, def);
            for &b in &blocks {
                rewrites += merge_chained_assignment(ctx, &live, def, b);
            }

            let live = Liveness::compute(ctx, def);
            for &b in &blocks {
                rewrites += dead_store_elimination(ctx, &live, def, b);
            }

            total += rewrites;
            if rewrites == 0 {
                break;
            }
        }
        debug!(total, "definition optimized");
        total
    }
}
