//! Local optimizations over a definition's control-flow graph.
//!
//! The optimizer runs after a function is fully parsed and before the
//! backend consumes it. All passes are local rewrites driven by liveness;
//! none of them is ever fatal. A pass that finds a block violating its
//! expectations leaves that block alone.

pub mod liveness;
pub mod optimize;
pub mod transform;

pub use liveness::Liveness;
pub use optimize::Optimizer;
