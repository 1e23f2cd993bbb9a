//! Per-translation-unit state that is not part of the program being
//! compiled: the options selected on the command line, and the diagnostic
//! counters that decide the process exit status.
//!
//! One [`Session`] lives for exactly one translation unit and is torn down
//! with it. Internal compiler logging goes through `tracing`; user-facing
//! diagnostics go through [`Session::error`] and friends, which is what the
//! error counter observes.

use std::cell::Cell;
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

/// The output the driver produces for one translation unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    /// Stop after preprocessing (`-E`).
    None,
    /// GraphViz dump of every definition's control-flow graph. The default.
    IrDot,
    /// x86-64 assembly text (`-S`).
    X86Asm,
    /// x86-64 ELF relocatable object (`-c`).
    X86Elf,
}

/// The language standard the parser accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CStd {
    C89,
    C99,
    C11,
}

/// Everything configurable from the command line.
#[derive(Debug)]
pub struct Options {
    pub target: Target,
    pub standard: CStd,
    /// 0 disables the optimizer; 1-3 enable it.
    pub optimization_level: u8,
    /// Position independent code.
    pub pic: bool,
    pub verbose: u8,
    pub suppress_warnings: bool,
    /// Output path; `None` means stdout.
    pub output: Option<PathBuf>,
    /// `-I` search paths, highest priority first.
    pub include_paths: Vec<PathBuf>,
    /// `-D NAME[=VAL]` predefinitions, in command-line order.
    pub defines: Vec<String>,
    pub dump_symbols: bool,
    pub dump_types: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            target: Target::IrDot,
            standard: CStd::C89,
            optimization_level: 0,
            pic: false,
            verbose: 0,
            suppress_warnings: false,
            output: None,
            include_paths: Vec::new(),
            defines: Vec::new(),
            dump_symbols: false,
            dump_types: false,
        }
    }
}

/// Options plus the diagnostic state of the current translation unit.
pub struct Session {
    pub options: Options,
    errors: Cell<u32>,
}

impl Session {
    pub fn new(options: Options) -> Self {
        debug!(?options, "session created");
        Session {
            options,
            errors: Cell::new(0),
        }
    }

    /// Reports an error to stderr and bumps the error counter.
    pub fn error(&self, msg: impl fmt::Display) {
        self.errors.set(self.errors.get() + 1);
        eprintln!("error: {}", msg);
    }

    /// Reports a warning to stderr. Warnings never affect the exit status
    /// and are dropped under `-w`.
    pub fn warning(&self, msg: impl fmt::Display) {
        if !self.options.suppress_warnings {
            eprintln!("warning: {}", msg);
        }
    }

    /// Chatty progress output, shown under `-v`.
    pub fn verbose(&self, msg: impl fmt::Display) {
        if self.options.verbose > 0 {
            println!("{}", msg);
        }
    }

    pub fn errors(&self) -> u32 {
        self.errors.get()
    }

    pub fn has_errors(&self) -> bool {
        self.errors.get() > 0
    }

    /// Exit status of the process: the number of errors, saturated to fit.
    pub fn exit_status(&self) -> i32 {
        self.errors.get().min(i32::MAX as u32) as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_accumulate_into_exit_status() {
        let sess = Session::new(Options::default());
        assert_eq!(sess.exit_status(), 0);
        sess.error("first");
        sess.error("second");
        assert!(sess.has_errors());
        assert_eq!(sess.errors(), 2);
        assert_eq!(sess.exit_status(), 2);
    }

    #[test]
    fn default_target_is_ir_dot() {
        let opts = Options::default();
        assert_eq!(opts.target, Target::IrDot);
        assert_eq!(opts.standard, CStd::C89);
        assert_eq!(opts.optimization_level, 0);
    }
}
