//! Command-line surface.
//!
//! The spellings follow the usual C compiler conventions: `-O2`, `-std=c99`
//! and `-fPIC` are single-dash options, which clap does not parse natively.
//! [`normalize`] rewrites those few spellings onto clap's grammar before
//! parsing; everything else is declared on [`Args`] directly.

use clap::{ArgAction, Parser, ValueEnum};
use flintc_session::{CStd, Options, Target};
use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "flintc", about = "A C compiler for x86-64", version)]
pub struct Args {
    /// Stop after preprocessing.
    #[arg(short = 'E')]
    pub preprocess: bool,

    /// Emit x86-64 assembly text.
    #[arg(short = 'S')]
    pub assembly: bool,

    /// Emit an ELF relocatable object.
    #[arg(short = 'c')]
    pub object: bool,

    /// Write output to <file> instead of stdout.
    #[arg(short = 'o', value_name = "file")]
    pub output: Option<PathBuf>,

    /// Add <dir> to the include search path.
    #[arg(short = 'I', value_name = "dir")]
    pub include: Vec<PathBuf>,

    /// Predefine a macro.
    #[arg(short = 'D', value_name = "name[=value]")]
    pub define: Vec<String>,

    /// Optimization level, -O0 to -O3.
    #[arg(short = 'O', value_name = "level", default_value_t = 0)]
    pub optimize: u8,

    /// Language standard (-std=c89|c99|c11).
    #[arg(long = "std", value_enum, default_value_t = StdArg::C89)]
    pub std: StdArg,

    /// Verbose output; may be repeated.
    #[arg(short = 'v', action = ArgAction::Count)]
    pub verbose: u8,

    /// Suppress warnings.
    #[arg(short = 'w')]
    pub suppress_warnings: bool,

    /// Generate position independent code (-fPIC).
    #[arg(long = "fPIC", overrides_with = "no_pic")]
    pub pic: bool,

    /// Do not generate position independent code (-fno-PIC).
    #[arg(long = "fno-PIC", overrides_with = "pic")]
    pub no_pic: bool,

    /// List the symbol tables after compilation.
    #[arg(long)]
    pub dump_symbols: bool,

    /// List named types after compilation.
    #[arg(long)]
    pub dump_types: bool,

    /// Input file, already preprocessed.
    pub input: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StdArg {
    C89,
    C99,
    C11,
}

/// Rewrites the gcc-style single-dash spellings onto clap's grammar.
pub fn normalize(args: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
    args.into_iter()
        .map(|arg| match arg.to_str() {
            Some("-fPIC") => OsString::from("--fPIC"),
            Some("-fno-PIC") => OsString::from("--fno-PIC"),
            Some(s) if s.starts_with("-std=") => OsString::from(format!("--{}", &s[1..])),
            _ => arg,
        })
        .collect()
}

impl Args {
    pub fn to_options(&self) -> Options {
        let target = if self.preprocess {
            Target::None
        } else if self.object {
            Target::X86Elf
        } else if self.assembly {
            Target::X86Asm
        } else {
            Target::IrDot
        };

        Options {
            target,
            standard: match self.std {
                StdArg::C89 => CStd::C89,
                StdArg::C99 => CStd::C99,
                StdArg::C11 => CStd::C11,
            },
            optimization_level: self.optimize.min(3),
            pic: self.pic && !self.no_pic,
            verbose: self.verbose,
            suppress_warnings: self.suppress_warnings,
            output: self.output.clone(),
            include_paths: self.include.clone(),
            defines: self.define.clone(),
            dump_symbols: self.dump_symbols,
            dump_types: self.dump_types,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        let argv = std::iter::once(OsString::from("flintc"))
            .chain(args.iter().map(OsString::from));
        Args::parse_from(normalize(argv))
    }

    #[test]
    fn defaults_select_the_dot_target() {
        let opts = parse(&[]).to_options();
        assert_eq!(opts.target, Target::IrDot);
        assert_eq!(opts.optimization_level, 0);
        assert_eq!(opts.standard, CStd::C89);
        assert!(!opts.pic);
    }

    #[test]
    fn gcc_spellings_are_accepted() {
        let opts = parse(&["-O2", "-std=c11", "-fPIC", "-S", "a.i"]).to_options();
        assert_eq!(opts.optimization_level, 2);
        assert_eq!(opts.standard, CStd::C11);
        assert!(opts.pic);
        assert_eq!(opts.target, Target::X86Asm);
    }

    #[test]
    fn fno_pic_wins_over_fpic() {
        let opts = parse(&["-fPIC", "-fno-PIC"]).to_options();
        assert!(!opts.pic);
    }

    #[test]
    fn includes_and_defines_accumulate_in_order() {
        let args = parse(&["-I", "a", "-I", "b", "-D", "X=1", "-D", "Y"]);
        let opts = args.to_options();
        assert_eq!(opts.include_paths, vec![PathBuf::from("a"), PathBuf::from("b")]);
        assert_eq!(opts.defines, vec!["X=1".to_string(), "Y".to_string()]);
    }

    #[test]
    fn object_takes_precedence_over_assembly() {
        let opts = parse(&["-S", "-c"]).to_options();
        assert_eq!(opts.target, Target::X86Elf);
    }
}
