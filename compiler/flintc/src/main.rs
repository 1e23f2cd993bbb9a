//! The driver.
//!
//! Wires the pipeline together: options, session, compilation context,
//! optimizer and the selected output. The preprocessor, the parser and the
//! x86-64 backend are separate components that feed and consume the IR;
//! this build carries the middle end, so the driver demonstrates the
//! pipeline on a definition built directly through the IR builder API and
//! reports a diagnostic for outputs that need the missing components.

mod options;

use anyhow::Context as _;
use clap::Parser;
use flintc_ir::context::Context;
use flintc_ir::def::Definition;
use flintc_ir::symbol::{Linkage, StorageClass, Symbol, SymbolId, SymbolKind};
use flintc_ir::syntax::{Expr, Op, Statement, Var};
use flintc_ir::ty::Type;
use flintc_opt::Optimizer;
use flintc_session::{Session, Target};
use std::fs::File;
use std::io::Write;
use std::process::ExitCode;
use tracing::debug;

fn main() -> ExitCode {
    if let Err(err) = flintc_log::Logger::init(flintc_log::LoggerConfig::from_env("FLINTC")) {
        eprintln!("error initializing logger: {}", err);
        return ExitCode::FAILURE;
    }

    let args = options::Args::parse_from(options::normalize(std::env::args_os()));
    let sess = Session::new(args.to_options());
    debug!(options = ?sess.options, "driver started");

    match sess.options.target {
        Target::None => {
            sess.error("the preprocessor is not linked into this build; -E is unavailable");
        }
        _ => {
            if let Err(err) = compile(&sess) {
                sess.error(err);
            }
        }
    }

    // The exit status is the number of errors.
    ExitCode::from(sess.exit_status().min(u8::MAX as i32) as u8)
}

/// Runs one translation unit through the middle end.
fn compile(sess: &Session) -> anyhow::Result<()> {
    let mut ctx = Context::new();
    ctx.open_file_scope();
    register_builtin_declarations(&mut ctx, sess)?;

    let optimizer = Optimizer::new(sess.options.optimization_level);
    // The parser hands definitions over in source order; this build stands
    // in with a single demonstration definition.
    for mut def in [build_sample_definition(&mut ctx, sess)?] {
        // A definition is only compiled while the unit is still clean;
        // pending errors abort before the next one.
        if sess.has_errors() {
            sess.error(format_args!(
                "aborting because of previous {}",
                if sess.errors() > 1 { "errors" } else { "error" }
            ));
            break;
        }
        let rewrites = optimizer.optimize(&ctx, &mut def);
        sess.verbose(format_args!("optimizer performed {} rewrites", rewrites));
        emit(sess, &ctx, &mut def)?;
    }

    // Tentative file-scope definitions resolve at the end of the unit, in
    // declaration order.
    while let Some(sym) = ctx.identifiers.yield_declaration() {
        sess.verbose(format_args!(
            "tentative definition: {}",
            ctx.symbols.name(sym)
        ));
    }

    if sess.options.dump_symbols {
        dump_symbols(&ctx);
    }
    if sess.options.dump_types {
        dump_types(&ctx);
    }

    ctx.close_file_scope();
    Ok(())
}

/// Emits one optimized definition to the selected target.
fn emit(sess: &Session, ctx: &Context, def: &mut Definition) -> anyhow::Result<()> {
    match sess.options.target {
        Target::IrDot => {
            let mut out = open_output(sess)?;
            flintc_graphviz::write_dot(&mut out, ctx, def).context("writing dot output")?;
        }
        Target::X86Asm | Target::X86Elf => {
            sess.error("the x86-64 backend is not linked into this build");
        }
        Target::None => unreachable!("handled by the caller"),
    }
    Ok(())
}

/// Registers the compiler-internal builtin symbols that standard library
/// headers assume to exist, before anything else is declared in the unit.
fn register_builtin_declarations(ctx: &mut Context, sess: &Session) -> anyhow::Result<()> {
    let void_ptr = ctx.types.pointer_to(Type::VOID);
    let const_void_ptr = ctx.types.pointer_to(Type::VOID.set_const());
    let memcpy = ctx.types.function_of(void_ptr);
    let _ = ctx.types.add_member(memcpy, "dest", void_ptr)?;
    let _ = ctx.types.add_member(memcpy, "src", const_void_ptr)?;
    let _ = ctx.types.add_member(memcpy, "n", Type::UNSIGNED_LONG)?;
    declare(
        ctx,
        sess,
        Symbol {
            kind: SymbolKind::Function,
            linkage: Linkage::External,
            storage: StorageClass::Extern,
            ..Symbol::local("memcpy", memcpy)
        },
    )?;

    for name in ["__builtin_va_start", "__builtin_va_arg"] {
        let ty = ctx.types.function_of(Type::VOID);
        declare(
            ctx,
            sess,
            Symbol {
                kind: SymbolKind::Function,
                linkage: Linkage::External,
                storage: StorageClass::Extern,
                ..Symbol::local(name, ty)
            },
        )?;
    }
    Ok(())
}

fn open_output(sess: &Session) -> anyhow::Result<Box<dyn Write>> {
    Ok(match &sess.options.output {
        Some(path) => Box::new(
            File::create(path)
                .with_context(|| format!("could not open output file '{}'", path.display()))?,
        ),
        None => Box::new(std::io::stdout()),
    })
}

/// Stands in for the parser: the body of
///
/// ```c
/// int main(void) {
///     int a = 1;
///     int b = 2;
///     int t1 = a + b;
///     int x = t1;
///     return x;
/// }
/// ```
///
/// built through the same API the parser uses. At -O1 and above the
/// optimizer collapses the chain through `t1`.
fn build_sample_definition(ctx: &mut Context, sess: &Session) -> anyhow::Result<Definition> {
    let fn_ty = ctx.types.function_of(Type::INT);
    let main = declare(
        ctx,
        sess,
        Symbol {
            kind: SymbolKind::Function,
            linkage: Linkage::External,
            storage: StorageClass::Extern,
            ..Symbol::local("main", fn_ty)
        },
    )?;

    ctx.identifiers.push_scope();
    let a = declare(ctx, sess, Symbol::local("a", Type::INT))?;
    let b = declare(ctx, sess, Symbol::local("b", Type::INT))?;
    let t1 = declare(ctx, sess, Symbol::local("t1", Type::INT))?;
    let x = declare(ctx, sess, Symbol::local("x", Type::INT))?;

    let int_var = |sym: SymbolId| Var::direct(sym, Type::INT);
    let mut def = Definition::new(main, &mut ctx.symbols);
    let entry = def.entry;
    def.emit(
        entry,
        Statement::Assign(int_var(a), Expr::identity(Var::immediate_int(1, Type::INT))),
    );
    def.emit(
        entry,
        Statement::Assign(int_var(b), Expr::identity(Var::immediate_int(2, Type::INT))),
    );
    def.emit(
        entry,
        Statement::Assign(
            int_var(t1),
            Expr::binary(Op::Add, Type::INT, int_var(a), int_var(b)),
        ),
    );
    def.emit(entry, Statement::Assign(int_var(x), Expr::identity(int_var(t1))));
    def.set_return(entry, Some(Expr::identity(int_var(x))));

    ctx.identifiers.pop_scope();
    ctx.types.clean_prototype(fn_ty);
    Ok(def)
}

/// Declares in the ordinary namespace, routing semantic errors through the
/// session so parsing-style recovery keeps the error count accurate.
fn declare(ctx: &mut Context, sess: &Session, sym: Symbol) -> anyhow::Result<SymbolId> {
    let name = sym.name.clone();
    match ctx.identifiers.declare(&ctx.types, &mut ctx.symbols, sym) {
        Ok(id) => Ok(id),
        Err(err) => {
            sess.error(&err);
            anyhow::bail!("declaration of '{}' failed", name)
        }
    }
}

fn dump_symbols(ctx: &Context) {
    for (_, sym) in ctx.symbols.iter_enumerated() {
        if sym.kind == SymbolKind::Label {
            continue;
        }
        println!(
            "{} : {}",
            sym.name,
            ctx.types.display(&ctx.symbols, sym.ty)
        );
    }
}

fn dump_types(ctx: &Context) {
    for (id, sym) in ctx.symbols.iter_enumerated() {
        if matches!(sym.kind, SymbolKind::Tag | SymbolKind::Typedef) {
            println!(
                "{} : {}",
                sym.name,
                ctx.types.display_expanded(&ctx.symbols, sym.ty, id)
            );
        }
    }
}
