//! GraphViz dump of a definition's control-flow graph.
//!
//! Each block becomes a record-shaped node listing its statements and
//! terminator; edges run from a block's south port to its successors'
//! north ports. The format is purely diagnostic: nothing downstream parses
//! it back.

use flintc_ir::basic_blocks::BlockId;
use flintc_ir::context::Context;
use flintc_ir::def::Definition;
use flintc_ir::symbol::ConstantValue;
use flintc_ir::syntax::{Expr, Immediate, Op, Statement, Var, VarKind};
use std::fmt::Write as _;
use std::io::{self, Write};
use tracing::debug;

/// Label names start with `.`, which GraphViz node ids cannot.
fn sanitize(label: &str) -> &str {
    label.strip_prefix('.').unwrap_or(label)
}

/// Escapes a leading `.` for use inside a record label.
fn escape(label: &str) -> String {
    if label.starts_with('.') {
        format!("\\{}", label)
    } else {
        label.to_string()
    }
}

fn var_to_string(ctx: &Context, var: &Var) -> String {
    let mut s = match var.kind {
        VarKind::Immediate(imm) => match imm {
            Immediate::Int(i) => {
                if var.ty.is_unsigned() || var.ty.is_pointer() {
                    format!("{}", i as u64)
                } else {
                    format!("{}", i)
                }
            }
            Immediate::Float(f) => format!("{:.6}f", f),
            Immediate::Double(d) => format!("{:.6}", d),
            Immediate::SymbolAddress(sym) => {
                let name = ctx.symbols.name(sym);
                if var.offset != 0 {
                    format!("${}+{}", name, var.offset)
                } else {
                    format!("${}", name)
                }
            }
            Immediate::StringLiteral(sym) => {
                let text = match &ctx.symbols[sym].constant {
                    Some(ConstantValue::String(s)) => s.as_str(),
                    _ => "",
                };
                format!("\\\"{}\\\"", text)
            }
        },
        VarKind::Direct(sym) => {
            let name = ctx.symbols.name(sym);
            if var.offset != 0 {
                format!("*(&{} + {})", name, var.offset)
            } else {
                name.to_string()
            }
        }
        VarKind::Address(sym) => {
            let name = ctx.symbols.name(sym);
            if var.offset != 0 {
                format!("(&{} + {})", name, var.offset)
            } else {
                format!("&{}", name)
            }
        }
        VarKind::Deref(sym) => {
            let name = ctx.symbols.name(sym);
            if var.offset != 0 {
                format!("*({} + {})", name, var.offset)
            } else {
                format!("*{}", name)
            }
        }
    };

    if let Some(field) = var.field {
        let _ = write!(s, ":{}:{}", field.offset, field.width);
    }
    s
}

fn expr_to_string(ctx: &Context, expr: &Expr) -> String {
    let l = var_to_string(ctx, &expr.l);
    let r = || var_to_string(ctx, expr.r.as_ref().unwrap_or(&expr.l));
    match expr.op {
        Op::Cast => {
            if expr.is_identity(&ctx.types) {
                l
            } else {
                format!("({}) {}", ctx.types.display(&ctx.symbols, expr.ty), l)
            }
        }
        Op::Call => format!("call {}", l),
        Op::VaArg => format!(
            "va_arg({}, {})",
            l,
            ctx.types.display(&ctx.symbols, expr.ty)
        ),
        Op::Not => format!("~{}", l),
        Op::Add => format!("{} + {}", l, r()),
        Op::Sub => format!("{} - {}", l, r()),
        Op::Mul => format!("{} * {}", l, r()),
        Op::Div => format!("{} / {}", l, r()),
        Op::Mod => format!("{} % {}", l, r()),
        Op::And => format!("{} & {}", l, r()),
        Op::Or => format!("{} | {}", l, r()),
        Op::Xor => format!("{} ^ {}", l, r()),
        Op::Shl => format!("{} \\<\\< {}", l, r()),
        Op::Shr => format!("{} \\>\\> {}", l, r()),
        Op::Eq => format!("{} == {}", l, r()),
        Op::Ne => format!("{} != {}", l, r()),
        Op::Ge => format!("{} \\>= {}", l, r()),
        Op::Gt => format!("{} \\> {}", l, r()),
    }
}

fn output_node<W: Write>(
    w: &mut W,
    ctx: &Context,
    def: &mut Definition,
    b: BlockId,
) -> io::Result<()> {
    use flintc_ir::basic_blocks::Color;

    if def.nodes[b].color == Color::Black {
        return Ok(());
    }
    def.nodes[b].color = Color::Black;

    let label = ctx.symbols.name(def.nodes[b].label).to_string();
    write!(w, "\t{} [label=\"{{ {}", sanitize(&label), escape(&label))?;

    for i in def.nodes[b].statements() {
        match &def.statements[i] {
            Statement::Assign(t, e) => write!(
                w,
                " | {} = {}",
                var_to_string(ctx, t),
                expr_to_string(ctx, e)
            )?,
            Statement::Param(e) => write!(w, " | param {}", expr_to_string(ctx, e))?,
            Statement::VaStart(e) => write!(w, " | va_start({})", expr_to_string(ctx, e))?,
            Statement::Expr(e) => write!(w, " | {}", expr_to_string(ctx, e))?,
        }
    }

    let jump = def.nodes[b].jump;
    match jump {
        [None, None] => {
            if def.nodes[b].has_return_value {
                let expr = def.nodes[b].expr.expect("return value without expression");
                write!(w, " | return {}", expr_to_string(ctx, &expr))?;
            }
            writeln!(w, " }}\"];")?;
        }
        [Some(fallthrough), Some(taken)] => {
            let cond = def.nodes[b].expr.expect("branch without condition");
            let taken_label = escape(ctx.symbols.name(def.nodes[taken].label));
            write!(w, " | if {} goto {}", expr_to_string(ctx, &cond), taken_label)?;
            writeln!(w, " }}\"];")?;
            output_node(w, ctx, def, fallthrough)?;
            output_node(w, ctx, def, taken)?;
            for succ in [fallthrough, taken] {
                let succ_label = ctx.symbols.name(def.nodes[succ].label).to_string();
                writeln!(
                    w,
                    "\t{}:s -> {}:n;",
                    sanitize(&label),
                    sanitize(&succ_label)
                )?;
            }
        }
        [Some(next), None] => {
            writeln!(w, " }}\"];")?;
            output_node(w, ctx, def, next)?;
            let next_label = ctx.symbols.name(def.nodes[next].label).to_string();
            writeln!(
                w,
                "\t{}:s -> {}:n;",
                sanitize(&label),
                sanitize(&next_label)
            )?;
        }
        [None, Some(_)] => {
            // A lone taken edge is not a valid terminator; dump what we can.
            writeln!(w, " }}\"];")?;
        }
    }

    Ok(())
}

/// Writes one definition as a `digraph`.
pub fn write_dot<W: Write>(w: &mut W, ctx: &Context, def: &mut Definition) -> io::Result<()> {
    debug!(symbol = ctx.symbols.name(def.symbol), "dot dump");
    writeln!(w, "digraph {{")?;
    writeln!(
        w,
        "\tnode [fontname=\"Courier_New\",fontsize=10,style=\"setlinewidth(0.1)\",shape=record];"
    )?;
    writeln!(
        w,
        "\tedge [fontname=\"Courier_New\",fontsize=10,style=\"setlinewidth(0.1)\"];"
    )?;
    if ctx.symbols[def.symbol].ty.is_function() {
        writeln!(w, "\tlabel=\"{}\"", ctx.symbols.name(def.symbol))?;
        writeln!(w, "\tlabelloc=\"t\"")?;
    }

    def.reset_colors();
    let entry = def.entry;
    output_node(w, ctx, def, entry)?;
    writeln!(w, "}}")
}
