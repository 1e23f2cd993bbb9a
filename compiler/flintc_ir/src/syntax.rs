//! Operands, expressions and statements of the three-address IR.

use crate::symbol::SymbolId;
use crate::ty::Type;
use crate::types::TypeTable;

/// A literal operand payload. Signedness of integers follows the operand's
/// type, not the payload.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Immediate {
    Int(i64),
    Float(f32),
    Double(f64),
    /// Address of a symbol, offset by the operand's byte offset.
    SymbolAddress(SymbolId),
    /// Address of an anonymous string literal.
    StringLiteral(SymbolId),
}

/// How an operand addresses its value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VarKind {
    /// Literal constant.
    Immediate(Immediate),
    /// Lvalue naming a storage location.
    Direct(SymbolId),
    /// The address of a named storage location.
    Address(SymbolId),
    /// Indirection through a symbol's value.
    Deref(SymbolId),
}

/// Bit offset and width of a bit-field access.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldSlice {
    pub offset: u32,
    pub width: u32,
}

/// An IR operand.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Var {
    pub kind: VarKind,
    pub ty: Type,
    /// Byte offset from the named location or address.
    pub offset: u64,
    pub field: Option<FieldSlice>,
}

impl Var {
    pub fn immediate_int(value: i64, ty: Type) -> Var {
        Var {
            kind: VarKind::Immediate(Immediate::Int(value)),
            ty,
            offset: 0,
            field: None,
        }
    }

    pub fn immediate_float(value: f32) -> Var {
        Var {
            kind: VarKind::Immediate(Immediate::Float(value)),
            ty: Type::FLOAT,
            offset: 0,
            field: None,
        }
    }

    pub fn immediate_double(value: f64) -> Var {
        Var {
            kind: VarKind::Immediate(Immediate::Double(value)),
            ty: Type::DOUBLE,
            offset: 0,
            field: None,
        }
    }

    pub fn direct(sym: SymbolId, ty: Type) -> Var {
        Var {
            kind: VarKind::Direct(sym),
            ty,
            offset: 0,
            field: None,
        }
    }

    pub fn address(sym: SymbolId, ty: Type) -> Var {
        Var {
            kind: VarKind::Address(sym),
            ty,
            offset: 0,
            field: None,
        }
    }

    pub fn deref(sym: SymbolId, ty: Type) -> Var {
        Var {
            kind: VarKind::Deref(sym),
            ty,
            offset: 0,
            field: None,
        }
    }

    pub fn with_offset(mut self, offset: u64) -> Var {
        self.offset = offset;
        self
    }

    pub fn with_field(mut self, offset: u32, width: u32) -> Var {
        self.field = Some(FieldSlice { offset, width });
        self
    }

    pub fn is_field(&self) -> bool {
        self.field.is_some()
    }

    /// The storage symbol for lvalue-ish kinds.
    pub fn lvalue_symbol(&self) -> Option<SymbolId> {
        match self.kind {
            VarKind::Direct(s) | VarKind::Address(s) | VarKind::Deref(s) => Some(s),
            VarKind::Immediate(_) => None,
        }
    }

    /// Whether two operands name the same location. Immediate payloads and
    /// their numeric values are not compared.
    pub fn same_location(&self, other: &Var, types: &TypeTable) -> bool {
        let kinds = match (self.kind, other.kind) {
            (VarKind::Direct(a), VarKind::Direct(b))
            | (VarKind::Address(a), VarKind::Address(b))
            | (VarKind::Deref(a), VarKind::Deref(b)) => a == b,
            (VarKind::Immediate(_), VarKind::Immediate(_)) => true,
            _ => false,
        };
        kinds
            && types.equal(self.ty, other.ty)
            && self.offset == other.offset
            && self.field == other.field
    }
}

/// Expression opcodes. `Cast` doubles as a plain operand reference when the
/// result type equals the operand type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    Cast,
    Call,
    VaArg,
    Not,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Eq,
    Ne,
    Ge,
    Gt,
}

/// An opcode applied to one or two operands, yielding a value of type `ty`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Expr {
    pub op: Op,
    pub ty: Type,
    pub l: Var,
    pub r: Option<Var>,
}

impl Expr {
    pub fn unary(op: Op, ty: Type, l: Var) -> Expr {
        Expr {
            op,
            ty,
            l,
            r: None,
        }
    }

    pub fn binary(op: Op, ty: Type, l: Var, r: Var) -> Expr {
        Expr {
            op,
            ty,
            l,
            r: Some(r),
        }
    }

    /// A no-op rename of `l`.
    pub fn identity(l: Var) -> Expr {
        Expr::unary(Op::Cast, l.ty, l)
    }

    /// A cast whose result type equals its operand type is a no-op rename.
    pub fn is_identity(&self, types: &TypeTable) -> bool {
        self.op == Op::Cast && types.equal(self.ty, self.l.ty)
    }

    pub fn operands(&self) -> impl Iterator<Item = &Var> {
        std::iter::once(&self.l).chain(self.r.as_ref())
    }

    /// Whether evaluating the expression is observable: calls, `va_arg`,
    /// and reads through a volatile-qualified indirection.
    pub fn has_side_effects(&self, _types: &TypeTable) -> bool {
        if matches!(self.op, Op::Call | Op::VaArg) {
            return true;
        }
        self.operands()
            .any(|v| matches!(v.kind, VarKind::Deref(_)) && v.ty.is_volatile())
    }
}

/// A statement of the three-address code. Statements live in their owning
/// definition's arena; blocks window into it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Statement {
    /// target <- expression
    Assign(Var, Expr),
    /// Push an argument onto the pending call.
    Param(Expr),
    VaStart(Expr),
    /// Evaluate for side effects only.
    Expr(Expr),
}

impl Statement {
    pub fn expr(&self) -> &Expr {
        match self {
            Statement::Assign(_, e)
            | Statement::Param(e)
            | Statement::VaStart(e)
            | Statement::Expr(e) => e,
        }
    }

    pub fn target(&self) -> Option<&Var> {
        match self {
            Statement::Assign(t, _) => Some(t),
            _ => None,
        }
    }

    /// A statement is observable when its expression is, or when it stores
    /// through a volatile-qualified target.
    pub fn has_side_effects(&self, types: &TypeTable) -> bool {
        if let Statement::Assign(t, _) = self {
            if t.ty.is_volatile() {
                return true;
            }
        }
        self.expr().has_side_effects(types)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{Symbol, SymbolArena};

    #[test]
    fn identity_requires_matching_types() {
        let types = TypeTable::new();
        let mut arena = SymbolArena::new();
        let x = arena.alloc(Symbol::local("x", Type::INT));
        let v = Var::direct(x, Type::INT);
        assert!(Expr::identity(v).is_identity(&types));
        assert!(!Expr::unary(Op::Cast, Type::LONG, v).is_identity(&types));
        assert!(!Expr::unary(Op::Not, Type::INT, v).is_identity(&types));
        // Qualifiers are disregarded by type equality.
        assert!(Expr::unary(Op::Cast, Type::INT.set_const(), v).is_identity(&types));
    }

    #[test]
    fn side_effects_of_calls_and_volatile_access() {
        let types = TypeTable::new();
        let mut arena = SymbolArena::new();
        let f = arena.alloc(Symbol::local("f", Type::INT));
        let p = arena.alloc(Symbol::local("p", Type::INT));

        let call = Expr::unary(Op::Call, Type::INT, Var::direct(f, Type::INT));
        assert!(call.has_side_effects(&types));

        let pure = Expr::binary(
            Op::Add,
            Type::INT,
            Var::immediate_int(1, Type::INT),
            Var::immediate_int(2, Type::INT),
        );
        assert!(!pure.has_side_effects(&types));

        let volatile_read = Expr::identity(Var::deref(p, Type::INT.set_volatile()));
        assert!(volatile_read.has_side_effects(&types));
        let plain_read = Expr::identity(Var::deref(p, Type::INT));
        assert!(!plain_read.has_side_effects(&types));

        let x = arena.alloc(Symbol::local("x", Type::INT.set_volatile()));
        let store = Statement::Assign(Var::direct(x, Type::INT.set_volatile()), pure);
        assert!(store.has_side_effects(&types));
    }
}
