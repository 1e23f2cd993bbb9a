//! Diagnostic rendering of types.
//!
//! Self-referential aggregates print through their tag (`struct node`)
//! instead of expanding forever; `expand` forces one level of expansion for
//! the `--dump-types` listing.

use crate::symbol::{SymbolArena, SymbolId, SymbolKind};
use crate::ty::{Type, TypeKind};
use crate::types::TypeTable;
use std::fmt;

/// Borrowed view that formats one type.
pub struct TypeDisplay<'a> {
    table: &'a TypeTable,
    symbols: &'a SymbolArena,
    ty: Type,
    expand: Option<SymbolId>,
}

impl TypeTable {
    /// Renders `ty` for diagnostics.
    pub fn display<'a>(&'a self, symbols: &'a SymbolArena, ty: Type) -> TypeDisplay<'a> {
        TypeDisplay {
            table: self,
            symbols,
            ty,
            expand: None,
        }
    }

    /// Like [`TypeTable::display`], but expands the aggregate tagged by
    /// `expand` one level instead of printing its name.
    pub fn display_expanded<'a>(
        &'a self,
        symbols: &'a SymbolArena,
        ty: Type,
        expand: SymbolId,
    ) -> TypeDisplay<'a> {
        TypeDisplay {
            table: self,
            symbols,
            ty,
            expand: Some(expand),
        }
    }

    fn fmt_type(
        &self,
        f: &mut fmt::Formatter<'_>,
        symbols: &SymbolArena,
        ty: Type,
        expand: Option<SymbolId>,
    ) -> fmt::Result {
        if ty.is_const() {
            write!(f, "const ")?;
        }
        if ty.is_volatile() {
            write!(f, "volatile ")?;
        }
        if ty.is_restrict() {
            write!(f, "restrict ")?;
        }
        if ty.is_unsigned() && !ty.is_bool() {
            write!(f, "unsigned ")?;
        }

        match ty.kind() {
            TypeKind::Void => write!(f, "void"),
            TypeKind::Bool => write!(f, "_Bool"),
            TypeKind::Char => write!(f, "char"),
            TypeKind::Short => write!(f, "short"),
            TypeKind::Int => write!(f, "int"),
            TypeKind::Long => write!(f, "long"),
            TypeKind::Float => write!(f, "float"),
            TypeKind::Double => write!(f, "double"),
            TypeKind::LongDouble => write!(f, "long double"),
            TypeKind::Pointer => {
                write!(f, "* ")?;
                self.fmt_type(f, symbols, self.deref(ty), None)
            }
            TypeKind::Function => {
                write!(f, "(")?;
                let members = self.members(ty);
                for (i, m) in members.iter().enumerate() {
                    if m.offset != 0 {
                        write!(f, "static({}) ", m.offset)?;
                    }
                    self.fmt_type(f, symbols, m.ty, None)?;
                    if i + 1 < members.len() {
                        write!(f, ", ")?;
                    }
                }
                if self.is_vararg(ty) {
                    write!(f, ", ...")?;
                }
                write!(f, ") -> ")?;
                self.fmt_type(f, symbols, self.next(ty), None)
            }
            TypeKind::Array => {
                if self.is_vla(ty) {
                    match self.vla_length(ty) {
                        Some(len) => write!(f, "[{}] ", symbols.name(len))?,
                        None => write!(f, "[*] ")?,
                    }
                } else if self.array_len(ty) != 0 {
                    write!(f, "[{}] ", self.array_len(ty))?;
                } else {
                    write!(f, "[] ")?;
                }
                self.fmt_type(f, symbols, self.next(ty), None)
            }
            TypeKind::Struct | TypeKind::Union => {
                if let Some(tag) = self.tag(ty).filter(|t| Some(*t) != expand) {
                    return match symbols[tag].kind {
                        SymbolKind::Tag => {
                            let s = if ty.is_union() { "union" } else { "struct" };
                            write!(f, "{} {}", s, symbols.name(tag))
                        }
                        _ => write!(f, "{}", symbols.name(tag)),
                    };
                }
                write!(f, "{{")?;
                let members = self.members(ty);
                for (i, m) in members.iter().enumerate() {
                    write!(f, ".{}::", m.name)?;
                    self.fmt_type(f, symbols, m.ty, None)?;
                    if m.is_field() {
                        write!(f, " (+{}:{}:{})", m.offset, m.field_offset, m.field_width)?;
                    } else {
                        write!(f, " (+{})", m.offset)?;
                    }
                    if i + 1 < members.len() {
                        write!(f, ", ")?;
                    }
                }
                write!(f, "}}")
            }
        }
    }
}

impl fmt::Display for TypeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.table.fmt_type(f, self.symbols, self.ty, self.expand)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{Linkage, StorageClass, Symbol};

    #[test]
    fn scalars_and_pointers() {
        let mut table = TypeTable::new();
        let symbols = SymbolArena::new();
        assert_eq!(table.display(&symbols, Type::INT).to_string(), "int");
        assert_eq!(
            table.display(&symbols, Type::UNSIGNED_LONG).to_string(),
            "unsigned long"
        );
        assert_eq!(
            table.display(&symbols, Type::CHAR.set_const()).to_string(),
            "const char"
        );
        let p = table.pointer_to(Type::CHAR.set_const());
        assert_eq!(table.display(&symbols, p).to_string(), "* const char");
    }

    #[test]
    fn functions_and_arrays() {
        let mut table = TypeTable::new();
        let symbols = SymbolArena::new();
        let func = table.function_of(Type::INT);
        table.add_member(func, "a", Type::DOUBLE).unwrap();
        table.add_member(func, "...", Type::VOID).unwrap();
        assert_eq!(
            table.display(&symbols, func).to_string(),
            "(double, ...) -> int"
        );
        let arr = table.array_of(Type::INT, 3).unwrap();
        assert_eq!(table.display(&symbols, arr).to_string(), "[3] int");
    }

    #[test]
    fn tagged_struct_prints_through_its_tag() {
        let mut table = TypeTable::new();
        let mut symbols = SymbolArena::new();
        let s = table.struct_type();
        table.add_member(s, "x", Type::INT).unwrap();
        table.seal(s).unwrap();
        let tag = symbols.alloc(Symbol {
            kind: SymbolKind::Tag,
            linkage: Linkage::None,
            storage: StorageClass::Auto,
            ..Symbol::local("point", Type::VOID)
        });
        table.set_tag(s, tag, false);
        assert_eq!(table.display(&symbols, s).to_string(), "struct point");
        assert_eq!(
            table.display_expanded(&symbols, s, tag).to_string(),
            "{.x::int (+0)}"
        );
    }
}
