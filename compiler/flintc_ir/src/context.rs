//! The compilation context.
//!
//! One [`Context`] holds the process-wide-but-translation-unit-scoped state
//! of the middle end: the type repository, the symbol arena and the two
//! namespaces. It is created per translation unit, threaded through the
//! parser-facing APIs, the optimizer and the dumpers, and torn down
//! wholesale between units. It is single-owner; nothing in here is shared
//! across threads.

use crate::scope::Namespace;
use crate::symbol::{SymbolArena, SymbolId, SymbolKind};
use crate::ty::Type;
use crate::types::TypeTable;

pub struct Context {
    pub types: TypeTable,
    pub symbols: SymbolArena,
    /// Ordinary identifiers.
    pub identifiers: Namespace,
    /// Struct, union and enum tags.
    pub tags: Namespace,
}

impl Context {
    pub fn new() -> Context {
        Context {
            types: TypeTable::new(),
            symbols: SymbolArena::new(),
            identifiers: Namespace::new("identifiers"),
            tags: Namespace::new("tags"),
        }
    }

    /// Opens the file scope in both namespaces.
    pub fn open_file_scope(&mut self) {
        self.identifiers.push_scope();
        self.tags.push_scope();
    }

    /// Closes the file scope in both namespaces.
    pub fn close_file_scope(&mut self) {
        self.tags.pop_scope();
        self.identifiers.pop_scope();
    }

    /// Associates a tag or typedef symbol with a type entry. Idempotent for
    /// tags; a typedef only sticks when no tag is present yet.
    pub fn associate_tag(&mut self, ty: Type, sym: SymbolId) {
        let kind = self.symbols[sym].kind;
        debug_assert!(kind == SymbolKind::Tag || kind == SymbolKind::Typedef);
        self.types.set_tag(ty, sym, kind == SymbolKind::Typedef);
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{Linkage, StorageClass, Symbol};

    fn tag_symbol(name: &str, kind: SymbolKind) -> Symbol {
        Symbol {
            kind,
            storage: StorageClass::Typedef,
            linkage: Linkage::None,
            ..Symbol::local(name, Type::VOID)
        }
    }

    #[test]
    fn typedef_does_not_override_tag() {
        let mut ctx = Context::new();
        let s = ctx.types.struct_type();
        let tag = ctx.symbols.alloc(tag_symbol("node", SymbolKind::Tag));
        let alias = ctx.symbols.alloc(tag_symbol("node_t", SymbolKind::Typedef));

        ctx.associate_tag(s, alias);
        ctx.associate_tag(s, tag);
        // The tag replaced the typedef; a later typedef does not win it back.
        ctx.associate_tag(s, alias);
        assert_eq!(ctx.types.tag(s), Some(tag));
    }
}
