//! Scoped namespaces.
//!
//! C resolves ordinary identifiers and tags in separate namespaces; each is
//! a [`Namespace`]: a stack of scope frames consulted innermost-first.
//! Declaration always targets the top frame. File-scope object declarations
//! are additionally queued for deferred emission and drained in declaration
//! order through [`Namespace::yield_declaration`] at the end of the
//! translation unit.

use crate::symbol::{Linkage, Symbol, SymbolArena, SymbolId, SymbolKind};
use crate::types::TypeTable;
use std::collections::{HashMap, VecDeque};
use thiserror::Error;
use tracing::trace;

/// Errors from redeclaring a name in the same scope. These are semantic
/// errors: the caller reports them and keeps parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScopeError {
    #[error("redefinition of '{0}'")]
    Redefinition(String),
    #[error("'{0}' redeclared with conflicting linkage")]
    ConflictingLinkage(String),
    #[error("'{0}' redeclared with incompatible type")]
    IncompatibleType(String),
}

/// One namespace: a stack of scope frames mapping names to symbols.
pub struct Namespace {
    name: &'static str,
    scopes: Vec<HashMap<String, SymbolId>>,
    deferred: VecDeque<SymbolId>,
}

impl Namespace {
    pub fn new(name: &'static str) -> Namespace {
        Namespace {
            name,
            scopes: Vec::new(),
            deferred: VecDeque::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        let popped = self.scopes.pop();
        debug_assert!(popped.is_some(), "pop on empty scope stack");
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    fn is_file_scope(&self) -> bool {
        self.scopes.len() == 1
    }

    /// Declares `sym` in the innermost scope. A name already declared there
    /// is merged when the types are compatible and the linkage does not
    /// conflict; the merged declaration keeps the original symbol.
    pub fn declare(
        &mut self,
        types: &TypeTable,
        arena: &mut SymbolArena,
        sym: Symbol,
    ) -> Result<SymbolId, ScopeError> {
        let top = self
            .scopes
            .last_mut()
            .expect("declaration outside any scope");

        if let Some(&existing) = top.get(&sym.name) {
            let old = &arena[existing];
            if old.linkage == Linkage::None || sym.linkage == Linkage::None {
                return Err(ScopeError::Redefinition(sym.name));
            }
            if old.linkage != sym.linkage {
                return Err(ScopeError::ConflictingLinkage(sym.name));
            }
            if !types.compatible_unqualified(old.ty, sym.ty) {
                return Err(ScopeError::IncompatibleType(sym.name));
            }
            trace!(namespace = self.name, name = %sym.name, "declaration merged");
            return Ok(existing);
        }

        let queue = self.is_file_scope()
            && sym.kind == SymbolKind::Variable
            && sym.linkage != Linkage::None;
        let name = sym.name.clone();
        let id = arena.alloc(sym);
        self.scopes
            .last_mut()
            .expect("declaration outside any scope")
            .insert(name, id);
        if queue {
            self.deferred.push_back(id);
        }
        Ok(id)
    }

    /// Finds the innermost declaration of `name`, walking outward.
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    /// Drains deferred-emission symbols in declaration order, one per call.
    pub fn yield_declaration(&mut self) -> Option<SymbolId> {
        self.deferred.pop_front()
    }
}
