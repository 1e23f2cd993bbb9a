//! Type handles.
//!
//! A [`Type`] is a small `Copy` value. Basic scalar types are encoded
//! entirely in the handle; aggregates, functions, arrays and nested pointers
//! carry a reference into the [`crate::types::TypeTable`] repository. A
//! single pointer layer can also be encoded directly in the handle: the
//! `pointer_of` bit says "pointer to the base type described here", with a
//! second qualifier set applying to the pointer itself. Pointers to pointers
//! always go through the repository.
//!
//! Two bit-identical handles denote the same type; the converse is decided
//! structurally by [`crate::types::TypeTable::equal`].

use crate::types::TypeError;
use bitflags::bitflags;

bitflags! {
    /// Type qualifier bits.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct Qualifiers: u8 {
        const CONST = 1 << 0;
        const VOLATILE = 1 << 1;
        const RESTRICT = 1 << 2;
    }
}

/// The kind tag of a type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Void,
    Bool,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    LongDouble,
    Pointer,
    Array,
    Function,
    Struct,
    Union,
}

/// A value-encoded type handle.
///
/// `kind` describes the base type; when `pointer_of` is set the handle
/// denotes a pointer *to* that base type, and `pointer_qualifiers` qualify
/// the pointer itself. `reference` is an index into the type repository
/// (0 means no entry).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Type {
    kind: TypeKind,
    unsigned: bool,
    pointer_of: bool,
    qualifiers: Qualifiers,
    pointer_qualifiers: Qualifiers,
    reference: u32,
}

impl Type {
    pub const VOID: Type = Type::basic(TypeKind::Void, false);
    pub const BOOL: Type = Type::basic(TypeKind::Bool, false);
    pub const CHAR: Type = Type::basic(TypeKind::Char, false);
    pub const SHORT: Type = Type::basic(TypeKind::Short, false);
    pub const INT: Type = Type::basic(TypeKind::Int, false);
    pub const LONG: Type = Type::basic(TypeKind::Long, false);
    pub const UNSIGNED_CHAR: Type = Type::basic(TypeKind::Char, true);
    pub const UNSIGNED_SHORT: Type = Type::basic(TypeKind::Short, true);
    pub const UNSIGNED_INT: Type = Type::basic(TypeKind::Int, true);
    pub const UNSIGNED_LONG: Type = Type::basic(TypeKind::Long, true);
    pub const FLOAT: Type = Type::basic(TypeKind::Float, false);
    pub const DOUBLE: Type = Type::basic(TypeKind::Double, false);
    pub const LONG_DOUBLE: Type = Type::basic(TypeKind::LongDouble, false);

    const fn basic(kind: TypeKind, unsigned: bool) -> Type {
        Type {
            kind,
            unsigned,
            pointer_of: false,
            qualifiers: Qualifiers::empty(),
            pointer_qualifiers: Qualifiers::empty(),
            reference: 0,
        }
    }

    /// Handle for a freshly allocated repository entry.
    pub(crate) const fn with_entry(kind: TypeKind, reference: u32) -> Type {
        Type {
            kind,
            unsigned: false,
            pointer_of: false,
            qualifiers: Qualifiers::empty(),
            pointer_qualifiers: Qualifiers::empty(),
            reference,
        }
    }

    /// The observed kind: `Pointer` whenever the pointer-of bit is set,
    /// otherwise the base kind.
    pub fn kind(self) -> TypeKind {
        if self.pointer_of {
            TypeKind::Pointer
        } else {
            self.kind
        }
    }

    pub(crate) fn base_kind(self) -> TypeKind {
        self.kind
    }

    pub(crate) fn reference(self) -> u32 {
        self.reference
    }

    pub(crate) fn is_pointer_encoded(self) -> bool {
        self.pointer_of
    }

    /// Sets the pointer-of bit. The receiver must not already use it.
    pub(crate) fn into_pointer(mut self) -> Type {
        debug_assert!(!self.pointer_of);
        self.pointer_of = true;
        self.pointer_qualifiers = Qualifiers::empty();
        self
    }

    /// Drops the pointer-of layer, keeping the base type and its qualifiers.
    pub(crate) fn clear_pointer(mut self) -> Type {
        debug_assert!(self.pointer_of);
        self.pointer_of = false;
        self.pointer_qualifiers = Qualifiers::empty();
        self
    }

    /// The qualifiers of the outermost layer: the pointer's own when the
    /// handle is pointer-encoded, the base type's otherwise.
    pub fn qualifiers(self) -> Qualifiers {
        if self.pointer_of {
            self.pointer_qualifiers
        } else {
            self.qualifiers
        }
    }

    fn qualifiers_mut(&mut self) -> &mut Qualifiers {
        if self.pointer_of {
            &mut self.pointer_qualifiers
        } else {
            &mut self.qualifiers
        }
    }

    pub fn is_const(self) -> bool {
        self.qualifiers().contains(Qualifiers::CONST)
    }

    pub fn is_volatile(self) -> bool {
        self.qualifiers().contains(Qualifiers::VOLATILE)
    }

    pub fn is_restrict(self) -> bool {
        self.qualifiers().contains(Qualifiers::RESTRICT)
    }

    /// The same type with the outermost qualifiers removed.
    pub fn unqualified(mut self) -> Type {
        *self.qualifiers_mut() = Qualifiers::empty();
        self
    }

    pub fn set_const(mut self) -> Type {
        self.qualifiers_mut().insert(Qualifiers::CONST);
        self
    }

    pub fn set_volatile(mut self) -> Type {
        self.qualifiers_mut().insert(Qualifiers::VOLATILE);
        self
    }

    /// `restrict` only applies to pointer types.
    pub fn set_restrict(mut self) -> Result<Type, TypeError> {
        if !self.is_pointer() {
            return Err(TypeError::RestrictOnNonPointer);
        }
        self.qualifiers_mut().insert(Qualifiers::RESTRICT);
        Ok(self)
    }

    /// Copies the outermost qualifiers of `other` onto `self`.
    pub fn apply_qualifiers(self, other: Type) -> Result<Type, TypeError> {
        let mut ty = self;
        if other.is_const() {
            ty = ty.set_const();
        }
        if other.is_volatile() {
            ty = ty.set_volatile();
        }
        if other.is_restrict() {
            ty = ty.set_restrict()?;
        }
        Ok(ty)
    }

    pub fn is_void(self) -> bool {
        self.kind() == TypeKind::Void
    }

    pub fn is_bool(self) -> bool {
        self.kind() == TypeKind::Bool
    }

    pub fn is_char(self) -> bool {
        self.kind() == TypeKind::Char
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self.kind(),
            TypeKind::Bool | TypeKind::Char | TypeKind::Short | TypeKind::Int | TypeKind::Long
        )
    }

    pub fn is_unsigned(self) -> bool {
        self.unsigned
    }

    pub fn is_signed(self) -> bool {
        self.is_integer() && !self.unsigned
    }

    pub fn is_float(self) -> bool {
        self.kind() == TypeKind::Float
    }

    pub fn is_double(self) -> bool {
        self.kind() == TypeKind::Double
    }

    pub fn is_long_double(self) -> bool {
        self.kind() == TypeKind::LongDouble
    }

    pub fn is_real(self) -> bool {
        matches!(
            self.kind(),
            TypeKind::Float | TypeKind::Double | TypeKind::LongDouble
        )
    }

    pub fn is_arithmetic(self) -> bool {
        self.is_integer() || self.is_real()
    }

    pub fn is_pointer(self) -> bool {
        self.kind() == TypeKind::Pointer
    }

    pub fn is_scalar(self) -> bool {
        self.is_arithmetic() || self.is_pointer()
    }

    pub fn is_array(self) -> bool {
        self.kind() == TypeKind::Array
    }

    pub fn is_function(self) -> bool {
        self.kind() == TypeKind::Function
    }

    pub fn is_struct(self) -> bool {
        self.kind() == TypeKind::Struct
    }

    pub fn is_union(self) -> bool {
        self.kind() == TypeKind::Union
    }

    pub fn is_struct_or_union(self) -> bool {
        self.is_struct() || self.is_union()
    }

    /// Everything but function types denotes an object.
    pub fn is_object(self) -> bool {
        !self.is_function()
    }
}

impl std::fmt::Debug for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut d = f.debug_struct("Type");
        d.field("kind", &self.kind);
        if self.unsigned {
            d.field("unsigned", &true);
        }
        if self.pointer_of {
            d.field("pointer_of", &true);
        }
        if !self.qualifiers.is_empty() {
            d.field("qualifiers", &self.qualifiers);
        }
        if !self.pointer_qualifiers.is_empty() {
            d.field("pointer_qualifiers", &self.pointer_qualifiers);
        }
        if self.reference != 0 {
            d.field("reference", &self.reference);
        }
        d.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_handles_are_bit_identical() {
        assert_eq!(Type::INT, Type::INT);
        assert_ne!(Type::INT, Type::UNSIGNED_INT);
        assert_ne!(Type::INT, Type::LONG);
    }

    #[test]
    fn qualifier_round_trip() {
        let ty = Type::INT.set_const().set_volatile();
        assert!(ty.is_const());
        assert!(ty.is_volatile());
        assert!(!ty.is_restrict());
        assert_eq!(ty.unqualified(), Type::INT);
    }

    #[test]
    fn restrict_requires_pointer() {
        assert!(matches!(
            Type::INT.set_restrict(),
            Err(TypeError::RestrictOnNonPointer)
        ));
        let ptr = Type::INT.into_pointer();
        assert!(ptr.set_restrict().is_ok());
    }

    #[test]
    fn pointer_encoding_is_one_layer() {
        let ptr = Type::CHAR.into_pointer();
        assert!(ptr.is_pointer());
        assert_eq!(ptr.base_kind(), TypeKind::Char);
        let back = ptr.clear_pointer();
        assert_eq!(back, Type::CHAR);
    }
}
