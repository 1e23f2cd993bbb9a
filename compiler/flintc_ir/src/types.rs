//! The type repository.
//!
//! All aggregate, function, array and nested-pointer types live in one
//! append-only table addressed by [`TypeRef`]. Handles returned to the
//! parser are [`Type`] values; a handle's reference never invalidates
//! because entries are never removed or reused. Self-referential structs
//! work without cycles in the data: the inner pointer stores the parent's
//! index, not a back-reference.

use crate::symbol::SymbolId;
use crate::ty::{Type, TypeKind};
use flintc_utils::idx::Idx;
use flintc_utils::index_vec::IdxVec;
use thiserror::Error;
use tracing::trace;

/// Index of an entry in the repository.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TypeRef(usize);

impl Idx for TypeRef {
    fn new(idx: usize) -> Self {
        TypeRef(idx)
    }

    fn idx(&self) -> usize {
        self.0
    }
}

/// Fatal type construction errors. Any of these aborts the compilation of
/// the translation unit.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("array is too large ({0} elements)")]
    ArrayTooLarge(u64),
    #[error("member '{0}' already exists")]
    DuplicateMember(String),
    #[error("member '{0}' has incomplete type")]
    IncompleteMember(String),
    #[error("cannot add flexible struct member")]
    FlexibleMember,
    #[error("object is too large")]
    ObjectTooLarge,
    #[error("width of bit-field ({0} bits) exceeds width of type")]
    FieldTooWide(u32),
    #[error("zero width field '{0}'")]
    ZeroWidthField(String),
    #[error("cannot apply 'restrict' qualifier to non-pointer type")]
    RestrictOnNonPointer,
    #[error("{0} has no named members")]
    NoNamedMembers(&'static str),
}

/// A struct or union member, or a function parameter.
#[derive(Clone, Debug)]
pub struct Member {
    /// Possibly empty; unnamed members only pad aggregates during
    /// construction and are removed on sealing.
    pub name: String,
    pub ty: Type,
    /// Byte offset within the parent aggregate. Function parameters keep 0.
    pub offset: u64,
    /// Bit offset within the 32-bit storage unit, for bit-fields.
    pub field_offset: u32,
    /// Bit width; 0 means the member is not a bit-field.
    pub field_width: u32,
    /// Defining symbol, kept for diagnostics only.
    pub sym: Option<SymbolId>,
}

impl Member {
    fn new(name: String, ty: Type) -> Member {
        Member {
            name,
            ty,
            offset: 0,
            field_offset: 0,
            field_width: 0,
            sym: None,
        }
    }

    pub fn is_field(&self) -> bool {
        self.field_width > 0
    }
}

/// Full representation of a non-scalar type.
struct TypeEntry {
    kind: TypeKind,
    /// Bytes for struct/union; element count for arrays; 0 otherwise.
    size: u64,
    unsigned: bool,
    vararg: bool,
    flexible: bool,
    vla: bool,
    /// Symbol holding the length of a variable length array. `None` with
    /// the `vla` flag set means any length, `[*]`.
    vla_length: Option<SymbolId>,
    /// Function parameters, or struct/union members.
    members: Vec<Member>,
    /// Function return type, pointer target, or array element type.
    next: Type,
    /// Tag or typedef symbol, used to print self-referential types.
    tag: Option<SymbolId>,
}

impl TypeEntry {
    fn new(kind: TypeKind) -> TypeEntry {
        TypeEntry {
            kind,
            size: 0,
            unsigned: false,
            vararg: false,
            flexible: false,
            vla: false,
            vla_length: None,
            members: Vec::new(),
            next: Type::VOID,
            tag: None,
        }
    }
}

/// Bit-fields pack into 32-bit units regardless of the declared type.
const FIELD_UNIT_BITS: u32 = 32;

/// The append-only repository of type entries for one translation unit.
#[derive(Default)]
pub struct TypeTable {
    entries: IdxVec<TypeRef, TypeEntry>,
}

impl TypeTable {
    pub fn new() -> TypeTable {
        TypeTable {
            entries: IdxVec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn alloc(&mut self, kind: TypeKind) -> Type {
        let r = self.entries.push(TypeEntry::new(kind));
        trace!(?kind, index = r.idx(), "type entry allocated");
        Type::with_entry(kind, r.idx() as u32 + 1)
    }

    fn entry_index(ty: Type) -> Option<TypeRef> {
        match ty.reference() {
            0 => None,
            r => Some(TypeRef::new(r as usize - 1)),
        }
    }

    fn entry(&self, ty: Type) -> &TypeEntry {
        let r = Self::entry_index(ty).expect("type has no repository entry");
        &self.entries[r]
    }

    fn entry_mut(&mut self, ty: Type) -> &mut TypeEntry {
        let r = Self::entry_index(ty).expect("type has no repository entry");
        &mut self.entries[r]
    }

    ////////// Construction  //////////

    /// Pointer to `ty`. Uses the free pointer-of bit in the handle when
    /// possible; a pointer to an already pointer-encoded type allocates a
    /// repository entry instead.
    pub fn pointer_to(&mut self, ty: Type) -> Type {
        if ty.is_pointer_encoded() {
            let ptr = self.alloc(TypeKind::Pointer);
            self.entry_mut(ptr).next = ty;
            ptr
        } else {
            ty.into_pointer()
        }
    }

    /// Array of `count` elements. `count` of 0 leaves the array incomplete
    /// until [`TypeTable::set_array_length`].
    pub fn array_of(&mut self, elem: Type, count: u64) -> Result<Type, TypeError> {
        let elem_size = self.size_of(elem);
        match count.checked_mul(elem_size) {
            Some(total) if total <= i64::MAX as u64 => {}
            _ => return Err(TypeError::ArrayTooLarge(count)),
        }
        let ty = self.alloc(TypeKind::Array);
        let e = self.entry_mut(ty);
        e.size = count;
        e.next = elem;
        Ok(ty)
    }

    /// Variable length array. `length` is the symbol holding the runtime
    /// element count; `None` means any length, `[*]`.
    pub fn vla_of(&mut self, elem: Type, length: Option<SymbolId>) -> Type {
        let ty = self.alloc(TypeKind::Array);
        let e = self.entry_mut(ty);
        e.next = elem;
        e.vla = true;
        e.vla_length = length;
        ty
    }

    /// Function returning `return_type`. Parameters are added afterwards
    /// with [`TypeTable::add_member`].
    pub fn function_of(&mut self, return_type: Type) -> Type {
        let ty = self.alloc(TypeKind::Function);
        self.entry_mut(ty).next = return_type;
        ty
    }

    pub fn struct_type(&mut self) -> Type {
        self.alloc(TypeKind::Struct)
    }

    pub fn union_type(&mut self) -> Type {
        self.alloc(TypeKind::Union)
    }

    /// Adds a member to a struct, union or function type. Returns the index
    /// of the new member, or `None` when `name` is the `"..."` marker that
    /// flags a function as variadic.
    pub fn add_member(
        &mut self,
        parent: Type,
        name: impl Into<String>,
        ty: Type,
    ) -> Result<Option<usize>, TypeError> {
        debug_assert!(parent.is_struct_or_union() || parent.is_function());
        let mut m = Member::new(name.into(), ty);
        if !parent.is_function() {
            m.offset = self.adjust_member_alignment(parent, ty);
        }
        self.push_member(parent, m)
    }

    /// Verifies and appends a prepared member, growing the parent size.
    fn push_member(&mut self, parent: Type, m: Member) -> Result<Option<usize>, TypeError> {
        if m.name == "..." {
            debug_assert!(parent.is_function());
            self.entry_mut(parent).vararg = true;
            return Ok(None);
        }

        if !m.name.is_empty() && self.find_member(parent, &m.name).is_some() {
            return Err(TypeError::DuplicateMember(m.name));
        }

        if parent.is_struct_or_union() {
            let size = self.size_of(m.ty);
            // A flexible array member must stay last; nothing may follow it.
            if parent.is_struct() && self.entry(parent).flexible {
                return Err(TypeError::IncompleteMember(m.name));
            }
            if size == 0 {
                if m.ty.is_array() && parent.is_struct() {
                    self.entry_mut(parent).flexible = true;
                } else {
                    return Err(TypeError::IncompleteMember(m.name));
                }
            }
            if self.is_flexible(m.ty) {
                if parent.is_struct() {
                    return Err(TypeError::FlexibleMember);
                }
                self.entry_mut(parent).flexible = true;
            }
            if i64::MAX as u64 - m.offset < size {
                return Err(TypeError::ObjectTooLarge);
            }
            let e = self.entry_mut(parent);
            if e.size < m.offset + size {
                e.size = m.offset + size;
            }
        }

        let e = self.entry_mut(parent);
        e.members.push(m);
        Ok(Some(e.members.len() - 1))
    }

    /// Pads a struct so the next member lands on the alignment of `ty`,
    /// returning the member's offset. Union members always go at offset 0.
    fn adjust_member_alignment(&mut self, parent: Type, ty: Type) -> u64 {
        debug_assert!(parent.is_struct_or_union());
        if !parent.is_struct() {
            return 0;
        }
        let align = self.alignment_of(ty);
        let e = self.entry_mut(parent);
        if align != 0 && e.size % align != 0 {
            e.size += align - e.size % align;
        }
        e.size
    }

    /// Adds a bit-field member of `width` bits. A zero `width` with an empty
    /// name flushes packing to the next 32-bit boundary.
    pub fn add_field(
        &mut self,
        parent: Type,
        name: impl Into<String>,
        ty: Type,
        width: u32,
    ) -> Result<(), TypeError> {
        debug_assert!(parent.is_struct_or_union());
        debug_assert!(
            self.equal(ty, Type::INT) || self.equal(ty, Type::UNSIGNED_INT) || ty.is_bool()
        );
        let name = name.into();

        if width as u64 > self.size_of(ty) * 8 || (ty.is_bool() && width > 1) {
            return Err(TypeError::FieldTooWide(width));
        }
        if !name.is_empty() && width == 0 {
            return Err(TypeError::ZeroWidthField(name));
        }
        // Anonymous union fields carry no value and no alignment.
        if parent.is_union() && name.is_empty() {
            return Ok(());
        }

        let mut m = Member::new(name, ty);
        m.field_width = width;
        if parent.is_struct() {
            let packed = match self.last_field_member(parent) {
                Some((offset, field_offset, field_width)) => {
                    let bits = field_offset + field_width;
                    if bits + width <= FIELD_UNIT_BITS {
                        m.offset = offset;
                        m.field_offset = bits;
                        true
                    } else {
                        false
                    }
                }
                None => false,
            };
            if !packed {
                m.field_offset = 0;
                m.offset = self.adjust_member_alignment(parent, ty);
            }
        }

        if width == 0 {
            self.reset_field_alignment(parent)
        } else {
            self.push_member(parent, m).map(|_| ())
        }
    }

    /// The last member if it is a bit-field, as (offset, field_offset,
    /// field_width).
    fn last_field_member(&self, parent: Type) -> Option<(u64, u32, u32)> {
        let m = self.entry(parent).members.last()?;
        m.is_field().then(|| (m.offset, m.field_offset, m.field_width))
    }

    /// Handles an unnamed zero-width field: pads out the current bit-field
    /// unit, or rounds the struct size up to the next 32-bit boundary when
    /// the previous member was not a bit-field. A zero-width field before
    /// any member has no effect.
    fn reset_field_alignment(&mut self, parent: Type) -> Result<(), TypeError> {
        debug_assert!(parent.is_struct());
        let Some(last) = self.entry(parent).members.last() else {
            return Ok(());
        };
        let (field_offset, field_width) = (last.field_offset, last.field_width);
        if field_width > 0 {
            let d = field_offset + field_width;
            if d < FIELD_UNIT_BITS {
                self.add_field(parent, "", Type::INT, FIELD_UNIT_BITS - d)?;
            }
        } else {
            let e = self.entry_mut(parent);
            if e.size % 4 != 0 {
                e.size += 4 - e.size % 4;
            }
        }
        Ok(())
    }

    /// Merges the members of a nested unnamed struct/union into `parent`.
    /// A union inside a struct is placed at the struct's padded offset; a
    /// struct inside a union keeps its own member offsets.
    pub fn add_anonymous_member(&mut self, parent: Type, ty: Type) -> Result<(), TypeError> {
        debug_assert!(parent.is_struct_or_union());
        debug_assert!(ty.is_struct_or_union());
        let members = self.entry(ty).members.clone();
        if parent.is_struct() && ty.is_union() {
            let offset = self.adjust_member_alignment(parent, ty);
            for mut m in members {
                m.offset += offset;
                self.push_member(parent, m)?;
            }
        } else if parent.is_union() && ty.is_struct() {
            for m in members {
                self.push_member(parent, m)?;
            }
        } else {
            for m in members {
                self.add_member(parent, m.name, m.ty)?;
            }
        }
        Ok(())
    }

    /// Finishes construction of a struct or union: removes the unnamed
    /// members kept only for padding, and rounds the size up to a multiple
    /// of the strongest remaining member alignment.
    pub fn seal(&mut self, ty: Type) -> Result<(), TypeError> {
        debug_assert!(ty.is_struct_or_union());
        let members = std::mem::take(&mut self.entry_mut(ty).members);
        let kept: Vec<Member> = members.into_iter().filter(|m| !m.name.is_empty()).collect();
        let mut align = 0;
        for m in &kept {
            align = align.max(self.alignment_of(m.ty));
        }
        if align == 0 {
            return Err(TypeError::NoNamedMembers(if ty.is_struct() {
                "struct"
            } else {
                "union"
            }));
        }
        let e = self.entry_mut(ty);
        e.members = kept;
        if e.size % align != 0 {
            e.size += align - e.size % align;
        }
        Ok(())
    }

    /// Associates a tag or typedef symbol with the entry, for printing
    /// self-referential types. A typedef never replaces an existing tag;
    /// basic types have no room for one and are ignored.
    pub fn set_tag(&mut self, ty: Type, sym: SymbolId, is_typedef: bool) {
        if let Some(r) = Self::entry_index(ty) {
            let e = &mut self.entries[r];
            if e.tag.is_none() || !is_typedef {
                e.tag = Some(sym);
            }
        }
    }

    pub(crate) fn tag(&self, ty: Type) -> Option<SymbolId> {
        Self::entry_index(ty).and_then(|r| self.entries[r].tag)
    }

    /// Completes an incomplete array type.
    pub fn set_array_length(&mut self, ty: Type, length: u64) {
        debug_assert!(ty.is_array());
        debug_assert!(length > 0);
        let e = self.entry_mut(ty);
        debug_assert_eq!(e.size, 0);
        e.size = length;
    }

    /// Removes parameter symbols and VLA length symbols from a prototype
    /// when leaving the scope that declared them.
    pub fn clean_prototype(&mut self, ty: Type) {
        match ty.kind() {
            TypeKind::Pointer => {
                let next = self.deref(ty);
                self.clean_prototype(next);
            }
            TypeKind::Array => {
                let e = self.entry_mut(ty);
                if e.vla {
                    e.vla_length = None;
                }
                let next = self.entry(ty).next;
                self.clean_prototype(next);
            }
            TypeKind::Struct | TypeKind::Union => {
                if self.entry(ty).tag.is_none() {
                    self.clean_prototype_members(ty);
                }
            }
            TypeKind::Function => self.clean_prototype_members(ty),
            _ => {}
        }
    }

    fn clean_prototype_members(&mut self, ty: Type) {
        for i in 0..self.entry(ty).members.len() {
            self.entry_mut(ty).members[i].sym = None;
            let mty = self.entry(ty).members[i].ty;
            self.clean_prototype(mty);
        }
    }

    /// Replaces the innermost function or array base of a declarator chain
    /// with `target`, rebuilding pointer layers outside-in.
    pub fn patch_declarator(&mut self, head: Type, target: Type) -> Result<Type, TypeError> {
        debug_assert!(target.is_function() || target.is_array());
        if head.is_void() {
            return Ok(target);
        }
        if head.is_pointer() {
            let next = self.deref(head);
            let next = self.patch_declarator(next, target)?;
            let ptr = self.pointer_to(next);
            return ptr.apply_qualifiers(head);
        }
        debug_assert!(head.is_function() || head.is_array());
        let next = self.entry(head).next;
        let patched = self.patch_declarator(next, target)?;
        self.entry_mut(head).next = patched;
        Ok(head)
    }

    ////////// Queries  //////////

    /// The pointed-to type. Qualifiers on the pointer are dropped;
    /// qualifiers on the pointee are preserved.
    pub fn deref(&self, ty: Type) -> Type {
        debug_assert!(ty.is_pointer());
        if ty.is_pointer_encoded() {
            ty.clear_pointer()
        } else {
            self.entry(ty).next
        }
    }

    /// Pointee, element type or function return type.
    pub fn next(&self, ty: Type) -> Type {
        debug_assert!(ty.is_pointer() || ty.is_function() || ty.is_array());
        if ty.is_pointer() {
            self.deref(ty)
        } else {
            self.entry(ty).next
        }
    }

    /// Storage size in bytes; 0 for incomplete types, functions and VLAs.
    pub fn size_of(&self, ty: Type) -> u64 {
        match ty.kind() {
            TypeKind::Bool | TypeKind::Char => 1,
            TypeKind::Short => 2,
            TypeKind::Int | TypeKind::Float => 4,
            TypeKind::Long | TypeKind::Double | TypeKind::Pointer => 8,
            TypeKind::LongDouble => 16,
            TypeKind::Struct | TypeKind::Union => self.entry(ty).size,
            TypeKind::Array => {
                let e = self.entry(ty);
                e.size * self.size_of(e.next)
            }
            TypeKind::Void | TypeKind::Function => 0,
        }
    }

    /// Alignment in bytes: scalar size for scalars, element alignment for
    /// arrays, strongest member alignment for aggregates.
    pub fn alignment_of(&self, ty: Type) -> u64 {
        debug_assert!(ty.is_object());
        match ty.kind() {
            TypeKind::Array => self.alignment_of(self.entry(ty).next),
            TypeKind::Struct | TypeKind::Union => self
                .entry(ty)
                .members
                .iter()
                .map(|m| self.alignment_of(m.ty))
                .max()
                .unwrap_or(1),
            _ => self.size_of(ty),
        }
    }

    pub fn nmembers(&self, ty: Type) -> usize {
        self.entry(ty).members.len()
    }

    pub fn members(&self, ty: Type) -> &[Member] {
        &self.entry(ty).members
    }

    pub fn member(&self, ty: Type, n: usize) -> &Member {
        &self.entry(ty).members[n]
    }

    pub fn find_member(&self, ty: Type, name: &str) -> Option<(usize, &Member)> {
        debug_assert!(ty.is_struct_or_union() || ty.is_function());
        self.entry(ty)
            .members
            .iter()
            .enumerate()
            .find(|(_, m)| m.name == name)
    }

    /// Attaches the defining symbol to a member, for diagnostics.
    pub fn set_member_symbol(&mut self, ty: Type, n: usize, sym: SymbolId) {
        self.entry_mut(ty).members[n].sym = Some(sym);
    }

    pub fn is_vararg(&self, ty: Type) -> bool {
        debug_assert!(ty.is_function());
        self.entry(ty).vararg
    }

    pub fn is_vla(&self, ty: Type) -> bool {
        if ty.is_array() {
            let e = self.entry(ty);
            return e.vla || self.is_vla(e.next);
        }
        false
    }

    pub fn is_flexible(&self, ty: Type) -> bool {
        if ty.is_struct_or_union() {
            return self.entry(ty).flexible;
        }
        false
    }

    pub fn is_variably_modified(&self, ty: Type) -> bool {
        match ty.kind() {
            TypeKind::Pointer => self.is_variably_modified(self.deref(ty)),
            TypeKind::Array => self.is_vla(ty),
            _ => false,
        }
    }

    /// Element count of an array type. 0 means unspecified or VLA.
    pub fn array_len(&self, ty: Type) -> u64 {
        debug_assert!(ty.is_array());
        self.entry(ty).size
    }

    pub fn vla_length(&self, ty: Type) -> Option<SymbolId> {
        debug_assert!(self.is_vla(ty));
        self.entry(ty).vla_length
    }

    ////////// Equality and compatibility  //////////

    /// Whether two types are the same, disregarding qualifiers and names of
    /// function parameters.
    pub fn equal(&self, a: Type, b: Type) -> bool {
        if a == b {
            return true;
        }
        if a.kind() != b.kind() || a.is_unsigned() != b.is_unsigned() {
            return false;
        }
        match (Self::entry_index(a), Self::entry_index(b)) {
            (None, None) => true,
            (Some(ra), Some(rb)) => self.entries_equal(ra, rb),
            _ => false,
        }
    }

    fn entries_equal(&self, ra: TypeRef, rb: TypeRef) -> bool {
        if ra == rb {
            return true;
        }
        let (ea, eb) = (&self.entries[ra], &self.entries[rb]);
        if ea.kind != eb.kind
            || ea.size != eb.size
            || ea.unsigned != eb.unsigned
            || ea.vararg != eb.vararg
            || ea.members.len() != eb.members.len()
        {
            return false;
        }
        ea.members.iter().zip(&eb.members).all(|(ma, mb)| {
            self.equal(ma.ty, mb.ty)
                && (ea.kind == TypeKind::Function
                    || (ma.name == mb.name && ma.offset == mb.offset))
        })
    }

    /// C compatibility: equality for scalars, recursive for pointees,
    /// length-tolerant for arrays. Qualifiers must match.
    pub fn compatible(&self, l: Type, r: Type) -> bool {
        if l.kind() != r.kind()
            || l.is_const() != r.is_const()
            || l.is_volatile() != r.is_volatile()
            || l.is_restrict() != r.is_restrict()
        {
            return false;
        }
        match l.kind() {
            TypeKind::Pointer => self.compatible(self.deref(l), self.deref(r)),
            TypeKind::Array => {
                let (s1, s2) = (self.array_len(l), self.array_len(r));
                // A VLA reports length 0 and is accepted here.
                if s1 == 0 || s2 == 0 || s1 == s2 {
                    self.compatible(self.next(l), self.next(r))
                } else {
                    false
                }
            }
            _ => self.equal(l, r),
        }
    }

    pub fn compatible_unqualified(&self, l: Type, r: Type) -> bool {
        self.compatible(l.unqualified(), r.unqualified())
    }

    ////////// Conversions  //////////

    /// Integer promotion: anything narrower than `int` becomes `int`.
    pub fn promote_integer(&self, ty: Type) -> Type {
        debug_assert!(ty.is_integer());
        if self.size_of(ty) < 4 {
            Type::INT
        } else {
            ty
        }
    }

    /// Usual arithmetic conversions. The result is unqualified.
    pub fn usual_arithmetic_conversion(&self, t1: Type, t2: Type) -> Type {
        debug_assert!(t1.is_arithmetic());
        debug_assert!(t2.is_arithmetic());
        let res = if t1.is_long_double() || t2.is_long_double() {
            Type::LONG_DOUBLE
        } else if t1.is_double() || t2.is_double() {
            Type::DOUBLE
        } else if t1.is_float() || t2.is_float() {
            Type::FLOAT
        } else {
            let t1 = self.promote_integer(t1);
            let t2 = self.promote_integer(t2);
            if self.size_of(t1) > self.size_of(t2) {
                t1
            } else if self.size_of(t2) > self.size_of(t1) {
                t2
            } else if t1.is_unsigned() {
                t1
            } else {
                t2
            }
        };
        res.unqualified()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{Symbol, SymbolArena, SymbolKind};
    use rstest::rstest;

    #[rstest]
    #[case(Type::BOOL, 1)]
    #[case(Type::CHAR, 1)]
    #[case(Type::UNSIGNED_CHAR, 1)]
    #[case(Type::SHORT, 2)]
    #[case(Type::INT, 4)]
    #[case(Type::FLOAT, 4)]
    #[case(Type::LONG, 8)]
    #[case(Type::UNSIGNED_LONG, 8)]
    #[case(Type::DOUBLE, 8)]
    #[case(Type::LONG_DOUBLE, 16)]
    #[case(Type::VOID, 0)]
    fn scalar_sizes(#[case] ty: Type, #[case] size: u64) {
        let table = TypeTable::new();
        assert_eq!(table.size_of(ty), size);
    }

    #[test]
    fn pointers_are_eight_bytes() {
        let mut table = TypeTable::new();
        let p = table.pointer_to(Type::CHAR);
        let pp = table.pointer_to(p);
        assert_eq!(table.size_of(p), 8);
        assert_eq!(table.size_of(pp), 8);
    }

    #[test]
    fn equality_disregards_qualifiers_but_compatibility_does_not() {
        let table = TypeTable::new();
        let qualified = Type::INT.set_const();
        assert!(table.equal(qualified, Type::INT));
        assert!(!table.compatible(qualified, Type::INT));
        assert!(table.compatible_unqualified(qualified, Type::INT));
    }

    #[test]
    fn equality_is_an_equivalence_relation() {
        let mut table = TypeTable::new();
        let mut make = |table: &mut TypeTable| {
            let s = table.struct_type();
            table.add_member(s, "x", Type::INT).unwrap();
            table.add_member(s, "y", Type::DOUBLE).unwrap();
            table.seal(s).unwrap();
            s
        };
        let a = make(&mut table);
        let b = make(&mut table);
        let c = make(&mut table);
        for t in [a, b, c] {
            assert!(table.equal(t, t));
        }
        assert!(table.equal(a, b) && table.equal(b, a));
        assert!(table.equal(b, c) && table.equal(a, c));

        let other = table.struct_type();
        table.add_member(other, "x", Type::INT).unwrap();
        table.seal(other).unwrap();
        assert!(!table.equal(a, other));
    }

    #[test]
    fn unsigned_and_kind_differences_are_unequal() {
        let table = TypeTable::new();
        assert!(!table.equal(Type::INT, Type::UNSIGNED_INT));
        assert!(!table.equal(Type::INT, Type::LONG));
    }

    #[test]
    fn struct_layout_pads_members_and_rounds_the_size() {
        let mut table = TypeTable::new();
        let s = table.struct_type();
        table.add_member(s, "a", Type::CHAR).unwrap();
        table.add_member(s, "b", Type::INT).unwrap();
        table.add_member(s, "c", Type::CHAR).unwrap();
        table.seal(s).unwrap();
        assert_eq!(table.size_of(s), 12);
        assert_eq!(table.alignment_of(s), 4);
        let offsets: Vec<u64> = table.members(s).iter().map(|m| m.offset).collect();
        assert_eq!(offsets, vec![0, 4, 8]);
        assert_eq!(table.size_of(s) % table.alignment_of(s), 0);
    }

    #[test]
    fn union_members_share_offset_zero() {
        let mut table = TypeTable::new();
        let u = table.union_type();
        table.add_member(u, "c", Type::CHAR).unwrap();
        table.add_member(u, "d", Type::DOUBLE).unwrap();
        table.seal(u).unwrap();
        assert_eq!(table.size_of(u), 8);
        assert!(table.members(u).iter().all(|m| m.offset == 0));
    }

    #[test]
    fn bit_fields_pack_into_one_unit() {
        let mut table = TypeTable::new();
        let s = table.struct_type();
        table.add_field(s, "a", Type::INT, 3).unwrap();
        table.add_field(s, "b", Type::INT, 5).unwrap();
        table.add_field(s, "c", Type::INT, 1).unwrap();
        table.seal(s).unwrap();
        assert_eq!(table.size_of(s), 4);
        let fields: Vec<(u64, u32)> = table
            .members(s)
            .iter()
            .map(|m| (m.offset, m.field_offset))
            .collect();
        assert_eq!(fields, vec![(0, 0), (0, 3), (0, 8)]);
    }

    #[test]
    fn zero_width_field_flushes_to_the_next_unit() {
        let mut table = TypeTable::new();
        let s = table.struct_type();
        table.add_field(s, "a", Type::INT, 3).unwrap();
        table.add_field(s, "", Type::INT, 0).unwrap();
        table.add_field(s, "b", Type::INT, 4).unwrap();
        table.seal(s).unwrap();
        assert_eq!(table.size_of(s), 8);
        let named: Vec<(String, u64, u32)> = table
            .members(s)
            .iter()
            .map(|m| (m.name.clone(), m.offset, m.field_offset))
            .collect();
        assert_eq!(
            named,
            vec![("a".to_string(), 0, 0), ("b".to_string(), 4, 0)]
        );
    }

    #[test]
    fn overfull_unit_spills_to_a_new_one() {
        let mut table = TypeTable::new();
        let s = table.struct_type();
        table.add_field(s, "a", Type::INT, 30).unwrap();
        table.add_field(s, "b", Type::INT, 5).unwrap();
        table.seal(s).unwrap();
        let b = table.find_member(s, "b").unwrap().1;
        assert_eq!((b.offset, b.field_offset), (4, 0));
        assert_eq!(table.size_of(s), 8);
    }

    #[test]
    fn bit_field_width_limits() {
        let mut table = TypeTable::new();
        let s = table.struct_type();
        assert_eq!(
            table.add_field(s, "a", Type::INT, 33),
            Err(TypeError::FieldTooWide(33))
        );
        assert_eq!(
            table.add_field(s, "f", Type::BOOL, 2),
            Err(TypeError::FieldTooWide(2))
        );
        assert_eq!(
            table.add_field(s, "z", Type::INT, 0),
            Err(TypeError::ZeroWidthField("z".to_string()))
        );
        assert!(table.add_field(s, "ok", Type::BOOL, 1).is_ok());
    }

    #[test]
    fn duplicate_and_incomplete_members_are_rejected() {
        let mut table = TypeTable::new();
        let s = table.struct_type();
        table.add_member(s, "x", Type::INT).unwrap();
        assert_eq!(
            table.add_member(s, "x", Type::LONG),
            Err(TypeError::DuplicateMember("x".to_string()))
        );
        let incomplete = table.struct_type();
        assert_eq!(
            table.add_member(s, "y", incomplete),
            Err(TypeError::IncompleteMember("y".to_string()))
        );
    }

    #[test]
    fn trailing_zero_length_array_makes_a_struct_flexible() {
        let mut table = TypeTable::new();
        let s = table.struct_type();
        table.add_member(s, "len", Type::INT).unwrap();
        let tail = table.array_of(Type::CHAR, 0).unwrap();
        table.add_member(s, "data", tail).unwrap();
        assert!(table.is_flexible(s));
        // Nothing may follow the flexible array member.
        assert_eq!(
            table.add_member(s, "after", Type::INT),
            Err(TypeError::IncompleteMember("after".to_string()))
        );
        table.seal(s).unwrap();

        // A zero-length trailing array is only allowed in structs.
        let u0 = table.union_type();
        let tail = table.array_of(Type::CHAR, 0).unwrap();
        assert_eq!(
            table.add_member(u0, "data", tail),
            Err(TypeError::IncompleteMember("data".to_string()))
        );

        // A flexible struct cannot be embedded in another struct, only in a
        // union, which then becomes flexible itself.
        let outer = table.struct_type();
        assert_eq!(
            table.add_member(outer, "inner", s),
            Err(TypeError::FlexibleMember)
        );
        let u = table.union_type();
        table.add_member(u, "inner", s).unwrap();
        assert!(table.is_flexible(u));
    }

    #[test]
    fn seal_requires_a_named_member() {
        let mut table = TypeTable::new();
        let s = table.struct_type();
        assert_eq!(table.seal(s), Err(TypeError::NoNamedMembers("struct")));
    }

    #[test]
    fn arrays_multiply_and_overflow_is_fatal() {
        let mut table = TypeTable::new();
        let a = table.array_of(Type::INT, 3).unwrap();
        assert_eq!(table.size_of(a), 12);
        assert_eq!(table.array_len(a), 3);
        assert_eq!(table.alignment_of(a), 4);
        assert_eq!(
            table.array_of(Type::LONG, u64::MAX / 4),
            Err(TypeError::ArrayTooLarge(u64::MAX / 4))
        );
    }

    #[test]
    fn incomplete_array_can_be_completed_once() {
        let mut table = TypeTable::new();
        let a = table.array_of(Type::INT, 0).unwrap();
        assert_eq!(table.size_of(a), 0);
        table.set_array_length(a, 5);
        assert_eq!(table.size_of(a), 20);
    }

    #[test]
    fn array_compatibility_tolerates_unknown_lengths() {
        let mut table = TypeTable::new();
        let a3 = table.array_of(Type::INT, 3).unwrap();
        let a0 = table.array_of(Type::INT, 0).unwrap();
        let b3 = table.array_of(Type::INT, 3).unwrap();
        let c4 = table.array_of(Type::INT, 4).unwrap();
        assert!(table.compatible(a3, b3));
        assert!(table.compatible(a3, a0));
        assert!(table.compatible(a0, c4));
        assert!(!table.compatible(a3, c4));
    }

    #[test]
    fn deref_preserves_pointee_qualifiers_and_drops_pointer_ones() {
        let mut table = TypeTable::new();
        let pointee = Type::INT.set_volatile();
        let p = table.pointer_to(pointee).set_const();
        assert!(p.is_const());
        let back = table.deref(p);
        assert!(table.equal(back, pointee));
        assert!(back.is_volatile());
        assert!(!back.is_const());
    }

    #[test]
    fn pointer_to_pointer_goes_through_the_repository() {
        let mut table = TypeTable::new();
        let p = table.pointer_to(Type::INT);
        let pp = table.pointer_to(p);
        let ppp = table.pointer_to(pp);
        assert!(pp.is_pointer());
        assert!(ppp.is_pointer());
        assert!(table.equal(table.deref(pp), p));
        assert!(table.equal(table.deref(table.deref(ppp)), p));
    }

    #[test]
    fn vla_reports_zero_size_and_keeps_its_length_symbol() {
        let mut table = TypeTable::new();
        let mut symbols = SymbolArena::new();
        let n = symbols.alloc(Symbol::local("n", Type::UNSIGNED_LONG));
        let vla = table.vla_of(Type::INT, Some(n));
        assert!(table.is_vla(vla));
        assert_eq!(table.size_of(vla), 0);
        assert_eq!(table.vla_length(vla), Some(n));
        let p = table.pointer_to(vla);
        assert!(table.is_variably_modified(p));

        table.clean_prototype(vla);
        assert_eq!(table.vla_length(vla), None);
    }

    #[test]
    fn anonymous_union_in_struct_shifts_offsets() {
        let mut table = TypeTable::new();
        let u = table.union_type();
        table.add_member(u, "i", Type::INT).unwrap();
        table.add_member(u, "f", Type::FLOAT).unwrap();
        table.seal(u).unwrap();

        let s = table.struct_type();
        table.add_member(s, "head", Type::LONG).unwrap();
        table.add_anonymous_member(s, u).unwrap();
        table.seal(s).unwrap();
        let i = table.find_member(s, "i").unwrap().1;
        let f = table.find_member(s, "f").unwrap().1;
        assert_eq!(i.offset, 8);
        assert_eq!(f.offset, 8);
        assert_eq!(table.size_of(s), 16);
    }

    #[test]
    fn anonymous_struct_in_union_keeps_offsets() {
        let mut table = TypeTable::new();
        let s = table.struct_type();
        table.add_member(s, "x", Type::INT).unwrap();
        table.add_member(s, "y", Type::INT).unwrap();
        table.seal(s).unwrap();

        let u = table.union_type();
        table.add_member(u, "raw", Type::LONG).unwrap();
        table.add_anonymous_member(u, s).unwrap();
        table.seal(u).unwrap();
        assert_eq!(table.find_member(u, "x").unwrap().1.offset, 0);
        assert_eq!(table.find_member(u, "y").unwrap().1.offset, 4);
        assert_eq!(table.size_of(u), 8);
    }

    #[test]
    fn function_members_and_varargs() {
        let mut table = TypeTable::new();
        let f = table.function_of(Type::INT);
        table.add_member(f, "a", Type::INT).unwrap();
        table.add_member(f, "b", Type::DOUBLE).unwrap();
        assert!(!table.is_vararg(f));
        assert_eq!(table.add_member(f, "...", Type::VOID).unwrap(), None);
        assert!(table.is_vararg(f));
        assert_eq!(table.nmembers(f), 2);
        assert!(table.equal(table.next(f), Type::INT));

        // Parameter names are disregarded by equality; variadic-ness is not.
        let g = table.function_of(Type::INT);
        table.add_member(g, "x", Type::INT).unwrap();
        table.add_member(g, "y", Type::DOUBLE).unwrap();
        assert!(!table.equal(f, g));
        table.add_member(g, "...", Type::VOID).unwrap();
        assert!(table.equal(f, g));
    }

    #[test]
    fn promotion_and_usual_arithmetic_conversions() {
        let table = TypeTable::new();
        assert!(table.equal(table.promote_integer(Type::CHAR), Type::INT));
        assert!(table.equal(table.promote_integer(Type::BOOL), Type::INT));
        assert!(table.equal(table.promote_integer(Type::UNSIGNED_INT), Type::UNSIGNED_INT));

        let conv = |a, b| table.usual_arithmetic_conversion(a, b);
        assert!(table.equal(conv(Type::CHAR, Type::SHORT), Type::INT));
        assert!(table.equal(conv(Type::INT, Type::LONG), Type::LONG));
        assert!(table.equal(conv(Type::UNSIGNED_INT, Type::INT), Type::UNSIGNED_INT));
        assert!(table.equal(conv(Type::INT, Type::FLOAT), Type::FLOAT));
        assert!(table.equal(conv(Type::FLOAT, Type::DOUBLE), Type::DOUBLE));
        assert!(table.equal(conv(Type::DOUBLE, Type::LONG_DOUBLE), Type::LONG_DOUBLE));
        // The result sheds qualifiers.
        let r = conv(Type::INT.set_const(), Type::INT);
        assert!(!r.is_const());
    }

    #[test]
    fn patch_declarator_rebuilds_pointer_layers() {
        let mut table = TypeTable::new();
        // "void" head: the target is the whole declarator.
        let f = table.function_of(Type::INT);
        let patched_void = table.patch_declarator(Type::VOID, f).unwrap();
        assert!(table.equal(patched_void, f));

        // Pointer head: pointer-to-function, keeping the head qualifiers.
        let head = table.pointer_to(Type::VOID).set_const();
        let patched = table.patch_declarator(head, f).unwrap();
        assert!(patched.is_pointer());
        assert!(patched.is_const());
        assert!(table.equal(table.deref(patched), f));

        // Array head: the element type is replaced in place.
        let arr = table.array_of(Type::VOID, 0).unwrap();
        table.set_array_length(arr, 2);
        let inner = table.array_of(Type::INT, 3).unwrap();
        let patched = table.patch_declarator(arr, inner).unwrap();
        assert!(table.equal(patched, arr));
        assert!(table.equal(table.next(arr), inner));
    }

    #[test]
    fn clean_prototype_detaches_member_symbols() {
        let mut table = TypeTable::new();
        let mut symbols = SymbolArena::new();
        let f = table.function_of(Type::VOID);
        let n = table.add_member(f, "a", Type::INT).unwrap().unwrap();
        let a = symbols.alloc(Symbol::local("a", Type::INT));
        table.set_member_symbol(f, n, a);
        assert_eq!(table.member(f, n).sym, Some(a));
        table.clean_prototype(f);
        assert_eq!(table.member(f, n).sym, None);
        // Untagged aggregates are cleaned; tagged ones stop at the tag.
        let s = table.struct_type();
        let m = table.add_member(s, "x", Type::INT).unwrap().unwrap();
        table.set_member_symbol(s, m, a);
        let tag = symbols.alloc(Symbol {
            kind: SymbolKind::Tag,
            ..Symbol::local("s", Type::VOID)
        });
        table.set_tag(s, tag, false);
        table.clean_prototype(s);
        assert_eq!(table.member(s, m).sym, Some(a));
    }
}
