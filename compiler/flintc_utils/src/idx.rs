/// A newtype wrapping a dense index into some collection.
///
/// Implementing types are plain wrappers around `usize`; the trait exists so
/// that collections such as [`crate::index_vec::IdxVec`] can refuse indices of
/// the wrong kind at compile time.
pub trait Idx: 'static + Copy + Eq {
    fn new(idx: usize) -> Self;
    fn idx(&self) -> usize;
}
