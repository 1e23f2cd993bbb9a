pub mod bit_set;
pub mod idx;
pub mod index_vec;
