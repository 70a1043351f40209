pub mod matrix;
pub mod sync;
pub mod validate;
