pub mod compare;
pub mod place;
