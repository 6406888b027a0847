pub mod form;
pub mod tag;
