pub mod accessor;
pub mod get_or_create;

pub use accessor::HistoryAccessor;
pub use get_or_create::{Lookup, get_or_create};
