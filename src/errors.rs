mod bind;
mod build;
mod resolve;

pub use bind::BindErrorKind;
pub use build::{BuildErrorKind, TimeoutReport};
pub use resolve::{CyclePath, ResolveErrorKind};
