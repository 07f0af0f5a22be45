//! Tool contract types.

mod context;
mod spec;
mod traits;

pub use context::*;
pub use spec::*;
pub use traits::*;
