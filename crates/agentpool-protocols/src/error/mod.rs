//! Error taxonomy for the agent runtime.

mod agent;
mod model;
mod routing;
mod store;
mod tool;

pub use agent::*;
pub use model::*;
pub use routing::*;
pub use store::*;
pub use tool::*;
