//! Common types shared by every layer of the runtime.

mod common;
mod message;

pub use common::*;
pub use message::*;
