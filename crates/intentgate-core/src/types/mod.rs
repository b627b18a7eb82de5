//! Core types for intentgate.

mod intention;
mod message;

pub use intention::*;
pub use message::*;
