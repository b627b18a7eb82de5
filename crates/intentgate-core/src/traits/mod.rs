//! Collaborator traits the core depends on.

mod collaborators;
mod kv_store;
mod llm;
mod navigator;

pub use collaborators::*;
pub use kv_store::*;
pub use llm::*;
pub use navigator::*;
