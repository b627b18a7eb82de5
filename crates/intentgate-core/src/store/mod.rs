//! Key-value backends and the intention store built on them.

mod cleanup;
mod intentions;
mod memory;
mod sqlite;

pub use cleanup::CleanupScheduler;
pub use intentions::{
    intention_key, IntentionStore, ACCESSIBLE_SITES_KEY, ACTIVE_INTENTION_KEY,
    INTENTION_KEY_PREFIX, JUST_SET_KEY,
};
pub use memory::MemoryKvStore;
pub use sqlite::SqliteKvStore;
