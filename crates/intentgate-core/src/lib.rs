//! intentgate-core - Core library for intentgate.
//!
//! Gates access to distracting websites behind a declared intention and
//! watches that what is on screen keeps matching it.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use intentgate_core::{
//!     Classifier, GateConfig, InterceptorDeps, IntentionStore, KvOverrideSource,
//!     RouteInterceptor, SqliteKvStore, StaticEntitlement,
//! };
//!
//! let config = GateConfig::from_env();
//! let kv = Arc::new(SqliteKvStore::new(config.store_path())?);
//! let store = Arc::new(IntentionStore::new(kv.clone(), config.store.clone()));
//!
//! let interceptor = RouteInterceptor::new(
//!     InterceptorDeps {
//!         store,
//!         overrides: Arc::new(KvOverrideSource::new(kv)),
//!         classifier: Classifier::new(llm, &config.classifier),
//!         extractor,
//!         navigator,
//!         entitlement: Arc::new(StaticEntitlement(true)),
//!     },
//!     &config,
//! );
//!
//! let decision = interceptor.on_page_load("https://www.youtube.com/watch?v=abc").await;
//! ```

pub mod blocklist;
pub mod classifier;
pub mod config;
pub mod conflict;
pub mod domain;
pub mod error;
pub mod interceptor;
pub mod matcher;
pub mod monitor;
pub mod parse;
pub mod prompts;
pub mod store;
pub mod traits;
pub mod types;
pub mod validator;

// Re-export commonly used types
pub use blocklist::{BlockVerdict, BlocklistResolver, Category, KvOverrideSource, PathRule};
pub use classifier::{Classifier, ClassifierRequest};
pub use config::{FailurePolicy, GateConfig, LlmProvider, LlmProviderConfig};
pub use conflict::{ConflictChoice, ConflictPrompt, ConflictResolution, ConflictResolver};
pub use domain::normalize_domain;
pub use error::{ErrorCode, GateError, GateResult};
pub use interceptor::{
    AllowReason, GateState, InterceptDecision, InterceptorDeps, RouteInterceptor, SubmitOutcome,
};
pub use matcher::{IntentionMatcher, MatchBasis, MatchResult};
pub use monitor::{should_revoke, IntentionMonitor, MonitorHandle, MonitorKind, TickOutcome};
pub use parse::{MatchParse, ValidationParse};
pub use store::{CleanupScheduler, IntentionStore, MemoryKvStore, SqliteKvStore};
pub use traits::{
    BlockingPrompt, ContentExtractor, EntitlementChecker, KeyValueStore, Llm, LlmConfig,
    Navigator, OverrideSource, Regate, StaticEntitlement,
};
pub use types::{ActiveIntention, IntentionRecord, Message, MessageRole};
pub use validator::{IntentionValidator, ValidationOutcome, ValidationSource};
