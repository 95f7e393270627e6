//! ops-core library
//!
//! Shared plumbing for the operational CLI tools in this workspace:
//! account resolution against the team's Organizations layout, file-backed
//! caching, assume-role credential construction, a bounded-concurrency task
//! runner, and a CloudWatch Logs Insights query helper with batched
//! orchestration on top.

pub mod accounts;
pub mod batch;
pub mod cache;
pub mod creds;
pub mod insights;
pub mod logging;
pub mod runner;

pub use accounts::{AccountResolver, AccountSet, NamingConvention, Purpose, ServiceAccount};
pub use batch::{BatchOutcome, BatchQuery, StandardBatchQuery, run_batched};
pub use cache::FileCache;
pub use insights::{InsightsQueryClient, QueryResults, QuerySpec, QueryStats, ResultRow};
pub use logging::{get_or_create_log_dir, init_file_logging, state_dir};
pub use runner::TaskRunner;
