//! quire-core: a versioned, soft-deleted block tree over SQLite.
//!
//! # Conventions
//!
//! - **Errors**: block operations return [`error::BlockResult`]; store and
//!   config plumbing returns `anyhow::Result` with context.
//! - **Logging**: `tracing` macros with structured fields (`block_id`,
//!   `workspace_id`, `version`).
//! - **Time**: integer microseconds since the Unix epoch, in `*_at_us` fields.

pub mod config;
pub mod db;
pub mod error;
pub mod ids;
pub mod model;
pub mod repository;
pub mod tree;

pub use error::{BlockError, BlockResult, ErrorCode};
pub use repository::{BlockRepository, RepositoryOptions};
pub use tree::{BlockNode, TraversalStrategy, TreeMaterializer, TreeOptions};
