//! jobtrail - recruiter-conversation tracker
//!
//! Syncs a mailbox, admits real recruiter conversations through a layered
//! filter plus an LLM classifier, groups them per recruiter contact, and
//! tracks whose turn it is to respond.
//!
//! ## Module organization
//!
//! - `provider/`: mail provider adapters (Gmail today)
//! - `filter/`: multi-layer admission filter
//! - `classifier/`: HTTP client for the LLM classification service
//! - `tracker/`: the sync pipeline, grouper, status engine, and learner
//! - `db/`: SQLite store, one query module per table
//! - `mcp/`: JSON-RPC stdio server for AI assistants
//! - `cli/`, `output/`: command surface and formatting
//! - `config/`, `error`, `crypto`, `types`: shared plumbing

pub mod classifier;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod filter;
pub mod mcp;
pub mod output;
pub mod provider;
pub mod tracker;
pub mod types;

pub use config::Config;
pub use db::Database;
pub use error::JobError;
