//! # Vault Index
//!
//! Keeps a durable record of a markdown vault's files and a semantic
//! search index derived from them, and keeps the two in step as files
//! change.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐  scan   ┌────────────────┐  current files  ┌──────────────┐
//! │  Vault   │────────▶│ FileStateStore │────────────────▶│ IndexBuilder │
//! │ (*.md)   │         │    (SQLite)    │                 │  + model     │
//! └──────────┘         └───────┬────────┘                 └──────┬───────┘
//!                              │ max mtime                       │
//!                              ▼                                 ▼
//!                      ┌────────────────┐              ┌──────────────────┐
//!                      │ StalenessPolicy│              │ .npy + path map  │
//!                      └────────────────┘              └──────────────────┘
//! ```
//!
//! The [`sync::Synchronizer`] ties these together before each
//! user-facing command: a throttled incremental scan, then a rebuild if
//! enough changed and the index is stale.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`state`] | Persisted sync state and the configuration provider |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`models`] | Core data types |
//! | [`store`] | File-state store |
//! | [`scanner`] | Full and incremental scans |
//! | [`staleness`] | Rebuild decision |
//! | [`embedding`] | Embedding model abstraction |
//! | [`index_store`] | Index artifacts on disk |
//! | [`builder`] | Index build |
//! | [`sync`] | Auto-sync orchestration |
//! | [`search`] | Semantic search |
//! | [`error`] | Error types |

pub mod builder;
pub mod config;
pub mod config_cmd;
pub mod db;
pub mod embedding;
pub mod error;
pub mod files_cmd;
pub mod index_cmd;
pub mod index_store;
pub mod migrate;
pub mod models;
pub mod scanner;
pub mod search;
pub mod staleness;
pub mod state;
pub mod status;
pub mod store;
pub mod sync;
