//! # mcsnap
//!
//! Memcached text-protocol client with keyspace export and restore.
//!
//! ## Features
//!
//! - Memcached ASCII protocol client (SET, GET, STATS, VERSION)
//! - Full keyspace enumeration via `stats items` + `stats cachedump`
//! - Snapshot export to a versioned JSON file with absolute expiries
//! - Restore with TTLs recomputed against the current clock; expired
//!   entries are skipped
//! - Per-command read deadlines and cancellation
//!
//! ## Example
//!
//! ```ignore
//! use mcsnap::client::Client;
//! use mcsnap::config::ClientConfig;
//! use mcsnap::snapshot;
//! use tokio_util::sync::CancellationToken;
//!
//! let mut client = Client::connect(&ClientConfig::default(), CancellationToken::new()).await?;
//! let report = snapshot::export(&mut client).await?;
//! report.snapshot.save("backup.json".as_ref(), true).await?;
//! client.close().await?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐   ┌───────────────┐   ┌──────────────────┐   ┌───────────┐
//! │ snapshot      │──▶│ keyspace      │──▶│ client           │──▶│ executor  │──▶ memcached
//! │ export/restore│   │ stats items + │   │ set/get/stats/   │   │ line I/O, │
//! │               │   │ cachedump     │   │ version          │   │ deadlines │
//! └───────────────┘   └───────────────┘   └──────────────────┘   └───────────┘
//! ```

// Modules
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod keyspace;
pub mod metrics;
pub mod prelude;
pub mod protocol;
pub mod snapshot;
pub mod ttl;

// Re-exports for convenience
pub use error::{ClientError, McSnapError, ProtocolError, Result, SnapshotError};
