//! Prelude module for common imports.
//!
//! # Usage
//!
//! ```ignore
//! use mcsnap::prelude::*;
//! ```

// Error types
pub use crate::error::{ClientError, McSnapError, ProtocolError, Result, SnapshotError};

// Configuration
pub use crate::config::{ClientConfig, Config, SnapshotConfig};

// Client
pub use crate::client::Client;
pub use crate::executor::{CommandExecutor, Reply, ReplyEnd, ScriptedExecutor, TcpExecutor};
pub use crate::keyspace::{Enumeration, ItemError};

// Protocol
pub use crate::protocol::{Key, KeyValue, Stat};

// Snapshots
pub use crate::snapshot::{ExportReport, RestoreReport, Snapshot};

// Metrics
pub use crate::metrics::Metrics;

// Common external crates
pub use std::sync::Arc;
pub use tracing::{debug, error, info, trace, warn};
