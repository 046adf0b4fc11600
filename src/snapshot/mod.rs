//! Snapshots: export a server's keyspace to a file and restore it

mod engine;
mod file;
pub mod legacy;

pub use engine::{ExportReport, Failure, RestoreReport, export, export_at, restore, restore_at};
pub use file::{SNAPSHOT_VERSION, Snapshot};
