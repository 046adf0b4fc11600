//! Command-line surface of the `mcsnap` binary

use crate::config::Config;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Extension every snapshot path is normalized to
pub const SNAPSHOT_EXTENSION: &str = "json";

/// Export or restore the full contents of a memcached server
#[derive(Debug, Parser)]
#[command(name = "mcsnap", version, about)]
pub struct Cli {
    /// Memcached server (host:port); overrides config and MCSNAP_SERVER
    #[arg(short = 'H', long, global = true)]
    pub server: Option<String>,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Write Prometheus metrics to this file when done
    #[arg(long, global = true)]
    pub metrics_file: Option<PathBuf>,

    #[command(subcommand)]
    pub operation: Operation,
}

#[derive(Debug, Subcommand)]
pub enum Operation {
    /// Dump every live key to a snapshot file
    Export {
        #[arg(short, long, default_value = "snapshot.json")]
        output: PathBuf,
    },
    /// Write the unexpired entries of a snapshot file back to the server
    Restore {
        #[arg(short, long, default_value = "snapshot.json")]
        input: PathBuf,
    },
    /// Convert a legacy relative-expiry snapshot to the current format
    Migrate {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Unix time the legacy snapshot was taken
        #[arg(long)]
        taken_at: u64,
    },
    /// Print the server version
    Version,
}

impl Cli {
    /// Resolve configuration: file or environment, then flag overrides
    pub fn load_config(&self) -> crate::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(&path.to_string_lossy())?,
            None => Config::from_env(),
        };
        if let Some(server) = &self.server {
            config.client.server.clone_from(server);
        }
        Ok(config)
    }
}

/// Force the snapshot extension onto a path
pub fn normalize_path(path: &Path) -> PathBuf {
    if path.extension().is_some_and(|ext| ext == SNAPSHOT_EXTENSION) {
        path.to_path_buf()
    } else {
        path.with_extension(SNAPSHOT_EXTENSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("backup")), PathBuf::from("backup.json"));
        assert_eq!(normalize_path(Path::new("backup.json")), PathBuf::from("backup.json"));
        assert_eq!(normalize_path(Path::new("dir/backup.txt")), PathBuf::from("dir/backup.json"));
    }

    #[test]
    fn test_parse_export() {
        let cli = Cli::try_parse_from(["mcsnap", "-H", "cache01:11211", "export", "-o", "out"]).unwrap();
        assert_eq!(cli.server.as_deref(), Some("cache01:11211"));
        assert!(matches!(cli.operation, Operation::Export { output } if output == Path::new("out")));
    }

    #[test]
    fn test_parse_restore_default_input() {
        let cli = Cli::try_parse_from(["mcsnap", "restore"]).unwrap();
        assert!(
            matches!(cli.operation, Operation::Restore { input } if input == Path::new("snapshot.json"))
        );
    }

    #[test]
    fn test_operation_required() {
        assert!(Cli::try_parse_from(["mcsnap"]).is_err());
        assert!(Cli::try_parse_from(["mcsnap", "export", "restore"]).is_err());
    }

    #[test]
    fn test_migrate_requires_taken_at() {
        assert!(Cli::try_parse_from(["mcsnap", "migrate", "-i", "old", "-o", "new"]).is_err());
        let cli =
            Cli::try_parse_from(["mcsnap", "migrate", "-i", "old", "-o", "new", "--taken-at", "42"])
                .unwrap();
        assert!(matches!(cli.operation, Operation::Migrate { taken_at: 42, .. }));
    }

    #[test]
    fn test_server_flag_overrides_config() {
        let cli = Cli::try_parse_from(["mcsnap", "--server", "10.0.0.5:11211", "version"]).unwrap();
        let config = cli.load_config().unwrap();
        assert_eq!(config.client.server, "10.0.0.5:11211");
    }
}
