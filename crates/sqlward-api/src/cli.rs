//! Command-line interface for the `sqlward-demo` binary.
//!
//! Every flag can also come from the environment; explicit flags win over
//! `{data_dir}/database.toml`, which wins over built-in defaults.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sqlward_observe::LogFormat;

/// Demo users service built on sqlward repositories.
#[derive(Debug, Parser)]
#[command(name = "sqlward-demo", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Database URL (`sqlite://...`, `postgres://...`).
    #[arg(long, env = "DATABASE_URL", global = true)]
    pub database_url: Option<String>,

    /// Log every SQL statement.
    #[arg(long, env = "DATABASE_ECHO", global = true)]
    pub echo: bool,

    /// Directory holding `database.toml` and the default SQLite file.
    #[arg(long, env = "SQLWARD_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log output format (pretty or json).
    #[arg(long, env = "SQLWARD_LOG_FORMAT", default_value = "pretty", global = true)]
    pub log_format: LogFormat,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, env = "SQLWARD_OTEL", global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run migrations, then serve the REST API (the default).
    Serve {
        /// Port to listen on.
        #[arg(long, env = "SQLWARD_PORT", default_value_t = 3000)]
        port: u16,

        /// Host to bind to.
        #[arg(long, env = "SQLWARD_HOST", default_value = "127.0.0.1")]
        host: String,
    },

    /// Apply pending migrations and exit.
    Migrate,
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Serve {
            port: 3000,
            host: "127.0.0.1".to_string(),
        }
    }
}
