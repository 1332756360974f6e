//! Configuration and CLI argument handling

use std::path::PathBuf;

use clap::Parser;

use crate::services::NotificationPermission;

/// CLI argument parsing structure
#[derive(Parser, Debug, Clone)]
#[command(name = "study-timer")]
#[command(about = "A background study-timer service with durable state and milestone notifications")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// SQLite file holding timers and queued study sessions
    #[arg(long, default_value = "study-timer.db")]
    pub db_path: PathBuf,

    /// Cancel pending milestone notifications when a timer is paused, stopped or restarted
    #[arg(long)]
    pub cancel_milestones: bool,

    /// Load persisted timers into memory at startup
    #[arg(long)]
    pub restore_timers: bool,

    /// Notification permission granted by the host
    #[arg(long, value_enum, default_value = "granted")]
    pub notifications: NotificationPermission,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Default configuration storing its database at `db_path`
    pub fn with_db_path(db_path: impl Into<PathBuf>) -> Self {
        let mut config = <Self as Parser>::parse_from(["study-timer"]);
        config.db_path = db_path.into();
        config
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}
