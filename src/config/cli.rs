use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the certify binary.
#[derive(Debug, Parser)]
#[command(name = "certify", version, about = "Certificate issuance and verification service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "CERTIFY_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP API together with the job poller.
    Serve(Box<ServeArgs>),
    /// Run only the job poller, without an HTTP listener.
    Worker(Box<WorkerArgs>),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct WorkerArgs {
    #[command(flatten)]
    pub overrides: RuntimeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub runtime: RuntimeOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,
}

/// Overrides shared by every long-running command.
#[derive(Debug, Args, Default, Clone)]
pub struct RuntimeOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the HTTP database pool size.
    #[arg(long = "database-http-max-connections", value_name = "COUNT")]
    pub database_http_max_connections: Option<u32>,

    /// Override the jobs database pool size.
    #[arg(long = "database-jobs-max-connections", value_name = "COUNT")]
    pub database_jobs_max_connections: Option<u32>,

    /// Override the directory rendered certificates are stored in.
    #[arg(long = "storage-directory", value_name = "PATH")]
    pub storage_directory: Option<PathBuf>,

    /// Override the public verification base URL embedded in QR codes.
    #[arg(long = "verification-base-url", value_name = "URL")]
    pub verification_base_url: Option<String>,

    /// Override the QR code edge length in pixels.
    #[arg(long = "verification-qr-size", value_name = "PIXELS")]
    pub verification_qr_size: Option<u32>,

    /// Enable or disable the job poller.
    #[arg(
        long = "jobs-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub jobs_enabled: Option<bool>,

    /// Override the poll interval in milliseconds.
    #[arg(long = "jobs-poll-interval-ms", value_name = "MILLIS")]
    pub jobs_poll_interval_ms: Option<u64>,

    /// Override the number of jobs claimed per poll (at most 50).
    #[arg(long = "jobs-batch-size", value_name = "COUNT")]
    pub jobs_batch_size: Option<u32>,

    /// Override the stored failure message length.
    #[arg(long = "jobs-error-message-limit", value_name = "CHARS")]
    pub jobs_error_message_limit: Option<u32>,

    /// Override the number of jobs executing at once in this instance.
    #[arg(long = "jobs-max-in-flight", value_name = "COUNT")]
    pub jobs_max_in_flight: Option<u32>,
}
