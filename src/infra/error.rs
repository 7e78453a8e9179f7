use std::{io, net::SocketAddr, path::PathBuf};

use thiserror::Error;

/// Start-up and runtime failures of the adapters wired up by the binary.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("failed to listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("failed to wait for the shutdown signal: {0}")]
    Signal(#[source] io::Error),
    #[error("database error: {message}")]
    Database { message: String },
    #[error("migrations failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("certificate storage at `{}` is unusable: {source}", directory.display())]
    Storage {
        directory: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl InfraError {
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}
