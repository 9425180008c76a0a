//! Server configuration
//!
//! Parsed from the command line (and `MINIKV_*` environment variables)
//! by the server binary. Library users and tests start from
//! [`ServerConfig::default`].

use clap::Parser;

/// Default read-buffer limit per connection (64 MiB)
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 64 * 1024 * 1024;

/// Server configuration
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "minikv")]
#[command(about = "A minimal in-memory key-value server speaking RESP")]
#[command(version)]
pub struct ServerConfig {
    /// Host to bind to
    #[arg(short = 'H', long, env = "MINIKV_HOST", default_value = crate::DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "MINIKV_PORT", default_value_t = crate::DEFAULT_PORT)]
    pub port: u16,

    /// Largest amount of unparsed input held per connection, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_BUFFER_SIZE)]
    pub max_buffer_size: usize,

    /// Log filter directive, e.g. "debug" or "minikv=trace" (overrides RUST_LOG)
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: crate::DEFAULT_HOST.to_string(),
            port: crate::DEFAULT_PORT,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            log_level: None,
        }
    }
}

impl ServerConfig {
    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
