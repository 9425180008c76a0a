//! # minikv - A Minimal In-Memory Key-Value Server
//!
//! minikv speaks the request/response framing of RESP (REdis Serialization
//! Protocol), so `redis-cli` and other Redis clients can talk to it for the
//! commands it supports.
//!
//! ## Features
//!
//! - **RESP framing**: Incremental decoding of `*N` arrays of `$L` bulk strings
//! - **Shared store**: One map behind a reader/writer lock, shared by all clients
//! - **Async I/O**: Built on Tokio, one task per client connection
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                            minikv                            │
//! │                                                              │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐       │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │       │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │       │
//! │  └─────────────┘    └──────┬──────┘    └──────┬──────┘       │
//! │                            │                  │              │
//! │                            ▼                  ▼              │
//! │                     ┌─────────────┐    ┌─────────────┐       │
//! │                     │   Frame     │    │   Store     │       │
//! │                     │   Decoder   │    │  (RwLock)   │       │
//! │                     └─────────────┘    └─────────────┘       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use minikv::{handle_connection, CommandHandler, ConnectionStats, Store};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() {
//!     let storage = Arc::new(Store::new());
//!     let stats = Arc::new(ConnectionStats::new());
//!
//!     let listener = TcpListener::bind("127.0.0.1:6379").await.unwrap();
//!
//!     loop {
//!         let (stream, addr) = listener.accept().await.unwrap();
//!         let handler = CommandHandler::new(Arc::clone(&storage));
//!         let stats = Arc::clone(&stats);
//!
//!         tokio::spawn(handle_connection(stream, addr, handler, stats, 64 * 1024 * 1024));
//!     }
//! }
//! ```
//!
//! ## Supported Commands
//!
//! - `PING` - replies `+PONG`
//! - `ECHO message`
//! - `SET key value`
//! - `GET key`
//!
//! Command names are case-sensitive.
//!
//! ## Module Overview
//!
//! - [`protocol`]: Frame decoder, decoded commands and reply encoding
//! - [`storage`]: The shared key-value store
//! - [`commands`]: Command dispatch
//! - [`connection`]: Client connection management
//! - [`config`]: Server configuration

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::CommandHandler;
pub use config::ServerConfig;
pub use connection::{handle_connection, ConnectionError, ConnectionStats};
pub use protocol::{Command, DecodeError, FrameDecoder, RespValue};
pub use storage::Store;

/// The default port minikv listens on (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

/// The default host minikv binds to
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Version of minikv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
