//! Storage Module
//!
//! This module provides the shared key-value store. There is exactly one
//! [`Store`] per server process; it is created in `main`, wrapped in an
//! `Arc`, and handed to every connection through its command handler.
//!
//! ## Example
//!
//! ```
//! use minikv::storage::Store;
//! use bytes::Bytes;
//! use std::sync::Arc;
//!
//! let store = Arc::new(Store::new());
//!
//! store.set(Bytes::from("name"), Bytes::from("Ariz"));
//! assert_eq!(store.get(b"name"), Some(Bytes::from("Ariz")));
//! ```

pub mod engine;

// Re-export commonly used types
pub use engine::{Store, StoreStats};
