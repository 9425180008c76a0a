//! RESP Protocol Implementation
//!
//! This module implements the subset of the Redis Serialization Protocol (RESP)
//! that the server speaks.
//!
//! ## Overview
//!
//! Requests arrive as arrays of bulk strings and are decoded into a [`Command`].
//! Replies are built as [`RespValue`]s and serialized straight onto the socket.
//!
//! ## Modules
//!
//! - `types`: Defines `Command`, the `RespValue` enum and serialization
//! - `parser`: Incremental frame decoder for incoming request bytes
//!
//! ## Example
//!
//! ```
//! use minikv::protocol::{decode_frame, RespValue};
//! use bytes::Bytes;
//!
//! // Decoding incoming data
//! let data = b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n";
//! let (command, consumed) = decode_frame(data).unwrap().unwrap();
//! assert_eq!(command.name, "GET");
//! assert_eq!(consumed, data.len());
//!
//! // Creating responses
//! let response = RespValue::bulk_string(Bytes::from("Ariz"));
//! assert_eq!(response.serialize(), b"$4\r\nAriz\r\n");
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{decode_frame, DecodeError, DecodeResult, FrameDecoder};
pub use types::{Command, RespValue};
