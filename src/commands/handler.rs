//! Command Handler
//!
//! Executes decoded [`Command`]s against the shared [`Store`] and builds
//! the reply for each one.
//!
//! ## Supported Commands
//!
//! - `PING` - Replies `+PONG`, any arguments are ignored
//! - `ECHO message` - Replies with `message` as a bulk string
//! - `SET key value` - Stores `value` under `key`, replies `+OK`
//! - `GET key` - Replies with the stored value, or a null bulk string
//!
//! Names are matched exactly as received. Every command produces exactly
//! one reply; arity problems and unknown names become error replies and
//! never reach the store.

use crate::protocol::{Command, RespValue};
use crate::storage::Store;
use std::sync::Arc;
use tracing::trace;

/// Handles commands by dispatching them to the appropriate handlers.
///
/// The handler holds no per-request state, so one instance (or any number
/// of clones) can serve many connections at once.
#[derive(Clone, Debug)]
pub struct CommandHandler {
    /// The shared store
    storage: Arc<Store>,
}

impl CommandHandler {
    /// Creates a new command handler with the given store.
    pub fn new(storage: Arc<Store>) -> Self {
        Self { storage }
    }

    /// Returns the store this handler executes against.
    pub fn storage(&self) -> &Arc<Store> {
        &self.storage
    }

    /// Executes a command and returns the response.
    pub fn execute(&self, command: Command) -> RespValue {
        trace!(command = %command.name, args = command.args.len(), "Dispatching command");

        match command.name.as_str() {
            "PING" => self.cmd_ping(&command),
            "ECHO" => self.cmd_echo(&command),
            "SET" => self.cmd_set(command),
            "GET" => self.cmd_get(&command),

            _ => RespValue::error(format!("ERR unknown command '{}'", command.name)),
        }
    }

    /// PING
    fn cmd_ping(&self, _command: &Command) -> RespValue {
        RespValue::pong()
    }

    /// ECHO message
    fn cmd_echo(&self, command: &Command) -> RespValue {
        match command.args.as_slice() {
            [message, ..] => RespValue::bulk_string(message.clone()),
            _ => wrong_arity("ECHO"),
        }
    }

    /// SET key value
    fn cmd_set(&self, command: Command) -> RespValue {
        // Anything after the value is ignored
        let mut args = command.args.into_iter();
        match (args.next(), args.next()) {
            (Some(key), Some(value)) => {
                self.storage.set(key, value);
                RespValue::ok()
            }
            _ => wrong_arity("SET"),
        }
    }

    /// GET key
    fn cmd_get(&self, command: &Command) -> RespValue {
        let key = match command.args.as_slice() {
            [key, ..] => key,
            _ => return wrong_arity("GET"),
        };

        match self.storage.get(key) {
            Some(value) => RespValue::bulk_string(value),
            None => RespValue::null(),
        }
    }
}

fn wrong_arity(name: &str) -> RespValue {
    RespValue::error(format!(
        "ERR wrong number of arguments for '{}' command",
        name
    ))
}
