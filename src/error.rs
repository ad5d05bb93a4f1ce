//! Error types for Telnet session management.
//!
//! Only transport and bookkeeping failures are errors. An unrecognized vendor,
//! a prompt that never shows up, or a skipped pagination command are reported
//! as data by the session layer.

use thiserror::Error;

/// Errors that can occur while managing Telnet sessions.
#[derive(Error, Debug)]
pub enum TelnetError {
    /// The TCP connection was not established before the deadline.
    #[error("connect to {addr} timed out after {timeout_ms} ms")]
    ConnectTimeout { addr: String, timeout_ms: u128 },

    /// The transport failed to establish the connection (refused, unreachable, ...).
    #[error("connect to {addr} failed: {source}")]
    ConnectError {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The session identifier is unknown or was already disconnected.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// The Telnet connection has been closed.
    ///
    /// Returned when writing to a session whose remote end already hung up.
    #[error("connect closed")]
    ConnectClosedError,

    /// A custom prompt table contains a pattern that does not compile.
    #[error("invalid prompt pattern: {0}")]
    InvalidPromptPattern(String),

    /// A vendor name outside the supported set.
    #[error("unsupported vendor: {0}")]
    UnsupportedVendor(String),

    /// The tool dispatcher was asked for a tool it does not know.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Tool arguments could not be decoded into the tool's input type.
    #[error("invalid tool arguments: {0}")]
    InvalidToolArguments(String),

    /// A tool result could not be encoded as JSON.
    #[error("failed to encode tool output: {0}")]
    ToolOutputError(String),
}
