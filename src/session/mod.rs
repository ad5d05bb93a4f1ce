//! Telnet session management and command execution.
//!
//! This module keeps a table of live device sessions, brings new connections
//! up (terminal activation, vendor probe, pagination off) and runs the
//! read-until-prompt loop that cuts the device's byte stream into command
//! responses.
//!
//! # Main Components
//!
//! - [`SessionManager`] - Session table and lifecycle operations
//! - [`TelnetClient`] - One device connection with its detected vendor
//! - [`TelnetChannel`] - I/O task bridging the socket and the session
//! - [`SessionInfo`] - Serializable session snapshot

use chrono::{DateTime, Utc};
use log::{debug, trace};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, Receiver, Sender};

use crate::config::{self, SessionConfig};
use crate::error::TelnetError;
use crate::prompt::{PromptClassifier, Vendor};

pub use channel::{ReadOutcome, TelnetChannel};

/// Snapshot of a session, as reported by [`SessionManager::list_sessions`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_id: String,
    pub host: String,
    pub port: u16,
    pub vendor: Vendor,
    pub connected_at: DateTime<Utc>,
}

/// A live Telnet connection to one device.
pub struct TelnetClient {
    channel: TelnetChannel,
    /// Set once by the vendor probe during connect.
    vendor: Vendor,
    config: SessionConfig,
    classifier: Arc<PromptClassifier>,
}

/// Table entry: immutable metadata plus the client behind a per-session lock.
///
/// The lock serializes operations on one device; different sessions never
/// wait on each other.
struct SessionEntry {
    info: SessionInfo,
    client: Mutex<TelnetClient>,
}

/// Telnet session manager.
///
/// Owns every live session. Sessions stay until disconnected, or until they
/// have been idle for [`SessionConfig::idle_timeout`] when one is set.
#[derive(Clone)]
pub struct SessionManager {
    sessions: Cache<String, Arc<SessionEntry>>,
    config: SessionConfig,
    classifier: Arc<PromptClassifier>,
}

mod channel;
mod client;
mod manager;
