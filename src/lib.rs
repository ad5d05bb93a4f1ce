//! # rtelneter - Network Device Telnet Session Manager
//!
//! `rtelneter` manages interactive Telnet sessions with network devices
//! (Cisco IOS, H3C Comware). It wakes the terminal up, fingerprints the
//! vendor from the prompt, turns output paging off, and splits the device's
//! unframed byte stream into command responses by waiting for the prompt to
//! come back.
//!
//! ## Features
//!
//! - **Vendor Fingerprinting**: Cisco and H3C are told apart by prompt syntax
//! - **Read-Until-Prompt**: Command output is complete once the vendor's prompt
//!   shows up at the end of the stream, with a hard wait window as fallback
//! - **Session Table**: Many concurrent sessions, one lock per session
//! - **Tool Handlers**: JSON-shaped operations ready to be routed by an RPC layer
//! - **Async/Await**: Built on Tokio
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rtelneter::config::SessionConfig;
//! use rtelneter::prompt::detect_vendor_and_mode;
//! use rtelneter::session::SessionManager;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = SessionManager::new(SessionConfig::default());
//!
//!     let session_id = manager.connect("192.168.1.1", 23).await?;
//!     let output = manager.execute(&session_id, "show version").await?;
//!
//!     let detected = detect_vendor_and_mode(&output);
//!     println!("{} [{}]\n{}", detected.vendor, detected.mode(), output);
//!
//!     manager.disconnect(&session_id).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Main Components
//!
//! - [`session::SessionManager`] - Session table and lifecycle operations
//! - [`prompt::PromptClassifier`] - Ordered vendor prompt table
//! - [`telnet`] - Telnet option negotiation and IAC handling
//! - [`tools::DeviceTools`] - Tool handlers with JSON results
//! - [`error::TelnetError`] - Error types
//! - [`config`] - Timing constants and per-manager settings

pub mod config;
pub mod error;
pub mod prompt;
pub mod session;
pub mod telnet;
pub mod tools;
