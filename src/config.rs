//! Timing and buffer settings for Telnet sessions.
//!
//! Network devices are slow and inconsistent about when they emit their
//! prompt, so session bring-up and command capture are paced by fixed delays.
//! The values below were tuned against real Cisco IOS and H3C Comware boxes;
//! [`SessionConfig`] carries them per manager so they can be tightened for
//! fast lab devices (or tests) and loosened for slow ones.

use std::time::Duration;

/// Line terminator written after every command.
pub const LINE_TERMINATOR: &str = "\r\n";

/// Deadline for establishing the TCP connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default wait window for a command's prompt to come back.
pub const DEFAULT_EXECUTE_WAIT: Duration = Duration::from_millis(3000);

/// Wait window of the empty command issued right after connect to capture
/// the first prompt.
pub const CONNECT_PROMPT_WAIT: Duration = Duration::from_millis(1000);

/// Number of bare line terminators sent to wake the terminal up.
pub const ACTIVATION_KEYSTROKES: usize = 3;

/// Pause after each activation keystroke.
pub const ACTIVATION_DELAY: Duration = Duration::from_millis(200);

/// Pause between the vendor probe keystroke and the quick read.
pub const PROBE_SETTLE_DELAY: Duration = Duration::from_millis(300);

/// Pause after the pagination-disable command before draining.
pub const INIT_SETTLE_DELAY: Duration = Duration::from_millis(300);

/// Per-attempt read timeout while draining noise.
pub const DRAIN_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Upper bound on a single drain, for devices that never go quiet.
pub const DRAIN_LIMIT: Duration = Duration::from_secs(3);

/// Per-attempt read timeout of the vendor probe quick read.
pub const QUICK_READ_TIMEOUT: Duration = Duration::from_millis(200);

/// Per-attempt read timeout inside the execute loop.
pub const EXECUTE_READ_TIMEOUT: Duration = Duration::from_millis(200);

/// Pause after a prompt match to let trailing bytes land.
pub const PROMPT_SETTLE_DELAY: Duration = Duration::from_millis(200);

/// How long `close` waits for the I/O task to release the socket.
pub const CLOSE_TIMEOUT: Duration = Duration::from_millis(500);

/// Size of a single socket read.
pub const READ_CHUNK_SIZE: usize = 4096;

/// Capacity of the channels between a session and its I/O task.
pub const CHANNEL_CAPACITY: usize = 256;

/// Per-manager session settings.
///
/// `Default` uses the constants of this module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub connect_timeout: Duration,
    pub execute_wait: Duration,
    pub activation_keystrokes: usize,
    pub activation_delay: Duration,
    pub probe_settle_delay: Duration,
    pub init_settle_delay: Duration,
    pub drain_read_timeout: Duration,
    pub drain_limit: Duration,
    pub quick_read_timeout: Duration,
    pub execute_read_timeout: Duration,
    pub prompt_settle_delay: Duration,
    /// Evict sessions nobody touched for this long. `None` keeps them until
    /// they are disconnected.
    pub idle_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            execute_wait: DEFAULT_EXECUTE_WAIT,
            activation_keystrokes: ACTIVATION_KEYSTROKES,
            activation_delay: ACTIVATION_DELAY,
            probe_settle_delay: PROBE_SETTLE_DELAY,
            init_settle_delay: INIT_SETTLE_DELAY,
            drain_read_timeout: DRAIN_READ_TIMEOUT,
            drain_limit: DRAIN_LIMIT,
            quick_read_timeout: QUICK_READ_TIMEOUT,
            execute_read_timeout: EXECUTE_READ_TIMEOUT,
            prompt_settle_delay: PROMPT_SETTLE_DELAY,
            idle_timeout: None,
        }
    }
}

impl SessionConfig {
    /// Scales every pacing delay and read timeout by `factor`.
    ///
    /// Connect timeout and execute wait are left alone; they are deadlines,
    /// not pacing.
    pub fn scaled(&self, factor: f64) -> Self {
        let scale = |d: Duration| d.mul_f64(factor);
        Self {
            activation_delay: scale(self.activation_delay),
            probe_settle_delay: scale(self.probe_settle_delay),
            init_settle_delay: scale(self.init_settle_delay),
            drain_read_timeout: scale(self.drain_read_timeout),
            quick_read_timeout: scale(self.quick_read_timeout),
            execute_read_timeout: scale(self.execute_read_timeout),
            prompt_settle_delay: scale(self.prompt_settle_delay),
            ..self.clone()
        }
    }
}
