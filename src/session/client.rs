use super::*;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::{Instant, sleep};

impl TelnetClient {
    /// Connects to `host:port` and brings the terminal up.
    pub(super) async fn connect(
        host: &str,
        port: u16,
        timeout: Duration,
        config: SessionConfig,
        classifier: Arc<PromptClassifier>,
    ) -> Result<TelnetClient, TelnetError> {
        let channel = TelnetChannel::connect(host, port, timeout).await?;
        let mut client = Self::with_channel(channel, config, classifier);
        client.initialize().await?;
        Ok(client)
    }

    /// Wraps an already connected byte stream and brings the terminal up.
    pub async fn from_stream<S>(
        stream: S,
        device_addr: String,
        config: SessionConfig,
        classifier: Arc<PromptClassifier>,
    ) -> Result<TelnetClient, TelnetError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let channel = TelnetChannel::spawn(stream, device_addr);
        let mut client = Self::with_channel(channel, config, classifier);
        client.initialize().await?;
        Ok(client)
    }

    fn with_channel(
        channel: TelnetChannel,
        config: SessionConfig,
        classifier: Arc<PromptClassifier>,
    ) -> Self {
        Self {
            channel,
            vendor: Vendor::Unknown,
            config,
            classifier,
        }
    }

    /// Wakes the terminal, fingerprints the vendor and turns paging off.
    async fn initialize(&mut self) -> Result<(), TelnetError> {
        let device_addr = self.channel.device_addr().to_string();

        // Many devices stay silent until they see a keystroke.
        for _ in 0..self.config.activation_keystrokes {
            self.send_line("").await?;
            sleep(self.config.activation_delay).await;
        }
        self.drain().await;

        self.send_line("").await?;
        sleep(self.config.probe_settle_delay).await;
        let probe = self.read_quick().await;
        self.vendor = self.classifier.classify(&probe).vendor;
        debug!("{} Detected vendor: {}", device_addr, self.vendor);

        if let Some(command) = self.vendor.disable_paging_command() {
            debug!("{} Disabling paging: {}", device_addr, command);
            self.send_line(command).await?;
        }
        sleep(self.config.init_settle_delay).await;
        self.drain().await;

        debug!("{} Session initialized", device_addr);
        Ok(())
    }

    /// Vendor detected at connect time.
    pub fn vendor(&self) -> Vendor {
        self.vendor
    }

    /// Checks if the underlying Telnet connection is still active.
    pub fn is_connected(&self) -> bool {
        self.channel.is_connected()
    }

    /// Sends `command` and collects output until the vendor's prompt shows up
    /// or `wait` elapses.
    ///
    /// A missing prompt is not an error: whatever arrived in time is returned,
    /// possibly nothing. The returned text is raw, echo and prompt included.
    pub async fn execute(&mut self, command: &str, wait: Duration) -> Result<String, TelnetError> {
        self.send_line(command).await?;

        let started = Instant::now();
        let mut raw: Vec<u8> = Vec::new();

        loop {
            let elapsed = started.elapsed();
            if elapsed >= wait {
                debug!(
                    "{} No prompt within {:?} for {:?}",
                    self.channel.device_addr(),
                    wait,
                    command
                );
                break;
            }
            let attempt = self.config.execute_read_timeout.min(wait - elapsed);
            match self.channel.read(attempt).await {
                ReadOutcome::Data(chunk) => {
                    raw.extend_from_slice(&chunk);
                    let prompt_seen = self
                        .classifier
                        .tail_matches(self.vendor, &String::from_utf8_lossy(&raw));
                    if prompt_seen {
                        sleep(self.config.prompt_settle_delay).await;
                        self.absorb_pending(&mut raw);
                        break;
                    }
                }
                ReadOutcome::Timeout => {}
                ReadOutcome::Closed => {
                    debug!(
                        "{} Connection closed while waiting for prompt",
                        self.channel.device_addr()
                    );
                    break;
                }
            }
        }

        Ok(String::from_utf8_lossy(&raw).into_owned())
    }

    /// Appends data that landed during the settle delay.
    fn absorb_pending(&mut self, raw: &mut Vec<u8>) {
        while let ReadOutcome::Data(chunk) = self.channel.try_read() {
            raw.extend_from_slice(&chunk);
        }
    }

    async fn send_line(&mut self, line: &str) -> Result<(), TelnetError> {
        let data = format!("{}{}", line, config::LINE_TERMINATOR);
        self.channel.write(data.as_bytes()).await
    }

    /// Discards output until one read attempt comes back empty.
    async fn drain(&mut self) {
        let timeout = self.config.drain_read_timeout;
        let discarded = self.read_until_quiet(timeout).await;
        trace!(
            "{} Drained {} bytes",
            self.channel.device_addr(),
            discarded.len()
        );
    }

    /// Collects output until one read attempt comes back empty.
    async fn read_quick(&mut self) -> String {
        let timeout = self.config.quick_read_timeout;
        let data = self.read_until_quiet(timeout).await;
        String::from_utf8_lossy(&data).into_owned()
    }

    async fn read_until_quiet(&mut self, timeout: Duration) -> Vec<u8> {
        let started = Instant::now();
        let mut data = Vec::new();
        while started.elapsed() < self.config.drain_limit {
            match self.channel.read(timeout).await {
                ReadOutcome::Data(chunk) => data.extend_from_slice(&chunk),
                ReadOutcome::Timeout | ReadOutcome::Closed => break,
            }
        }
        data
    }

    /// Closes the connection and releases the socket.
    pub async fn close(&mut self) {
        self.channel.close().await;
        debug!("{} Telnet connection closed", self.channel.device_addr());
    }
}
