use super::*;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;

use crate::telnet::{TelnetParser, escape_iac};

/// Outcome of one bounded read.
#[derive(Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    Data(Vec<u8>),
    /// Nothing arrived within the timeout. Not an error.
    Timeout,
    /// The remote end closed the connection.
    Closed,
}

/// Byte pipe to a Telnet server.
///
/// A spawned I/O task owns the socket, strips Telnet commands from what it
/// reads and answers option negotiation on its own; the session only sees
/// terminal data.
pub struct TelnetChannel {
    device_addr: String,
    sender: Option<Sender<Vec<u8>>>,
    recv: Receiver<Vec<u8>>,
    io_task: Option<JoinHandle<()>>,
}

impl TelnetChannel {
    /// Opens a TCP connection to `host:port` and starts the I/O task.
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, TelnetError> {
        let device_addr = format!("{host}:{port}");
        let stream = connect_with_timeout(&device_addr, timeout, TcpStream::connect((host, port)))
            .await?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!("{} Failed to set TCP_NODELAY: {:?}", device_addr, e);
        }
        debug!("{} TCP connection successful", device_addr);
        Ok(Self::spawn(stream, device_addr))
    }

    /// Starts the I/O task over an already connected byte stream.
    pub fn spawn<S>(stream: S, device_addr: String) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (sender_to_socket, mut receiver_from_session) =
            mpsc::channel::<Vec<u8>>(config::CHANNEL_CAPACITY);
        let (sender_to_session, receiver_from_socket) =
            mpsc::channel::<Vec<u8>>(config::CHANNEL_CAPACITY);

        let io_task_device_addr = device_addr.clone();
        let io_task = tokio::spawn(async move {
            let (mut reader, mut writer) = tokio::io::split(stream);
            let mut parser = TelnetParser::new();
            let mut buf = vec![0u8; config::READ_CHUNK_SIZE];
            loop {
                tokio::select! {
                    outgoing = receiver_from_session.recv() => {
                        let Some(data) = outgoing else {
                            debug!("{} Session closed the channel.", io_task_device_addr);
                            let _ = writer.shutdown().await;
                            break;
                        };
                        if let Err(e) = write_flush(&mut writer, &escape_iac(&data)).await {
                            debug!("{} Failed to send data to device: {:?}", io_task_device_addr, e);
                            break;
                        }
                    }
                    read = reader.read(&mut buf) => {
                        let n = match read {
                            Ok(0) => {
                                debug!("{} Device sent EOF.", io_task_device_addr);
                                break;
                            }
                            Ok(n) => n,
                            Err(e) => {
                                debug!("{} Read from device failed: {:?}", io_task_device_addr, e);
                                break;
                            }
                        };
                        let parsed = parser.feed(&buf[..n]);
                        if !parsed.replies.is_empty()
                            && let Err(e) = write_flush(&mut writer, &parsed.replies).await
                        {
                            debug!("{} Failed to answer negotiation: {:?}", io_task_device_addr, e);
                            break;
                        }
                        if !parsed.data.is_empty() && sender_to_session.send(parsed.data).await.is_err() {
                            debug!("{} Session output receiver dropped. Closing task.", io_task_device_addr);
                            break;
                        }
                    }
                }
            }
            debug!("{} Telnet I/O task ended.", io_task_device_addr);
        });

        Self {
            device_addr,
            sender: Some(sender_to_socket),
            recv: receiver_from_socket,
            io_task: Some(io_task),
        }
    }

    pub fn device_addr(&self) -> &str {
        &self.device_addr
    }

    /// Waits up to `timeout` for the next chunk of terminal data.
    ///
    /// Cancel-safe: a timed-out read consumes nothing.
    pub async fn read(&mut self, timeout: Duration) -> ReadOutcome {
        match tokio::time::timeout(timeout, self.recv.recv()).await {
            Ok(Some(data)) => {
                trace!("{} <- {:?}", self.device_addr, String::from_utf8_lossy(&data));
                ReadOutcome::Data(data)
            }
            Ok(None) => ReadOutcome::Closed,
            Err(_) => ReadOutcome::Timeout,
        }
    }

    /// Returns data that already arrived, without waiting.
    pub fn try_read(&mut self) -> ReadOutcome {
        match self.recv.try_recv() {
            Ok(data) => ReadOutcome::Data(data),
            Err(TryRecvError::Empty) => ReadOutcome::Timeout,
            Err(TryRecvError::Disconnected) => ReadOutcome::Closed,
        }
    }

    /// Queues `data` for the device. The I/O task writes and flushes it.
    pub async fn write(&mut self, data: &[u8]) -> Result<(), TelnetError> {
        let sender = self.sender.as_ref().ok_or(TelnetError::ConnectClosedError)?;
        trace!("{} -> {:?}", self.device_addr, String::from_utf8_lossy(data));
        sender
            .send(data.to_vec())
            .await
            .map_err(|_| TelnetError::ConnectClosedError)
    }

    /// Checks if the I/O task is still running.
    pub fn is_connected(&self) -> bool {
        self.sender.as_ref().is_some_and(|s| !s.is_closed())
    }

    /// Closes both directions and waits briefly for the socket to be released.
    pub async fn close(&mut self) {
        debug!("{} Closing telnet channel", self.device_addr);
        // Dropping the sender makes the I/O task shut the socket down.
        self.sender.take();
        // A task blocked on handing us data must not keep the socket alive.
        self.recv.close();
        if let Some(io_task) = self.io_task.take()
            && tokio::time::timeout(config::CLOSE_TIMEOUT, io_task).await.is_err()
        {
            debug!("{} I/O task did not stop in time", self.device_addr);
        }
    }
}

async fn write_flush<W>(writer: &mut W, data: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(data).await?;
    writer.flush().await
}

/// Runs a connect future under a deadline, mapping failures to session errors.
pub(crate) async fn connect_with_timeout<F, T>(
    device_addr: &str,
    timeout: Duration,
    connect: F,
) -> Result<T, TelnetError>
where
    F: std::future::Future<Output = std::io::Result<T>>,
{
    match tokio::time::timeout(timeout, connect).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(source)) => Err(TelnetError::ConnectError {
            addr: device_addr.to_string(),
            source,
        }),
        Err(_) => Err(TelnetError::ConnectTimeout {
            addr: device_addr.to_string(),
            timeout_ms: timeout.as_millis(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    use crate::telnet::{DO, IAC, OPT_ECHO, WILL};

    #[tokio::test]
    async fn read_returns_data_timeout_and_closed() {
        let (client, mut device) = duplex(1024);
        let mut channel = TelnetChannel::spawn(client, "test:23".to_string());

        device.write_all(b"\r\nRouter#").await.expect("device write");
        assert_eq!(
            channel.read(Duration::from_secs(1)).await,
            ReadOutcome::Data(b"\r\nRouter#".to_vec())
        );
        assert_eq!(
            channel.read(Duration::from_millis(20)).await,
            ReadOutcome::Timeout
        );

        drop(device);
        assert_eq!(channel.read(Duration::from_secs(1)).await, ReadOutcome::Closed);
        assert!(!channel.is_connected());
    }

    #[tokio::test]
    async fn negotiation_is_answered_and_hidden_from_session() {
        let (client, mut device) = duplex(1024);
        let mut channel = TelnetChannel::spawn(client, "test:23".to_string());

        device
            .write_all(&[IAC, WILL, OPT_ECHO, b'o', b'k'])
            .await
            .expect("device write");
        assert_eq!(
            channel.read(Duration::from_secs(1)).await,
            ReadOutcome::Data(b"ok".to_vec())
        );

        let mut reply = [0u8; 3];
        device.read_exact(&mut reply).await.expect("device read");
        assert_eq!(reply, [IAC, DO, OPT_ECHO]);
    }

    #[tokio::test]
    async fn write_is_escaped_and_flushed() {
        let (client, mut device) = duplex(1024);
        let mut channel = TelnetChannel::spawn(client, "test:23".to_string());

        channel.write(&[b'a', IAC, b'\r', b'\n']).await.expect("write");
        let mut received = [0u8; 5];
        device.read_exact(&mut received).await.expect("device read");
        assert_eq!(received, [b'a', IAC, IAC, b'\r', b'\n']);
    }

    #[tokio::test]
    async fn close_releases_the_stream() {
        let (client, mut device) = duplex(1024);
        let mut channel = TelnetChannel::spawn(client, "test:23".to_string());
        assert!(channel.is_connected());

        channel.close().await;
        assert!(!channel.is_connected());
        assert!(matches!(
            channel.write(b"show version\r\n").await,
            Err(TelnetError::ConnectClosedError)
        ));

        let mut buf = Vec::new();
        let n = device.read_to_end(&mut buf).await.expect("device read");
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn connect_future_that_never_resolves_times_out() {
        let pending = std::future::pending::<std::io::Result<()>>();
        let err = connect_with_timeout("10.0.0.1:23", Duration::from_millis(20), pending)
            .await
            .expect_err("pending connect should time out");
        match err {
            TelnetError::ConnectTimeout { addr, timeout_ms } => {
                assert_eq!(addr, "10.0.0.1:23");
                assert_eq!(timeout_ms, 20);
            }
            other => panic!("unexpected error type: {other}"),
        }
    }

    #[tokio::test]
    async fn connect_to_closed_port_returns_connect_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        drop(listener);

        let err = match TelnetChannel::connect("127.0.0.1", port, Duration::from_secs(2)).await {
            Ok(_) => panic!("connect to closed port should fail"),
            Err(err) => err,
        };
        assert!(matches!(err, TelnetError::ConnectError { .. }));
    }
}
