use super::*;

use moka::notification::RemovalCause;
use uuid::Uuid;

impl SessionManager {
    /// Creates a session manager with the built-in prompt table.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_classifier(config, PromptClassifier::default())
    }

    /// Creates a session manager with a custom prompt table.
    pub fn with_classifier(config: SessionConfig, classifier: PromptClassifier) -> Self {
        let mut builder = Cache::builder().eviction_listener(close_evicted);
        if let Some(idle) = config.idle_timeout {
            builder = builder.time_to_idle(idle);
        }
        let sessions = builder.build();

        Self {
            sessions,
            config,
            classifier: Arc::new(classifier),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Prompt table used by every session of this manager.
    pub fn classifier(&self) -> &PromptClassifier {
        &self.classifier
    }

    /// Connects with the configured connect timeout.
    pub async fn connect(&self, host: &str, port: u16) -> Result<String, TelnetError> {
        self.connect_with_timeout(host, port, self.config.connect_timeout)
            .await
    }

    /// Connects to a device, detects its vendor and registers the session.
    ///
    /// The session only becomes visible once initialization finished, so a
    /// failed bring-up leaves nothing behind.
    pub async fn connect_with_timeout(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<String, TelnetError> {
        self.evict_idle().await;
        let session_id = Uuid::new_v4().to_string();
        let connected_at = Utc::now();
        debug!("Opening session {} to {}:{}", session_id, host, port);

        let client = TelnetClient::connect(
            host,
            port,
            timeout,
            self.config.clone(),
            self.classifier.clone(),
        )
        .await?;

        let entry = SessionEntry {
            info: SessionInfo {
                session_id: session_id.clone(),
                host: host.to_string(),
                port,
                vendor: client.vendor(),
                connected_at,
            },
            client: Mutex::new(client),
        };
        self.sessions
            .insert(session_id.clone(), Arc::new(entry))
            .await;
        debug!("Session {} registered", session_id);

        Ok(session_id)
    }

    /// Executes with the configured wait window.
    pub async fn execute(&self, session_id: &str, command: &str) -> Result<String, TelnetError> {
        self.execute_with_wait(session_id, command, self.config.execute_wait)
            .await
    }

    /// Sends `command` on a session and returns the raw output captured until
    /// the prompt came back or `wait` elapsed.
    pub async fn execute_with_wait(
        &self,
        session_id: &str,
        command: &str,
        wait: Duration,
    ) -> Result<String, TelnetError> {
        self.evict_idle().await;
        let entry = self
            .sessions
            .get(session_id)
            .await
            .ok_or_else(|| TelnetError::SessionNotFound(session_id.to_string()))?;

        let mut client = entry.client.lock().await;
        // A disconnect may have won the race for the lock.
        if !client.is_connected() && self.sessions.get(session_id).await.is_none() {
            return Err(TelnetError::SessionNotFound(session_id.to_string()));
        }
        debug!("Session {} executing {:?}", session_id, command);
        client.execute(command, wait).await
    }

    /// Removes a session and closes its connection.
    pub async fn disconnect(&self, session_id: &str) -> Result<(), TelnetError> {
        let entry = self
            .sessions
            .remove(session_id)
            .await
            .ok_or_else(|| TelnetError::SessionNotFound(session_id.to_string()))?;

        // Waits for an in-flight execute on this session to finish.
        let mut client = entry.client.lock().await;
        client.close().await;
        debug!("Session {} disconnected", session_id);
        Ok(())
    }

    /// Snapshot of all live sessions, oldest first.
    pub fn list_sessions(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<SessionInfo> = self
            .sessions
            .iter()
            .map(|(_, entry)| entry.info.clone())
            .collect();
        sessions.sort_by(|a, b| {
            a.connected_at
                .cmp(&b.connected_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        sessions
    }

    /// Evicts sessions that exceeded the idle timeout and closes their
    /// connections. Connect and execute call this on their own.
    pub async fn evict_idle(&self) {
        self.sessions.run_pending_tasks().await;
    }

    /// Looks up one session's metadata.
    pub async fn session(&self, session_id: &str) -> Option<SessionInfo> {
        self.sessions
            .get(session_id)
            .await
            .map(|entry| entry.info.clone())
    }
}

/// Closes the connection of a session the cache dropped on its own.
///
/// Explicit removals are closed by `disconnect`.
fn close_evicted(session_id: Arc<String>, entry: Arc<SessionEntry>, cause: RemovalCause) {
    if !cause.was_evicted() {
        return;
    }
    debug!("Session {} evicted ({:?})", session_id, cause);
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                let mut client = entry.client.lock().await;
                client.close().await;
            });
        }
        // Without a runtime, dropping the entry still ends the I/O task.
        Err(_) => drop(entry),
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_manager_lists_nothing() {
        let manager = SessionManager::default();
        assert!(manager.list_sessions().is_empty());
    }

    #[tokio::test]
    async fn unknown_session_operations_fail() {
        let manager = SessionManager::default();
        assert!(matches!(
            manager.execute("missing", "show clock").await,
            Err(TelnetError::SessionNotFound(id)) if id == "missing"
        ));
        assert!(matches!(
            manager.disconnect("missing").await,
            Err(TelnetError::SessionNotFound(_))
        ));
        assert!(manager.session("missing").await.is_none());
    }

    #[tokio::test]
    async fn evict_idle_on_empty_manager_is_a_no_op() {
        let config = SessionConfig {
            idle_timeout: Some(Duration::from_millis(50)),
            ..SessionConfig::default()
        };
        let manager = SessionManager::new(config);
        manager.evict_idle().await;
        assert!(manager.list_sessions().is_empty());
    }

    #[tokio::test]
    async fn refused_connect_registers_nothing() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        drop(listener);

        let manager = SessionManager::default();
        let err = manager
            .connect("127.0.0.1", port)
            .await
            .expect_err("connect to closed port should fail");
        assert!(matches!(err, TelnetError::ConnectError { .. }));
        assert!(manager.list_sessions().is_empty());
    }
}
