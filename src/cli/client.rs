//! IPC client for communicating with the pomotick daemon.
//!
//! This module provides:
//! - Unix Domain Socket client
//! - Request/response handling
//! - Connection retry logic
//! - Timeout handling

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::time::timeout;

use crate::paths::AppPaths;
use crate::types::{IpcRequest, IpcResponse};

// ============================================================================
// Constants
// ============================================================================

/// Connection timeout in seconds
const CONNECTION_TIMEOUT_SECS: u64 = 5;

/// Read/write timeout in seconds
const IO_TIMEOUT_SECS: u64 = 5;

/// Maximum response size in bytes (64KB)
const MAX_RESPONSE_SIZE: u64 = 65536;

/// Maximum retry attempts
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds (base delay, multiplied by attempt number)
const RETRY_DELAY_MS: u64 = 500;

// ============================================================================
// IpcClient
// ============================================================================

/// IPC client for daemon communication.
#[derive(Debug, Clone)]
pub struct IpcClient {
    /// Socket path
    socket_path: PathBuf,
    /// Connection timeout
    timeout: Duration,
    /// Attempts per request
    max_retries: u32,
}

impl IpcClient {
    /// Creates a client for the daemon serving `paths`.
    pub fn new(paths: &AppPaths) -> Self {
        Self::with_socket_path(paths.socket())
    }

    /// Creates a new IPC client for the given socket path.
    pub fn with_socket_path(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout: Duration::from_secs(CONNECTION_TIMEOUT_SECS),
            max_retries: MAX_RETRIES,
        }
    }

    /// Sets the number of attempts per request (at least one).
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Sends a toggle command to the daemon.
    pub async fn toggle(&self) -> Result<IpcResponse> {
        self.send_request_with_retry(&IpcRequest::Toggle).await
    }

    /// Sends a status query to the daemon.
    pub async fn status(&self) -> Result<IpcResponse> {
        self.send_request_with_retry(&IpcRequest::Status).await
    }

    /// Asks the daemon to reset the completed count.
    pub async fn reset(&self) -> Result<IpcResponse> {
        self.send_request_with_retry(&IpcRequest::Reset).await
    }

    /// Asks the daemon to reload its settings.
    pub async fn reload(&self) -> Result<IpcResponse> {
        self.send_request_with_retry(&IpcRequest::Reload).await
    }

    /// Sends a request to the daemon with retry logic.
    ///
    /// Only connection and transport failures are retried; an error
    /// response from the daemon is returned immediately.
    async fn send_request_with_retry(&self, request: &IpcRequest) -> Result<IpcResponse> {
        let mut attempt = 1;
        loop {
            let err = match self.send_request(request).await {
                Ok(response) if response.is_success() => return Ok(response),
                Ok(response) => anyhow::bail!("{}", response.message),
                Err(e) => e,
            };

            if attempt >= self.max_retries {
                return Err(err);
            }
            tracing::warn!(
                "request failed (attempt {}/{}): {:#}",
                attempt,
                self.max_retries,
                err
            );
            let delay = Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt));
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Sends a single request to the daemon.
    async fn send_request(&self, request: &IpcRequest) -> Result<IpcResponse> {
        let mut stream = timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .context("Connection timed out")?
            .with_context(|| {
                format!(
                    "Cannot reach the daemon at {:?}. Start it with 'pomotick daemon'",
                    self.socket_path
                )
            })?;

        let request_json =
            serde_json::to_vec(request).context("Failed to serialize request")?;

        timeout(
            Duration::from_secs(IO_TIMEOUT_SECS),
            stream.write_all(&request_json),
        )
        .await
        .context("Write timed out")?
        .context("Failed to send request")?;

        // Shut down the write half to mark the end of the request
        stream
            .shutdown()
            .await
            .context("Failed to finish request")?;

        let mut buffer = Vec::new();
        let mut limited = (&mut stream).take(MAX_RESPONSE_SIZE);
        timeout(
            Duration::from_secs(IO_TIMEOUT_SECS),
            limited.read_to_end(&mut buffer),
        )
        .await
        .context("Read timed out")?
        .context("Failed to receive response")?;

        if buffer.is_empty() {
            anyhow::bail!("The daemon closed the connection without responding");
        }

        serde_json::from_slice(&buffer).context("Failed to parse response")
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ResponseData, TimerPhase};
    use tokio::net::UnixListener;

    // ------------------------------------------------------------------------
    // Helper functions
    // ------------------------------------------------------------------------

    fn create_temp_socket_path() -> PathBuf {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sock");
        // Keep the directory so it's not deleted
        std::mem::forget(dir);
        path
    }

    fn create_mock_server(socket_path: &Path) -> UnixListener {
        let _ = std::fs::remove_file(socket_path);
        UnixListener::bind(socket_path).unwrap()
    }

    /// Accepts one connection, returns the request it carried, and answers
    /// with `response`.
    async fn answer_once(listener: &UnixListener, response: &IpcResponse) -> IpcRequest {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();
        let request: IpcRequest = serde_json::from_slice(&raw).unwrap();

        let json = serde_json::to_vec(response).unwrap();
        stream.write_all(&json).await.unwrap();
        stream.shutdown().await.unwrap();
        request
    }

    fn running_data() -> ResponseData {
        ResponseData {
            phase: TimerPhase::Running,
            progress_seconds: 0,
            progress_max_seconds: 1500,
            time_left_seconds: 1500,
            completed_count: 0,
            manually_stopped: false,
            show_elapsed_time: false,
        }
    }

    #[test]
    fn test_new_uses_data_dir_socket() {
        let paths = AppPaths::new("/tmp/pomo");
        let client = IpcClient::new(&paths);
        assert_eq!(client.socket_path(), paths.socket().as_path());
    }

    #[test]
    fn test_with_socket_path() {
        let client = IpcClient::with_socket_path("/tmp/test.sock");
        assert_eq!(client.socket_path(), Path::new("/tmp/test.sock"));
    }

    #[tokio::test]
    async fn test_connection_failure() {
        let client = IpcClient::with_socket_path("/tmp/nonexistent_pomotick_12345.sock")
            .with_max_retries(1);
        let err = client.status().await.unwrap_err();
        assert!(format!("{:#}", err).contains("pomotick daemon"));
    }

    #[tokio::test]
    async fn test_send_toggle_request() {
        let socket_path = create_temp_socket_path();
        let listener = create_mock_server(&socket_path);

        let server_handle = tokio::spawn(async move {
            let response = IpcResponse::success("Focus interval started", Some(running_data()));
            answer_once(&listener, &response).await
        });

        let client = IpcClient::with_socket_path(socket_path);
        let response = client.toggle().await.unwrap();

        assert_eq!(response.message, "Focus interval started");
        assert_eq!(response.data.unwrap().phase, TimerPhase::Running);
        assert_eq!(server_handle.await.unwrap(), IpcRequest::Toggle);
    }

    #[tokio::test]
    async fn test_send_reset_and_reload_requests() {
        let socket_path = create_temp_socket_path();
        let listener = create_mock_server(&socket_path);

        let server_handle = tokio::spawn(async move {
            let ok = IpcResponse::success("ok", None);
            let first = answer_once(&listener, &ok).await;
            let second = answer_once(&listener, &ok).await;
            (first, second)
        });

        let client = IpcClient::with_socket_path(socket_path);
        client.reset().await.unwrap();
        client.reload().await.unwrap();

        let (first, second) = server_handle.await.unwrap();
        assert_eq!(first, IpcRequest::Reset);
        assert_eq!(second, IpcRequest::Reload);
    }

    #[tokio::test]
    async fn test_error_response_is_not_retried() {
        let socket_path = create_temp_socket_path();
        let listener = create_mock_server(&socket_path);

        let server_handle = tokio::spawn(async move {
            answer_once(&listener, &IpcResponse::error("Settings reload is not available")).await
        });

        let client = IpcClient::with_socket_path(socket_path);
        let err = client.reload().await.unwrap_err();

        assert!(err.to_string().contains("not available"));
        assert_eq!(server_handle.await.unwrap(), IpcRequest::Reload);
    }

    #[tokio::test]
    async fn test_retries_after_transport_failure() {
        let socket_path = create_temp_socket_path();
        let listener = create_mock_server(&socket_path);

        let server_handle = tokio::spawn(async move {
            // First connection is dropped without a response.
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);

            let response = IpcResponse::success("", Some(running_data()));
            answer_once(&listener, &response).await
        });

        let client = IpcClient::with_socket_path(socket_path).with_max_retries(2);
        let response = client.status().await.unwrap();

        assert!(response.is_success());
        assert_eq!(server_handle.await.unwrap(), IpcRequest::Status);
    }
}
