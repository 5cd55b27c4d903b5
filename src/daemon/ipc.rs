//! IPC server for the Pomodoro daemon.
//!
//! This module provides Unix Domain Socket IPC functionality:
//! - Server that listens on a Unix socket
//! - Request/response handling for timer commands
//! - Dispatch into the shared [`TimerEngine`]

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;
use tokio::time::{timeout, Duration};

use crate::settings::Settings;
use crate::types::{IpcRequest, IpcResponse, ResponseData, TimerPhase};

use super::clock::Clock;
use super::timer::TimerEngine;

// ============================================================================
// Constants
// ============================================================================

/// Maximum request size in bytes (4KB)
const MAX_REQUEST_SIZE: usize = 4096;

/// Read timeout in seconds
const READ_TIMEOUT_SECS: u64 = 5;

// ============================================================================
// IpcError
// ============================================================================

/// IPC-specific error types.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    /// Read error
    #[error("Failed to read request: {0}")]
    ReadError(String),

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// Peer closed the connection without sending a request
    #[error("Connection closed by client")]
    ConnectionClosed,

    /// Request too large
    #[error("Request too large (max {MAX_REQUEST_SIZE} bytes)")]
    RequestTooLarge,
}

// ============================================================================
// IpcServer
// ============================================================================

/// Unix Domain Socket IPC server.
pub struct IpcServer {
    /// Unix socket listener
    listener: UnixListener,
    /// Socket path (for cleanup)
    socket_path: PathBuf,
}

impl IpcServer {
    /// Creates a new IPC server bound to the specified socket path.
    ///
    /// If the socket file already exists, it will be removed before binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound.
    pub fn new(socket_path: &Path) -> Result<Self> {
        if socket_path.exists() {
            std::fs::remove_file(socket_path)
                .with_context(|| format!("Failed to remove existing socket: {:?}", socket_path))?;
        }

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create socket directory: {:?}", parent))?;
        }

        let listener = UnixListener::bind(socket_path)
            .with_context(|| format!("Failed to bind Unix socket: {:?}", socket_path))?;

        Ok(Self {
            listener,
            socket_path: socket_path.to_path_buf(),
        })
    }

    /// Accepts an incoming client connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be accepted.
    pub async fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self
            .listener
            .accept()
            .await
            .context("Failed to accept connection")?;
        Ok(stream)
    }

    /// Receives and deserializes an IPC request from the stream.
    ///
    /// Reads until the client shuts down its write half, bounded by the
    /// maximum request size and a read timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or deserialization fails.
    pub async fn receive_request(stream: &mut UnixStream) -> Result<IpcRequest> {
        let mut buffer = Vec::with_capacity(256);
        let mut limited = (&mut *stream).take(MAX_REQUEST_SIZE as u64 + 1);

        let read_result = timeout(
            Duration::from_secs(READ_TIMEOUT_SECS),
            limited.read_to_end(&mut buffer),
        )
        .await;

        match read_result {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(IpcError::ReadError(e.to_string()).into()),
            Err(_) => return Err(IpcError::Timeout.into()),
        }

        if buffer.is_empty() {
            return Err(IpcError::ConnectionClosed.into());
        }
        if buffer.len() > MAX_REQUEST_SIZE {
            return Err(IpcError::RequestTooLarge.into());
        }

        let request: IpcRequest = serde_json::from_slice(&buffer)
            .with_context(|| "Failed to deserialize IPC request")?;

        Ok(request)
    }

    /// Serializes and sends an IPC response to the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub async fn send_response(stream: &mut UnixStream, response: &IpcResponse) -> Result<()> {
        let json = serde_json::to_vec(response).context("Failed to serialize IPC response")?;

        stream
            .write_all(&json)
            .await
            .context("Failed to write response")?;
        stream.flush().await.context("Failed to flush response")?;
        stream
            .shutdown()
            .await
            .context("Failed to shut down response stream")?;

        Ok(())
    }

    /// Serves connections until `shutdown` carries `true` or its sender is
    /// dropped. Each connection is handled on its own task.
    pub async fn serve(&self, handler: Arc<RequestHandler>, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                accepted = self.accept() => {
                    let mut stream = match accepted {
                        Ok(stream) => stream,
                        Err(e) => {
                            tracing::warn!("{:#}", e);
                            continue;
                        }
                    };
                    let handler = Arc::clone(&handler);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(&mut stream, &handler).await {
                            tracing::debug!("connection failed: {:#}", e);
                        }
                    });
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::debug!("IPC server stopped");
                        return;
                    }
                }
            }
        }
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

async fn handle_connection(stream: &mut UnixStream, handler: &RequestHandler) -> Result<()> {
    let response = match IpcServer::receive_request(stream).await {
        Ok(request) => handler.handle(request),
        Err(e) => IpcResponse::error(format!("{:#}", e)),
    };
    IpcServer::send_response(stream, &response).await
}

// ============================================================================
// RequestHandler
// ============================================================================

/// Handles IPC requests by dispatching to the [`TimerEngine`].
pub struct RequestHandler {
    engine: Arc<TimerEngine>,
    clock: Arc<dyn Clock>,
    settings: Arc<RwLock<Settings>>,
    /// File re-read on `reload`; `None` disables reloading
    settings_path: Option<PathBuf>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(
        engine: Arc<TimerEngine>,
        clock: Arc<dyn Clock>,
        settings: Arc<RwLock<Settings>>,
    ) -> Self {
        Self {
            engine,
            clock,
            settings,
            settings_path: None,
        }
    }

    /// Enables `reload` from the given settings file.
    #[must_use]
    pub fn with_settings_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_path = Some(path.into());
        self
    }

    /// Handles an IPC request and returns the appropriate response.
    pub fn handle(&self, request: IpcRequest) -> IpcResponse {
        tracing::debug!(?request, "handling request");
        match request {
            IpcRequest::Toggle => self.handle_toggle(),
            IpcRequest::Status => IpcResponse::success("", Some(self.response_data())),
            IpcRequest::Reset => self.handle_reset(),
            IpcRequest::Reload => self.handle_reload(),
        }
    }

    fn handle_toggle(&self) -> IpcResponse {
        let message = match self.engine.toggle(self.clock.now_millis()) {
            TimerPhase::Stopped => "Focus interval started",
            TimerPhase::Running => "Timer stopped",
            TimerPhase::Break => "Break stopped",
        };

        IpcResponse::success(message, Some(self.response_data()))
    }

    fn handle_reset(&self) -> IpcResponse {
        self.engine.reset_completed_count();
        IpcResponse::success("Completed count reset", Some(self.response_data()))
    }

    fn handle_reload(&self) -> IpcResponse {
        let Some(path) = &self.settings_path else {
            return IpcResponse::error("Settings reload is not available");
        };

        match Settings::load(path) {
            Ok(settings) => {
                tracing::info!(?settings, "settings reloaded");
                *self.settings.write().unwrap_or_else(PoisonError::into_inner) = settings;
                IpcResponse::success("Settings reloaded", Some(self.response_data()))
            }
            Err(e) => IpcResponse::error(e.to_string()),
        }
    }

    fn response_data(&self) -> ResponseData {
        let show_elapsed_time = self
            .settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .show_elapsed_time;
        ResponseData::from_timer_state(
            &self.engine.snapshot(),
            self.engine.was_manually_stopped(),
            show_elapsed_time,
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
