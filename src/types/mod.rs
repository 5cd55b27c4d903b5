//! Core data types for the Pomodoro timer.
//!
//! This module defines the data structures used for:
//! - The persisted timer record
//! - IPC request/response serialization

use serde::{Deserialize, Serialize};

/// Start time recorded while no phase period is in progress.
pub const NO_START_TIME: i64 = -1;

/// Milliseconds per displayed progress unit.
pub const MILLIS_PER_SECOND: i64 = 1000;

// ============================================================================
// TimerPhase
// ============================================================================

/// Represents the current phase of the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerPhase {
    /// Timer was not started, or was stopped during a focus interval or break
    #[default]
    Stopped,
    /// Focus interval in progress
    Running,
    /// Break in progress. Only reachable by completing a focus interval.
    Break,
}

impl TimerPhase {
    /// Returns the string representation of the phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerPhase::Stopped => "stopped",
            TimerPhase::Running => "running",
            TimerPhase::Break => "break",
        }
    }

    /// Returns true if a phase period is counting.
    pub fn is_active(&self) -> bool {
        matches!(self, TimerPhase::Running | TimerPhase::Break)
    }

    /// Returns the label of what a toggle does from this phase.
    pub fn next_action(&self) -> &'static str {
        match self {
            TimerPhase::Stopped => "start",
            TimerPhase::Running => "stop",
            TimerPhase::Break => "stop break",
        }
    }
}

impl std::fmt::Display for TimerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// TimerState
// ============================================================================

/// Persisted timer record.
///
/// A flat value holder: every mutation goes through
/// [`TimerEngine`](crate::daemon::TimerEngine). Stores copy it whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerState {
    /// Current phase
    pub phase: TimerPhase,
    /// Phase as of the last processed tick
    pub last_phase: TimerPhase,
    /// Epoch millis at which the current phase period began
    pub start_time: i64,
    /// Epoch millis of the last processed tick
    pub last_update_time: i64,
    /// Number of completed focus intervals
    pub completed_count: u32,
    /// Elapsed millis within the current phase, capped at `progress_max`
    pub progress: i64,
    /// Duration in millis of the current phase
    pub progress_max: i64,
}

impl Default for TimerState {
    fn default() -> Self {
        Self {
            phase: TimerPhase::Stopped,
            last_phase: TimerPhase::Stopped,
            start_time: 0,
            last_update_time: 0,
            completed_count: 0,
            progress: 0,
            progress_max: 0,
        }
    }
}

impl TimerState {
    /// Creates a stopped record with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining millis in the current phase.
    pub fn time_left(&self) -> i64 {
        self.progress_max - self.progress
    }

    /// Copies every field of `other` into this record.
    pub fn copy_from(&mut self, other: &TimerState) {
        *self = other.clone();
    }
}

// ============================================================================
// IPC Types
// ============================================================================

/// IPC request from client to daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum IpcRequest {
    /// Advance to the next phase (start, stop, or stop break)
    Toggle,
    /// Query the current status
    Status,
    /// Reset the completed interval counter
    Reset,
    /// Re-read the settings file
    Reload,
}

/// Response data for IPC responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseData {
    /// Current phase
    pub phase: TimerPhase,
    /// Elapsed whole seconds in the current phase
    #[serde(rename = "progressSeconds")]
    pub progress_seconds: i64,
    /// Length of the current phase in whole seconds
    #[serde(rename = "progressMaxSeconds")]
    pub progress_max_seconds: i64,
    /// Whole seconds left in the current phase
    #[serde(rename = "timeLeftSeconds")]
    pub time_left_seconds: i64,
    /// Completed focus intervals
    #[serde(rename = "completedCount")]
    pub completed_count: u32,
    /// Whether the last stop was user initiated
    #[serde(rename = "manuallyStopped")]
    pub manually_stopped: bool,
    /// Whether displays should show elapsed rather than remaining time
    #[serde(rename = "showElapsedTime", default)]
    pub show_elapsed_time: bool,
}

impl ResponseData {
    /// Creates response data from a timer record.
    pub fn from_timer_state(
        state: &TimerState,
        manually_stopped: bool,
        show_elapsed_time: bool,
    ) -> Self {
        Self {
            phase: state.phase,
            progress_seconds: state.progress / MILLIS_PER_SECOND,
            progress_max_seconds: state.progress_max / MILLIS_PER_SECOND,
            time_left_seconds: state.time_left() / MILLIS_PER_SECOND,
            completed_count: state.completed_count,
            manually_stopped,
            show_elapsed_time,
        }
    }

    /// Label of the action the next toggle performs.
    pub fn next_action(&self) -> &'static str {
        self.phase.next_action()
    }
}

/// IPC response from daemon to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcResponse {
    /// Response status ("success" or "error")
    pub status: String,
    /// Human-readable message
    pub message: String,
    /// Optional response data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
}

impl IpcResponse {
    /// Creates a success response.
    pub fn success(message: impl Into<String>, data: Option<ResponseData>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            data,
        }
    }

    /// Creates an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            data: None,
        }
    }

    /// Returns true for a success response.
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

// ============================================================================
// Tests
// ============================================================================
