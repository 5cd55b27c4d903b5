//! pomotick library
//!
//! A Pomodoro timer that alternates focus intervals and breaks. It includes:
//! - Timer engine with phase transitions, progress, and change listeners
//! - Daemon that ticks the engine, persists its record, and serves IPC
//! - IPC client, CLI command parsing, and display utilities
//! - Settings and data directory handling

pub mod cli;
pub mod daemon;
pub mod paths;
pub mod settings;
pub mod types;

// Re-export commonly used types for convenience
pub use daemon::{Clock, MockClock, SystemClock, TimerEngine};
pub use paths::AppPaths;
pub use settings::{Settings, SettingsError, SettingsSource};
pub use types::{IpcRequest, IpcResponse, ResponseData, TimerPhase, TimerState};
