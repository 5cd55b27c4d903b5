//! Display utilities for the pomotick CLI.
//!
//! This module provides formatted output for:
//! - Success messages
//! - Error messages
//! - Status display

use crate::types::{IpcResponse, ResponseData, TimerPhase};

// ============================================================================
// Display
// ============================================================================

/// Display utilities for CLI output.
pub struct Display;

impl Display {
    /// Shows the outcome of a toggle.
    pub fn show_toggle_success(response: &IpcResponse) {
        println!("* {}", response.message);

        if let Some(data) = &response.data {
            if data.phase.is_active() {
                println!("  {}", Self::time_line(data));
            }
        }
    }

    /// Shows the current timer status.
    pub fn show_status(response: &IpcResponse) {
        for line in Self::status_lines(response.data.as_ref()) {
            println!("{}", line);
        }
    }

    /// Shows a success message for a counter reset.
    pub fn show_reset_success(response: &IpcResponse) {
        println!("* {}", response.message);
    }

    /// Shows a success message for a settings reload.
    pub fn show_reload_success(response: &IpcResponse) {
        println!("* {}", response.message);
    }

    /// Shows an error message.
    pub fn show_error(message: &str) {
        eprintln!("Error: {}", message);
    }

    /// Builds the lines printed by `show_status`.
    fn status_lines(data: Option<&ResponseData>) -> Vec<String> {
        let mut lines = vec![
            "pomotick status".to_string(),
            "─────────────────────────────".to_string(),
        ];

        let Some(data) = data else {
            lines.push("No timer data available".to_string());
            return lines;
        };

        let phase = match data.phase {
            TimerPhase::Stopped if data.manually_stopped => "Stopped (manually)",
            TimerPhase::Stopped => "Stopped",
            TimerPhase::Running => "Focusing",
            TimerPhase::Break => "On break",
        };
        lines.push(format!("Phase: {}", phase));

        if data.phase.is_active() {
            lines.push(Self::time_line(data));
        }
        lines.push(format!("Completed: {}", data.completed_count));
        lines.push(format!(
            "Run `pomotick toggle` to {}",
            data.next_action()
        ));
        lines
    }

    /// Remaining or elapsed time, depending on the daemon's display setting.
    fn time_line(data: &ResponseData) -> String {
        if data.show_elapsed_time {
            let (minutes, seconds) = Self::format_time(data.progress_seconds);
            format!("Elapsed: {}:{:02}", minutes, seconds)
        } else {
            let (minutes, seconds) = Self::format_time(data.time_left_seconds);
            format!("Time left: {}:{:02}", minutes, seconds)
        }
    }

    /// Formats seconds as (minutes, seconds). Negative input counts as zero.
    fn format_time(total_seconds: i64) -> (i64, i64) {
        let total_seconds = total_seconds.max(0);
        (total_seconds / 60, total_seconds % 60)
    }
}

// ============================================================================
// Tests
// ============================================================================
