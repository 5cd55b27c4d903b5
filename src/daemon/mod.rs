//! Daemon module for the Pomodoro timer.
//!
//! This module contains the core daemon functionality:
//! - `timer`: Timer engine with state transitions and progress logic
//! - `listeners`: Weakly keyed listener registry used by the engine
//! - `clock`: Time sources
//! - `ticker`: Periodic driver for the engine
//! - `store`: JSON persistence of the timer record
//! - `ipc`: Unix socket server and request dispatch
//! - `runner`: Daemon startup, serving, and shutdown

pub mod clock;
pub mod ipc;
pub mod listeners;
pub mod runner;
pub mod store;
pub mod ticker;
pub mod timer;

pub use clock::{Clock, MockClock, SystemClock};
pub use listeners::{Listener, ListenerRegistry};
pub use runner::{run_daemon, Daemon};
pub use store::{StateStore, StoreError};
pub use ticker::Ticker;
pub use timer::TimerEngine;
