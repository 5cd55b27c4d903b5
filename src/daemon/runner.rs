//! Daemon lifecycle.
//!
//! Wires the engine to its collaborators: settings and state are loaded from
//! the data directory, the record is reconciled against downtime, and the
//! ticker, autosave loop, and IPC server run until shutdown. The final state
//! is saved on the way out.

use std::future::Future;
use std::sync::{Arc, RwLock, Weak};

use anyhow::{Context, Result};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{watch, Notify};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{info, warn};

use crate::paths::AppPaths;
use crate::settings::{Settings, SettingsSource};
use crate::types::TimerState;

use super::clock::Clock;
use super::ipc::{IpcServer, RequestHandler};
use super::store::{StateStore, StoreError};
use super::ticker::{Ticker, DEFAULT_TICK_PERIOD};
use super::timer::TimerEngine;

/// Default period between background saves.
pub const DEFAULT_AUTOSAVE_PERIOD: Duration = Duration::from_secs(10);

/// Listener key owned by the daemon for its own subscriptions.
struct DaemonSubscriber;

/// A fully wired daemon, ready to serve.
pub struct Daemon {
    engine: Arc<TimerEngine>,
    clock: Arc<dyn Clock>,
    settings: Arc<RwLock<Settings>>,
    store: StateStore,
    paths: AppPaths,
    tick_period: Duration,
    autosave_period: Duration,
    save_requested: Arc<Notify>,
    subscriber: Arc<DaemonSubscriber>,
}

impl Daemon {
    /// Loads settings and state from `paths` and reconciles the record.
    ///
    /// A corrupt state file is logged and replaced by a fresh record.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are invalid or the state file
    /// cannot be read.
    pub fn new(paths: AppPaths, clock: Arc<dyn Clock>) -> Result<Self> {
        let settings = Settings::load(&paths.settings_file()).context("Failed to load settings")?;
        let store = StateStore::new(paths.state_file());

        let record = match store.load() {
            Ok(record) => record,
            Err(e @ StoreError::Corrupt { .. }) => {
                warn!("{}; starting from a stopped timer", e);
                TimerState::default()
            }
            Err(e) => return Err(e).context("Failed to load timer state"),
        };

        let settings = Arc::new(RwLock::new(settings));
        let source: Arc<dyn SettingsSource> = settings.clone();
        let engine = Arc::new(TimerEngine::new(source, record));

        if engine.on_process_resume(clock.now_millis()) {
            info!("previous timer exceeded the resume timeout and was stopped");
        }

        let daemon = Self {
            engine,
            clock,
            settings,
            store,
            paths,
            tick_period: DEFAULT_TICK_PERIOD,
            autosave_period: DEFAULT_AUTOSAVE_PERIOD,
            save_requested: Arc::new(Notify::new()),
            subscriber: Arc::new(DaemonSubscriber),
        };
        daemon.subscribe();
        Ok(daemon)
    }

    /// Overrides the tick and autosave periods.
    #[must_use]
    pub fn with_periods(mut self, tick: Duration, autosave: Duration) -> Self {
        self.tick_period = tick;
        self.autosave_period = autosave;
        self
    }

    /// Shared engine.
    pub fn engine(&self) -> &Arc<TimerEngine> {
        &self.engine
    }

    /// Logs phase changes and asks the autosave loop to persist them.
    fn subscribe(&self) {
        let engine: Weak<TimerEngine> = Arc::downgrade(&self.engine);
        let save_requested = Arc::clone(&self.save_requested);

        self.engine.add_listener(&self.subscriber, move || {
            let Some(engine) = engine.upgrade() else {
                return;
            };
            let state = engine.snapshot();
            if state.last_phase != state.phase {
                info!(
                    from = %state.last_phase,
                    to = %state.phase,
                    completed = state.completed_count,
                    manually = engine.was_manually_stopped(),
                    "phase changed"
                );
                save_requested.notify_one();
            }
        });
    }

    /// Serves until `shutdown` completes, then saves the final state.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound or the final save
    /// fails.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let server = IpcServer::new(&self.paths.socket())?;
        info!(socket = %server.socket_path().display(), "daemon listening");

        let handler = Arc::new(
            RequestHandler::new(
                Arc::clone(&self.engine),
                Arc::clone(&self.clock),
                Arc::clone(&self.settings),
            )
            .with_settings_path(self.paths.settings_file()),
        );

        let (stop_tx, stop_rx) = watch::channel(false);

        let ticker = Ticker::new(Arc::clone(&self.engine), Arc::clone(&self.clock))
            .with_period(self.tick_period);
        let ticker_task = tokio::spawn(ticker.run(stop_rx.clone()));

        let autosave_task = tokio::spawn(autosave(
            Arc::clone(&self.engine),
            self.store.clone(),
            Arc::clone(&self.save_requested),
            self.autosave_period,
            stop_rx.clone(),
        ));

        tokio::select! {
            _ = server.serve(handler, stop_rx) => {}
            _ = shutdown => info!("shutdown requested"),
        }

        let _ = stop_tx.send(true);
        if let Err(e) = ticker_task.await {
            warn!("ticker task failed: {}", e);
        }
        if let Err(e) = autosave_task.await {
            warn!("autosave task failed: {}", e);
        }
        drop(server);

        self.store
            .save(&self.engine.snapshot())
            .context("Failed to save timer state")?;
        info!("daemon stopped");
        Ok(())
    }
}

async fn autosave(
    engine: Arc<TimerEngine>,
    store: StateStore,
    save_requested: Arc<Notify>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = save_requested.notified() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return;
                }
                continue;
            }
        }

        if let Err(e) = store.save(&engine.snapshot()) {
            warn!("autosave failed: {}", e);
        }
    }
}

/// Completes on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            warn!("SIGTERM handler unavailable: {}", e);
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("SIGINT handler unavailable: {}", e);
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Runs the daemon for `paths` until SIGINT or SIGTERM.
///
/// # Errors
///
/// Returns an error if startup or the final save fails.
pub async fn run_daemon(paths: AppPaths, clock: Arc<dyn Clock>) -> Result<()> {
    Daemon::new(paths, clock)?.run(shutdown_signal()).await
}
