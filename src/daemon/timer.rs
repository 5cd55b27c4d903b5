//! Timer engine for the Pomodoro timer.
//!
//! This module provides the state machine that owns the [`TimerState`]:
//! - Phase transitions (Stopped → Running → Break → Stopped)
//! - Progress tracking against the current phase length
//! - Startup reconciliation after downtime
//! - Listener fan-out after every observable change
//!
//! Time is never read internally. Every operation takes `now` in epoch
//! milliseconds, so the engine is deterministic under test.

use std::any::Any;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::settings::SettingsSource;
use crate::types::{TimerPhase, TimerState, MILLIS_PER_SECOND, NO_START_TIME};

use super::listeners::ListenerRegistry;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// EngineState
// ============================================================================

/// Record plus the non-persisted stop flag.
#[derive(Debug)]
struct EngineState {
    record: TimerState,
    was_manually_stopped: bool,
}

impl EngineState {
    fn phase_length(&self, settings: &dyn SettingsSource) -> i64 {
        match self.record.phase {
            TimerPhase::Running => settings.focus_length_millis(),
            TimerPhase::Break => settings.break_length_millis(),
            TimerPhase::Stopped => 0,
        }
    }

    fn elapsed(&self, now: i64) -> i64 {
        now.saturating_sub(self.record.start_time)
            .min(self.record.progress_max)
            .max(0)
    }

    fn boundary_reached(&self, now: i64) -> bool {
        now >= self.record.start_time.saturating_add(self.record.progress_max)
    }

    fn enter_phase(&mut self, phase: TimerPhase, now: i64, settings: &dyn SettingsSource) {
        self.record.phase = phase;
        self.record.start_time = now;
        self.record.progress_max = self.phase_length(settings);
        self.record.progress = self.elapsed(now);
    }

    fn enter_stopped(&mut self) {
        self.record.phase = TimerPhase::Stopped;
        self.record.start_time = NO_START_TIME;
        self.record.progress = 0;
        self.record.progress_max = 0;
    }

    /// Applies the tick rules. Returns false for the steady stopped state.
    fn advance(&mut self, now: i64, settings: &dyn SettingsSource) -> bool {
        match self.record.phase {
            TimerPhase::Running => {
                self.record.progress = self.elapsed(now);
                if self.boundary_reached(now) {
                    self.enter_phase(TimerPhase::Break, now, settings);
                    self.record.completed_count += 1;
                    info!(
                        completed = self.record.completed_count,
                        "focus interval completed, break started"
                    );
                }
            }
            TimerPhase::Break => {
                self.record.progress = self.elapsed(now);
                if self.boundary_reached(now) {
                    self.enter_stopped();
                    self.was_manually_stopped = false;
                    info!("break completed");
                }
            }
            TimerPhase::Stopped => {
                if self.record.last_phase == TimerPhase::Stopped {
                    return false;
                }
            }
        }

        self.record.last_update_time = now;
        true
    }
}

// ============================================================================
// TimerEngine
// ============================================================================

/// The single authoritative Pomodoro state machine.
///
/// All mutating operations are serialized by one transition lock that is held
/// across both the state change and the listener fan-out, so listeners always
/// see a complete post-transition state and never run concurrently with
/// another transition. Listeners may call the read-only queries
/// ([`snapshot`](Self::snapshot), [`was_manually_stopped`](Self::was_manually_stopped),
/// ...) but must not call a mutating operation, which would deadlock.
pub struct TimerEngine {
    settings: Arc<dyn SettingsSource>,
    transition: Mutex<()>,
    state: Mutex<EngineState>,
    listeners: Mutex<ListenerRegistry>,
}

impl TimerEngine {
    /// Creates an engine over a freshly created or freshly loaded record.
    ///
    /// The phase length is recomputed from the current settings and progress
    /// starts at that length; the next tick brings it back in line with the
    /// clock.
    pub fn new(settings: Arc<dyn SettingsSource>, record: TimerState) -> Self {
        let mut state = EngineState {
            record,
            was_manually_stopped: false,
        };
        state.record.progress_max = state.phase_length(settings.as_ref());
        state.record.progress = state.record.progress_max;

        Self {
            settings,
            transition: Mutex::new(()),
            state: Mutex::new(state),
            listeners: Mutex::new(ListenerRegistry::new()),
        }
    }

    /// Reconciles the record after the process was unavailable.
    ///
    /// An active timer whose last tick is older than the resume timeout is
    /// treated as stopped. Listeners are not notified. Returns true if the
    /// timer was reset.
    pub fn on_process_resume(&self, now: i64) -> bool {
        let _serial = lock(&self.transition);
        let mut state = lock(&self.state);

        if state.record.phase == TimerPhase::Stopped {
            return false;
        }

        let downtime = now.saturating_sub(state.record.last_update_time);
        if downtime <= self.settings.resume_timeout_millis() {
            debug!(downtime, phase = %state.record.phase, "resuming timer");
            return false;
        }

        info!(
            downtime,
            phase = %state.record.phase,
            "timer abandoned during downtime, stopping"
        );
        state.enter_stopped();
        state.record.last_phase = TimerPhase::Stopped;
        true
    }

    /// Advances to the next phase on user request.
    ///
    /// Stopped starts a focus interval; Running and Break stop the timer and
    /// mark it as manually stopped. The tick rules then run at `now`.
    /// Returns the phase the toggle acted on.
    pub fn toggle(&self, now: i64) -> TimerPhase {
        let _serial = lock(&self.transition);
        let prior = {
            let mut state = lock(&self.state);
            let prior = state.record.phase;
            match prior {
                TimerPhase::Stopped => {
                    state.enter_phase(TimerPhase::Running, now, self.settings.as_ref());
                    debug!(start_time = now, "focus interval started");
                }
                TimerPhase::Running | TimerPhase::Break => {
                    debug!(phase = %state.record.phase, "stopped by user");
                    state.enter_stopped();
                    state.was_manually_stopped = true;
                }
            }
            prior
        };
        self.step(now);
        prior
    }

    /// Advances the timer to `now`.
    ///
    /// Crossing the end of a focus interval starts a break; crossing the end
    /// of a break stops the timer. Once stopped and already reported, ticks
    /// are no-ops and do not notify.
    pub fn tick(&self, now: i64) {
        let _serial = lock(&self.transition);
        self.step(now);
    }

    /// Zeroes the completed interval counter without touching the phase.
    pub fn reset_completed_count(&self) {
        let _serial = lock(&self.transition);
        lock(&self.state).record.completed_count = 0;
        self.notify();
    }

    /// Replaces the whole record, as when a store reloads a saved copy.
    pub fn load_state(&self, record: &TimerState) {
        let _serial = lock(&self.transition);
        lock(&self.state).record.copy_from(record);
    }

    /// Tick body. The transition lock must be held.
    fn step(&self, now: i64) {
        let changed = lock(&self.state).advance(now, self.settings.as_ref());
        if !changed {
            return;
        }

        self.notify();

        let mut state = lock(&self.state);
        state.record.last_phase = state.record.phase;
    }

    /// Invokes live listeners in registration order. The transition lock
    /// must be held; the registry and state locks are not.
    fn notify(&self) {
        let callbacks = lock(&self.listeners).live_callbacks();
        for callback in callbacks {
            callback();
        }
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Returns a copy of the current record.
    pub fn snapshot(&self) -> TimerState {
        lock(&self.state).record.clone()
    }

    /// Current phase.
    pub fn phase(&self) -> TimerPhase {
        lock(&self.state).record.phase
    }

    /// Completed focus intervals.
    pub fn completed_count(&self) -> u32 {
        lock(&self.state).record.completed_count
    }

    /// Length of the current phase in whole seconds, truncated.
    pub fn progress_max_seconds(&self) -> i64 {
        lock(&self.state).record.progress_max / MILLIS_PER_SECOND
    }

    /// Elapsed whole seconds in the current phase, truncated.
    pub fn progress_seconds(&self) -> i64 {
        lock(&self.state).record.progress / MILLIS_PER_SECOND
    }

    /// Millis left in the current phase as of the last tick.
    pub fn time_left_millis(&self) -> i64 {
        lock(&self.state).record.time_left()
    }

    /// True if the last stop was user initiated, false if a break ran out.
    pub fn was_manually_stopped(&self) -> bool {
        lock(&self.state).was_manually_stopped
    }

    // ------------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------------

    /// Registers `callback` under `key`, replacing any callback already
    /// registered under it.
    ///
    /// The engine holds `key` weakly; dropping the last `Arc` to it
    /// unregisters the callback.
    pub fn add_listener<K, F>(&self, key: &Arc<K>, callback: F)
    where
        K: Any + Send + Sync,
        F: Fn() + Send + Sync + 'static,
    {
        lock(&self.listeners).insert(key, Arc::new(callback));
    }

    /// Unregisters the callback under `key`. Returns true if one was removed.
    pub fn remove_listener<K>(&self, key: &Arc<K>) -> bool
    where
        K: Any + Send + Sync,
    {
        lock(&self.listeners).remove(key)
    }

    /// Number of live listeners.
    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }
}

impl std::fmt::Debug for TimerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerEngine")
            .field("state", &*lock(&self.state))
            .field("listeners", &*lock(&self.listeners))
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use crate::settings::Settings;

    const T0: i64 = 1_700_000_000_000;
    const FOCUS: i64 = 1_500_000;
    const BREAK: i64 = 300_000;
    const RESUME_TIMEOUT: i64 = 600_000;

    fn settings() -> Settings {
        Settings {
            focus_length_millis: FOCUS,
            break_length_millis: BREAK,
            resume_timeout_millis: RESUME_TIMEOUT,
            show_elapsed_time: false,
        }
    }

    fn create_engine() -> TimerEngine {
        TimerEngine::new(Arc::new(settings()), TimerState::new())
    }

    fn counting_listener(engine: &TimerEngine) -> (Arc<&'static str>, Arc<AtomicUsize>) {
        let key = Arc::new("listener");
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        engine.add_listener(&key, move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (key, count)
    }

    fn assert_invariants(state: &TimerState) {
        assert!(state.progress >= 0 && state.progress <= state.progress_max);
        let expected_max = match state.phase {
            TimerPhase::Stopped => 0,
            TimerPhase::Running => FOCUS,
            TimerPhase::Break => BREAK,
        };
        assert_eq!(state.progress_max, expected_max);
    }

    // ------------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------------

    mod construction_tests {
        use super::*;

        #[test]
        fn test_new_engine_is_stopped() {
            let engine = create_engine();
            let state = engine.snapshot();

            assert_eq!(state.phase, TimerPhase::Stopped);
            assert_eq!(state.progress, 0);
            assert_eq!(state.progress_max, 0);
            assert_eq!(state.completed_count, 0);
            assert!(!engine.was_manually_stopped());
        }

        #[test]
        fn test_loaded_running_record_gets_current_focus_length() {
            let record = TimerState {
                phase: TimerPhase::Running,
                last_phase: TimerPhase::Running,
                start_time: T0,
                last_update_time: T0 + 1000,
                completed_count: 2,
                progress: 7,
                progress_max: 42,
            };
            let engine = TimerEngine::new(Arc::new(settings()), record);
            let state = engine.snapshot();

            assert_eq!(state.progress_max, FOCUS);
            assert_eq!(state.progress, FOCUS);
            assert_eq!(state.completed_count, 2);

            engine.tick(T0 + 60_000);
            assert_eq!(engine.snapshot().progress, 60_000);
        }
    }

    // ------------------------------------------------------------------------
    // Toggle
    // ------------------------------------------------------------------------

    mod toggle_tests {
        use super::*;

        #[test]
        fn test_toggle_from_stopped_starts_focus() {
            let engine = create_engine();
            engine.toggle(T0);

            let state = engine.snapshot();
            assert_eq!(state.phase, TimerPhase::Running);
            assert_eq!(state.last_phase, TimerPhase::Running);
            assert_eq!(state.start_time, T0);
            assert_eq!(state.progress, 0);
            assert_eq!(state.progress_max, FOCUS);
            assert_eq!(state.last_update_time, T0);
            assert_eq!(engine.progress_max_seconds(), 1500);
        }

        #[test]
        fn test_toggle_returns_the_phase_it_acted_on() {
            let engine = create_engine();
            assert_eq!(engine.toggle(T0), TimerPhase::Stopped);
            engine.tick(T0 + FOCUS);
            assert_eq!(engine.toggle(T0 + FOCUS + 1000), TimerPhase::Break);
            engine.toggle(T0 + FOCUS + 2000);
            assert_eq!(engine.toggle(T0 + FOCUS + 3000), TimerPhase::Running);
        }

        #[test]
        fn test_toggle_while_running_stops_manually() {
            let engine = create_engine();
            engine.toggle(T0);
            engine.tick(T0 + 90_000);
            engine.toggle(T0 + 95_000);

            let state = engine.snapshot();
            assert_eq!(state.phase, TimerPhase::Stopped);
            assert_eq!(state.last_phase, TimerPhase::Stopped);
            assert_eq!(state.progress, 0);
            assert_eq!(state.progress_max, 0);
            assert_eq!(state.start_time, NO_START_TIME);
            assert_eq!(state.completed_count, 0);
            assert!(engine.was_manually_stopped());
        }

        #[test]
        fn test_restart_after_manual_stop_matches_fresh_start() {
            let engine = create_engine();
            engine.toggle(T0);
            engine.toggle(T0 + 10_000);

            let fresh = create_engine();
            engine.toggle(T0 + 20_000);
            fresh.toggle(T0 + 20_000);

            let restarted = engine.snapshot();
            let expected = fresh.snapshot();
            assert_eq!(restarted.phase, expected.phase);
            assert_eq!(restarted.progress, expected.progress);
            assert_eq!(restarted.progress_max, expected.progress_max);
            assert_eq!(restarted.start_time, expected.start_time);
        }

        #[test]
        fn test_toggle_during_break_stops_manually() {
            let engine = create_engine();
            engine.toggle(T0);
            engine.tick(T0 + FOCUS);
            assert_eq!(engine.phase(), TimerPhase::Break);

            engine.toggle(T0 + FOCUS + 1000);

            assert_eq!(engine.phase(), TimerPhase::Stopped);
            assert!(engine.was_manually_stopped());
            assert_eq!(engine.completed_count(), 1);
        }

        #[test]
        fn test_each_toggle_notifies_once() {
            let engine = create_engine();
            let (_key, count) = counting_listener(&engine);

            engine.toggle(T0);
            assert_eq!(count.load(Ordering::SeqCst), 1);

            engine.toggle(T0 + 1000);
            assert_eq!(count.load(Ordering::SeqCst), 2);
        }
    }

    // ------------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------------

    mod tick_tests {
        use super::*;

        #[test]
        fn test_tick_updates_progress() {
            let engine = create_engine();
            engine.toggle(T0);
            engine.tick(T0 + 61_500);

            assert_eq!(engine.snapshot().progress, 61_500);
            assert_eq!(engine.progress_seconds(), 61);
            assert_eq!(engine.time_left_millis(), FOCUS - 61_500);
            assert_eq!(engine.phase(), TimerPhase::Running);
        }

        #[test]
        fn test_full_focus_interval_starts_break() {
            let engine = create_engine();
            engine.toggle(T0);
            engine.tick(T0 + FOCUS - 1);
            assert_eq!(engine.phase(), TimerPhase::Running);

            engine.tick(T0 + FOCUS);

            let state = engine.snapshot();
            assert_eq!(state.phase, TimerPhase::Break);
            assert_eq!(state.completed_count, 1);
            assert_eq!(state.progress_max, BREAK);
            assert_eq!(state.start_time, T0 + FOCUS);
            assert_eq!(state.progress, 0);
        }

        #[test]
        fn test_break_completion_stops_automatically() {
            let engine = create_engine();
            engine.toggle(T0);
            engine.tick(T0 + FOCUS);
            let break_start = T0 + FOCUS;

            engine.tick(break_start + 120_000);
            assert_eq!(engine.phase(), TimerPhase::Break);
            assert_eq!(engine.snapshot().progress, 120_000);

            engine.tick(break_start + BREAK);

            let state = engine.snapshot();
            assert_eq!(state.phase, TimerPhase::Stopped);
            assert_eq!(state.completed_count, 1);
            assert!(!engine.was_manually_stopped());
        }

        #[test]
        fn test_auto_stop_overwrites_manual_flag() {
            let engine = create_engine();
            engine.toggle(T0);
            engine.toggle(T0 + 1000);
            assert!(engine.was_manually_stopped());

            engine.toggle(T0 + 2000);
            engine.tick(T0 + 2000 + FOCUS);
            // Flag is sticky until the next stop.
            assert!(engine.was_manually_stopped());

            engine.tick(T0 + 2000 + FOCUS + BREAK);
            assert!(!engine.was_manually_stopped());
        }

        #[test]
        fn test_break_is_counted_once() {
            let engine = create_engine();
            engine.toggle(T0);
            for step in 0..10 {
                engine.tick(T0 + FOCUS + step * 1000);
            }
            assert_eq!(engine.completed_count(), 1);
            assert_eq!(engine.phase(), TimerPhase::Break);
        }

        #[test]
        fn test_stopped_steady_state_is_noop() {
            let engine = create_engine();
            let (_key, count) = counting_listener(&engine);
            let before = engine.snapshot();

            engine.tick(T0);
            engine.tick(T0 + 1000);
            engine.tick(T0 + 50_000);

            assert_eq!(engine.snapshot(), before);
            assert_eq!(count.load(Ordering::SeqCst), 0);
        }

        #[test]
        fn test_stop_is_reported_exactly_once() {
            let engine = create_engine();
            engine.toggle(T0);
            engine.tick(T0 + FOCUS);
            let (_key, count) = counting_listener(&engine);

            engine.tick(T0 + FOCUS + BREAK);
            assert_eq!(count.load(Ordering::SeqCst), 1);
            let stopped = engine.snapshot();

            engine.tick(T0 + FOCUS + BREAK + 1000);
            engine.tick(T0 + FOCUS + BREAK + 2000);
            assert_eq!(count.load(Ordering::SeqCst), 1);
            assert_eq!(engine.snapshot(), stopped);
        }

        #[test]
        fn test_clock_going_backwards_clamps_progress() {
            let engine = create_engine();
            engine.toggle(T0);
            engine.tick(T0 + 30_000);
            engine.tick(T0 - 5_000);

            let state = engine.snapshot();
            assert_eq!(state.phase, TimerPhase::Running);
            assert_eq!(state.progress, 0);

            engine.tick(T0 + 40_000);
            assert_eq!(engine.snapshot().progress, 40_000);
        }

        #[test]
        fn test_large_forward_jump_lands_in_break() {
            let engine = create_engine();
            engine.toggle(T0);
            engine.tick(T0 + 10 * FOCUS);

            let state = engine.snapshot();
            assert_eq!(state.phase, TimerPhase::Break);
            assert_eq!(state.start_time, T0 + 10 * FOCUS);
            assert_eq!(state.completed_count, 1);
        }

        #[test]
        fn test_invariants_hold_over_a_full_cycle() {
            let engine = create_engine();
            engine.toggle(T0);
            let mut now = T0;
            while now <= T0 + FOCUS + BREAK + 2 * 7_000 {
                engine.tick(now);
                assert_invariants(&engine.snapshot());
                now += 7_000;
            }
            assert_eq!(engine.phase(), TimerPhase::Stopped);
        }

        #[test]
        fn test_listener_sees_previous_phase_during_fan_out() {
            let engine = Arc::new(create_engine());
            let key = Arc::new(());
            let seen = Arc::new(Mutex::new(Vec::new()));

            let weak_engine = Arc::downgrade(&engine);
            let s = Arc::clone(&seen);
            engine.add_listener(&key, move || {
                if let Some(engine) = weak_engine.upgrade() {
                    let state = engine.snapshot();
                    s.lock().unwrap().push((state.last_phase, state.phase));
                }
            });

            engine.toggle(T0);
            engine.tick(T0 + FOCUS);

            assert_eq!(
                *seen.lock().unwrap(),
                vec![
                    (TimerPhase::Stopped, TimerPhase::Running),
                    (TimerPhase::Running, TimerPhase::Break),
                ]
            );
        }
    }

    // ------------------------------------------------------------------------
    // Startup reconciliation
    // ------------------------------------------------------------------------

    mod resume_tests {
        use super::*;

        fn running_record(last_update_time: i64) -> TimerState {
            TimerState {
                phase: TimerPhase::Running,
                last_phase: TimerPhase::Running,
                start_time: last_update_time - 60_000,
                last_update_time,
                completed_count: 3,
                progress: 60_000,
                progress_max: FOCUS,
            }
        }

        #[test]
        fn test_stale_timer_is_stopped_without_notification() {
            let engine = TimerEngine::new(Arc::new(settings()), running_record(T0));
            let (_key, count) = counting_listener(&engine);

            assert!(engine.on_process_resume(T0 + 700_000));

            let state = engine.snapshot();
            assert_eq!(state.phase, TimerPhase::Stopped);
            assert_eq!(state.last_phase, TimerPhase::Stopped);
            assert_eq!(state.progress, 0);
            assert_eq!(state.start_time, NO_START_TIME);
            assert_eq!(state.completed_count, 3);
            assert_eq!(count.load(Ordering::SeqCst), 0);

            engine.tick(T0 + 701_000);
            assert_eq!(count.load(Ordering::SeqCst), 0);
        }

        #[test]
        fn test_recent_timer_resumes() {
            let engine = TimerEngine::new(Arc::new(settings()), running_record(T0));

            assert!(!engine.on_process_resume(T0 + RESUME_TIMEOUT));
            assert_eq!(engine.phase(), TimerPhase::Running);

            engine.tick(T0 + RESUME_TIMEOUT);
            assert_eq!(engine.snapshot().progress, 60_000 + RESUME_TIMEOUT);
        }

        #[test]
        fn test_resumed_timer_past_its_end_moves_to_break() {
            let mut record = running_record(T0);
            record.start_time = T0 - FOCUS + 1000;
            let engine = TimerEngine::new(Arc::new(settings()), record);

            assert!(!engine.on_process_resume(T0 + 5_000));
            engine.tick(T0 + 5_000);

            assert_eq!(engine.phase(), TimerPhase::Break);
            assert_eq!(engine.completed_count(), 4);
        }

        #[test]
        fn test_arbitrarily_old_record_is_stopped() {
            let record = TimerState {
                phase: TimerPhase::Running,
                last_phase: TimerPhase::Running,
                start_time: i64::MIN,
                last_update_time: i64::MIN,
                completed_count: 2,
                progress: 0,
                progress_max: FOCUS,
            };
            let engine = TimerEngine::new(Arc::new(settings()), record);

            assert!(engine.on_process_resume(T0));
            assert_eq!(engine.phase(), TimerPhase::Stopped);
            assert_eq!(engine.completed_count(), 2);
        }

        #[test]
        fn test_extreme_start_time_ticks_without_overflow() {
            let mut record = running_record(T0);
            record.start_time = i64::MIN;
            let engine = TimerEngine::new(Arc::new(settings()), record);

            engine.tick(T0);
            let state = engine.snapshot();
            assert_eq!(state.phase, TimerPhase::Break);
            assert_eq!(state.start_time, T0);
            assert_eq!(state.progress, 0);

            let mut record = running_record(T0);
            record.start_time = i64::MAX;
            let engine = TimerEngine::new(Arc::new(settings()), record);

            engine.tick(T0);
            let state = engine.snapshot();
            assert_eq!(state.phase, TimerPhase::Running);
            assert_eq!(state.progress, 0);
        }

        #[test]
        fn test_stopped_timer_is_untouched() {
            let engine = create_engine();
            let before = engine.snapshot();

            assert!(!engine.on_process_resume(T0 + 10 * RESUME_TIMEOUT));
            assert_eq!(engine.snapshot(), before);
        }
    }

    // ------------------------------------------------------------------------
    // Administrative operations
    // ------------------------------------------------------------------------

    mod admin_tests {
        use super::*;

        #[test]
        fn test_reset_completed_count_keeps_phase_and_progress() {
            let engine = create_engine();
            engine.toggle(T0);
            engine.tick(T0 + FOCUS);
            engine.tick(T0 + FOCUS + 30_000);
            let before = engine.snapshot();

            engine.reset_completed_count();

            let after = engine.snapshot();
            assert_eq!(after.completed_count, 0);
            assert_eq!(after.phase, before.phase);
            assert_eq!(after.progress, before.progress);
            assert_eq!(after.progress_max, before.progress_max);
        }

        #[test]
        fn test_progress_max_seconds_truncates() {
            let settings = Settings {
                focus_length_millis: 90_999,
                ..settings()
            };
            let engine = TimerEngine::new(Arc::new(settings), TimerState::new());
            engine.toggle(T0);
            assert_eq!(engine.progress_max_seconds(), 90);
        }

        #[test]
        fn test_load_state_copies_record() {
            let engine = create_engine();
            let saved = TimerState {
                phase: TimerPhase::Break,
                last_phase: TimerPhase::Break,
                start_time: T0,
                last_update_time: T0 + 1000,
                completed_count: 9,
                progress: 1000,
                progress_max: BREAK,
            };

            engine.load_state(&saved);
            assert_eq!(engine.snapshot(), saved);
        }

        #[test]
        fn test_settings_are_read_at_phase_start() {
            let shared = Arc::new(std::sync::RwLock::new(settings()));
            let source: Arc<dyn SettingsSource> = shared.clone();
            let engine = TimerEngine::new(source, TimerState::new());

            engine.toggle(T0);
            shared.write().unwrap().focus_length_millis = 60_000;
            engine.tick(T0 + 60_000);
            assert_eq!(engine.phase(), TimerPhase::Running);

            engine.toggle(T0 + 61_000);
            engine.toggle(T0 + 62_000);
            assert_eq!(engine.snapshot().progress_max, 60_000);
        }
    }

    // ------------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------------

    mod listener_tests {
        use super::*;

        #[test]
        fn test_two_listeners_each_notified_once() {
            let engine = create_engine();
            let (key_a, count_a) = counting_listener(&engine);
            let key_b = Arc::new(String::from("b"));
            let count_b = Arc::new(AtomicUsize::new(0));
            let c = Arc::clone(&count_b);
            engine.add_listener(&key_b, move || {
                c.fetch_add(1, Ordering::SeqCst);
            });

            engine.toggle(T0);
            assert_eq!(count_a.load(Ordering::SeqCst), 1);
            assert_eq!(count_b.load(Ordering::SeqCst), 1);

            assert!(engine.remove_listener(&key_a));
            engine.tick(T0 + 1000);
            assert_eq!(count_a.load(Ordering::SeqCst), 1);
            assert_eq!(count_b.load(Ordering::SeqCst), 2);
        }

        #[test]
        fn test_dropped_key_unregisters() {
            let engine = create_engine();
            let (key, count) = counting_listener(&engine);
            assert_eq!(engine.listener_count(), 1);

            drop(key);
            engine.toggle(T0);

            assert_eq!(count.load(Ordering::SeqCst), 0);
            assert_eq!(engine.listener_count(), 0);
        }

        #[test]
        fn test_re_adding_key_replaces_callback() {
            let engine = create_engine();
            let (key, first) = counting_listener(&engine);
            let second = Arc::new(AtomicUsize::new(0));
            let c = Arc::clone(&second);
            engine.add_listener(&key, move || {
                c.fetch_add(1, Ordering::SeqCst);
            });

            engine.toggle(T0);

            assert_eq!(first.load(Ordering::SeqCst), 0);
            assert_eq!(second.load(Ordering::SeqCst), 1);
            assert_eq!(engine.listener_count(), 1);
        }

        #[test]
        fn test_reset_notifies() {
            let engine = create_engine();
            let (_key, count) = counting_listener(&engine);
            engine.reset_completed_count();
            assert_eq!(count.load(Ordering::SeqCst), 1);
        }
    }

    // ------------------------------------------------------------------------
    // Concurrency
    // ------------------------------------------------------------------------

    mod concurrency_tests {
        use super::*;

        #[test]
        fn test_listeners_never_overlap_transitions() {
            let engine = Arc::new(create_engine());
            let key = Arc::new(());
            let in_listener = Arc::new(AtomicBool::new(false));
            let overlaps = Arc::new(AtomicUsize::new(0));

            let flag = Arc::clone(&in_listener);
            let o = Arc::clone(&overlaps);
            let weak_engine = Arc::downgrade(&engine);
            engine.add_listener(&key, move || {
                if flag.swap(true, Ordering::SeqCst) {
                    o.fetch_add(1, Ordering::SeqCst);
                }
                if let Some(engine) = weak_engine.upgrade() {
                    assert_invariants(&engine.snapshot());
                }
                flag.store(false, Ordering::SeqCst);
            });

            let handles: Vec<_> = (0..4)
                .map(|worker| {
                    let engine = Arc::clone(&engine);
                    std::thread::spawn(move || {
                        for i in 0..200 {
                            let now = T0 + i * 10_000;
                            if worker == 0 && i % 25 == 0 {
                                engine.toggle(now);
                            } else {
                                engine.tick(now);
                            }
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            assert_eq!(overlaps.load(Ordering::SeqCst), 0);
            assert_invariants(&engine.snapshot());
        }
    }
}
