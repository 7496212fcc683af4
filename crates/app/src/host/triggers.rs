//! Per-unit scheduled triggers — one-shot timers, repeating tickers, and
//! weekly alarms.
//!
//! Every trigger owns a cancellation token derived from the unit's
//! lifetime token, so destroying the unit stops all of its triggers
//! without separate bookkeeping. Trigger names are unique per unit and
//! per kind; creating a duplicate is rejected synchronously.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use apiary_domain::schedule::{self, DaySet};
use apiary_domain::unit::{CallbackKind, CallbackSet};

use super::Invocation;

struct TriggerHandle {
    serial: u64,
    cancel: CancellationToken,
}

/// The timer/ticker/alarm registries of one unit.
pub struct TriggerSet {
    path: PathBuf,
    cancel: CancellationToken,
    invoke_tx: mpsc::Sender<Invocation>,
    handles: OnceLock<CallbackSet>,
    serial: AtomicU64,
    timers: Mutex<HashMap<String, TriggerHandle>>,
    tickers: Mutex<HashMap<String, TriggerHandle>>,
    alarms: Mutex<HashMap<String, TriggerHandle>>,
}

impl TriggerSet {
    pub(crate) fn new(
        path: PathBuf,
        cancel: CancellationToken,
        invoke_tx: mpsc::Sender<Invocation>,
    ) -> Self {
        Self {
            path,
            cancel,
            invoke_tx,
            handles: OnceLock::new(),
            serial: AtomicU64::new(0),
            timers: Mutex::new(HashMap::new()),
            tickers: Mutex::new(HashMap::new()),
            alarms: Mutex::new(HashMap::new()),
        }
    }

    /// Record which callbacks the unit actually defines. Until this is
    /// called (i.e. while the unit is still initialising) every callback
    /// is assumed resolvable.
    pub(crate) fn set_handles(&self, handles: CallbackSet) {
        let _ = self.handles.set(handles);
    }

    fn resolvable(&self, kind: CallbackKind) -> bool {
        self.handles
            .get()
            .copied()
            .unwrap_or_else(CallbackSet::all)
            .supports(kind)
    }

    /// Create a one-shot timer. Returns `false` when a timer with the same
    /// name already exists.
    pub fn new_timer(self: &Arc<Self>, name: &str, delay: Duration, data: serde_json::Value) -> bool {
        let Some((serial, token)) = self.register(&self.timers, name) else {
            return false;
        };

        let set = Arc::clone(self);
        let name = name.to_string();
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {
                    debug!(unit = %set.path.display(), name, "timer finished");
                }
                () = tokio::time::sleep(delay) => {
                    // One-shot: the timer removes itself before firing so
                    // the callback may immediately recreate the name.
                    set.remove_if_current(&set.timers, &name, serial);
                    if set.resolvable(CallbackKind::Timer) {
                        set.send(Invocation::Timer { name, data }).await;
                    } else {
                        warn!(unit = %set.path.display(), name, "on_timer callback not defined, dropping fire");
                    }
                }
            }
        });

        true
    }

    /// Stop a timer by name; returns `false` when no such timer exists.
    pub fn stop_timer(&self, name: &str) -> bool {
        Self::stop(&self.timers, name)
    }

    /// Create a repeating ticker. Returns `false` when a ticker with the
    /// same name already exists.
    pub fn new_ticker(
        self: &Arc<Self>,
        name: &str,
        interval: Duration,
        data: serde_json::Value,
    ) -> bool {
        let Some((serial, token)) = self.register(&self.tickers, name) else {
            return false;
        };

        let set = Arc::clone(self);
        let name = name.to_string();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = token.cancelled() => {
                        debug!(unit = %set.path.display(), name, "ticker finished");
                        break;
                    }
                    () = tokio::time::sleep(interval) => {
                        if !set.resolvable(CallbackKind::Ticker) {
                            // Terminal: a ticker without a callback is not restarted.
                            warn!(unit = %set.path.display(), name, "on_ticker callback not defined, stopping ticker");
                            set.remove_if_current(&set.tickers, &name, serial);
                            break;
                        }
                        if !set
                            .send(Invocation::Ticker {
                                name: name.clone(),
                                data: data.clone(),
                            })
                            .await
                        {
                            set.remove_if_current(&set.tickers, &name, serial);
                            break;
                        }
                    }
                }
            }
        });

        true
    }

    /// Stop a ticker by name; returns `false` when no such ticker exists.
    pub fn stop_ticker(&self, name: &str) -> bool {
        Self::stop(&self.tickers, name)
    }

    /// Create a weekly alarm. Returns `false` when an alarm with the same
    /// name already exists.
    ///
    /// The delay to the next matching day/time is recomputed after every
    /// fire; the alarm only disappears on explicit stop, unit destruction,
    /// or loss of a resolvable callback (in which case it silently ends).
    pub fn new_alarm(
        self: &Arc<Self>,
        name: &str,
        days: DaySet,
        hour: u8,
        minute: u8,
        second: u8,
        data: serde_json::Value,
    ) -> bool {
        let Some((serial, token)) = self.register(&self.alarms, name) else {
            return false;
        };

        let set = Arc::clone(self);
        let name = name.to_string();
        tokio::spawn(async move {
            loop {
                let now = chrono::Local::now().naive_local();
                let delay = match schedule::next_alarm_delay(days, hour, minute, second, now) {
                    Ok(delay) => delay,
                    Err(err) => {
                        error!(unit = %set.path.display(), name, error = %err, "failed to compute alarm delay");
                        set.remove_if_current(&set.alarms, &name, serial);
                        break;
                    }
                };

                tokio::select! {
                    () = token.cancelled() => {
                        debug!(unit = %set.path.display(), name, "alarm finished");
                        break;
                    }
                    () = tokio::time::sleep(delay) => {
                        if !set.resolvable(CallbackKind::Alarm) {
                            warn!(unit = %set.path.display(), name, "on_alarm callback not defined, alarm ends");
                            set.remove_if_current(&set.alarms, &name, serial);
                            break;
                        }
                        if !set
                            .send(Invocation::Alarm {
                                name: name.clone(),
                                data: data.clone(),
                            })
                            .await
                        {
                            set.remove_if_current(&set.alarms, &name, serial);
                            break;
                        }
                    }
                }
            }
        });

        true
    }

    /// Stop an alarm by name; returns `false` when no such alarm exists.
    pub fn stop_alarm(&self, name: &str) -> bool {
        Self::stop(&self.alarms, name)
    }

    /// Number of live timers (test/introspection helper).
    #[must_use]
    pub fn timer_count(&self) -> usize {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Number of live tickers.
    #[must_use]
    pub fn ticker_count(&self) -> usize {
        self.tickers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Number of live alarms.
    #[must_use]
    pub fn alarm_count(&self) -> usize {
        self.alarms.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn register(
        &self,
        map: &Mutex<HashMap<String, TriggerHandle>>,
        name: &str,
    ) -> Option<(u64, CancellationToken)> {
        let mut map = map.lock().unwrap_or_else(PoisonError::into_inner);
        if map.contains_key(name) {
            return None;
        }
        let serial = self.serial.fetch_add(1, Ordering::Relaxed);
        let token = self.cancel.child_token();
        map.insert(
            name.to_string(),
            TriggerHandle {
                serial,
                cancel: token.clone(),
            },
        );
        Some((serial, token))
    }

    fn stop(map: &Mutex<HashMap<String, TriggerHandle>>, name: &str) -> bool {
        let handle = map
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
        match handle {
            Some(handle) => {
                handle.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Remove an entry only if it still belongs to the task that created
    /// it; the name may have been stopped and recreated in the meantime.
    fn remove_if_current(
        &self,
        map: &Mutex<HashMap<String, TriggerHandle>>,
        name: &str,
        serial: u64,
    ) {
        let mut map = map.lock().unwrap_or_else(PoisonError::into_inner);
        if map.get(name).is_some_and(|h| h.serial == serial) {
            map.remove(name);
        }
    }

    async fn send(&self, invocation: Invocation) -> bool {
        if self.invoke_tx.send(invocation).await.is_err() {
            debug!(unit = %self.path.display(), "unit is gone, dropping trigger invocation");
            return false;
        }
        true
    }
}
