//! Timer service: run a callback once after a delay, with best-effort
//! cancellation. The engine never trusts cancellation alone; every
//! timer-driven effect is re-checked against alert state when it fires.

use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

/// Boxed callback fired when a timer elapses.
pub type TimerCallback = BoxFuture<'static, ()>;

pub trait TimerService: Send + Sync {
    /// Schedule `callback` to run once after `delay`.
    fn after(&self, delay: Duration, callback: TimerCallback) -> TimerHandle;
}

/// Cancellation handle for a scheduled callback. Best-effort: a callback
/// already past its sleep may still run after `cancel` returns.
#[derive(Debug)]
pub struct TimerHandle {
    token: CancellationToken,
}

impl TimerHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

/// Production timers on the tokio runtime.
pub struct TokioTimers;

impl TimerService for TokioTimers {
    fn after(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let token = CancellationToken::new();
        let guard = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => callback.await,
                _ = guard.cancelled() => {}
            }
        });
        TimerHandle { token }
    }
}

/// Deterministic timer double for engine tests: records armed timers and
/// fires them only when the test advances virtual time.
#[cfg(test)]
pub struct ManualTimers {
    pending: std::sync::Mutex<Vec<PendingTimer>>,
}

#[cfg(test)]
struct PendingTimer {
    due_in: Duration,
    token: CancellationToken,
    callback: Option<TimerCallback>,
}

#[cfg(test)]
impl ManualTimers {
    pub fn new() -> Self {
        Self {
            pending: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Number of armed (not cancelled) timers.
    pub fn armed(&self) -> usize {
        self.pending
            .lock()
            .unwrap()
            .iter()
            .filter(|t| !t.token.is_cancelled())
            .count()
    }

    /// Remaining delay of the soonest armed timer.
    pub fn next_due_in(&self) -> Option<Duration> {
        self.pending
            .lock()
            .unwrap()
            .iter()
            .filter(|t| !t.token.is_cancelled())
            .map(|t| t.due_in)
            .min()
    }

    /// Advance virtual time, firing every timer that comes due. Timers armed
    /// by a firing callback are not aged by this same advance.
    pub async fn advance(&self, elapsed: Duration) {
        let due: Vec<TimerCallback> = {
            let mut pending = self.pending.lock().unwrap();
            let mut fired = Vec::new();
            pending.retain_mut(|timer| {
                if timer.token.is_cancelled() {
                    return false;
                }
                if timer.due_in <= elapsed {
                    if let Some(callback) = timer.callback.take() {
                        fired.push(callback);
                    }
                    false
                } else {
                    timer.due_in -= elapsed;
                    true
                }
            });
            fired
        };
        for callback in due {
            callback.await;
        }
    }

    /// Fire the oldest pending callback even if it was cancelled, simulating
    /// a timer that was already in flight when cancellation was requested.
    pub async fn fire_next_forced(&self) {
        let callback = {
            let mut pending = self.pending.lock().unwrap();
            if pending.is_empty() {
                None
            } else {
                pending.remove(0).callback
            }
        };
        if let Some(callback) = callback {
            callback.await;
        }
    }
}

#[cfg(test)]
impl TimerService for ManualTimers {
    fn after(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let token = CancellationToken::new();
        self.pending.lock().unwrap().push(PendingTimer {
            due_in: delay,
            token: token.clone(),
            callback: Some(callback),
        });
        TimerHandle { token }
    }
}
