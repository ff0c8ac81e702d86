//! Escalation engine
//!
//! The state machine that guarantees an alert is never silently dropped:
//! create arms a timeout targeting the current on-call responder; every
//! timeout escalates to the next responder until the configured attempt
//! budget is spent, then the leadership tier takes over. Acknowledge, snooze
//! and ignore drive the caller-facing transitions.
//!
//! Concurrency model: commands and timer callbacks may race on the same
//! alert. All mutation is serialized by the store's per-id lock; timer
//! handles live in an engine-owned map and are replaced (cancelling the
//! prior handle) on every arm, so an alert has at most one outstanding
//! timer. Cancellation is best-effort, so a fired timer re-checks terminal
//! state and its own arming generation under the per-id lock before acting.
//! Notification is fire-and-forget through a dispatch queue; delivery
//! failure never blocks or reverses a transition.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::alerts::store::AlertStore;
use crate::alerts::{AlertId, AlertStatus, AlertView};
use crate::config::AlertConfig;
use crate::directory::{EscalationDirectory, OnCallDirectory, Target};
use crate::error::AlertResult;
use crate::notify::{AlertPayload, NotificationKind, Notifier};

pub mod timers;

use timers::{TimerCallback, TimerHandle, TimerService};

pub struct EscalationEngine {
    config: AlertConfig,
    store: Arc<AlertStore>,
    oncall: Arc<dyn OnCallDirectory>,
    tiers: Arc<dyn EscalationDirectory>,
    timers: Arc<dyn TimerService>,
    /// Outstanding timeout per alert id. Exclusively owned here; never
    /// exposed to callers.
    armed: Mutex<HashMap<AlertId, ArmedTimer>>,
    timer_seq: AtomicU64,
    notify_tx: mpsc::UnboundedSender<NotifyJob>,
}

struct ArmedTimer {
    generation: u64,
    handle: TimerHandle,
}

struct NotifyJob {
    targets: Vec<Target>,
    payload: AlertPayload,
}

/// What a fired timer decided under the per-id lock.
enum TimeoutOutcome {
    /// Terminal alert or superseded timer; nothing to do
    Stale,
    Escalated { target: Target, payload: AlertPayload },
    Leads { payload: AlertPayload },
}

impl EscalationEngine {
    /// Build the engine and spawn its notification dispatcher. Must be
    /// called from within a tokio runtime.
    pub fn new(
        config: AlertConfig,
        store: Arc<AlertStore>,
        oncall: Arc<dyn OnCallDirectory>,
        tiers: Arc<dyn EscalationDirectory>,
        timers: Arc<dyn TimerService>,
        notifier: Arc<dyn Notifier>,
    ) -> Arc<Self> {
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let engine = Arc::new(Self {
            config,
            store,
            oncall,
            tiers,
            timers,
            armed: Mutex::new(HashMap::new()),
            timer_seq: AtomicU64::new(0),
            notify_tx,
        });
        tokio::spawn(dispatch_loop(notify_rx, notifier));
        engine
    }

    /// Create an alert for the current on-call responder, arm the initial
    /// timeout and notify the responder with the available quick actions.
    pub fn create(self: &Arc<Self>, service: &str, message: &str) -> AlertResult<AlertId> {
        let now = Utc::now();
        let responder = self.oncall.current_responder(now)?;
        let view = self.store.create(service, message, responder.target());
        let id = view.id.clone();

        // Arm under the alert's own lock so a command racing with creation
        // cannot interleave with the initial arming.
        self.store.mutate(&id, |_alert| {
            self.arm(&id, self.config.timeout());
        })?;

        info!(
            "Engine: alert {} created for service '{}' -> {} ({})",
            id, service, responder.name, responder.contact
        );
        let payload = AlertPayload {
            alert_id: id.clone(),
            service: view.service.clone(),
            message: view.message.clone(),
            escalation_level: 0,
            kind: NotificationKind::New {
                quick_actions: self.config.quick_reply_options.clone(),
            },
        };
        self.enqueue(vec![responder.target()], payload);
        Ok(id)
    }

    /// Take ownership of an alert. No-op when the alert is already terminal;
    /// after this returns, no timer effect for the id can occur.
    pub fn acknowledge(&self, id: &str, by: &str) -> AlertResult<()> {
        let now = Utc::now();
        let applied = self.store.mutate(id, |alert| {
            if alert.is_terminal() {
                return false;
            }
            self.disarm(&alert.id);
            alert.status = AlertStatus::Acknowledged;
            alert.acknowledged_by = Some(by.to_string());
            alert.acknowledged_at = Some(now);
            alert.snooze_until = None;
            alert.last_activity_at = now;
            true
        })?;
        if applied {
            info!("Engine: alert {} acknowledged by {}", id, by);
        } else {
            debug!("Engine: acknowledge on terminal alert {} is a no-op", id);
        }
        Ok(())
    }

    /// Defer escalation for `minutes`. The snooze timer re-enters the normal
    /// timeout evaluation, so an alert left unacknowledged escalates at its
    /// current level when the snooze expires.
    pub fn snooze(self: &Arc<Self>, id: &str, minutes: u64) -> AlertResult<()> {
        let now = Utc::now();
        let applied = self.store.mutate(id, |alert| {
            if alert.is_terminal() {
                return false;
            }
            alert.status = AlertStatus::Snoozed;
            alert.snooze_until = Some(now + chrono::Duration::minutes(minutes as i64));
            alert.last_activity_at = now;
            // arming replaces and cancels the previous timer
            self.arm(&alert.id, Duration::from_secs(minutes * 60));
            true
        })?;
        if applied {
            info!("Engine: alert {} snoozed for {} minutes", id, minutes);
        } else {
            debug!("Engine: snooze on terminal alert {} is a no-op", id);
        }
        Ok(())
    }

    /// Dismiss an alert. Terminal; no further escalation.
    pub fn ignore(&self, id: &str, by: &str) -> AlertResult<()> {
        let now = Utc::now();
        let applied = self.store.mutate(id, |alert| {
            if alert.is_terminal() {
                return false;
            }
            self.disarm(&alert.id);
            alert.status = AlertStatus::Ignored;
            alert.ignored_by = Some(by.to_string());
            alert.ignored_at = Some(now);
            alert.snooze_until = None;
            alert.last_activity_at = now;
            true
        })?;
        if applied {
            info!("Engine: alert {} ignored by {}", id, by);
        } else {
            debug!("Engine: ignore on terminal alert {} is a no-op", id);
        }
        Ok(())
    }

    pub fn status(&self, id: &str) -> AlertResult<AlertView> {
        self.store.get(id)
    }

    pub fn status_for_user(&self, user: &str) -> Vec<AlertView> {
        self.store.for_user(user)
    }

    /// Timer entry point. `generation` identifies the arming that scheduled
    /// this callback; a timer superseded or cancelled since then is stale
    /// and must change nothing.
    fn on_timeout(self: &Arc<Self>, id: &AlertId, generation: u64) {
        let outcome = match self.store.mutate(id, |alert| {
            if alert.is_terminal() {
                debug!("Engine: timer fired for terminal alert {}, ignoring", id);
                return TimeoutOutcome::Stale;
            }
            if !self.timer_is_current(id, generation) {
                debug!("Engine: stale timer fired for alert {}, ignoring", id);
                return TimeoutOutcome::Stale;
            }
            let now = Utc::now();
            if alert.escalation_level < self.config.escalation_attempts {
                alert.status = AlertStatus::Escalated;
                alert.escalation_level += 1;
                alert.snooze_until = None;
                alert.last_escalation_at = Some(now);
                alert.last_activity_at = now;
                let target = self.pick_next_target(id, &alert.current_target, now);
                alert.current_target = target.clone();
                self.arm(id, self.config.escalation_delay());
                let payload = AlertPayload {
                    alert_id: alert.id.clone(),
                    service: alert.service.clone(),
                    message: alert.message.clone(),
                    escalation_level: alert.escalation_level,
                    kind: NotificationKind::Escalated,
                };
                TimeoutOutcome::Escalated { target, payload }
            } else {
                alert.status = AlertStatus::EscalatedToLeads;
                alert.snooze_until = None;
                alert.escalated_to_leads_at = Some(now);
                alert.last_activity_at = now;
                alert.current_target = Target::tier(&self.config.leads_tier);
                self.disarm(id);
                let payload = AlertPayload {
                    alert_id: alert.id.clone(),
                    service: alert.service.clone(),
                    message: alert.message.clone(),
                    escalation_level: alert.escalation_level,
                    kind: NotificationKind::EscalatedToLeads,
                };
                TimeoutOutcome::Leads { payload }
            }
        }) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Engine: timer fired for unknown alert {}: {}", id, e);
                return;
            }
        };

        match outcome {
            TimeoutOutcome::Stale => {}
            TimeoutOutcome::Escalated { target, payload } => {
                info!(
                    "Engine: alert {} escalated to level {} -> {}",
                    id, payload.escalation_level, target.name
                );
                self.enqueue(vec![target], payload);
            }
            TimeoutOutcome::Leads { payload } => {
                match self.tiers.resolve_tier(&self.config.leads_tier) {
                    Some(targets) if !targets.is_empty() => {
                        info!(
                            "Engine: alert {} escalated to leads tier '{}' ({} targets)",
                            id,
                            self.config.leads_tier,
                            targets.len()
                        );
                        self.enqueue(targets, payload);
                    }
                    _ => {
                        // the state transition stands; only delivery is lost
                        error!(
                            "Engine: escalation tier '{}' has no targets, leads notification dropped for alert {}",
                            self.config.leads_tier, id
                        );
                    }
                }
            }
        }
    }

    /// Next escalation target: the next-period responder, falling back to
    /// the current target when no distinct responder exists or the directory
    /// is unavailable. Escalation never aborts on a lookup failure.
    fn pick_next_target(
        &self,
        id: &AlertId,
        current: &Target,
        now: chrono::DateTime<Utc>,
    ) -> Target {
        match self.oncall.next_responder(now) {
            Ok(next) => {
                let target = next.target();
                if target == *current {
                    debug!(
                        "Engine: no distinct next responder for alert {}, re-notifying {}",
                        id, target.name
                    );
                }
                target
            }
            Err(e) => {
                warn!(
                    "Engine: directory unavailable while escalating alert {} ({}), re-notifying {}",
                    id, e, current.name
                );
                current.clone()
            }
        }
    }

    /// Arm a timeout for `id`, replacing (and cancelling) any prior timer so
    /// the alert never has two outstanding timers. Callers hold the alert's
    /// per-id lock.
    fn arm(self: &Arc<Self>, id: &AlertId, delay: Duration) {
        let generation = self.timer_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let engine = Arc::downgrade(self);
        let alert_id = id.clone();
        let callback: TimerCallback = Box::pin(async move {
            if let Some(engine) = engine.upgrade() {
                engine.on_timeout(&alert_id, generation);
            }
        });
        let handle = self.timers.after(delay, callback);
        let previous = self
            .armed
            .lock()
            .unwrap()
            .insert(id.clone(), ArmedTimer { generation, handle });
        if let Some(previous) = previous {
            previous.handle.cancel();
        }
    }

    fn disarm(&self, id: &AlertId) {
        if let Some(previous) = self.armed.lock().unwrap().remove(id) {
            previous.handle.cancel();
        }
    }

    fn timer_is_current(&self, id: &AlertId, generation: u64) -> bool {
        self.armed
            .lock()
            .unwrap()
            .get(id)
            .map(|armed| armed.generation == generation)
            .unwrap_or(false)
    }

    fn enqueue(&self, targets: Vec<Target>, payload: AlertPayload) {
        if self
            .notify_tx
            .send(NotifyJob { targets, payload })
            .is_err()
        {
            warn!("Engine: notification dispatcher is gone, dropping notification");
        }
    }
}

/// Drains the notification queue. Each delivery runs on the blocking pool so
/// a slow channel never stalls the timer subsystem; failures are logged and
/// never retried here.
async fn dispatch_loop(mut rx: mpsc::UnboundedReceiver<NotifyJob>, notifier: Arc<dyn Notifier>) {
    while let Some(job) = rx.recv().await {
        for target in job.targets {
            let notifier = Arc::clone(&notifier);
            let payload = job.payload.clone();
            let target_name = target.name.clone();
            let channel = notifier.name().to_string();
            match tokio::task::spawn_blocking(move || notifier.notify(&target, &payload)).await {
                Ok(Ok(())) => debug!(
                    "Notify: delivered alert {} to {} via {}",
                    job.payload.alert_id, target_name, channel
                ),
                Ok(Err(e)) => warn!(
                    "Notify: delivery to {} via {} failed for alert {}: {:#}",
                    target_name, channel, job.payload.alert_id, e
                ),
                Err(e) => error!("Notify: delivery task join error: {}", e),
            }
        }
    }
}
